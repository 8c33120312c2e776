//! Session events and the dispatch boundary toward the UI.
//!
//! Sessions never talk to the UI transport directly. They push
//! [`SessionEvent`]s into one bounded channel; a dispatcher task drains it
//! into an [`EventSink`] implemented by the boundary layer (for the desktop
//! app, a Tauri emitter). Because each session is the only producer of its
//! own events and the channel is a single FIFO, per-session delivery order
//! always matches production order.
//!
//! The channel being bounded is what gives sessions backpressure: a slow
//! sink slows producers down, it never makes them drop data.

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use runtime::PullProgress;

/// Opaque session identifier, unique for the process lifetime.
pub type SessionId = String;

/// The kind of interaction a session wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Log,
    Exec,
    Pull,
}

impl SessionKind {
    /// Conventional channel-name prefix used by sink implementations.
    pub fn channel_prefix(self) -> &'static str {
        match self {
            SessionKind::Log => "logs",
            SessionKind::Exec => "exec",
            SessionKind::Pull => "pull",
        }
    }
}

/// The single terminal outcome of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The underlying stream ended naturally.
    Completed,
    /// The user asked for the session to stop.
    Cancelled,
    /// The session ended with an engine or I/O failure.
    Failed(String),
}

/// One payload published under a session's identity.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Raw output bytes (log chunk, exec pty output), in production order.
    Output(Bytes),
    /// Structured pull progress record.
    Progress(PullProgress),
    /// Terminal notification; published exactly once per session, after
    /// which no further events carry this session's ID.
    Closed(SessionOutcome),
}

/// An event addressed to the subscribers of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub session_id: SessionId,
    pub kind: SessionKind,
    pub payload: EventPayload,
}

/// Delivery boundary toward the UI layer.
///
/// "Deliver to subscribers of session X" is abstract here; naming schemes
/// (e.g. `logs-{session_id}`) belong to the implementation.
pub trait EventSink: Send + Sync + 'static {
    fn publish(&self, event: &SessionEvent);
}

/// Spawns the dispatcher that drains session events into the sink.
///
/// The task ends when every event sender is dropped, i.e. when the registry
/// and all sessions are gone.
pub(crate) fn spawn_dispatcher(
    mut events: mpsc::Receiver<SessionEvent>,
    sink: std::sync::Arc<dyn EventSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            sink.publish(&event);
        }
        tracing::debug!("Event dispatcher drained and stopped");
    })
}

/// Sends one event, honoring cancellation while the channel is full.
///
/// Returns `false` when the session was cancelled (or the dispatcher went
/// away) before the event could be queued; the caller should wind down.
pub(crate) async fn forward_event(
    events: &mpsc::Sender<SessionEvent>,
    cancel: &CancellationToken,
    event: SessionEvent,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = events.send(event) => sent.is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct RecordingSink(Mutex<Vec<SessionEvent>>);

    impl EventSink for RecordingSink {
        fn publish(&self, event: &SessionEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn kind_prefixes_are_stable() {
        assert_eq!(SessionKind::Log.channel_prefix(), "logs");
        assert_eq!(SessionKind::Exec.channel_prefix(), "exec");
        assert_eq!(SessionKind::Pull.channel_prefix(), "pull");
    }

    #[tokio::test]
    async fn dispatcher_preserves_order() {
        let sink = Arc::new(RecordingSink(Mutex::new(Vec::new())));
        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_dispatcher(rx, sink.clone());

        for i in 0..20u8 {
            tx.send(SessionEvent {
                session_id: "s1".to_string(),
                kind: SessionKind::Log,
                payload: EventPayload::Output(Bytes::from(vec![i])),
            })
            .await
            .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        let seen = sink.0.lock().unwrap();
        assert_eq!(seen.len(), 20);
        for (i, event) in seen.iter().enumerate() {
            assert_eq!(
                event.payload,
                EventPayload::Output(Bytes::from(vec![i as u8]))
            );
        }
    }

    #[tokio::test]
    async fn forward_event_yields_to_cancellation_when_blocked() {
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        // Fill the channel so the next send would block.
        tx.send(SessionEvent {
            session_id: "s1".to_string(),
            kind: SessionKind::Log,
            payload: EventPayload::Output(Bytes::from_static(b"x")),
        })
        .await
        .unwrap();

        let blocked = forward_event(
            &tx,
            &cancel,
            SessionEvent {
                session_id: "s1".to_string(),
                kind: SessionKind::Log,
                payload: EventPayload::Output(Bytes::from_static(b"y")),
            },
        );
        tokio::pin!(blocked);

        // The send cannot progress; cancellation must release it promptly.
        tokio::select! {
            _ = &mut blocked => panic!("send should be blocked on a full channel"),
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
        }
        cancel.cancel();
        let sent = tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .expect("cancellation should unblock the send");
        assert!(!sent);
    }
}
