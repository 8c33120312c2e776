//! Event delivery onto the webview event bus.
//!
//! Each session owns one Tauri event channel named
//! `{prefix}-{session_id}` (`logs-…`, `exec-…`, `pull-…`), so a frontend
//! component subscribes to exactly the sessions it opened. Emission is
//! fire-and-forget from the bridge's point of view; a failed emit is logged
//! and never propagates back into the session.

use bridge::{EventPayload, EventSink, SessionEvent, SessionOutcome};
use serde::Serialize;
use tauri::{AppHandle, Emitter};

/// Terminal notification emitted once per session, after which no further
/// events arrive on its channel.
#[derive(Debug, Clone, Serialize)]
pub struct ClosedNotice {
    pub closed: bool,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&SessionOutcome> for ClosedNotice {
    fn from(outcome: &SessionOutcome) -> Self {
        match outcome {
            SessionOutcome::Completed => Self {
                closed: true,
                outcome: "completed",
                error: None,
            },
            SessionOutcome::Cancelled => Self {
                closed: true,
                outcome: "cancelled",
                error: None,
            },
            SessionOutcome::Failed(reason) => Self {
                closed: true,
                outcome: "failed",
                error: Some(reason.clone()),
            },
        }
    }
}

/// Bridges session events to `AppHandle::emit`.
pub struct TauriEventSink {
    app: AppHandle,
}

impl TauriEventSink {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl EventSink for TauriEventSink {
    fn publish(&self, event: &SessionEvent) {
        let channel = format!("{}-{}", event.kind.channel_prefix(), event.session_id);
        let emitted = match &event.payload {
            // Raw output is delivered as text; xterm.js consumes strings.
            EventPayload::Output(bytes) => self
                .app
                .emit(&channel, String::from_utf8_lossy(bytes).into_owned()),
            EventPayload::Progress(progress) => self.app.emit(&channel, progress.clone()),
            EventPayload::Closed(outcome) => self.app.emit(&channel, ClosedNotice::from(outcome)),
        };
        if let Err(e) = emitted {
            tracing::warn!(channel = %channel, error = %e, "Event emit failed");
        }
    }
}
