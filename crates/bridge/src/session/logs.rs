//! Log stream session.
//!
//! Attaches to a container's log stream with `follow` semantics and relays
//! chunks in arrival order. Chunk boundaries carry no meaning downstream;
//! the contract is simply that no byte is reordered, dropped or duplicated.

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use runtime::{ContainerRuntime, LogStreamOptions};

use super::{set_status, SessionId, SessionStatus};
use crate::dispatch::{forward_event, EventPayload, SessionEvent, SessionKind, SessionOutcome};

pub(super) struct LogSession<R> {
    pub id: SessionId,
    pub container_id: String,
    pub options: LogStreamOptions,
    pub runtime: Arc<R>,
    pub events: mpsc::Sender<SessionEvent>,
    pub cancel: CancellationToken,
    pub status: Arc<Mutex<SessionStatus>>,
}

impl<R: ContainerRuntime> LogSession<R> {
    pub(super) async fn run(self) -> SessionOutcome {
        let mut stream = tokio::select! {
            _ = self.cancel.cancelled() => return SessionOutcome::Cancelled,
            attached = self.runtime.attach_logs(&self.container_id, &self.options) => {
                match attached {
                    Ok(stream) => stream,
                    // Attach failed: terminal without ever entering Active.
                    Err(e) => return SessionOutcome::Failed(e.to_string()),
                }
            }
        };

        set_status(&self.status, SessionStatus::Active);
        tracing::debug!(
            session_id = %self.id,
            container_id = %self.container_id,
            "Log session attached"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return SessionOutcome::Cancelled,
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        let event = SessionEvent {
                            session_id: self.id.clone(),
                            kind: SessionKind::Log,
                            payload: EventPayload::Output(bytes),
                        };
                        // A full event channel blocks us here; Stop still
                        // interrupts the wait.
                        if !forward_event(&self.events, &self.cancel, event).await {
                            return SessionOutcome::Cancelled;
                        }
                    }
                    Some(Err(e)) => return SessionOutcome::Failed(e.to_string()),
                    None => return SessionOutcome::Completed,
                },
            }
        }
    }
}
