//! Image pull session.
//!
//! Relays structured progress records in arrival order and resolves exactly
//! once: the `Closed` event published by the registry wrapper is the single
//! terminal outcome, distinct from the progress stream. Cancelling drops
//! the underlying response stream, which aborts the transfer itself rather
//! than merely silencing progress.

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use runtime::ContainerRuntime;

use super::{set_status, SessionId, SessionStatus};
use crate::dispatch::{forward_event, EventPayload, SessionEvent, SessionKind, SessionOutcome};

pub(super) struct PullSession<R> {
    pub id: SessionId,
    pub reference: String,
    pub runtime: Arc<R>,
    pub events: mpsc::Sender<SessionEvent>,
    pub cancel: CancellationToken,
    pub status: Arc<Mutex<SessionStatus>>,
}

impl<R: ContainerRuntime> PullSession<R> {
    pub(super) async fn run(self) -> SessionOutcome {
        let mut stream = tokio::select! {
            _ = self.cancel.cancelled() => return SessionOutcome::Cancelled,
            started = self.runtime.pull_image(&self.reference) => {
                match started {
                    Ok(stream) => stream,
                    Err(e) => return SessionOutcome::Failed(e.to_string()),
                }
            }
        };

        set_status(&self.status, SessionStatus::Active);
        tracing::debug!(
            session_id = %self.id,
            reference = %self.reference,
            "Pull session started"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return SessionOutcome::Cancelled,
                record = stream.next() => match record {
                    Some(Ok(progress)) => {
                        let event = SessionEvent {
                            session_id: self.id.clone(),
                            kind: SessionKind::Pull,
                            payload: EventPayload::Progress(progress),
                        };
                        if !forward_event(&self.events, &self.cancel, event).await {
                            return SessionOutcome::Cancelled;
                        }
                    }
                    // Unknown reference, network failure, digest mismatch:
                    // one failure outcome regardless of progress so far.
                    Some(Err(e)) => return SessionOutcome::Failed(e.to_string()),
                    None => return SessionOutcome::Completed,
                },
            }
        }
    }
}
