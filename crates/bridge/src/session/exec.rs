//! Interactive exec session.
//!
//! Wraps one engine exec with an allocated pseudo-terminal. Inbound
//! commands carry keystrokes (forwarded verbatim, in submission order) and
//! resize requests (propagated to the remote pty so wrapped output reflows);
//! outbound pty bytes are relayed under the same ordering contract as logs.
//!
//! Multiple concurrent exec sessions against one container are legal and
//! fully independent.

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use runtime::{ContainerRuntime, ExecAttachment, TermSize};

use super::{set_status, SessionCommand, SessionId, SessionStatus};
use crate::dispatch::{forward_event, EventPayload, SessionEvent, SessionKind, SessionOutcome};

pub(super) struct ExecSession<R> {
    pub id: SessionId,
    pub container_id: String,
    pub size: TermSize,
    pub runtime: Arc<R>,
    pub events: mpsc::Sender<SessionEvent>,
    pub cancel: CancellationToken,
    pub status: Arc<Mutex<SessionStatus>>,
    pub commands: mpsc::Receiver<SessionCommand>,
}

impl<R: ContainerRuntime> ExecSession<R> {
    pub(super) async fn run(mut self) -> SessionOutcome {
        let attachment = tokio::select! {
            _ = self.cancel.cancelled() => return SessionOutcome::Cancelled,
            created = self.runtime.create_exec(&self.container_id, self.size) => {
                match created {
                    Ok(attachment) => attachment,
                    // Covers InvalidState for non-running containers: the
                    // session fails fast and never reaches Active.
                    Err(e) => return SessionOutcome::Failed(e.to_string()),
                }
            }
        };

        let ExecAttachment {
            exec_id,
            mut input,
            mut output,
        } = attachment;

        set_status(&self.status, SessionStatus::Active);
        tracing::debug!(
            session_id = %self.id,
            container_id = %self.container_id,
            exec_id = %exec_id,
            "Exec session attached"
        );

        // Dropping `input`/`output` on any exit path closes the remote pty
        // and detaches from the engine.
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return SessionOutcome::Cancelled,

                command = self.commands.recv() => match command {
                    Some(SessionCommand::Write(data)) => {
                        if let Err(e) = input.write_all(&data).await {
                            return SessionOutcome::Failed(format!("pty input closed: {e}"));
                        }
                        if let Err(e) = input.flush().await {
                            return SessionOutcome::Failed(format!("pty input closed: {e}"));
                        }
                    }
                    Some(SessionCommand::Resize(size)) => {
                        // A failed resize leaves the pty usable at its old
                        // dimensions; log it rather than kill the session.
                        if let Err(e) = self.runtime.resize_exec(&exec_id, size).await {
                            tracing::warn!(
                                session_id = %self.id,
                                exec_id = %exec_id,
                                error = %e,
                                "Pty resize failed"
                            );
                        }
                    }
                    // Stop arrives via the cancellation token; a closed
                    // command channel means the registry is gone.
                    Some(SessionCommand::Stop) | None => return SessionOutcome::Cancelled,
                },

                chunk = output.next() => match chunk {
                    Some(Ok(bytes)) => {
                        let event = SessionEvent {
                            session_id: self.id.clone(),
                            kind: SessionKind::Exec,
                            payload: EventPayload::Output(bytes),
                        };
                        if !forward_event(&self.events, &self.cancel, event).await {
                            return SessionOutcome::Cancelled;
                        }
                    }
                    Some(Err(e)) => return SessionOutcome::Failed(e.to_string()),
                    // Remote process exited.
                    None => return SessionOutcome::Completed,
                },
            }
        }
    }
}
