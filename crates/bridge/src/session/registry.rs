//! Process-wide session registry.
//!
//! Maps opaque session IDs to running session tasks and their cancellation
//! handles. The table is the only shared mutable state in the bridge; every
//! mutation happens under the map's own sharded locking and is never held
//! across I/O. Sessions unregister themselves eagerly on their terminal
//! transition, so an entry in the map always owns a live task.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use runtime::{ContainerRuntime, LogStreamOptions, TermSize};

use super::exec::ExecSession;
use super::logs::LogSession;
use super::pull::PullSession;
use super::{set_status, SessionCommand, SessionError, SessionId, SessionStatus};
use crate::config::BridgeConfig;
use crate::dispatch::{
    spawn_dispatcher, EventPayload, EventSink, SessionEvent, SessionKind, SessionOutcome,
};

/// Capacity of each exec session's inbound command channel.
const COMMAND_CAPACITY: usize = 64;

struct SessionEntry {
    kind: SessionKind,
    target: String,
    status: Arc<Mutex<SessionStatus>>,
    cancel: CancellationToken,
    /// Present for exec sessions only; the other kinds take no input.
    commands: Option<mpsc::Sender<SessionCommand>>,
    abort: AbortHandle,
    created_at: Instant,
}

/// Point-in-time view of one registered session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub kind: SessionKind,
    pub target: String,
    pub status: SessionStatus,
    pub created_at: Instant,
}

/// Owns session lifecycle: start, command routing, teardown.
pub struct SessionRegistry<R: ContainerRuntime> {
    runtime: Arc<R>,
    sessions: Arc<DashMap<SessionId, SessionEntry>>,
    events: mpsc::Sender<SessionEvent>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    shutdown_grace: Duration,
}

impl<R: ContainerRuntime> SessionRegistry<R> {
    /// Creates a registry publishing through `sink` and spawns its event
    /// dispatcher.
    ///
    /// Must be called from within a Tokio runtime context (the dispatcher
    /// task is spawned here); callers on a plain thread enter the runtime
    /// first, e.g. via `block_on`.
    pub fn new(runtime: Arc<R>, sink: Arc<dyn EventSink>, config: &BridgeConfig) -> Self {
        let (events, event_rx) = mpsc::channel(config.event_capacity);
        // Detached; the task ends when the last event sender is dropped.
        let _ = spawn_dispatcher(event_rx, sink);

        Self {
            runtime,
            sessions: Arc::new(DashMap::new()),
            events,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            shutdown_grace: config.shutdown_grace(),
        }
    }

    /// Starts a log stream session. Returns as soon as the pump is spawned;
    /// the attach round-trip happens inside the session task.
    ///
    /// A caller-supplied ID that is already live is rejected with
    /// [`SessionError::AlreadyExists`] without touching the live session.
    pub fn start_logs(
        &self,
        session_id: Option<SessionId>,
        container_id: &str,
        options: LogStreamOptions,
    ) -> Result<SessionId, SessionError> {
        self.ensure_open()?;
        let id = allocate_id(session_id);

        match self.sessions.entry(id.clone()) {
            Entry::Occupied(_) => Err(SessionError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                let status = Arc::new(Mutex::new(SessionStatus::Starting));
                let cancel = self.shutdown.child_token();

                let session = LogSession {
                    id: id.clone(),
                    container_id: container_id.to_string(),
                    options,
                    runtime: Arc::clone(&self.runtime),
                    events: self.events.clone(),
                    cancel: cancel.clone(),
                    status: Arc::clone(&status),
                };
                let abort = self.spawn_session(
                    id.clone(),
                    SessionKind::Log,
                    Arc::clone(&status),
                    session.run(),
                );

                slot.insert(SessionEntry {
                    kind: SessionKind::Log,
                    target: container_id.to_string(),
                    status,
                    cancel,
                    commands: None,
                    abort,
                    created_at: Instant::now(),
                });
                tracing::info!(session_id = %id, container_id = %container_id, "Started log session");
                Ok(id)
            }
        }
    }

    /// Starts an interactive exec session sized to `size`. Session identity
    /// is unique per exec attempt; several concurrent terminals against the
    /// same container are independent sessions.
    pub fn start_exec(
        &self,
        session_id: Option<SessionId>,
        container_id: &str,
        size: TermSize,
    ) -> Result<SessionId, SessionError> {
        self.ensure_open()?;
        let id = allocate_id(session_id);

        match self.sessions.entry(id.clone()) {
            Entry::Occupied(_) => Err(SessionError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                let status = Arc::new(Mutex::new(SessionStatus::Starting));
                let cancel = self.shutdown.child_token();
                let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);

                let session = ExecSession {
                    id: id.clone(),
                    container_id: container_id.to_string(),
                    size: size.normalized(),
                    runtime: Arc::clone(&self.runtime),
                    events: self.events.clone(),
                    cancel: cancel.clone(),
                    status: Arc::clone(&status),
                    commands: command_rx,
                };
                let abort = self.spawn_session(
                    id.clone(),
                    SessionKind::Exec,
                    Arc::clone(&status),
                    session.run(),
                );

                slot.insert(SessionEntry {
                    kind: SessionKind::Exec,
                    target: container_id.to_string(),
                    status,
                    cancel,
                    commands: Some(command_tx),
                    abort,
                    created_at: Instant::now(),
                });
                tracing::info!(session_id = %id, container_id = %container_id, "Started exec session");
                Ok(id)
            }
        }
    }

    /// Starts an image pull session for `reference` (`name:tag` or digest).
    pub fn start_pull(
        &self,
        session_id: Option<SessionId>,
        reference: &str,
    ) -> Result<SessionId, SessionError> {
        self.ensure_open()?;
        let id = allocate_id(session_id);

        match self.sessions.entry(id.clone()) {
            Entry::Occupied(_) => Err(SessionError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                let status = Arc::new(Mutex::new(SessionStatus::Starting));
                let cancel = self.shutdown.child_token();

                let session = PullSession {
                    id: id.clone(),
                    reference: reference.to_string(),
                    runtime: Arc::clone(&self.runtime),
                    events: self.events.clone(),
                    cancel: cancel.clone(),
                    status: Arc::clone(&status),
                };
                let abort = self.spawn_session(
                    id.clone(),
                    SessionKind::Pull,
                    Arc::clone(&status),
                    session.run(),
                );

                slot.insert(SessionEntry {
                    kind: SessionKind::Pull,
                    target: reference.to_string(),
                    status,
                    cancel,
                    commands: None,
                    abort,
                    created_at: Instant::now(),
                });
                tracing::info!(session_id = %id, reference = %reference, "Started pull session");
                Ok(id)
            }
        }
    }

    /// Routes a command to a session.
    ///
    /// `Write`/`Resize` are silently ignored for kinds that take no input
    /// (log, pull), keeping the call uniform. `Stop` cancels cooperatively
    /// and is idempotent. Returns [`SessionError::NotFound`] when no live
    /// session has this ID — including sessions that already tore down.
    pub async fn command(
        &self,
        session_id: &str,
        command: SessionCommand,
    ) -> Result<(), SessionError> {
        // Clone the handles out of the entry so the map guard is dropped
        // before any await.
        let (cancel, commands) = {
            let entry = self
                .sessions
                .get(session_id)
                .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
            (entry.cancel.clone(), entry.commands.clone())
        };

        match command {
            SessionCommand::Stop => {
                cancel.cancel();
                Ok(())
            }
            SessionCommand::Write(_) | SessionCommand::Resize(_) => {
                let Some(tx) = commands else {
                    return Ok(());
                };
                tx.send(command)
                    .await
                    .map_err(|_| SessionError::NotFound(session_id.to_string()))
            }
        }
    }

    /// Requests cooperative cancellation of one session. Idempotent while
    /// the session is live; `NotFound` once it has unregistered.
    pub fn stop(&self, session_id: &str) -> Result<(), SessionError> {
        let entry = self
            .sessions
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        entry.cancel.cancel();
        Ok(())
    }

    /// Cancels every live session and waits up to the shutdown grace for
    /// them to release their engine attachments; stragglers are aborted.
    /// Called once on application shutdown.
    pub async fn stop_all(&self) {
        self.shutdown.cancel();
        self.tracker.close();

        if timeout(self.shutdown_grace, self.tracker.wait()).await.is_err() {
            let remaining: Vec<SessionId> =
                self.sessions.iter().map(|entry| entry.key().clone()).collect();
            tracing::warn!(
                remaining = remaining.len(),
                "Sessions exceeded shutdown grace, aborting"
            );
            for id in remaining {
                if let Some((_, entry)) = self.sessions.remove(&id) {
                    entry.abort.abort();
                }
            }
        }
    }

    /// Current status of a session, `None` once it has unregistered.
    pub fn status(&self, session_id: &str) -> Option<SessionStatus> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.status.lock().unwrap().clone())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Point-in-time view of all live sessions, for on-demand query.
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .iter()
            .map(|entry| SessionSnapshot {
                id: entry.key().clone(),
                kind: entry.kind,
                target: entry.target.clone(),
                status: entry.status.lock().unwrap().clone(),
                created_at: entry.created_at,
            })
            .collect()
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.shutdown.is_cancelled() {
            return Err(SessionError::ShuttingDown);
        }
        Ok(())
    }

    /// Spawns the session pump wrapped with the terminal-transition duties:
    /// record the final status, publish the single `Closed` event, then
    /// unregister eagerly.
    fn spawn_session(
        &self,
        id: SessionId,
        kind: SessionKind,
        status: Arc<Mutex<SessionStatus>>,
        pump: impl Future<Output = SessionOutcome> + Send + 'static,
    ) -> AbortHandle {
        let sessions = Arc::clone(&self.sessions);
        let events = self.events.clone();

        let handle = self.tracker.spawn(async move {
            let outcome = pump.await;
            set_status(&status, SessionStatus::from(&outcome));

            let closed = SessionEvent {
                session_id: id.clone(),
                kind,
                payload: EventPayload::Closed(outcome.clone()),
            };
            let _ = events.send(closed).await;

            sessions.remove(&id);

            match &outcome {
                SessionOutcome::Failed(reason) => {
                    tracing::warn!(session_id = %id, kind = ?kind, reason = %reason, "Session failed");
                }
                outcome => {
                    tracing::info!(session_id = %id, kind = ?kind, outcome = ?outcome, "Session closed");
                }
            }
        });
        handle.abort_handle()
    }
}

fn allocate_id(proposed: Option<SessionId>) -> SessionId {
    proposed.unwrap_or_else(|| Uuid::new_v4().to_string())
}
