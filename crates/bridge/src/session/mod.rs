//! Session machinery: the registry and the three stream session variants.

mod exec;
mod logs;
mod pull;
mod registry;

use std::sync::Mutex;

use bytes::Bytes;
use thiserror::Error;

use runtime::TermSize;

pub use crate::dispatch::{SessionId, SessionKind, SessionOutcome};
pub use registry::{SessionRegistry, SessionSnapshot};

/// Errors produced by registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// No live session with this ID (absent or already torn down).
    #[error("session not found: {0}")]
    NotFound(SessionId),

    /// A live session with this ID is already registered.
    #[error("session already exists: {0}")]
    AlreadyExists(SessionId),

    /// The registry is shutting down and accepts no new sessions.
    #[error("session registry is shutting down")]
    ShuttingDown,
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Registered; the engine attachment is still being established.
    Starting,
    /// Attached and pumping data.
    Active,
    /// Stopped by the user.
    Cancelled,
    /// The underlying stream ended naturally.
    Completed,
    /// Terminated by an engine or I/O failure.
    Failed(String),
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Starting | SessionStatus::Active)
    }
}

impl From<&SessionOutcome> for SessionStatus {
    fn from(outcome: &SessionOutcome) -> Self {
        match outcome {
            SessionOutcome::Completed => SessionStatus::Completed,
            SessionOutcome::Cancelled => SessionStatus::Cancelled,
            SessionOutcome::Failed(reason) => SessionStatus::Failed(reason.clone()),
        }
    }
}

/// Inbound command routed to a session by ID.
///
/// `Write` and `Resize` only carry meaning for exec sessions; the registry
/// silently ignores them for the other kinds so the call surface stays
/// uniform. `Stop` is idempotent for every kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Write(Bytes),
    Resize(TermSize),
    Stop,
}

pub(crate) fn set_status(slot: &Mutex<SessionStatus>, status: SessionStatus) {
    *slot.lock().unwrap() = status;
}
