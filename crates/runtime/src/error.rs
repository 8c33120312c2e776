//! Error types for the runtime adapter.

use thiserror::Error;

/// Runtime error taxonomy shared by the adapter and the session bridge.
///
/// Streaming sessions convert any of these into a terminal `Failed` outcome;
/// one-shot calls propagate them directly to the caller.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The referenced container, image, volume or network does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The resource already exists (duplicate create).
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The target is in a state that does not permit the operation,
    /// e.g. exec against a container that is not running.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The container engine cannot be reached.
    #[error("runtime unavailable: {0}")]
    Unavailable(String),

    /// The operation did not complete within its deadline.
    #[error("operation timed out: {0}")]
    TimedOut(String),

    /// The operation was cancelled by the caller. Not a failure.
    #[error("cancelled")]
    Cancelled,

    /// Opaque engine-reported failure. The message is passed through for
    /// display, never parsed.
    #[error("{0}")]
    Upstream(String),
}

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

impl From<bollard::errors::Error> for RuntimeError {
    fn from(err: bollard::errors::Error) -> Self {
        use bollard::errors::Error;

        match err {
            Error::DockerResponseServerError {
                status_code,
                message,
            } => match status_code {
                404 => RuntimeError::NotFound(message),
                409 => RuntimeError::AlreadyExists(message),
                _ => RuntimeError::Upstream(message),
            },
            Error::RequestTimeoutError => {
                RuntimeError::TimedOut("engine request timed out".to_string())
            }
            Error::IOError { err } => RuntimeError::Unavailable(err.to_string()),
            other => RuntimeError::Upstream(other.to_string()),
        }
    }
}
