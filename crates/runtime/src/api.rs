//! The contract the session bridge expects from a container runtime.
//!
//! The bridge is generic over [`ContainerRuntime`] so session machinery can
//! be exercised against a scripted mock in tests. The production
//! implementation is [`crate::client::DockerRuntime`].

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;

use crate::error::RuntimeError;
use crate::stats::StatsSnapshot;

/// Ordered stream of raw output chunks from the engine.
pub type ByteStream = BoxStream<'static, Result<Bytes, RuntimeError>>;

/// Ordered stream of structured pull progress records.
pub type ProgressStream = BoxStream<'static, Result<PullProgress, RuntimeError>>;

/// Options for attaching to a container's log stream.
#[derive(Debug, Clone, Deserialize)]
pub struct LogStreamOptions {
    /// Prefix each line with its timestamp.
    pub timestamps: bool,
    /// Number of trailing lines to replay before following.
    pub tail: u32,
}

impl Default for LogStreamOptions {
    fn default() -> Self {
        Self {
            timestamps: false,
            tail: 100,
        }
    }
}

/// Terminal dimensions for an exec pseudo-terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSize {
    pub cols: u16,
    pub rows: u16,
}

impl TermSize {
    /// Normalizes degenerate dimensions to a conventional 80x24 terminal.
    pub fn normalized(self) -> Self {
        Self {
            cols: if self.cols == 0 { 80 } else { self.cols },
            rows: if self.rows == 0 { 24 } else { self.rows },
        }
    }
}

/// One progress record from an image pull.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullProgress {
    /// Human-readable status, e.g. "Downloading" or "Pull complete".
    pub status: String,
    /// Layer identifier the record applies to, when reported.
    pub layer: Option<String>,
    /// Bytes transferred so far for this layer.
    pub current: Option<i64>,
    /// Total bytes expected for this layer.
    pub total: Option<i64>,
}

/// A live interactive exec attachment.
///
/// Dropping the attachment closes the remote pseudo-terminal's stdin and
/// detaches from its output.
pub struct ExecAttachment {
    /// Engine-side exec identifier, needed for resize calls.
    pub exec_id: String,
    /// Sink for keystrokes and pasted text, forwarded verbatim.
    pub input: Pin<Box<dyn AsyncWrite + Send>>,
    /// Remote pty output in production order.
    pub output: ByteStream,
}

/// The operations the session bridge consumes.
///
/// Implementations must be thread-safe; every method may be awaited from a
/// spawned session task, so the returned futures are `Send`.
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Attaches to the container's log stream with `follow` semantics.
    ///
    /// Fails fast (rather than via the stream) when the container does not
    /// exist or the engine is unreachable.
    fn attach_logs(
        &self,
        container_id: &str,
        options: &LogStreamOptions,
    ) -> impl Future<Output = Result<ByteStream, RuntimeError>> + Send;

    /// Creates and starts an interactive exec with an allocated pty.
    ///
    /// Returns [`RuntimeError::InvalidState`] when the target container is
    /// not running. The pty is sized to `size` before this returns.
    fn create_exec(
        &self,
        container_id: &str,
        size: TermSize,
    ) -> impl Future<Output = Result<ExecAttachment, RuntimeError>> + Send;

    /// Propagates new dimensions to a live exec pseudo-terminal.
    fn resize_exec(
        &self,
        exec_id: &str,
        size: TermSize,
    ) -> impl Future<Output = Result<(), RuntimeError>> + Send;

    /// Starts pulling an image reference (`name:tag` or digest) and returns
    /// its progress record stream. Dropping the stream aborts the transfer.
    fn pull_image(
        &self,
        reference: &str,
    ) -> impl Future<Output = Result<ProgressStream, RuntimeError>> + Send;

    /// Fetches one stats snapshot for a container. The engine embeds the
    /// previous tick alongside the current one, so a single call is enough
    /// to derive instantaneous rates.
    fn stats(
        &self,
        container_id: &str,
    ) -> impl Future<Output = Result<StatsSnapshot, RuntimeError>> + Send;
}
