//! # Portside Runtime Adapter
//!
//! Typed client layer for a Docker-compatible container engine. This crate
//! wraps the engine's HTTP API behind two surfaces:
//!
//! - One-shot calls (list/inspect/act/remove) exposed as inherent methods on
//!   [`DockerRuntime`], returning plain `Result`s.
//! - The streaming contract the session bridge builds on, expressed as the
//!   [`ContainerRuntime`] trait: cancelable log attachment, interactive exec
//!   with a remote pseudo-terminal, image pull progress, and paired stats
//!   sampling.
//!
//! The adapter also owns engine lifecycle concerns that are host-local rather
//! than API-level: detecting whether a daemon is reachable, launching one
//! (Colima on macOS, systemd on Linux) and waiting for it to become ready.
//!
//! ## Modules
//!
//! - [`api`]: the `ContainerRuntime` contract and its support types
//! - [`client`]: the bollard-backed implementation with lazy reconnection
//! - [`error`]: the shared error taxonomy
//! - [`lifecycle`]: engine start/stop/readiness management
//! - [`stats`]: resource usage samples and rate derivation
//! - [`validate`]: identifier validation for user-supplied references

pub mod api;
pub mod client;
pub mod error;
pub mod lifecycle;
pub mod stats;
pub mod validate;

pub use api::{
    ByteStream, ContainerRuntime, ExecAttachment, LogStreamOptions, ProgressStream, PullProgress,
    TermSize,
};
pub use client::{ContainerAction, DockerRuntime};
pub use error::{Result, RuntimeError};
pub use lifecycle::{
    did_we_start_engine, install_instructions, provider_installed, EngineStatus, RuntimeLifecycle,
};
pub use stats::{derive_usage, ContainerUsage, StatsSample, StatsSnapshot};
pub use validate::validate_ref;

// Re-export the engine model types that flow through the one-shot surface so
// downstream crates do not need a direct bollard dependency for them.
pub use bollard::models;
