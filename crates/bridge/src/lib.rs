//! # Portside Session Bridge
//!
//! This crate turns long-lived interactions with a container engine — log
//! tailing, interactive exec with a pseudo-terminal, image pull progress,
//! batched stats polling — into addressable, cancelable, independently
//! lifecycled sessions a UI can subscribe to and tear down without leaking
//! engine attachments.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Session Registry                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐            │
//! │  │ Log Stream │   │    Exec    │   │    Pull    │  sessions  │
//! │  └─────┬──────┘   └─────┬──────┘   └─────┬──────┘            │
//! │        │                │                │                   │
//! │        └───────── bounded event channel ─┘                   │
//! │                         │                                    │
//! │  ┌──────────────────────▼───────────────────────────────┐    │
//! │  │            Event Dispatch (EventSink)                │    │
//! │  └──────────────────────────────────────────────────────┘    │
//! │                                                              │
//! │  ┌──────────────────────────────────────────────────────┐    │
//! │  │              Batch Stats Collector                   │    │
//! │  └──────────────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each session runs as one spawned task that owns its engine attachment.
//! The registry maps an opaque session ID to the task's cancellation token
//! and command channel; entries are removed eagerly when a session reaches
//! a terminal state, and every terminal transition publishes exactly one
//! `Closed` event.
//!
//! ## Modules
//!
//! - [`config`]: configuration loading and defaults
//! - [`dispatch`]: session events and the sink boundary toward the UI
//! - [`session`]: the registry and the three session variants
//! - [`stats`]: fan-out/fan-in batched stats collection

pub mod config;
pub mod dispatch;
pub mod session;
pub mod stats;

pub use config::BridgeConfig;
pub use dispatch::{EventPayload, EventSink, SessionEvent, SessionKind, SessionOutcome};
pub use session::{
    SessionCommand, SessionError, SessionId, SessionRegistry, SessionSnapshot, SessionStatus,
};
pub use stats::{BatchStatsCollector, BatchStatsResult};
