//! Tauri IPC commands for Portside.
//!
//! Every command returns the same envelope: `{ success, data?, error? }`.
//! Failures ride inside the envelope as display strings, never as IPC-level
//! rejections, so the frontend handles one shape everywhere.
//!
//! Commands fall into four groups:
//! - Engine lifecycle (status, start, stop, readiness)
//! - One-shot resource queries and actions (containers, images, volumes,
//!   networks)
//! - Streaming sessions (logs, exec, pull) routed through the registry
//! - Batched container stats

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tauri::AppHandle;

use bridge::{
    BatchStatsCollector, BatchStatsResult, BridgeConfig, SessionCommand, SessionError, SessionKind,
    SessionRegistry, SessionSnapshot, SessionStatus,
};
use runtime::models::{ContainerSummary, ImageSummary, Network, Volume};
use runtime::{
    install_instructions, validate_ref, ContainerAction, DockerRuntime, EngineStatus,
    LogStreamOptions, RuntimeError, RuntimeLifecycle, TermSize,
};

use crate::events::TauriEventSink;

/// Uniform command envelope returned to the frontend.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> CommandResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Success with no payload (actions that only need an acknowledgement).
    pub fn ok_empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

impl<T> From<Result<T, RuntimeError>> for CommandResponse<T> {
    fn from(result: Result<T, RuntimeError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

/// Result alias for command handlers. The `Err` arm exists only to satisfy
/// the async command signature; failures are reported in the envelope.
pub type CommandResult<T> = Result<CommandResponse<T>, String>;

// ============================================================================
// Application State
// ============================================================================

/// Shared state managed by Tauri, built once at startup.
pub struct AppState {
    pub runtime: Arc<DockerRuntime>,
    pub registry: SessionRegistry<DockerRuntime>,
    pub collector: BatchStatsCollector<DockerRuntime>,
    pub config: BridgeConfig,
}

impl AppState {
    /// Wires the runtime adapter, session registry and stats collector to
    /// the app's event bus.
    pub fn new(app: &AppHandle) -> Self {
        let config = BridgeConfig::load_or_default();
        let runtime = Arc::new(DockerRuntime::new(config.socket_path.clone()));
        let sink = Arc::new(TauriEventSink::new(app.clone()));
        let registry = SessionRegistry::new(Arc::clone(&runtime), sink, &config);
        let collector = BatchStatsCollector::new(Arc::clone(&runtime), &config);

        Self {
            runtime,
            registry,
            collector,
            config,
        }
    }
}

// ============================================================================
// Engine Lifecycle Commands
// ============================================================================

#[tauri::command]
pub async fn engine_status(state: tauri::State<'_, AppState>) -> CommandResult<EngineStatus> {
    let lifecycle = RuntimeLifecycle::new(&state.runtime);
    Ok(CommandResponse::ok(lifecycle.status().await))
}

#[tauri::command]
pub async fn start_engine(state: tauri::State<'_, AppState>) -> CommandResult<()> {
    let lifecycle = RuntimeLifecycle::new(&state.runtime);
    Ok(lifecycle.start_engine().await.into())
}

/// Stops the engine when this process started it; a no-op otherwise.
#[tauri::command]
pub async fn stop_engine(state: tauri::State<'_, AppState>) -> CommandResult<()> {
    let lifecycle = RuntimeLifecycle::new(&state.runtime);
    Ok(lifecycle.stop_engine().await.into())
}

/// Blocks until the engine answers a ping, up to `timeout_secs` (or the
/// configured startup timeout when omitted).
#[tauri::command]
pub async fn wait_engine_ready(
    state: tauri::State<'_, AppState>,
    timeout_secs: Option<u64>,
) -> CommandResult<()> {
    let lifecycle = RuntimeLifecycle::new(&state.runtime);
    let timeout = timeout_secs
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| state.config.startup_timeout());
    Ok(lifecycle.wait_ready(timeout).await.into())
}

#[tauri::command]
pub fn engine_install_instructions() -> CommandResponse<String> {
    CommandResponse::ok(install_instructions())
}

#[tauri::command]
pub fn app_version() -> CommandResponse<String> {
    CommandResponse::ok(env!("CARGO_PKG_VERSION").to_string())
}

// ============================================================================
// Resource Commands
// ============================================================================

#[tauri::command]
pub async fn list_containers(
    state: tauri::State<'_, AppState>,
) -> CommandResult<Vec<ContainerSummary>> {
    Ok(state.runtime.list_containers().await.into())
}

#[tauri::command]
pub async fn container_action(
    state: tauri::State<'_, AppState>,
    container_id: String,
    action: ContainerAction,
) -> CommandResult<()> {
    if let Err(e) = validate_ref(&container_id) {
        return Ok(CommandResponse::err(e.to_string()));
    }
    Ok(state
        .runtime
        .container_action(&container_id, action)
        .await
        .into())
}

#[tauri::command]
pub async fn list_images(state: tauri::State<'_, AppState>) -> CommandResult<Vec<ImageSummary>> {
    Ok(state.runtime.list_images().await.into())
}

#[tauri::command]
pub async fn remove_image(
    state: tauri::State<'_, AppState>,
    image_id: String,
) -> CommandResult<()> {
    if let Err(e) = validate_ref(&image_id) {
        return Ok(CommandResponse::err(e.to_string()));
    }
    Ok(state.runtime.remove_image(&image_id).await.into())
}

#[tauri::command]
pub async fn list_volumes(state: tauri::State<'_, AppState>) -> CommandResult<Vec<Volume>> {
    Ok(state.runtime.list_volumes().await.into())
}

#[tauri::command]
pub async fn remove_volume(
    state: tauri::State<'_, AppState>,
    volume_name: String,
) -> CommandResult<()> {
    if let Err(e) = validate_ref(&volume_name) {
        return Ok(CommandResponse::err(e.to_string()));
    }
    Ok(state.runtime.remove_volume(&volume_name).await.into())
}

#[tauri::command]
pub async fn list_networks(state: tauri::State<'_, AppState>) -> CommandResult<Vec<Network>> {
    Ok(state.runtime.list_networks().await.into())
}

// ============================================================================
// Session Commands
// ============================================================================

fn session_response(result: Result<String, SessionError>) -> CommandResponse<String> {
    match result {
        Ok(id) => CommandResponse::ok(id),
        Err(e) => CommandResponse::err(e.to_string()),
    }
}

/// Starts streaming a container's logs. Returns the session ID; output
/// arrives on the `logs-{session_id}` event channel.
#[tauri::command]
pub async fn start_log_session(
    state: tauri::State<'_, AppState>,
    container_id: String,
    session_id: Option<String>,
    timestamps: Option<bool>,
    tail: Option<u32>,
) -> CommandResult<String> {
    if let Err(e) = validate_ref(&container_id) {
        return Ok(CommandResponse::err(e.to_string()));
    }
    let options = LogStreamOptions {
        timestamps: timestamps.unwrap_or(false),
        tail: tail.unwrap_or(state.config.log_tail),
    };
    Ok(session_response(state.registry.start_logs(
        session_id,
        &container_id,
        options,
    )))
}

/// Opens an interactive shell in a running container. Output arrives on
/// `exec-{session_id}`; input goes through [`write_session`].
#[tauri::command]
pub async fn start_exec_session(
    state: tauri::State<'_, AppState>,
    container_id: String,
    session_id: Option<String>,
    cols: u16,
    rows: u16,
) -> CommandResult<String> {
    if let Err(e) = validate_ref(&container_id) {
        return Ok(CommandResponse::err(e.to_string()));
    }
    Ok(session_response(state.registry.start_exec(
        session_id,
        &container_id,
        TermSize { cols, rows },
    )))
}

/// Starts pulling an image. Progress records arrive on `pull-{session_id}`.
#[tauri::command]
pub async fn start_pull_session(
    state: tauri::State<'_, AppState>,
    reference: String,
    session_id: Option<String>,
) -> CommandResult<String> {
    if let Err(e) = validate_ref(&reference) {
        return Ok(CommandResponse::err(e.to_string()));
    }
    Ok(session_response(
        state.registry.start_pull(session_id, &reference),
    ))
}

/// Forwards keystrokes to an exec session's pty.
#[tauri::command]
pub async fn write_session(
    state: tauri::State<'_, AppState>,
    session_id: String,
    data: String,
) -> CommandResult<()> {
    let result = state
        .registry
        .command(&session_id, SessionCommand::Write(Bytes::from(data)))
        .await;
    Ok(match result {
        Ok(()) => CommandResponse::ok_empty(),
        Err(e) => CommandResponse::err(e.to_string()),
    })
}

/// Propagates new terminal dimensions to an exec session's pty.
#[tauri::command]
pub async fn resize_session(
    state: tauri::State<'_, AppState>,
    session_id: String,
    cols: u16,
    rows: u16,
) -> CommandResult<()> {
    let result = state
        .registry
        .command(
            &session_id,
            SessionCommand::Resize(TermSize { cols, rows }),
        )
        .await;
    Ok(match result {
        Ok(()) => CommandResponse::ok_empty(),
        Err(e) => CommandResponse::err(e.to_string()),
    })
}

/// Stops a session. Stopping a session that already finished is not an
/// error: the UI closing a tab races the stream ending on its own.
#[tauri::command]
pub async fn stop_session(
    state: tauri::State<'_, AppState>,
    session_id: String,
) -> CommandResult<()> {
    Ok(match state.registry.stop(&session_id) {
        Ok(()) | Err(SessionError::NotFound(_)) => CommandResponse::ok_empty(),
        Err(e) => CommandResponse::err(e.to_string()),
    })
}

/// One live session, as reported to the frontend.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub kind: SessionKind,
    pub target: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub age_secs: u64,
}

impl From<SessionSnapshot> for SessionInfo {
    fn from(snapshot: SessionSnapshot) -> Self {
        let (status, error) = match snapshot.status {
            SessionStatus::Starting => ("starting", None),
            SessionStatus::Active => ("active", None),
            SessionStatus::Cancelled => ("cancelled", None),
            SessionStatus::Completed => ("completed", None),
            SessionStatus::Failed(reason) => ("failed", Some(reason)),
        };
        Self {
            id: snapshot.id,
            kind: snapshot.kind,
            target: snapshot.target,
            status: status.to_string(),
            error,
            age_secs: snapshot.created_at.elapsed().as_secs(),
        }
    }
}

#[tauri::command]
pub async fn list_sessions(state: tauri::State<'_, AppState>) -> CommandResult<Vec<SessionInfo>> {
    let sessions = state
        .registry
        .snapshot()
        .into_iter()
        .map(SessionInfo::from)
        .collect();
    Ok(CommandResponse::ok(sessions))
}

// ============================================================================
// Stats Commands
// ============================================================================

/// Samples usage for the given containers in one concurrent batch. Each
/// entry succeeds or fails on its own.
#[tauri::command]
pub async fn collect_container_stats(
    state: tauri::State<'_, AppState>,
    container_ids: Vec<String>,
) -> CommandResult<Vec<BatchStatsResult>> {
    Ok(CommandResponse::ok(
        state.collector.collect(&container_ids).await,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_with_data_has_no_error_field() {
        let response = CommandResponse::ok(vec!["a", "b"]);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"][1], "b");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn envelope_with_error_has_no_data_field() {
        let response: CommandResponse<String> = CommandResponse::err("not found: abc");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "not found: abc");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn empty_success_is_just_the_flag() {
        let response: CommandResponse<()> = CommandResponse::ok_empty();
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"success":true}"#);
    }

    #[test]
    fn runtime_errors_convert_into_the_envelope() {
        let result: Result<(), RuntimeError> =
            Err(RuntimeError::Unavailable("socket missing".to_string()));
        let response = CommandResponse::from(result);
        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("runtime unavailable: socket missing")
        );
    }

    #[test]
    fn session_info_flattens_failure_reason() {
        let snapshot = SessionSnapshot {
            id: "s1".to_string(),
            kind: SessionKind::Log,
            target: "web".to_string(),
            status: SessionStatus::Failed("stream reset".to_string()),
            created_at: std::time::Instant::now(),
        };
        let info = SessionInfo::from(snapshot);
        assert_eq!(info.status, "failed");
        assert_eq!(info.error.as_deref(), Some("stream reset"));
    }
}
