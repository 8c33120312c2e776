//! # Portside Tauri Client Library
//!
//! Backend for the Portside desktop app: exposes the container runtime and
//! session bridge to the webview through Tauri IPC commands and events.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Webview Frontend                     │
//! ├──────────────────────────────────────────────────────────┤
//! │   IPC commands (this crate)   │   per-session events     │
//! ├──────────────────────────────────────────────────────────┤
//! │        bridge: registry, sessions, stats batching        │
//! ├──────────────────────────────────────────────────────────┤
//! │          runtime: bollard adapter, lifecycle             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The app shell calls [`init`] in its setup hook and [`shutdown`] when the
//! process exits; everything else happens through the registered commands.

pub mod commands;
pub mod events;

pub use commands::{AppState, CommandResponse, CommandResult, SessionInfo};
pub use events::{ClosedNotice, TauriEventSink};

use tauri::Manager;

/// Builds the shared state and hands it to Tauri. Call once from the app's
/// setup hook.
///
/// The registry spawns its event dispatcher task during construction, so
/// state is built inside the async runtime; the setup hook itself runs on
/// the main thread outside any runtime context.
pub fn init(app: &tauri::AppHandle) {
    let state = tauri::async_runtime::block_on({
        let app = app.clone();
        async move { AppState::new(&app) }
    });
    app.manage(state);
}

/// Tears down every live session before the process exits, releasing the
/// engine attachments they hold, and stops the engine when this process
/// started it.
pub fn shutdown(app: &tauri::AppHandle) {
    if let Some(state) = app.try_state::<AppState>() {
        tauri::async_runtime::block_on(async {
            state.registry.stop_all().await;
            if runtime::did_we_start_engine() {
                let lifecycle = runtime::RuntimeLifecycle::new(&state.runtime);
                if let Err(e) = lifecycle.stop_engine().await {
                    tracing::warn!(error = %e, "Failed to stop engine on exit");
                }
            }
        });
    }
}

/// Generate the Tauri command handler with all registered commands.
///
/// # Example
///
/// ```rust,ignore
/// tauri::Builder::default()
///     .invoke_handler(tauri_client::generate_handler!())
///     .run(tauri::generate_context!())
///     .expect("error while running tauri application");
/// ```
#[macro_export]
macro_rules! generate_handler {
    () => {
        tauri::generate_handler![
            $crate::commands::engine_status,
            $crate::commands::start_engine,
            $crate::commands::stop_engine,
            $crate::commands::wait_engine_ready,
            $crate::commands::engine_install_instructions,
            $crate::commands::app_version,
            $crate::commands::list_containers,
            $crate::commands::container_action,
            $crate::commands::list_images,
            $crate::commands::remove_image,
            $crate::commands::list_volumes,
            $crate::commands::remove_volume,
            $crate::commands::list_networks,
            $crate::commands::start_log_session,
            $crate::commands::start_exec_session,
            $crate::commands::start_pull_session,
            $crate::commands::write_session,
            $crate::commands::resize_session,
            $crate::commands::stop_session,
            $crate::commands::list_sessions,
            $crate::commands::collect_container_stats,
        ]
    };
}
