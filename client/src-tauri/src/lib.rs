//! Portside Tauri Application Shell
//!
//! Thin wiring layer: installs logging, registers the tauri-client command
//! surface and tears the session bridge down on exit.

/// Configure and run the Tauri application
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .try_init();

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            #[cfg(debug_assertions)]
            {
                use tauri::Manager;
                if let Some(window) = app.get_webview_window("main") {
                    window.open_devtools();
                }
            }
            tauri_client::init(app.handle());
            Ok(())
        })
        .invoke_handler(tauri_client::generate_handler!())
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| {
            // Sessions hold live engine attachments; release them before the
            // process goes away.
            if let tauri::RunEvent::ExitRequested { .. } = event {
                tauri_client::shutdown(app);
            }
        });
}
