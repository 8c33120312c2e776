//! Engine lifecycle management.
//!
//! Starting and stopping the container engine is a host concern, not an API
//! concern: on macOS the engine runs inside a Colima VM, on Linux it is a
//! systemd unit. The rule throughout is that quitting the application only
//! stops an engine this process started.

use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::sleep;

use crate::client::DockerRuntime;
use crate::error::{Result, RuntimeError};

/// Set when this process launched the engine, checked on quit.
static WE_STARTED_ENGINE: AtomicBool = AtomicBool::new(false);

/// Guards against concurrent start attempts.
static START_IN_PROGRESS: AtomicBool = AtomicBool::new(false);

/// Poll cadence while waiting for the engine to come up.
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Snapshot of the engine's lifecycle state.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub provider_installed: bool,
    pub we_started: bool,
}

/// Lifecycle operations bound to a runtime client.
pub struct RuntimeLifecycle<'a> {
    runtime: &'a DockerRuntime,
}

impl<'a> RuntimeLifecycle<'a> {
    pub fn new(runtime: &'a DockerRuntime) -> Self {
        Self { runtime }
    }

    /// Checks whether the engine daemon answers a ping.
    pub async fn check_running(&self) -> bool {
        self.runtime.ping().await.is_ok()
    }

    /// Starts the engine. Spawns the provider and returns immediately; use
    /// [`Self::wait_ready`] to block until the daemon answers.
    pub async fn start_engine(&self) -> Result<()> {
        if START_IN_PROGRESS
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::info!("Engine start already in progress, skipping duplicate call");
            return Ok(());
        }

        if WE_STARTED_ENGINE.load(Ordering::SeqCst) {
            START_IN_PROGRESS.store(false, Ordering::SeqCst);
            return Ok(());
        }

        let result = start_provider();
        START_IN_PROGRESS.store(false, Ordering::SeqCst);
        result
    }

    /// Stops the engine, but only when this process started it.
    pub async fn stop_engine(&self) -> Result<()> {
        if !WE_STARTED_ENGINE.load(Ordering::SeqCst) {
            return Ok(());
        }
        stop_provider()?;
        WE_STARTED_ENGINE.store(false, Ordering::SeqCst);
        self.runtime.invalidate();
        Ok(())
    }

    /// Waits for the engine to answer, polling until the caller-supplied
    /// timeout elapses. A timeout surfaces as [`RuntimeError::TimedOut`],
    /// distinct from other failures.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.check_running().await {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(RuntimeError::TimedOut(format!(
                    "engine did not become ready within {timeout:?}"
                )));
            }
            // Never sleep past the deadline; timeouts shorter than the poll
            // interval still get honored.
            sleep(READY_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Aggregate status for the UI.
    pub async fn status(&self) -> EngineStatus {
        EngineStatus {
            running: self.check_running().await,
            provider_installed: provider_installed(),
            we_started: WE_STARTED_ENGINE.load(Ordering::SeqCst),
        }
    }
}

/// Whether this process launched the engine (quit behavior hinges on this).
pub fn did_we_start_engine() -> bool {
    WE_STARTED_ENGINE.load(Ordering::SeqCst)
}

/// Checks whether an engine provider is installed on this host.
pub fn provider_installed() -> bool {
    #[cfg(target_os = "macos")]
    {
        Command::new("which")
            .arg("colima")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[cfg(target_os = "linux")]
    {
        Command::new("which")
            .arg("docker")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        false
    }
}

/// Installation guidance for the current platform.
pub fn install_instructions() -> String {
    #[cfg(target_os = "macos")]
    {
        "Install Colima and the Docker CLI:\n\nbrew install colima docker\n\nPortside will manage Colima automatically.".to_string()
    }

    #[cfg(target_os = "linux")]
    {
        "Install Docker Engine:\n\nhttps://docs.docker.com/engine/install/".to_string()
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        "This platform is not supported yet.".to_string()
    }
}

#[cfg(target_os = "macos")]
fn start_provider() -> Result<()> {
    // Already running means someone else manages it; leave it alone.
    if let Ok(output) = Command::new("colima").arg("status").output() {
        if output.status.success() {
            return Ok(());
        }
    }

    // colima start can take minutes on first run (VM image download), so
    // spawn it and let wait_ready poll for the daemon.
    let child = Command::new("colima")
        .args(["start", "--cpu", "2", "--memory", "4", "--disk", "60"])
        .spawn()
        .map_err(|e| RuntimeError::Unavailable(format!("failed to start Colima: {e}")))?;

    WE_STARTED_ENGINE.store(true, Ordering::SeqCst);
    tracing::info!(pid = ?child.id(), "Colima start spawned");
    Ok(())
}

#[cfg(target_os = "macos")]
fn stop_provider() -> Result<()> {
    let output = Command::new("colima")
        .arg("stop")
        .output()
        .map_err(|e| RuntimeError::Unavailable(format!("failed to stop Colima: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.contains("not running") {
            return Err(RuntimeError::Upstream(format!(
                "failed to stop Colima: {stderr}"
            )));
        }
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn start_provider() -> Result<()> {
    let output = Command::new("systemctl")
        .args(["start", "docker"])
        .output()
        .map_err(|e| RuntimeError::Unavailable(format!("failed to start engine: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RuntimeError::Upstream(format!(
            "failed to start engine: {stderr}"
        )));
    }

    WE_STARTED_ENGINE.store(true, Ordering::SeqCst);
    Ok(())
}

#[cfg(target_os = "linux")]
fn stop_provider() -> Result<()> {
    let output = Command::new("systemctl")
        .args(["stop", "docker"])
        .output()
        .map_err(|e| RuntimeError::Unavailable(format!("failed to stop engine: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RuntimeError::Upstream(format!(
            "failed to stop engine: {stderr}"
        )));
    }
    Ok(())
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn start_provider() -> Result<()> {
    Err(RuntimeError::Unavailable(
        "engine management is not supported on this platform".to_string(),
    ))
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn stop_provider() -> Result<()> {
    Err(RuntimeError::Unavailable(
        "engine management is not supported on this platform".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_instructions_mention_a_provider() {
        let instructions = install_instructions();
        assert!(!instructions.is_empty());
    }

    #[tokio::test]
    async fn wait_ready_times_out_without_engine() {
        let runtime = DockerRuntime::new(Some("/nonexistent/socket".to_string()));
        let lifecycle = RuntimeLifecycle::new(&runtime);
        let result = lifecycle.wait_ready(Duration::from_secs(2)).await;
        assert!(matches!(result, Err(RuntimeError::TimedOut(_))));
    }

    #[tokio::test]
    async fn wait_ready_brackets_the_requested_timeout() {
        let runtime = DockerRuntime::new(Some("/nonexistent/socket".to_string()));
        let lifecycle = RuntimeLifecycle::new(&runtime);

        // Shorter than one poll interval: the wait must still last the full
        // requested timeout, and not a whole interval more.
        let started = Instant::now();
        let result = lifecycle.wait_ready(Duration::from_millis(500)).await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(RuntimeError::TimedOut(_))));
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < READY_POLL_INTERVAL);
    }
}
