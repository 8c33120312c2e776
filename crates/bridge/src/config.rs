//! Configuration loading and defaults.
//!
//! The bridge reads an optional TOML file from the platform config directory
//! (`<config_dir>/portside/config.toml`). A missing file is normal and falls
//! back to defaults; a malformed file is logged and ignored rather than
//! failing startup.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Tunables for the session bridge and the runtime adapter it drives.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Explicit engine socket path. When unset the default socket is probed,
    /// with a Colima fallback on macOS.
    #[serde(default)]
    pub socket_path: Option<String>,

    /// Trailing log lines replayed when a log session starts.
    #[serde(default = "default_log_tail")]
    pub log_tail: u32,

    /// Capacity of the bounded event channel between sessions and the sink.
    /// A full channel blocks producers; it never drops data.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Per-container deadline for one stats request, in milliseconds.
    #[serde(default = "default_stats_timeout_ms")]
    pub stats_timeout_ms: u64,

    /// How long `stop_all` waits for sessions to wind down before aborting
    /// stragglers, in milliseconds.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Default wait when launching the engine at startup, in seconds.
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn default_log_tail() -> u32 {
    100
}

fn default_event_capacity() -> usize {
    256
}

fn default_stats_timeout_ms() -> u64 {
    3_000
}

fn default_shutdown_grace_ms() -> u64 {
    2_000
}

fn default_startup_timeout_secs() -> u64 {
    120
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            log_tail: default_log_tail(),
            event_capacity: default_event_capacity(),
            stats_timeout_ms: default_stats_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            startup_timeout_secs: default_startup_timeout_secs(),
        }
    }
}

impl BridgeConfig {
    /// Path of the config file, when a platform config directory exists.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("portside").join("config.toml"))
    }

    /// Loads the config file, falling back to defaults when it is missing
    /// or malformed.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed config file");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn stats_timeout(&self) -> Duration {
        Duration::from_millis(self.stats_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sensible() {
        let config = BridgeConfig::default();
        assert_eq!(config.log_tail, 100);
        assert_eq!(config.event_capacity, 256);
        assert!(config.socket_path.is_none());
        assert_eq!(config.stats_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn parses_partial_file_with_defaults() {
        let config: BridgeConfig = toml::from_str(
            r#"
            log_tail = 500
            socket_path = "/run/user/1000/docker.sock"
            "#,
        )
        .unwrap();
        assert_eq!(config.log_tail, 500);
        assert_eq!(
            config.socket_path.as_deref(),
            Some("/run/user/1000/docker.sock")
        );
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn empty_file_parses_to_defaults() {
        let config: BridgeConfig = toml::from_str("").unwrap();
        assert_eq!(config.shutdown_grace(), Duration::from_millis(2_000));
    }

    #[test]
    fn malformed_values_are_an_error() {
        let result: Result<BridgeConfig, _> = toml::from_str("log_tail = \"many\"");
        assert!(result.is_err());
    }

    #[test]
    fn reads_config_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "stats_timeout_ms = 750").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let config: BridgeConfig = toml::from_str(&contents).unwrap();
        assert_eq!(config.stats_timeout(), Duration::from_millis(750));
    }
}
