//! Synchronization configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::registry::{DEFAULT_WINDOW_SIZE, MAX_WINDOW_SIZE};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/standings.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "NEON_BEAT_STANDINGS_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable tuning knobs of the standings synchronization.
pub struct SyncConfig {
    /// Number of participants kept in the ranked window.
    pub window_size: usize,
    /// Quiet period applied to repeated events for the same participant.
    pub per_identity_debounce: Duration,
    /// Quiet period applied across all participants.
    pub global_debounce: Duration,
    /// Time after which an in-flight fetch is considered failed.
    pub fetch_timeout: Duration,
    /// Polling interval used while the push feed is unavailable.
    pub fallback_refresh_interval: Duration,
}

impl SyncConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        window_size = config.window_size,
                        "loaded standings sync config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    window_size: usize,
    per_identity_debounce_ms: u64,
    global_debounce_ms: u64,
    fetch_timeout_ms: u64,
    fallback_refresh_interval_ms: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            per_identity_debounce_ms: 1_000,
            global_debounce_ms: 2_000,
            fetch_timeout_ms: 10_000,
            fallback_refresh_interval_ms: 30_000,
        }
    }
}

impl From<RawConfig> for SyncConfig {
    fn from(value: RawConfig) -> Self {
        let window_size = value.window_size.clamp(1, MAX_WINDOW_SIZE);
        if window_size != value.window_size {
            warn!(
                requested = value.window_size,
                applied = window_size,
                "window size out of range; clamping"
            );
        }

        Self {
            window_size,
            per_identity_debounce: Duration::from_millis(value.per_identity_debounce_ms),
            global_debounce: Duration::from_millis(value.global_debounce_ms),
            fetch_timeout: Duration::from_millis(value.fetch_timeout_ms.max(1)),
            fallback_refresh_interval: Duration::from_millis(
                value.fallback_refresh_interval_ms.max(1),
            ),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SyncConfig::default();
        assert_eq!(config.window_size, 10);
        assert_eq!(config.per_identity_debounce, Duration::from_millis(1_000));
        assert_eq!(config.global_debounce, Duration::from_millis(2_000));
        assert_eq!(config.fetch_timeout, Duration::from_millis(10_000));
        assert_eq!(config.fallback_refresh_interval, Duration::from_millis(30_000));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let raw: RawConfig = serde_json::from_str(r#"{"window_size": 25}"#).unwrap();
        let config = SyncConfig::from(raw);
        assert_eq!(config.window_size, 25);
        assert_eq!(config.global_debounce, Duration::from_millis(2_000));
    }

    #[test]
    fn window_size_is_clamped() {
        let raw: RawConfig = serde_json::from_str(r#"{"window_size": 200}"#).unwrap();
        assert_eq!(SyncConfig::from(raw).window_size, 50);

        let raw: RawConfig = serde_json::from_str(r#"{"window_size": 0}"#).unwrap();
        assert_eq!(SyncConfig::from(raw).window_size, 1);
    }
}
