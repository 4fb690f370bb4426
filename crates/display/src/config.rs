//! Display configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BARBERBOARD_REMOTE_URL` - Base URL of the Barberboard server
//!
//! ## Optional
//! - `BARBERBOARD_DATA_DIR` - Local cache directory (default: ./barberboard-data)
//! - `BARBERBOARD_ADMIN_TOKEN` - Admin token sent with remote writes
//! - `BARBERBOARD_POLL_INTERVAL_SECS` - Version poll cadence (default: 3)
//! - `BARBERBOARD_RELOAD_DEBOUNCE_SECS` - Minimum gap between debounced reloads (default: 30)
//! - `BARBERBOARD_BROADCAST_RELOAD_DELAY_MS` - Delay before a force-update reload (default: 1000)
//! - `BARBERBOARD_FORCE_UPDATE_DEBOUNCE_MS` - Batching window for force-update broadcasts (default: 100)
//! - `BARBERBOARD_NOTIFY_REMOTE_FAILURES` - Emit a warning notice when a remote push fails (default: false)

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Default cadence of the timed version poll.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Records are re-pulled when the `lastSystemUpdate` marker is older than this.
pub const DEFAULT_COARSE_REFRESH_AFTER: Duration = Duration::from_secs(10);
/// Minimum gap between explicit `check_for_updates` pulls.
pub const DEFAULT_UPDATE_CHECK_GATE: Duration = Duration::from_secs(30);
/// Minimum gap between debounced full reloads.
pub const DEFAULT_RELOAD_DEBOUNCE: Duration = Duration::from_secs(30);
/// Delay between receiving a force-update broadcast and reloading.
pub const DEFAULT_BROADCAST_RELOAD_DELAY: Duration = Duration::from_secs(1);
/// Trailing window that batches rapid mutations into one broadcast.
pub const DEFAULT_FORCE_UPDATE_DEBOUNCE: Duration = Duration::from_millis(100);
/// Cadence of the periodic board-snapshot save.
pub const DEFAULT_BOARD_AUTOSAVE: Duration = Duration::from_secs(30);

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Display synchronization configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the remote store; `None` for embedded in-process stores.
    pub remote_url: Option<Url>,
    /// Directory backing the local key-value cache.
    pub data_dir: PathBuf,
    /// Admin token attached to remote writes.
    pub admin_token: Option<SecretString>,
    /// Cadence of the timed version poll (and of HTTP subscriptions).
    pub poll_interval: Duration,
    /// Re-pull records when `lastSystemUpdate` is older than this.
    pub coarse_refresh_after: Duration,
    /// Minimum gap between explicit update checks.
    pub update_check_gate: Duration,
    /// Minimum gap between debounced full reloads.
    pub reload_debounce: Duration,
    /// Delay before the reload that follows a force-update broadcast.
    pub broadcast_reload_delay: Duration,
    /// Trailing window batching rapid mutations into one broadcast.
    pub force_update_debounce: Duration,
    /// Cadence of the periodic board-snapshot save.
    pub board_autosave: Duration,
    /// Emit a warning notice when a remote push fails. Off by default: the
    /// legacy behavior notifies success as soon as the local save lands.
    pub notify_on_remote_failures: bool,
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `BARBERBOARD_REMOTE_URL` is missing or any
    /// variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let remote_url = get_required_env("BARBERBOARD_REMOTE_URL")?
            .parse::<Url>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("BARBERBOARD_REMOTE_URL".to_string(), e.to_string())
            })?;
        let data_dir =
            PathBuf::from(get_env_or_default("BARBERBOARD_DATA_DIR", "./barberboard-data"));
        let admin_token = get_optional_env("BARBERBOARD_ADMIN_TOKEN").map(SecretString::from);

        let poll_interval = get_duration_secs("BARBERBOARD_POLL_INTERVAL_SECS", 3)?;
        let reload_debounce = get_duration_secs("BARBERBOARD_RELOAD_DEBOUNCE_SECS", 30)?;
        let broadcast_reload_delay =
            get_duration_millis("BARBERBOARD_BROADCAST_RELOAD_DELAY_MS", 1000)?;
        let force_update_debounce =
            get_duration_millis("BARBERBOARD_FORCE_UPDATE_DEBOUNCE_MS", 100)?;
        let notify_on_remote_failures = get_bool_env("BARBERBOARD_NOTIFY_REMOTE_FAILURES", false)?;

        Ok(Self {
            remote_url: Some(remote_url),
            data_dir,
            admin_token,
            poll_interval,
            coarse_refresh_after: DEFAULT_COARSE_REFRESH_AFTER,
            update_check_gate: DEFAULT_UPDATE_CHECK_GATE,
            reload_debounce,
            broadcast_reload_delay,
            force_update_debounce,
            board_autosave: DEFAULT_BOARD_AUTOSAVE,
            notify_on_remote_failures,
        })
    }

    /// Configuration for an embedded deployment with no remote URL: all
    /// timings at their defaults, local cache under `data_dir`.
    #[must_use]
    pub fn embedded(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            remote_url: None,
            data_dir: data_dir.into(),
            admin_token: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            coarse_refresh_after: DEFAULT_COARSE_REFRESH_AFTER,
            update_check_gate: DEFAULT_UPDATE_CHECK_GATE,
            reload_debounce: DEFAULT_RELOAD_DEBOUNCE,
            broadcast_reload_delay: DEFAULT_BROADCAST_RELOAD_DELAY,
            force_update_debounce: DEFAULT_FORCE_UPDATE_DEBOUNCE,
            board_autosave: DEFAULT_BOARD_AUTOSAVE,
            notify_on_remote_failures: false,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_duration_secs(key: &str, default: u64) -> Result<Duration, ConfigError> {
    parse_duration(key, default, Duration::from_secs)
}

fn get_duration_millis(key: &str, default: u64) -> Result<Duration, ConfigError> {
    parse_duration(key, default, Duration::from_millis)
}

fn parse_duration(
    key: &str,
    default: u64,
    build: fn(u64) -> Duration,
) -> Result<Duration, ConfigError> {
    let raw = get_env_or_default(key, &default.to_string());
    let value = raw
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if value == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(build(value))
}

fn get_bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.to_lowercase().as_str() {
            "1" | "true" => Ok(true),
            "0" | "false" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("expected a boolean, got '{other}'"),
            )),
        },
    }
}
