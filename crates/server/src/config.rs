//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `BARBERBOARD_SERVER_HOST` - Bind address (default: 0.0.0.0)
//! - `BARBERBOARD_SERVER_PORT` - Bind port (default: 8001)
//! - `BARBERBOARD_SERVER_DATA_DIR` - Record storage directory (default: ./data)
//! - `BARBERBOARD_ADMIN_TOKEN` - Installed as the admin token at startup
//!   when the store has none yet

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;

/// The port the legacy server listened on.
pub const DEFAULT_PORT: u16 = 8001;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Directory the record files live in.
    pub data_dir: PathBuf,
    /// Seeded into the store at startup if no token is set yet; rotation
    /// afterwards goes through `POST /api/admin-token`.
    pub admin_token: Option<SecretString>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the host or port fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("BARBERBOARD_SERVER_HOST", "0.0.0.0")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("BARBERBOARD_SERVER_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("BARBERBOARD_SERVER_PORT", &DEFAULT_PORT.to_string())
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("BARBERBOARD_SERVER_PORT".to_string(), e.to_string())
            })?;
        let data_dir = PathBuf::from(get_env_or_default("BARBERBOARD_SERVER_DATA_DIR", "./data"));
        let admin_token = std::env::var("BARBERBOARD_ADMIN_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())
            .map(SecretString::from);

        Ok(Self {
            host,
            port,
            data_dir,
            admin_token,
        })
    }

    /// The socket address to bind.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_socket_addr_combines_host_and_port() {
        let config = ServerConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 9000,
            data_dir: PathBuf::from("/tmp/data"),
            admin_token: None,
        };
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn test_default_applies_when_unset() {
        assert_eq!(
            get_env_or_default("BARBERBOARD_TEST_UNSET_KEY", "fallback"),
            "fallback"
        );
    }
}
