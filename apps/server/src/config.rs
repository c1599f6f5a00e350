//! Server configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,

    /// Path to the SQLite database file
    pub database_path: String,

    /// Idle hint (milliseconds) sent with standby responses; the firmware
    /// sleeps this long before polling again
    pub standby_idle_ms: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ServerConfig {
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("HTTP_PORT".to_string()))?,

            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "barkeep.db".to_string()),

            standby_idle_ms: env::var("STANDBY_IDLE_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("STANDBY_IDLE_MS".to_string()))?,
        };

        Ok(config)
    }
}

impl Default for ServerConfig {
    /// Defaults used by tests; `load()` is the production path.
    fn default() -> Self {
        ServerConfig {
            http_port: 3000,
            database_path: "barkeep.db".to_string(),
            standby_idle_ms: 1000,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.http_port, 3000);
        assert_eq!(config.standby_idle_ms, 1000);
    }
}
