//! Runtime configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::store::{StoreError, StoreResult};

/// Environment variable overriding the database path.
pub const DB_PATH_ENV: &str = "CONVERSATION_STORE_DB_PATH";
/// Environment variable overriding the listen port.
pub const PORT_ENV: &str = "CONVERSATION_STORE_PORT";
/// Generic port variable used when [`PORT_ENV`] is unset.
pub const FALLBACK_PORT_ENV: &str = "PORT";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage settings.
    pub storage: StorageConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

impl AppConfig {
    /// Build a configuration from defaults overridden by environment variables.
    ///
    /// Unparsable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup(DB_PATH_ENV).filter(|p| !p.trim().is_empty()) {
            config.storage.sqlite_path = PathBuf::from(path);
        }

        if let Some(port) = lookup(PORT_ENV)
            .or_else(|| lookup(FALLBACK_PORT_ENV))
            .and_then(|p| p.trim().parse().ok())
        {
            config.server.port = port;
        }

        config
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> StoreResult<()> {
        if self.storage.sqlite_path.as_os_str().is_empty() {
            return Err(StoreError::InvalidInput(
                "storage.sqlite_path must not be empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(StoreError::InvalidInput(
                "server.port must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database path. Parent directories are created on demand.
    pub sqlite_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/conversations.db"),
        }
    }
}

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3001 }
    }
}
