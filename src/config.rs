use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::core::{DataSphereError, Result};
use crate::services::storage::DEFAULT_SESSION_CAPACITY;

/// Runtime configuration for the DataSphere server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Path of the SQLite user database (`:memory:` for an ephemeral one)
    pub database_path: String,
    /// Directory where session storage is mirrored (in-memory only when unset)
    pub storage_dir: Option<PathBuf>,
    /// Sessions whose storage is kept in memory
    pub session_capacity: usize,
    /// Directory served under `/static`
    pub static_dir: String,
    /// Sandbox settings
    pub sandbox: SandboxConfig,
}

/// Limits applied to the per-session SQL sandboxes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Maximum number of live sandboxes before the least recently used is dropped
    pub capacity: usize,
    /// Maximum rows kept per result set
    pub max_rows: usize,
    /// Execution budget per run in milliseconds
    pub timeout_ms: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            max_rows: 500,
            timeout_ms: 2000,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            database_path: "datasphere.db".to_string(),
            storage_dir: None,
            session_capacity: DEFAULT_SESSION_CAPACITY,
            static_dir: "./src/web/static".to_string(),
            sandbox: SandboxConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load the configuration from `DATASPHERE_*` / `DATABASE_URL` variables
    pub fn from_env() -> Result<Self> {
        let defaults = AppConfig::default();
        let sandbox_defaults = SandboxConfig::default();

        let config = Self {
            bind_address: try_load("DATASPHERE_BIND", defaults.bind_address)?,
            database_path: try_load("DATABASE_URL", defaults.database_path)?,
            storage_dir: env::var("DATASPHERE_STORAGE_DIR").ok().map(PathBuf::from),
            session_capacity: try_load("DATASPHERE_SESSION_CAPACITY", defaults.session_capacity)?,
            static_dir: try_load("DATASPHERE_STATIC_DIR", defaults.static_dir)?,
            sandbox: SandboxConfig {
                capacity: try_load("DATASPHERE_SANDBOX_CAPACITY", sandbox_defaults.capacity)?,
                max_rows: try_load("DATASPHERE_SANDBOX_MAX_ROWS", sandbox_defaults.max_rows)?,
                timeout_ms: try_load("DATASPHERE_SANDBOX_TIMEOUT_MS", sandbox_defaults.timeout_ms)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.session_capacity == 0 {
            return Err(DataSphereError::ConfigError(
                "DATASPHERE_SESSION_CAPACITY must be at least 1".to_string(),
            ));
        }
        if self.sandbox.capacity == 0 {
            return Err(DataSphereError::ConfigError(
                "DATASPHERE_SANDBOX_CAPACITY must be at least 1".to_string(),
            ));
        }
        if self.sandbox.max_rows == 0 {
            return Err(DataSphereError::ConfigError(
                "DATASPHERE_SANDBOX_MAX_ROWS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn try_load<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            DataSphereError::ConfigError(format!("invalid value for {key}: {e}"))
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert_eq!(config.sandbox.capacity, 64);
        assert!(config.storage_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = AppConfig::default();
        config.sandbox.capacity = 0;
        assert!(matches!(config.validate(), Err(DataSphereError::ConfigError(_))));

        let mut config = AppConfig::default();
        config.session_capacity = 0;
        assert!(matches!(config.validate(), Err(DataSphereError::ConfigError(_))));
    }

    #[test]
    fn test_try_load_parses_and_rejects() {
        env::set_var("DATASPHERE_TEST_ROWS", "42");
        assert_eq!(try_load("DATASPHERE_TEST_ROWS", 7usize).unwrap(), 42);

        env::set_var("DATASPHERE_TEST_ROWS_BAD", "many");
        assert!(try_load("DATASPHERE_TEST_ROWS_BAD", 7usize).is_err());

        assert_eq!(try_load("DATASPHERE_TEST_UNSET_KEY", 7usize).unwrap(), 7);
    }
}
