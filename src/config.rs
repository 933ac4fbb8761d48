//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub local_store: LocalStoreConfig,
    pub monitor: MonitorConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 3001)
    pub port: u16,
}

impl ServerConfig {
    /// Get the base URL clients should use to reach this server
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Local fallback store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LocalStoreConfig {
    /// Path to the JSON snapshot file.
    ///
    /// Defaults to `festboard.json` in the platform data directory.
    pub path: Option<PathBuf>,
    /// Soft quota for the snapshot, in bytes
    pub quota_bytes: u64,
}

/// Connection monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between health probes (default: 30)
    pub interval_seconds: u64,
    /// Health probe timeout in seconds (default: 5)
    pub probe_timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (FESTBOARD_*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3001)?
            .set_default("database.path", "data/festboard.db")?
            .set_default("local_store.quota_bytes", 5 * 1024 * 1024)?
            .set_default("monitor.interval_seconds", 30)?
            .set_default("monitor.probe_timeout_seconds", 5)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (FESTBOARD_*)
            .add_source(
                Environment::with_prefix("FESTBOARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.monitor.interval_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "monitor.interval_seconds must be greater than 0".to_string(),
            ));
        }

        if self.monitor.probe_timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "monitor.probe_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.local_store.quota_bytes == 0 {
            return Err(crate::error::AppError::Config(
                "local_store.quota_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
