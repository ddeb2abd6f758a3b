//! Directory configuration from TOML and environment.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Environment variable overriding [`DirectoryConfig::database_path`].
pub const DATABASE_PATH_ENV: &str = "DATABASE_PATH";

/// Environment variable overriding [`DirectoryConfig::log_filter`].
pub const LOG_FILTER_ENV: &str = "USERDIR_LOG";

/// Runtime configuration for the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    database_path: String,

    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    log_filter: String,

    /// Apply pending migrations on startup.
    #[serde(default = "default_run_migrations")]
    run_migrations: bool,
}

fn default_database_path() -> String {
    "user_directory.db".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_run_migrations() -> bool {
    true
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_filter: default_log_filter(),
            run_migrations: default_run_migrations(),
        }
    }
}

impl DirectoryConfig {
    /// Parses configuration from TOML text. Missing keys take their defaults.
    #[instrument(skip(content))]
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))
    }

    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_toml_str(&content)?;
        info!(database_path = %config.database_path, "Config loaded successfully");
        Ok(config)
    }

    /// Applies `DATABASE_PATH` and `USERDIR_LOG` from the process environment.
    #[instrument(skip(self))]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(DATABASE_PATH_ENV).ok(),
            std::env::var(LOG_FILTER_ENV).ok(),
        )
    }

    /// Replaces the database path and log filter when given.
    #[instrument(skip(self))]
    pub fn with_overrides(mut self, database_path: Option<String>, log_filter: Option<String>) -> Self {
        if let Some(path) = database_path.filter(|p| !p.is_empty()) {
            debug!(path = %path, "Overriding database path");
            self.database_path = path;
        }
        if let Some(filter) = log_filter.filter(|f| !f.is_empty()) {
            self.log_filter = filter;
        }
        self
    }

    /// Turns startup migrations on or off.
    pub fn with_run_migrations(mut self, run_migrations: bool) -> Self {
        self.run_migrations = run_migrations;
        self
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
