//! Service configuration.
//!
//! Read once at startup from a TOML file (default `aquawatch.toml`):
//!
//! ```toml
//! [standards]
//! ph_min = 6.5
//! ph_max = 8.5
//! ecoli_max = 100
//!
//! [database]
//! url = "postgres://aquawatch@localhost/aquawatch"
//!
//! [logging]
//! level = "info"
//! file = "aquawatch.log"
//! timestamps = true
//! ```
//!
//! Every table and key is optional. `DATABASE_URL` in the environment (or a
//! `.env` file) takes precedence over `database.url`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::logging::LogLevel;
use crate::standards::StandardsRegistry;

pub const DEFAULT_CONFIG_PATH: &str = "aquawatch.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid standard '{key}': {reason}")]
    InvalidStandard { key: &'static str, reason: String },

    #[error("no database URL configured (set DATABASE_URL or [database].url)")]
    MissingDatabaseUrl,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub standards: StandardsRegistry,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
    /// Timestamped log lines on the console. Off gives the compact
    /// interactive format.
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            timestamps: false,
        }
    }
}

impl AppConfig {
    /// Parses and validates configuration text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.standards.validate()?;
        Ok(config)
    }

    /// Loads configuration from `path`. The file must exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Like `load`, but a missing file yields the built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolves the database URL: `DATABASE_URL` first, then the config file.
    pub fn database_url(&self) -> Result<String, ConfigError> {
        dotenv::dotenv().ok();
        std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.database.url.clone())
            .ok_or(ConfigError::MissingDatabaseUrl)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
