//! Application configuration.
//!
//! Loaded from YAML files and environment variables. The deployed Lambda
//! functions also receive `TABLE_NAME` and `TIMESTREAM_NAME` from the
//! infrastructure stack; those take precedence when present.

mod storage;

pub use storage::{DynamoConfig, StorageConfig, TimestreamConfig};

use serde::Deserialize;
use thiserror::Error;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "polytag.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "POLYTAG_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "POLYTAG";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "POLYTAG_LOG";
/// Environment variable selecting the log output format (`json` or `text`).
pub const LOG_FORMAT_ENV_VAR: &str = "POLYTAG_LOG_FORMAT";
/// Environment variable set by the stack for the single table.
pub const TABLE_NAME_ENV_VAR: &str = "TABLE_NAME";
/// Environment variable set by the stack for the Timestream database and table.
pub const TIMESTREAM_NAME_ENV_VAR: &str = "TIMESTREAM_NAME";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `polytag.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    /// 5. `TABLE_NAME` / `TIMESTREAM_NAME` from the Lambda environment
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = config.try_deserialize()?;
        config.apply_stack_env();
        Ok(config)
    }

    /// Apply the variables the infrastructure stack injects into every function.
    fn apply_stack_env(&mut self) {
        if let Ok(table) = std::env::var(TABLE_NAME_ENV_VAR) {
            self.storage.dynamo.table_name = table;
        }

        if let Ok(name) = std::env::var(TIMESTREAM_NAME_ENV_VAR) {
            self.storage.timestream.database = name.clone();
            self.storage.timestream.table = name;
        }
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}
