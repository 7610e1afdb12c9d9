//! Configuration infrastructure
//!
//! Configuration is layered with the `config` crate:
//! 1. Built-in defaults (`AppConfig::default()`)
//! 2. A TOML/JSON/YAML file (explicit path, or the per-user default if present)
//! 3. `CATALOG__<SECTION>__<KEY>` environment variables

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::application::asset_ingestion::IngestionConstraints;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub ingestion: IngestionConfig,
    pub object_store: ObjectStoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite:/var/lib/catalog/catalog.db`
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Operations per atomic chunk; clamped again to the store's own limit
    pub max_batch_operations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub max_files: usize,
    pub max_file_size_bytes: u64,
    pub allowed_mime_types: Vec<String>,
    pub max_concurrent_uploads: usize,
    pub upload_timeout_seconds: u64,
}

/// Unsigned-upload image host settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub base_url: String,
    pub cloud_name: String,
    pub upload_preset: String,
    /// Folder prefix applied to uploaded public ids
    pub folder: Option<String>,
    pub max_requests_per_second: u32,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// JSON formatted file logs
    pub json_format: bool,

    /// Console output (always stderr)
    pub console_output: bool,

    pub file_output: bool,

    /// Directory for log files; defaults to the per-user data directory
    pub log_dir: Option<PathBuf>,

    /// Number of log files to keep (older files are deleted on startup)
    pub max_files: u32,

    pub auto_cleanup_logs: bool,

    /// Module-specific log level filters (e.g., "sqlx": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let url = ConfigManager::get_app_data_dir()
            .map(|dir| format!("sqlite:{}", dir.join(defaults::DB_FILE_NAME).display()))
            .unwrap_or_else(|_| format!("sqlite:{}", defaults::DB_FILE_NAME));
        Self {
            url,
            max_connections: defaults::DB_MAX_CONNECTIONS,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_batch_operations: defaults::MAX_BATCH_OPERATIONS,
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_files: defaults::MAX_FILES_PER_INGEST,
            max_file_size_bytes: defaults::MAX_FILE_SIZE_BYTES,
            allowed_mime_types: defaults::ALLOWED_MIME_TYPES
                .iter()
                .map(ToString::to_string)
                .collect(),
            max_concurrent_uploads: defaults::MAX_CONCURRENT_UPLOADS,
            upload_timeout_seconds: defaults::UPLOAD_TIMEOUT_SECONDS,
        }
    }
}

impl IngestionConfig {
    pub fn to_constraints(&self) -> IngestionConstraints {
        IngestionConstraints {
            max_files: self.max_files,
            max_file_size_bytes: self.max_file_size_bytes,
            allowed_mime_types: self.allowed_mime_types.clone(),
            max_concurrent_uploads: self.max_concurrent_uploads,
            upload_timeout: Duration::from_secs(self.upload_timeout_seconds),
        }
    }
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::OBJECT_STORE_BASE_URL.to_string(),
            cloud_name: String::new(),
            upload_preset: String::new(),
            folder: None,
            max_requests_per_second: defaults::OBJECT_STORE_MAX_REQUESTS_PER_SECOND,
            timeout_seconds: defaults::UPLOAD_TIMEOUT_SECONDS,
            user_agent: format!("catalog-sync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: defaults::LOG_AUTO_CLEANUP,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

impl AppConfig {
    /// Validate cross-field constraints after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |message: String| Err(ConfigError::Validation { message });

        if self.database.url.trim().is_empty() {
            return fail("database.url must not be empty".to_string());
        }
        if self.sync.max_batch_operations == 0 {
            return fail("sync.max_batch_operations must be greater than 0".to_string());
        }
        if self.ingestion.max_files == 0
            || self.ingestion.max_files > defaults::MAX_FILES_PER_INGEST
        {
            return fail(format!(
                "ingestion.max_files must be between 1 and {}",
                defaults::MAX_FILES_PER_INGEST
            ));
        }
        if self.ingestion.max_concurrent_uploads == 0
            || self.ingestion.max_concurrent_uploads > defaults::MAX_CONCURRENT_UPLOADS
        {
            return fail(format!(
                "ingestion.max_concurrent_uploads must be between 1 and {}",
                defaults::MAX_CONCURRENT_UPLOADS
            ));
        }
        if self.ingestion.upload_timeout_seconds == 0 {
            return fail("ingestion.upload_timeout_seconds must be greater than 0".to_string());
        }
        if self.ingestion.allowed_mime_types.is_empty() {
            return fail("ingestion.allowed_mime_types must not be empty".to_string());
        }
        if self.object_store.max_requests_per_second == 0 {
            return fail("object_store.max_requests_per_second must be greater than 0".to_string());
        }
        if !defaults::LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return fail(format!("logging.level '{}' is not recognised", self.logging.level));
        }
        Ok(())
    }
}

pub struct ConfigManager {
    pub config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> anyhow::Result<PathBuf> {
        use anyhow::Context;
        Ok(dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME))
    }

    /// Get application data directory
    pub fn get_app_data_dir() -> anyhow::Result<PathBuf> {
        use anyhow::Context;
        Ok(dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join(defaults::APP_DIR_NAME))
    }

    /// An explicit path must exist; without one the per-user file is optional.
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        let env = config::Environment::with_prefix(defaults::ENV_PREFIX)
            .separator("__")
            .try_parsing(true);
        self.load_with_env(env)
    }

    fn load_with_env(&self, env: config::Environment) -> Result<AppConfig, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&AppConfig::default())?);

        match &self.config_path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path.as_path()).required(true));
            }
            None => {
                if let Some(path) = Self::default_config_file() {
                    builder = builder.add_source(config::File::from(path).required(false));
                }
            }
        }

        let config: AppConfig = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;

        match self.config_path() {
            Some(path) => info!("Loaded configuration from: {:?}", path),
            None => info!("Loaded configuration from defaults and environment"),
        }
        Ok(config)
    }

    fn default_config_file() -> Option<PathBuf> {
        Self::get_config_dir()
            .ok()
            .map(|dir| dir.join(defaults::CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "catalog-sync";
    pub const CONFIG_FILE_NAME: &str = "config.toml";
    pub const ENV_PREFIX: &str = "CATALOG";

    pub const DB_FILE_NAME: &str = "catalog.db";
    pub const DB_MAX_CONNECTIONS: u32 = 5;

    /// Operations per atomic write batch in the document store
    pub const MAX_BATCH_OPERATIONS: usize = 500;

    /// Hard ceiling on files per ingestion call
    pub const MAX_FILES_PER_INGEST: usize = 10;
    pub const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
    pub const ALLOWED_MIME_TYPES: &[&str] = &[
        "image/jpeg",
        "image/png",
        "image/webp",
        "image/gif",
        "image/avif",
    ];
    pub const MAX_CONCURRENT_UPLOADS: usize = 10;
    pub const UPLOAD_TIMEOUT_SECONDS: u64 = 60;

    pub const OBJECT_STORE_BASE_URL: &str = "https://api.cloudinary.com/v1_1";
    pub const OBJECT_STORE_MAX_REQUESTS_PER_SECOND: u32 = 10;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = false;
    pub const LOG_MAX_FILES: u32 = 7;
    pub const LOG_AUTO_CLEANUP: bool = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_env() -> config::Environment {
        config::Environment::with_prefix("CATALOG_SYNC_TEST_UNSET").separator("__")
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sync.max_batch_operations, 500);
        assert_eq!(config.ingestion.max_files, 10);
        assert!(config.database.url.starts_with("sqlite:"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[sync]\nmax_batch_operations = 50\n\n[object_store]\ncloud_name = \"demo\"\nupload_preset = \"unsigned\""
        )
        .unwrap();

        let manager = ConfigManager::new(Some(file.path().to_path_buf()));
        assert_eq!(manager.config_path(), Some(file.path()));
        let config = manager.load_with_env(no_env()).unwrap();

        assert_eq!(config.sync.max_batch_operations, 50);
        assert_eq!(config.object_store.cloud_name, "demo");
        // Untouched sections keep their defaults
        assert_eq!(config.ingestion.max_files, defaults::MAX_FILES_PER_INGEST);
        assert_eq!(config.object_store.base_url, defaults::OBJECT_STORE_BASE_URL);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::new(Some(dir.path().join("absent.toml")));
        assert!(matches!(
            manager.load_with_env(no_env()),
            Err(ConfigError::Load { .. })
        ));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let mut config = AppConfig::default();
        config.ingestion.max_files = 11;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { .. })
        ));

        let mut config = AppConfig::default();
        config.ingestion.max_concurrent_uploads = 11;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.sync.max_batch_operations = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ingestion_constraints_from_config() {
        let mut config = IngestionConfig::default();
        config.upload_timeout_seconds = 5;
        let constraints = config.to_constraints();
        assert_eq!(constraints.upload_timeout, Duration::from_secs(5));
        assert_eq!(constraints.max_files, 10);
        assert!(constraints
            .allowed_mime_types
            .iter()
            .any(|m| m == "image/webp"));
    }
}
