//! Configuration infrastructure
//!
//! Contains configuration loading and management for the catalog sync.
//!
//! Configuration is layered (later layers win):
//! 1. Built-in defaults (`defaults` module)
//! 2. Optional JSON/TOML file (`--config`, or the per-user config directory)
//! 3. Environment variables prefixed `CATALOG_SYNC`, nested with `__`
//!    (e.g. `CATALOG_SYNC__SOURCE__APP_SECRET`)
//!
//! The resulting `AppConfig` is built once at startup and handed to each
//! component constructor.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::info;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Source catalog API (Alibaba ICBU)
    pub source: SourceConfig,

    /// Target storefront API (Shopify)
    pub target: TargetConfig,

    /// Media re-hosting (Cloudinary)
    pub media: MediaConfig,

    /// Cycle behaviour
    pub sync: SyncConfig,

    /// Alert channel
    pub alert: AlertConfig,

    /// Shared HTTP client settings
    pub http: HttpConfig,

    /// Identity map storage
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Source catalog credentials and listing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub app_key: String,
    pub app_secret: String,
    pub access_token: String,
    pub api_url: String,
    /// Content language requested from the catalog
    pub language: String,
    /// Ids per listing page (API maximum is 30)
    pub page_size: u32,
    /// Safety bound on pages walked per cycle
    pub max_pages: u32,
}

/// Target storefront credentials and payload constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Store host, e.g. "my-shop.myshopify.com" (a full base URL is also accepted)
    pub store_url: String,
    pub access_token: String,
    pub api_version: String,
    pub vendor: String,
    pub product_type: String,
    /// Tag prefix that marks a product with its source key
    pub source_tag_prefix: String,
    /// Look for a tagged record before creating an unmapped product
    pub adopt_orphans: bool,
}

/// Media host credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
    /// Upload endpoint base; the cloud name and resource path are appended
    pub api_base_url: String,
    /// Main images attached per product
    pub max_main_images: usize,
}

/// Cycle configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Reconciliations in flight at once
    pub max_concurrent: usize,
    /// Minutes between scheduled cycles
    pub interval_minutes: u64,
    /// Alert when at least one item fails (listing failures always alert)
    pub alert_on_item_failures: bool,
}

/// Alert channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    pub webhook_url: String,
    pub recipient: String,
}

/// HTTP client settings shared by all API clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub request_timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    /// Per-client request budget; 0 disables rate limiting
    pub max_requests_per_second: u32,
    pub user_agent: String,
    /// Idle connections kept per host
    pub pool_max_idle_per_host: usize,
}

/// Identity map storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx SQLite URL, e.g. "sqlite:/var/lib/catalog-sync/mapping.db"
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files; empty means `logs/` next to the executable
    pub directory: String,

    /// Log file name
    pub file_name: String,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Enable automatic log cleanup on startup
    pub auto_cleanup_logs: bool,

    /// Offset from UTC used for log timestamps, in hours
    pub utc_offset_hours: i32,

    /// Module-specific log level filters (e.g., "sqlx": "warn", "reqwest": "info")
    pub module_filters: HashMap<String, String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            app_key: String::new(),
            app_secret: String::new(),
            access_token: String::new(),
            api_url: defaults::SOURCE_API_URL.to_string(),
            language: defaults::SOURCE_LANGUAGE.to_string(),
            page_size: defaults::PAGE_SIZE,
            max_pages: defaults::MAX_PAGES,
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            store_url: String::new(),
            access_token: String::new(),
            api_version: defaults::TARGET_API_VERSION.to_string(),
            vendor: defaults::TARGET_VENDOR.to_string(),
            product_type: defaults::TARGET_PRODUCT_TYPE.to_string(),
            source_tag_prefix: defaults::SOURCE_TAG_PREFIX.to_string(),
            adopt_orphans: defaults::ADOPT_ORPHANS,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            folder: defaults::MEDIA_FOLDER.to_string(),
            api_base_url: defaults::MEDIA_API_BASE_URL.to_string(),
            max_main_images: defaults::MAX_MAIN_IMAGES,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::MAX_CONCURRENT_RECONCILIATIONS,
            interval_minutes: defaults::SYNC_INTERVAL_MINUTES,
            alert_on_item_failures: defaults::ALERT_ON_ITEM_FAILURES,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: String::new(),
            recipient: String::new(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            connect_timeout_seconds: defaults::CONNECT_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            user_agent: defaults::USER_AGENT.to_string(),
            pool_max_idle_per_host: defaults::POOL_MAX_IDLE_PER_HOST,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let url = ConfigManager::get_app_data_dir()
            .map(|dir| format!("sqlite:{}", dir.join(defaults::DATABASE_FILE).display()))
            .unwrap_or_else(|_| format!("sqlite:{}", defaults::DATABASE_FILE));
        Self {
            url,
            max_connections: defaults::DB_MAX_CONNECTIONS,
            busy_timeout_ms: defaults::DB_BUSY_TIMEOUT_MS,
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
            directory: String::new(),
            file_name: defaults::LOG_FILE_NAME.to_string(),
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: defaults::LOG_AUTO_CLEANUP,
            utc_offset_hours: defaults::LOG_UTC_OFFSET_HOURS,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("h2".to_string(), "warn".to_string());
                filters.insert("tokio".to_string(), "info".to_string());
                filters
            },
        }
    }
}

/// Problems that make the configuration unusable at startup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl AppConfig {
    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("source.app_key", &self.source.app_key),
            ("source.app_secret", &self.source.app_secret),
            ("source.access_token", &self.source.access_token),
            ("source.api_url", &self.source.api_url),
            ("target.store_url", &self.target.store_url),
            ("target.access_token", &self.target.access_token),
            ("media.cloud_name", &self.media.cloud_name),
            ("media.api_key", &self.media.api_key),
            ("media.api_secret", &self.media.api_secret),
            ("database.url", &self.database.url),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(field));
            }
        }

        if !(1..=defaults::MAX_PAGE_SIZE).contains(&self.source.page_size) {
            return Err(ConfigError::Invalid {
                field: "source.page_size",
                reason: format!(
                    "{} is outside 1..={}",
                    self.source.page_size,
                    defaults::MAX_PAGE_SIZE
                ),
            });
        }
        if self.source.max_pages == 0 {
            return Err(ConfigError::Invalid {
                field: "source.max_pages",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.sync.max_concurrent == 0 {
            return Err(ConfigError::Invalid {
                field: "sync.max_concurrent",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.sync.interval_minutes == 0 {
            return Err(ConfigError::Invalid {
                field: "sync.interval_minutes",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.alert.enabled && self.alert.webhook_url.trim().is_empty() {
            return Err(ConfigError::Missing("alert.webhook_url"));
        }
        Ok(())
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Get application data directory
    pub fn get_app_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(data_dir)
    }

    /// Manager for the per-user default config file
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    /// Manager for an explicit config file
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Write a default config file if none exists yet, so operators have a
    /// template to fill in. Returns true when a file was created.
    pub async fn initialize_on_first_run(&self) -> Result<bool> {
        if self.config_path.exists() {
            return Ok(false);
        }

        info!("🎉 First run detected - writing default configuration");
        self.save_config(&AppConfig::default()).await?;
        Ok(true)
    }

    /// Load the layered configuration (defaults, file, environment)
    pub fn load_config(&self) -> Result<AppConfig> {
        let defaults = config::Config::try_from(&AppConfig::default())
            .context("Failed to serialize default configuration")?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::from(self.config_path.as_path()).required(false))
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {:?}", self.config_path))?;

        let app_config: AppConfig = settings
            .try_deserialize()
            .context("Configuration has an unexpected shape")?;

        info!("Loaded configuration (file: {:?})", self.config_path);
        Ok(app_config)
    }

    /// Load and validate; a configuration error is fatal for the process
    pub fn load_validated(&self) -> Result<AppConfig> {
        let app_config = self.load_config()?;
        app_config.validate().with_context(|| {
            format!(
                "Invalid configuration (file: {:?}, env prefix: {}__)",
                self.config_path,
                defaults::ENV_PREFIX
            )
        })?;
        Ok(app_config)
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Default configuration values
pub mod defaults {
    /// Directory name under the user's config / data dirs
    pub const APP_DIR_NAME: &str = "catalog-sync";

    /// Default config file name
    pub const CONFIG_FILE_NAME: &str = "catalog_sync_config.json";

    /// Environment variable prefix
    pub const ENV_PREFIX: &str = "CATALOG_SYNC";

    // Source catalog
    /// Alibaba open platform sync gateway
    pub const SOURCE_API_URL: &str = "https://open-api.alibaba.com/sync";

    /// Default content language
    pub const SOURCE_LANGUAGE: &str = "ENGLISH";

    /// Default listing page size
    pub const PAGE_SIZE: u32 = 30;

    /// Largest page size the listing API accepts
    pub const MAX_PAGE_SIZE: u32 = 30;

    /// Default page bound per cycle
    pub const MAX_PAGES: u32 = 100;

    // Target storefront
    /// Default Admin API version
    pub const TARGET_API_VERSION: &str = "2023-10";

    /// Default vendor label
    pub const TARGET_VENDOR: &str = "Alibaba Imported";

    /// Default product type label
    pub const TARGET_PRODUCT_TYPE: &str = "Synced Product";

    /// Default source tag prefix
    pub const SOURCE_TAG_PREFIX: &str = "AlibabaID:";

    /// Default orphan adoption setting
    pub const ADOPT_ORPHANS: bool = true;

    // Media
    /// Default upload folder
    pub const MEDIA_FOLDER: &str = "alibaba-sync";

    /// Default upload API base
    pub const MEDIA_API_BASE_URL: &str = "https://api.cloudinary.com/v1_1";

    /// Main images attached per product
    pub const MAX_MAIN_IMAGES: usize = 6;

    // Sync cycle
    /// Default concurrent reconciliations
    pub const MAX_CONCURRENT_RECONCILIATIONS: usize = 5;

    /// Default minutes between cycles
    pub const SYNC_INTERVAL_MINUTES: u64 = 30;

    /// Default item-failure alerting
    pub const ALERT_ON_ITEM_FAILURES: bool = true;

    // HTTP
    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// Default connect timeout in seconds
    pub const CONNECT_TIMEOUT_SECONDS: u64 = 10;

    /// Default per-client request budget
    pub const MAX_REQUESTS_PER_SECOND: u32 = 10;

    /// Default idle connections per host
    pub const POOL_MAX_IDLE_PER_HOST: usize = 10;

    /// Default user agent
    pub const USER_AGENT: &str = concat!("catalog-sync/", env!("CARGO_PKG_VERSION"));

    // Database
    /// Default identity map file name
    pub const DATABASE_FILE: &str = "mapping.db";

    /// Default pool size
    pub const DB_MAX_CONNECTIONS: u32 = 10;

    /// Default SQLite busy timeout in milliseconds
    pub const DB_BUSY_TIMEOUT_MS: u64 = 5000;

    // Log configuration defaults
    /// Default log level
    pub const LOG_LEVEL: &str = "info";

    /// Default JSON format setting
    pub const LOG_JSON_FORMAT: bool = false;

    /// Default console output setting
    pub const LOG_CONSOLE_OUTPUT: bool = true;

    /// Default file output setting
    pub const LOG_FILE_OUTPUT: bool = true;

    /// Default log file name
    pub const LOG_FILE_NAME: &str = "catalog-sync.log";

    /// Default maximum log files to keep
    pub const LOG_MAX_FILES: u32 = 5;

    /// Default auto cleanup logs setting
    pub const LOG_AUTO_CLEANUP: bool = true;

    /// Default timestamp offset (UTC+8)
    pub const LOG_UTC_OFFSET_HOURS: i32 = 8;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn complete_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.source.app_key = "key".to_string();
        config.source.app_secret = "secret".to_string();
        config.source.access_token = "token".to_string();
        config.target.store_url = "shop.myshopify.com".to_string();
        config.target.access_token = "shpat".to_string();
        config.media.cloud_name = "cloud".to_string();
        config.media.api_key = "123".to_string();
        config.media.api_secret = "abc".to_string();
        config
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.source.page_size, 30);
        assert_eq!(config.source.max_pages, 100);
        assert_eq!(config.sync.max_concurrent, 5);
        assert_eq!(config.sync.interval_minutes, 30);
        assert_eq!(config.media.max_main_images, 6);
        assert_eq!(config.target.vendor, "Alibaba Imported");
        assert!(config.database.url.starts_with("sqlite:"));
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let err = AppConfig::default().validate().unwrap_err();
        assert_eq!(err, ConfigError::Missing("source.app_key"));

        let mut config = complete_config();
        config.media.api_secret.clear();
        assert_eq!(config.validate().unwrap_err(), ConfigError::Missing("media.api_secret"));
    }

    #[test]
    fn page_size_is_bounded_by_the_listing_api() {
        let mut config = complete_config();
        assert!(config.validate().is_ok());

        config.source.page_size = 31;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "source.page_size", .. })
        ));

        config.source.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = complete_config();
        config.sync.max_concurrent = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "sync.max_concurrent", .. })
        ));
    }

    #[test]
    fn enabled_alerts_need_a_webhook() {
        let mut config = complete_config();
        config.alert.enabled = true;
        assert_eq!(config.validate().unwrap_err(), ConfigError::Missing("alert.webhook_url"));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sync.json");
        std::fs::write(
            &path,
            r#"{
                "source": { "app_key": "file-key", "page_size": 20 },
                "sync": { "max_concurrent": 2 }
            }"#,
        )
        .unwrap();

        let config = ConfigManager::with_path(&path).load_config().unwrap();
        assert_eq!(config.source.app_key, "file-key");
        assert_eq!(config.source.page_size, 20);
        assert_eq!(config.sync.max_concurrent, 2);
        // untouched sections keep their defaults
        assert_eq!(config.source.max_pages, defaults::MAX_PAGES);
        assert_eq!(config.target.api_version, defaults::TARGET_API_VERSION);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let config = ConfigManager::with_path(dir.path().join("absent.json"))
            .load_config()
            .unwrap();
        assert_eq!(config.source.page_size, defaults::PAGE_SIZE);
    }

    #[tokio::test]
    async fn first_run_writes_a_template() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("nested").join("config.json"));

        assert!(manager.initialize_on_first_run().await.unwrap());
        assert!(manager.config_path().exists());
        assert!(!manager.initialize_on_first_run().await.unwrap());

        let reloaded = manager.load_config().unwrap();
        assert_eq!(reloaded.target.source_tag_prefix, defaults::SOURCE_TAG_PREFIX);
    }
}
