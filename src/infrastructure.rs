//! Infrastructure layer for configuration, storage and external integrations
//!
//! This module provides the concrete implementations behind the domain
//! traits: the identity map database, the platform API clients, media
//! re-hosting and alert delivery, plus configuration and logging setup.

pub mod alert_notifier; // Webhook alerts
pub mod alibaba_client; // Source catalog
pub mod cloudinary_uploader; // Media re-hosting
pub mod config; // Configuration loading and defaults
pub mod database_connection;
pub mod http_client;
pub mod identity_map_repository;
pub mod logging; // Logging infrastructure
pub mod shopify_client; // Target store

// Re-export commonly used items
pub use alert_notifier::{LogOnlyAlertNotifier, WebhookAlertNotifier, notifier_from_config};
pub use alibaba_client::AlibabaCatalogClient;
pub use cloudinary_uploader::CloudinaryUploader;
pub use config::{AppConfig, ConfigError, ConfigManager};
pub use database_connection::DatabaseConnection;
pub use http_client::{HttpClient, HttpClientConfig};
pub use identity_map_repository::SqliteIdentityMap;
pub use logging::{get_log_directory, init_logging_with_config, log_system_info};
pub use shopify_client::ShopifyStoreClient;
