//! Catalog Sync - Alibaba to Shopify product mirroring service
//!
//! Periodically lists every published product of a source catalog, re-hosts
//! its media, and creates or updates the mirrored product on the target
//! storefront. A small SQLite table remembers which target product mirrors
//! which source product across runs.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::application::{
    CycleSettings, MediaStage, ProductContentTransformer, Reconciler, SyncOrchestrator,
};
use crate::infrastructure::{
    AlibabaCatalogClient, AppConfig, CloudinaryUploader, DatabaseConnection, HttpClient,
    HttpClientConfig, ShopifyStoreClient, SqliteIdentityMap, notifier_from_config,
};

/// Fully wired pipeline plus the database handle it writes through
pub struct SyncRuntime {
    pub orchestrator: Arc<SyncOrchestrator>,
    pub database: DatabaseConnection,
}

/// Build every production collaborator from configuration
pub async fn build_runtime(config: &AppConfig) -> Result<SyncRuntime> {
    let database = DatabaseConnection::with_config(&config.database).await?;
    database
        .migrate()
        .await
        .context("Failed to prepare identity map schema")?;
    let identity_map = Arc::new(SqliteIdentityMap::new(database.pool().clone()));

    // one client per remote service so each gets its own request budget
    let http_config = HttpClientConfig::from_http_config(&config.http);

    let catalog = Arc::new(AlibabaCatalogClient::new(
        HttpClient::with_config(&http_config)?,
        config.source.clone(),
    ));
    let store = Arc::new(ShopifyStoreClient::new(
        HttpClient::with_config(&http_config)?,
        &config.target,
    ));
    let uploader = Arc::new(CloudinaryUploader::new(
        HttpClient::with_config(&http_config)?,
        config.media.clone(),
    ));
    let notifier = notifier_from_config(HttpClient::with_config(&http_config)?, &config.alert);

    let reconciler = Reconciler::new(
        catalog.clone(),
        store,
        identity_map,
        MediaStage::new(uploader, config.media.max_main_images),
    )
    .with_transformer(Arc::new(ProductContentTransformer::from_config(&config.target)))
    .with_orphan_adoption(config.target.adopt_orphans);

    let orchestrator = SyncOrchestrator::new(
        catalog,
        reconciler,
        notifier,
        CycleSettings::from_config(config),
    );

    info!(
        "🔧 Sync pipeline ready (store: {}, concurrency: {})",
        config.target.store_url, config.sync.max_concurrent
    );
    Ok(SyncRuntime {
        orchestrator: Arc::new(orchestrator),
        database,
    })
}
