//! Per-item reconciliation
//!
//! Brings one source product in line with its mirror on the target store:
//! fetch detail, derive variants, re-host media, then create or diff-and-update
//! depending on the identity map. Every error ends up in the returned
//! `SyncOutcome`; nothing escapes to the caller.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::application::content_transformer::{ContentTransformer, ProductContentTransformer};
use crate::application::media_stage::MediaStage;
use crate::application::product_comparator::{CoarseComparator, ProductComparator};
use crate::domain::errors::SyncError;
use crate::domain::product::{SourceKey, SourceProductRecord, TargetKey, TargetProductPayload};
use crate::domain::repositories::IdentityMap;
use crate::domain::services::{SourceCatalog, TargetStore};
use crate::domain::sync_outcome::{SkipReason, SyncOutcome};

pub struct Reconciler {
    catalog: Arc<dyn SourceCatalog>,
    store: Arc<dyn TargetStore>,
    identity_map: Arc<dyn IdentityMap>,
    media: MediaStage,
    transformer: Arc<dyn ContentTransformer>,
    comparator: Arc<dyn ProductComparator>,
    adopt_orphans: bool,
}

impl Reconciler {
    /// Reconciler with the default transformer and the coarse comparator
    pub fn new(
        catalog: Arc<dyn SourceCatalog>,
        store: Arc<dyn TargetStore>,
        identity_map: Arc<dyn IdentityMap>,
        media: MediaStage,
    ) -> Self {
        Self {
            catalog,
            store,
            identity_map,
            media,
            transformer: Arc::new(ProductContentTransformer::default()),
            comparator: Arc::new(CoarseComparator),
            adopt_orphans: true,
        }
    }

    pub fn with_transformer(mut self, transformer: Arc<dyn ContentTransformer>) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn with_comparator(mut self, comparator: Arc<dyn ProductComparator>) -> Self {
        self.comparator = comparator;
        self
    }

    /// Look for a tagged target record before creating an unmapped product
    pub fn with_orphan_adoption(mut self, enabled: bool) -> Self {
        self.adopt_orphans = enabled;
        self
    }

    pub async fn reconcile(&self, key: &SourceKey) -> SyncOutcome {
        match self.try_reconcile(key).await {
            Ok(outcome) => outcome,
            Err(SyncError::DataIncomplete(reason)) => {
                info!("⏭️ Skipping {}: {}", key, reason);
                SyncOutcome::Skipped(reason)
            }
            Err(e) => {
                error!("❌ Failed to sync {}: {}", key, e);
                SyncOutcome::Failed(e.to_string())
            }
        }
    }

    async fn try_reconcile(&self, key: &SourceKey) -> Result<SyncOutcome, SyncError> {
        let record = self.fetch_record(key).await?;
        let variants = self
            .transformer
            .derive_variants(&record)
            .map_err(SyncError::DataIncomplete)?;

        let media = self.media.rehost(&record).await;
        let description = media.description.clone();
        let payload = self.transformer.assemble(key, &record, media, variants);

        let target_key = match self.identity_map.lookup(key).await? {
            Some(target_key) => target_key,
            None => match self.adopt_orphan(key).await? {
                Some(target_key) => target_key,
                None => return self.create(key, &payload).await,
            },
        };

        self.update_if_changed(key, &target_key, &payload, &description)
            .await
    }

    async fn fetch_record(&self, key: &SourceKey) -> Result<SourceProductRecord, SyncError> {
        match self.catalog.fetch_detail(key).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => {
                warn!("⚠️ No detail returned for {}", key);
                Err(SyncError::DataIncomplete(SkipReason::NoDetail))
            }
            Err(e) => {
                warn!("⚠️ Detail fetch failed for {}: {}", key, e);
                Err(SyncError::DataIncomplete(SkipReason::NoDetail))
            }
        }
    }

    /// A record created in an earlier run whose mapping was never written
    async fn adopt_orphan(&self, key: &SourceKey) -> Result<Option<TargetKey>, SyncError> {
        if !self.adopt_orphans {
            return Ok(None);
        }

        let tag = self.transformer.source_tag(key);
        let Some(orphan) = self.store.find_by_source_tag(&tag).await? else {
            return Ok(None);
        };

        info!("🔗 Adopting existing target record {} for {}", orphan.id, key);
        self.identity_map.upsert(key, &orphan.id).await?;
        Ok(Some(orphan.id))
    }

    async fn create(
        &self,
        key: &SourceKey,
        payload: &TargetProductPayload,
    ) -> Result<SyncOutcome, SyncError> {
        let created = self.store.create(payload).await?;

        if let Err(e) = self.identity_map.upsert(key, &created.id).await {
            error!(
                "❌ Created target record {} for {} but could not store the mapping",
                created.id, key
            );
            return Err(e);
        }

        info!("✅ Created target record {} for {}", created.id, key);
        Ok(SyncOutcome::Created(created.id))
    }

    async fn update_if_changed(
        &self,
        key: &SourceKey,
        target_key: &TargetKey,
        payload: &TargetProductPayload,
        description: &str,
    ) -> Result<SyncOutcome, SyncError> {
        let existing = self.store.fetch(target_key).await?;
        let changes = self.comparator.diff(&existing, payload, description);

        if changes.is_empty() {
            debug!("No changes for {} ({})", key, target_key);
            return Ok(SyncOutcome::Unchanged(target_key.clone()));
        }

        let summary: Vec<String> = changes.iter().map(ToString::to_string).collect();
        info!("🔄 Updating {} ({}): {}", key, target_key, summary.join(", "));

        self.store.update(target_key, payload).await?;
        Ok(SyncOutcome::Updated(target_key.clone()))
    }
}
