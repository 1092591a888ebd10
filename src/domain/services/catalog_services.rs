//! 외부 시스템 서비스 트레이트 정의
//!
//! Every platform the pipeline touches sits behind one of these traits so the
//! discovery / reconciliation logic can be exercised against in-memory fakes.

use async_trait::async_trait;

use crate::domain::errors::ClientError;
use crate::domain::product::{
    SourceKey, SourceProductRecord, TargetKey, TargetProductPayload, TargetRecord,
};

/// Source platform product catalog
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// One page of product ids, in listing order (`page` starts at 1)
    async fn list_ids(&self, page: u32, page_size: u32) -> Result<Vec<SourceKey>, ClientError>;

    /// Full product detail; `Ok(None)` when the response carries no product
    async fn fetch_detail(
        &self,
        key: &SourceKey,
    ) -> Result<Option<SourceProductRecord>, ClientError>;
}

/// Target storefront
#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn create(&self, payload: &TargetProductPayload) -> Result<TargetRecord, ClientError>;

    async fn update(
        &self,
        target_key: &TargetKey,
        payload: &TargetProductPayload,
    ) -> Result<TargetRecord, ClientError>;

    async fn fetch(&self, target_key: &TargetKey) -> Result<TargetRecord, ClientError>;

    /// Look up a record carrying the given tag.
    ///
    /// Used to adopt records that were created without their mapping being
    /// persisted. Stores that cannot search by tag report `Ok(None)`.
    async fn find_by_source_tag(&self, _tag: &str) -> Result<Option<TargetRecord>, ClientError> {
        Ok(None)
    }
}

/// Media host that re-publishes source assets under our own CDN
#[async_trait]
pub trait MediaRehoster: Send + Sync {
    async fn rehost(&self, source_url: &str) -> Result<String, ClientError>;
}

/// Out-of-band alert channel; fire-and-forget
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, subject: &str, message: &str);
}
