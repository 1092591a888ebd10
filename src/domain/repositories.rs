//! Repository interfaces for the sync pipeline
//!
//! Contains trait definitions for persistent state shared across cycles.

use async_trait::async_trait;

use crate::domain::errors::SyncError;
use crate::domain::product::{SourceKey, TargetKey};

/// Persistent SourceKey -> TargetKey table.
///
/// At most one target per source key; `upsert` overwrites. There is no
/// delete. Implementations must tolerate concurrent calls for distinct keys.
#[async_trait]
pub trait IdentityMap: Send + Sync {
    async fn lookup(&self, key: &SourceKey) -> Result<Option<TargetKey>, SyncError>;
    async fn upsert(&self, key: &SourceKey, target_key: &TargetKey) -> Result<(), SyncError>;
}
