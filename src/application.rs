//! Application layer module
//!
//! This module contains the sync pipeline itself: discovery, per-item
//! reconciliation, the cycle orchestrator and its interval trigger. It only
//! talks to the outside world through the domain traits.

pub mod content_transformer;
pub mod discovery_service;
pub mod media_stage;
pub mod product_comparator;
pub mod reconciler;
pub mod scheduler;
pub mod sync_orchestrator;

pub use content_transformer::{ContentTransformer, ProductContentTransformer};
pub use discovery_service::{DiscoveredIdSet, DiscoveryService, StopReason};
pub use media_stage::{MediaStage, RehostedMedia};
pub use product_comparator::{CoarseComparator, FieldChange, ProductComparator};
pub use reconciler::Reconciler;
pub use scheduler::SyncScheduler;
pub use sync_orchestrator::{CycleSettings, SyncOrchestrator};
