//! Domain module - Core business entities and collaborator contracts
//!
//! This module contains the product model shared by both platforms, the
//! per-item sync outcome types, the error taxonomy, and the trait seams
//! behind which every external system (source catalog, target store,
//! media host, identity map, alert channel) is plugged in.
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod errors;
pub mod product;
pub mod repositories;
pub mod services;
pub mod sync_outcome;

// Re-export commonly used items for convenience
pub use errors::{ClientError, SyncError};
pub use product::{
    PriceTier, ProductImage, ProductOption, SourceKey, SourceProductRecord, TargetKey,
    TargetProductPayload, TargetRecord, Variant,
};
pub use repositories::IdentityMap;
pub use services::{AlertNotifier, MediaRehoster, SourceCatalog, TargetStore};
pub use sync_outcome::{CycleReport, CycleSummary, SkipReason, SyncOutcome, TaskResult};
