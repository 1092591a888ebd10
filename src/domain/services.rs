//! Domain services
//!
//! Contracts for the external systems the sync pipeline talks to.

pub mod catalog_services;

pub use catalog_services::{AlertNotifier, MediaRehoster, SourceCatalog, TargetStore};
