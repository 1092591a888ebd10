//! Discovery Service
//!
//! Walks the source catalog's paginated listing once per cycle and collects
//! the deduplicated set of product ids to reconcile.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::product::SourceKey;
use crate::domain::services::SourceCatalog;

/// Why the listing walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A page came back with no ids
    EmptyPage,
    /// A page came back with fewer than `page_size` ids
    ShortPage,
    /// The page bound was reached
    MaxPages,
    /// A page fetch failed; the ids gathered so far are kept
    ListingFailed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::EmptyPage => "empty page",
            Self::ShortPage => "short page",
            Self::MaxPages => "page limit",
            Self::ListingFailed => "listing failed",
        };
        f.write_str(label)
    }
}

/// Deduplicated ids of one cycle plus how the walk went
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredIdSet {
    pub keys: BTreeSet<SourceKey>,
    pub pages_fetched: u32,
    pub stop_reason: StopReason,
    /// Ids seen more than once across pages
    pub duplicates: usize,
}

impl DiscoveredIdSet {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn listing_failed(&self) -> bool {
        self.stop_reason == StopReason::ListingFailed
    }
}

/// Service for walking the source listing
pub struct DiscoveryService {
    catalog: Arc<dyn SourceCatalog>,
}

impl DiscoveryService {
    pub fn new(catalog: Arc<dyn SourceCatalog>) -> Self {
        Self { catalog }
    }

    /// Fetch pages from 1 until an empty page, a short page, or `max_pages`.
    ///
    /// Pages are fetched strictly in order, one at a time. A failed page ends
    /// the walk for this cycle.
    pub async fn discover_all(&self, page_size: u32, max_pages: u32) -> DiscoveredIdSet {
        info!("🔍 Starting product discovery (page_size={}, max_pages={})", page_size, max_pages);

        let mut keys = BTreeSet::new();
        let mut duplicates = 0;
        let mut pages_fetched = 0;
        let mut stop_reason = StopReason::MaxPages;

        for page in 1..=max_pages {
            let ids = match self.catalog.list_ids(page, page_size).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!("⚠️ Failed to fetch listing page {}: {}", page, e);
                    stop_reason = StopReason::ListingFailed;
                    break;
                }
            };
            pages_fetched = page;

            let count = ids.len();
            debug!("📝 Page {} returned {} ids", page, count);

            if count == 0 {
                stop_reason = StopReason::EmptyPage;
                break;
            }

            for id in ids {
                if !keys.insert(id) {
                    duplicates += 1;
                }
            }

            if count < page_size as usize {
                stop_reason = StopReason::ShortPage;
                break;
            }
        }

        if duplicates > 0 {
            debug!("🔁 Collapsed {} duplicate ids across pages", duplicates);
        }
        info!(
            "✅ Discovery finished: {} unique ids over {} pages ({})",
            keys.len(),
            pages_fetched,
            stop_reason
        );

        DiscoveredIdSet {
            keys,
            pages_fetched,
            stop_reason,
            duplicates,
        }
    }
}
