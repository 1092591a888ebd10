//! Sync Orchestrator
//!
//! Runs one full sync cycle: discover every source id, then reconcile each
//! one in its own task with a bounded number in flight. A failing or
//! panicking item never affects its siblings.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::discovery_service::{DiscoveredIdSet, DiscoveryService};
use crate::application::reconciler::Reconciler;
use crate::domain::product::SourceKey;
use crate::domain::services::{AlertNotifier, SourceCatalog};
use crate::domain::sync_outcome::{CycleReport, SyncOutcome, TaskResult};
use crate::infrastructure::config::{AppConfig, defaults};

/// Failed keys listed in an alert before the rest are elided
const ALERT_KEY_LIMIT: usize = 20;

/// Knobs for one cycle
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub page_size: u32,
    pub max_pages: u32,
    pub max_concurrent: usize,
    pub alert_on_item_failures: bool,
}

impl CycleSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            page_size: config.source.page_size,
            max_pages: config.source.max_pages,
            max_concurrent: config.sync.max_concurrent,
            alert_on_item_failures: config.sync.alert_on_item_failures,
        }
    }
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            page_size: defaults::PAGE_SIZE,
            max_pages: defaults::MAX_PAGES,
            max_concurrent: defaults::MAX_CONCURRENT_RECONCILIATIONS,
            alert_on_item_failures: defaults::ALERT_ON_ITEM_FAILURES,
        }
    }
}

pub struct SyncOrchestrator {
    discovery: DiscoveryService,
    reconciler: Arc<Reconciler>,
    notifier: Arc<dyn AlertNotifier>,
    settings: CycleSettings,
}

impl SyncOrchestrator {
    pub fn new(
        catalog: Arc<dyn SourceCatalog>,
        reconciler: Reconciler,
        notifier: Arc<dyn AlertNotifier>,
        settings: CycleSettings,
    ) -> Self {
        Self {
            discovery: DiscoveryService::new(catalog),
            reconciler: Arc::new(reconciler),
            notifier,
            settings,
        }
    }

    /// Discover, reconcile every key once, report.
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("🚀 Starting sync cycle {}", cycle_id);

        let discovered = self
            .discovery
            .discover_all(self.settings.page_size, self.settings.max_pages)
            .await;
        let pages_fetched = discovered.pages_fetched;
        let listing_failed = discovered.listing_failed();

        let results = self.reconcile_all(discovered).await;

        let report = CycleReport {
            cycle_id,
            started_at,
            finished_at: Utc::now(),
            pages_fetched,
            listing_failed,
            results,
        };

        let summary = report.summary();
        info!(
            "📊 Sync cycle {} finished in {}s: {}",
            cycle_id,
            (report.finished_at - report.started_at).num_seconds(),
            summary
        );

        self.alert_if_needed(&report).await;
        report
    }

    async fn reconcile_all(&self, discovered: DiscoveredIdSet) -> HashMap<SourceKey, TaskResult> {
        let max_concurrent = self.settings.max_concurrent.max(1);
        let semaphore = Arc::new(Semaphore::new(max_concurrent));

        info!(
            "🚀 Reconciling {} products (max concurrent: {})",
            discovered.len(),
            max_concurrent
        );

        let mut keys = Vec::with_capacity(discovered.len());
        let mut tasks = Vec::with_capacity(discovered.len());

        for key in discovered.keys {
            let reconciler = Arc::clone(&self.reconciler);
            let semaphore = Arc::clone(&semaphore);
            let task_key = key.clone();

            let task = tokio::spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        error!("Failed to acquire semaphore permit for {}", task_key);
                        return SyncOutcome::Failed("semaphore closed".to_string());
                    }
                };
                debug!("🔓 Acquired permit for {}", task_key);
                reconciler.reconcile(&task_key).await
            });

            keys.push(key);
            tasks.push(task);
        }

        let joined = futures::future::join_all(tasks).await;

        keys.into_iter()
            .zip(joined)
            .map(|(key, joined)| {
                let result = match joined {
                    Ok(outcome) => TaskResult::Completed(outcome),
                    Err(e) => {
                        let message = join_error_message(e);
                        error!("💥 Task for {} panicked: {}", key, message);
                        TaskResult::Panicked(message)
                    }
                };
                (key, result)
            })
            .collect()
    }

    async fn alert_if_needed(&self, report: &CycleReport) {
        let summary = report.summary();
        let failed_keys = report.failed_keys();

        let subject = if report.listing_failed {
            "Catalog sync: product listing failed".to_string()
        } else if self.settings.alert_on_item_failures && !failed_keys.is_empty() {
            format!("Catalog sync: {} item(s) failed", failed_keys.len())
        } else {
            return;
        };

        let mut message = format!(
            "Cycle {} ({} pages listed): {}",
            report.cycle_id, report.pages_fetched, summary
        );
        if report.listing_failed {
            message.push_str("\nListing stopped early; unlisted products were not synced this cycle.");
        }
        if !failed_keys.is_empty() {
            let shown: Vec<String> = failed_keys
                .iter()
                .take(ALERT_KEY_LIMIT)
                .map(|key| match report.outcome_of(key) {
                    Some(SyncOutcome::Failed(reason)) => format!("{key}: {reason}"),
                    _ => key.to_string(),
                })
                .collect();
            message.push_str("\nFailed products:\n");
            message.push_str(&shown.join("\n"));
            if failed_keys.len() > ALERT_KEY_LIMIT {
                message.push_str(&format!("\n... and {} more", failed_keys.len() - ALERT_KEY_LIMIT));
            }
        }

        warn!("📣 Sending alert: {}", subject);
        self.notifier.notify(&subject, &message).await;
    }
}

fn join_error_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    panic_message(err.into_panic())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
