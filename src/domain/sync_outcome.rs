//! Per-item outcomes and per-cycle reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::domain::product::{SourceKey, TargetKey};

/// Why an item was deliberately not synced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Detail fetch returned nothing usable
    NoDetail,
    /// No price tier could be turned into a variant
    NoPricing,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDetail => f.write_str("no-detail"),
            Self::NoPricing => f.write_str("no-pricing"),
        }
    }
}

/// Terminal result of reconciling one source product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    Created(TargetKey),
    Updated(TargetKey),
    Unchanged(TargetKey),
    Skipped(SkipReason),
    Failed(String),
}

impl SyncOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Result of one submitted unit of work.
///
/// The reconciler folds every error into a `SyncOutcome`, so the only way a
/// task ends without one is a panic inside the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskResult {
    Completed(SyncOutcome),
    Panicked(String),
}

impl TaskResult {
    /// Outcome view where a panicked task counts as `Failed`
    pub fn outcome(&self) -> SyncOutcome {
        match self {
            Self::Completed(outcome) => outcome.clone(),
            Self::Panicked(message) => SyncOutcome::Failed(format!("task panicked: {message}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl CycleSummary {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.unchanged + self.skipped + self.failed
    }

    fn record(&mut self, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::Created(_) => self.created += 1,
            SyncOutcome::Updated(_) => self.updated += 1,
            SyncOutcome::Unchanged(_) => self.unchanged += 1,
            SyncOutcome::Skipped(_) => self.skipped += 1,
            SyncOutcome::Failed(_) => self.failed += 1,
        }
    }
}

impl fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} updated={} unchanged={} skipped={} failed={}",
            self.created, self.updated, self.unchanged, self.skipped, self.failed
        )
    }
}

/// Everything one cycle produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages_fetched: u32,
    pub listing_failed: bool,
    pub results: HashMap<SourceKey, TaskResult>,
}

impl CycleReport {
    pub fn summary(&self) -> CycleSummary {
        let mut summary = CycleSummary::default();
        for result in self.results.values() {
            summary.record(&result.outcome());
        }
        summary
    }

    pub fn outcome_of(&self, key: &SourceKey) -> Option<SyncOutcome> {
        self.results.get(key).map(TaskResult::outcome)
    }

    pub fn failed_keys(&self) -> Vec<&SourceKey> {
        let mut keys: Vec<&SourceKey> = self
            .results
            .iter()
            .filter(|(_, result)| result.outcome().is_failure())
            .map(|(key, _)| key)
            .collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(results: Vec<(&str, TaskResult)>) -> CycleReport {
        CycleReport {
            cycle_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            pages_fetched: 1,
            listing_failed: false,
            results: results
                .into_iter()
                .map(|(key, result)| (SourceKey::from(key), result))
                .collect(),
        }
    }

    #[test]
    fn summary_counts_each_outcome_kind() {
        let report = report(vec![
            ("a", TaskResult::Completed(SyncOutcome::Created(TargetKey::from("1")))),
            ("b", TaskResult::Completed(SyncOutcome::Unchanged(TargetKey::from("2")))),
            ("c", TaskResult::Completed(SyncOutcome::Skipped(SkipReason::NoPricing))),
            ("d", TaskResult::Panicked("boom".to_string())),
            ("e", TaskResult::Completed(SyncOutcome::Failed("http 500".to_string()))),
        ]);

        let summary = report.summary();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.total(), 5);
        assert_eq!(report.failed_keys(), vec![&SourceKey::from("d"), &SourceKey::from("e")]);
    }

    #[test]
    fn panicked_task_reads_as_failed() {
        let outcome = TaskResult::Panicked("index out of bounds".to_string()).outcome();
        assert!(outcome.is_failure());
    }
}
