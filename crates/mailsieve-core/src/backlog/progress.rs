//! Run statistics, summaries, and resume checkpoints.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::filters::FilterStats;
use crate::message::Decision;

/// Where to pick a paused run back up.
///
/// Resume continues from the next unprocessed sub-batch: the page
/// token re-fetches the page the run stopped in, and the sub-batch
/// index skips the batches already handled within it. The exclusion
/// labels reproduce the phase-2 query without re-running the filter
/// phase against an already-mutated mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Token that fetches the page the run stopped in.
    pub page_token: Option<String>,
    /// First unprocessed sub-batch within that page.
    pub sub_batch_index: usize,
    /// Label names applied during the filter phase.
    pub exclusion_labels: Vec<String>,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// All pages processed.
    Completed,
    /// Cancelled by the caller.
    Cancelled,
    /// Paused cooperatively; resumable from the checkpoint.
    Paused(Checkpoint),
    /// Ended early on a fatal error or exhausted listing retries.
    Aborted(String),
}

/// Aggregated counters for one run.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Messages mutated by the filter phase.
    pub filter_processed: u64,
    /// Per-filter application stats.
    pub filter_stats: Vec<FilterStats>,
    /// Messages decided and executed in the classification phase.
    pub processed: u64,
    /// Messages skipped as already handled by a filter.
    pub skipped: u64,
    /// Messages that failed to fetch or mutate.
    pub failed: u64,
    /// Decisions per category.
    pub categories: BTreeMap<String, u64>,
    /// Decisions per tier.
    pub tiers: BTreeMap<String, u64>,
}

impl RunStats {
    /// Counts one executed decision.
    pub(crate) fn record_decision(&mut self, decision: &Decision) {
        self.processed += 1;
        *self.categories.entry(decision.category.clone()).or_default() += 1;
        *self
            .tiers
            .entry(decision.tier.as_str().to_string())
            .or_default() += 1;
    }

    /// Messages the run touched one way or another.
    #[must_use]
    pub const fn total_handled(&self) -> u64 {
        self.filter_processed + self.processed + self.skipped + self.failed
    }
}

/// Final report of a backlog run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Aggregated counters.
    pub stats: RunStats,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl RunSummary {
    /// Messages classified per second, if any time has passed.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.stats.processed as f64 / secs
        } else {
            0.0
        }
    }

    /// One-paragraph human-readable report.
    ///
    /// Every ending, fatal ones included, goes through this; a run
    /// never surfaces as a bare error.
    #[must_use]
    pub fn report(&self) -> String {
        let status = match &self.outcome {
            RunOutcome::Completed => "completed".to_string(),
            RunOutcome::Cancelled => "cancelled".to_string(),
            RunOutcome::Paused(_) => "paused".to_string(),
            RunOutcome::Aborted(reason) => format!("aborted ({reason})"),
        };
        let categories = if self.stats.categories.is_empty() {
            "none".to_string()
        } else {
            self.stats
                .categories
                .iter()
                .map(|(name, count)| format!("{name}: {count}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "Run {status} in {:.1}s: {} filtered, {} classified, {} skipped, {} failed \
             ({:.1} msg/s). Categories: {categories}.",
            self.elapsed.as_secs_f64(),
            self.stats.filter_processed,
            self.stats.processed,
            self.stats.skipped,
            self.stats.failed,
            self.throughput(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::{RuleAction, Tier};

    #[test]
    fn test_record_decision_counts() {
        let mut stats = RunStats::default();
        stats.record_decision(&Decision::new(
            "BILLS",
            RuleAction::LabelAndArchive,
            "",
            1.0,
            Tier::LocalRule,
        ));
        stats.record_decision(&Decision::new(
            "BILLS",
            RuleAction::LabelAndArchive,
            "",
            0.8,
            Tier::Model,
        ));
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.categories["BILLS"], 2);
        assert_eq!(stats.tiers["local_rule"], 1);
        assert_eq!(stats.tiers["model"], 1);
    }

    #[test]
    fn test_report_mentions_abort_reason() {
        let summary = RunSummary {
            stats: RunStats::default(),
            outcome: RunOutcome::Aborted("authentication failed".to_string()),
            elapsed: Duration::from_secs(2),
        };
        let report = summary.report();
        assert!(report.contains("aborted"));
        assert!(report.contains("authentication failed"));
        assert!(report.contains("0 classified"));
    }

    #[test]
    fn test_checkpoint_roundtrips_through_json() {
        let checkpoint = Checkpoint {
            page_token: Some("500".to_string()),
            sub_batch_index: 2,
            exclusion_labels: vec!["NEWSLETTERS".to_string()],
        };
        let json = serde_json::to_string(&checkpoint).unwrap();
        let back: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, checkpoint);
    }
}
