//! Metrics collection for dedup jobs

use crate::report::{Completion, DedupReport, SkipReason};
use std::collections::HashMap;
use std::time::Duration;

/// Metrics accumulated across the jobs run by one coordinator
///
/// Wall-clock figures live here rather than in the report so reports stay
/// reproducible.
#[derive(Debug, Clone, Default)]
pub struct DedupMetrics {
    /// Jobs finished, by completion
    pub jobs: HashMap<Completion, usize>,

    /// Skipped archives, by reason
    pub skipped: HashMap<SkipReason, usize>,

    /// Pairs given the full subsequence check
    pub pairs_compared: usize,

    /// Pairs rejected by the prefilter
    pub pairs_pruned: usize,

    /// EQUAL relations found
    pub equal_relations: usize,

    /// LESSER relations found
    pub lesser_relations: usize,

    /// Inconsistent LESSER relations dropped
    pub dropped_self_loops: usize,

    /// Class cycles merged
    pub merged_cycles: usize,

    /// Total runtime in milliseconds
    pub total_runtime_ms: u64,
}

impl DedupMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a finished job into the totals
    pub fn record_job(&mut self, report: &DedupReport, elapsed: Duration) {
        *self.jobs.entry(report.completion).or_insert(0) += 1;
        for skipped in &report.skipped {
            self.record_skip(skipped.reason);
        }

        let stats = &report.stats;
        self.pairs_compared += stats.pairs_compared;
        self.pairs_pruned += stats.pairs_pruned;
        self.equal_relations += stats.equal_relations;
        self.lesser_relations += stats.lesser_relations;
        self.dropped_self_loops += stats.dropped_self_loops;
        self.merged_cycles += stats.merged_cycles;
        self.total_runtime_ms += u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    }

    /// Record one skipped archive
    pub fn record_skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }

    /// Total jobs run
    pub fn total_jobs(&self) -> usize {
        self.jobs.values().sum()
    }

    /// Total skipped archives
    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }

    /// Fraction of candidate pairs the prefilter removed
    pub fn prune_ratio(&self) -> f64 {
        let total = self.pairs_compared + self.pairs_pruned;
        if total == 0 {
            0.0
        } else {
            self.pairs_pruned as f64 / total as f64
        }
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Dedup Metrics Summary".to_string(),
            "=====================".to_string(),
            format!("Jobs: {}", self.total_jobs()),
            format!("Total runtime: {}ms", self.total_runtime_ms),
            format!(
                "Pairs compared: {} (pruned {}, {:.1}%)",
                self.pairs_compared,
                self.pairs_pruned,
                self.prune_ratio() * 100.0
            ),
            format!(
                "Relations: {} equal, {} lesser",
                self.equal_relations, self.lesser_relations
            ),
        ];

        if self.dropped_self_loops > 0 || self.merged_cycles > 0 {
            lines.push(format!(
                "Repairs: {} self-loops dropped, {} cycles merged",
                self.dropped_self_loops, self.merged_cycles
            ));
        }

        let mut partial: Vec<(&Completion, &usize)> =
            self.jobs.iter().filter(|(c, _)| c.is_partial()).collect();
        if !partial.is_empty() {
            partial.sort_by_key(|(c, _)| c.as_str());
            lines.push(String::new());
            lines.push("Partial jobs:".to_string());
            for (completion, count) in partial {
                lines.push(format!("  {}: {}", completion.as_str(), count));
            }
        }

        if !self.skipped.is_empty() {
            let mut reasons: Vec<(&SkipReason, &usize)> = self.skipped.iter().collect();
            reasons.sort();
            lines.push(String::new());
            lines.push("Skipped archives:".to_string());
            for (reason, count) in reasons {
                lines.push(format!("  {}: {}", reason.as_str(), count));
            }
            lines.push(format!("  Total: {}", self.total_skipped()));
        }

        lines.join("\n")
    }
}
