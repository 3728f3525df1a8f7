//! Aggregation of per-table outcomes into the run summary.

use std::time::{Duration, Instant};

use tracing::info;

use crate::outcome::MutationOutcome;

/// Outcomes collected during a run, in processing order.
#[derive(Debug)]
pub struct RunReport {
    outcomes: Vec<MutationOutcome>,
    started: Instant,
    interrupted: bool,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    /// Start the clock for the elapsed time of the summary.
    pub fn new() -> Self {
        Self {
            outcomes: Vec::new(),
            started: Instant::now(),
            interrupted: false,
        }
    }

    pub fn add(&mut self, outcome: MutationOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[MutationOutcome] {
        &self.outcomes
    }

    pub fn failures(&self) -> impl Iterator<Item = &MutationOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    /// Record that the run stopped before every table was processed.
    pub fn mark_interrupted(&mut self) {
        self.interrupted = true;
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    /// True when no table failed.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn summarize(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.outcomes.len(),
            elapsed: self.started.elapsed(),
            ..RunSummary::default()
        };
        for outcome in &self.outcomes {
            if outcome.is_failed() {
                summary.failed += 1;
            } else if outcome.is_skipped() {
                summary.skipped += 1;
            } else {
                summary.succeeded += 1;
            }
        }
        summary
    }
}

/// Totals of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    /// Applied, or previewed in a dry run
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn log(&self) {
        info!(
            total = self.total,
            succeeded = self.succeeded,
            failed = self.failed,
            skipped = self.skipped,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "Retention run summary"
        );
    }
}
