//! TTL Enforcement Engine
//!
//! Walks the scanned tables one at a time: classify the time column, build
//! the `MODIFY TTL` statement, then execute it or only record it in dry-run
//! mode. A table that cannot be handled is recorded as skipped or failed and
//! the run moves on to the next one.
//!
//! ## Safety Guarantees
//!
//! - Dry-run mode never sends a mutation
//! - Cancellation stops before the next table, or while a table's time
//!   column is still being classified; a statement already sent is awaited
//! - Applied statements are never rolled back

use std::sync::Arc;

use common::catalog::{RowSampler, SchemaCatalog, StatementExecutor};
use common::config::Configuration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classifier::TimeColumnClassifier;
use crate::outcome::MutationOutcome;
use crate::pacing::{Pacer, pacer_for};
use crate::report::RunReport;
use crate::scanner::TableDescriptor;
use crate::statement::{InvalidRetentionWindow, RetentionWindow, synthesize};

pub const NO_TIME_COLUMN: &str = "no suitable time column found";

/// Position of a table in the run, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableProgress {
    pub index: usize,
    pub total: usize,
}

pub struct TtlEnforcer {
    classifier: TimeColumnClassifier,
    executor: Arc<dyn StatementExecutor>,
    pacer: Arc<dyn Pacer>,
    window: RetentionWindow,
    dry_run: bool,
}

impl TtlEnforcer {
    pub fn new(
        classifier: TimeColumnClassifier,
        executor: Arc<dyn StatementExecutor>,
        pacer: Arc<dyn Pacer>,
        window: RetentionWindow,
        dry_run: bool,
    ) -> Self {
        Self {
            classifier,
            executor,
            pacer,
            window,
            dry_run,
        }
    }

    /// Build an enforcer from the run configuration.
    pub fn from_config(
        config: &Configuration,
        catalog: Arc<dyn SchemaCatalog>,
        sampler: Arc<dyn RowSampler>,
        executor: Arc<dyn StatementExecutor>,
    ) -> Result<Self, InvalidRetentionWindow> {
        let window = RetentionWindow::new(config.retention.days)?;
        let classifier = TimeColumnClassifier::new(catalog, sampler, &config.detection);
        Ok(Self::new(
            classifier,
            executor,
            pacer_for(&config.retention),
            window,
            config.retention.dry_run,
        ))
    }

    pub fn window(&self) -> RetentionWindow {
        self.window
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Process a single table. Never returns an error: every problem ends up
    /// in the outcome.
    ///
    /// Returns `None` when `cancel` fires before the time column is decided.
    /// Once the statement is sent it runs to completion.
    pub async fn enforce_table(
        &self,
        table: &TableDescriptor,
        cancel: &CancellationToken,
    ) -> Option<MutationOutcome> {
        let detected = tokio::select! {
            detected = self
                .classifier
                .detect(&table.database, &table.table, &table.time_columns) => detected,
            _ = cancel.cancelled() => {
                warn!(table = %table.table, "Run cancelled while classifying table");
                return None;
            }
        };

        let decision = match detected {
            Ok(Some(decision)) => decision,
            Ok(None) => {
                let reason = skip_reason(&table.time_columns);
                info!(table = %table.table, reason = %reason, "Skipping table");
                return Some(MutationOutcome::skipped(table, reason));
            }
            Err(e) => {
                warn!(table = %table.table, error = %e, "Failed to read column catalog");
                return Some(MutationOutcome::skipped(
                    table,
                    format!("failed to read columns: {e}"),
                ));
            }
        };

        let statement = synthesize(&table.database, &table.table, &decision, self.window);
        debug!(
            table = %table.table,
            column = %decision.name,
            column_type = %decision.column_type,
            encoding = ?decision.encoding,
            "Detected time column"
        );

        if self.dry_run {
            info!(
                table = %table.table,
                statement = %statement,
                "[DRY RUN] Would modify TTL"
            );
            return Some(MutationOutcome::previewed(table, decision, statement));
        }

        let outcome = match self.executor.execute(&statement).await {
            Ok(()) => {
                info!(
                    table = %table.table,
                    column = %decision.name,
                    days = self.window.days(),
                    "TTL applied"
                );
                MutationOutcome::applied(table, decision, statement)
            }
            Err(e) => {
                warn!(table = %table.table, error = %e, "Failed to apply TTL");
                MutationOutcome::failed(
                    table,
                    decision,
                    statement,
                    format!("failed to execute TTL: {e}"),
                )
            }
        };
        Some(outcome)
    }

    /// Process `tables` in order, reporting each outcome to `on_outcome`.
    ///
    /// Between two tables the pacer is awaited in mutating mode. A cancelled
    /// token stops the loop before the next table, abandons a classification
    /// in progress and cuts a pause short.
    pub async fn enforce_all<F>(
        &self,
        tables: &[TableDescriptor],
        cancel: &CancellationToken,
        mut on_outcome: F,
    ) -> RunReport
    where
        F: FnMut(TableProgress, &MutationOutcome),
    {
        let total = tables.len();
        let mut report = RunReport::new();

        info!(
            tables = total,
            days = self.window.days(),
            dry_run = self.dry_run,
            "Starting TTL enforcement run"
        );

        for (i, table) in tables.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(remaining = total - i, "Run cancelled, remaining tables left untouched");
                report.mark_interrupted();
                break;
            }

            let Some(outcome) = self.enforce_table(table, cancel).await else {
                warn!(remaining = total - i, "Run cancelled, remaining tables left untouched");
                report.mark_interrupted();
                break;
            };
            on_outcome(TableProgress { index: i + 1, total }, &outcome);
            report.add(outcome);

            if !self.dry_run && i + 1 < total {
                tokio::select! {
                    _ = self.pacer.pause() => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }

        let summary = report.summarize();
        summary.log();
        report
    }
}

/// Why a table without a decision was skipped.
pub fn skip_reason(candidates: &[String]) -> String {
    if candidates.is_empty() {
        NO_TIME_COLUMN.to_string()
    } else {
        format!("time columns [{}] failed validation", candidates.join(", "))
    }
}
