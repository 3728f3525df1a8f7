//! Per-table result of a retention run.

use std::fmt;

use crate::classifier::TimeColumnDecision;
use crate::scanner::TableDescriptor;

/// Terminal state of one table. A table is never both skipped and failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Skipped { reason: String },
    /// Statement built but not executed (dry run)
    Previewed,
    Applied,
    Failed { error: String },
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Skipped { reason } => write!(f, "skipped: {reason}"),
            OutcomeStatus::Previewed => f.write_str("previewed"),
            OutcomeStatus::Applied => f.write_str("applied"),
            OutcomeStatus::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub database: String,
    pub table: String,
    /// Absent only for skipped tables
    pub column: Option<TimeColumnDecision>,
    pub statement: Option<String>,
    pub status: OutcomeStatus,
}

impl MutationOutcome {
    pub fn skipped(table: &TableDescriptor, reason: impl Into<String>) -> Self {
        Self {
            database: table.database.clone(),
            table: table.table.clone(),
            column: None,
            statement: None,
            status: OutcomeStatus::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn previewed(table: &TableDescriptor, column: TimeColumnDecision, statement: String) -> Self {
        Self::with_statement(table, column, statement, OutcomeStatus::Previewed)
    }

    pub fn applied(table: &TableDescriptor, column: TimeColumnDecision, statement: String) -> Self {
        Self::with_statement(table, column, statement, OutcomeStatus::Applied)
    }

    pub fn failed(
        table: &TableDescriptor,
        column: TimeColumnDecision,
        statement: String,
        error: impl Into<String>,
    ) -> Self {
        Self::with_statement(
            table,
            column,
            statement,
            OutcomeStatus::Failed {
                error: error.into(),
            },
        )
    }

    fn with_statement(
        table: &TableDescriptor,
        column: TimeColumnDecision,
        statement: String,
        status: OutcomeStatus,
    ) -> Self {
        Self {
            database: table.database.clone(),
            table: table.table.clone(),
            column: Some(column),
            statement: Some(statement),
            status,
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, OutcomeStatus::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed { .. })
    }

    /// Applied, or previewed in a dry run.
    pub fn is_succeeded(&self) -> bool {
        matches!(self.status, OutcomeStatus::Applied | OutcomeStatus::Previewed)
    }

    pub fn is_applied(&self) -> bool {
        self.status == OutcomeStatus::Applied
    }

    pub fn skip_reason(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Skipped { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableDescriptor {
        TableDescriptor::new("db", "events", "MergeTree", vec!["ts".to_string()])
    }

    #[test]
    fn test_skipped_outcome() {
        let outcome = MutationOutcome::skipped(&table(), "no suitable time column found");
        assert!(outcome.is_skipped());
        assert!(!outcome.is_failed());
        assert!(!outcome.is_succeeded());
        assert_eq!(outcome.skip_reason(), Some("no suitable time column found"));
        assert_eq!(outcome.statement, None);
        assert_eq!(outcome.column, None);
        assert_eq!(outcome.qualified_name(), "db.events");
    }

    #[test]
    fn test_statement_outcomes() {
        let column = TimeColumnDecision::calendar("ts", "DateTime");
        let statement = "ALTER TABLE `db`.`events` MODIFY TTL `ts` + INTERVAL 1 DAY".to_string();

        let applied = MutationOutcome::applied(&table(), column.clone(), statement.clone());
        assert!(applied.is_applied() && applied.is_succeeded());

        let previewed = MutationOutcome::previewed(&table(), column.clone(), statement.clone());
        assert!(previewed.is_succeeded() && !previewed.is_applied());

        let failed = MutationOutcome::failed(&table(), column, statement, "Code: 36");
        assert!(failed.is_failed() && !failed.is_skipped() && !failed.is_succeeded());
        assert_eq!(failed.error(), Some("Code: 36"));
        assert!(failed.statement.is_some());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(OutcomeStatus::Applied.to_string(), "applied");
        assert_eq!(
            OutcomeStatus::Failed {
                error: "boom".to_string()
            }
            .to_string(),
            "failed: boom"
        );
    }
}
