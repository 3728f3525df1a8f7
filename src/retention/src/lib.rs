//! TTL retention pipeline for ClickHouse tables.
//!
//! Tables are discovered by the [`scanner`], each table's time column is
//! picked by the [`classifier`], a `MODIFY TTL` statement is built by
//! [`statement`] and the [`enforcer`] applies (or previews) it, producing one
//! [`outcome::MutationOutcome`] per table. [`report::RunReport`] folds the
//! outcomes into the final summary.

pub mod classifier;
pub mod enforcer;
pub mod outcome;
pub mod pacing;
pub mod report;
pub mod scanner;
pub mod statement;

pub use classifier::{ProbeError, TimeColumnClassifier, TimeColumnDecision, TimeEncoding};
pub use enforcer::{TableProgress, TtlEnforcer};
pub use outcome::{MutationOutcome, OutcomeStatus};
pub use pacing::{FixedDelay, NoDelay, Pacer};
pub use report::{RunReport, RunSummary};
pub use scanner::{TableDescriptor, TableScanner};
pub use statement::{InvalidRetentionWindow, RetentionWindow};
