//! The `chttl` command: wiring of the retention pipeline and its stdout report.

pub mod app;
pub mod output;
