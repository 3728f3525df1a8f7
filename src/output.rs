//! Human-readable run report on stdout.
//!
//! Logs go to stderr through `tracing`; this module owns stdout so the
//! report stays readable when logs are redirected.

use std::io::{self, BufRead, Write};

use common::config::Configuration;
use retention::{MutationOutcome, OutcomeStatus, RunReport, TableDescriptor, TableProgress};

const RULE_WIDTH: usize = 60;
const TABLE_RULE_WIDTH: usize = 80;
const TABLE_NAME_WIDTH: usize = 40;
const ENGINE_WIDTH: usize = 20;

/// Cut `value` to fit in a column of `width` characters.
pub fn truncate(value: &str, width: usize) -> String {
    let max = width.saturating_sub(3);
    if value.chars().count() <= max {
        return value.to_string();
    }
    let kept: String = value.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

pub struct Reporter<W: Write> {
    out: W,
    verbose: bool,
    dry_run: bool,
}

impl Reporter<io::Stdout> {
    pub fn stdout(config: &Configuration) -> Self {
        Self::new(io::stdout(), config)
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, config: &Configuration) -> Self {
        Self {
            out,
            verbose: config.retention.verbose,
            dry_run: config.retention.dry_run,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn line(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{message}")
    }

    pub fn header(&mut self, config: &Configuration) -> io::Result<()> {
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(self.out, "{rule}")?;
        writeln!(
            self.out,
            "{} v{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        )?;
        writeln!(self.out, "{rule}")?;

        let ch = &config.clickhouse;
        writeln!(self.out)?;
        writeln!(self.out, "Configuration:")?;
        writeln!(self.out, "  Endpoint:       {}:{}", ch.host, ch.port)?;
        writeln!(self.out, "  Database:       {}", ch.database)?;
        writeln!(self.out, "  User:           {}", ch.user)?;
        writeln!(self.out, "  Retention:      {} days", config.retention.days)?;
        if config.retention.dry_run {
            writeln!(self.out, "  Mode:           preview (dry run)")
        } else {
            writeln!(self.out, "  Mode:           execute")
        }
    }

    pub fn table_summary(&mut self, tables: &[TableDescriptor]) -> io::Result<()> {
        let rule = "-".repeat(TABLE_RULE_WIDTH);
        writeln!(self.out)?;
        writeln!(self.out, "Tables:")?;
        writeln!(self.out, "{rule}")?;
        writeln!(
            self.out,
            "{:<name$} {:<engine$} Time columns",
            "Table",
            "Engine",
            name = TABLE_NAME_WIDTH,
            engine = ENGINE_WIDTH
        )?;
        writeln!(self.out, "{rule}")?;

        for table in tables {
            let columns = if table.time_columns.is_empty() {
                "-".to_string()
            } else {
                table.time_columns.join(", ")
            };
            writeln!(
                self.out,
                "{:<name$} {:<engine$} {}",
                truncate(&table.table, TABLE_NAME_WIDTH),
                truncate(&table.engine, ENGINE_WIDTH),
                columns,
                name = TABLE_NAME_WIDTH,
                engine = ENGINE_WIDTH
            )?;
        }

        let with_time = tables.iter().filter(|t| !t.time_columns.is_empty()).count();
        writeln!(self.out, "{rule}")?;
        writeln!(
            self.out,
            "{with_time} of {} tables have time columns",
            tables.len()
        )
    }

    pub fn progress(
        &mut self,
        progress: TableProgress,
        outcome: &MutationOutcome,
    ) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(
            self.out,
            "[{}/{}] {}",
            progress.index,
            progress.total,
            outcome.qualified_name()
        )?;

        if let OutcomeStatus::Skipped { reason } = &outcome.status {
            return writeln!(self.out, "  ✗ Skipped: {reason}");
        }

        if let Some(column) = &outcome.column {
            writeln!(
                self.out,
                "  ✓ Time column: {} ({})",
                column.name, column.column_type
            )?;
        }
        let show_sql = self.dry_run || self.verbose;
        if let Some(statement) = outcome.statement.as_ref().filter(|_| show_sql) {
            writeln!(self.out, "  → SQL: {statement}")?;
        }

        match &outcome.status {
            OutcomeStatus::Previewed => writeln!(self.out, "  ✓ Preview only (not executed)"),
            OutcomeStatus::Applied => writeln!(self.out, "  ✓ TTL applied"),
            OutcomeStatus::Failed { error } => writeln!(self.out, "  ✗ Failed: {error}"),
            OutcomeStatus::Skipped { .. } => Ok(()),
        }
    }

    pub fn summary(&mut self, report: &RunReport) -> io::Result<()> {
        let summary = report.summarize();
        let rule = "=".repeat(RULE_WIDTH);

        writeln!(self.out)?;
        writeln!(self.out, "{rule}")?;
        writeln!(self.out, "Summary")?;
        writeln!(self.out, "{rule}")?;
        writeln!(self.out)?;
        writeln!(self.out, "Tables:    {}", summary.total)?;
        writeln!(self.out, "✓ Success: {}", summary.succeeded)?;
        writeln!(self.out, "✗ Failed:  {}", summary.failed)?;
        writeln!(self.out, "⊝ Skipped: {}", summary.skipped)?;
        writeln!(self.out)?;
        writeln!(self.out, "Elapsed: {:.2}s", summary.elapsed.as_secs_f64())?;

        if summary.failed > 0 {
            writeln!(self.out)?;
            writeln!(self.out, "Failed tables:")?;
            for outcome in report.failures() {
                writeln!(
                    self.out,
                    "  - {}: {}",
                    outcome.qualified_name(),
                    outcome.error().unwrap_or_default()
                )?;
            }
        }

        if report.is_interrupted() {
            writeln!(self.out)?;
            writeln!(
                self.out,
                "Run interrupted: remaining tables were left untouched"
            )?;
        }

        if self.dry_run {
            writeln!(self.out)?;
            writeln!(self.out, "Hint: run again without --dry-run to apply")?;
        }
        Ok(())
    }

    /// Show what is about to happen and ask for the database name.
    ///
    /// Returns `true` only when the typed name matches `config`'s database.
    pub fn confirm<R: BufRead>(
        &mut self,
        input: &mut R,
        config: &Configuration,
        tables: usize,
    ) -> io::Result<bool> {
        let database = &config.clickhouse.database;
        let days = config.retention.days;
        let rule = "=".repeat(RULE_WIDTH);

        writeln!(self.out)?;
        writeln!(self.out, "{rule}")?;
        writeln!(self.out, "⚠️  Destructive operation")?;
        writeln!(self.out, "{rule}")?;
        writeln!(self.out)?;
        writeln!(self.out, "About to:")?;
        writeln!(self.out, "  • Database:  {database}")?;
        writeln!(self.out, "  • Tables:    {tables}")?;
        writeln!(self.out, "  • Retention: {days} days")?;
        writeln!(
            self.out,
            "  • Action:    set TTL (rows older than {days} days will be deleted)"
        )?;
        writeln!(self.out)?;
        writeln!(
            self.out,
            "⚠️  Existing TTL settings are replaced and deleted data cannot be recovered!"
        )?;
        write!(
            self.out,
            "\nType the database name '{database}' to confirm: "
        )?;
        self.out.flush()?;

        let mut answer = String::new();
        input.read_line(&mut answer)?;
        let confirmed = answer.trim() == database;

        writeln!(self.out)?;
        if confirmed {
            writeln!(self.out, "✓ Confirmed, starting...")?;
        } else {
            writeln!(self.out, "✗ Confirmation failed, nothing was changed")?;
        }
        Ok(confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testing::TestConfigBuilder;
    use retention::TimeColumnDecision;

    fn rendered<F>(config: &Configuration, f: F) -> String
    where
        F: FnOnce(&mut Reporter<Vec<u8>>) -> io::Result<()>,
    {
        let mut reporter = Reporter::new(Vec::new(), config);
        f(&mut reporter).unwrap();
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    fn table(name: &str) -> TableDescriptor {
        TableDescriptor::new("db", name, "MergeTree", vec!["ts".to_string()])
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 40), "short");
        let long = "a".repeat(50);
        let cut = truncate(&long, 40);
        assert_eq!(cut.len(), 37);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate("ReplicatedReplacingMergeTree", 20), "ReplicatedRepl...");
    }

    #[test]
    fn test_progress_for_skipped_table() {
        let config = TestConfigBuilder::new().build();
        let outcome = MutationOutcome::skipped(&table("t"), "no suitable time column found");
        let out = rendered(&config, |r| {
            r.progress(TableProgress { index: 2, total: 5 }, &outcome)
        });
        assert!(out.contains("[2/5] db.t"));
        assert!(out.contains("✗ Skipped: no suitable time column found"));
        assert!(!out.contains("SQL"));
    }

    #[test]
    fn test_progress_shows_sql_in_dry_run_only() {
        let column = TimeColumnDecision::calendar("ts", "DateTime");
        let statement = "ALTER TABLE `db`.`t` MODIFY TTL `ts` + INTERVAL 30 DAY".to_string();

        let config = TestConfigBuilder::new().dry_run().build();
        let outcome = MutationOutcome::previewed(&table("t"), column.clone(), statement.clone());
        let out = rendered(&config, |r| {
            r.progress(TableProgress { index: 1, total: 1 }, &outcome)
        });
        assert!(out.contains("✓ Time column: ts (DateTime)"));
        assert!(out.contains(&format!("→ SQL: {statement}")));
        assert!(out.contains("Preview only"));

        let config = TestConfigBuilder::new().build();
        let outcome = MutationOutcome::applied(&table("t"), column, statement);
        let out = rendered(&config, |r| {
            r.progress(TableProgress { index: 1, total: 1 }, &outcome)
        });
        assert!(!out.contains("SQL"));
        assert!(out.contains("✓ TTL applied"));
    }

    #[test]
    fn test_summary_lists_failures() {
        let config = TestConfigBuilder::new().build();
        let column = TimeColumnDecision::calendar("ts", "DateTime");
        let mut report = RunReport::new();
        report.add(MutationOutcome::applied(&table("a"), column.clone(), "A".to_string()));
        report.add(MutationOutcome::failed(&table("b"), column, "B".to_string(), "Code: 36"));

        let out = rendered(&config, |r| r.summary(&report));
        assert!(out.contains("Tables:    2"));
        assert!(out.contains("✓ Success: 1"));
        assert!(out.contains("✗ Failed:  1"));
        assert!(out.contains("  - db.b: Code: 36"));
        assert!(!out.contains("Hint"));
    }

    #[test]
    fn test_table_summary() {
        let config = TestConfigBuilder::new().build();
        let tables = vec![
            table("events"),
            TableDescriptor::new("db", "lookup", "Join", vec![]),
        ];
        let out = rendered(&config, |r| r.table_summary(&tables));
        assert!(out.contains("events"));
        assert!(out.contains("1 of 2 tables have time columns"));
    }

    #[test]
    fn test_confirm_requires_database_name() {
        let config = TestConfigBuilder::new().with_database("events").build();

        let mut reporter = Reporter::new(Vec::new(), &config);
        assert!(reporter.confirm(&mut "events\n".as_bytes(), &config, 3).unwrap());

        let mut reporter = Reporter::new(Vec::new(), &config);
        assert!(!reporter.confirm(&mut "yes\n".as_bytes(), &config, 3).unwrap());
        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(out.contains("Type the database name 'events' to confirm"));
        assert!(out.contains("nothing was changed"));

        let mut reporter = Reporter::new(Vec::new(), &config);
        assert!(!reporter.confirm(&mut "".as_bytes(), &config, 3).unwrap());
    }
}
