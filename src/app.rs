//! The `run` command: connect, scan, confirm, enforce, report.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use common::catalog::{RowSampler, SchemaCatalog, StatementExecutor};
use common::cli::Cli;
use common::cli::utils::{handle_common_command, load_config, validate_config, version_info};
use common::{ClickHouseClient, Configuration};
use retention::{RunReport, TableDescriptor, TableScanner, TtlEnforcer};
use tokio_util::sync::CancellationToken;

use crate::output::Reporter;

/// How the process ends when no error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Nothing left to do, or every table was handled without failure
    Completed,
    /// The confirmation prompt was not answered with the database name
    Declined,
    /// At least one table failed
    Failed { failed: usize },
    /// Stopped by Ctrl-C or the run timeout before every table was handled
    Interrupted,
}

impl RunStatus {
    pub fn from_report(report: &RunReport) -> Self {
        let summary = report.summarize();
        if summary.failed > 0 {
            RunStatus::Failed {
                failed: summary.failed,
            }
        } else if report.is_interrupted() {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        }
    }

    /// Process exit status: 1 if and only if a table failed.
    ///
    /// An interrupted run without failures exits 0; the summary says which
    /// tables were left untouched.
    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::Completed | RunStatus::Declined | RunStatus::Interrupted => 0,
            RunStatus::Failed { .. } => 1,
        }
    }
}

/// `chttl <version>` for the `version` command.
pub fn version_line() -> String {
    version_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

pub async fn run(cli: &Cli) -> Result<RunStatus> {
    let config = load_config(cli)?;
    if handle_common_command(&cli.command(), &config, &version_line())? {
        return Ok(RunStatus::Completed);
    }
    validate_config(&config)?;

    let mut reporter = Reporter::stdout(&config);
    reporter.header(&config)?;

    reporter.line("\nConnecting to ClickHouse...")?;
    let client = Arc::new(
        ClickHouseClient::connect(&config.clickhouse)
            .await
            .context("Failed to connect to ClickHouse")?,
    );
    reporter.line("✓ Connected")?;

    reporter.line("\nScanning tables...")?;
    let tables = TableScanner::new(client.clone(), &config.detection)
        .scan_tables(&config.clickhouse.database)
        .await
        .context("Failed to scan tables")?;
    reporter.line(&format!("✓ Found {} tables", tables.len()))?;

    if tables.is_empty() {
        reporter.line("\n⚠ The database has no tables, nothing to do")?;
        return Ok(RunStatus::Completed);
    }
    reporter.table_summary(&tables)?;

    if config.retention.dry_run {
        reporter.line("\n⚠️  Preview mode: statements are printed but not executed")?;
    } else if !cli.run.yes {
        let confirmed = reporter
            .confirm(&mut io::stdin().lock(), &config, tables.len())
            .context("Failed to read confirmation")?;
        if !confirmed {
            return Ok(RunStatus::Declined);
        }
    }

    let cancel = CancellationToken::new();
    spawn_cancellation(cancel.clone(), config.retention.run_timeout);

    reporter.line("\nProcessing...")?;
    let report = execute(
        &config,
        client.clone(),
        client.clone(),
        client,
        &tables,
        &cancel,
        &mut reporter,
    )
    .await?;
    cancel.cancel();

    reporter.summary(&report)?;
    Ok(RunStatus::from_report(&report))
}

/// Enforce the TTL on `tables`, printing progress as outcomes arrive.
pub async fn execute<W: Write>(
    config: &Configuration,
    catalog: Arc<dyn SchemaCatalog>,
    sampler: Arc<dyn RowSampler>,
    executor: Arc<dyn StatementExecutor>,
    tables: &[TableDescriptor],
    cancel: &CancellationToken,
    reporter: &mut Reporter<W>,
) -> Result<RunReport> {
    let enforcer = TtlEnforcer::from_config(config, catalog, sampler, executor)
        .context("Invalid retention window")?;

    let mut write_error = None;
    let report = enforcer
        .enforce_all(tables, cancel, |progress, outcome| {
            if let Err(e) = reporter.progress(progress, outcome) {
                if write_error.is_none() {
                    write_error = Some(e);
                }
            }
        })
        .await;

    if let Some(e) = write_error {
        return Err(e).context("Failed to write progress");
    }
    Ok(report)
}

/// Cancel `cancel` on Ctrl-C / SIGTERM or once `deadline` elapses.
fn spawn_cancellation(cancel: CancellationToken, deadline: Option<Duration>) {
    tokio::spawn(async move {
        let signal = async {
            if let Err(e) = wait_for_shutdown_signal().await {
                log::warn!("Signal handling unavailable: {e:#}");
                std::future::pending::<()>().await;
            }
        };
        let timeout = async {
            match deadline {
                Some(deadline) => tokio::time::sleep(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = signal => log::warn!("Stopping after the current table"),
            _ = timeout => log::warn!("Run timeout reached, stopping after the current table"),
            _ = cancel.cancelled() => return,
        }
        cancel.cancel();
    });
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => log::info!("Received SIGINT"),
            _ = sigterm.recv() => log::info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        log::info!("Received Ctrl+C");
    }

    Ok(())
}
