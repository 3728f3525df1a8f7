use clap::{Args, Parser, Subcommand};
use humantime_serde::re::humantime;
use std::path::PathBuf;
use std::time::Duration;

/// Set a data-retention TTL on every table of a ClickHouse database.
///
/// Scans the database, detects each table's time column
/// (timestamp / event_time / created_at, or any Date/DateTime column) and
/// applies `ALTER TABLE ... MODIFY TTL <column> + INTERVAL <N> DAY`.
/// DateTime, DateTime64 and nanosecond UInt64 columns are supported.
#[derive(Parser, Debug, Clone)]
#[command(name = "chttl", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub run: RunArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or_default()
    }
}

/// Arguments shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Configuration file path (default: ./chttl.toml if present)")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose logging and print every statement")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Enable quiet mode (warnings and errors only)")]
    pub quiet: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// ClickHouse server host
    #[arg(long, env = "CH_HOST", global = true)]
    pub host: Option<String>,

    /// ClickHouse HTTP interface port
    #[arg(long, env = "CH_PORT", global = true)]
    pub port: Option<u16>,

    /// ClickHouse user
    #[arg(long, env = "CH_USER", global = true)]
    pub user: Option<String>,

    /// ClickHouse password (prefer the environment variable)
    #[arg(long, env = "CH_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Target database
    #[arg(long, env = "CH_DATABASE", global = true)]
    pub database: Option<String>,

    /// Connect over https
    #[arg(long, global = true)]
    pub secure: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Number of days to keep data for
    #[arg(long, global = true)]
    pub retention_days: Option<u32>,

    /// Print the statements without executing them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Skip the interactive confirmation before executing statements
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Pause between two tables, e.g. "100ms"
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    pub pacing_delay: Option<Duration>,

    /// Deadline for the whole run, e.g. "10m"
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,
}

#[derive(Subcommand, Debug, Clone, Default)]
pub enum Commands {
    /// Scan the database and apply (or preview) the TTL statements (default)
    #[default]
    Run,
    /// Show the effective configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};
    use figment::providers::Serialized;
    use tracing_subscriber::EnvFilter;

    const MASKED: &str = "********";

    /// Initialize logging based on CLI arguments. `RUST_LOG` takes precedence.
    pub fn init_logging(args: &CommonArgs) {
        let level = if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    /// Load configuration: defaults, file, `CHTTL__*` environment, then CLI flags.
    pub fn load_config(cli: &Cli) -> Result<Configuration> {
        let mut figment = match &cli.common.config {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                if !path.exists() {
                    anyhow::bail!("Configuration file not found: {}", path.display());
                }
                Configuration::figment(Some(path))
            }
            None => Configuration::figment(None),
        };

        let conn = &cli.connection;
        if let Some(host) = &conn.host {
            figment = figment.merge(Serialized::default("clickhouse.host", host));
        }
        if let Some(port) = conn.port {
            figment = figment.merge(Serialized::default("clickhouse.port", port));
        }
        if let Some(user) = &conn.user {
            figment = figment.merge(Serialized::default("clickhouse.user", user));
        }
        if let Some(password) = &conn.password {
            figment = figment.merge(Serialized::default("clickhouse.password", password));
        }
        if let Some(database) = &conn.database {
            figment = figment.merge(Serialized::default("clickhouse.database", database));
        }
        if conn.secure {
            figment = figment.merge(Serialized::default("clickhouse.secure", true));
        }

        let run = &cli.run;
        if let Some(days) = run.retention_days {
            figment = figment.merge(Serialized::default("retention.days", days));
        }
        if run.dry_run {
            figment = figment.merge(Serialized::default("retention.dry_run", true));
        }
        if cli.common.verbose {
            figment = figment.merge(Serialized::default("retention.verbose", true));
        }
        if let Some(delay) = run.pacing_delay {
            figment = figment.merge(Serialized::default(
                "retention.pacing_delay",
                humantime::format_duration(delay).to_string(),
            ));
        }
        if let Some(timeout) = run.timeout {
            figment = figment.merge(Serialized::default(
                "retention.run_timeout",
                humantime::format_duration(timeout).to_string(),
            ));
        }

        figment
            .extract::<Configuration>()
            .context("Failed to load configuration")
    }

    /// Configuration with the password masked, for display.
    pub fn redacted(config: &Configuration) -> Configuration {
        let mut shown = config.clone();
        if !shown.clickhouse.password.is_empty() {
            shown.clickhouse.password = MASKED.to_string();
        }
        shown
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        let config = redacted(config);
        if json {
            let json = serde_json::to_string_pretty(&config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            let ch = &config.clickhouse;
            println!("chttl Configuration:");
            println!("====================");
            println!("Endpoint: {}", ch.base_url());
            println!("User: {}", ch.user);
            println!("Password: {}", ch.password);
            println!("Database: {}", ch.database);
            println!("Max execution time: {:?}", ch.max_execution_time);
            println!("Retention days: {}", config.retention.days);
            println!("Dry run: {}", config.retention.dry_run);
            println!("Pacing delay: {:?}", config.retention.pacing_delay);
            match config.retention.run_timeout {
                Some(timeout) => println!("Run timeout: {timeout:?}"),
                None => println!("Run timeout: none"),
            }
            println!(
                "Default candidates: {}",
                config.detection.default_candidates.join(", ")
            );
            println!("Selection policy: {:?}", config.detection.selection);
            println!("Nanosecond threshold: {}", config.detection.nano_threshold);
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");
        config
            .validate()
            .context("Configuration validation failed")?;
        log::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Handle commands that don't touch the database.
    ///
    /// Returns `true` when the command was handled and the process should exit.
    /// `version` prints `version`, which the binary builds with [`version_info`].
    pub fn handle_common_command(
        command: &Commands,
        config: &Configuration,
        version: &str,
    ) -> Result<bool> {
        match command {
            Commands::Config { json } => {
                display_config(config, *json)?;
                Ok(true)
            }
            Commands::Validate => {
                validate_config(config)?;
                Ok(true)
            }
            Commands::Version => {
                println!("{version}");
                Ok(true)
            }
            Commands::Run => Ok(false),
        }
    }

    /// Standard version information for the binary `name` at `version`.
    pub fn version_info(name: &str, version: &str) -> String {
        format!("{name} {version}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_commands_default() {
        let cli = Cli::try_parse_from(["chttl"]).unwrap();
        assert!(matches!(cli.command(), Commands::Run));
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "chttl",
            "--database",
            "events",
            "--retention-days",
            "30",
            "--dry-run",
            "--pacing-delay",
            "250ms",
            "--timeout",
            "10m",
            "-y",
        ])
        .unwrap();

        assert_eq!(cli.connection.database.as_deref(), Some("events"));
        assert_eq!(cli.run.retention_days, Some(30));
        assert!(cli.run.dry_run);
        assert!(cli.run.yes);
        assert_eq!(cli.run.pacing_delay, Some(Duration::from_millis(250)));
        assert_eq!(cli.run.timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_parse_config_subcommand() {
        let cli = Cli::try_parse_from(["chttl", "config", "--json"]).unwrap();
        assert!(matches!(cli.command(), Commands::Config { json: true }));
    }

    #[test]
    fn test_cli_flags_override_file_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "chttl.toml",
                r#"
                [clickhouse]
                host = "from-file"
                database = "file_db"

                [retention]
                days = 90
                "#,
            )?;
            jail.set_env("CHTTL__CLICKHOUSE__USER", "env_user");

            let cli = Cli::try_parse_from([
                "chttl",
                "--host",
                "from-cli",
                "--retention-days",
                "7",
                "--verbose",
            ])
            .map_err(|e| e.to_string())?;

            let config = utils::load_config(&cli).map_err(|e| e.to_string())?;
            assert_eq!(config.clickhouse.host, "from-cli");
            assert_eq!(config.clickhouse.database, "file_db");
            assert_eq!(config.clickhouse.user, "env_user");
            assert_eq!(config.retention.days, 7);
            assert!(config.retention.verbose);
            assert!(!config.retention.dry_run);
            Ok(())
        });
    }

    #[test]
    fn test_load_config_with_duration_flags() {
        Jail::expect_with(|_jail| {
            let cli = Cli::try_parse_from([
                "chttl",
                "--pacing-delay",
                "2s",
                "--timeout",
                "1h",
            ])
            .map_err(|e| e.to_string())?;

            let config = utils::load_config(&cli).map_err(|e| e.to_string())?;
            assert_eq!(config.retention.pacing_delay, Duration::from_secs(2));
            assert_eq!(config.retention.run_timeout, Some(Duration::from_secs(3600)));
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_config_file_is_an_error() {
        let cli = Cli::try_parse_from(["chttl", "--config", "/nonexistent/chttl.toml"]).unwrap();
        assert!(utils::load_config(&cli).is_err());
    }

    #[test]
    fn test_redacted_masks_password() {
        let mut config = crate::config::Configuration::default();
        config.clickhouse.password = "hunter2".to_string();

        let shown = utils::redacted(&config);
        assert_eq!(shown.clickhouse.password, "********");
        assert_eq!(config.clickhouse.password, "hunter2");
    }

    #[test]
    fn test_version_info() {
        assert_eq!(utils::version_info("chttl", "1.2.3"), "chttl 1.2.3");
    }

    #[test]
    fn test_run_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "chttl",
            "run",
            "--database",
            "events",
            "--retention-days",
            "7",
            "--dry-run",
            "--verbose",
        ])
        .unwrap();

        assert!(matches!(cli.command(), Commands::Run));
        assert_eq!(cli.connection.database.as_deref(), Some("events"));
        assert_eq!(cli.run.retention_days, Some(7));
        assert!(cli.run.dry_run);
        assert!(cli.common.verbose);
    }

    #[test]
    fn test_config_flag_after_config_subcommand() {
        let cli = Cli::try_parse_from(["chttl", "config", "--json", "--host", "ch-1"]).unwrap();
        assert!(matches!(cli.command(), Commands::Config { json: true }));
        assert_eq!(cli.connection.host.as_deref(), Some("ch-1"));
    }
}
