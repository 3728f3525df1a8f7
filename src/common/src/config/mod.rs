use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Configuration file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "chttl.toml";

/// Prefix of environment overrides, e.g. `CHTTL__RETENTION__DAYS=30`
pub const ENV_PREFIX: &str = "CHTTL__";

/// Connection settings for the target ClickHouse server (HTTP interface)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    pub host: String,
    /// HTTP interface port
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Target database; every physical table in it is processed
    pub database: String,
    /// Use https instead of http
    pub secure: bool,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Client-side timeout of a single HTTP request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Sent as the `max_execution_time` setting with every query
    #[serde(with = "humantime_serde")]
    pub max_execution_time: Duration,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8123,
            user: "default".to_string(),
            password: String::new(),
            database: String::new(),
            secure: false,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            max_execution_time: Duration::from_secs(60),
        }
    }
}

impl ClickHouseConfig {
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}:{}/", self.host, self.port)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Retention window in days, must be positive
    pub days: u32,
    /// Print the statements without executing them
    pub dry_run: bool,
    /// Print every statement, not only in dry-run mode
    pub verbose: bool,
    /// Pause between two tables when statements are executed
    #[serde(with = "humantime_serde")]
    pub pacing_delay: Duration,
    /// Deadline for the whole run; remaining tables are left untouched once it expires
    #[serde(with = "humantime_serde", default, skip_serializing_if = "Option::is_none")]
    pub run_timeout: Option<Duration>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: 0,
            dry_run: false,
            verbose: false,
            pacing_delay: Duration::from_millis(100),
            run_timeout: None,
        }
    }
}

/// How the classifier walks the candidate list
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// The first candidate that validates wins
    #[default]
    FirstMatch,
    /// Calendar-typed candidates are all tried before any integer probe
    CalendarFirst,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Fallback candidate names, highest priority first
    pub default_candidates: Vec<String>,
    /// `UInt64` columns with one of these names are treated as epoch candidates during the scan
    pub epoch_column_names: Vec<String>,
    /// Rows read when probing an integer column
    pub sample_limit: usize,
    /// Sampled values strictly above this are nanosecond epochs
    pub nano_threshold: u64,
    pub selection: SelectionPolicy,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            default_candidates: vec![
                "timestamp".to_string(),
                "event_time".to_string(),
                "created_at".to_string(),
            ],
            epoch_column_names: vec![
                "timestamp".to_string(),
                "event_time".to_string(),
                "created_at".to_string(),
                "time".to_string(),
            ],
            sample_limit: 10,
            nano_threshold: 100_000_000_000_000_000,
            selection: SelectionPolicy::FirstMatch,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    pub clickhouse: ClickHouseConfig,
    pub retention: RetentionConfig,
    pub detection: DetectionConfig,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("host cannot be empty")]
    EmptyHost,

    #[error("invalid port: {0}, must be between 1 and 65535")]
    InvalidPort(u16),

    #[error("user cannot be empty")]
    EmptyUser,

    #[error("database cannot be empty")]
    EmptyDatabase,

    #[error("invalid retention days: {0}, must be greater than 0")]
    InvalidRetentionDays(u32),

    #[error("sample limit must be greater than 0")]
    InvalidSampleLimit,

    #[error("default candidate list cannot be empty")]
    EmptyDefaultCandidates,
}

impl Configuration {
    /// Layered provider: defaults, then the TOML file, then `CHTTL__` environment variables.
    pub fn figment(config_path: Option<&Path>) -> Figment {
        let file = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config = Self::figment(None).extract().map_err(Box::new)?;

        Ok(config)
    }

    /// Like [`Configuration::load`], but the file must exist.
    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        if !path.exists() {
            return Err(Box::new(figment::Error::from(format!(
                "configuration file not found: {}",
                path.display()
            ))));
        }

        let config = Self::figment(Some(path)).extract().map_err(Box::new)?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ch = &self.clickhouse;

        if ch.host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if ch.port == 0 {
            return Err(ConfigError::InvalidPort(ch.port));
        }
        if ch.user.is_empty() {
            return Err(ConfigError::EmptyUser);
        }
        if ch.database.is_empty() {
            return Err(ConfigError::EmptyDatabase);
        }
        if self.retention.days == 0 {
            return Err(ConfigError::InvalidRetentionDays(self.retention.days));
        }
        if self.detection.sample_limit == 0 {
            return Err(ConfigError::InvalidSampleLimit);
        }
        if self.detection.default_candidates.is_empty() {
            return Err(ConfigError::EmptyDefaultCandidates);
        }

        Ok(())
    }
}
