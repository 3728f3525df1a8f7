//! Test configuration builder for creating test setups quickly.

use std::time::Duration;

use crate::config::{Configuration, SelectionPolicy};

/// Builder for creating test configurations.
///
/// Starts from a configuration that passes validation (database `test_db`,
/// 30 days retention, no pacing delay) so tests only spell out what they
/// care about.
///
/// # Example
///
/// ```rust,ignore
/// use common::testing::TestConfigBuilder;
///
/// let config = TestConfigBuilder::new()
///     .with_database("events")
///     .with_retention_days(7)
///     .dry_run()
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TestConfigBuilder {
    config: Configuration,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = Configuration::default();
        config.clickhouse.database = "test_db".to_string();
        config.retention.days = 30;
        config.retention.pacing_delay = Duration::ZERO;
        Self { config }
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.config.clickhouse.database = database.to_string();
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.config.retention.days = days;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.config.retention.dry_run = true;
        self
    }

    pub fn with_pacing_delay(mut self, delay: Duration) -> Self {
        self.config.retention.pacing_delay = delay;
        self
    }

    pub fn with_default_candidates(mut self, names: &[&str]) -> Self {
        self.config.detection.default_candidates = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_nano_threshold(mut self, threshold: u64) -> Self {
        self.config.detection.nano_threshold = threshold;
        self
    }

    pub fn with_sample_limit(mut self, limit: usize) -> Self {
        self.config.detection.sample_limit = limit;
        self
    }

    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.config.detection.selection = selection;
        self
    }

    pub fn build(self) -> Configuration {
        self.config
    }
}
