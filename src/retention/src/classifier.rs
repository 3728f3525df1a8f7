//! Time-column classification.
//!
//! Picks the single column of a table that anchors the retention predicate.
//! Calendar-typed columns (`Date`, `Date32`, `DateTime`, `DateTime64`) are
//! unambiguous and accepted on type alone. `UInt64` columns may hold epoch
//! values of any resolution, so their data is sampled and only columns whose
//! values are nanosecond epochs are accepted.

use std::collections::HashMap;
use std::sync::Arc;

use common::catalog::{CatalogError, CatalogResult, ColumnCatalogEntry, RowSampler, SchemaCatalog};
use common::config::{DetectionConfig, SelectionPolicy};
use tracing::debug;

/// How the chosen column stores time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeEncoding {
    /// Native `Date*` storage type
    Calendar,
    /// `UInt64` nanoseconds since the Unix epoch
    EpochInteger,
}

/// The retention anchor chosen for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeColumnDecision {
    pub name: String,
    pub column_type: String,
    pub encoding: TimeEncoding,
}

impl TimeColumnDecision {
    pub fn calendar(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            encoding: TimeEncoding::Calendar,
        }
    }

    pub fn epoch_integer(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            encoding: TimeEncoding::EpochInteger,
        }
    }

    /// True for `DateTime64` columns, which TTL expressions cannot use as-is.
    pub fn has_sub_second_precision(&self) -> bool {
        self.encoding == TimeEncoding::Calendar && is_sub_second_type(&self.column_type)
    }
}

pub fn is_calendar_type(column_type: &str) -> bool {
    column_type.starts_with("Date")
}

pub fn is_sub_second_type(column_type: &str) -> bool {
    column_type.starts_with("DateTime64")
}

pub fn is_epoch_integer_type(column_type: &str) -> bool {
    column_type.starts_with("UInt64")
}

/// Why an integer column could not be confirmed as a nanosecond epoch
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("no data to sample in column {column}")]
    NoData { column: String },

    #[error("failed to sample column {column}: {source}")]
    Sampling {
        column: String,
        #[source]
        source: CatalogError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Any,
    CalendarOnly,
    EpochOnly,
}

impl Pass {
    fn admits_calendar(self) -> bool {
        matches!(self, Pass::Any | Pass::CalendarOnly)
    }

    fn admits_epoch(self) -> bool {
        matches!(self, Pass::Any | Pass::EpochOnly)
    }
}

pub struct TimeColumnClassifier {
    catalog: Arc<dyn SchemaCatalog>,
    sampler: Arc<dyn RowSampler>,
    config: DetectionConfig,
}

impl TimeColumnClassifier {
    pub fn new(
        catalog: Arc<dyn SchemaCatalog>,
        sampler: Arc<dyn RowSampler>,
        config: &DetectionConfig,
    ) -> Self {
        Self {
            catalog,
            sampler,
            config: config.clone(),
        }
    }

    /// Candidate names in priority order: the preferred list when it is
    /// non-empty, the configured defaults otherwise.
    pub fn candidate_order<'a>(&'a self, preferred: &'a [String]) -> &'a [String] {
        if preferred.is_empty() {
            &self.config.default_candidates
        } else {
            preferred
        }
    }

    /// Fetch the column catalog of `database.table` and classify it.
    pub async fn detect(
        &self,
        database: &str,
        table: &str,
        preferred: &[String],
    ) -> CatalogResult<Option<TimeColumnDecision>> {
        let columns = self.catalog.list_columns(database, table).await?;
        Ok(self.classify(database, table, &columns, preferred).await)
    }

    /// Choose the retention anchor among `columns`, or `None` when no
    /// candidate validates.
    pub async fn classify(
        &self,
        database: &str,
        table: &str,
        columns: &[ColumnCatalogEntry],
        preferred: &[String],
    ) -> Option<TimeColumnDecision> {
        let types: HashMap<&str, &str> = columns
            .iter()
            .map(|c| (c.name.as_str(), c.column_type.as_str()))
            .collect();
        let candidates = self.candidate_order(preferred);

        let passes: &[Pass] = match self.config.selection {
            SelectionPolicy::FirstMatch => &[Pass::Any],
            SelectionPolicy::CalendarFirst => &[Pass::CalendarOnly, Pass::EpochOnly],
        };

        for pass in passes {
            for name in candidates {
                let Some(column_type) = types.get(name.as_str()) else {
                    continue;
                };
                if let Some(decision) = self
                    .validate_candidate(database, table, name, column_type, *pass)
                    .await
                {
                    return Some(decision);
                }
            }
        }

        None
    }

    async fn validate_candidate(
        &self,
        database: &str,
        table: &str,
        name: &str,
        column_type: &str,
        pass: Pass,
    ) -> Option<TimeColumnDecision> {
        if is_calendar_type(column_type) {
            return pass
                .admits_calendar()
                .then(|| TimeColumnDecision::calendar(name, column_type));
        }

        if !is_epoch_integer_type(column_type) || !pass.admits_epoch() {
            return None;
        }

        match self.probe_nanosecond_resolution(database, table, name).await {
            Ok(true) => Some(TimeColumnDecision::epoch_integer(name, column_type)),
            Ok(false) => {
                debug!(
                    table = %table,
                    column = %name,
                    "Sampled values are not nanosecond epochs, skipping candidate"
                );
                None
            }
            Err(e) => {
                debug!(table = %table, column = %name, error = %e, "Skipping candidate");
                None
            }
        }
    }

    /// Sample positive values of `column` and report whether any of them is
    /// a nanosecond epoch (strictly above the configured threshold).
    pub async fn probe_nanosecond_resolution(
        &self,
        database: &str,
        table: &str,
        column: &str,
    ) -> Result<bool, ProbeError> {
        let samples = self
            .sampler
            .sample(database, table, column, self.config.sample_limit)
            .await
            .map_err(|source| ProbeError::Sampling {
                column: column.to_string(),
                source,
            })?;

        if samples.is_empty() {
            return Err(ProbeError::NoData {
                column: column.to_string(),
            });
        }

        Ok(samples
            .iter()
            .filter_map(|v| v.as_u64())
            .any(|v| v > self.config.nano_threshold))
    }
}
