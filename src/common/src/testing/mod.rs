//! Test utilities for chttl.
//!
//! This module provides a test configuration builder and an in-memory stand-in
//! for a ClickHouse server implementing every catalog trait.
//!
//! # Feature Flag
//!
//! This module is only available when the `testing` feature is enabled or during tests:
//!
//! ```toml
//! [dev-dependencies]
//! common = { path = "../common", features = ["testing"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use common::testing::InMemoryClickHouse;
//!
//! let server = InMemoryClickHouse::new()
//!     .with_table("db", "events", "MergeTree", &[("timestamp", "UInt64")])
//!     .with_u64_samples("db", "events", "timestamp", &[1_700_000_000_000_000_000]);
//! ```

mod config_builder;

pub use config_builder::TestConfigBuilder;

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::catalog::{
    CatalogError, CatalogResult, ColumnCatalogEntry, RowSampler, ScalarValue, SchemaCatalog,
    StatementExecutor, TableEntry,
};

#[derive(Debug, Clone)]
struct FakeTable {
    entry: TableEntry,
    columns: Vec<ColumnCatalogEntry>,
    samples: HashMap<String, Vec<ScalarValue>>,
    fail_columns: bool,
    fail_samples: HashSet<String>,
}

#[derive(Debug, Default)]
struct State {
    tables: Vec<FakeTable>,
    failing_statements: Vec<String>,
    fail_list_tables: bool,
    executed: Vec<String>,
    sampled: Vec<String>,
}

/// In-memory ClickHouse: tables, columns and column samples are declared up
/// front; executed statements are recorded.
#[derive(Debug, Default)]
pub struct InMemoryClickHouse {
    state: Mutex<State>,
}

fn server_error(message: String) -> CatalogError {
    CatalogError::Server {
        status: 500,
        message,
    }
}

impl InMemoryClickHouse {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn table_mut(&mut self, database: &str, table: &str) -> Option<&mut FakeTable> {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .tables
            .iter_mut()
            .find(|t| t.entry.database == database && t.entry.name == table)
    }

    /// Declare a table with `(name, type)` columns in declaration order.
    pub fn with_table(
        mut self,
        database: &str,
        name: &str,
        engine: &str,
        columns: &[(&str, &str)],
    ) -> Self {
        let table = FakeTable {
            entry: TableEntry::new(database, name, engine),
            columns: columns
                .iter()
                .map(|(name, ty)| ColumnCatalogEntry::new(*name, *ty))
                .collect(),
            samples: HashMap::new(),
            fail_columns: false,
            fail_samples: HashSet::new(),
        };
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .tables
            .push(table);
        self
    }

    /// Values stored in `column`; sampling returns the positive ones.
    pub fn with_samples(
        mut self,
        database: &str,
        table: &str,
        column: &str,
        values: Vec<ScalarValue>,
    ) -> Self {
        if let Some(t) = self.table_mut(database, table) {
            t.samples.insert(column.to_string(), values);
        }
        self
    }

    pub fn with_u64_samples(self, database: &str, table: &str, column: &str, values: &[u64]) -> Self {
        let values = values.iter().copied().map(ScalarValue::UInt64).collect();
        self.with_samples(database, table, column, values)
    }

    /// Listing the columns of this table fails.
    pub fn with_failing_columns(mut self, database: &str, table: &str) -> Self {
        if let Some(t) = self.table_mut(database, table) {
            t.fail_columns = true;
        }
        self
    }

    /// Sampling this column fails.
    pub fn with_failing_samples(mut self, database: &str, table: &str, column: &str) -> Self {
        if let Some(t) = self.table_mut(database, table) {
            t.fail_samples.insert(column.to_string());
        }
        self
    }

    /// Listing tables fails.
    pub fn with_failing_table_list(mut self) -> Self {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_list_tables = true;
        self
    }

    /// Statements containing `needle` are rejected.
    pub fn with_failing_statement(mut self, needle: &str) -> Self {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .failing_statements
            .push(needle.to_string());
        self
    }

    /// Statements executed successfully, in order.
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    /// `database.table.column` of every sampling call, in order.
    pub fn sampled(&self) -> Vec<String> {
        self.state().sampled.clone()
    }
}

#[async_trait]
impl SchemaCatalog for InMemoryClickHouse {
    async fn list_tables(&self, database: &str) -> CatalogResult<Vec<TableEntry>> {
        let state = self.state();
        if state.fail_list_tables {
            return Err(server_error("Code: 81. DB::Exception: Database does not exist".to_string()));
        }

        let mut tables: Vec<TableEntry> = state
            .tables
            .iter()
            .filter(|t| t.entry.database == database)
            .map(|t| t.entry.clone())
            .collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tables)
    }

    async fn list_columns(
        &self,
        database: &str,
        table: &str,
    ) -> CatalogResult<Vec<ColumnCatalogEntry>> {
        let state = self.state();
        match state
            .tables
            .iter()
            .find(|t| t.entry.database == database && t.entry.name == table)
        {
            Some(t) if t.fail_columns => Err(server_error(format!(
                "Code: 497. DB::Exception: not enough privileges on {database}.{table}"
            ))),
            Some(t) => Ok(t.columns.clone()),
            None => Ok(vec![]),
        }
    }
}

#[async_trait]
impl RowSampler for InMemoryClickHouse {
    async fn sample(
        &self,
        database: &str,
        table: &str,
        column: &str,
        limit: usize,
    ) -> CatalogResult<Vec<ScalarValue>> {
        let mut state = self.state();
        state.sampled.push(format!("{database}.{table}.{column}"));

        let Some(t) = state
            .tables
            .iter()
            .find(|t| t.entry.database == database && t.entry.name == table)
        else {
            return Err(server_error(format!(
                "Code: 60. DB::Exception: Table {database}.{table} does not exist"
            )));
        };

        if t.fail_samples.contains(column) {
            return Err(server_error(format!(
                "Code: 159. DB::Exception: Timeout exceeded while reading {column}"
            )));
        }

        Ok(t.samples
            .get(column)
            .map(|values| {
                values
                    .iter()
                    .filter(|v| !v.is_null() && v.as_u64() != Some(0))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl StatementExecutor for InMemoryClickHouse {
    async fn execute(&self, statement: &str) -> CatalogResult<()> {
        let mut state = self.state();
        if let Some(needle) = state
            .failing_statements
            .iter()
            .find(|needle| statement.contains(needle.as_str()))
        {
            return Err(server_error(format!(
                "Code: 36. DB::Exception: rejected statement matching {needle}"
            )));
        }

        state.executed.push(statement.to_string());
        Ok(())
    }
}
