//! Discovery of the physical tables of a database and their candidate time
//! columns.

use std::collections::HashSet;
use std::sync::Arc;

use common::catalog::{CatalogResult, ColumnCatalogEntry, SchemaCatalog, TableEntry};
use common::config::DetectionConfig;
use tracing::{debug, info, warn};

use crate::classifier::{is_calendar_type, is_epoch_integer_type};

const EXCLUDED_DATABASES: &[&str] = &["system", "INFORMATION_SCHEMA", "information_schema"];
const EXCLUDED_ENGINES: &[&str] = &["View", "MaterializedView", "Dictionary", "Distributed"];

/// A physical table together with the columns worth classifying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub database: String,
    pub table: String,
    pub engine: String,
    /// Time-typed columns in declaration order
    pub time_columns: Vec<String>,
}

impl TableDescriptor {
    pub fn new(
        database: impl Into<String>,
        table: impl Into<String>,
        engine: impl Into<String>,
        time_columns: Vec<String>,
    ) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            engine: engine.into(),
            time_columns,
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }
}

/// Whether a `system.tables` row stores data of its own.
///
/// Views, dictionaries, distributed tables, system tables and the `.inner`
/// storage of materialized views cannot carry a TTL of their own.
pub fn is_physical_table(entry: &TableEntry) -> bool {
    !EXCLUDED_DATABASES.contains(&entry.database.as_str())
        && !EXCLUDED_ENGINES.contains(&entry.engine.as_str())
        && !entry.engine.starts_with("System")
        && !entry.name.starts_with(".inner")
        && !entry.name.starts_with("system")
}

pub struct TableScanner {
    catalog: Arc<dyn SchemaCatalog>,
    epoch_column_names: Vec<String>,
}

impl TableScanner {
    pub fn new(catalog: Arc<dyn SchemaCatalog>, config: &DetectionConfig) -> Self {
        Self {
            catalog,
            epoch_column_names: config.epoch_column_names.clone(),
        }
    }

    /// List the physical tables of `database` with their candidate columns.
    ///
    /// Failing to list the tables is an error; failing to list one table's
    /// columns only leaves that table without candidates.
    pub async fn scan_tables(&self, database: &str) -> CatalogResult<Vec<TableDescriptor>> {
        let entries = self.catalog.list_tables(database).await?;
        let listed = entries.len();

        let mut tables = Vec::with_capacity(listed);
        for entry in entries.into_iter().filter(is_physical_table) {
            let time_columns = match self.catalog.list_columns(&entry.database, &entry.name).await
            {
                Ok(columns) => self.time_columns(&columns),
                Err(e) => {
                    warn!(
                        database = %entry.database,
                        table = %entry.name,
                        error = %e,
                        "Failed to scan time columns, falling back to default candidates"
                    );
                    Vec::new()
                }
            };

            debug!(
                table = %entry.name,
                engine = %entry.engine,
                candidates = ?time_columns,
                "Discovered table"
            );
            tables.push(TableDescriptor::new(
                entry.database,
                entry.name,
                entry.engine,
                time_columns,
            ));
        }

        info!(
            database = %database,
            listed,
            physical = tables.len(),
            "Table scan completed"
        );
        Ok(tables)
    }

    /// Calendar columns and epoch-named `UInt64` columns, de-duplicated, in
    /// declaration order.
    pub fn time_columns(&self, columns: &[ColumnCatalogEntry]) -> Vec<String> {
        let mut seen = HashSet::new();
        columns
            .iter()
            .filter(|c| {
                is_calendar_type(&c.column_type)
                    || (is_epoch_integer_type(&c.column_type)
                        && self.epoch_column_names.iter().any(|n| *n == c.name))
            })
            .filter(|c| seen.insert(c.name.as_str()))
            .map(|c| c.name.clone())
            .collect()
    }
}
