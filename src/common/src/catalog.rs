//! Catalog, sampling and execution interfaces to the target ClickHouse server.
//!
//! The retention pipeline only talks to ClickHouse through the three traits
//! defined here. [`crate::clickhouse::ClickHouseClient`] implements all of them
//! over the HTTP interface; tests use the in-memory fake from
//! [`crate::testing`] or the generated `Mock*` types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A row of `system.tables` before any physical-table filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    pub database: String,
    pub name: String,
    pub engine: String,
}

impl TableEntry {
    pub fn new(
        database: impl Into<String>,
        name: impl Into<String>,
        engine: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            name: name.into(),
            engine: engine.into(),
        }
    }
}

/// A column name with its raw declared type, e.g. `DateTime64(3, 'UTC')`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCatalogEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

impl ColumnCatalogEntry {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
        }
    }
}

/// Scalar decoded once at the catalog boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    UInt64(u64),
    Int64(i64),
    Float64(f64),
    String(String),
}

impl ScalarValue {
    /// Non-negative integer view of the value. Floats and strings are not
    /// coerced.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ScalarValue::UInt64(v) => Some(*v),
            ScalarValue::Int64(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }
}

impl From<serde_json::Value> for ScalarValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => ScalarValue::Null,
            Value::Bool(b) => ScalarValue::Bool(b),
            Value::Number(n) => {
                if let Some(v) = n.as_u64() {
                    ScalarValue::UInt64(v)
                } else if let Some(v) = n.as_i64() {
                    ScalarValue::Int64(v)
                } else {
                    n.as_f64().map_or(ScalarValue::Null, ScalarValue::Float64)
                }
            }
            Value::String(s) => ScalarValue::String(s),
            other => ScalarValue::String(other.to_string()),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Bool(v) => write!(f, "{v}"),
            ScalarValue::UInt64(v) => write!(f, "{v}"),
            ScalarValue::Int64(v) => write!(f, "{v}"),
            ScalarValue::Float64(v) => write!(f, "{v}"),
            ScalarValue::String(v) => write!(f, "{v}"),
        }
    }
}

/// Errors raised while talking to ClickHouse
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to connect to ClickHouse: {0}")]
    Connection(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ClickHouse returned HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Schema metadata queries.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SchemaCatalog: Send + Sync {
    /// All tables of `database`, ordered by name.
    async fn list_tables(&self, database: &str) -> CatalogResult<Vec<TableEntry>>;

    /// Columns of `database.table` in declaration order.
    async fn list_columns(
        &self,
        database: &str,
        table: &str,
    ) -> CatalogResult<Vec<ColumnCatalogEntry>>;
}

/// Reads a bounded number of positive values from one column.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RowSampler: Send + Sync {
    async fn sample(
        &self,
        database: &str,
        table: &str,
        column: &str,
        limit: usize,
    ) -> CatalogResult<Vec<ScalarValue>>;
}

/// Runs a schema-mutation statement.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    async fn execute(&self, statement: &str) -> CatalogResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_from_json_numbers() {
        assert_eq!(
            ScalarValue::from(json!(1700000000000000000u64)),
            ScalarValue::UInt64(1_700_000_000_000_000_000)
        );
        assert_eq!(ScalarValue::from(json!(-5)), ScalarValue::Int64(-5));
        assert_eq!(ScalarValue::from(json!(1.5)), ScalarValue::Float64(1.5));
        assert_eq!(ScalarValue::from(json!(u64::MAX)), ScalarValue::UInt64(u64::MAX));
    }

    #[test]
    fn test_scalar_from_json_other_kinds() {
        assert_eq!(ScalarValue::from(json!(null)), ScalarValue::Null);
        assert_eq!(ScalarValue::from(json!(true)), ScalarValue::Bool(true));
        assert_eq!(
            ScalarValue::from(json!("2024-01-01")),
            ScalarValue::String("2024-01-01".to_string())
        );
        assert_eq!(
            ScalarValue::from(json!([1, 2])),
            ScalarValue::String("[1,2]".to_string())
        );
    }

    #[test]
    fn test_as_u64() {
        assert_eq!(ScalarValue::UInt64(7).as_u64(), Some(7));
        assert_eq!(ScalarValue::Int64(7).as_u64(), Some(7));
        assert_eq!(ScalarValue::Int64(-7).as_u64(), None);
        assert_eq!(ScalarValue::Float64(7.0).as_u64(), None);
        assert_eq!(ScalarValue::String("7".into()).as_u64(), None);
        assert!(ScalarValue::Null.is_null());
    }

    #[test]
    fn test_column_entry_deserializes_type_field() {
        let entry: ColumnCatalogEntry =
            serde_json::from_value(json!({"name": "ts", "type": "DateTime"})).unwrap();
        assert_eq!(entry, ColumnCatalogEntry::new("ts", "DateTime"));
    }
}
