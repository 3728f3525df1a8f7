pub mod catalog;
pub mod cli;
pub mod clickhouse;
pub mod config;
pub mod identifier;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use catalog::{
    CatalogError, CatalogResult, ColumnCatalogEntry, RowSampler, ScalarValue, SchemaCatalog,
    StatementExecutor, TableEntry,
};
pub use clickhouse::ClickHouseClient;
pub use config::Configuration;
