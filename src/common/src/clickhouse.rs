//! ClickHouse client over the HTTP interface.
//!
//! Catalog lookups bind their arguments as server-side query parameters
//! (`{database:String}` + `param_database=...`). Read queries are returned as
//! `JSONEachRow` and decoded once into typed rows or [`ScalarValue`]s.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::catalog::{
    CatalogError, CatalogResult, ColumnCatalogEntry, RowSampler, ScalarValue, SchemaCatalog,
    StatementExecutor, TableEntry,
};
use crate::config::ClickHouseConfig;
use crate::identifier::escape_identifier;

const LIST_TABLES_QUERY: &str = "SELECT database, name, engine \
     FROM system.tables \
     WHERE database = {database:String} \
     ORDER BY name";

const LIST_COLUMNS_QUERY: &str = "SELECT name, type \
     FROM system.columns \
     WHERE database = {database:String} AND table = {table:String} \
     ORDER BY position";

/// Alias of the probed column in sampling queries
const SAMPLE_ALIAS: &str = "value";

#[derive(Debug, Clone)]
pub struct ClickHouseClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
    database: String,
    max_execution_time_secs: u64,
}

impl ClickHouseClient {
    /// Build a client without contacting the server.
    pub fn new(config: &ClickHouseConfig) -> CatalogResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CatalogError::Connection(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            user: config.user.clone(),
            password: config.password.clone(),
            database: config.database.clone(),
            max_execution_time_secs: config.max_execution_time.as_secs().max(1),
        })
    }

    /// Build a client and verify the server answers `/ping`.
    pub async fn connect(config: &ClickHouseConfig) -> CatalogResult<Self> {
        let client = Self::new(config)?;
        client.ping().await?;
        log::info!("Connected to ClickHouse at {}", client.base_url);
        Ok(client)
    }

    pub async fn ping(&self) -> CatalogResult<()> {
        let url = format!("{}ping", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| CatalogError::Connection(format!("{url}: {e}")))?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK || body.trim() != "Ok." {
            return Err(CatalogError::Connection(format!(
                "unexpected ping response from {url}: HTTP {status} {}",
                body.trim()
            )));
        }

        Ok(())
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    async fn send(&self, sql: String, params: &[(&str, &str)]) -> CatalogResult<String> {
        let mut query: Vec<(String, String)> = vec![
            ("database".to_string(), self.database.clone()),
            (
                "max_execution_time".to_string(),
                self.max_execution_time_secs.to_string(),
            ),
            (
                "output_format_json_quote_64bit_integers".to_string(),
                "0".to_string(),
            ),
        ];
        for (name, value) in params {
            query.push((format!("param_{name}"), (*value).to_string()));
        }

        let mut request = self
            .http
            .post(&self.base_url)
            .query(&query)
            .header("X-ClickHouse-User", &self.user)
            .body(sql);
        if !self.password.is_empty() {
            request = request.header("X-ClickHouse-Key", &self.password);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CatalogError::Server {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }

        Ok(body)
    }

    async fn query_rows<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[(&str, &str)],
    ) -> CatalogResult<Vec<T>> {
        let body = self
            .send(format!("{sql} FORMAT JSONEachRow"), params)
            .await?;
        decode_rows(&body)
    }
}

/// Decode a `JSONEachRow` body, one object per non-empty line.
fn decode_rows<T: DeserializeOwned>(body: &str) -> CatalogResult<Vec<T>> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .map_err(|e| CatalogError::Decode(format!("{e} in row {line}")))
        })
        .collect()
}

#[async_trait]
impl SchemaCatalog for ClickHouseClient {
    async fn list_tables(&self, database: &str) -> CatalogResult<Vec<TableEntry>> {
        self.query_rows(LIST_TABLES_QUERY, &[("database", database)])
            .await
    }

    async fn list_columns(
        &self,
        database: &str,
        table: &str,
    ) -> CatalogResult<Vec<ColumnCatalogEntry>> {
        self.query_rows(
            LIST_COLUMNS_QUERY,
            &[("database", database), ("table", table)],
        )
        .await
    }
}

#[async_trait]
impl RowSampler for ClickHouseClient {
    async fn sample(
        &self,
        database: &str,
        table: &str,
        column: &str,
        limit: usize,
    ) -> CatalogResult<Vec<ScalarValue>> {
        let column = escape_identifier(column);
        let sql = format!(
            "SELECT {column} AS {SAMPLE_ALIAS} FROM {}.{} WHERE {column} > 0 LIMIT {limit}",
            escape_identifier(database),
            escape_identifier(table),
        );

        let rows: Vec<Map<String, Value>> = self.query_rows(&sql, &[]).await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| row.remove(SAMPLE_ALIAS))
            .map(ScalarValue::from)
            .collect())
    }
}

#[async_trait]
impl StatementExecutor for ClickHouseClient {
    async fn execute(&self, statement: &str) -> CatalogResult<()> {
        self.send(statement.to_string(), &[]).await?;
        Ok(())
    }
}
