//! HTTP-level tests of the ClickHouse client against a wiremock server.

use common::catalog::{
    CatalogError, ColumnCatalogEntry, RowSampler, ScalarValue, SchemaCatalog, StatementExecutor,
    TableEntry,
};
use common::clickhouse::ClickHouseClient;
use common::config::ClickHouseConfig;
use wiremock::matchers::{body_string, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> ClickHouseConfig {
    let addr = server.address();
    ClickHouseConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        user: "admin".to_string(),
        password: "secret".to_string(),
        database: "events".to_string(),
        ..ClickHouseConfig::default()
    }
}

#[tokio::test]
async fn test_connect_pings_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Ok.\n"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ClickHouseClient::connect(&config_for(&server))
        .await
        .expect("ping should succeed");
    assert_eq!(client.database(), "events");
}

#[tokio::test]
async fn test_connect_fails_on_bad_ping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let result = ClickHouseClient::connect(&config_for(&server)).await;
    assert!(matches!(result, Err(CatalogError::Connection(_))));
}

#[tokio::test]
async fn test_list_tables_binds_database_parameter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(query_param("param_database", "events"))
        .and(query_param("database", "events"))
        .and(query_param("max_execution_time", "60"))
        .and(header("X-ClickHouse-User", "admin"))
        .and(header("X-ClickHouse-Key", "secret"))
        .and(body_string_contains("FROM system.tables"))
        .and(body_string_contains("{database:String}"))
        .and(body_string_contains("FORMAT JSONEachRow"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"database\":\"events\",\"name\":\"clicks\",\"engine\":\"MergeTree\"}\n\
             {\"database\":\"events\",\"name\":\"clicks_mv\",\"engine\":\"MaterializedView\"}\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = ClickHouseClient::new(&config_for(&server)).unwrap();
    let tables = client.list_tables("events").await.unwrap();

    assert_eq!(
        tables,
        vec![
            TableEntry::new("events", "clicks", "MergeTree"),
            TableEntry::new("events", "clicks_mv", "MaterializedView"),
        ]
    );
}

#[tokio::test]
async fn test_list_columns_binds_table_parameter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(query_param("param_database", "events"))
        .and(query_param("param_table", "odd`name"))
        .and(body_string_contains("FROM system.columns"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"name\":\"timestamp\",\"type\":\"UInt64\"}\n\
             {\"name\":\"event_time\",\"type\":\"DateTime64(3)\"}\n",
        ))
        .mount(&server)
        .await;

    let client = ClickHouseClient::new(&config_for(&server)).unwrap();
    let columns = client.list_columns("events", "odd`name").await.unwrap();

    assert_eq!(
        columns,
        vec![
            ColumnCatalogEntry::new("timestamp", "UInt64"),
            ColumnCatalogEntry::new("event_time", "DateTime64(3)"),
        ]
    );
}

#[tokio::test]
async fn test_sample_escapes_identifiers_and_decodes_values() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(query_param("output_format_json_quote_64bit_integers", "0"))
        .and(body_string(
            "SELECT `ts` AS value FROM `events`.`a``b` WHERE `ts` > 0 LIMIT 10 FORMAT JSONEachRow",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"value\":10}\n{\"value\":1700000000000000000}\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = ClickHouseClient::new(&config_for(&server)).unwrap();
    let values = client.sample("events", "a`b", "ts", 10).await.unwrap();

    assert_eq!(
        values,
        vec![
            ScalarValue::UInt64(10),
            ScalarValue::UInt64(1_700_000_000_000_000_000)
        ]
    );
}

#[tokio::test]
async fn test_execute_sends_statement_verbatim() {
    let statement = "ALTER TABLE `events`.`clicks` MODIFY TTL `ts` + INTERVAL 30 DAY";

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string(statement))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = ClickHouseClient::new(&config_for(&server)).unwrap();
    client.execute(statement).await.unwrap();
}

#[tokio::test]
async fn test_server_exception_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string(
            "Code: 36. DB::Exception: TTL expression result column should have DateTime or Date type\n",
        ))
        .mount(&server)
        .await;

    let client = ClickHouseClient::new(&config_for(&server)).unwrap();
    let err = client
        .execute("ALTER TABLE `events`.`t` MODIFY TTL `id` + INTERVAL 1 DAY")
        .await
        .unwrap_err();

    match err {
        CatalogError::Server { status, message } => {
            assert_eq!(status, 500);
            assert!(message.starts_with("Code: 36."));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_password_header_omitted_when_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-ClickHouse-User", "default"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.user = "default".to_string();
    config.password = String::new();

    let client = ClickHouseClient::new(&config).unwrap();
    let tables = client.list_tables("events").await.unwrap();
    assert!(tables.is_empty());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("X-ClickHouse-Key"));
}
