//! Query execution integration tests.
//!
//! Tests execution, result normalisation and handle release.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use querygate::classify::{ErrorCategory, RawDbError};
use querygate::config::{ConnectionParameters, DeploymentMode};
use querygate::connection::{ConnectionFactory, FixedBackoff};
use querygate::db::{Engine, MockConnector, RawResultSet, Row, SqlxConnector};
use querygate::error::GateError;
use querygate::query::QueryExecutor;
use querygate::safety::StatementGuard;
use serde_json::json;

fn executor_with(connector: MockConnector) -> QueryExecutor {
    QueryExecutor::new(ConnectionFactory::new(
        Arc::new(connector),
        Arc::new(FixedBackoff(Duration::ZERO)),
        2,
    ))
}

fn demo_params() -> ConnectionParameters {
    ConnectionParameters::new(
        "localhost",
        3306,
        "demo_user",
        "demo_password",
        "classicmodels",
        Engine::MySql,
    )
    .unwrap()
}

fn customers(n: usize) -> RawResultSet {
    let rows = (0..n)
        .map(|i| {
            let mut row = Row::new();
            row.insert("customerName".into(), json!(format!("Customer {i}")));
            row
        })
        .collect();
    RawResultSet::new(rows, Some(vec!["customerName".to_string()]))
}

#[tokio::test]
async fn test_result_invariants_hold() {
    let executor = executor_with(MockConnector::new().with_result(customers(5)));
    let statement = StatementGuard::new()
        .approve("SELECT customerName FROM customers LIMIT 5")
        .unwrap();

    let result = executor.execute(&demo_params(), &statement).await.unwrap();

    assert_eq!(result.row_count, result.rows.len());
    assert_eq!(result.columns, vec!["customerName".to_string()]);
    for row in &result.rows {
        assert!(row.keys().all(|k| result.columns.contains(k)));
    }
}

#[tokio::test]
async fn test_columns_derived_from_rows_without_metadata() {
    let mut row = Row::new();
    row.insert("a".into(), json!(1));
    row.insert("b".into(), json!("x"));
    let executor = executor_with(MockConnector::new().with_result(RawResultSet::new(vec![row], None)));
    let statement = StatementGuard::new().approve("SELECT a, b FROM t").unwrap();

    let result = executor.execute(&demo_params(), &statement).await.unwrap();
    assert_eq!(result.columns, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn test_every_path_closes_what_it_opens() {
    let scenarios = vec![
        MockConnector::new(),
        MockConnector::new().failing_execute(RawDbError::new(Some("ER_PARSE_ERROR"), "bad sql")),
        MockConnector::new().failing_probe(1, RawDbError::new(Some("ECONNRESET"), "reset")),
        MockConnector::new().failing_probe(2, RawDbError::new(Some("ECONNRESET"), "reset")),
        MockConnector::new().failing_connect(2, RawDbError::new(Some("ECONNREFUSED"), "refused")),
    ];
    let statement = StatementGuard::new().approve("SELECT 1").unwrap();

    for connector in scenarios {
        let stats = connector.stats();
        let _ = executor_with(connector).execute(&demo_params(), &statement).await;
        assert_eq!(stats.opens(), stats.closes());
    }
}

#[tokio::test]
async fn test_statement_errors_are_not_retried() {
    let connector = MockConnector::new().failing_execute(RawDbError::new(
        Some("ER_BAD_FIELD_ERROR"),
        "Unknown column 'nope' in 'field list'",
    ));
    let stats = connector.stats();
    let statement = StatementGuard::new().approve("SELECT nope FROM customers").unwrap();

    let err = executor_with(connector)
        .execute(&demo_params(), &statement)
        .await
        .unwrap_err();

    assert_eq!(stats.executions(), 1);
    assert_eq!(err.classified().unwrap().category, ErrorCategory::ColumnMissing);
}

#[tokio::test]
async fn test_error_response_hides_details_in_production() {
    let connector = MockConnector::new().failing_execute(RawDbError::new(
        Some("ER_NO_SUCH_TABLE"),
        "Table 'classicmodels.nope' doesn't exist",
    ));
    let statement = StatementGuard::new().approve("SELECT * FROM nope").unwrap();
    let err = executor_with(connector)
        .execute(&demo_params(), &statement)
        .await
        .unwrap_err();

    let production = err.to_response(DeploymentMode::Production);
    assert_eq!(production.error, "Table not found. Please check table names.");
    assert_eq!(production.code.as_deref(), Some("ER_NO_SUCH_TABLE"));
    assert!(production.details.is_none());

    let development = err.to_response(DeploymentMode::Development);
    assert_eq!(
        development.details.as_deref(),
        Some("Table 'classicmodels.nope' doesn't exist")
    );
}

#[tokio::test]
async fn test_live_select_against_postgres() {
    let Some(params) = std::env::var("DATABASE_URL")
        .ok()
        .and_then(|url| ConnectionParameters::from_connection_string(&url).ok())
    else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let executor = QueryExecutor::new(ConnectionFactory::new(
        Arc::new(SqlxConnector::new(Duration::from_secs(5), Duration::from_secs(5))),
        Arc::new(FixedBackoff(Duration::ZERO)),
        2,
    ));
    let statement = StatementGuard::new()
        .approve("SELECT 1 AS num, 'hello' AS greeting")
        .unwrap();

    let result = executor.execute(&params, &statement).await.unwrap();
    assert_eq!(result.columns, vec!["num".to_string(), "greeting".to_string()]);
    assert_eq!(result.rows[0]["greeting"], "hello");

    let missing = StatementGuard::new()
        .approve("SELECT * FROM querygate_missing_table")
        .unwrap();
    let err = executor.execute(&params, &missing).await.unwrap_err();
    assert!(matches!(err, GateError::Query(_)));
    assert_eq!(err.classified().unwrap().category, ErrorCategory::TableMissing);
}
