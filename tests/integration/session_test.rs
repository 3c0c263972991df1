//! Session lifecycle integration tests.
//!
//! Drives connect / execute / ask / schema / status / disconnect end to end
//! over the mock connector.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use querygate::classify::{ErrorCategory, RawDbError};
use querygate::config::ConnectionParameters;
use querygate::connection::{ConnectionFactory, FixedBackoff, SessionManager};
use querygate::db::{Column, Engine, MockConnector, RawResultSet, Row, Schema, Table};
use querygate::demo::DemoService;
use querygate::error::GateError;
use querygate::generator::{KeywordGenerator, MockGenerator};
use querygate::query::QueryExecutor;
use querygate::session::{CredentialStore, MemorySessionStore, SessionId, SessionStore};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

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

fn executor(connector: MockConnector) -> QueryExecutor {
    QueryExecutor::new(ConnectionFactory::new(
        Arc::new(connector),
        Arc::new(FixedBackoff(Duration::ZERO)),
        2,
    ))
}

fn manager_with_store(connector: MockConnector, store: Arc<dyn SessionStore>) -> SessionManager {
    SessionManager::new(executor(connector), CredentialStore::new(store))
}

fn manager(connector: MockConnector) -> SessionManager {
    manager_with_store(connector, Arc::new(MemorySessionStore::new(None)))
}

fn five_customers() -> RawResultSet {
    let names = [
        "Atelier graphique",
        "Signal Gift Stores",
        "Australian Collectors, Co.",
        "La Rochelle Gifts",
        "Baane Mini Imports",
    ];
    let rows = names
        .iter()
        .map(|name| {
            let mut row = Row::new();
            row.insert("customerName".into(), json!(name));
            row
        })
        .collect();
    RawResultSet::new(rows, Some(vec!["customerName".to_string()]))
}

#[tokio::test]
async fn test_connect_then_execute_end_to_end() {
    let connector = MockConnector::new().with_result(five_customers());
    let stats = connector.stats();
    let store = Arc::new(MemorySessionStore::new(None));
    let manager = manager_with_store(connector, store.clone());
    let session = SessionId::generate();

    let summary = manager.connect(&session, &demo_params()).await.unwrap();
    assert_eq!(summary.db_type, Engine::MySql);
    assert_eq!(summary.session_id, session);

    // Metadata and password live under separate keys.
    let metadata = store.get(&session, querygate::session::METADATA_KEY).unwrap();
    assert!(!metadata.contains("demo_password"));
    assert_eq!(
        store.get(&session, querygate::session::PASSWORD_KEY).as_deref(),
        Some("demo_password")
    );

    let result = manager
        .execute(&session, "SELECT customerName FROM customers LIMIT 5")
        .await
        .unwrap();

    assert_eq!(result.row_count, 5);
    assert_eq!(result.columns, vec!["customerName".to_string()]);
    assert_eq!(stats.opens(), 2);
    assert_eq!(stats.closes(), 2);
}

#[tokio::test]
async fn test_retry_exhaustion_reports_host_unreachable() {
    let connector = MockConnector::new().failing_connect(
        2,
        RawDbError::new(Some("ECONNREFUSED"), "connect ECONNREFUSED 127.0.0.1:3306"),
    );
    let stats = connector.stats();
    let manager = manager(connector);

    let err = manager
        .connect(&SessionId::from("s"), &demo_params())
        .await
        .unwrap_err();

    assert_eq!(stats.connect_attempts(), 2);
    assert_eq!(
        err.classified().unwrap().category,
        ErrorCategory::HostUnreachable
    );
}

#[tokio::test]
async fn test_disconnect_then_execute_is_not_connected() {
    let manager = manager(MockConnector::new());
    let session = SessionId::from("s");
    assert_ok!(manager.connect(&session, &demo_params()).await);

    manager.disconnect(&session);
    let err = assert_err!(manager.execute(&session, "SELECT 1").await);
    assert_eq!(err, GateError::NotConnected);
}

#[tokio::test]
async fn test_expired_session_is_not_connected() {
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(Some(Duration::ZERO)));
    let manager = manager_with_store(MockConnector::new(), store);
    let session = SessionId::from("s");
    assert_ok!(manager.connect(&session, &demo_params()).await);

    assert!(!manager.status(&session).connected);
    assert_eq!(
        manager.schema(&session).await.unwrap_err(),
        GateError::NotConnected
    );
}

#[tokio::test]
async fn test_schema_uses_session_database() {
    let schema = Schema {
        tables: vec![Table::new("customers")
            .with_column(Column::new("customerNumber", "int").with_key("PRI"))
            .with_column(Column::new("customerName", "varchar"))],
        ..Schema::new("classicmodels", Engine::MySql)
    };
    let manager = manager(MockConnector::new().with_schema(schema.clone()));
    let session = SessionId::from("s");
    assert_ok!(manager.connect(&session, &demo_params()).await);

    let loaded = manager.schema(&session).await.unwrap();
    assert_eq!(loaded, schema);
    assert!(loaded.format_for_llm().contains("customerName"));
}

#[tokio::test]
async fn test_ask_with_keyword_generator() {
    let manager = manager(MockConnector::new().with_result(five_customers()));
    let session = SessionId::from("s");
    assert_ok!(manager.connect(&session, &demo_params()).await);

    let answer = manager
        .ask(&session, &KeywordGenerator::new(), "show customers")
        .await
        .unwrap();
    assert_eq!(answer.sql, "SELECT customerName, city, country FROM customers");
    assert_eq!(answer.result.row_count, 5);
}

#[tokio::test]
async fn test_generated_mutation_is_rejected_like_typed_sql() {
    let connector = MockConnector::new();
    let stats = connector.stats();
    let manager = manager(connector);
    let session = SessionId::from("s");
    assert_ok!(manager.connect(&session, &demo_params()).await);

    let generator = MockGenerator::new().with_default("SELECT * FROM orders; DELETE FROM orders");
    let generated = manager.ask(&session, &generator, "clean up orders").await;
    let typed = manager
        .execute(&session, "SELECT * FROM orders; DELETE FROM orders")
        .await;

    assert_eq!(generated.unwrap_err(), typed.unwrap_err());
    assert_eq!(stats.executions(), 0);
}

#[tokio::test]
async fn test_demo_service_end_to_end() {
    let connector = MockConnector::new().with_result(five_customers());
    let stats = connector.stats();
    let demo = DemoService::new(executor(connector), demo_params());

    let answer = demo.ask("top customers by credit").await.unwrap();
    assert!(answer.using_fallback);
    assert_eq!(answer.original_query, "top customers by credit");
    assert_eq!(answer.result.row_count, 5);
    assert_eq!(stats.opens(), stats.closes());

    let body = serde_json::to_value(&answer).unwrap();
    assert_eq!(body["rowCount"], 5);
    assert_eq!(body["originalQuery"], "top customers by credit");
}

#[tokio::test]
async fn test_concurrent_sessions_are_isolated() {
    let manager = Arc::new(manager(MockConnector::new()));

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                let session = SessionId::new(format!("session-{i}"));
                let params = demo_params().with_password(format!("pw-{i}")).unwrap();
                manager.connect(&session, &params).await.unwrap();
                manager.execute(&session, "SELECT 1").await.unwrap();
                if i % 2 == 0 {
                    manager.disconnect(&session);
                }
                session
            })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        let session = task.await.unwrap();
        let loaded = manager.credentials().load(&session);
        if i % 2 == 0 {
            assert_eq!(loaded.unwrap_err(), GateError::NotConnected);
        } else {
            assert_eq!(loaded.unwrap().password(), format!("pw-{i}"));
        }
    }
}
