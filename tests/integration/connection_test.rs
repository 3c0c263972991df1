//! Connection integration tests.
//!
//! Tests connectivity, retry and error classification against real sockets.

use std::sync::Arc;
use std::time::Duration;

use querygate::classify::ErrorCategory;
use querygate::config::ConnectionParameters;
use querygate::connection::{ConnectionFactory, FixedBackoff};
use querygate::db::{Engine, SqlxConnector};
use querygate::error::GateError;

fn factory(max_attempts: u32) -> ConnectionFactory {
    ConnectionFactory::new(
        Arc::new(SqlxConnector::new(
            Duration::from_secs(5),
            Duration::from_secs(5),
        )),
        Arc::new(FixedBackoff(Duration::ZERO)),
        max_attempts,
    )
}

fn live_params(var: &str) -> Option<ConnectionParameters> {
    let url = std::env::var(var).ok()?;
    ConnectionParameters::from_connection_string(&url).ok()
}

#[tokio::test]
async fn test_connect_with_valid_credentials() {
    let Some(params) = live_params("DATABASE_URL") else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let mut handle = factory(2).open(&params).await.unwrap();
    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_mysql_connect_with_valid_credentials() {
    let Some(params) = live_params("MYSQL_TEST_URL") else {
        eprintln!("Skipping test: MYSQL_TEST_URL not set");
        return;
    };

    let mut handle = factory(2).open(&params).await.unwrap();
    assert_eq!(handle.engine(), Engine::MySql);
    handle.close().await.unwrap();
}

#[tokio::test]
async fn test_wrong_password_is_auth_failure() {
    let Some(params) = live_params("DATABASE_URL") else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let params = params.with_password("definitely-not-the-password").unwrap();
    let err = factory(1).open(&params).await.err().unwrap();
    assert_eq!(err.classified().unwrap().category, ErrorCategory::AuthFailed);
}

#[tokio::test]
async fn test_missing_database_is_classified() {
    let Some(params) = live_params("DATABASE_URL") else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let params = ConnectionParameters::new(
        params.host(),
        params.port(),
        params.username(),
        params.password(),
        "querygate_no_such_database",
        params.engine(),
    )
    .unwrap();
    let err = factory(1).open(&params).await.err().unwrap();
    assert_eq!(
        err.classified().unwrap().category,
        ErrorCategory::DatabaseMissing
    );
}

#[tokio::test(flavor = "current_thread")]
async fn test_refused_port_is_host_unreachable_after_retries() {
    // Port 1 on loopback is closed on any sane test machine.
    let params =
        ConnectionParameters::new("127.0.0.1", 1, "testuser", "testpass", "testdb", Engine::Postgres)
            .unwrap();

    let err = factory(2).open(&params).await.err().unwrap();
    assert!(matches!(err, GateError::Connection(_)));

    let classified = err.classified().unwrap();
    assert_eq!(classified.category, ErrorCategory::HostUnreachable);
    assert_eq!(classified.raw_code.as_deref(), Some("ECONNREFUSED"));
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_invalid_host() {
    let params = ConnectionParameters::new(
        "invalid.host.that.does.not.exist.local",
        3306,
        "testuser",
        "testpass",
        "testdb",
        Engine::MySql,
    )
    .unwrap();

    let err = factory(1).open(&params).await.err().unwrap();
    assert!(matches!(err, GateError::Connection(_)));

    // Resolver behavior varies by system; the message is always the category's.
    let classified = err.classified().unwrap();
    assert_eq!(classified.user_message, classified.category.user_message());
}
