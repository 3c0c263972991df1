//! Database abstraction layer for querygate.
//!
//! Provides a trait-based interface over single, unpooled connections to
//! either supported engine. Driver errors are converted to [`RawDbError`]
//! here and never leave this module in their native form.

mod mock;
mod mysql;
mod postgres;
mod schema;
mod types;

pub use mock::{MockConnector, MockStats};
pub use mysql::MySqlHandle;
pub use postgres::PostgresHandle;
pub use schema::{Column, Schema, Table};
pub use types::{ExecutionResult, RawResultSet, Row};

use crate::classify::RawDbError;
use crate::config::{ConnectionParameters, RuntimeSettings};
use async_trait::async_trait;
use std::io;
use std::time::Duration;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Engine {
    #[serde(rename = "postgresql", alias = "postgres")]
    Postgres,
    #[serde(rename = "mysql")]
    MySql,
}

impl Engine {
    /// Returns the engine name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgresql",
            Self::MySql => "mysql",
        }
    }

    /// Parses an engine from a name or URL scheme.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" => Some(Self::MySql),
            _ => None,
        }
    }

    /// Returns the default port for this engine.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::MySql => 3306,
        }
    }

    /// Returns the URL scheme for this engine.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live, single-use connection to one database.
///
/// Owned by whoever opened it; never shared between requests. `close` is
/// idempotent: only the first call reaches the server.
#[async_trait]
pub trait DatabaseHandle: Send {
    /// The engine behind this handle.
    fn engine(&self) -> Engine;

    /// Liveness probe (`SELECT 1`).
    async fn probe(&mut self) -> Result<(), RawDbError>;

    /// Executes one statement and returns converted rows plus field metadata.
    async fn execute(&mut self, sql: &str) -> Result<RawResultSet, RawDbError>;

    /// Reads tables and columns from `information_schema`.
    async fn introspect_schema(&mut self, database: &str) -> Result<Schema, RawDbError>;

    /// Closes the connection.
    async fn close(&mut self) -> Result<(), RawDbError>;
}

/// Produces handles; one connection attempt per call, no retry.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        params: &ConnectionParameters,
    ) -> Result<Box<dyn DatabaseHandle>, RawDbError>;
}

/// Connector backed by sqlx, dispatching on the engine.
#[derive(Debug, Clone)]
pub struct SqlxConnector {
    connect_timeout: Duration,
    query_timeout: Duration,
}

impl SqlxConnector {
    pub fn new(connect_timeout: Duration, query_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            query_timeout,
        }
    }

    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self::new(settings.connect_timeout(), settings.query_timeout())
    }
}

impl Default for SqlxConnector {
    fn default() -> Self {
        Self::from_settings(&RuntimeSettings::default())
    }
}

#[async_trait]
impl Connector for SqlxConnector {
    async fn connect(
        &self,
        params: &ConnectionParameters,
    ) -> Result<Box<dyn DatabaseHandle>, RawDbError> {
        match params.engine() {
            Engine::Postgres => {
                let handle =
                    PostgresHandle::connect(params, self.connect_timeout, self.query_timeout)
                        .await?;
                Ok(Box::new(handle))
            }
            Engine::MySql => {
                let handle =
                    MySqlHandle::connect(params, self.connect_timeout, self.query_timeout).await?;
                Ok(Box::new(handle))
            }
        }
    }
}

impl From<sqlx::Error> for RawDbError {
    fn from(error: sqlx::Error) -> Self {
        let code = match &error {
            sqlx::Error::Database(db_error) => {
                if let Some(mysql_error) =
                    db_error.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
                {
                    Some(mysql_code_name(mysql_error.number()))
                } else {
                    db_error.code().map(|c| c.into_owned())
                }
            }
            sqlx::Error::Io(io_error) => io_code(io_error).map(String::from),
            sqlx::Error::PoolTimedOut => Some("ETIMEDOUT".to_string()),
            _ => None,
        };

        let message = match &error {
            sqlx::Error::Database(db_error) => db_error.message().to_string(),
            other => other.to_string(),
        };

        Self { code, message }
    }
}

/// Maps socket-level failures to errno-style names.
fn io_code(error: &io::Error) -> Option<&'static str> {
    match error.kind() {
        io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => Some("ECONNRESET"),
        io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
        io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe => {
            Some("PROTOCOL_CONNECTION_LOST")
        }
        _ => {
            let message = error.to_string().to_lowercase();
            if message.contains("failed to lookup address")
                || message.contains("name or service not known")
                || message.contains("nodename nor servname")
                || message.contains("no such host")
            {
                Some("ENOTFOUND")
            } else {
                None
            }
        }
    }
}

/// Symbolic names for the MySQL server error numbers we care about.
fn mysql_code_name(number: u16) -> String {
    let name = match number {
        1044 => "ER_DBACCESS_DENIED_ERROR",
        1045 => "ER_ACCESS_DENIED_ERROR",
        1049 => "ER_BAD_DB_ERROR",
        1054 => "ER_BAD_FIELD_ERROR",
        1064 => "ER_PARSE_ERROR",
        1146 => "ER_NO_SUCH_TABLE",
        1213 => "ER_LOCK_DEADLOCK",
        3024 => "ER_QUERY_TIMEOUT",
        _ => return number.to_string(),
    };
    name.to_string()
}
