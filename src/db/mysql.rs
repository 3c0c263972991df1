//! MySQL handle implementation.
//!
//! Provides the `MySqlHandle` struct that implements the `DatabaseHandle`
//! trait over a single sqlx `MySqlConnection`. BIGINT and DECIMAL values are
//! returned as strings to avoid silent precision loss.

use super::schema::{attach_columns, non_empty};
use super::types::{bytes_to_json, float_to_json};
use super::{Column, DatabaseHandle, Engine, RawResultSet, Row, Schema, Table};
use crate::classify::RawDbError;
use crate::config::ConnectionParameters;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlConnection, MySqlRow, MySqlSslMode};
use sqlx::types::chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::types::BigDecimal;
use sqlx::{Column as SqlxColumn, Connection, Executor, Row as SqlxRow, TypeInfo};
use std::time::Duration;
use tracing::{debug, warn};

/// MySQL connection handle.
#[derive(Debug)]
pub struct MySqlHandle {
    conn: Option<MySqlConnection>,
    query_timeout: Duration,
}

impl MySqlHandle {
    /// Opens one connection with TLS disabled and utf8mb4 as the charset.
    pub async fn connect(
        params: &ConnectionParameters,
        connect_timeout: Duration,
        query_timeout: Duration,
    ) -> Result<Self, RawDbError> {
        let options = MySqlConnectOptions::new()
            .host(params.host())
            .port(params.port())
            .username(params.username())
            .password(params.password())
            .database(params.database())
            .ssl_mode(MySqlSslMode::Disabled)
            .charset("utf8mb4");

        let mut conn =
            tokio::time::timeout(connect_timeout, MySqlConnection::connect_with(&options))
                .await
                .map_err(|_| RawDbError::timed_out("Connection", connect_timeout))??;

        // MariaDB has no max_execution_time; the client-side timeout still applies there.
        let set_timeout = format!(
            "SET SESSION max_execution_time = {}",
            query_timeout.as_millis()
        );
        if let Err(e) = conn.execute(sqlx::raw_sql(&set_timeout)).await {
            warn!("Could not set server-side statement timeout: {e}");
        }

        debug!("Opened mysql connection to {}", params.display_string());
        Ok(Self {
            conn: Some(conn),
            query_timeout,
        })
    }

    fn conn(&mut self) -> Result<&mut MySqlConnection, RawDbError> {
        self.conn
            .as_mut()
            .ok_or_else(|| RawDbError::new(Some("PROTOCOL_CONNECTION_LOST"), "Handle already closed"))
    }
}

#[async_trait]
impl DatabaseHandle for MySqlHandle {
    fn engine(&self) -> Engine {
        Engine::MySql
    }

    async fn probe(&mut self) -> Result<(), RawDbError> {
        let timeout = self.query_timeout;
        let conn = self.conn()?;
        tokio::time::timeout(timeout, sqlx::query("SELECT 1 AS test").execute(&mut *conn))
            .await
            .map_err(|_| RawDbError::timed_out("Probe", timeout))??;
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<RawResultSet, RawDbError> {
        let timeout = self.query_timeout;
        let conn = self.conn()?;

        // Prepared execution: one statement per call.
        let rows: Vec<MySqlRow> =
            tokio::time::timeout(timeout, sqlx::query(sql).fetch_all(&mut *conn))
                .await
                .map_err(|_| RawDbError::timed_out("Query", timeout))??;

        let columns = match rows.first() {
            Some(first) => Some(first.columns().iter().map(|c| c.name().to_string()).collect()),
            None => describe_columns(conn, sql).await,
        };

        Ok(RawResultSet::new(rows.iter().map(convert_row).collect(), columns))
    }

    async fn introspect_schema(&mut self, database: &str) -> Result<Schema, RawDbError> {
        let conn = self.conn()?;

        let table_rows: Vec<(String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT
                CAST(TABLE_NAME AS CHAR),
                CAST(TABLE_TYPE AS CHAR),
                CAST(TABLE_COMMENT AS CHAR)
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ?
            AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
            "#,
        )
        .bind(database)
        .fetch_all(&mut *conn)
        .await?;

        #[allow(clippy::type_complexity)]
        let column_rows: Vec<(
            String,
            String,
            String,
            String,
            Option<String>,
            Option<String>,
            Option<String>,
        )> = sqlx::query_as(
            r#"
            SELECT
                CAST(TABLE_NAME AS CHAR),
                CAST(COLUMN_NAME AS CHAR),
                CAST(DATA_TYPE AS CHAR),
                CAST(IS_NULLABLE AS CHAR),
                CAST(COLUMN_KEY AS CHAR),
                CAST(COLUMN_DEFAULT AS CHAR),
                CAST(COLUMN_COMMENT AS CHAR)
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ?
            ORDER BY TABLE_NAME, ORDINAL_POSITION
            "#,
        )
        .bind(database)
        .fetch_all(&mut *conn)
        .await?;

        let mut tables: Vec<Table> = table_rows
            .into_iter()
            .map(|(name, table_type, comment)| Table {
                table_type,
                comment: non_empty(comment),
                ..Table::new(name)
            })
            .collect();

        let columns = column_rows
            .into_iter()
            .map(|(table, name, data_type, is_nullable, key, default, comment)| {
                let column = Column {
                    key: non_empty(key),
                    default: non_empty(default),
                    comment: non_empty(comment),
                    ..Column::new(name, data_type).nullable(is_nullable == "YES")
                };
                (table, column)
            })
            .collect();
        attach_columns(&mut tables, columns);

        Ok(Schema {
            database: database.to_string(),
            engine: Engine::MySql,
            tables,
        })
    }

    async fn close(&mut self) -> Result<(), RawDbError> {
        match self.conn.take() {
            Some(conn) => conn.close().await.map_err(RawDbError::from),
            None => Ok(()),
        }
    }
}

async fn describe_columns(conn: &mut MySqlConnection, sql: &str) -> Option<Vec<String>> {
    conn.describe(sql)
        .await
        .ok()
        .map(|d| d.columns().iter().map(|c| c.name().to_string()).collect())
}

/// Converts a sqlx MySqlRow to a row object.
fn convert_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            (
                col.name().to_string(),
                convert_value(row, i, col.type_info().name()),
            )
        })
        .collect()
}

fn decode<'r, T>(row: &'r MySqlRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    row.try_get::<Option<T>, _>(index).ok().flatten()
}

fn decode_integer(row: &MySqlRow, index: usize) -> Option<JsonValue> {
    decode::<i64>(row, index)
        .map(JsonValue::from)
        .or_else(|| decode::<u64>(row, index).map(JsonValue::from))
}

fn decode_text_or_bytes(row: &MySqlRow, index: usize) -> Option<JsonValue> {
    decode::<String>(row, index)
        .map(JsonValue::String)
        .or_else(|| decode::<Vec<u8>>(row, index).map(bytes_to_json))
}

/// Converts a single column value to JSON.
fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> JsonValue {
    let value = match type_name.to_uppercase().as_str() {
        "BOOLEAN" => decode::<bool>(row, index).map(JsonValue::Bool),
        "BIGINT" => decode::<i64>(row, index).map(|v| JsonValue::String(v.to_string())),
        "BIGINT UNSIGNED" => decode::<u64>(row, index).map(|v| JsonValue::String(v.to_string())),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "TINYINT UNSIGNED"
        | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED" | "YEAR" => {
            decode_integer(row, index)
        }
        "FLOAT" => decode::<f32>(row, index).map(|v| float_to_json(v as f64)),
        "DOUBLE" => decode::<f64>(row, index).map(float_to_json),
        "DECIMAL" => decode::<BigDecimal>(row, index).map(|v| JsonValue::String(v.to_string())),
        "DATE" => decode::<NaiveDate>(row, index).map(|v| JsonValue::String(v.to_string())),
        "TIME" => decode::<NaiveTime>(row, index).map(|v| JsonValue::String(v.to_string())),
        "DATETIME" | "TIMESTAMP" => decode::<NaiveDateTime>(row, index)
            .map(|v| JsonValue::String(v.format("%Y-%m-%d %H:%M:%S%.f").to_string())),
        "JSON" => decode::<JsonValue>(row, index),
        "BIT" => decode_integer(row, index).or_else(|| decode_text_or_bytes(row, index)),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            decode_text_or_bytes(row, index)
        }
        _ => decode::<String>(row, index).map(JsonValue::String),
    };

    value.unwrap_or(JsonValue::Null)
}
