//! PostgreSQL handle implementation.
//!
//! Provides the `PostgresHandle` struct that implements the `DatabaseHandle`
//! trait over a single sqlx `PgConnection`.

use super::schema::{attach_columns, non_empty};
use super::types::{bytes_to_json, float_to_json};
use super::{Column, DatabaseHandle, Engine, RawResultSet, Row, Schema, Table};
use crate::classify::RawDbError;
use crate::config::ConnectionParameters;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgSslMode, Postgres};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::types::{BigDecimal, Uuid};
use sqlx::{Column as SqlxColumn, Connection, Executor, Row as SqlxRow, TypeInfo};
use std::time::Duration;
use tracing::debug;

/// PostgreSQL connection handle.
#[derive(Debug)]
pub struct PostgresHandle {
    conn: Option<PgConnection>,
    query_timeout: Duration,
}

impl PostgresHandle {
    /// Opens one connection with TLS disabled and a server-side statement timeout.
    pub async fn connect(
        params: &ConnectionParameters,
        connect_timeout: Duration,
        query_timeout: Duration,
    ) -> Result<Self, RawDbError> {
        let options = PgConnectOptions::new()
            .host(params.host())
            .port(params.port())
            .username(params.username())
            .password(params.password())
            .database(params.database())
            .ssl_mode(PgSslMode::Disable)
            .options([("statement_timeout", query_timeout.as_millis().to_string())]);

        let conn = tokio::time::timeout(connect_timeout, PgConnection::connect_with(&options))
            .await
            .map_err(|_| RawDbError::timed_out("Connection", connect_timeout))??;

        debug!("Opened postgres connection to {}", params.display_string());
        Ok(Self {
            conn: Some(conn),
            query_timeout,
        })
    }

    fn conn(&mut self) -> Result<&mut PgConnection, RawDbError> {
        self.conn
            .as_mut()
            .ok_or_else(|| RawDbError::new(Some("PROTOCOL_CONNECTION_LOST"), "Handle already closed"))
    }
}

#[async_trait]
impl DatabaseHandle for PostgresHandle {
    fn engine(&self) -> Engine {
        Engine::Postgres
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

        // Prepared execution: the server refuses more than one statement.
        let rows: Vec<PgRow> =
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

        let table_rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT table_name::text, table_type::text
            FROM information_schema.tables
            WHERE table_schema = 'public'
            ORDER BY table_name
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        let column_rows: Vec<(String, String, String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT
                table_name::text,
                column_name::text,
                data_type::text,
                is_nullable::text,
                column_default::text
            FROM information_schema.columns
            WHERE table_schema = 'public'
            ORDER BY table_name, ordinal_position
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        let mut tables: Vec<Table> = table_rows
            .into_iter()
            .map(|(name, table_type)| Table {
                table_type,
                ..Table::new(name)
            })
            .collect();

        let columns = column_rows
            .into_iter()
            .map(|(table, name, data_type, is_nullable, default)| {
                let column = Column {
                    default: non_empty(default),
                    ..Column::new(name, data_type).nullable(is_nullable == "YES")
                };
                (table, column)
            })
            .collect();
        attach_columns(&mut tables, columns);

        Ok(Schema {
            database: database.to_string(),
            engine: Engine::Postgres,
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

/// Column names from the prepared statement, for results with no rows.
async fn describe_columns(conn: &mut PgConnection, sql: &str) -> Option<Vec<String>> {
    conn.describe(sql)
        .await
        .ok()
        .map(|d| d.columns().iter().map(|c| c.name().to_string()).collect())
}

/// Converts a sqlx PgRow to a row object.
fn convert_row(row: &PgRow) -> Row {
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

fn decode<'r, T>(row: &'r PgRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index).ok().flatten()
}

/// Converts a single column value to JSON.
///
/// Dates and arbitrary-precision numbers are rendered as strings.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> JsonValue {
    let value = match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => decode::<bool>(row, index).map(JsonValue::Bool),
        "INT2" | "SMALLINT" => decode::<i16>(row, index).map(JsonValue::from),
        "INT4" | "INT" | "INTEGER" => decode::<i32>(row, index).map(JsonValue::from),
        "INT8" | "BIGINT" => decode::<i64>(row, index).map(JsonValue::from),
        "FLOAT4" | "REAL" => decode::<f32>(row, index).map(|v| float_to_json(v as f64)),
        "FLOAT8" | "DOUBLE PRECISION" => decode::<f64>(row, index).map(float_to_json),
        "NUMERIC" => decode::<BigDecimal>(row, index).map(|v| JsonValue::String(v.to_string())),
        "DATE" => decode::<NaiveDate>(row, index).map(|v| JsonValue::String(v.to_string())),
        "TIME" => decode::<NaiveTime>(row, index).map(|v| JsonValue::String(v.to_string())),
        "TIMESTAMP" => decode::<NaiveDateTime>(row, index)
            .map(|v| JsonValue::String(v.format("%Y-%m-%d %H:%M:%S%.f").to_string())),
        "TIMESTAMPTZ" => {
            decode::<DateTime<Utc>>(row, index).map(|v| JsonValue::String(v.to_rfc3339()))
        }
        "JSON" | "JSONB" => decode::<JsonValue>(row, index),
        "UUID" => decode::<Uuid>(row, index).map(|v| JsonValue::String(v.to_string())),
        "BYTEA" => decode::<Vec<u8>>(row, index).map(bytes_to_json),
        "INTERVAL" => {
            decode::<PgInterval>(row, index).map(|v| JsonValue::String(format_interval(&v)))
        }
        "INET" => decode::<IpNetwork>(row, index).map(|v| JsonValue::String(format_network(&v, true))),
        "CIDR" => decode::<IpNetwork>(row, index).map(|v| JsonValue::String(format_network(&v, false))),
        "BOOL[]" => decode::<Vec<Option<bool>>>(row, index).map(JsonValue::from),
        "INT2[]" => decode::<Vec<Option<i16>>>(row, index).map(JsonValue::from),
        "INT4[]" => decode::<Vec<Option<i32>>>(row, index).map(JsonValue::from),
        "INT8[]" => decode::<Vec<Option<i64>>>(row, index).map(JsonValue::from),
        "FLOAT8[]" => decode::<Vec<Option<f64>>>(row, index).map(JsonValue::from),
        "NUMERIC[]" => decode::<Vec<Option<BigDecimal>>>(row, index).map(|values| {
            values
                .into_iter()
                .map(|v| v.map_or(JsonValue::Null, |d| JsonValue::String(d.to_string())))
                .collect()
        }),
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => {
            decode::<Vec<Option<String>>>(row, index).map(JsonValue::from)
        }
        // Text-like types; anything without a checked decoder becomes null
        _ => decode::<String>(row, index).map(JsonValue::String),
    };

    value.unwrap_or(JsonValue::Null)
}

/// Renders an interval the way psql does, e.g. `1 year 2 mons 3 days 04:05:06`.
fn format_interval(interval: &PgInterval) -> String {
    fn unit(n: i64, singular: &str, plural: &str) -> String {
        format!("{n} {}", if n.abs() == 1 { singular } else { plural })
    }

    let mut parts = Vec::new();
    let years = i64::from(interval.months / 12);
    let months = i64::from(interval.months % 12);
    if years != 0 {
        parts.push(unit(years, "year", "years"));
    }
    if months != 0 {
        parts.push(unit(months, "mon", "mons"));
    }
    if interval.days != 0 {
        parts.push(unit(i64::from(interval.days), "day", "days"));
    }

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let micros = interval.microseconds.unsigned_abs();
        let secs = micros / 1_000_000;
        let frac = micros % 1_000_000;
        let mut time = format!("{sign}{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60);
        if frac != 0 {
            time.push_str(format!(".{frac:06}").trim_end_matches('0'));
        }
        parts.push(time);
    }

    parts.join(" ")
}

/// INET host addresses drop the full-length prefix, as Postgres prints them.
fn format_network(network: &IpNetwork, is_inet: bool) -> String {
    let full = match network {
        IpNetwork::V4(_) => 32,
        IpNetwork::V6(_) => 128,
    };
    if is_inet && network.prefix() == full {
        network.ip().to_string()
    } else {
        network.to_string()
    }
}
