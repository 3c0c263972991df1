//! Query result types.
//!
//! Defines the canonical result shape every engine is normalised into.

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

/// A row object mapping column name to value, in column order.
pub type Row = serde_json::Map<String, JsonValue>;

/// Rows and (optional) field metadata as reported by an engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResultSet {
    /// Converted rows.
    pub rows: Vec<Row>,

    /// Column names from field metadata, when the engine reported any.
    pub columns: Option<Vec<String>>,
}

impl RawResultSet {
    pub fn new(rows: Vec<Row>, columns: Option<Vec<String>>) -> Self {
        Self { rows, columns }
    }
}

/// The result of executing a statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Rows of data.
    #[serde(rename = "data")]
    pub rows: Vec<Row>,

    /// Column names in result order.
    pub columns: Vec<String>,

    /// Always equal to `rows.len()`.
    pub row_count: usize,

    /// When the statement finished.
    pub executed_at: DateTime<Utc>,
}

impl ExecutionResult {
    /// Normalises a raw result set.
    ///
    /// Field metadata wins when present; otherwise the keys of the first row
    /// are used. Any row key missing from the column list is appended so that
    /// every row's keys are a subset of `columns`.
    ///
    /// A zero-column select (`SELECT FROM t` in Postgres) yields rows with no
    /// fields. Those rows carry no data, so they are dropped to keep `columns`
    /// non-empty whenever `rows` is.
    pub fn from_raw(raw: RawResultSet, executed_at: DateTime<Utc>) -> Self {
        let RawResultSet { mut rows, columns } = raw;

        let mut columns = match columns {
            Some(columns) if !columns.is_empty() => columns,
            _ => rows
                .first()
                .map(|row| row.keys().cloned().collect())
                .unwrap_or_default(),
        };

        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        if columns.is_empty() && !rows.is_empty() {
            debug!("Dropping {} zero-column rows", rows.len());
            rows.clear();
        }

        let row_count = rows.len();
        Self {
            rows,
            columns,
            row_count,
            executed_at,
        }
    }

    /// Returns true if the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Encodes binary column data for JSON output.
pub(crate) fn bytes_to_json(bytes: Vec<u8>) -> JsonValue {
    JsonValue::String(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Converts a float, mapping NaN and infinities to their string form.
pub(crate) fn float_to_json(value: f64) -> JsonValue {
    serde_json::Number::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, JsonValue)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_metadata_columns_take_precedence() {
        let raw = RawResultSet::new(
            vec![row(&[("b", json!(2)), ("a", json!(1))])],
            Some(vec!["b".into(), "a".into()]),
        );
        let result = ExecutionResult::from_raw(raw, Utc::now());
        assert_eq!(result.columns, vec!["b", "a"]);
        assert_eq!(result.row_count, 1);
    }

    #[test]
    fn test_falls_back_to_first_row_keys() {
        let raw = RawResultSet::new(
            vec![row(&[("customerName", json!("Atelier graphique"))])],
            None,
        );
        let result = ExecutionResult::from_raw(raw, Utc::now());
        assert_eq!(result.columns, vec!["customerName"]);
    }

    #[test]
    fn test_empty_metadata_treated_as_absent() {
        let raw = RawResultSet::new(vec![row(&[("n", json!(1))])], Some(vec![]));
        let result = ExecutionResult::from_raw(raw, Utc::now());
        assert_eq!(result.columns, vec!["n"]);
    }

    #[test]
    fn test_no_rows_no_metadata_yields_empty_columns() {
        let result = ExecutionResult::from_raw(RawResultSet::default(), Utc::now());
        assert!(result.is_empty());
        assert!(result.columns.is_empty());
        assert_eq!(result.row_count, 0);
    }

    #[test]
    fn test_no_rows_keeps_metadata_columns() {
        let raw = RawResultSet::new(vec![], Some(vec!["id".into()]));
        let result = ExecutionResult::from_raw(raw, Utc::now());
        assert_eq!(result.columns, vec!["id"]);
        assert_eq!(result.row_count, 0);
    }

    #[test]
    fn test_zero_column_rows_are_dropped() {
        let raw = RawResultSet::new(vec![Row::new(), Row::new()], Some(vec![]));
        let result = ExecutionResult::from_raw(raw, Utc::now());
        assert!(result.rows.is_empty());
        assert!(result.columns.is_empty());
        assert_eq!(result.row_count, 0);
    }

    #[test]
    fn test_row_keys_are_subset_of_columns() {
        let raw = RawResultSet::new(
            vec![
                row(&[("a", json!(1))]),
                row(&[("a", json!(2)), ("extra", json!(true))]),
            ],
            Some(vec!["a".into()]),
        );
        let result = ExecutionResult::from_raw(raw, Utc::now());
        for r in &result.rows {
            assert!(r.keys().all(|k| result.columns.contains(k)));
        }
        assert_eq!(result.row_count, result.rows.len());
    }

    #[test]
    fn test_serialized_shape() {
        let raw = RawResultSet::new(vec![row(&[("x", json!(1))])], None);
        let json = serde_json::to_value(ExecutionResult::from_raw(raw, Utc::now())).unwrap();
        assert_eq!(json["data"][0]["x"], 1);
        assert_eq!(json["columns"], json!(["x"]));
        assert_eq!(json["rowCount"], 1);
        assert!(json["executedAt"].is_string());
    }

    #[test]
    fn test_value_helpers() {
        assert_eq!(bytes_to_json(vec![1, 2, 3]), json!("AQID"));
        assert_eq!(float_to_json(1.5), json!(1.5));
        assert_eq!(float_to_json(f64::NAN), json!("NaN"));
    }
}
