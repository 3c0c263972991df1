//! Database schema types.
//!
//! Represents the tables and columns reported by `information_schema`, and
//! renders them as context text for a SQL generator.

use super::Engine;
use serde::{Deserialize, Serialize};

/// Represents the schema of one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Database name the schema was read from.
    pub database: String,

    /// Engine that reported the schema.
    #[serde(rename = "dbType")]
    pub engine: Engine,

    /// Tables, ordered by name.
    pub tables: Vec<Table>,
}

impl Schema {
    /// Creates a new empty schema.
    pub fn new(database: impl Into<String>, engine: Engine) -> Self {
        Self {
            database: database.into(),
            engine,
            tables: Vec::new(),
        }
    }

    /// Finds a table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Formats the schema for inclusion in a SQL generator prompt.
    pub fn format_for_llm(&self) -> String {
        self.tables
            .iter()
            .map(Self::format_table_for_llm)
            .collect::<Vec<_>>()
            .join("")
    }

    fn format_table_for_llm(table: &Table) -> String {
        let column_lines = table
            .columns
            .iter()
            .map(Self::format_column_line)
            .collect::<Vec<_>>()
            .join("");

        format!("Table: {}\n{}\n", table.name, column_lines)
    }

    fn format_column_line(column: &Column) -> String {
        let annotations = [
            Some(column.data_type.as_str()),
            column.key.as_deref().and_then(key_label),
            (!column.is_nullable).then_some("NOT NULL"),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");

        format!("  - {} ({})\n", column.name, annotations)
    }
}

fn key_label(key: &str) -> Option<&'static str> {
    match key {
        "PRI" => Some("PRIMARY KEY"),
        "UNI" => Some("UNIQUE"),
        "MUL" => Some("INDEXED"),
        _ => None,
    }
}

/// Represents a database table or view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Table name.
    pub name: String,

    /// `BASE TABLE`, `VIEW`, ...
    pub table_type: String,

    /// Table comment, when the engine stores one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Columns in ordinal order.
    pub columns: Vec<Column>,
}

impl Table {
    /// Creates a new base table with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_type: "BASE TABLE".to_string(),
            comment: None,
            columns: Vec::new(),
        }
    }

    /// Adds a column.
    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }
}

/// Represents a column in a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Data type (e.g., "integer", "varchar").
    pub data_type: String,

    /// Whether the column allows NULL values.
    pub is_nullable: bool,

    /// MySQL `COLUMN_KEY` (`PRI`, `UNI`, `MUL`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Default value expression, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Column comment, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Column {
    /// Creates a new nullable column with the given name and data type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
            ..Default::default()
        }
    }

    /// Sets whether the column is nullable.
    pub fn nullable(self, nullable: bool) -> Self {
        Self {
            is_nullable: nullable,
            ..self
        }
    }

    /// Sets the key marker.
    pub fn with_key(self, key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..self
        }
    }

    /// Sets the default value.
    pub fn with_default(self, default: impl Into<String>) -> Self {
        Self {
            default: Some(default.into()),
            ..self
        }
    }
}

/// Groups `(table, column)` rows, already ordered by table then ordinal
/// position, into the matching tables.
pub(crate) fn attach_columns(tables: &mut [Table], columns: Vec<(String, Column)>) {
    for (table_name, column) in columns {
        if let Some(table) = tables.iter_mut().find(|t| t.name == table_name) {
            table.columns.push(column);
        }
    }
}

/// Normalises an empty string from `information_schema` to `None`.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
