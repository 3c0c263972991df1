//! Driver error classification.
//!
//! Maps engine-specific error codes and messages from both supported engines
//! onto a small, engine-independent taxonomy with stable user-facing messages.

use crate::config::DeploymentMode;
use serde::Serialize;
use std::fmt;

/// A driver failure normalised at the point it was caught.
///
/// `code` is the engine's vocabulary: a SQLSTATE for Postgres, a symbolic
/// `ER_*` name (or the numeric code when unknown) for MySQL, or an errno-style
/// name such as `ECONNREFUSED` for socket-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDbError {
    pub code: Option<String>,
    pub message: String,
}

impl RawDbError {
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(String::from),
            message: message.into(),
        }
    }

    /// A client-side deadline expiring before the engine answered.
    pub fn timed_out(what: &str, after: std::time::Duration) -> Self {
        Self::new(
            Some("ETIMEDOUT"),
            format!("{what} timed out after {} ms", after.as_millis()),
        )
    }
}

impl fmt::Display for RawDbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// User-facing error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    HostUnreachable,
    Timeout,
    AuthFailed,
    DatabaseMissing,
    ConnectionLost,
    SyntaxError,
    TableMissing,
    ColumnMissing,
    Unknown,
}

impl ErrorCategory {
    /// Maps a raw code and message onto a category. Never fails.
    pub fn from_raw(code: Option<&str>, message: &str) -> Self {
        let by_code = code.and_then(|code| match code {
            "ECONNREFUSED" | "ENOTFOUND" => Some(Self::HostUnreachable),
            "ETIMEDOUT" | "57014" | "ER_QUERY_TIMEOUT" => Some(Self::Timeout),
            "ER_ACCESS_DENIED_ERROR" | "28P01" => Some(Self::AuthFailed),
            "ER_BAD_DB_ERROR" | "3D000" => Some(Self::DatabaseMissing),
            "ECONNRESET" | "PROTOCOL_CONNECTION_LOST" => Some(Self::ConnectionLost),
            "ER_PARSE_ERROR" | "42601" => Some(Self::SyntaxError),
            "ER_NO_SUCH_TABLE" | "42P01" => Some(Self::TableMissing),
            "ER_BAD_FIELD_ERROR" | "42703" => Some(Self::ColumnMissing),
            _ => None,
        });

        by_code.unwrap_or_else(|| {
            let message = message.to_lowercase();
            if message.contains("timeout") || message.contains("timed out") {
                Self::Timeout
            } else {
                Self::Unknown
            }
        })
    }

    /// Stable sentence shown to users, independent of the engine.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::HostUnreachable => {
                "Unable to reach the database server. Please check the host and port."
            }
            Self::Timeout => {
                "The database did not respond in time. Please check your network connection and database server."
            }
            Self::AuthFailed => "Access denied. Please check username and password.",
            Self::DatabaseMissing => "Database not found. Please check the database name.",
            Self::ConnectionLost => "The database connection was lost. Please try again.",
            Self::SyntaxError => "SQL syntax error. Please check your query.",
            Self::TableMissing => "Table not found. Please check table names.",
            Self::ColumnMissing => "Column not found. Please check column names.",
            Self::Unknown => "The database request failed.",
        }
    }

    /// Machine-readable name used in responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HostUnreachable => "host_unreachable",
            Self::Timeout => "timeout",
            Self::AuthFailed => "auth_failed",
            Self::DatabaseMissing => "database_missing",
            Self::ConnectionLost => "connection_lost",
            Self::SyntaxError => "syntax_error",
            Self::TableMissing => "table_missing",
            Self::ColumnMissing => "column_missing",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the caller may reasonably retry the whole request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::HostUnreachable | Self::Timeout | Self::ConnectionLost
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalised, engine-independent error description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub user_message: String,
    pub raw_code: Option<String>,
    pub raw_message: Option<String>,
}

impl ClassifiedError {
    /// Builds the outward response; the raw message is kept internal in production.
    pub fn to_response(&self, mode: DeploymentMode) -> ErrorResponse {
        ErrorResponse {
            error: self.user_message.clone(),
            category: self.category.as_str().to_string(),
            code: self.raw_code.clone(),
            details: if mode.exposes_details() {
                self.raw_message.clone()
            } else {
                None
            },
        }
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message)
    }
}

/// Uniform failure body returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Classifies a raw driver error. Pure: equal input yields equal output.
pub fn classify(raw: &RawDbError) -> ClassifiedError {
    let category = ErrorCategory::from_raw(raw.code.as_deref(), &raw.message);
    ClassifiedError {
        category,
        user_message: category.user_message().to_string(),
        raw_code: raw.code.clone(),
        raw_message: Some(raw.message.clone()),
    }
}
