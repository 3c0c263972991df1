//! Error types for querygate.
//!
//! Defines the main error enum used throughout the crate. Driver errors never
//! appear here directly: they are classified at the driver boundary and carried
//! as [`ClassifiedError`].

use crate::classify::{ClassifiedError, ErrorCategory, ErrorResponse};
use crate::config::DeploymentMode;
use crate::safety::RejectionReason;
use thiserror::Error;

/// Main error type for querygate operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Opening or probing a database handle failed after all attempts.
    #[error("{0}")]
    Connection(ClassifiedError),

    /// Executing an approved statement failed.
    #[error("{0}")]
    Query(ClassifiedError),

    /// The statement guard refused the SQL text.
    #[error("{0}")]
    Rejected(RejectionReason),

    /// The session holds no complete set of connection parameters.
    #[error("No active database connection. Please connect to a database first.")]
    NotConnected,

    /// Input failed validation (parameter bounds, SQL length, etc.)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Configuration errors (invalid config file, bad connection string, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session storage errors (unreadable metadata, etc.)
    #[error("Session error: {0}")]
    Session(String),

    /// The SQL generator collaborator failed.
    #[error("SQL generation failed: {0}")]
    Generator(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// Creates a validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a session error with the given message.
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Creates a generator error with the given message.
    pub fn generator(msg: impl Into<String>) -> Self {
        Self::Generator(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Rejected(_) => "Rejected",
            Self::NotConnected => "Not Connected",
            Self::Validation(_) => "Validation Error",
            Self::Config(_) => "Configuration Error",
            Self::Session(_) => "Session Error",
            Self::Generator(_) => "Generator Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the classified driver error, if this failure came from a database.
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            Self::Connection(err) | Self::Query(err) => Some(err),
            _ => None,
        }
    }

    /// Builds the outward response for this error.
    ///
    /// Raw driver messages are attached only outside production.
    pub fn to_response(&self, mode: DeploymentMode) -> ErrorResponse {
        match self {
            Self::Connection(err) | Self::Query(err) => err.to_response(mode),
            Self::Rejected(reason) => ErrorResponse {
                error: reason.to_string(),
                category: "rejected".to_string(),
                code: None,
                details: None,
            },
            Self::NotConnected => ErrorResponse {
                error: self.to_string(),
                category: "not_connected".to_string(),
                code: None,
                details: None,
            },
            Self::Validation(msg) => ErrorResponse {
                error: "Validation failed".to_string(),
                category: "validation".to_string(),
                code: None,
                details: Some(msg.clone()),
            },
            other => ErrorResponse {
                error: "Internal server error".to_string(),
                category: ErrorCategory::Unknown.as_str().to_string(),
                code: None,
                details: mode.exposes_details().then(|| other.to_string()),
            },
        }
    }
}

/// Result type alias using GateError.
pub type Result<T> = std::result::Result<T, GateError>;
