//! Statement guard.
//!
//! Lexical read-only policy applied to every SQL text before execution,
//! whether typed by a user or produced by a SQL generator. This is a
//! substring scan, not a parser: a column named `updated_at` is rejected
//! because it contains `update`. That false positive is accepted.

use crate::error::{GateError, Result};
use std::fmt;
use tracing::warn;

/// Substrings that reject a statement wherever they appear.
pub const BANNED_SUBSTRINGS: [&str; 7] = [
    "drop", "delete", "update", "insert", "alter", "create", "truncate",
];

/// Why the guard refused a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    /// The trimmed text does not begin with `select`.
    NotSelect,
    /// The text contains one of [`BANNED_SUBSTRINGS`].
    ForbiddenKeyword(&'static str),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSelect => write!(f, "Only SELECT queries are allowed for security reasons"),
            Self::ForbiddenKeyword(keyword) => write!(
                f,
                "Query contains potentially dangerous operations ({})",
                keyword
            ),
        }
    }
}

/// The guard's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Rejected(RejectionReason),
}

/// A SQL text together with the guard's verdict on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedStatement {
    sql: String,
    verdict: Verdict,
}

impl GuardedStatement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn is_approved(&self) -> bool {
        self.verdict == Verdict::Approved
    }

    /// Returns the rejection reason, if any.
    pub fn rejection(&self) -> Option<RejectionReason> {
        match self.verdict {
            Verdict::Approved => None,
            Verdict::Rejected(reason) => Some(reason),
        }
    }

    /// Converts into an executable statement, or the reason it was refused.
    pub fn into_approved(self) -> std::result::Result<ApprovedStatement, RejectionReason> {
        match self.verdict {
            Verdict::Approved => Ok(ApprovedStatement { sql: self.sql }),
            Verdict::Rejected(reason) => Err(reason),
        }
    }
}

/// SQL text that passed the guard.
///
/// Only the guard can construct one, so the executor cannot be handed
/// unchecked text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedStatement {
    sql: String,
}

impl ApprovedStatement {
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl fmt::Display for ApprovedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Applies the read-only policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementGuard;

impl StatementGuard {
    pub fn new() -> Self {
        Self
    }

    /// Evaluates the policy without failing.
    pub fn inspect(&self, sql: &str) -> GuardedStatement {
        GuardedStatement {
            sql: sql.to_string(),
            verdict: evaluate(sql),
        }
    }

    /// Approves `sql` or returns [`GateError::Rejected`].
    pub fn approve(&self, sql: &str) -> Result<ApprovedStatement> {
        self.inspect(sql).into_approved().map_err(|reason| {
            warn!("Statement rejected: {}", reason);
            GateError::Rejected(reason)
        })
    }
}

fn evaluate(sql: &str) -> Verdict {
    let lowered = sql.trim().to_lowercase();

    if !lowered.starts_with("select") {
        return Verdict::Rejected(RejectionReason::NotSelect);
    }

    match BANNED_SUBSTRINGS.iter().find(|kw| lowered.contains(*kw)) {
        Some(keyword) => Verdict::Rejected(RejectionReason::ForbiddenKeyword(keyword)),
        None => Verdict::Approved,
    }
}

/// Shorthand for `StatementGuard::new().approve(sql)`.
pub fn approve(sql: &str) -> Result<ApprovedStatement> {
    StatementGuard::new().approve(sql)
}
