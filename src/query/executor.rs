//! Single-request query execution.
//!
//! Opens a handle through the factory, runs one approved statement, and
//! always closes the handle before returning, on success and failure alike.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::classify::classify;
use crate::config::ConnectionParameters;
use crate::connection::ConnectionFactory;
use crate::db::{DatabaseHandle, ExecutionResult, Schema};
use crate::error::{GateError, Result};
use crate::safety::ApprovedStatement;

/// Runs approved statements on short-lived handles.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    factory: ConnectionFactory,
}

impl QueryExecutor {
    pub fn new(factory: ConnectionFactory) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &ConnectionFactory {
        &self.factory
    }

    /// Executes `statement` against the database described by `params`.
    ///
    /// Connection failures surface as [`GateError::Connection`]; failures of
    /// the statement itself as [`GateError::Query`]. The statement is not
    /// retried.
    pub async fn execute(
        &self,
        params: &ConnectionParameters,
        statement: &ApprovedStatement,
    ) -> Result<ExecutionResult> {
        let mut handle = self.factory.open(params).await?;

        debug!("Executing statement on {}", params.display_string());
        let outcome = handle.execute(statement.sql()).await;
        release(handle.as_mut()).await;

        match outcome {
            Ok(raw) => {
                let result = ExecutionResult::from_raw(raw, Utc::now());
                info!("Statement returned {} rows", result.row_count);
                Ok(result)
            }
            Err(e) => {
                warn!("Statement failed: {}", e);
                Err(GateError::Query(classify(&e)))
            }
        }
    }

    /// Reads the table and column catalogue on a short-lived handle.
    pub async fn introspect(&self, params: &ConnectionParameters) -> Result<Schema> {
        let mut handle = self.factory.open(params).await?;
        let outcome = handle.introspect_schema(params.database()).await;
        release(handle.as_mut()).await;

        outcome.map_err(|e| {
            warn!("Schema introspection failed: {}", e);
            GateError::Query(classify(&e))
        })
    }
}

/// Closes a handle; a close failure is logged and never replaces the outcome.
pub(crate) async fn release(handle: &mut dyn DatabaseHandle) {
    if let Err(e) = handle.close().await {
        debug!("Closing {} handle failed: {}", handle.engine(), e);
    }
}
