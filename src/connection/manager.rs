//! Session-scoped connection management.
//!
//! Ties remembered credentials to the factory, guard and executor. Nothing
//! here holds a live connection between calls: every operation opens its own
//! handle and closes it before returning.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ConnectionParameters;
use crate::db::{Engine, Schema};
use crate::error::{GateError, Result};
use crate::generator::{
    extract_sql, validate_question, AnsweredQuestion, GenerationContext, SqlGenerator,
};
use crate::query::executor::release;
use crate::query::QueryExecutor;
use crate::safety::StatementGuard;
use crate::session::{CredentialStore, SessionId};

/// Longest SQL text accepted from a caller.
pub const MAX_SQL_LEN: usize = 10_000;

/// Returned by a successful connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub message: String,
    pub db_type: Engine,
    pub database: String,
    pub host: String,
    pub session_id: SessionId,
}

/// What a session is connected to, without the password.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_type: Option<Engine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Runs connect / execute / ask / schema / status / disconnect for sessions.
#[derive(Debug, Clone)]
pub struct SessionManager {
    executor: QueryExecutor,
    credentials: CredentialStore,
    guard: StatementGuard,
}

impl SessionManager {
    pub fn new(executor: QueryExecutor, credentials: CredentialStore) -> Self {
        Self {
            executor,
            credentials,
            guard: StatementGuard::new(),
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Verifies `params` by opening and probing a handle, then remembers them.
    ///
    /// Nothing is stored if the connection cannot be established.
    pub async fn connect(
        &self,
        session: &SessionId,
        params: &ConnectionParameters,
    ) -> Result<ConnectionSummary> {
        let mut handle = self.executor.factory().open(params).await?;
        release(handle.as_mut()).await;

        self.credentials.save(session, params)?;
        info!("Session {} connected to {}", session, params.display_string());

        Ok(ConnectionSummary {
            message: "Database connection successful".to_string(),
            db_type: params.engine(),
            database: params.database().to_string(),
            host: params.host().to_string(),
            session_id: session.clone(),
        })
    }

    /// Runs caller-supplied SQL against the session's database.
    pub async fn execute(
        &self,
        session: &SessionId,
        sql: &str,
    ) -> Result<crate::db::ExecutionResult> {
        let params = self.credentials.load(session)?;
        validate_sql(sql)?;
        let statement = self.guard.approve(sql)?;
        self.executor.execute(&params, &statement).await
    }

    /// Turns a question into SQL with `generator`, then guards and runs it.
    pub async fn ask(
        &self,
        session: &SessionId,
        generator: &dyn SqlGenerator,
        question: &str,
    ) -> Result<AnsweredQuestion> {
        let params = self.credentials.load(session)?;
        validate_question(question)?;

        let mut context = GenerationContext::new(params.engine(), params.database());
        match self.executor.introspect(&params).await {
            Ok(schema) => context = context.with_schema(&schema),
            Err(e) => warn!("Generating without schema context: {}", e),
        }

        let sql = extract_sql(&generator.generate(question, &context).await?);
        if sql.is_empty() {
            return Err(GateError::generator("No SQL generated"));
        }
        let statement = self.guard.approve(&sql)?;
        let result = self.executor.execute(&params, &statement).await?;

        Ok(AnsweredQuestion {
            sql,
            result,
            original_query: question.to_string(),
            using_fallback: false,
        })
    }

    /// Reads the table catalogue of the session's database.
    pub async fn schema(&self, session: &SessionId) -> Result<Schema> {
        let params = self.credentials.load(session)?;
        self.executor.introspect(&params).await
    }

    /// Reports what the session is connected to.
    pub fn status(&self, session: &SessionId) -> ConnectionStatus {
        if !self.credentials.is_connected(session) {
            return ConnectionStatus::default();
        }
        match self.credentials.metadata(session) {
            Some(metadata) => ConnectionStatus {
                connected: true,
                db_type: Some(metadata.engine),
                database: Some(metadata.database),
                host: Some(metadata.host),
            },
            None => ConnectionStatus::default(),
        }
    }

    /// Forgets the session's credentials. Idempotent.
    pub fn disconnect(&self, session: &SessionId) {
        self.credentials.clear(session);
        info!("Session {} disconnected", session);
    }
}

/// Checks the length bounds on caller-supplied SQL.
pub fn validate_sql(sql: &str) -> Result<()> {
    let len = sql.chars().count();
    if len == 0 || len > MAX_SQL_LEN {
        return Err(GateError::validation(format!(
            "sql must be between 1 and {MAX_SQL_LEN} characters"
        )));
    }
    Ok(())
}
