//! Natural-language queries against the fixed demo database.
//!
//! No session is involved: the demo database parameters come from
//! configuration. Generated SQL goes through the same guard and executor as
//! any other statement.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ConnectionParameters;
use crate::error::{GateError, Result};
use crate::generator::{
    extract_sql, validate_question, AnsweredQuestion, GenerationContext, KeywordGenerator,
    SqlGenerator,
};
use crate::query::QueryExecutor;
use crate::safety::StatementGuard;

/// Answers questions about the demo database.
pub struct DemoService {
    executor: QueryExecutor,
    params: ConnectionParameters,
    primary: Option<Arc<dyn SqlGenerator>>,
    fallback: KeywordGenerator,
    guard: StatementGuard,
}

impl DemoService {
    /// Creates a service that only uses the keyword generator.
    pub fn new(executor: QueryExecutor, params: ConnectionParameters) -> Self {
        Self {
            executor,
            params,
            primary: None,
            fallback: KeywordGenerator::new(),
            guard: StatementGuard::new(),
        }
    }

    /// Tries `generator` first, falling back to keywords when it fails.
    pub fn with_generator(mut self, generator: Arc<dyn SqlGenerator>) -> Self {
        self.primary = Some(generator);
        self
    }

    /// Generates SQL for `question`, guards it and runs it on the demo database.
    pub async fn ask(&self, question: &str) -> Result<AnsweredQuestion> {
        validate_question(question)?;

        let (sql, using_fallback) = self.generate(question).await;
        let statement = self.guard.approve(&sql)?;
        let result = self.executor.execute(&self.params, &statement).await?;

        info!(
            "Demo question answered with {} rows (fallback: {})",
            result.row_count, using_fallback
        );
        Ok(AnsweredQuestion {
            sql,
            result,
            original_query: question.to_string(),
            using_fallback,
        })
    }

    async fn generate(&self, question: &str) -> (String, bool) {
        if let Some(primary) = &self.primary {
            let context = GenerationContext::new(self.params.engine(), self.params.database());
            let generated = primary
                .generate(question, &context)
                .await
                .map(|output| extract_sql(&output))
                .and_then(|sql| {
                    if sql.is_empty() {
                        Err(GateError::generator("No SQL generated"))
                    } else {
                        Ok(sql)
                    }
                });

            match generated {
                Ok(sql) => return (sql, false),
                Err(e) => warn!("Generator '{}' failed, using fallback: {}", primary.name(), e),
            }
        }

        (self.fallback.query_for(question).to_string(), true)
    }
}
