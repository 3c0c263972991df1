//! SQL generation collaborators.
//!
//! A generator turns a natural-language question into SQL text. Its output is
//! untrusted: callers pass it through the statement guard exactly like SQL
//! typed by a user.

pub mod keyword;
pub mod mock;

pub use keyword::KeywordGenerator;
pub use mock::MockGenerator;

use async_trait::async_trait;
use serde::Serialize;

use crate::db::{Engine, ExecutionResult, Schema};
use crate::error::{GateError, Result};

/// Bounds on the length of a natural-language question.
pub const MIN_QUESTION_LEN: usize = 3;
pub const MAX_QUESTION_LEN: usize = 1000;

/// What a generator knows about the target database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationContext {
    pub engine: Engine,
    pub database: String,
    /// Schema rendered by [`Schema::format_for_llm`], when available.
    pub schema: Option<String>,
}

impl GenerationContext {
    pub fn new(engine: Engine, database: impl Into<String>) -> Self {
        Self {
            engine,
            database: database.into(),
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: &Schema) -> Self {
        self.schema = Some(schema.format_for_llm());
        self
    }
}

/// Produces SQL text for a question.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Short name for logs and responses.
    fn name(&self) -> &str;

    /// Generates SQL text. The result may still be rejected by the guard.
    async fn generate(&self, question: &str, context: &GenerationContext) -> Result<String>;
}

/// A question answered by generating, guarding and executing SQL.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnsweredQuestion {
    pub sql: String,
    #[serde(flatten)]
    pub result: ExecutionResult,
    pub original_query: String,
    pub using_fallback: bool,
}

/// Checks the length bounds on a question.
pub fn validate_question(question: &str) -> Result<()> {
    let len = question.chars().count();
    if !(MIN_QUESTION_LEN..=MAX_QUESTION_LEN).contains(&len) {
        return Err(GateError::validation(format!(
            "query must be between {MIN_QUESTION_LEN} and {MAX_QUESTION_LEN} characters"
        )));
    }
    Ok(())
}

/// Reduces raw generator output to the SQL it carries.
///
/// Takes the body of the first fenced code block when there is one (a `sql`
/// fence is preferred over a bare one), otherwise the whole text. The result
/// is trimmed.
pub fn extract_sql(output: &str) -> String {
    fenced_block(output, "```sql")
        .or_else(|| fenced_block(output, "```"))
        .unwrap_or(output)
        .trim()
        .to_string()
}

fn fenced_block<'a>(text: &'a str, fence: &str) -> Option<&'a str> {
    let start = text.find(fence)? + fence.len();
    let newline = text[start..].find('\n')?;

    // A bare fence followed by a language tag is not a bare fence.
    if fence == "```" && !text[start..start + newline].trim().is_empty() {
        return None;
    }

    let body_start = start + newline + 1;
    let end = text[body_start..].find("```")?;
    Some(&text[body_start..body_start + end])
}
