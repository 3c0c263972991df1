//! Mock generator for testing.
//!
//! Returns canned SQL based on input patterns.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use super::{GenerationContext, SqlGenerator};
use crate::error::{GateError, Result};

/// Generator that returns configured responses, or fails on request.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator {
    responses: Vec<(String, String)>,
    fallback: Option<String>,
    failure: Option<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// When the question contains `pattern` (case-insensitive), return `response`.
    pub fn with_response(mut self, pattern: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses.push((pattern.into(), response.into()));
        self
    }

    /// Response for questions matching no pattern.
    pub fn with_default(mut self, response: impl Into<String>) -> Self {
        self.fallback = Some(response.into());
        self
    }

    /// Every call fails with this message.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Questions received so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SqlGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, question: &str, _context: &GenerationContext) -> Result<String> {
        self.calls.lock().push(question.to_string());

        if let Some(message) = &self.failure {
            return Err(GateError::generator(message.clone()));
        }

        let lowered = question.to_lowercase();
        self.responses
            .iter()
            .find(|(pattern, _)| lowered.contains(&pattern.to_lowercase()))
            .map(|(_, response)| response.clone())
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| GateError::generator("No SQL generated"))
    }
}
