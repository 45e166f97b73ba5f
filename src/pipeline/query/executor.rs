use serde_json::Map;

use super::parser::parse_json_answer;
use super::prompt::{build_extraction_prompt, build_retry_feedback, EXTRACTION_SYSTEM_PROMPT};
use super::types::{ChatMessage, LlmClient, QueryResult};
use super::QueryError;
use crate::pipeline::schema::{DynamicSchema, FieldViolation, GroupMode};

/// Default number of model calls allowed per query.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Runs a schema-bound query against a chat model.
///
/// The schema is sent as the request's output format and the answer is
/// validated against it. A non-conforming answer is fed back to the model
/// together with the violations, up to `max_retries` calls in total.
pub struct StructuredQueryExecutor {
    llm: Box<dyn LlmClient + Send + Sync>,
    model_name: String,
    max_retries: u32,
}

impl StructuredQueryExecutor {
    pub fn new(llm: Box<dyn LlmClient + Send + Sync>, model_name: impl Into<String>) -> Self {
        Self {
            llm,
            model_name: model_name.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Ask the model `query` over `content` and return the validated answer.
    pub fn execute(
        &self,
        query: &str,
        content: &str,
        schema: &DynamicSchema,
        mode: GroupMode,
    ) -> Result<QueryResult, QueryError> {
        if schema.is_empty() {
            return QueryResult::from_answer(Map::new());
        }

        let attempts = self.max_retries.max(1);
        let format = schema.to_json_schema();
        let mut messages = vec![
            ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
            ChatMessage::user(build_extraction_prompt(query, content)),
        ];
        let mut violations: Vec<FieldViolation> = Vec::new();

        for attempt in 1..=attempts {
            let raw = match self.llm.chat(&self.model_name, &messages, Some(&format)) {
                Ok(resp) => resp,
                Err(e) if is_retryable_error(&e) && attempt < attempts => {
                    tracing::warn!(
                        mode = %mode,
                        attempt,
                        error = %e,
                        "Model call failed, retrying"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            tracing::debug!(mode = %mode, attempt, response = %raw, "Model response received");

            violations = match parse_json_answer(&raw) {
                Ok(value) => match schema.validate(&value) {
                    Ok(answer) => {
                        tracing::debug!(mode = %mode, attempt, "Answer validated");
                        return QueryResult::from_answer(answer);
                    }
                    Err(violations) => violations,
                },
                Err(reason) => vec![FieldViolation {
                    field: "$".into(),
                    reason,
                }],
            };

            if attempt < attempts {
                tracing::warn!(
                    mode = %mode,
                    attempt,
                    violations = violations.len(),
                    "Answer failed validation, retrying with feedback"
                );
                messages.push(ChatMessage::assistant(raw));
                messages.push(ChatMessage::user(build_retry_feedback(&violations)));
            }
        }

        Err(QueryError::Validation {
            mode,
            attempts,
            violations,
        })
    }
}

/// Transport failures worth another call within the same budget.
fn is_retryable_error(e: &QueryError) -> bool {
    matches!(
        e,
        QueryError::OllamaConnection(_) | QueryError::HttpClient(_) | QueryError::OllamaError { .. }
    )
}
