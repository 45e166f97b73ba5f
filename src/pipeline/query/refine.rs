use std::time::Duration;

use serde_json::Value;

use super::parser::parse_strict_json;
use super::types::IndexBackend;
use super::QueryError;
use crate::pipeline::merge::format_json_output;
use crate::pipeline::observer::{PipelineObserver, PipelineStep};
use crate::pipeline::schema::DynamicSchema;

/// Returned in place of an answer when the index never produced JSON.
pub const NO_ANSWER_SENTINEL: &str = "No answer found.";

pub const DEFAULT_REFINE_ATTEMPTS: u32 = 3;
pub const DEFAULT_REFINE_DELAY: Duration = Duration::from_secs(5);

/// How a refinement run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RefineOutcome {
    Answer(Value),
    NoAnswer,
}

impl RefineOutcome {
    /// Indented JSON for an answer, the sentinel otherwise.
    pub fn into_text(self) -> Result<String, serde_json::Error> {
        match self {
            Self::Answer(value) => format_json_output(&value),
            Self::NoAnswer => Ok(NO_ANSWER_SENTINEL.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefineState {
    Attempting { attempt: u32 },
    Refining { attempt: u32 },
    Terminal(RefineOutcome),
}

/// Re-issues an index query until its answer parses as JSON.
///
/// The query is sent unchanged on every attempt. Between attempts the loop
/// blocks for `delay`. Backend errors are not retried here.
#[derive(Debug, Clone)]
pub struct RefinementLoop {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RefinementLoop {
    fn default() -> Self {
        Self::new(DEFAULT_REFINE_ATTEMPTS, DEFAULT_REFINE_DELAY)
    }
}

impl RefinementLoop {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn run(
        &self,
        backend: &dyn IndexBackend,
        index_name: &str,
        query: &str,
        schema: &DynamicSchema,
        observer: &dyn PipelineObserver,
    ) -> Result<RefineOutcome, QueryError> {
        let mut state = RefineState::Attempting { attempt: 1 };

        loop {
            state = match state {
                RefineState::Attempting { attempt } => {
                    let step = PipelineStep::Retrieval { attempt };
                    observer.step_started(step);
                    let raw = backend.query(index_name, query, schema);
                    observer.step_finished(step);
                    let raw = raw?;
                    tracing::debug!(attempt, response = %raw, "Index response received");

                    match parse_strict_json(&raw) {
                        Some(value) => RefineState::Terminal(RefineOutcome::Answer(value)),
                        None if attempt < self.max_attempts => RefineState::Refining { attempt },
                        None => {
                            tracing::warn!(attempts = attempt, "No parseable answer from index");
                            RefineState::Terminal(RefineOutcome::NoAnswer)
                        }
                    }
                }
                RefineState::Refining { attempt } => {
                    let step = PipelineStep::Refining { attempt: attempt + 1 };
                    tracing::warn!(attempt, "Index answer is not JSON, refining answer");
                    observer.step_started(step);
                    std::thread::sleep(self.delay);
                    observer.step_finished(step);
                    RefineState::Attempting {
                        attempt: attempt + 1,
                    }
                }
                RefineState::Terminal(outcome) => return Ok(outcome),
            };
        }
    }
}
