pub mod types;
pub mod prompt;
pub mod parser;
pub mod ollama;
pub mod executor;
pub mod retrieval;
pub mod refine;

pub use types::*;
pub use prompt::*;
pub use parser::*;
pub use ollama::*;
pub use executor::*;
pub use retrieval::*;
pub use refine::*;

use thiserror::Error;

use crate::pipeline::schema::{FieldViolation, GroupMode};

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Ollama is not running at {0}")]
    OllamaConnection(String),

    #[error("Ollama returned error (status {status}): {body}")]
    OllamaError { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector search failed: {0}")]
    VectorSearch(String),

    #[error(
        "{mode} answer did not match the schema after {attempts} attempt(s): {}",
        join_violations(.violations)
    )]
    Validation {
        mode: GroupMode,
        attempts: u32,
        violations: Vec<FieldViolation>,
    },

    #[error("Cannot serialize answer: {0}")]
    Serialization(String),
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
