use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::QueryError;
use crate::pipeline::merge::format_json_output;
use crate::pipeline::schema::DynamicSchema;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message of a chat-style model request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A validated answer and its indented JSON rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub raw: Map<String, Value>,
    pub serialized: String,
}

impl QueryResult {
    pub fn from_answer(raw: Map<String, Value>) -> Result<Self, QueryError> {
        let serialized = format_json_output(&Value::Object(raw.clone()))
            .map_err(|e| QueryError::Serialization(e.to_string()))?;
        Ok(Self { raw, serialized })
    }
}

/// A chunk returned by vector search, with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub content: String,
    pub score: f32,
}

/// Chat-capable LLM client (allows mocking).
///
/// `format`, when given, is a JSON Schema the server should constrain its output to.
pub trait LlmClient {
    fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        format: Option<&Value>,
    ) -> Result<String, QueryError>;

    fn is_model_available(&self, model: &str) -> Result<bool, QueryError>;

    fn list_models(&self) -> Result<Vec<String>, QueryError>;
}

impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        format: Option<&Value>,
    ) -> Result<String, QueryError> {
        (**self).chat(model, messages, format)
    }

    fn is_model_available(&self, model: &str) -> Result<bool, QueryError> {
        (**self).is_model_available(model)
    }

    fn list_models(&self) -> Result<Vec<String>, QueryError> {
        (**self).list_models()
    }
}

/// Text embedding model.
pub trait EmbeddingModel {
    fn embed(&self, text: &str) -> Result<Vec<f32>, QueryError>;
}

/// Nearest-neighbour search over a named index.
pub trait VectorSearch {
    fn search(
        &self,
        index_name: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, QueryError>;
}

/// A retrieval index that answers free-form queries in the schema's shape.
///
/// The returned text is not type-checked; callers must re-parse it.
pub trait IndexBackend {
    fn query(
        &self,
        index_name: &str,
        query: &str,
        schema: &DynamicSchema,
    ) -> Result<String, QueryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_message_serializes_lowercase_role() {
        let msg = ChatMessage::assistant("{}");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "role": "assistant", "content": "{}" })
        );
    }

    #[test]
    fn query_result_serializes_with_indentation() {
        let mut raw = Map::new();
        raw.insert("name".into(), json!("Acme"));
        let result = QueryResult::from_answer(raw).unwrap();
        assert_eq!(result.serialized, "{\n    \"name\": \"Acme\"\n}");
    }
}
