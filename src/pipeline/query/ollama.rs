use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{ChatMessage, EmbeddingModel, LlmClient};
use super::QueryError;
use crate::pipeline_config::ExtractorConfig;

/// Ollama HTTP client for local LLM inference.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    /// Create a client pointing at an Ollama instance.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, QueryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| QueryError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn from_config(config: &ExtractorConfig) -> Result<Self, QueryError> {
        Self::new(&config.ollama_base_url, config.request_timeout_secs)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Embed a single text with the given embedding model.
    pub fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, QueryError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = OllamaEmbeddingRequest {
            model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;
        let response = check_status(response)?;

        let parsed: OllamaEmbeddingResponse = response
            .json()
            .map_err(|e| QueryError::ResponseParsing(e.to_string()))?;

        if parsed.embedding.is_empty() {
            return Err(QueryError::Embedding(format!(
                "model '{model}' returned an empty embedding"
            )));
        }
        Ok(parsed.embedding)
    }

    fn map_send_error(&self, e: reqwest::Error) -> QueryError {
        if e.is_connect() {
            QueryError::OllamaConnection(self.base_url.clone())
        } else if e.is_timeout() {
            QueryError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
        } else {
            QueryError::HttpClient(e.to_string())
        }
    }
}

fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, QueryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(QueryError::OllamaError {
        status: status.as_u16(),
        body,
    })
}

/// Request body for Ollama /api/chat
#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a Value>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Response body from Ollama /api/chat
#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatMessage,
}

#[derive(Deserialize)]
struct OllamaChatMessage {
    content: String,
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

impl LlmClient for OllamaClient {
    fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        format: Option<&Value>,
    ) -> Result<String, QueryError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = OllamaChatRequest {
            model,
            messages,
            stream: false,
            format,
            options: OllamaOptions { temperature: 0.0 },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;
        let response = check_status(response)?;

        let parsed: OllamaChatResponse = response
            .json()
            .map_err(|e| QueryError::ResponseParsing(e.to_string()))?;

        Ok(parsed.message.content)
    }

    fn is_model_available(&self, model: &str) -> Result<bool, QueryError> {
        let models = self.list_models()?;
        Ok(models.iter().any(|m| m.starts_with(model)))
    }

    fn list_models(&self) -> Result<Vec<String>, QueryError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e))?;
        let response = check_status(response)?;

        let parsed: OllamaTagsResponse = response
            .json()
            .map_err(|e| QueryError::ResponseParsing(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

/// Embedding model served by Ollama.
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl EmbeddingModel for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, QueryError> {
        self.client
            .embed(&self.model, text)
            .map_err(|e| match e {
                QueryError::ResponseParsing(msg) => QueryError::Embedding(msg),
                other => other,
            })
    }
}

/// Configured model names the server does not serve, in config order.
pub fn missing_models<C: LlmClient + ?Sized>(
    client: &C,
    config: &ExtractorConfig,
) -> Result<Vec<String>, QueryError> {
    let mut missing: Vec<String> = Vec::new();
    for model in [&config.model, &config.index_model, &config.embedding_model] {
        if missing.contains(model) {
            continue;
        }
        if !client.is_model_available(model)? {
            missing.push(model.clone());
        }
    }
    Ok(missing)
}

/// Mock LLM client for testing: replays scripted responses in order.
///
/// Once the script runs out the last response repeats. Every request's
/// messages and output format are recorded.
pub struct MockLlmClient {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    formats: Mutex<Vec<Option<Value>>>,
    calls: AtomicUsize,
    available_models: Vec<String>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self::scripted(&[response])
    }

    pub fn scripted(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
            last: Mutex::new(String::new()),
            requests: Mutex::new(Vec::new()),
            formats: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            available_models: vec!["llama3.1:8b".to_string()],
        }
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.available_models = models;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Messages sent with every recorded request, oldest first.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// `format` sent with every recorded request, oldest first.
    pub fn formats(&self) -> Vec<Option<Value>> {
        self.formats
            .lock()
            .map(|f| f.clone())
            .unwrap_or_default()
    }
}

impl LlmClient for MockLlmClient {
    fn chat(
        &self,
        _model: &str,
        messages: &[ChatMessage],
        format: Option<&Value>,
    ) -> Result<String, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        if let Ok(mut formats) = self.formats.lock() {
            formats.push(format.cloned());
        }

        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        let mut last = self
            .last
            .lock()
            .map_err(|_| QueryError::HttpClient("mock state poisoned".into()))?;
        if let Some(response) = next {
            *last = response;
        }
        Ok(last.clone())
    }

    fn is_model_available(&self, model: &str) -> Result<bool, QueryError> {
        Ok(self.available_models.iter().any(|m| m.starts_with(model)))
    }

    fn list_models(&self) -> Result<Vec<String>, QueryError> {
        Ok(self.available_models.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::query::ChatRole;
    use serde_json::json;

    #[test]
    fn mock_client_returns_configured_response() {
        let client = MockLlmClient::new("test response");
        let result = client.chat("model", &[ChatMessage::user("hi")], None).unwrap();
        assert_eq!(result, "test response");
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn mock_client_replays_script_then_repeats_last() {
        let client = MockLlmClient::scripted(&["one", "two"]);
        let msgs = [ChatMessage::user("q")];
        assert_eq!(client.chat("m", &msgs, None).unwrap(), "one");
        assert_eq!(client.chat("m", &msgs, None).unwrap(), "two");
        assert_eq!(client.chat("m", &msgs, None).unwrap(), "two");
        assert_eq!(client.call_count(), 3);
    }

    #[test]
    fn mock_client_records_messages() {
        let client = MockLlmClient::new("{}");
        client
            .chat("m", &[ChatMessage::system("sys"), ChatMessage::user("q")], None)
            .unwrap();
        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0][0].role, ChatRole::System);
        assert_eq!(requests[0][1].content, "q");
    }

    #[test]
    fn mock_client_lists_models() {
        let client = MockLlmClient::new("").with_models(vec![
            "llama3.1:8b".into(),
            "nomic-embed-text:latest".into(),
        ]);
        assert_eq!(client.list_models().unwrap().len(), 2);
        assert!(client.is_model_available("nomic-embed-text").unwrap());
        assert!(!client.is_model_available("mistral").unwrap());
    }

    #[test]
    fn mock_client_records_format() {
        let client = MockLlmClient::new("{}");
        let schema = json!({ "type": "object" });
        client.chat("m", &[ChatMessage::user("q")], Some(&schema)).unwrap();
        client.chat("m", &[ChatMessage::user("q")], None).unwrap();
        assert_eq!(client.formats(), vec![Some(schema), None]);
    }

    #[test]
    fn missing_models_reports_unserved_names_once() {
        let config = ExtractorConfig {
            model: "llama3.1:8b".into(),
            index_model: "llama3.1:8b".into(),
            embedding_model: "nomic-embed-text".into(),
            ..ExtractorConfig::default()
        };
        let client = MockLlmClient::new("").with_models(vec!["mistral:7b".into()]);
        assert_eq!(
            missing_models(&client, &config).unwrap(),
            vec!["llama3.1:8b".to_string(), "nomic-embed-text".to_string()]
        );

        let served = MockLlmClient::new("").with_models(vec![
            "llama3.1:8b".into(),
            "nomic-embed-text:latest".into(),
        ]);
        assert!(missing_models(&served, &config).unwrap().is_empty());
    }

    #[test]
    fn ollama_client_constructor() {
        let client = OllamaClient::new("http://localhost:11434", 120).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.timeout_secs, 120);
    }

    #[test]
    fn ollama_client_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", 60).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn client_from_config_uses_configured_endpoint() {
        let config = ExtractorConfig {
            ollama_base_url: "http://gpu-box:11434/".into(),
            request_timeout_secs: 30,
            ..ExtractorConfig::default()
        };
        let client = OllamaClient::from_config(&config).unwrap();
        assert_eq!(client.base_url(), "http://gpu-box:11434");
        assert_eq!(client.timeout_secs, 30);
    }

    #[test]
    fn chat_request_carries_schema_and_zero_temperature() {
        let schema = json!({ "type": "object" });
        let messages = [ChatMessage::user("q")];
        let body = OllamaChatRequest {
            model: "llama3.1:8b",
            messages: &messages,
            stream: false,
            format: Some(&schema),
            options: OllamaOptions { temperature: 0.0 },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["format"], schema);
        assert_eq!(value["options"]["temperature"], json!(0.0));
        assert_eq!(value["stream"], json!(false));
        assert_eq!(value["messages"][0]["role"], json!("user"));
    }

    #[test]
    fn chat_request_omits_missing_format() {
        let messages = [ChatMessage::user("q")];
        let body = OllamaChatRequest {
            model: "m",
            messages: &messages,
            stream: false,
            format: None,
            options: OllamaOptions { temperature: 0.0 },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("format").is_none());
    }

    #[test]
    fn unreachable_server_maps_to_connection_error() {
        // Port 9 (discard) is closed on test machines.
        let client = OllamaClient::new("http://127.0.0.1:9", 2).unwrap();
        let err = client.list_models().unwrap_err();
        assert!(matches!(
            err,
            QueryError::OllamaConnection(_) | QueryError::HttpClient(_)
        ));
    }
}
