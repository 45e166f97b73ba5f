use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use super::prompt::{assemble_context, build_index_prompt, EXTRACTION_SYSTEM_PROMPT};
use super::types::{ChatMessage, EmbeddingModel, IndexBackend, LlmClient, ScoredChunk, VectorSearch};
use super::QueryError;
use crate::pipeline::schema::DynamicSchema;

static CLASS_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap());

/// Retrieval-augmented index: embed the query, fetch the closest chunks,
/// then ask the model for an answer shaped by the schema.
pub struct RetrievalIndex {
    llm: Box<dyn LlmClient + Send + Sync>,
    embedder: Box<dyn EmbeddingModel + Send + Sync>,
    store: Box<dyn VectorSearch + Send + Sync>,
    model_name: String,
    top_k: usize,
    chunk_size: usize,
}

impl RetrievalIndex {
    pub fn new(
        llm: Box<dyn LlmClient + Send + Sync>,
        embedder: Box<dyn EmbeddingModel + Send + Sync>,
        store: Box<dyn VectorSearch + Send + Sync>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            embedder,
            store,
            model_name: model_name.into(),
            top_k: 2,
            chunk_size: 1024,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl IndexBackend for RetrievalIndex {
    fn query(
        &self,
        index_name: &str,
        query: &str,
        schema: &DynamicSchema,
    ) -> Result<String, QueryError> {
        let embedding = self.embedder.embed(query)?;
        let chunks = self.store.search(index_name, &embedding, self.top_k)?;

        if chunks.is_empty() {
            tracing::warn!(index = index_name, "No chunks retrieved for query");
            return Ok(String::new());
        }
        tracing::debug!(
            index = index_name,
            chunks = chunks.len(),
            best_score = chunks[0].score,
            "Context retrieved"
        );

        let context = assemble_context(&chunks, self.chunk_size);
        let messages = [
            ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
            ChatMessage::user(build_index_prompt(query, &context, schema)),
        ];
        let format = schema.to_json_schema();
        self.llm.chat(&self.model_name, &messages, Some(&format))
    }
}

/// Vector search backed by a Weaviate instance (GraphQL `nearVector`).
///
/// Each object of the class is expected to carry its chunk in a `text` property.
pub struct WeaviateVectorStore {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl WeaviateVectorStore {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, QueryError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| QueryError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Weaviate class for an index name: first letter upper-cased.
pub fn weaviate_class_name(index_name: &str) -> Result<String, QueryError> {
    let trimmed = index_name.trim();
    if !CLASS_NAME.is_match(trimmed) {
        return Err(QueryError::VectorSearch(format!(
            "invalid index name '{index_name}'"
        )));
    }
    let mut chars = trimmed.chars();
    Ok(match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    })
}

fn near_vector_query(class: &str, embedding: &[f32], top_k: usize) -> Result<String, QueryError> {
    let vector =
        serde_json::to_string(embedding).map_err(|e| QueryError::VectorSearch(e.to_string()))?;
    Ok(format!(
        "{{ Get {{ {class}(nearVector: {{vector: {vector}}}, limit: {top_k}) \
         {{ text _additional {{ id distance }} }} }} }}"
    ))
}

#[derive(Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct WeaviateHit {
    #[serde(default)]
    text: Option<String>,
    #[serde(rename = "_additional")]
    additional: WeaviateAdditional,
}

#[derive(Deserialize)]
struct WeaviateAdditional {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    distance: Option<f32>,
}

fn parse_hits(class: &str, response: GraphQlResponse) -> Result<Vec<ScoredChunk>, QueryError> {
    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(QueryError::VectorSearch(messages.join("; ")));
    }

    let hits = response
        .data
        .as_ref()
        .and_then(|d| d.get("Get"))
        .and_then(|g| g.get(class))
        .cloned()
        .unwrap_or(Value::Array(Vec::new()));
    let hits: Vec<WeaviateHit> =
        serde_json::from_value(hits).map_err(|e| QueryError::ResponseParsing(e.to_string()))?;

    Ok(hits
        .into_iter()
        .enumerate()
        .map(|(i, hit)| ScoredChunk {
            chunk_id: hit.additional.id.unwrap_or_else(|| format!("{class}-{i}")),
            content: hit.text.unwrap_or_default(),
            score: 1.0 - hit.additional.distance.unwrap_or(1.0),
        })
        .collect())
}

impl VectorSearch for WeaviateVectorStore {
    fn search(
        &self,
        index_name: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, QueryError> {
        let class = weaviate_class_name(index_name)?;
        let url = format!("{}/v1/graphql", self.base_url);
        let body = json!({ "query": near_vector_query(&class, query_embedding, top_k)? });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| QueryError::VectorSearch(format!("{}: {e}", self.base_url)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(QueryError::VectorSearch(format!(
                "status {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: GraphQlResponse = response
            .json()
            .map_err(|e| QueryError::ResponseParsing(e.to_string()))?;
        parse_hits(&class, parsed)
    }
}

/// In-memory vector search for testing and small local runs: cosine similarity.
pub struct InMemoryVectorSearch {
    indexes: HashMap<String, Vec<StoredEntry>>,
}

struct StoredEntry {
    chunk_id: String,
    content: String,
    embedding: Vec<f32>,
}

impl InMemoryVectorSearch {
    pub fn new() -> Self {
        Self {
            indexes: HashMap::new(),
        }
    }

    pub fn add(&mut self, index_name: &str, chunk_id: &str, content: &str, embedding: Vec<f32>) {
        self.indexes
            .entry(index_name.to_string())
            .or_default()
            .push(StoredEntry {
                chunk_id: chunk_id.to_string(),
                content: content.to_string(),
                embedding,
            });
    }
}

impl Default for InMemoryVectorSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorSearch for InMemoryVectorSearch {
    fn search(
        &self,
        index_name: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, QueryError> {
        let Some(entries) = self.indexes.get(index_name) else {
            return Err(QueryError::VectorSearch(format!(
                "index '{index_name}' does not exist"
            )));
        };

        let mut scored: Vec<(f32, &StoredEntry)> = entries
            .iter()
            .map(|entry| (cosine_similarity(query_embedding, &entry.embedding), entry))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, entry)| ScoredChunk {
                chunk_id: entry.chunk_id.clone(),
                content: entry.content.clone(),
                score,
            })
            .collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Mock embedding model for testing: maps keywords to fixed axes.
pub struct KeywordEmbedder {
    keywords: Vec<String>,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

impl EmbeddingModel for KeywordEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, QueryError> {
        let lower = text.to_lowercase();
        Ok(self
            .keywords
            .iter()
            .map(|k| if lower.contains(k.as_str()) { 1.0 } else { 0.0 })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::query::ollama::MockLlmClient;
    use crate::pipeline::schema::{build_schema, parse_field_specs};

    fn store() -> InMemoryVectorSearch {
        let mut store = InMemoryVectorSearch::new();
        store.add("invoices", "c1", "Customer: Acme Corp", vec![1.0, 0.0, 0.0]);
        store.add("invoices", "c2", "Total due: 30.5", vec![0.0, 1.0, 0.0]);
        store.add("invoices", "c3", "Thank you", vec![0.0, 0.0, 1.0]);
        store
    }

    fn schema() -> DynamicSchema {
        build_schema(&parse_field_specs(&["customer", "total"], &["str", "float"]).unwrap())
    }

    #[test]
    fn cosine_similarity_identical_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!((sim - 1.0).abs() < 0.01);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.01);
    }

    #[test]
    fn cosine_similarity_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn in_memory_search_returns_top_k() {
        let results = store().search("invoices", &[0.9, 0.4, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, "c1");
        assert_eq!(results[1].chunk_id, "c2");
    }

    #[test]
    fn in_memory_search_unknown_index_fails() {
        let err = store().search("receipts", &[1.0, 0.0, 0.0], 2).unwrap_err();
        assert!(matches!(err, QueryError::VectorSearch(_)));
    }

    #[test]
    fn keyword_embedder_marks_present_keywords() {
        let embedder = KeywordEmbedder::new(&["customer", "total"]);
        assert_eq!(embedder.embed("What is the TOTAL?").unwrap(), vec![0.0, 1.0]);
    }

    #[test]
    fn retrieval_index_answers_from_context() {
        let llm = MockLlmClient::new(r#"{"customer": "Acme Corp", "total": 30.5}"#);
        let index = RetrievalIndex::new(
            Box::new(llm),
            Box::new(KeywordEmbedder::new(&["customer", "total", "thank"])),
            Box::new(store()),
            "llama3.1:8b",
        );

        let answer = index
            .query("invoices", "retrieve customer, total", &schema())
            .unwrap();
        assert_eq!(answer, r#"{"customer": "Acme Corp", "total": 30.5}"#);
    }

    #[test]
    fn retrieval_index_sends_context_and_schema_fields() {
        use std::sync::Arc;

        let mock = Arc::new(MockLlmClient::new("{}"));
        let index = RetrievalIndex::new(
            Box::new(Arc::clone(&mock)),
            Box::new(KeywordEmbedder::new(&["customer", "total", "thank"])),
            Box::new(store()),
            "llama3.1:8b",
        )
        .with_top_k(1);

        index.query("invoices", "who is the customer", &schema()).unwrap();
        let prompt = &mock.requests()[0][1].content;
        assert!(prompt.contains("Customer: Acme Corp"));
        assert!(!prompt.contains("Total due"));
        assert!(prompt.contains("customer (str), total (float)"));
    }

    #[test]
    fn retrieval_index_with_no_chunks_skips_model() {
        let mut store = InMemoryVectorSearch::new();
        store.indexes.insert("blank".into(), Vec::new());
        let index = RetrievalIndex::new(
            Box::new(MockLlmClient::new("{}")),
            Box::new(KeywordEmbedder::new(&["x"])),
            Box::new(store),
            "m",
        );
        assert_eq!(index.query("blank", "x", &schema()).unwrap(), "");
    }

    #[test]
    fn class_name_capitalizes_first_letter() {
        assert_eq!(weaviate_class_name("invoices").unwrap(), "Invoices");
        assert_eq!(weaviate_class_name("Receipts_2024").unwrap(), "Receipts_2024");
    }

    #[test]
    fn class_name_rejects_injection() {
        assert!(weaviate_class_name("bad name").is_err());
        assert!(weaviate_class_name("x){ }").is_err());
        assert!(weaviate_class_name("").is_err());
    }

    #[test]
    fn near_vector_query_embeds_vector_and_limit() {
        let query = near_vector_query("Invoices", &[0.5, 1.0], 2).unwrap();
        assert!(query.contains("Invoices(nearVector: {vector: [0.5,1.0]}, limit: 2)"));
        assert!(query.contains("_additional { id distance }"));
    }

    #[test]
    fn weaviate_hits_convert_distance_to_score() {
        let response: GraphQlResponse = serde_json::from_value(json!({
            "data": { "Get": { "Invoices": [
                { "text": "Total due: 30.5", "_additional": { "id": "abc", "distance": 0.25 } },
                { "text": "Thank you", "_additional": { "distance": 0.5 } }
            ] } }
        }))
        .unwrap();

        let hits = parse_hits("Invoices", response).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "abc");
        assert!((hits[0].score - 0.75).abs() < 1e-6);
        assert_eq!(hits[1].chunk_id, "Invoices-1");
    }

    #[test]
    fn weaviate_errors_surface_as_vector_search_failures() {
        let response: GraphQlResponse = serde_json::from_value(json!({
            "errors": [{ "message": "class Invoices not found" }]
        }))
        .unwrap();
        let err = parse_hits("Invoices", response).unwrap_err();
        assert!(err.to_string().contains("class Invoices not found"));
    }

    #[test]
    fn weaviate_store_trims_trailing_slash() {
        let store = WeaviateVectorStore::new("http://localhost:8080/", 10).unwrap();
        assert_eq!(store.base_url(), "http://localhost:8080");
    }
}
