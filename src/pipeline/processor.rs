//! Extraction pipeline orchestrator.
//!
//! Single entry point that drives a request end to end:
//! options → fields → extraction → query per group → merge → JSON text.
//!
//! Uses trait-based DI for every backend (ContentExtractor, LlmClient,
//! IndexBackend) so both variants stay testable with mock implementations.

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::pipeline::extraction::{ContentExtractor, ExtractionError, FileContentExtractor};
use crate::pipeline::merge::{format_json_output, merge_answers};
use crate::pipeline::observer::{observer_for, PipelineObserver, PipelineStep};
use crate::pipeline::options::parse_options;
use crate::pipeline::query::{
    IndexBackend, OllamaClient, OllamaEmbedder, QueryError, RefinementLoop, RetrievalIndex,
    StructuredQueryExecutor, WeaviateVectorStore,
};
use crate::pipeline::schema::{
    build_schema, parse_field_specs, partition_fields, split_form_and_table, FieldGroup, GroupMode,
    SchemaError,
};
use crate::pipeline::strategy::PipelineKind;
use crate::pipeline_config::ExtractorConfig;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while running a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid options {0:?}: expected none, [\"tables\", \"html\"] or [\"tables\", \"markdown\"]")]
    InvalidOptions(Vec<String>),

    #[error("The index pipeline needs at least 2 fields, got {0}")]
    TooFewFields(usize),

    #[error("Unknown pipeline '{0}': expected 'model' or 'index'")]
    UnknownPipeline(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Query failed: {0}")]
    Query(#[from] QueryError),

    #[error("Cannot serialize answer: {0}")]
    Serialization(String),
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Everything a caller supplies for one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// Free-text description of what is being extracted, for the logs.
    pub payload: String,
    pub field_names: Vec<String>,
    /// Type tokens aligned with `field_names`.
    pub field_types: Vec<String>,
    /// Query for unpartitioned runs; blank means `retrieve <fields>`.
    pub query: String,
    pub file_path: PathBuf,
    /// Retrieval index to search (index pipeline only).
    pub index_name: String,
    pub options: Vec<String>,
    pub debug: bool,
    pub show_progress: bool,
}

impl PipelineRequest {
    fn query_or(&self, group: &FieldGroup) -> String {
        if self.query.trim().is_empty() {
            group.default_query()
        } else {
            self.query.clone()
        }
    }
}

/// A pipeline variant: takes a request, returns indented JSON text.
pub trait ExtractionPipeline {
    fn kind(&self) -> PipelineKind;

    fn run_pipeline(&self, request: &PipelineRequest) -> Result<String, PipelineError>;
}

fn serialization_error(e: serde_json::Error) -> PipelineError {
    PipelineError::Serialization(e.to_string())
}

// ---------------------------------------------------------------------------
// Model-backed pipeline
// ---------------------------------------------------------------------------

/// Extracts the document, then asks the model once per field group.
pub struct ModelPipeline {
    extractor: Box<dyn ContentExtractor + Send + Sync>,
    executor: StructuredQueryExecutor,
    strategy: String,
    observer: Option<Box<dyn PipelineObserver + Send + Sync>>,
}

impl ModelPipeline {
    pub fn new(
        extractor: Box<dyn ContentExtractor + Send + Sync>,
        executor: StructuredQueryExecutor,
    ) -> Self {
        Self {
            extractor,
            executor,
            strategy: "fast".to_string(),
            observer: None,
        }
    }

    /// Backend mode handed to the content extractor.
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }

    /// Report progress to `observer` instead of the per-request default.
    pub fn with_observer(mut self, observer: Box<dyn PipelineObserver + Send + Sync>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Query one group; an empty group contributes nothing.
    fn query_group(
        &self,
        group: &FieldGroup,
        query: &str,
        content: &str,
        step: PipelineStep,
        request: &PipelineRequest,
        observer: &dyn PipelineObserver,
    ) -> Result<Map<String, Value>, PipelineError> {
        if group.is_empty() {
            tracing::debug!(mode = %group.mode, "No fields in group, skipping query");
            return Ok(Map::new());
        }

        let schema = build_schema(&group.descriptors);
        observer.step_started(step);
        let result = self.executor.execute(query, content, &schema, group.mode);
        observer.step_finished(step);
        let result = result?;

        if request.debug {
            tracing::info!(mode = %group.mode, answer = %result.serialized, "Group answer");
        } else {
            tracing::debug!(mode = %group.mode, answer = %result.serialized, "Group answer");
        }
        Ok(result.raw)
    }
}

impl ExtractionPipeline for ModelPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Model
    }

    fn run_pipeline(&self, request: &PipelineRequest) -> Result<String, PipelineError> {
        let run_id = Uuid::new_v4();
        let _span =
            tracing::info_span!("run_pipeline", run_id = %run_id, pipeline = %self.kind()).entered();
        let start = Instant::now();
        tracing::info!(payload = %request.payload, model = self.executor.model_name(), "Starting run");

        let result = self.run_steps(request);
        log_elapsed(start, &result);
        result
    }
}

impl ModelPipeline {
    fn run_steps(&self, request: &PipelineRequest) -> Result<String, PipelineError> {
        // Step 1: options and fields fail fast, before any extraction work
        let options = parse_options(&request.options)?;
        let descriptors = parse_field_specs(&request.field_names, &request.field_types)?;

        let default_observer;
        let observer: &dyn PipelineObserver = match &self.observer {
            Some(observer) => &**observer,
            None => {
                default_observer = observer_for(request.show_progress);
                &*default_observer
            }
        };

        // Step 2: extraction
        observer.step_started(PipelineStep::Extraction);
        let content = self
            .extractor
            .extract(&request.file_path, options.tables, &self.strategy);
        observer.step_finished(PipelineStep::Extraction);
        let content = content?;
        tracing::info!(
            text_length = content.text.len(),
            has_tables = content.tables.is_some(),
            "Extraction complete"
        );

        // Step 3: query per group
        let answer = if options.partitioned() {
            let (form, table) = split_form_and_table(&descriptors);
            if request.debug {
                tracing::info!(form = ?form.names(), table = ?table.names(), "Field partitions");
            } else {
                tracing::debug!(form = ?form.names(), table = ?table.names(), "Field partitions");
            }

            tracing::info!(fields = form.len(), "Form query");
            let form_answer = self.query_group(
                &form,
                &form.default_query(),
                &content.text,
                PipelineStep::FormQuery,
                request,
                observer,
            )?;

            tracing::info!(fields = table.len(), "Table query");
            let table_answer = self.query_group(
                &table,
                &table.default_query(),
                content.table_content(),
                PipelineStep::TableQuery,
                request,
                observer,
            )?;

            merge_answers(form_answer, table_answer)
        } else {
            let group = partition_fields(&descriptors, GroupMode::All);
            let query = request.query_or(&group);
            self.query_group(&group, &query, &content.text, PipelineStep::Query, request, observer)?
        };

        // Step 4: format
        format_json_output(&Value::Object(answer)).map_err(serialization_error)
    }
}

// ---------------------------------------------------------------------------
// Index-backed pipeline
// ---------------------------------------------------------------------------

/// Queries a retrieval index and refines until the answer parses as JSON.
pub struct IndexPipeline {
    index: Box<dyn IndexBackend + Send + Sync>,
    refine: RefinementLoop,
    observer: Option<Box<dyn PipelineObserver + Send + Sync>>,
}

impl IndexPipeline {
    pub fn new(index: Box<dyn IndexBackend + Send + Sync>, refine: RefinementLoop) -> Self {
        Self {
            index,
            refine,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn PipelineObserver + Send + Sync>) -> Self {
        self.observer = Some(observer);
        self
    }
}

impl ExtractionPipeline for IndexPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Index
    }

    fn run_pipeline(&self, request: &PipelineRequest) -> Result<String, PipelineError> {
        let run_id = Uuid::new_v4();
        let _span =
            tracing::info_span!("run_pipeline", run_id = %run_id, pipeline = %self.kind()).entered();
        let start = Instant::now();
        tracing::info!(payload = %request.payload, index = %request.index_name, "Starting run");

        let result = self.run_steps(request);
        log_elapsed(start, &result);
        result
    }
}

impl IndexPipeline {
    fn run_steps(&self, request: &PipelineRequest) -> Result<String, PipelineError> {
        // Options are validated for parity with the model pipeline; the index
        // already holds the document content.
        parse_options(&request.options)?;
        let descriptors = parse_field_specs(&request.field_names, &request.field_types)?;
        if descriptors.len() < 2 {
            return Err(PipelineError::TooFewFields(descriptors.len()));
        }

        let group = partition_fields(&descriptors, GroupMode::All);
        let schema = build_schema(&group.descriptors);
        let query = request.query_or(&group);
        if request.debug {
            tracing::info!(fields = %schema.describe(), query = %query, "Index query");
        }

        let default_observer;
        let observer: &dyn PipelineObserver = match &self.observer {
            Some(observer) => &**observer,
            None => {
                default_observer = observer_for(request.show_progress);
                &*default_observer
            }
        };

        let outcome = self.refine.run(
            &*self.index,
            &request.index_name,
            &query,
            &schema,
            observer,
        )?;
        outcome.into_text().map_err(serialization_error)
    }
}

/// Log the run's wall-clock duration, whether it answered or failed.
fn log_elapsed(start: Instant, result: &Result<String, PipelineError>) {
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(_) => tracing::info!(elapsed_ms, "Answer ready"),
        Err(e) => tracing::warn!(elapsed_ms, error = %e, "Run failed"),
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Build a pipeline of the given kind wired to real backends.
///
/// No network call is made here; backends connect on first use.
pub fn build_pipeline(
    kind: PipelineKind,
    config: &ExtractorConfig,
) -> Result<Box<dyn ExtractionPipeline + Send + Sync>, PipelineError> {
    let client = OllamaClient::from_config(config)?;

    match kind {
        PipelineKind::Model => {
            tracing::info!(model = %config.model, "Model pipeline using LLM model");
            let executor = StructuredQueryExecutor::new(Box::new(client), config.model.clone())
                .with_max_retries(config.max_retries);
            Ok(Box::new(
                ModelPipeline::new(Box::new(FileContentExtractor), executor)
                    .with_strategy(config.extraction_strategy.clone()),
            ))
        }
        PipelineKind::Index => {
            tracing::info!(
                model = %config.index_model,
                embedding_model = %config.embedding_model,
                vector_store = %config.vector_store_url,
                "Index pipeline using retrieval index"
            );
            let embedder = OllamaEmbedder::new(client.clone(), config.embedding_model.clone());
            let store =
                WeaviateVectorStore::new(&config.vector_store_url, config.request_timeout_secs)?;
            let index = RetrievalIndex::new(
                Box::new(client),
                Box::new(embedder),
                Box::new(store),
                config.index_model.clone(),
            )
            .with_top_k(config.similarity_top_k)
            .with_chunk_size(config.chunk_size);
            let refine = RefinementLoop::new(config.refine_max_attempts, config.refine_delay());
            Ok(Box::new(IndexPipeline::new(Box::new(index), refine)))
        }
    }
}

/// Build the pipeline for `kind` and run one request through it.
pub fn run_pipeline(
    kind: PipelineKind,
    config: &ExtractorConfig,
    request: &PipelineRequest,
) -> Result<String, PipelineError> {
    build_pipeline(kind, config)?.run_pipeline(request)
}
