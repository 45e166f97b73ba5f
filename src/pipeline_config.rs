//! Extractor configuration.
//!
//! Backend URLs, model names and retry tuning are read once from a TOML file
//! and handed to the pipelines as an immutable value. Nothing in the pipeline
//! re-reads the file while a run is in progress.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Settings shared by both pipeline variants.
///
/// Every key is optional in the file; missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Base URL of the Ollama server.
    pub ollama_base_url: String,
    /// Model used by the model-backed pipeline.
    pub model: String,
    /// Model used to answer over retrieved chunks in the index-backed pipeline.
    pub index_model: String,
    /// Embedding model used to vectorise index queries.
    pub embedding_model: String,
    /// Base URL of the Weaviate-compatible vector store.
    pub vector_store_url: String,
    /// Maximum characters of one retrieved chunk packed into a prompt.
    pub chunk_size: usize,
    /// Number of chunks retrieved per index query.
    pub similarity_top_k: usize,
    /// Fixed upper bound on every HTTP call.
    pub request_timeout_secs: u64,
    /// Attempts the model-backed executor makes before giving up on validation.
    pub max_retries: u32,
    /// Attempts the refinement loop makes before reporting no answer.
    pub refine_max_attempts: u32,
    /// Blocking delay between refinement attempts.
    pub refine_delay_secs: u64,
    /// Backend mode handed to the content extractor.
    pub extraction_strategy: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            ollama_base_url: "http://localhost:11434".into(),
            model: "llama3.1:8b".into(),
            index_model: "llama3.1:8b".into(),
            embedding_model: "nomic-embed-text".into(),
            vector_store_url: "http://localhost:8080".into(),
            chunk_size: 1024,
            similarity_top_k: 2,
            request_timeout_secs: 900,
            max_retries: 3,
            refine_max_attempts: 3,
            refine_delay_secs: 5,
            extraction_strategy: "fast".into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════

impl ExtractorConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Read and parse the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text, path)?;
        tracing::debug!(path = %path.display(), "Loaded extractor config");
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    ///
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn refine_delay(&self) -> Duration {
        Duration::from_secs(self.refine_delay_secs)
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
