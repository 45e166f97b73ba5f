use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Markup requested for the separate table blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Html,
    Markdown,
}

impl TableFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Markdown => "markdown",
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text of a document plus, when requested and present, its tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub text: String,
    pub tables: Option<String>,
}

impl ExtractedContent {
    /// Content the table group is asked about: the table blob when there is
    /// one, the main text otherwise.
    pub fn table_content(&self) -> &str {
        self.tables.as_deref().unwrap_or(&self.text)
    }
}

/// Turns a document on disk into text for the query stage (allows mocking).
pub trait ContentExtractor {
    fn extract(
        &self,
        path: &Path,
        format_hint: Option<TableFormat>,
        strategy: &str,
    ) -> Result<ExtractedContent, ExtractionError>;
}

/// Extractor returning fixed content regardless of the file, for tests and
/// callers that already hold the document text.
#[derive(Debug, Clone, Default)]
pub struct StaticContentExtractor {
    content: ExtractedContent,
}

impl StaticContentExtractor {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            content: ExtractedContent {
                text: text.into(),
                tables: None,
            },
        }
    }

    pub fn with_tables(mut self, tables: impl Into<String>) -> Self {
        self.content.tables = Some(tables.into());
        self
    }
}

impl ContentExtractor for StaticContentExtractor {
    fn extract(
        &self,
        _path: &Path,
        format_hint: Option<TableFormat>,
        _strategy: &str,
    ) -> Result<ExtractedContent, ExtractionError> {
        let mut content = self.content.clone();
        if format_hint.is_none() {
            content.tables = None;
        }
        Ok(content)
    }
}
