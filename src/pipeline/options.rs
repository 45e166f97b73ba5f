//! Caller option validation.
//!
//! Only three combinations are accepted: no options, `tables` + `html`, and
//! `tables` + `markdown`. Order does not matter.

use super::extraction::TableFormat;
use super::processor::PipelineError;

const ALLOWED_COMBINATIONS: &[&[&str]] = &[&[], &["html", "tables"], &["markdown", "tables"]];

/// Parsed form of a valid option list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Set when the caller asked for separate table extraction.
    pub tables: Option<TableFormat>,
}

impl PipelineOptions {
    /// Whether fields are split into form and table groups.
    pub fn partitioned(&self) -> bool {
        self.tables.is_some()
    }
}

/// Whether `options` is one of the allowed combinations.
pub fn validate_options<S: AsRef<str>>(options: &[S]) -> bool {
    let mut sorted: Vec<&str> = options.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    ALLOWED_COMBINATIONS.iter().any(|allowed| *allowed == sorted.as_slice())
}

/// Validate and interpret an option list.
pub fn parse_options<S: AsRef<str>>(options: &[S]) -> Result<PipelineOptions, PipelineError> {
    if !validate_options(options) {
        return Err(PipelineError::InvalidOptions(
            options.iter().map(|o| o.as_ref().to_string()).collect(),
        ));
    }

    let has = |name: &str| options.iter().any(|o| o.as_ref() == name);
    let tables = if has("html") {
        Some(TableFormat::Html)
    } else if has("markdown") {
        Some(TableFormat::Markdown)
    } else {
        None
    };
    Ok(PipelineOptions { tables })
}
