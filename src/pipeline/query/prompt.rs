use super::types::ScoredChunk;
use crate::pipeline::schema::{DynamicSchema, FieldViolation};

/// System prompt for schema-bound extraction requests.
pub const EXTRACTION_SYSTEM_PROMPT: &str = "You extract data from documents. \
Answer with a single JSON object and nothing else. \
Never invent values that are not present in the content.";

/// Separator framing retrieved context in index prompts.
const CONTEXT_RULE: &str = "---------------------";

/// Build the user prompt for a model-backed query.
///
/// Instructs the model to answer `null` for any field whose value is absent.
pub fn build_extraction_prompt(query: &str, content: &str) -> String {
    format!(
        "{query} from the following content:\n\n{content}\n\n\
         If the value of a requested field is missing from the content, return null for that field."
    )
}

/// Follow-up message sent after an answer failed validation.
pub fn build_retry_feedback(violations: &[FieldViolation]) -> String {
    let mut feedback =
        String::from("Your previous answer did not match the required JSON schema:\n");
    for violation in violations {
        feedback.push_str("- ");
        feedback.push_str(&violation.to_string());
        feedback.push('\n');
    }
    feedback.push_str("Answer again with a corrected JSON object containing every required field.");
    feedback
}

/// Pack retrieved chunks into one context block, best match first.
///
/// Each chunk is cut to at most `chunk_size` characters.
pub fn assemble_context(chunks: &[ScoredChunk], chunk_size: usize) -> String {
    chunks
        .iter()
        .map(|c| truncate_chars(c.content.trim(), chunk_size))
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the prompt answering a free-form query over retrieved context.
pub fn build_index_prompt(query: &str, context: &str, schema: &DynamicSchema) -> String {
    format!(
        "Context information is below.\n{CONTEXT_RULE}\n{context}\n{CONTEXT_RULE}\n\
         Using only the context above, answer the query as a JSON object with the fields: {}.\n\
         Query: {query}\nAnswer:",
        schema.describe()
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
