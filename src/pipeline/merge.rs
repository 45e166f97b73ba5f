//! Answer merging and output formatting.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

/// Indentation used for every JSON answer handed back to callers.
const OUTPUT_INDENT: &[u8] = b"    ";

/// Shallow union of the form and table answers.
///
/// On key collision the table answer wins: table extraction is authoritative
/// for the fields it was asked to resolve. A colliding key keeps the position
/// it had in the form answer.
pub fn merge_answers(form: Map<String, Value>, table: Map<String, Value>) -> Map<String, Value> {
    let mut merged = form;
    for (key, value) in table {
        merged.insert(key, value);
    }
    merged
}

/// Render a JSON value with four-space indentation.
pub fn format_json_output(value: &Value) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(OUTPUT_INDENT));
    value.serialize(&mut serializer)?;
    // serde_json only ever emits valid UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
