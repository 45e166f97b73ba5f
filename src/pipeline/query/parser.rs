use serde_json::Value;

/// Parse a model answer as JSON, tolerating common wrapping.
///
/// Tries, in order: the whole trimmed response, a ```json fenced block,
/// and the outermost `{ ... }` span. Returns the first parse error otherwise.
pub fn parse_json_answer(response: &str) -> Result<Value, String> {
    let trimmed = response.trim();
    let first_error = match serde_json::from_str(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let candidates = [fenced_json_block(trimmed), outermost_object(trimmed)];
    for candidate in candidates.into_iter().flatten() {
        if let Ok(value) = serde_json::from_str(candidate) {
            return Ok(value);
        }
    }

    Err(format!("response is not valid JSON: {first_error}"))
}

/// Strict parse used for index answers: the whole text must be JSON.
pub fn parse_strict_json(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}

/// Contents of the first ```json fenced block.
fn fenced_json_block(response: &str) -> Option<&str> {
    let start = response.find("```json")? + "```json".len();
    let end = response[start..].find("```")?;
    Some(response[start..start + end].trim())
}

/// Span from the first `{` to the last `}`.
fn outermost_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_json_parses() {
        assert_eq!(parse_json_answer(" {\"a\": 1} ").unwrap(), json!({ "a": 1 }));
    }

    #[test]
    fn fenced_block_parses() {
        let response = "Here you go:\n```json\n{\"name\": \"Acme\"}\n```\nDone.";
        assert_eq!(parse_json_answer(response).unwrap(), json!({ "name": "Acme" }));
    }

    #[test]
    fn object_inside_prose_parses() {
        let response = "The answer is {\"total\": 12.5} as requested.";
        assert_eq!(parse_json_answer(response).unwrap(), json!({ "total": 12.5 }));
    }

    #[test]
    fn garbage_is_an_error() {
        let err = parse_json_answer("I could not find anything.").unwrap_err();
        assert!(err.starts_with("response is not valid JSON"));
    }

    #[test]
    fn broken_fence_is_an_error() {
        assert!(parse_json_answer("```json\n{broken\n```").is_err());
    }

    #[test]
    fn strict_parse_rejects_prose() {
        assert_eq!(parse_strict_json("{\"a\": [1, 2]}"), Some(json!({ "a": [1, 2] })));
        assert_eq!(parse_strict_json("Sure! {\"a\": 1}"), None);
        assert_eq!(parse_strict_json(""), None);
    }
}
