use std::collections::HashSet;

use super::types::{ElementType, FieldDescriptor, FieldType};
use super::SchemaError;

/// Wrappers that mark a repeated field. `Array[...]` is a legacy spelling of `List[...]`.
const LIST_WRAPPERS: &[&str] = &["List[", "Array["];

/// Resolve a type token against the closed vocabulary.
///
/// Accepted: `str`/`string`, `int`/`integer`, `float`, and `List[X]` / `Array[X]`
/// of one of those. Whitespace anywhere in the token is ignored. Anything else,
/// including nested lists, resolves to `None`.
pub fn resolve_type_token(token: &str) -> Option<FieldType> {
    let compact: String = token.chars().filter(|c| !c.is_whitespace()).collect();

    for wrapper in LIST_WRAPPERS {
        if let Some(inner) = compact
            .strip_prefix(wrapper)
            .and_then(|rest| rest.strip_suffix(']'))
        {
            return resolve_element(inner).map(FieldType::list);
        }
    }

    resolve_element(&compact).map(FieldType::scalar)
}

fn resolve_element(token: &str) -> Option<ElementType> {
    match token {
        "str" | "string" => Some(ElementType::String),
        "int" | "integer" => Some(ElementType::Integer),
        "float" => Some(ElementType::Float),
        _ => None,
    }
}

/// Turn parallel name/type sequences into field descriptors.
///
/// Fails on the first problem found: mismatched lengths, an empty or duplicated
/// name, or a type token outside the vocabulary.
pub fn parse_field_specs<N, T>(names: &[N], type_tokens: &[T]) -> Result<Vec<FieldDescriptor>, SchemaError>
where
    N: AsRef<str>,
    T: AsRef<str>,
{
    if names.len() != type_tokens.len() {
        return Err(SchemaError::FieldCountMismatch {
            names: names.len(),
            types: type_tokens.len(),
        });
    }

    let mut seen = HashSet::with_capacity(names.len());
    let mut descriptors = Vec::with_capacity(names.len());

    for (position, (name, token)) in names.iter().zip(type_tokens).enumerate() {
        let name = name.as_ref().trim();
        let token = token.as_ref().trim();

        if name.is_empty() {
            return Err(SchemaError::EmptyFieldName { position });
        }
        if !seen.insert(name.to_string()) {
            return Err(SchemaError::DuplicateField(name.to_string()));
        }

        let field_type =
            resolve_type_token(token).ok_or_else(|| SchemaError::UnrecognizedType {
                field: name.to_string(),
                token: token.to_string(),
            })?;

        descriptors.push(FieldDescriptor {
            name: name.to_string(),
            type_token: token.to_string(),
            field_type,
        });
    }

    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_scalar_tokens() {
        assert_eq!(resolve_type_token("str"), Some(FieldType::scalar(ElementType::String)));
        assert_eq!(resolve_type_token("int"), Some(FieldType::scalar(ElementType::Integer)));
        assert_eq!(resolve_type_token("float"), Some(FieldType::scalar(ElementType::Float)));
    }

    #[test]
    fn resolves_list_tokens() {
        assert_eq!(resolve_type_token("List[str]"), Some(FieldType::list(ElementType::String)));
        assert_eq!(resolve_type_token("List[int]"), Some(FieldType::list(ElementType::Integer)));
        assert_eq!(resolve_type_token("List[float]"), Some(FieldType::list(ElementType::Float)));
    }

    #[test]
    fn array_spelling_and_aliases_resolve() {
        assert_eq!(resolve_type_token("Array[float]"), Some(FieldType::list(ElementType::Float)));
        assert_eq!(resolve_type_token("string"), Some(FieldType::scalar(ElementType::String)));
        assert_eq!(resolve_type_token("List[ integer ]"), Some(FieldType::list(ElementType::Integer)));
    }

    #[test]
    fn rejects_tokens_outside_vocabulary() {
        for token in [
            "",
            "bool",
            "dict",
            "List",
            "List[]",
            "List[bool]",
            "List[List[int]]",
            "Optional[str]",
            "__import__('os')",
            "str]",
            "List[str",
            "list[int]",
        ] {
            assert_eq!(resolve_type_token(token), None, "token {token:?} should not resolve");
        }
    }

    #[test]
    fn parses_aligned_fields_in_order() {
        let fields = parse_field_specs(&["name", "amounts"], &["str", "List[float]"]).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "name");
        assert!(!fields[0].is_repeated());
        assert_eq!(fields[1].name, "amounts");
        assert_eq!(fields[1].type_token, "List[float]");
        assert!(fields[1].is_repeated());
    }

    #[test]
    fn unrecognized_type_names_the_field() {
        let err = parse_field_specs(&["name", "total"], &["str", "decimal"]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnrecognizedType {
                field: "total".into(),
                token: "decimal".into()
            }
        );
        assert!(err.to_string().contains("total"));
        assert!(err.to_string().contains("decimal"));
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let err = parse_field_specs(&["a", "b"], &["str"]).unwrap_err();
        assert_eq!(err, SchemaError::FieldCountMismatch { names: 2, types: 1 });
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = parse_field_specs(&["a", "a"], &["str", "int"]).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateField("a".into()));
    }

    #[test]
    fn blank_name_rejected() {
        let err = parse_field_specs(&["a", "  "], &["str", "int"]).unwrap_err();
        assert_eq!(err, SchemaError::EmptyFieldName { position: 1 });
    }

    #[test]
    fn accepts_owned_strings() {
        let names = vec!["qty".to_string()];
        let types = vec![" int ".to_string()];
        let fields = parse_field_specs(&names, &types).unwrap();
        assert_eq!(fields[0].type_token, "int");
    }
}
