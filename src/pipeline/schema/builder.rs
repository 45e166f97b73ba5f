use std::fmt;

use serde::Serialize;
use serde_json::{json, Map, Number, Value};

use super::types::{ElementType, FieldDescriptor, FieldType};

/// Title carried by every generated JSON Schema.
pub const SCHEMA_TITLE: &str = "DynamicModel";

/// One required attribute of a dynamic schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaField {
    pub name: String,
    pub field_type: FieldType,
}

/// Request-scoped structural schema built from caller-declared fields.
///
/// Every field is required. A present field may hold `null` to signal that the
/// value is unknown; absence of the key is a violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DynamicSchema {
    fields: Vec<SchemaField>,
}

/// A single reason an answer does not conform to its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Build a schema with one required attribute per descriptor, in order.
pub fn build_schema(descriptors: &[FieldDescriptor]) -> DynamicSchema {
    DynamicSchema {
        fields: descriptors
            .iter()
            .map(|d| SchemaField {
                name: d.name.clone(),
                field_type: d.field_type,
            })
            .collect(),
    }
}

impl DynamicSchema {
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Field list for prompts, e.g. `name (str), amounts (List[float])`.
    pub fn describe(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{} ({})", f.name, f.field_type))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// JSON Schema sent to the model server to constrain its output.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let element = field.field_type.element.json_type();
            let property = if field.field_type.repeated {
                json!({ "type": ["array", "null"], "items": { "type": element } })
            } else {
                json!({ "type": [element, "null"] })
            };
            properties.insert(field.name.clone(), property);
        }

        json!({
            "title": SCHEMA_TITLE,
            "type": "object",
            "properties": properties,
            "required": self.field_names(),
        })
    }

    /// Validate an answer and coerce it toward the schema.
    ///
    /// Returns an object holding exactly the schema's fields in schema order;
    /// undeclared keys are dropped. All violations are collected, not just the first.
    pub fn validate(&self, value: &Value) -> Result<Map<String, Value>, Vec<FieldViolation>> {
        let Value::Object(answer) = value else {
            return Err(vec![FieldViolation {
                field: "$".into(),
                reason: format!("expected an object, got {}", describe_value(value)),
            }]);
        };

        let mut coerced = Map::new();
        let mut violations = Vec::new();

        for field in &self.fields {
            match answer.get(&field.name) {
                None => violations.push(FieldViolation {
                    field: field.name.clone(),
                    reason: "field required".into(),
                }),
                Some(v) => match coerce_field(field.field_type, v) {
                    Ok(c) => {
                        coerced.insert(field.name.clone(), c);
                    }
                    Err(reason) => violations.push(FieldViolation {
                        field: field.name.clone(),
                        reason,
                    }),
                },
            }
        }

        if violations.is_empty() {
            Ok(coerced)
        } else {
            Err(violations)
        }
    }
}

fn coerce_field(field_type: FieldType, value: &Value) -> Result<Value, String> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    if !field_type.repeated {
        return coerce_element(field_type.element, value);
    }

    let Value::Array(items) = value else {
        return Err(format!(
            "expected a list of {}, got {}",
            field_type.element.json_type(),
            describe_value(value)
        ));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            coerce_element(field_type.element, item).map_err(|e| format!("item {i}: {e}"))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn coerce_element(element: ElementType, value: &Value) -> Result<Value, String> {
    match (element, value) {
        (ElementType::String, Value::String(_)) => Ok(value.clone()),
        (ElementType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (ElementType::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),

        (ElementType::Integer, Value::Number(n)) => integer_from_number(n),
        (ElementType::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("'{s}' is not an integer")),

        (ElementType::Float, Value::Number(n)) => n
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("{n} is not a finite number")),
        (ElementType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("'{s}' is not a number")),

        _ => Err(format!(
            "expected {}, got {}",
            element.json_type(),
            describe_value(value)
        )),
    }
}

fn integer_from_number(n: &Number) -> Result<Value, String> {
    if let Some(i) = n.as_i64() {
        return Ok(Value::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(Value::from(u));
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Ok(Value::from(f as i64))
        }
        _ => Err(format!("{n} is not an integer")),
    }
}

fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
