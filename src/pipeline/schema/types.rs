use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar element types a field may resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    String,
    Integer,
    Float,
}

impl ElementType {
    /// Canonical type token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "str",
            Self::Integer => "int",
            Self::Float => "float",
        }
    }

    /// JSON Schema type name.
    pub fn json_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "number",
        }
    }
}

/// Resolved type of a field: a scalar, or a list of that scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldType {
    pub element: ElementType,
    pub repeated: bool,
}

impl FieldType {
    pub fn scalar(element: ElementType) -> Self {
        Self {
            element,
            repeated: false,
        }
    }

    pub fn list(element: ElementType) -> Self {
        Self {
            element,
            repeated: true,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.repeated {
            write!(f, "List[{}]", self.element.as_str())
        } else {
            write!(f, "{}", self.element.as_str())
        }
    }
}

/// One caller-declared field after its type token has been resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    /// The token exactly as the caller supplied it.
    pub type_token: String,
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub fn is_repeated(&self) -> bool {
        self.field_type.repeated
    }
}

/// Which slice of the declared fields a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
    /// Scalar fields only.
    Form,
    /// Repeated fields only.
    Table,
    /// Every field, no partitioning.
    All,
}

impl GroupMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::Table => "table",
            Self::All => "all",
        }
    }

    /// Whether a descriptor belongs to this group.
    pub fn accepts(&self, descriptor: &FieldDescriptor) -> bool {
        match self {
            Self::Form => !descriptor.is_repeated(),
            Self::Table => descriptor.is_repeated(),
            Self::All => true,
        }
    }
}

impl fmt::Display for GroupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered descriptors sharing one mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldGroup {
    pub mode: GroupMode,
    pub descriptors: Vec<FieldDescriptor>,
}

impl FieldGroup {
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.name.as_str()).collect()
    }

    /// Query used when the caller did not phrase one: `retrieve a, b, c`.
    pub fn default_query(&self) -> String {
        format!("retrieve {}", self.names().join(", "))
    }
}
