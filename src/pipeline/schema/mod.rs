pub mod types;
pub mod parser;
pub mod partition;
pub mod builder;

pub use types::*;
pub use parser::*;
pub use partition::*;
pub use builder::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Type '{token}' of field '{field}' is not recognized (expected str, int, float or List[...] of one of them)")]
    UnrecognizedType { field: String, token: String },

    #[error("{names} field names but {types} field types were supplied")]
    FieldCountMismatch { names: usize, types: usize },

    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("Field name at position {position} is empty")]
    EmptyFieldName { position: usize },
}
