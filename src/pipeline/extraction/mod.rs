pub mod types;
pub mod sanitize;
pub mod table_detect;
pub mod text_only;

pub use types::*;
pub use sanitize::*;
pub use text_only::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Unsupported format for extraction: '{0}'")]
    UnsupportedFormat(String),

    #[error("Text encoding error: {0}")]
    Encoding(String),
}
