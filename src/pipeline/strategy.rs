//! Pipeline variant selection by name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::processor::PipelineError;

/// Which pipeline variant answers a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// Extract the document, then query the model once per field group.
    Model,
    /// Query a retrieval index, refining until the answer is JSON.
    Index,
}

impl PipelineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Index => "index",
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PipelineKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "model" => Ok(Self::Model),
            "index" => Ok(Self::Index),
            _ => Err(PipelineError::UnknownPipeline(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names() {
        assert_eq!("model".parse::<PipelineKind>().unwrap(), PipelineKind::Model);
        assert_eq!(" Index ".parse::<PipelineKind>().unwrap(), PipelineKind::Index);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "vision".parse::<PipelineKind>().unwrap_err();
        assert!(matches!(err, PipelineError::UnknownPipeline(name) if name == "vision"));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for kind in [PipelineKind::Model, PipelineKind::Index] {
            assert_eq!(kind.to_string().parse::<PipelineKind>().unwrap(), kind);
        }
    }
}
