//! Error taxonomy for the analysis engine.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuditError {
    /// Input bytes could not be decoded into a table (or a model artifact).
    #[error("Failed to parse input: {0}")]
    Parse(String),

    /// A required column is absent.
    #[error("Dataset does not contain a '{column}' column.")]
    Schema { column: String },

    /// The classifier lacks an operation the analyzer needs.
    #[error("Model does not support {capability}")]
    ModelCapability { capability: String },

    /// A numeric parameter was out of range.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The classifier ran but returned something unusable.
    #[error("Model inference failed: {0}")]
    Inference(String),
}

impl AuditError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::Schema {
            column: column.into(),
        }
    }

    pub fn unsupported(capability: impl Into<String>) -> Self {
        Self::ModelCapability {
            capability: capability.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;

impl From<arrow::error::ArrowError> for AuditError {
    fn from(err: arrow::error::ArrowError) -> Self {
        AuditError::Parse(err.to_string())
    }
}
