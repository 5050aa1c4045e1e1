//! Report envelope returned across the engine boundary, and its sinks.

pub mod kind;
pub mod store;

use crate::error::AuditError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use kind::ReportKind;
pub use store::{MemoryReportStore, ParquetReportStore, ReportStore, StoredReport};

/// Either a complete payload or a single `error` field, never both.
///
/// Serializes untagged, so a success renders as the payload's own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Report<T> {
    Failed { error: String },
    Complete(T),
}

impl<T> Report<T> {
    pub fn is_error(&self) -> bool {
        matches!(self, Report::Failed { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Report::Failed { error } => Some(error),
            Report::Complete(_) => None,
        }
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            Report::Complete(value) => Some(value),
            Report::Failed { .. } => None,
        }
    }

    pub fn into_result(self) -> std::result::Result<T, String> {
        match self {
            Report::Complete(value) => Ok(value),
            Report::Failed { error } => Err(error),
        }
    }
}

impl<T> From<Result<T, AuditError>> for Report<T> {
    fn from(result: Result<T, AuditError>) -> Self {
        match result {
            Ok(value) => Report::Complete(value),
            Err(err) => Report::Failed {
                error: err.to_string(),
            },
        }
    }
}

impl<T: Serialize> Report<T> {
    /// Flat JSON mapping, as handed to the transport layer or a `ReportStore`.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("report serialization failed: {}", e) })
        })
    }
}
