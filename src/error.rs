// src/error.rs

use serde::Serialize;
use thiserror::Error;

/// Fetch-layer failures. Everything here propagates to the caller, which decides
/// whether to fall back to placeholder data.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network or filesystem failure (non-2xx HTTP, connect error, I/O error).
    #[error("source unavailable: {source_name}: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// A mandatory local file or directory is absent.
    #[error("dataset `{dataset_id}`: {what} not found")]
    NotFound { dataset_id: String, what: String },

    /// Structurally invalid input that cannot be repaired.
    #[error("format error: {0}")]
    Format(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown dataset `{0}`")]
    UnknownDataset(String),

    /// A parsing or normalization job on the blocking pool died.
    #[error("background task failed: {0}")]
    Task(String),
}

impl SourceError {
    pub fn unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        SourceError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn not_found(dataset_id: impl Into<String>, what: impl Into<String>) -> Self {
        SourceError::NotFound {
            dataset_id: dataset_id.into(),
            what: what.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// A row-level CSV problem. Logged and reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    /// 1-based data row index (the header row is not counted).
    pub row: usize,
    pub message: String,
}
