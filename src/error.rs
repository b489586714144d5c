//! Error taxonomy for the ingestion pipeline.
//!
//! Each error type maps to a failure scope:
//!
//! - [`FormatError`] - the export cannot be recognised or parsed; fatal to the task
//! - [`TreeError`] - a single conversation has a malformed parent graph; that
//!   conversation is skipped
//! - [`ProviderError`] - the embedding or labeling backend failed; degraded locally
//! - [`ClusteringError`] - distance or cluster computation failed; fatal to the month
//! - [`PersistenceError`] - a snapshot could not be written; fatal to the task
//!
//! Task-level code wraps these in `anyhow::Error` with context, matching how the
//! CLI reports failures.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Unknown chat format: {0}")]
    UnknownFormat(String),

    #[error("Failed to read export {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File too large: {path} ({size} bytes, max {max} bytes)")]
    TooLarge { path: PathBuf, size: u64, max: u64 },

    #[error("Invalid JSON in export: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Too many invalid conversations: {failed} of {total} could not be processed")]
    TooManyInvalid { failed: usize, total: usize },
}

impl FormatError {
    /// Fail once more than half of `total` conversations were rejected
    pub fn check_failure_rate(failed: usize, total: usize) -> Result<(), FormatError> {
        if total > 0 && (failed as f64) / (total as f64) > 0.5 {
            return Err(FormatError::TooManyInvalid { failed, total });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("Cycle detected in conversation {conversation} at message {message_id}")]
    CycleDetected { conversation: String, message_id: String },
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Unavailable(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusteringError {
    #[error("Embedding dimension mismatch: expected {expected}, found {found} at row {row}")]
    DimensionMismatch { expected: usize, found: usize, row: usize },

    #[error("Distance matrix must be square: {rows} rows, row {row} has {len} columns")]
    NotSquare { rows: usize, row: usize, len: usize },

    #[error("Distance matrix contains a non-finite value at ({row}, {col})")]
    NonFinite { row: usize, col: usize },

    #[error("Expected {expected} points, found {found}")]
    LengthMismatch { expected: usize, found: usize },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Snapshot for {0} already exists")]
    AlreadyExists(String),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode or decode {path}: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Snapshot for {0} not found")]
    NotFound(String),

    #[error("Invalid month key: {0:?} (expected YYYY-MM)")]
    InvalidMonth(String),
}

/// Failure of a single month; the run continues with the next month.
#[derive(Debug, Error)]
pub enum MonthError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Clustering(#[from] ClusteringError),
}
