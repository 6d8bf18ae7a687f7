//! Crate-wide error type.

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::pipeline::FetchError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OffTopicError>;

#[derive(Debug, Error)]
pub enum OffTopicError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed TimeMap at character {position}: {reason}")]
    MalformedManifest { position: usize, reason: String },

    #[error("unsupported TimeMap representation: {reason}")]
    UnsupportedTimeMap { reason: String },

    #[error("the URI-T [{uri}] is not saved in this store")]
    NoSuchTimeMap { uri: String },

    #[error("the URI-M [{uri}] is not saved in this store")]
    NoSuchMemento { uri: String },

    #[error("errors were recorded for URI-M {uri}")]
    MementoError { uri: String },

    #[error("boilerplate removal failed for URI-M {uri}: {reason}")]
    BoilerplateRemovalFailed { uri: String, reason: String },

    #[error("store index record invalid in {path}: {reason}")]
    IndexCorruption { path: String, reason: String },

    #[error("invalid data file: {reason}")]
    InvalidDataFile { reason: String },

    #[error("invalid WARC input at {location}: {reason}")]
    InvalidWarc { location: String, reason: String },

    #[error("unknown metric {name}")]
    UnknownMetric { name: String },

    #[error("invalid metric selection {value:?}: {reason}")]
    InvalidMetricSelection { value: String, reason: String },

    #[error("worker pool failure: {reason}")]
    WorkerPool { reason: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl OffTopicError {
    /// True for errors that describe a single memento rather than the store itself.
    #[must_use]
    pub fn is_memento_scoped(&self) -> bool {
        matches!(
            self,
            Self::NoSuchMemento { .. } | Self::MementoError { .. } | Self::BoilerplateRemovalFailed { .. }
        )
    }
}
