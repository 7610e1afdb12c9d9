//! Error taxonomy for ingestion and synchronization
//!
//! - `ValidationError`: bad input shape, raised before any network call
//! - `TransportError`: failures talking to the document or object store
//! - `SyncError`: synchronizer failures, always tagged with phase and chunk
//! - `IngestionError`: ingestion failures, including orphaned uploads

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::image_asset::ImageAsset;
use crate::domain::sync::{SyncPhase, SyncProgress};

/// Input rejected before any side effect happened.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("no files selected")]
    EmptySelection,

    #[error("too many files: {count} selected, at most {max} allowed per call")]
    TooManyFiles { count: usize, max: usize },

    #[error("file '{file_name}' has disallowed format '{mime_type}'")]
    DisallowedFormat { file_name: String, mime_type: String },

    #[error("file '{file_name}' is empty")]
    EmptyFile { file_name: String },

    #[error("file '{file_name}' is {size} bytes, limit is {max} bytes")]
    FileTooLarge { file_name: String, size: u64, max: u64 },

    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("invalid record '{id}': {reason}")]
    InvalidRecord { id: String, reason: String },

    #[error("duplicate identifier '{0}' in target records")]
    DuplicateIdentifier(String),
}

/// Network, auth, or provider-side failure while talking to an external store.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("batch of {size} operations exceeds provider limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl From<sqlx::Error> for TransportError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Network(e.to_string())
            }
            other => Self::Storage(other.to_string()),
        }
    }
}

/// Failure of a synchronization run.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    #[error("target records rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("could not read existing catalog: {0}")]
    Inspect(#[source] TransportError),

    #[error(
        "{phase} phase failed at chunk {chunk_index} of {total_chunks} \
         ({} deleted, {} written before failure): {cause}",
        committed.deleted_count,
        committed.written_count
    )]
    PartialBatchFailure {
        phase: SyncPhase,
        chunk_index: usize,
        total_chunks: usize,
        committed: SyncProgress,
        #[source]
        cause: TransportError,
    },

    #[error("{} target identifiers already exist: {}", existing.len(), existing.join(", "))]
    Conflict { existing: Vec<String> },
}

impl SyncError {
    /// Phase the run was in when it failed.
    pub fn phase(&self) -> SyncPhase {
        match self {
            Self::Validation(_) => SyncPhase::Validate,
            Self::Inspect(_) | Self::Conflict { .. } => SyncPhase::Inspect,
            Self::PartialBatchFailure { phase, .. } => *phase,
        }
    }

    /// Index of the chunk that failed, if the failure happened while committing.
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            Self::PartialBatchFailure { chunk_index, .. } => Some(*chunk_index),
            _ => None,
        }
    }

    /// Counts already committed to the store when the run stopped.
    pub fn committed(&self) -> SyncProgress {
        match self {
            Self::PartialBatchFailure { committed, .. } => *committed,
            _ => SyncProgress::default(),
        }
    }
}

/// One file that could not be uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFailure {
    pub index: usize,
    pub file_name: String,
    pub cause: TransportError,
}

/// Uploads that landed in the object store although the call as a whole failed.
///
/// Not fatal on its own. The assets are not referenced by any record and
/// nothing removes them from the object store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanedAssetWarning {
    pub assets: Vec<ImageAsset>,
}

impl OrphanedAssetWarning {
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn public_ids(&self) -> Vec<&str> {
        self.assets.iter().map(|a| a.public_id.as_str()).collect()
    }
}

impl std::fmt::Display for OrphanedAssetWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} orphaned asset(s) left in object store: [{}]",
            self.assets.len(),
            self.public_ids().join(", ")
        )
    }
}

/// Failure of an ingestion call.
#[derive(Error, Debug, Clone)]
pub enum IngestionError {
    #[error("selection rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("{} of {total} uploads failed; {orphaned}", failures.len())]
    BatchFailed {
        total: usize,
        failures: Vec<UploadFailure>,
        orphaned: OrphanedAssetWarning,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_carries_phase_and_chunk() {
        let err = SyncError::PartialBatchFailure {
            phase: SyncPhase::Write,
            chunk_index: 1,
            total_chunks: 3,
            committed: SyncProgress {
                deleted_count: 0,
                written_count: 500,
            },
            cause: TransportError::Storage("disk I/O error".into()),
        };
        assert_eq!(err.phase(), SyncPhase::Write);
        assert_eq!(err.chunk_index(), Some(1));
        assert_eq!(err.committed().written_count, 500);
        let message = err.to_string();
        assert!(message.contains("write phase failed at chunk 1 of 3"));
        assert!(message.contains("500 written"));
    }

    #[test]
    fn test_non_chunk_errors_have_no_chunk_index() {
        let err = SyncError::Inspect(TransportError::Network("connection refused".into()));
        assert_eq!(err.phase(), SyncPhase::Inspect);
        assert_eq!(err.chunk_index(), None);

        let err = SyncError::from(ValidationError::DuplicateIdentifier("a".into()));
        assert_eq!(err.phase(), SyncPhase::Validate);
    }

    #[test]
    fn test_orphaned_warning_display() {
        let warning = OrphanedAssetWarning {
            assets: vec![ImageAsset::new(
                "https://cdn.example.com/a.jpg",
                "catalog/a",
                "a.jpg",
                1024,
            )],
        };
        assert_eq!(
            warning.to_string(),
            "1 orphaned asset(s) left in object store: [catalog/a]"
        );
    }
}
