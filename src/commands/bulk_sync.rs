//! Bulk synchronization entry points
//!
//! Thin wrappers around `CatalogSynchronizer` that fix the policy for each
//! operator action and turn failures into a serializable report.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::application::catalog_synchronizer::{CatalogSynchronizer, SyncPolicy};
use crate::domain::errors::SyncError;
use crate::domain::product::ProductRecord;
use crate::domain::sync::{CatalogSnapshot, SyncPhase, SyncProgress, SyncReport};

/// Category of a failed command, used for the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    Validation,
    Connectivity,
    Conflict,
    PartialBatchFailure,
}

impl FailureKind {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Validation => 2,
            Self::Conflict => 3,
            Self::PartialBatchFailure => 4,
            Self::Connectivity => 1,
        }
    }
}

/// What an operator needs to resume after a failed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailureReport {
    pub kind: FailureKind,
    pub phase: SyncPhase,
    pub chunk_index: Option<usize>,
    pub total_chunks: Option<usize>,
    pub committed: SyncProgress,
    pub cause: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicting_ids: Vec<String>,
}

impl SyncFailureReport {
    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }
}

impl From<SyncError> for SyncFailureReport {
    fn from(err: SyncError) -> Self {
        let phase = err.phase();
        let chunk_index = err.chunk_index();
        let committed = err.committed();
        let (kind, total_chunks, cause, conflicting_ids) = match err {
            SyncError::Validation(e) => (FailureKind::Validation, None, e.to_string(), Vec::new()),
            SyncError::Inspect(e) => (FailureKind::Connectivity, None, e.to_string(), Vec::new()),
            SyncError::PartialBatchFailure {
                total_chunks,
                cause,
                ..
            } => (
                FailureKind::PartialBatchFailure,
                Some(total_chunks),
                cause.to_string(),
                Vec::new(),
            ),
            SyncError::Conflict { existing } => (
                FailureKind::Conflict,
                None,
                format!("{} identifier(s) already exist", existing.len()),
                existing,
            ),
        };
        Self {
            kind,
            phase,
            chunk_index,
            total_chunks,
            committed,
            cause,
            conflicting_ids,
        }
    }
}

pub struct BulkSyncCommands {
    synchronizer: CatalogSynchronizer,
}

impl BulkSyncCommands {
    pub fn new(synchronizer: CatalogSynchronizer) -> Self {
        Self { synchronizer }
    }

    /// Replace the whole collection with `records`.
    pub async fn full_replace(
        &self,
        records: Vec<ProductRecord>,
    ) -> Result<SyncReport, SyncFailureReport> {
        info!("Full replace requested with {} record(s)", records.len());
        self.execute(records, SyncPolicy::ReplaceAll).await
    }

    /// Delete every record in the collection.
    pub async fn delete_all(&self) -> Result<SyncReport, SyncFailureReport> {
        info!("Delete-all requested");
        self.execute(Vec::new(), SyncPolicy::ReplaceAll).await
    }

    /// Add `records` without touching existing ones; refuses on any clash.
    pub async fn upload_only(
        &self,
        records: Vec<ProductRecord>,
    ) -> Result<SyncReport, SyncFailureReport> {
        info!("Upload-only requested with {} record(s)", records.len());
        self.execute(records, SyncPolicy::UploadOnly).await
    }

    pub async fn inspect(&self) -> Result<CatalogSnapshot, SyncFailureReport> {
        self.synchronizer.inspect().await.map_err(SyncFailureReport::from)
    }

    async fn execute(
        &self,
        records: Vec<ProductRecord>,
        policy: SyncPolicy,
    ) -> Result<SyncReport, SyncFailureReport> {
        self.synchronizer.run(records, policy).await.map_err(|e| {
            let report = SyncFailureReport::from(e);
            if report.kind == FailureKind::PartialBatchFailure {
                warn!(
                    "Store left partially synchronized: {} deleted, {} written",
                    report.committed.deleted_count, report.committed.written_count
                );
            }
            report
        })
    }
}

/// Read a JSON array of product records.
pub async fn load_records(path: impl AsRef<Path>) -> Result<Vec<ProductRecord>> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read records file {}", path.display()))?;
    let records: Vec<ProductRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Records file {} is not a JSON array of products", path.display()))?;
    info!("Loaded {} record(s) from {}", records.len(), path.display());
    Ok(records)
}
