//! Chunked batch operations and run reports for catalog synchronization

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::product::ProductRecord;

/// Step of a synchronization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Validate,
    Inspect,
    Delete,
    Write,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Inspect => "inspect",
            Self::Delete => "delete",
            Self::Write => "write",
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single document operation inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOperation {
    Delete(String),
    Upsert(ProductRecord),
}

impl BatchOperation {
    pub fn id(&self) -> &str {
        match self {
            Self::Delete(id) => id,
            Self::Upsert(record) => &record.id,
        }
    }
}

/// A bounded run of operations committed as one atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncChunk {
    pub phase: SyncPhase,
    pub index: usize,
    pub operations: Vec<BatchOperation>,
}

impl SyncChunk {
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Split `operations` into chunks of at most `limit` entries, indexed from 0.
///
/// `limit` must be positive; configuration validation guarantees it.
pub fn plan_chunks(
    phase: SyncPhase,
    operations: Vec<BatchOperation>,
    limit: usize,
) -> Vec<SyncChunk> {
    let limit = limit.max(1);
    let mut chunks = Vec::with_capacity(operations.len().div_ceil(limit));
    let mut operations = operations.into_iter().peekable();
    while operations.peek().is_some() {
        let batch: Vec<BatchOperation> = operations.by_ref().take(limit).collect();
        chunks.push(SyncChunk {
            phase,
            index: chunks.len(),
            operations: batch,
        });
    }
    chunks
}

/// Operations already committed when a run stopped or finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub deleted_count: usize,
    pub written_count: usize,
}

/// Summary of a successful synchronization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub run_id: Uuid,
    pub deleted_count: usize,
    pub written_count: usize,
    pub delete_chunks: usize,
    pub write_chunks: usize,
    pub duration_ms: u64,
}

/// Read-only view of the current collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    pub record_count: usize,
    /// Newest first, by `updatedAt`.
    pub ids: Vec<String>,
    pub last_updated_at: Option<DateTime<Utc>>,
}
