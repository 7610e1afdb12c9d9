//! Full-collection synchronization against the document store
//!
//! A run deletes or skips the existing records, then writes the target set,
//! in chunks no larger than the store's atomic batch limit. Chunks commit
//! strictly one after another. Each chunk is atomic; the run as a whole is
//! not, so a failure reports the phase, the chunk index, and the counts that
//! already landed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::errors::SyncError;
use crate::domain::product::{ProductRecord, validate_catalog};
use crate::domain::repositories::DocumentStore;
use crate::domain::sync::{
    BatchOperation, CatalogSnapshot, SyncChunk, SyncPhase, SyncProgress, SyncReport, plan_chunks,
};

/// How the existing collection is treated before the target set is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Delete every existing record, then write the targets.
    ReplaceAll,
    /// Keep existing records; refuse if any target identifier already exists.
    UploadOnly,
}

#[derive(Clone)]
pub struct CatalogSynchronizer {
    store: Arc<dyn DocumentStore>,
    batch_limit: usize,
}

impl CatalogSynchronizer {
    /// `max_batch_operations` is clamped to what the store itself accepts.
    pub fn new(store: Arc<dyn DocumentStore>, max_batch_operations: usize) -> Self {
        let batch_limit = max_batch_operations
            .min(store.max_batch_operations())
            .max(1);
        Self { store, batch_limit }
    }

    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    /// Replace the whole collection with `target_records`.
    ///
    /// An empty target set deletes everything.
    pub async fn replace_all(
        &self,
        target_records: Vec<ProductRecord>,
    ) -> Result<SyncReport, SyncError> {
        self.run(target_records, SyncPolicy::ReplaceAll).await
    }

    /// Write `target_records` without deleting anything.
    pub async fn upload_only(
        &self,
        target_records: Vec<ProductRecord>,
    ) -> Result<SyncReport, SyncError> {
        self.run(target_records, SyncPolicy::UploadOnly).await
    }

    pub async fn inspect(&self) -> Result<CatalogSnapshot, SyncError> {
        let records = self.store.list_records().await.map_err(SyncError::Inspect)?;
        Ok(CatalogSnapshot {
            record_count: records.len(),
            last_updated_at: records.iter().map(|r| r.updated_at).max(),
            ids: records.into_iter().map(|r| r.id).collect(),
        })
    }

    pub async fn run(
        &self,
        target_records: Vec<ProductRecord>,
        policy: SyncPolicy,
    ) -> Result<SyncReport, SyncError> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();

        validate_catalog(&target_records)?;

        let existing = self.store.list_ids().await.map_err(|e| {
            error!(%run_id, "Failed to read existing catalog: {}", e);
            SyncError::Inspect(e)
        })?;
        info!(
            %run_id,
            "🔄 Sync {:?}: {} existing record(s), {} target record(s), batch limit {}",
            policy,
            existing.len(),
            target_records.len(),
            self.batch_limit
        );

        let delete_ops: Vec<BatchOperation> = match policy {
            SyncPolicy::ReplaceAll => existing.into_iter().map(BatchOperation::Delete).collect(),
            SyncPolicy::UploadOnly => {
                let existing: HashSet<String> = existing.into_iter().collect();
                let mut clashes: Vec<String> = target_records
                    .iter()
                    .filter(|r| existing.contains(&r.id))
                    .map(|r| r.id.clone())
                    .collect();
                if !clashes.is_empty() {
                    clashes.sort();
                    error!(%run_id, "Upload refused, {} identifier(s) already exist", clashes.len());
                    return Err(SyncError::Conflict { existing: clashes });
                }
                Vec::new()
            }
        };

        let mut progress = SyncProgress::default();

        let delete_chunks = plan_chunks(SyncPhase::Delete, delete_ops, self.batch_limit);
        self.commit_phase(run_id, &delete_chunks, &mut progress).await?;

        let write_ops = target_records.into_iter().map(BatchOperation::Upsert).collect();
        let write_chunks = plan_chunks(SyncPhase::Write, write_ops, self.batch_limit);
        self.commit_phase(run_id, &write_chunks, &mut progress).await?;

        let report = SyncReport {
            run_id,
            deleted_count: progress.deleted_count,
            written_count: progress.written_count,
            delete_chunks: delete_chunks.len(),
            write_chunks: write_chunks.len(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            %run_id,
            "✅ Sync completed: {} deleted in {} chunk(s), {} written in {} chunk(s)",
            report.deleted_count,
            report.delete_chunks,
            report.written_count,
            report.write_chunks
        );
        Ok(report)
    }

    /// Commit `chunks` in order, stopping at the first failure.
    async fn commit_phase(
        &self,
        run_id: Uuid,
        chunks: &[SyncChunk],
        progress: &mut SyncProgress,
    ) -> Result<(), SyncError> {
        let total_chunks = chunks.len();
        for chunk in chunks {
            debug!(
                %run_id,
                "Committing {} chunk {}/{} ({} operations)",
                chunk.phase,
                chunk.index + 1,
                total_chunks,
                chunk.len()
            );

            if let Err(cause) = self.store.commit(chunk).await {
                error!(
                    %run_id,
                    "❌ {} chunk {} of {} failed: {}",
                    chunk.phase,
                    chunk.index,
                    total_chunks,
                    cause
                );
                return Err(SyncError::PartialBatchFailure {
                    phase: chunk.phase,
                    chunk_index: chunk.index,
                    total_chunks,
                    committed: *progress,
                    cause,
                });
            }

            match chunk.phase {
                SyncPhase::Delete => progress.deleted_count += chunk.len(),
                SyncPhase::Write => progress.written_count += chunk.len(),
                SyncPhase::Validate | SyncPhase::Inspect => {}
            }
        }
        Ok(())
    }
}
