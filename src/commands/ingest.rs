//! Image ingestion entry point
//!
//! Loads files from disk, runs them through the ingestion pipeline and
//! reports either the ordered assets or every failure plus the orphans.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::asset_ingestion::AssetIngestionPipeline;
use crate::commands::bulk_sync::FailureKind;
use crate::domain::errors::{IngestionError, UploadFailure, ValidationError};
use crate::domain::image_asset::{FileHandle, ImageAsset};
use crate::domain::product::{ProductDraft, ProductRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub assets: Vec<ImageAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestFailureReport {
    pub kind: FailureKind,
    pub cause: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<UploadFailure>,
    /// Uploaded but unreferenced; left in the object store.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orphaned: Vec<ImageAsset>,
}

impl IngestFailureReport {
    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }
}

impl From<IngestionError> for IngestFailureReport {
    fn from(err: IngestionError) -> Self {
        let cause = err.to_string();
        match err {
            IngestionError::Validation(_) => Self {
                kind: FailureKind::Validation,
                cause,
                failures: Vec::new(),
                orphaned: Vec::new(),
            },
            IngestionError::BatchFailed {
                failures, orphaned, ..
            } => Self {
                kind: FailureKind::PartialBatchFailure,
                cause,
                failures,
                orphaned: orphaned.assets,
            },
        }
    }
}

/// Read every path into a `FileHandle`, keeping the given order.
pub async fn load_files(paths: &[PathBuf]) -> Result<Vec<FileHandle>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = FileHandle::from_path(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        files.push(file);
    }
    Ok(files)
}

pub async fn ingest_files(
    pipeline: &AssetIngestionPipeline,
    files: Vec<FileHandle>,
) -> Result<IngestReport, IngestFailureReport> {
    let assets = pipeline.ingest(files).await?;
    Ok(IngestReport { assets })
}

/// Append freshly ingested assets to an existing record's image list.
///
/// The record keeps its main image if it has one; otherwise the first
/// image becomes main.
pub fn attach_to_record(
    record: ProductRecord,
    assets: Vec<ImageAsset>,
    now: DateTime<Utc>,
) -> Result<ProductRecord, ValidationError> {
    let mut draft = ProductDraft::from_record(record);
    draft.images.append(assets);
    draft.into_record(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::asset_ingestion::IngestionConstraints;
    use crate::domain::errors::TransportError;
    use crate::test_utils::{MockObjectStore, sample_records};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_load_files_keeps_order_and_guesses_mime() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("b-second.png");
        let b = dir.path().join("a-first.jpg");
        std::fs::write(&a, [1u8, 2, 3]).unwrap();
        std::fs::write(&b, [4u8]).unwrap();

        let files = load_files(&[a, b]).await.unwrap();

        assert_eq!(files[0].name, "b-second.png");
        assert_eq!(files[0].mime_type, "image/png");
        assert_eq!(files[1].mime_type, "image/jpeg");
        assert!(load_files(&[dir.path().join("missing.png")]).await.is_err());
    }

    #[tokio::test]
    async fn test_batch_failure_reports_orphans() {
        let store = MockObjectStore::new().with_failure(
            "b.png",
            TransportError::Rejected {
                status: 400,
                message: "bad".into(),
            },
        );
        let pipeline = AssetIngestionPipeline::new(Arc::new(store), IngestionConstraints::default());
        let files = vec![
            FileHandle::new("a.png", vec![1]),
            FileHandle::new("b.png", vec![2]),
        ];

        let failure = ingest_files(&pipeline, files).await.unwrap_err();

        assert_eq!(failure.exit_code(), 4);
        assert_eq!(failure.failures.len(), 1);
        assert_eq!(failure.failures[0].index, 1);
        assert_eq!(failure.orphaned.len(), 1);
        assert_eq!(failure.orphaned[0].public_id, "mock/a.png");
    }

    #[tokio::test]
    async fn test_validation_failure_exit_code() {
        let pipeline = AssetIngestionPipeline::new(
            Arc::new(MockObjectStore::new()),
            IngestionConstraints::default(),
        );
        let failure = ingest_files(&pipeline, Vec::new()).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Validation);
        assert_eq!(failure.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_ingested_assets_attach_behind_existing_main() {
        let pipeline = AssetIngestionPipeline::new(
            Arc::new(MockObjectStore::new()),
            IngestionConstraints::default(),
        );
        let report = ingest_files(
            &pipeline,
            vec![
                FileHandle::new("side.jpg", vec![1]),
                FileHandle::new("back.jpg", vec![2]),
            ],
        )
        .await
        .unwrap();
        assert!(report.assets[0].is_main);

        let record = sample_records("kurta", 1).remove(0);
        let created_at = record.created_at;
        let now = Utc::now();

        let updated = attach_to_record(record, report.assets, now).unwrap();

        assert_eq!(updated.images.len(), 3);
        assert_eq!(updated.images.iter().filter(|a| a.is_main).count(), 1);
        assert!(updated.images[0].is_main);
        assert_eq!(updated.images[1].public_id, "mock/side.jpg");
        assert_eq!(updated.created_at, created_at);
        assert_eq!(updated.updated_at, now);
    }
}
