//! End-to-end workflow over a file-backed database:
//! ingest images, fold them into a draft, replace the catalog, recover from a
//! failed chunk by re-running.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use catalog_sync_lib::application::{AssetIngestionPipeline, CatalogSynchronizer, IngestionConstraints};
use catalog_sync_lib::commands::{BulkSyncCommands, FailureKind};
use catalog_sync_lib::domain::{
    DocumentStore, FileHandle, ObjectStore, ProductDraft, ProductRecord, SyncChunk, SyncPhase,
    TransportError, UploadedObject,
};
use catalog_sync_lib::infrastructure::{DatabaseConnection, SqliteDocumentStore};

struct EchoObjectStore;

#[async_trait]
impl ObjectStore for EchoObjectStore {
    async fn upload(&self, file: &FileHandle) -> Result<UploadedObject, TransportError> {
        Ok(UploadedObject {
            url: format!("https://cdn.example.com/catalog/{}", file.name),
            public_id: format!("catalog/{}", file.name),
        })
    }
}

/// Fails the first write chunk with index 1 once, then behaves.
struct FlakyStore {
    inner: SqliteDocumentStore,
    tripped: AtomicBool,
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn list_ids(&self) -> Result<Vec<String>, TransportError> {
        self.inner.list_ids().await
    }

    async fn list_records(&self) -> Result<Vec<ProductRecord>, TransportError> {
        self.inner.list_records().await
    }

    async fn commit(&self, chunk: &SyncChunk) -> Result<(), TransportError> {
        if chunk.phase == SyncPhase::Write
            && chunk.index == 1
            && !self.tripped.swap(true, Ordering::SeqCst)
        {
            return Err(TransportError::Network("connection reset".into()));
        }
        self.inner.commit(chunk).await
    }

    fn max_batch_operations(&self) -> usize {
        self.inner.max_batch_operations()
    }
}

async fn file_store(dir: &tempfile::TempDir, limit: usize) -> SqliteDocumentStore {
    let url = format!("sqlite:{}", dir.path().join("catalog.db").display());
    let db = DatabaseConnection::new(&url).await.unwrap();
    db.migrate().await.unwrap();
    SqliteDocumentStore::new(db.pool().clone(), limit)
}

async fn product(pipeline: &AssetIngestionPipeline, name: &str) -> ProductRecord {
    let files = vec![
        FileHandle::new("front.jpg", vec![1, 2, 3]),
        FileHandle::new("back.webp", vec![4, 5]),
    ];
    let assets = pipeline.ingest(files).await.unwrap();

    let mut draft = ProductDraft::new(name, 2499.0, "kurta-sets");
    draft.images.append(assets);
    draft.images.reorder(1, 0).unwrap();
    draft.into_record(Utc::now()).unwrap()
}

#[tokio::test]
async fn ingest_draft_and_replace_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(file_store(&dir, 500).await);
    let pipeline = AssetIngestionPipeline::new(Arc::new(EchoObjectStore), IngestionConstraints::default());

    let record = product(&pipeline, "Royal Anarkali Set — 3 Pc.").await;
    assert_eq!(record.id, "royal-anarkali-set-3-pc");
    // Main-ness followed the front image to index 1.
    assert!(!record.images[0].is_main);
    assert!(record.images[1].is_main);
    assert_eq!(record.images[1].file_name, "front.jpg");

    let commands = BulkSyncCommands::new(CatalogSynchronizer::new(store.clone(), 500));
    let report = commands.full_replace(vec![record.clone()]).await.unwrap();
    assert_eq!(report.written_count, 1);

    assert_eq!(store.get("royal-anarkali-set-3-pc").await.unwrap(), Some(record));
    let snapshot = commands.inspect().await.unwrap();
    assert_eq!(snapshot.ids, vec!["royal-anarkali-set-3-pc"]);
}

#[tokio::test]
async fn rerun_after_partial_failure_converges() {
    let dir = tempfile::tempdir().unwrap();
    let inner = file_store(&dir, 500).await;
    let flaky = Arc::new(FlakyStore {
        inner: inner.clone(),
        tripped: AtomicBool::new(false),
    });
    let commands = BulkSyncCommands::new(CatalogSynchronizer::new(flaky, 3));

    let targets: Vec<ProductRecord> = (0..8)
        .map(|i| {
            ProductDraft::new(format!("Chikankari Kurta {i}"), 1500.0, "kurtas")
                .into_record(Utc::now())
                .unwrap()
        })
        .collect();

    let failure = commands.full_replace(targets.clone()).await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::PartialBatchFailure);
    assert_eq!(failure.phase, SyncPhase::Write);
    assert_eq!(failure.chunk_index, Some(1));
    assert_eq!(failure.total_chunks, Some(3));
    assert_eq!(failure.committed.written_count, 3);
    assert_eq!(inner.count().await.unwrap(), 3);

    let report = commands.full_replace(targets).await.unwrap();
    assert_eq!(report.deleted_count, 3);
    assert_eq!(report.written_count, 8);
    assert_eq!(inner.count().await.unwrap(), 8);
}

#[tokio::test]
async fn too_many_files_is_rejected_before_upload() {
    let pipeline = AssetIngestionPipeline::new(Arc::new(EchoObjectStore), IngestionConstraints::default());
    let files: Vec<FileHandle> = (0..11)
        .map(|i| FileHandle::new(format!("{i}.png"), vec![1]))
        .collect();

    let err = pipeline.ingest(files).await.unwrap_err();
    assert!(err.to_string().contains("too many files"));
}
