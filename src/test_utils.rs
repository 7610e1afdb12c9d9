//! Test utilities for catalog sync
//!
//! Provides isolated in-memory databases, a document store wrapper that
//! fails on demand, and a scripted object store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::domain::errors::TransportError;
use crate::domain::image_asset::{FileHandle, ImageAsset, UploadedObject};
use crate::domain::product::{ProductDetails, ProductRecord};
use crate::domain::repositories::{DocumentStore, ObjectStore};
use crate::domain::sync::{SyncChunk, SyncPhase};
use crate::infrastructure::{DatabaseConnection, SqliteDocumentStore};

/// Test database configuration
pub struct TestDatabase {
    pub connection: DatabaseConnection,
}

impl TestDatabase {
    /// Create a new, migrated in-memory database.
    ///
    /// Each call gets a fresh, empty database.
    pub async fn new() -> Result<Self> {
        let db = DatabaseConnection::new("sqlite::memory:").await?;
        db.migrate().await?;
        Ok(Self { connection: db })
    }

    pub fn pool(&self) -> sqlx::Pool<sqlx::Sqlite> {
        self.connection.pool().clone()
    }

    pub fn document_store(&self, max_batch_operations: usize) -> SqliteDocumentStore {
        SqliteDocumentStore::new(self.pool(), max_batch_operations)
    }
}

/// `count` valid records with ids `{prefix}-{i}`, each updated one minute after the previous.
pub fn sample_records(prefix: &str, count: usize) -> Vec<ProductRecord> {
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let id = format!("{prefix}-{i}");
            let updated_at = base + chrono::Duration::minutes(i as i64);
            ProductRecord {
                name: format!("{prefix} {i}"),
                price: 1000.0 + i as f64,
                original_price: None,
                category: "test".to_string(),
                details: ProductDetails {
                    description: format!("Sample product {id}"),
                    ..ProductDetails::default()
                },
                images: vec![
                    ImageAsset::new(
                        format!("https://cdn.example.com/{id}/front.jpg"),
                        format!("catalog/{id}/front"),
                        "front.jpg",
                        2048,
                    )
                    .with_main(true),
                ],
                created_at: base,
                updated_at,
                id,
            }
        })
        .collect()
}

enum Fault {
    Unreachable,
    Chunk { phase: SyncPhase, index: usize },
}

/// Wraps a real store and fails one chosen chunk, or every read.
pub struct FaultyDocumentStore {
    inner: Arc<dyn DocumentStore>,
    fault: Fault,
    commits: AtomicUsize,
}

impl FaultyDocumentStore {
    /// Reject the chunk with `index` in `phase`; everything else passes through.
    pub fn failing_at(inner: Arc<dyn DocumentStore>, phase: SyncPhase, index: usize) -> Self {
        Self {
            inner,
            fault: Fault::Chunk { phase, index },
            commits: AtomicUsize::new(0),
        }
    }

    /// Every call fails with a network error.
    pub fn unreachable(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            fault: Fault::Unreachable,
            commits: AtomicUsize::new(0),
        }
    }

    /// Commits that reached the inner store.
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for FaultyDocumentStore {
    async fn list_ids(&self) -> Result<Vec<String>, TransportError> {
        match self.fault {
            Fault::Unreachable => Err(TransportError::Network("connection refused".into())),
            Fault::Chunk { .. } => self.inner.list_ids().await,
        }
    }

    async fn list_records(&self) -> Result<Vec<ProductRecord>, TransportError> {
        match self.fault {
            Fault::Unreachable => Err(TransportError::Network("connection refused".into())),
            Fault::Chunk { .. } => self.inner.list_records().await,
        }
    }

    async fn commit(&self, chunk: &SyncChunk) -> Result<(), TransportError> {
        match self.fault {
            Fault::Unreachable => Err(TransportError::Network("connection refused".into())),
            Fault::Chunk { phase, index } if chunk.phase == phase && chunk.index == index => {
                Err(TransportError::Rejected {
                    status: 503,
                    message: format!("injected failure at {phase} chunk {index}"),
                })
            }
            Fault::Chunk { .. } => {
                self.inner.commit(chunk).await?;
                self.commits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    fn max_batch_operations(&self) -> usize {
        self.inner.max_batch_operations()
    }
}

/// Object store that answers from a script keyed by file name.
#[derive(Default)]
pub struct MockObjectStore {
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    failures: HashMap<String, TransportError>,
    completed: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, file_name: &str, delay: Duration) -> Self {
        self.delays.insert(file_name.to_string(), delay);
        self
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn with_failure(mut self, file_name: &str, error: TransportError) -> Self {
        self.failures.insert(file_name.to_string(), error);
        self
    }

    /// File names in the order their uploads finished.
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn upload(&self, file: &FileHandle) -> Result<UploadedObject, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self
            .delays
            .get(&file.name)
            .copied()
            .unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.lock().unwrap().push(file.name.clone());

        match self.failures.get(&file.name) {
            Some(error) => Err(error.clone()),
            None => Ok(UploadedObject {
                url: format!("https://cdn.example.com/mock/{}", file.name),
                public_id: format!("mock/{}", file.name),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_creation() {
        let db = TestDatabase::new().await.unwrap();
        assert!(!db.pool().is_closed());
    }

    #[tokio::test]
    async fn test_multiple_databases_are_isolated() {
        let db1 = TestDatabase::new().await.unwrap();
        let db2 = TestDatabase::new().await.unwrap();

        let chunk = crate::domain::sync::plan_chunks(
            SyncPhase::Write,
            sample_records("iso", 2)
                .into_iter()
                .map(crate::domain::sync::BatchOperation::Upsert)
                .collect(),
            10,
        )
        .remove(0);
        db1.document_store(10).commit(&chunk).await.unwrap();

        assert_eq!(db1.document_store(10).list_ids().await.unwrap().len(), 2);
        assert!(db2.document_store(10).list_ids().await.unwrap().is_empty());
    }

    #[test]
    fn test_sample_records_are_valid() {
        let records = sample_records("s", 5);
        assert!(crate::domain::product::validate_catalog(&records).is_ok());
        assert!(records[4].updated_at > records[3].updated_at);
    }
}
