//! Store interfaces consumed by the ingestion pipeline and the synchronizer
//!
//! Contains trait definitions only; adapters live in the infrastructure layer.

use async_trait::async_trait;

use crate::domain::errors::TransportError;
use crate::domain::image_asset::{FileHandle, UploadedObject};
use crate::domain::product::ProductRecord;
use crate::domain::sync::SyncChunk;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Identifiers of every record in the collection.
    async fn list_ids(&self) -> Result<Vec<String>, TransportError>;

    /// Every record, newest `updated_at` first.
    async fn list_records(&self) -> Result<Vec<ProductRecord>, TransportError>;

    /// Apply all operations of `chunk` atomically: all land or none do.
    async fn commit(&self, chunk: &SyncChunk) -> Result<(), TransportError>;

    /// Largest number of operations the provider accepts in one batch.
    fn max_batch_operations(&self) -> usize;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, file: &FileHandle) -> Result<UploadedObject, TransportError>;
}
