//! Catalog Sync - product catalog maintenance backend
//!
//! Uploads product images to an object store, edits a product's ordered
//! image list, and reconciles a whole product collection against a
//! document store in atomic, chunk-indexed batches.

// Module declarations
pub mod application;
pub mod commands;
pub mod domain;
pub mod infrastructure;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use application::{AssetIngestionPipeline, CatalogSynchronizer, IngestionConstraints};
pub use commands::{BulkSyncCommands, SyncFailureReport};
pub use domain::slug::slug;
