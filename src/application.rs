//! Application layer
//!
//! Use cases that orchestrate domain rules against the store traits.

pub mod asset_ingestion;
pub mod catalog_synchronizer;

pub use asset_ingestion::{AssetIngestionPipeline, IngestionConstraints};
pub use catalog_synchronizer::{CatalogSynchronizer, SyncPolicy};
