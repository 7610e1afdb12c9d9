//! Domain module - Core catalog entities and rules
//!
//! Entities, value objects, and store interfaces. Nothing in here performs
//! I/O; adapters live in `infrastructure`.

pub mod errors;
pub mod image_asset;
pub mod image_list;
pub mod product;
pub mod repositories;
pub mod slug;
pub mod sync;

pub use errors::{
    IngestionError, OrphanedAssetWarning, SyncError, TransportError, UploadFailure,
    ValidationError,
};
pub use image_asset::{FileHandle, ImageAsset, UploadState, UploadTask, UploadedObject};
pub use image_list::ImageListEditor;
pub use product::{ProductDetails, ProductDraft, ProductRecord, validate_catalog};
pub use repositories::{DocumentStore, ObjectStore};
pub use slug::slug;
pub use sync::{BatchOperation, CatalogSnapshot, SyncChunk, SyncPhase, SyncProgress, SyncReport};
