//! Operator commands
//!
//! Each command returns a serializable report on success and a serializable
//! failure report (with its process exit status) otherwise.

pub mod bulk_sync;
pub mod ingest;

pub use bulk_sync::{BulkSyncCommands, FailureKind, SyncFailureReport, load_records};
pub use ingest::{IngestFailureReport, IngestReport, attach_to_record, ingest_files, load_files};
