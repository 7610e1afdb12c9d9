//! Infrastructure layer for persistence, object storage, configuration and logging
//!
//! Concrete adapters behind the domain's `DocumentStore` and `ObjectStore` traits.

pub mod config;
pub mod database_connection;
pub mod http_object_store;
pub mod logging;
pub mod sqlite_document_store;

// Re-export commonly used items
pub use config::{AppConfig, ConfigError, ConfigManager};
pub use database_connection::DatabaseConnection;
pub use http_object_store::HttpObjectStore;
pub use sqlite_document_store::SqliteDocumentStore;
