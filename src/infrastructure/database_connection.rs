// Database connection and pool management
// This module handles SQLite database connections using sqlx

use anyhow::{Context, Result};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_max_connections(database_url, crate::infrastructure::config::defaults::DB_MAX_CONNECTIONS).await
    }

    pub async fn with_max_connections(database_url: &str, max_connections: u32) -> Result<Self> {
        if is_memory_url(database_url) {
            // Every new connection to :memory: opens a separate database, so
            // the pool is pinned to one connection that never expires.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(database_url)
                .await
                .context("Failed to open in-memory database")?;
            return Ok(Self { pool });
        }

        let db_path = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        let db_path = db_path.split('?').next().unwrap_or(db_path);

        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create database directory {parent:?}"))?;
            }
        }

        // Ensure the database file exists by creating it if necessary
        if !Path::new(db_path).exists() {
            tokio::fs::File::create(db_path)
                .await
                .with_context(|| format!("Failed to create database file {db_path}"))?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .with_context(|| format!("Failed to connect to {database_url}"))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_documents_sql = r#"
            CREATE TABLE IF NOT EXISTS catalog_documents (
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                updated_at_ms INTEGER NOT NULL,
                written_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
        "#;

        let create_indexes_sql = r#"
            CREATE INDEX IF NOT EXISTS idx_catalog_documents_updated_at
            ON catalog_documents (updated_at_ms)
        "#;

        sqlx::query(create_documents_sql).execute(&self.pool).await?;
        sqlx::query(create_indexes_sql).execute(&self.pool).await?;

        Ok(())
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_database_connection() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("nested").join("catalog.db");
        let database_url = format!("sqlite:{}", db_path.to_string_lossy());

        let db = DatabaseConnection::new(&database_url).await?;

        assert!(!db.pool().is_closed());
        assert!(db_path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_database_migration() -> Result<()> {
        let db = DatabaseConnection::new("sqlite::memory:").await?;

        db.migrate().await?;
        // Idempotent
        db.migrate().await?;

        let result = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type='table' AND name='catalog_documents'",
        )
        .fetch_optional(db.pool())
        .await?;

        assert!(result.is_some());
        Ok(())
    }
}
