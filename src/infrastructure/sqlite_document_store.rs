//! SQLite-backed document store
//!
//! Records are stored as JSON payloads keyed by identifier. One chunk is
//! committed inside one transaction, which gives the all-or-nothing batch
//! guarantee the synchronizer relies on.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::domain::errors::TransportError;
use crate::domain::product::ProductRecord;
use crate::domain::repositories::DocumentStore;
use crate::domain::sync::{BatchOperation, SyncChunk};

#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: Arc<SqlitePool>,
    max_batch_operations: usize,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool, max_batch_operations: usize) -> Self {
        Self {
            pool: Arc::new(pool),
            max_batch_operations: max_batch_operations.max(1),
        }
    }

    pub async fn count(&self) -> Result<usize, TransportError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM catalog_documents")
            .fetch_one(&*self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub async fn get(&self, id: &str) -> Result<Option<ProductRecord>, TransportError> {
        let row = sqlx::query("SELECT payload FROM catalog_documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await?;

        row.map(|row| decode_payload(&row.get::<String, _>("payload")))
            .transpose()
    }
}

fn decode_payload(payload: &str) -> Result<ProductRecord, TransportError> {
    serde_json::from_str(payload)
        .map_err(|e| TransportError::MalformedResponse(format!("stored record is not valid: {e}")))
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn list_ids(&self) -> Result<Vec<String>, TransportError> {
        let ids = sqlx::query_scalar::<_, String>("SELECT id FROM catalog_documents ORDER BY id")
            .fetch_all(&*self.pool)
            .await?;
        debug!("Read {} document id(s)", ids.len());
        Ok(ids)
    }

    async fn list_records(&self) -> Result<Vec<ProductRecord>, TransportError> {
        let rows = sqlx::query(
            "SELECT payload FROM catalog_documents ORDER BY updated_at_ms DESC, id ASC",
        )
        .fetch_all(&*self.pool)
        .await?;

        rows.iter()
            .map(|row| decode_payload(&row.get::<String, _>("payload")))
            .collect()
    }

    async fn commit(&self, chunk: &SyncChunk) -> Result<(), TransportError> {
        if chunk.len() > self.max_batch_operations {
            return Err(TransportError::BatchTooLarge {
                size: chunk.len(),
                limit: self.max_batch_operations,
            });
        }

        // Dropping the transaction on an early return rolls it back.
        let mut tx = self.pool.begin().await?;
        for operation in &chunk.operations {
            match operation {
                BatchOperation::Delete(id) => {
                    sqlx::query("DELETE FROM catalog_documents WHERE id = ?")
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
                BatchOperation::Upsert(record) => {
                    let payload = serde_json::to_string(record).map_err(|e| {
                        TransportError::Storage(format!("cannot encode record {}: {e}", record.id))
                    })?;
                    sqlx::query(
                        r#"
                        INSERT INTO catalog_documents (id, payload, updated_at_ms)
                        VALUES (?, ?, ?)
                        ON CONFLICT(id) DO UPDATE SET
                            payload = excluded.payload,
                            updated_at_ms = excluded.updated_at_ms,
                            written_at = CURRENT_TIMESTAMP
                        "#,
                    )
                    .bind(&record.id)
                    .bind(payload)
                    .bind(record.updated_at.timestamp_millis())
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }
        tx.commit().await?;

        trace!(
            "Committed {} chunk {} ({} operations)",
            chunk.phase,
            chunk.index,
            chunk.len()
        );
        Ok(())
    }

    fn max_batch_operations(&self) -> usize {
        self.max_batch_operations
    }
}
