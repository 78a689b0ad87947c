use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::index::{VectorIndex, rank};
use crate::error::StorageError;
use crate::types::{MemoryEntry, Partition};

/// Postgres vector index over the `memory_entry` table.
///
/// Embeddings are stored as `REAL[]` and ranked in process; partitions are
/// small enough that a full scan per query is fine.
#[derive(Debug, Clone)]
pub struct PgIndex {
    pool: PgPool,
}

impl PgIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorIndex for PgIndex {
    async fn insert(
        &self,
        partition: Partition,
        text: &str,
        embedding: Vec<f32>,
    ) -> Result<MemoryEntry, StorageError> {
        let row = sqlx::query_as::<_, MemoryRow>(
            "INSERT INTO memory_entry (id, partition, text, embedding, created_at) \
             VALUES ($1, $2, $3, $4, now()) \
             RETURNING id, partition, text, embedding, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(partition.as_db_str())
        .bind(text)
        .bind(&embedding)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_entry(partition).0)
    }

    async fn query(
        &self,
        partition: Partition,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<(MemoryEntry, f32)>, StorageError> {
        let rows = sqlx::query_as::<_, MemoryRow>(
            "SELECT id, partition, text, embedding, created_at \
             FROM memory_entry WHERE partition = $1 ORDER BY created_at ASC",
        )
        .bind(partition.as_db_str())
        .fetch_all(&self.pool)
        .await?;

        let loaded: Vec<(MemoryEntry, Vec<f32>)> =
            rows.into_iter().map(|r| r.into_entry(partition)).collect();
        Ok(rank(loaded.iter().map(|(e, v)| (e, v.as_slice())), embedding, k))
    }

    async fn count(&self, partition: Partition) -> Result<usize, StorageError> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM memory_entry WHERE partition = $1")
            .bind(partition.as_db_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as usize)
    }
}

#[derive(sqlx::FromRow)]
struct MemoryRow {
    id: Uuid,
    partition: String,
    text: String,
    embedding: Vec<f32>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl MemoryRow {
    fn into_entry(self, requested: Partition) -> (MemoryEntry, Vec<f32>) {
        let partition = Partition::from_db(&self.partition).unwrap_or(requested);
        (
            MemoryEntry { id: self.id, partition, text: self.text, created_at: self.created_at },
            self.embedding,
        )
    }
}
