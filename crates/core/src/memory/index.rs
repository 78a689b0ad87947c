use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::embedding;
use crate::error::StorageError;
use crate::types::{MemoryEntry, Partition};

/// Similarity-searchable, append-only storage for semantic memory.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn insert(
        &self,
        partition: Partition,
        text: &str,
        embedding: Vec<f32>,
    ) -> Result<MemoryEntry, StorageError>;

    /// Up to `k` entries ordered by descending similarity; ties go to the older entry.
    async fn query(
        &self,
        partition: Partition,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<(MemoryEntry, f32)>, StorageError>;

    async fn count(&self, partition: Partition) -> Result<usize, StorageError>;
}

/// Rank `(entry, embedding)` candidates against `query`.
pub(crate) fn rank<'a, I>(candidates: I, query: &[f32], k: usize) -> Vec<(MemoryEntry, f32)>
where
    I: IntoIterator<Item = (&'a MemoryEntry, &'a [f32])>,
{
    let mut scored: Vec<(MemoryEntry, f32)> = candidates
        .into_iter()
        .map(|(e, v)| (e.clone(), embedding::cosine(query, v)))
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.created_at.cmp(&b.0.created_at))
    });
    scored.truncate(k);
    scored
}

#[derive(Debug, Default)]
pub struct InMemoryIndex {
    entries: RwLock<Vec<(MemoryEntry, Vec<f32>)>>,
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn insert(
        &self,
        partition: Partition,
        text: &str,
        embedding: Vec<f32>,
    ) -> Result<MemoryEntry, StorageError> {
        let entry = MemoryEntry {
            id: Uuid::new_v4(),
            partition,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        self.entries.write().await.push((entry.clone(), embedding));
        Ok(entry)
    }

    async fn query(
        &self,
        partition: Partition,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<(MemoryEntry, f32)>, StorageError> {
        let entries = self.entries.read().await;
        // insertion order doubles as age order; stable sort keeps older first on ties
        Ok(rank(
            entries
                .iter()
                .filter(|(e, _)| e.partition == partition)
                .map(|(e, v)| (e, v.as_slice())),
            embedding,
            k,
        ))
    }

    async fn count(&self, partition: Partition) -> Result<usize, StorageError> {
        Ok(self.entries.read().await.iter().filter(|(e, _)| e.partition == partition).count())
    }
}
