//! Semantic memory: append-only, similarity-recalled text in two partitions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use super::embedding;
use super::index::VectorIndex;
use crate::error::StorageError;
use crate::types::Partition;

pub struct SemanticMemory {
    index: Arc<dyn VectorIndex>,
    closed: AtomicBool,
}

impl SemanticMemory {
    pub fn open(index: Arc<dyn VectorIndex>) -> Self {
        Self { index, closed: AtomicBool::new(false) }
    }

    /// Store `text` in `partition`. Never deduplicates.
    pub async fn record(&self, partition: Partition, text: &str) -> Result<Uuid, StorageError> {
        self.ensure_open()?;
        let entry = self
            .index
            .insert(partition, text, embedding::generate(text))
            .await?;
        tracing::debug!(
            partition = partition.as_db_str(),
            id = %entry.id,
            text = %crate::preview(text, 60),
            "memory recorded"
        );
        Ok(entry.id)
    }

    /// Up to `k` texts from `partition`, most similar first. Empty partition yields an empty vec.
    pub async fn recall(
        &self,
        partition: Partition,
        query: &str,
        k: usize,
    ) -> Result<Vec<String>, StorageError> {
        self.ensure_open()?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let hits = self
            .index
            .query(partition, &embedding::generate(query), k)
            .await?;
        Ok(hits.into_iter().map(|(entry, _)| entry.text).collect())
    }

    pub async fn count(&self, partition: Partition) -> Result<usize, StorageError> {
        self.ensure_open()?;
        self.index.count(partition).await
    }

    /// Recall context block for prompts: chat facts, then document summaries.
    ///
    /// A failing partition contributes nothing; the error is logged.
    pub async fn combined_context(&self, query: &str, chat_k: usize, doc_k: usize) -> String {
        let mut context = String::new();

        match self.recall(Partition::ChatFacts, query, chat_k).await {
            Ok(facts) if !facts.is_empty() => {
                context.push_str("FROM CHAT HISTORY:\n");
                context.push_str(&bullets(&facts));
                context.push_str("\n\n");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "chat-fact recall failed, continuing without it"),
        }

        match self.recall(Partition::Documents, query, doc_k).await {
            Ok(docs) if !docs.is_empty() => {
                context.push_str("FROM DOCUMENTS:\n");
                context.push_str(&bullets(&docs));
                context.push('\n');
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "document recall failed, continuing without it"),
        }

        context
    }

    /// Refuse further operations. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("semantic memory closed".into()));
        }
        Ok(())
    }
}

fn bullets(items: &[String]) -> String {
    items.iter().map(|d| format!("- {d}")).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::index::InMemoryIndex;

    fn memory() -> SemanticMemory {
        SemanticMemory::open(Arc::new(InMemoryIndex::default()))
    }

    #[tokio::test]
    async fn recall_on_empty_partition_is_empty() {
        let mem = memory();
        assert!(mem.recall(Partition::ChatFacts, "anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn record_never_deduplicates() {
        let mem = memory();
        let a = mem.record(Partition::ChatFacts, "Name: Asha").await.unwrap();
        let b = mem.record(Partition::ChatFacts, "Name: Asha").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(mem.count(Partition::ChatFacts).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn recall_ranks_by_similarity() {
        let mem = memory();
        mem.record(Partition::ChatFacts, "Name: Asha").await.unwrap();
        mem.record(Partition::ChatFacts, "Skills: python and sql").await.unwrap();
        let hits = mem.recall(Partition::ChatFacts, "python internships", 1).await.unwrap();
        assert_eq!(hits, vec!["Skills: python and sql".to_string()]);
    }

    #[tokio::test]
    async fn combined_context_layout() {
        let mem = memory();
        assert_eq!(mem.combined_context("x", 3, 2).await, "");

        mem.record(Partition::ChatFacts, "Goal: data engineer").await.unwrap();
        mem.record(Partition::Documents, "Source: cv.txt\nSummary: SQL").await.unwrap();
        let ctx = mem.combined_context("data", 3, 2).await;
        assert!(ctx.starts_with("FROM CHAT HISTORY:\n- Goal: data engineer\n\n"));
        assert!(ctx.contains("FROM DOCUMENTS:\n- Source: cv.txt"));
    }

    #[tokio::test]
    async fn closed_memory_degrades_context_to_empty() {
        let mem = memory();
        mem.record(Partition::ChatFacts, "Goal: data engineer").await.unwrap();
        mem.close();
        assert!(mem.record(Partition::ChatFacts, "x").await.is_err());
        assert_eq!(mem.combined_context("data", 3, 2).await, "");
    }
}
