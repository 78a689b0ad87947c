//! JSON-lines vector index for single-process deployments without a database.
//!
//! One line per entry, appended and synced on insert. A torn last line from a
//! crash is skipped on load; every complete line before it survives.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::index::{VectorIndex, rank};
use crate::error::StorageError;
use crate::types::{MemoryEntry, Partition};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    #[serde(flatten)]
    entry: MemoryEntry,
    embedding: Vec<f32>,
}

#[derive(Debug)]
pub struct FileIndex {
    path: PathBuf,
    cache: Mutex<Option<Vec<StoredEntry>>>,
}

impl FileIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), cache: Mutex::new(None) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> Result<Vec<StoredEntry>, StorageError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut entries = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredEntry>(line) {
                Ok(stored) => entries.push(stored),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = lineno + 1,
                    error = %e,
                    "skipping unreadable memory line"
                ),
            }
        }
        tracing::debug!(path = %self.path.display(), entries = entries.len(), "memory file loaded");
        Ok(entries)
    }

    async fn with_entries<T>(
        &self,
        f: impl FnOnce(&[StoredEntry]) -> T,
    ) -> Result<T, StorageError> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.read_file().await?);
        }
        Ok(f(cache.as_deref().unwrap_or_default()))
    }
}

fn append_line(path: &Path, line: &[u8]) -> Result<(), StorageError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let mut file = std::fs::OpenOptions::new().create(true).read(true).append(true).open(path)?;
    // never glue a new entry onto a torn line
    if file.metadata()?.len() > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            file.write_all(b"\n")?;
        }
    }
    file.write_all(line)?;
    file.sync_all()?;
    Ok(())
}

#[async_trait]
impl VectorIndex for FileIndex {
    async fn insert(
        &self,
        partition: Partition,
        text: &str,
        embedding: Vec<f32>,
    ) -> Result<MemoryEntry, StorageError> {
        let stored = StoredEntry {
            entry: MemoryEntry {
                id: Uuid::new_v4(),
                partition,
                text: text.to_string(),
                created_at: Utc::now(),
            },
            embedding,
        };
        let mut line = serde_json::to_vec(&stored)?;
        line.push(b'\n');

        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.read_file().await?);
        }
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || append_line(&path, &line))
            .await
            .map_err(|e| StorageError::Unavailable(format!("memory writer panicked: {e}")))??;

        let entry = stored.entry.clone();
        if let Some(entries) = cache.as_mut() {
            entries.push(stored);
        }
        Ok(entry)
    }

    async fn query(
        &self,
        partition: Partition,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<(MemoryEntry, f32)>, StorageError> {
        self.with_entries(|entries| {
            rank(
                entries
                    .iter()
                    .filter(|s| s.entry.partition == partition)
                    .map(|s| (&s.entry, s.embedding.as_slice())),
                embedding,
                k,
            )
        })
        .await
    }

    async fn count(&self, partition: Partition) -> Result<usize, StorageError> {
        self.with_entries(|entries| entries.iter().filter(|s| s.entry.partition == partition).count())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SemanticMemory;
    use std::sync::Arc;

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.jsonl");

        let memory = SemanticMemory::open(Arc::new(FileIndex::new(&path)));
        memory.record(Partition::ChatFacts, "Name: Asha").await.unwrap();
        memory.record(Partition::ChatFacts, "Skills: Rust, SQL").await.unwrap();
        memory
            .record(Partition::Documents, "Source: cv.txt\nSummary: Backend engineer.")
            .await
            .unwrap();
        drop(memory);

        let reopened = SemanticMemory::open(Arc::new(FileIndex::new(&path)));
        assert_eq!(reopened.count(Partition::ChatFacts).await.unwrap(), 2);
        assert_eq!(reopened.count(Partition::Documents).await.unwrap(), 1);
        let hits = reopened.recall(Partition::ChatFacts, "what skills do I have", 1).await.unwrap();
        assert_eq!(hits, vec!["Skills: Rust, SQL".to_string()]);
        let docs = reopened.recall(Partition::Documents, "backend", 2).await.unwrap();
        assert_eq!(docs, vec!["Source: cv.txt\nSummary: Backend engineer.".to_string()]);
    }

    #[tokio::test]
    async fn torn_last_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.jsonl");
        let index = FileIndex::new(&path);
        index.insert(Partition::ChatFacts, "Goal: data engineer", vec![1.0, 0.0]).await.unwrap();

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"id\": \"trunc").unwrap();
        drop(file);

        let reopened = FileIndex::new(&path);
        assert_eq!(reopened.count(Partition::ChatFacts).await.unwrap(), 1);
        reopened.insert(Partition::ChatFacts, "Skills: Go", vec![0.0, 1.0]).await.unwrap();
        assert_eq!(FileIndex::new(&path).count(Partition::ChatFacts).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = FileIndex::new(dir.path().join("nested").join("memory.jsonl"));
        assert_eq!(index.count(Partition::Documents).await.unwrap(), 0);
        index.insert(Partition::Documents, "Source: a", vec![0.5]).await.unwrap();
        assert!(index.path().exists());
    }
}
