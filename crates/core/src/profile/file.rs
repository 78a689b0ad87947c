//! JSON-file profile backend.
//!
//! The whole profile lives in one object keyed by profile key. Writes go to a
//! temp file in the same directory and are renamed over the target, so a
//! crash never leaves a half-written profile behind.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::ProfileBackend;
use crate::error::StorageError;
use crate::types::ProfileKey;

#[derive(Debug)]
pub struct FileProfile {
    path: PathBuf,
    cache: Mutex<Option<BTreeMap<ProfileKey, String>>>,
}

impl FileProfile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), cache: Mutex::new(None) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> Result<BTreeMap<ProfileKey, String>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn loaded(
        &self,
        cache: &mut Option<BTreeMap<ProfileKey, String>>,
    ) -> Result<BTreeMap<ProfileKey, String>, StorageError> {
        if let Some(values) = cache.as_ref() {
            return Ok(values.clone());
        }
        let values = self.read_file().await?;
        *cache = Some(values.clone());
        Ok(values)
    }
}

fn write_atomic(path: &Path, body: &[u8]) -> Result<(), StorageError> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(body)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl ProfileBackend for FileProfile {
    async fn get(&self, key: ProfileKey) -> Result<Option<String>, StorageError> {
        let mut cache = self.cache.lock().await;
        Ok(self.loaded(&mut cache).await?.get(&key).cloned())
    }

    async fn put(&self, key: ProfileKey, value: &str) -> Result<(), StorageError> {
        let mut cache = self.cache.lock().await;
        let mut values = self.loaded(&mut cache).await?;
        values.insert(key, value.to_string());

        let body = serde_json::to_vec_pretty(&values)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &body))
            .await
            .map_err(|e| StorageError::Unavailable(format!("profile writer panicked: {e}")))??;

        *cache = Some(values);
        Ok(())
    }

    async fn all(&self) -> Result<BTreeMap<ProfileKey, String>, StorageError> {
        let mut cache = self.cache.lock().await;
        self.loaded(&mut cache).await
    }
}
