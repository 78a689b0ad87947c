use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::ProfileBackend;
use crate::error::StorageError;
use crate::types::ProfileKey;

/// Volatile profile backend. Used in tests and when nothing durable is configured.
#[derive(Debug, Default)]
pub struct InMemoryProfile {
    values: RwLock<BTreeMap<ProfileKey, String>>,
}

#[async_trait]
impl ProfileBackend for InMemoryProfile {
    async fn get(&self, key: ProfileKey) -> Result<Option<String>, StorageError> {
        Ok(self.values.read().await.get(&key).cloned())
    }

    async fn put(&self, key: ProfileKey, value: &str) -> Result<(), StorageError> {
        self.values.write().await.insert(key, value.to_string());
        Ok(())
    }

    async fn all(&self) -> Result<BTreeMap<ProfileKey, String>, StorageError> {
        Ok(self.values.read().await.clone())
    }
}
