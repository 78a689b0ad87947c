//! Fact store: the user's structured profile.
//!
//! One current value per fixed key. Writes compare against the stored value
//! and skip when identical; every read-modify-write runs under a single lock
//! so concurrent updates serialise and none are lost.

pub mod db;
pub mod file;
pub mod memory;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::types::{ProfileKey, UpdateOutcome};

/// Persistence behind the fact store.
#[async_trait]
pub trait ProfileBackend: Send + Sync {
    /// Current value for `key`, if any.
    async fn get(&self, key: ProfileKey) -> Result<Option<String>, StorageError>;

    /// Durably write `value` for `key`.
    async fn put(&self, key: ProfileKey, value: &str) -> Result<(), StorageError>;

    /// Every stored key/value pair.
    async fn all(&self) -> Result<BTreeMap<ProfileKey, String>, StorageError>;
}

pub struct FactStore {
    backend: Arc<dyn ProfileBackend>,
    write_lock: Mutex<()>,
    closed: AtomicBool,
}

impl FactStore {
    pub fn open(backend: Arc<dyn ProfileBackend>) -> Self {
        Self { backend, write_lock: Mutex::new(()), closed: AtomicBool::new(false) }
    }

    /// Set `key` to `value`, skipping the write when the stored value is equal.
    pub async fn update(&self, key: ProfileKey, value: &str) -> Result<UpdateOutcome, StorageError> {
        self.ensure_open()?;
        let value = value.trim();
        let _guard = self.write_lock.lock().await;

        if self.backend.get(key).await?.as_deref() == Some(value) {
            tracing::debug!(key = key.as_str(), "profile value unchanged");
            return Ok(UpdateOutcome::Skipped);
        }

        self.backend.put(key, value).await?;
        tracing::info!(key = key.as_str(), "profile updated");
        Ok(UpdateOutcome::Updated)
    }

    /// Apply several updates in order. Stops at the first storage error.
    pub async fn update_many(
        &self,
        pairs: &[(ProfileKey, String)],
    ) -> Result<Vec<(ProfileKey, UpdateOutcome)>, StorageError> {
        let mut out = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            out.push((*key, self.update(*key, value).await?));
        }
        Ok(out)
    }

    pub async fn get(&self, key: ProfileKey) -> Result<Option<String>, StorageError> {
        self.ensure_open()?;
        self.backend.get(key).await
    }

    /// Snapshot of the whole profile.
    pub async fn snapshot(&self) -> Result<BTreeMap<ProfileKey, String>, StorageError> {
        self.ensure_open()?;
        self.backend.all().await
    }

    /// Refuse further operations. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("fact store closed");
        }
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("fact store closed".into()));
        }
        Ok(())
    }
}

/// Render a profile snapshot for a system-context prompt.
pub fn render_snapshot(profile: &BTreeMap<ProfileKey, String>) -> String {
    if profile.is_empty() {
        return "No profile details known yet.".into();
    }
    profile
        .iter()
        .map(|(k, v)| format!("- {}: {}", k.label(), v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compose a one-line summary of a batch of update outcomes.
///
/// "Updated name to Asha; skills already known" or "No details updated."
pub fn summarize(outcomes: &[(ProfileKey, String, UpdateOutcome)]) -> String {
    if outcomes.is_empty() {
        return "No details updated.".into();
    }
    outcomes
        .iter()
        .map(|(key, value, outcome)| match outcome {
            UpdateOutcome::Updated => format!("Updated {} to {}", key.as_str(), value),
            UpdateOutcome::Skipped => format!("{} already known", key.as_str()),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::memory::InMemoryProfile;
    use super::*;

    fn store() -> FactStore {
        FactStore::open(Arc::new(InMemoryProfile::default()))
    }

    #[tokio::test]
    async fn identical_value_is_skipped() {
        let store = store();
        assert_eq!(store.update(ProfileKey::Name, "Asha").await.unwrap(), UpdateOutcome::Updated);
        assert_eq!(store.update(ProfileKey::Name, "Asha").await.unwrap(), UpdateOutcome::Skipped);
        assert_eq!(store.update(ProfileKey::Name, "Asha K").await.unwrap(), UpdateOutcome::Updated);
        assert_eq!(store.get(ProfileKey::Name).await.unwrap().as_deref(), Some("Asha K"));
    }

    #[tokio::test]
    async fn closed_store_refuses_operations() {
        let store = store();
        store.close();
        store.close();
        assert!(matches!(
            store.update(ProfileKey::Goal, "ML engineer").await,
            Err(StorageError::Unavailable(_))
        ));
        assert!(store.snapshot().await.is_err());
    }

    #[tokio::test]
    async fn update_many_preserves_order() {
        let store = store();
        store.update(ProfileKey::Skills, "Python").await.unwrap();
        let out = store
            .update_many(&[
                (ProfileKey::Name, "Asha".into()),
                (ProfileKey::Skills, "Python".into()),
            ])
            .await
            .unwrap();
        assert_eq!(
            out,
            vec![
                (ProfileKey::Name, UpdateOutcome::Updated),
                (ProfileKey::Skills, UpdateOutcome::Skipped),
            ]
        );
    }

    #[test]
    fn summary_wording() {
        assert_eq!(summarize(&[]), "No details updated.");
        let s = summarize(&[
            (ProfileKey::Name, "Asha".into(), UpdateOutcome::Updated),
            (ProfileKey::Skills, "SQL".into(), UpdateOutcome::Skipped),
        ]);
        assert_eq!(s, "Updated name to Asha; skills already known");
    }

    #[test]
    fn snapshot_rendering() {
        assert_eq!(render_snapshot(&BTreeMap::new()), "No profile details known yet.");
        let mut p = BTreeMap::new();
        p.insert(ProfileKey::Goal, "data analyst".to_string());
        p.insert(ProfileKey::Name, "Asha".to_string());
        assert_eq!(render_snapshot(&p), "- Name: Asha\n- Goal: data analyst");
    }
}
