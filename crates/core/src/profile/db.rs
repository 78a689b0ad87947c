use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::BTreeMap;

use super::ProfileBackend;
use crate::error::StorageError;
use crate::types::ProfileKey;

/// Postgres profile backend over the `profile_kv` table.
#[derive(Debug, Clone)]
pub struct PgProfile {
    pool: PgPool,
}

impl PgProfile {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileBackend for PgProfile {
    async fn get(&self, key: ProfileKey) -> Result<Option<String>, StorageError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM profile_kv WHERE key = $1")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(v,)| v))
    }

    async fn put(&self, key: ProfileKey, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO profile_kv (key, value, updated_at) VALUES ($1, $2, now())
             ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = now()",
        )
        .bind(key.as_str())
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn all(&self) -> Result<BTreeMap<ProfileKey, String>, StorageError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM profile_kv ORDER BY key")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(k, v)| match ProfileKey::parse(&k) {
                Some(key) => Some((key, v)),
                None => {
                    tracing::warn!(key = %k, "ignoring unknown profile key");
                    None
                }
            })
            .collect())
    }
}
