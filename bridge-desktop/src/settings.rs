//! [`SettingsStore`] in a single SQLite table.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SettingsStore,
};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)";

const UPSERT: &str = "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

fn db_error(action: &'static str) -> impl FnOnce(sqlx::Error) -> BridgeError {
    move |e| BridgeError::OperationFailed(format!("settings {}: {}", action, e))
}

/// Holds `sync.{id}.auth` and `sync.{id}.delta_snapshot` records, one row
/// per key.
#[derive(Debug, Clone)]
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    /// Opens or creates the database file, creating parent directories.
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(db_error("open"))?;
        debug!(path = %db_path.display(), "Opened settings database");
        Self::migrate(pool).await
    }

    /// Private in-memory database. A single connection keeps it alive.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(db_error("open"))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(db_error("open"))?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(db_error("migrate"))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(UPSERT)
            .bind(key)
            .bind(value)
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(db_error("write"))?;
        debug!(key, "Setting stored");
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("read"))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let removed = sqlx::query("DELETE FROM settings WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete"))?
            .rows_affected();
        debug!(key, removed, "Setting deleted");
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("read"))?;
        Ok(found > 0)
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT key FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list"))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT key FROM settings WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key")
            .bind(prefix)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_read_delete() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        store.set_string("sync.8.auth", r#"{"a":1}"#).await.unwrap();
        store.set_string("sync.8.auth", r#"{"a":2}"#).await.unwrap();
        assert_eq!(
            store.get_string("sync.8.auth").await.unwrap().as_deref(),
            Some(r#"{"a":2}"#)
        );
        assert!(store.has_key("sync.8.auth").await.unwrap());

        store.delete("sync.8.auth").await.unwrap();
        store.delete("sync.8.auth").await.unwrap();
        assert_eq!(store.get_string("sync.8.auth").await.unwrap(), None);
        assert!(!store.has_key("sync.8.auth").await.unwrap());
    }

    #[tokio::test]
    async fn test_key_listing() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        for key in ["sync.8.delta_snapshot", "sync.2.auth", "sync.8.auth"] {
            store.set_string(key, "{}").await.unwrap();
        }

        assert_eq!(
            store.list_keys().await.unwrap(),
            vec!["sync.2.auth", "sync.8.auth", "sync.8.delta_snapshot"]
        );
        assert_eq!(
            store.keys_with_prefix("sync.8.").await.unwrap(),
            vec!["sync.8.auth", "sync.8.delta_snapshot"]
        );
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.db");

        {
            let store = SqliteSettingsStore::new(&path).await.unwrap();
            store.set_string("sync.2.delta_snapshot", "{}").await.unwrap();
        }

        let store = SqliteSettingsStore::new(&path).await.unwrap();
        assert!(store.has_key("sync.2.delta_snapshot").await.unwrap());
    }
}
