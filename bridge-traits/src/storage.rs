//! Persistent state and local file capabilities.
//!
//! [`SettingsStore`] holds the small per-target records the core persists:
//! `sync.{id}.auth` for OAuth tokens and `sync.{id}.delta_snapshot` for the
//! last delta pass. [`FileSystemAccess`] serves transfers that read from or
//! write to a local file instead of memory.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::error::Result;

/// Local file I/O for file-backed transfers.
///
/// Relative paths are resolved by the implementation, typically against an
/// app data directory.
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Creates `path` and any missing parents.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Creates or truncates `path`. The parent directory must exist.
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Removing a missing file is not an error.
    async fn remove_file(&self, path: &Path) -> Result<()>;
}

/// String key-value storage (UserDefaults, SharedPreferences, a SQLite
/// table on desktop).
///
/// ```ignore
/// store.set_string("sync.8.auth", &serde_json::to_string(&token)?).await?;
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Inserts or overwrites.
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }

    /// Every stored key, in no particular order.
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Keys starting with `prefix`, sorted.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .list_keys()
            .await?
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapSettings(Mutex<HashMap<String, String>>);

    #[async_trait]
    impl SettingsStore for MapSettings {
        async fn set_string(&self, key: &str, value: &str) -> Result<()> {
            self.0
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn get_string(&self, key: &str) -> Result<Option<String>> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.0.lock().unwrap().remove(key);
            Ok(())
        }

        async fn list_keys(&self) -> Result<Vec<String>> {
            Ok(self.0.lock().unwrap().keys().cloned().collect())
        }
    }

    #[tokio::test]
    async fn test_has_key_and_idempotent_delete() {
        let store = MapSettings::default();
        assert!(!store.has_key("sync.8.auth").await.unwrap());

        store.set_string("sync.8.auth", "{}").await.unwrap();
        assert!(store.has_key("sync.8.auth").await.unwrap());

        store.delete("sync.8.auth").await.unwrap();
        store.delete("sync.8.auth").await.unwrap();
        assert!(!store.has_key("sync.8.auth").await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_with_prefix() {
        let store = MapSettings::default();
        for key in ["sync.8.delta_snapshot", "sync.2.auth", "sync.8.auth", "ui.theme"] {
            store.set_string(key, "{}").await.unwrap();
        }

        assert_eq!(
            store.keys_with_prefix("sync.8.").await.unwrap(),
            vec!["sync.8.auth", "sync.8.delta_snapshot"]
        );
        assert!(store.keys_with_prefix("cache.").await.unwrap().is_empty());
    }
}
