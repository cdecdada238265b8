//! services/api/src/adapters/kv_file.rs
//!
//! File-backed implementation of the `KeyValueStore` port: one file per key
//! under the data directory, replaced atomically on every write.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use ully_core::ports::{KeyValueStore, PortError, PortResult};

#[derive(Clone, Debug)]
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PortResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(PortError::InvalidInput(format!("unsupported storage key '{}'", key)));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get_item(&self, key: &str) -> PortResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PortError::Unexpected(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> PortResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to create data dir: {}", e)))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to replace {}: {}", path.display(), e)))?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> PortResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn set_get_remove() {
        let dir = tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path().join("nested"));

        assert_eq!(store.get_item("ully_chat_history").await.unwrap(), None);
        store.set_item("ully_chat_history", "[]").await.unwrap();
        store.set_item("ully_chat_history", "[1]").await.unwrap();
        assert_eq!(
            store.get_item("ully_chat_history").await.unwrap().as_deref(),
            Some("[1]")
        );

        store.remove_item("ully_chat_history").await.unwrap();
        store.remove_item("ully_chat_history").await.unwrap();
        assert_eq!(store.get_item("ully_chat_history").await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejects_path_like_keys() {
        let dir = tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path());
        assert!(matches!(
            store.set_item("../escape", "x").await,
            Err(PortError::InvalidInput(_))
        ));
        assert!(store.get_item("").await.is_err());
    }
}
