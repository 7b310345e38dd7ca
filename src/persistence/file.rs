//! JSON file backend
//!
//! One file per key under a root directory. Writes go to a temporary file
//! first and are renamed over the old value, so a crash mid-write leaves the
//! previous value intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{KeyValueStore, PersistenceError};

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{name}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::Read {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.root).await?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "memory-tiles-{tag}-{}-{}",
            std::process::id(),
            rand::random::<u32>()
        ))
    }

    #[tokio::test]
    async fn test_roundtrip_and_missing_key() {
        let dir = scratch_dir("roundtrip");
        let store = FileStore::new(&dir);

        assert_eq!(store.get("ranking").await.unwrap(), None);
        store.put("ranking", "[1,2]").await.unwrap();
        store.put("ranking", "[3]").await.unwrap();
        assert_eq!(store.get("ranking").await.unwrap().as_deref(), Some("[3]"));
        assert!(!dir.join("ranking.json.tmp").exists());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_keys_are_sanitized() {
        let store = FileStore::new("/data");
        assert_eq!(store.path_for("a/b c"), PathBuf::from("/data/a_b_c.json"));
    }
}
