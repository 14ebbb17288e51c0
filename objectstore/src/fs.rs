use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::instrument;
use uuid::Uuid;

use crate::ObjectStoreError;

/// Filesystem-backed `ObjectStore`. Keys map directly onto paths under
/// `root`; writes go to a sibling temp file and are atomically renamed into
/// place so readers never observe a partially written object.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        if key.is_empty() || key.contains("..") {
            return Err(ObjectStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key.trim_start_matches('/')))
    }
}

#[async_trait::async_trait]
impl crate::ObjectStore for FsObjectStore {
    #[instrument(skip(self, bytes), fields(key, bytes = bytes.len()))]
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError> {
        let path = self.resolve(key)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).await?;

        let tmp_name = format!(".{}.{}.tmp", path.file_name().and_then(|n| n.to_str()).unwrap_or("obj"), Uuid::new_v4());
        let tmp_path = dir.join(tmp_name);

        fs::write(&tmp_path, &bytes).await?;
        fs::rename(&tmp_path, &path).await?;

        tracing::debug!(path = %path.display(), "object written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ObjectStoreError> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        if prefix.contains("..") {
            return Err(ObjectStoreError::InvalidKey(prefix.to_string()));
        }

        let mut out = Vec::new();
        let mut stack = vec![self.root.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    stack.push(path);
                    continue;
                }
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if name.starts_with('.') {
                    continue; // in-flight temp files
                }
                if let Ok(rel) = path.strip_prefix(&self.root) {
                    let rel = rel.to_string_lossy().replace('\\', "/");
                    if rel.starts_with(prefix) {
                        out.push(rel);
                    }
                }
            }
        }

        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObjectStore;

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        store.put("raw/a.jsonl", b"hello".to_vec()).await.unwrap();
        let got = store.get("raw/a.jsonl").await.unwrap();
        assert_eq!(got, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn get_missing_key_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_overwrite_is_atomic_and_visible() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        store.put("k", b"v1".to_vec()).await.unwrap();
        store.put("k", b"v2".to_vec()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        store.put("raw/a_1.jsonl", b"1".to_vec()).await.unwrap();
        store.put("raw/a_2.jsonl", b"2".to_vec()).await.unwrap();
        store.put("raw/b_1.jsonl", b"3".to_vec()).await.unwrap();

        let listed = store.list("raw/a_").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|k| k.contains("raw/a_")));
    }

    #[tokio::test]
    async fn rejects_path_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        let err = store.put("../escape", b"x".to_vec()).await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::InvalidKey(_)));
    }
}
