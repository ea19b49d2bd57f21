//! Filesystem object store
//!
//! Buckets are directories under a root; object paths map to file paths.
//! Content types are not persisted; they are re-inferred from the file
//! extension on download.

use super::{content_type_for_path, ObjectBlob, ObjectStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Object store backed by a local directory tree
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `{bucket}/{path}` under the root, rejecting traversal
    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        let relative = Path::new(bucket).join(path);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(Error::ObjectStore(format!(
                        "invalid object path: {}/{}",
                        bucket, path
                    )))
                }
            }
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn download(&self, bucket: &str, path: &str) -> Result<ObjectBlob> {
        let file_path = self.resolve(bucket, path)?;
        let bytes = tokio::fs::read(&file_path).await.map_err(|e| {
            Error::ObjectStore(format!("download {}/{} failed: {}", bucket, path, e))
        })?;
        Ok(ObjectBlob::new(bytes, content_type_for_path(path)))
    }

    async fn upload(&self, bucket: &str, path: &str, blob: &ObjectBlob) -> Result<()> {
        let file_path = self.resolve(bucket, path)?;
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::ObjectStore(format!("upload {}/{} failed: {}", bucket, path, e))
            })?;
        }
        tokio::fs::write(&file_path, &blob.bytes)
            .await
            .map_err(|e| Error::ObjectStore(format!("upload {}/{} failed: {}", bucket, path, e)))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let base = self.root.join(bucket);
        let start = if prefix.is_empty() {
            base.clone()
        } else {
            self.resolve(bucket, prefix)?
        };
        if !start.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
                Error::ObjectStore(format!("list {}/{} failed: {}", bucket, prefix, e))
            })?;
            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                Error::ObjectStore(format!("list {}/{} failed: {}", bucket, prefix, e))
            })? {
                let entry_path = entry.path();
                if entry_path.is_dir() {
                    pending.push(entry_path);
                } else if let Ok(relative) = entry_path.strip_prefix(&base) {
                    paths.push(relative.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_download_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());

        let blob = ObjectBlob::new(b"diagram bytes".to_vec(), Some("image/png".to_string()));
        store
            .upload("workflow-diagrams", "growth_workflows/wf-1_v2.png", &blob)
            .await
            .unwrap();

        let downloaded = store
            .download("workflow-diagrams", "growth_workflows/wf-1_v2.png")
            .await
            .unwrap();
        assert_eq!(downloaded.bytes, b"diagram bytes");
        assert_eq!(downloaded.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_upload_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());

        let first = ObjectBlob::new(b"v1".to_vec(), None);
        let second = ObjectBlob::new(b"v2".to_vec(), None);
        store.upload("b", "doc.txt", &first).await.unwrap();
        store.upload("b", "doc.txt", &second).await.unwrap();

        let downloaded = store.download("b", "doc.txt").await.unwrap();
        assert_eq!(downloaded.bytes, b"v2");
    }

    #[tokio::test]
    async fn test_download_missing_object_fails() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());

        let result = store.download("b", "missing.png").await;
        assert!(matches!(result, Err(Error::ObjectStore(_))));
    }

    #[tokio::test]
    async fn test_list_recursive_with_prefix() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());
        let blob = ObjectBlob::new(vec![1], None);

        store
            .upload("docs", "business-plan/team-1/plan.pdf", &blob)
            .await
            .unwrap();
        store
            .upload("docs", "business-plan/team-1/archive/old.pdf", &blob)
            .await
            .unwrap();
        store
            .upload("docs", "business-plan/team-2/plan.pdf", &blob)
            .await
            .unwrap();

        let team1 = store.list("docs", "business-plan/team-1").await.unwrap();
        assert_eq!(
            team1,
            vec![
                "business-plan/team-1/archive/old.pdf".to_string(),
                "business-plan/team-1/plan.pdf".to_string(),
            ]
        );

        let all = store.list("docs", "").await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_list_missing_prefix_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());
        assert!(store.list("docs", "nothing-here").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());

        let result = store.download("b", "../outside.txt").await;
        assert!(matches!(result, Err(Error::ObjectStore(_))));
    }
}
