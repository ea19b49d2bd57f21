//! Object store abstraction
//!
//! The backup engine consumes binary objects (workflow diagrams, hierarchy
//! renders, exported business-plan documents) through a narrow client
//! contract: download, upload-with-overwrite, and prefix listing. The
//! trait keeps the engine independent of any hosted storage provider;
//! [`FsObjectStore`] is the filesystem implementation used by the CLI and
//! tests.

pub mod fs;

use crate::error::Result;
use async_trait::async_trait;

pub use fs::FsObjectStore;

/// A downloaded object: raw bytes plus the content type when known
#[derive(Debug, Clone)]
pub struct ObjectBlob {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl ObjectBlob {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            bytes,
            content_type,
        }
    }

    /// Content type, defaulting to the generic binary type
    pub fn content_type_or_default(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or("application/octet-stream")
    }
}

/// Client contract for a bucketed object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download an object's bytes
    async fn download(&self, bucket: &str, path: &str) -> Result<ObjectBlob>;

    /// Upload bytes, overwriting any existing object at the path
    async fn upload(&self, bucket: &str, path: &str, blob: &ObjectBlob) -> Result<()>;

    /// List object paths under a prefix (recursive). A missing bucket or
    /// prefix yields an empty list, matching hosted-store behavior.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;
}

/// Infer a content type from a path's extension
pub fn content_type_for_path(path: &str) -> Option<String> {
    let ext = path.rsplit('.').next()?;
    let ct = match ext.to_ascii_lowercase().as_str() {
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "html" => "text/html",
        _ => return None,
    };
    Some(ct.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify trait is object-safe
    fn _assert_object_safe(_: &dyn ObjectStore) {}

    #[test]
    fn test_content_type_inference() {
        assert_eq!(
            content_type_for_path("2026-01-01/backup-x/data.json").as_deref(),
            Some("application/json")
        );
        assert_eq!(
            content_type_for_path("growth_workflows/wf-1_diagram.png").as_deref(),
            Some("image/png")
        );
        assert_eq!(content_type_for_path("no-extension"), None);
    }
}
