//! Snapshot model
//!
//! A snapshot is an immutable, versioned artifact: a scope marker, the
//! captured entity tables as loosely-typed rows, and a manifest of binary
//! objects copied into the backup bucket at export time. It is serialized
//! as a single `data.json` document under `{date}/{backup-id}/` and is
//! write-once: the export path creates it, the restore path only reads it.

use crate::error::{Error, Result};
use crate::objects::{ObjectBlob, ObjectStore};
use crate::storage::store::row_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};

pub use crate::storage::store::Row;

/// Scope marker for a snapshot covering the entire dataset
pub const UNIVERSAL_SCOPE: &str = "all";

/// One binary object captured at snapshot time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Live bucket the object belongs to
    pub bucket: String,
    /// Live path within the bucket
    pub path: String,
    /// Where the backed-up bytes live inside the backup bucket
    pub snapshot_path: String,
}

/// An immutable export of relational rows plus an object manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub exported_at: DateTime<Utc>,
    /// `"all"` or a tenant team id
    pub scope: String,
    /// sha256 over the canonical JSON of `tables`, verified on load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<Row>>,
    #[serde(default)]
    pub object_manifest: Vec<ManifestEntry>,
}

impl Snapshot {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            exported_at: Utc::now(),
            scope: scope.into(),
            checksum: None,
            tables: BTreeMap::new(),
            object_manifest: Vec::new(),
        }
    }

    /// Rows for a table; missing tables read as empty
    pub fn table_rows(&self, name: &str) -> &[Row] {
        self.tables.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Primary ids present for a table
    pub fn table_ids(&self, name: &str) -> HashSet<String> {
        self.table_rows(name)
            .iter()
            .filter_map(|r| row_id(r).map(str::to_string))
            .collect()
    }

    /// Total row count across all tables
    pub fn row_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    /// Digest over the canonical JSON of the entity tables. Both the outer
    /// map and each row are ordered maps, so serialization is stable.
    pub fn compute_checksum(&self) -> Result<String> {
        let canonical = serde_json::to_vec(&self.tables)?;
        let digest = Sha256::digest(&canonical);
        Ok(hex::encode(digest))
    }

    /// Stamp the checksum; called once by the export path
    pub fn with_checksum(mut self) -> Result<Self> {
        self.checksum = Some(self.compute_checksum()?);
        Ok(self)
    }

    /// Verify the stamped checksum, if any. Snapshots written before the
    /// checksum field existed carry none and pass verification.
    pub fn verify_checksum(&self) -> Result<()> {
        let Some(expected) = &self.checksum else {
            return Ok(());
        };
        let actual = self.compute_checksum()?;
        if &actual == expected {
            Ok(())
        } else {
            Err(Error::SnapshotCorrupted(
                self.scope.clone(),
                format!("table checksum mismatch (expected {}, got {})", expected, actual),
            ))
        }
    }
}

/// Normalize an operator-supplied locator to the `data.json` path
pub fn data_path_for_locator(locator: &str) -> String {
    let trimmed = locator.trim().trim_end_matches('/');
    if trimmed.ends_with("data.json") {
        trimmed.to_string()
    } else {
        format!("{}/data.json", trimmed)
    }
}

/// Load and verify a snapshot from the backup bucket
pub async fn load_snapshot(
    objects: &dyn ObjectStore,
    backup_bucket: &str,
    locator: &str,
) -> Result<Snapshot> {
    let data_path = data_path_for_locator(locator);
    let blob = objects
        .download(backup_bucket, &data_path)
        .await
        .map_err(|_| Error::SnapshotNotFound(locator.to_string()))?;

    let snapshot: Snapshot = serde_json::from_slice(&blob.bytes)
        .map_err(|e| Error::SnapshotCorrupted(locator.to_string(), e.to_string()))?;

    snapshot
        .verify_checksum()
        .map_err(|e| match e {
            Error::SnapshotCorrupted(_, msg) => Error::SnapshotCorrupted(locator.to_string(), msg),
            other => other,
        })?;

    Ok(snapshot)
}

/// Serialize a snapshot to `{prefix}/data.json` in the backup bucket.
/// Returns the written data path.
pub async fn save_snapshot(
    objects: &dyn ObjectStore,
    backup_bucket: &str,
    prefix: &str,
    snapshot: &Snapshot,
) -> Result<String> {
    let data_path = format!("{}/data.json", prefix.trim_end_matches('/'));
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    let blob = ObjectBlob::new(bytes, Some("application/json".to_string()));
    objects.upload(backup_bucket, &data_path, &blob).await?;
    Ok(data_path)
}
