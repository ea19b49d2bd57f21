//! Binary object replay
//!
//! Copies every manifest entry's backed-up bytes from the backup bucket
//! back to its live bucket and path. Replay is best-effort per object: a
//! missing or unreadable entry is counted and logged, never fatal, since
//! the relational restore has already succeeded by the time replay runs.

use super::snapshot::ManifestEntry;
use crate::objects::ObjectStore;
use tracing::{debug, warn};

/// Per-object outcome counts for a replay pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ObjectReplayOutcome {
    pub restored: u64,
    pub failed: u64,
}

impl ObjectReplayOutcome {
    pub fn attempted(&self) -> u64 {
        self.restored + self.failed
    }
}

/// Copy each manifest entry from the backup bucket to its live location
pub async fn replay_objects(
    objects: &dyn ObjectStore,
    backup_bucket: &str,
    manifest: &[ManifestEntry],
) -> ObjectReplayOutcome {
    let mut outcome = ObjectReplayOutcome::default();

    for entry in manifest {
        let blob = match objects.download(backup_bucket, &entry.snapshot_path).await {
            Ok(blob) => blob,
            Err(e) => {
                warn!(
                    path = %entry.snapshot_path,
                    error = %e,
                    "Failed to read backed-up object"
                );
                outcome.failed += 1;
                continue;
            }
        };

        match objects.upload(&entry.bucket, &entry.path, &blob).await {
            Ok(()) => {
                debug!(bucket = %entry.bucket, path = %entry.path, "Object restored");
                outcome.restored += 1;
            }
            Err(e) => {
                warn!(
                    bucket = %entry.bucket,
                    path = %entry.path,
                    error = %e,
                    "Failed to restore object"
                );
                outcome.failed += 1;
            }
        }
    }

    outcome
}
