//! Snapshot export
//!
//! Captures the covered entity tables and the associated binary objects
//! into a new write-once snapshot under `{date}/{backup-id}/` in the
//! backup bucket. Object copying is best-effort per object; the manifest
//! records only the objects that were actually copied, so a later restore
//! never chases bytes that are not there.

use super::scope::{RestoreScope, ScopeFilter};
use super::snapshot::{save_snapshot, ManifestEntry, Snapshot};
use super::tables::{ScopeRule, PROFILE_TABLE, RESTORE_ORDER};
use super::{audit, audit::AuditKind};
use crate::config::BackupConfig;
use crate::error::{Error, Result};
use crate::objects::ObjectStore;
use crate::storage::{Database, IdFilter, TableStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Counts and context describing a completed export
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOutcome {
    pub scope: String,
    /// Locator of the created backup, e.g. `2026-01-01/backup-...`
    pub backup_path: String,
    pub rows_exported: u64,
    pub objects_copied: u64,
    pub objects_skipped: u64,
}

impl ExportOutcome {
    pub fn summary(&self) -> String {
        format!(
            "scope={} rows={} objects={}/{}",
            self.scope,
            self.rows_exported,
            self.objects_copied,
            self.objects_copied + self.objects_skipped
        )
    }
}

/// Export a new snapshot for an already-authorized operator.
pub async fn create_snapshot(
    db: &Database,
    objects: &dyn ObjectStore,
    config: &BackupConfig,
    scope: &RestoreScope,
    operator_id: &str,
) -> Result<ExportOutcome> {
    let started = Instant::now();
    let now = Utc::now();
    let date = now.format("%Y-%m-%d").to_string();
    let backup_id = format!(
        "backup-{}-{}",
        now.format("%Y-%m-%d-%H%M%S"),
        Uuid::new_v4()
    );
    let prefix = format!("{}/{}", date, backup_id);
    info!(scope = scope.as_str(), backup_path = %prefix, "Starting export");

    let store = TableStore::new(db.pool());
    let mut snapshot = Snapshot::new(scope.as_str());
    capture_tables(&store, scope, &mut snapshot).await?;

    let filter = match scope {
        RestoreScope::All => None,
        RestoreScope::Team(team) => Some(ScopeFilter::derive(&snapshot, team)),
    };

    let mut copied = 0u64;
    let mut skipped = 0u64;
    for (bucket, path) in
        collect_object_paths(objects, config, scope, filter.as_ref()).await?
    {
        let snapshot_path = format!("{}/storage/{}/{}", prefix, bucket, path);
        let blob = match objects.download(&bucket, &path).await {
            Ok(blob) => blob,
            Err(e) => {
                warn!(bucket = %bucket, path = %path, error = %e, "Skipping unreadable object");
                skipped += 1;
                continue;
            }
        };
        match objects.upload(&config.backup_bucket, &snapshot_path, &blob).await {
            Ok(()) => {
                snapshot.object_manifest.push(ManifestEntry {
                    bucket: bucket.clone(),
                    path,
                    snapshot_path,
                });
                copied += 1;
            }
            Err(e) => {
                warn!(bucket = %bucket, path = %path, error = %e, "Failed to copy object");
                skipped += 1;
            }
        }
    }

    let rows_exported = snapshot.row_count() as u64;
    let snapshot = snapshot.with_checksum()?;
    save_snapshot(objects, &config.backup_bucket, &prefix, &snapshot)
        .await
        .map_err(|e| Error::ExportFailed(e.to_string()))?;

    let outcome = ExportOutcome {
        scope: scope.as_str().to_string(),
        backup_path: prefix,
        rows_exported,
        objects_copied: copied,
        objects_skipped: skipped,
    };

    audit::record(
        db.pool(),
        AuditKind::Backup,
        &outcome.scope,
        &outcome.backup_path,
        operator_id,
        Some(&outcome.summary()),
    )
    .await;

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        summary = %outcome.summary(),
        "Export complete"
    );
    Ok(outcome)
}

/// Fetch the covered tables into the snapshot, restricted to `scope`
async fn capture_tables(
    store: &TableStore,
    scope: &RestoreScope,
    snapshot: &mut Snapshot,
) -> Result<()> {
    match scope {
        RestoreScope::All => {
            for table in RESTORE_ORDER {
                let rows = store.fetch_rows(table.name, None).await?;
                snapshot.tables.insert(table.name.to_string(), rows);
            }
        }
        RestoreScope::Team(team) => {
            let team_values = [team.clone()];
            let profiles = store
                .fetch_rows(
                    PROFILE_TABLE,
                    Some(IdFilter {
                        column: "team_id",
                        values: &team_values,
                    }),
                )
                .await?;
            snapshot.tables.insert(PROFILE_TABLE.to_string(), profiles);

            let members = store
                .column_values(
                    PROFILE_TABLE,
                    "user_id",
                    IdFilter {
                        column: "team_id",
                        values: &team_values,
                    },
                )
                .await?;
            let member_values = if members.is_empty() {
                vec![team.clone()]
            } else {
                members
            };

            for table in RESTORE_ORDER.iter().filter(|t| t.name != PROFILE_TABLE) {
                let filter = match table.scope {
                    ScopeRule::Team(column) => IdFilter {
                        column,
                        values: &team_values,
                    },
                    ScopeRule::Member(column) => IdFilter {
                        column,
                        values: &member_values,
                    },
                };
                let rows = store.fetch_rows(table.name, Some(filter)).await?;
                snapshot.tables.insert(table.name.to_string(), rows);
            }
        }
    }
    Ok(())
}

/// Enumerate the live (bucket, path) pairs the export should copy
async fn collect_object_paths(
    objects: &dyn ObjectStore,
    config: &BackupConfig,
    scope: &RestoreScope,
    filter: Option<&ScopeFilter>,
) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();

    for prefix in &config.diagram_prefixes {
        for path in objects.list(&config.diagram_bucket, prefix).await? {
            let keep = match filter {
                None => true,
                Some(filter) => filter.retains_object(&path),
            };
            if keep {
                out.push((config.diagram_bucket.clone(), path));
            }
        }
    }

    // Business-plan documents live under `{prefix}/{team}/...`; a team
    // scope can list its own subtree directly
    let plan_prefix = match scope {
        RestoreScope::All => config.business_plan_prefix.clone(),
        RestoreScope::Team(team) => format!("{}/{}", config.business_plan_prefix, team),
    };
    for path in objects.list(&config.document_bucket, &plan_prefix).await? {
        out.push((config.document_bucket.clone(), path));
    }

    Ok(out)
}

/// Known snapshot locators in the backup bucket, newest first
pub async fn list_snapshots(
    objects: &dyn ObjectStore,
    backup_bucket: &str,
) -> Result<Vec<String>> {
    let mut locators: Vec<String> = objects
        .list(backup_bucket, "")
        .await?
        .into_iter()
        .filter_map(|path| {
            path.strip_suffix("/data.json")
                .map(str::to_string)
        })
        .collect();
    locators.sort();
    locators.reverse();
    Ok(locators)
}
