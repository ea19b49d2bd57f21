//! Restore pipeline
//!
//! Orchestrates a full restore from a snapshot locator: explicit
//! confirmation, load and verify, scope narrowing, unique-conflict
//! pre-clean, ordered upsert, reconciliation, object replay, and finally
//! the audit record. Relational steps are fail-fast; everything after the
//! rows have landed (reconcile, object replay, audit) is best-effort.

use super::apply::apply_snapshot;
use super::conflict::pre_clean;
use super::objects::{replay_objects, ObjectReplayOutcome};
use super::reconcile::reconcile;
use super::scope::{narrow, RestoreScope};
use super::snapshot::load_snapshot;
use super::tables::{PROFILE_TABLE, RESTORE_ORDER};
use super::{audit, audit::AuditKind};
use crate::config::BackupConfig;
use crate::error::{Error, Result};
use crate::objects::ObjectStore;
use crate::storage::{Database, IdFilter, TableStore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{info, warn};

/// A restore request as submitted by an operator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    /// Backup folder locator, e.g. `2026-01-01/backup-...`
    pub snapshot_locator: String,
    /// Must be `true`; restores overwrite current data
    #[serde(default)]
    pub confirm: bool,
    /// `"all"`, a team id, or absent for the universal scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_scope: Option<String>,
}

/// Counts and context describing a completed restore
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    pub scope: String,
    pub backup_path: String,
    pub rows_upserted: u64,
    pub rows_deleted: u64,
    pub tables_skipped: Vec<String>,
    pub objects_restored: u64,
    pub objects_failed: u64,
}

impl RestoreOutcome {
    /// One-line human summary for CLI output and audit details
    pub fn summary(&self) -> String {
        format!(
            "scope={} upserted={} deleted={} objects={}/{} skipped_tables={}",
            self.scope,
            self.rows_upserted,
            self.rows_deleted,
            self.objects_restored,
            self.objects_restored + self.objects_failed,
            self.tables_skipped.len()
        )
    }
}

/// Run the full restore pipeline for an already-authorized operator.
pub async fn restore_snapshot(
    db: &Database,
    objects: &dyn ObjectStore,
    config: &BackupConfig,
    request: &RestoreRequest,
    operator_id: &str,
) -> Result<RestoreOutcome> {
    if !request.confirm {
        return Err(Error::InvalidRequest(
            "restore requires explicit confirmation".to_string(),
        ));
    }
    if request.snapshot_locator.trim().is_empty() {
        return Err(Error::InvalidRequest(
            "snapshot locator must not be empty".to_string(),
        ));
    }

    let started = Instant::now();
    let requested = RestoreScope::parse(request.restore_scope.as_deref());
    info!(
        locator = %request.snapshot_locator,
        scope = requested.as_str(),
        "Starting restore"
    );

    let snapshot = load_snapshot(objects, &config.backup_bucket, &request.snapshot_locator).await?;
    let (snapshot, mut filter) = narrow(&snapshot, &requested)?;

    let store = TableStore::new(db.pool());

    // Unique-constraint conflicts must be cleared before any upsert runs
    for table in RESTORE_ORDER {
        pre_clean(&store, table, snapshot.table_rows(table.name)).await?;
    }

    let applied = apply_snapshot(&store, &snapshot).await?;

    // Members who joined after the export are live but absent from the
    // snapshot; reconciliation must cover their rows too, so the member
    // set is widened with a live profile query before cleanup. The rows
    // are already durably applied here, so a failed widening query
    // degrades to the snapshot-derived member set instead of failing
    // the restore.
    if let Some(filter) = filter.as_mut() {
        let live_members = store
            .column_values(
                PROFILE_TABLE,
                "user_id",
                IdFilter {
                    column: "team_id",
                    values: std::slice::from_ref(&filter.team_id),
                },
            )
            .await;
        match live_members {
            Ok(live_members) => {
                let known: HashSet<&String> = filter.member_user_ids.iter().collect();
                let new_members: Vec<String> = live_members
                    .into_iter()
                    .filter(|m| !known.contains(m))
                    .collect();
                filter.member_user_ids.extend(new_members);
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Live member query failed; reconciling with snapshot-derived members only"
                );
            }
        }
    }

    let reconciled = reconcile(&store, &snapshot, filter.as_ref()).await;

    let replay: ObjectReplayOutcome =
        replay_objects(objects, &config.backup_bucket, &snapshot.object_manifest).await;

    let outcome = RestoreOutcome {
        scope: snapshot.scope.clone(),
        backup_path: request.snapshot_locator.clone(),
        rows_upserted: applied.rows_upserted,
        rows_deleted: reconciled.rows_deleted,
        tables_skipped: reconciled.tables_skipped,
        objects_restored: replay.restored,
        objects_failed: replay.failed,
    };

    audit::record(
        db.pool(),
        AuditKind::Restore,
        &outcome.scope,
        &outcome.backup_path,
        operator_id,
        Some(&outcome.summary()),
    )
    .await;

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        summary = %outcome.summary(),
        "Restore complete"
    );
    Ok(outcome)
}
