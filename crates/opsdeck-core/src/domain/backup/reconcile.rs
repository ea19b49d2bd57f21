//! Post-apply reconciliation
//!
//! After the snapshot rows are upserted, live rows inside the restore
//! scope that the snapshot does not mention are leftovers from after the
//! export and get deleted. Tables are walked in cleanup order (children
//! before parents) so no delete ever strands a referencing child row.
//!
//! Reconciliation is deliberately infallible: the snapshot data is already
//! applied, so a table that fails to reconcile is logged and skipped
//! rather than failing the whole restore.

use super::scope::ScopeFilter;
use super::snapshot::Snapshot;
use super::tables::{cleanup_order, ScopeRule};
use crate::storage::TableStore;
use std::collections::HashSet;
use tracing::{debug, warn};

/// What reconciliation removed, and which tables it had to skip
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub rows_deleted: u64,
    pub tables_skipped: Vec<String>,
}

/// Delete in-scope live rows absent from the snapshot.
///
/// `filter` restricts the live side to one team; `None` reconciles the
/// entire store against a universal snapshot.
pub async fn reconcile(
    store: &TableStore,
    snapshot: &Snapshot,
    filter: Option<&ScopeFilter>,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for table in cleanup_order() {
        let live_ids = match scoped_live_ids(store, table.name, table.scope, filter).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(table = table.name, error = %e, "Skipping reconciliation for table");
                report.tables_skipped.push(table.name.to_string());
                continue;
            }
        };

        let keep: HashSet<String> = snapshot.table_ids(table.name);
        let stale: Vec<String> = live_ids.into_iter().filter(|id| !keep.contains(id)).collect();
        if stale.is_empty() {
            continue;
        }

        match store.delete_ids(table.name, &stale).await {
            Ok(deleted) => {
                debug!(table = table.name, deleted, "Reconciled table");
                report.rows_deleted += deleted;
            }
            Err(e) => {
                warn!(table = table.name, error = %e, "Skipping reconciliation for table");
                report.tables_skipped.push(table.name.to_string());
            }
        }
    }

    report
}

async fn scoped_live_ids(
    store: &TableStore,
    table: &str,
    scope: ScopeRule,
    filter: Option<&ScopeFilter>,
) -> crate::error::Result<Vec<String>> {
    match filter {
        None => store.all_ids(table).await,
        Some(filter) => match scope {
            ScopeRule::Team(column) => {
                store
                    .ids_where_in(table, column, std::slice::from_ref(&filter.team_id))
                    .await
            }
            ScopeRule::Member(column) => {
                store
                    .ids_where_in(table, column, &filter.member_filter_values())
                    .await
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backup::snapshot::UNIVERSAL_SCOPE;
    use crate::storage::store::Row;
    use crate::storage::Database;
    use serde_json::json;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[tokio::test]
    async fn test_universal_reconcile_removes_unmentioned_rows() {
        let db = Database::in_memory().await.unwrap();
        let store = TableStore::new(db.pool());

        store
            .upsert_rows(
                "departments",
                &[
                    row(&[("id", "dep-1"), ("team_id", "team-1")]),
                    row(&[("id", "dep-2"), ("team_id", "team-2")]),
                ],
            )
            .await
            .unwrap();

        let mut snapshot = Snapshot::new(UNIVERSAL_SCOPE);
        snapshot.tables.insert(
            "departments".to_string(),
            vec![row(&[("id", "dep-1"), ("team_id", "team-1")])],
        );

        let report = reconcile(&store, &snapshot, None).await;
        assert_eq!(report.rows_deleted, 1);
        assert!(report.tables_skipped.is_empty());
        assert_eq!(store.all_ids("departments").await.unwrap(), vec!["dep-1".to_string()]);
    }

    #[tokio::test]
    async fn test_team_reconcile_leaves_other_tenants_alone() {
        let db = Database::in_memory().await.unwrap();
        let store = TableStore::new(db.pool());

        store
            .upsert_rows(
                "departments",
                &[
                    row(&[("id", "dep-1"), ("team_id", "team-1")]),
                    row(&[("id", "dep-stale"), ("team_id", "team-1")]),
                    row(&[("id", "dep-2"), ("team_id", "team-2")]),
                ],
            )
            .await
            .unwrap();

        let mut snapshot = Snapshot::new("team-1");
        snapshot.tables.insert(
            "departments".to_string(),
            vec![row(&[("id", "dep-1"), ("team_id", "team-1")])],
        );
        let filter = ScopeFilter::derive(&snapshot, "team-1");

        let report = reconcile(&store, &snapshot, Some(&filter)).await;
        assert_eq!(report.rows_deleted, 1);

        let mut remaining = store.all_ids("departments").await.unwrap();
        remaining.sort();
        // team-2's row survives; only team-1's stale row is gone
        assert_eq!(remaining, vec!["dep-1".to_string(), "dep-2".to_string()]);
    }

    #[tokio::test]
    async fn test_member_scoped_reconcile_uses_member_set() {
        let db = Database::in_memory().await.unwrap();
        let store = TableStore::new(db.pool());

        store
            .upsert_rows(
                "workflows",
                &[
                    row(&[("id", "wf-1"), ("user_id", "user-1"), ("kind", "growth")]),
                    row(&[("id", "wf-stale"), ("user_id", "user-1"), ("kind", "growth")]),
                    row(&[("id", "wf-other"), ("user_id", "user-9"), ("kind", "growth")]),
                ],
            )
            .await
            .unwrap();

        let mut snapshot = Snapshot::new("team-1");
        snapshot.tables.insert(
            "business_profiles".to_string(),
            vec![row(&[("id", "prof-1"), ("team_id", "team-1"), ("user_id", "user-1")])],
        );
        snapshot.tables.insert(
            "workflows".to_string(),
            vec![row(&[("id", "wf-1"), ("user_id", "user-1"), ("kind", "growth")])],
        );
        let filter = ScopeFilter::derive(&snapshot, "team-1");

        reconcile(&store, &snapshot, Some(&filter)).await;

        let mut remaining = store.all_ids("workflows").await.unwrap();
        remaining.sort();
        // user-9 is outside the team; wf-stale belongs to a member and is
        // absent from the snapshot
        assert_eq!(remaining, vec!["wf-1".to_string(), "wf-other".to_string()]);
    }

    #[tokio::test]
    async fn test_reconcile_deletes_children_before_parents() {
        let db = Database::in_memory().await.unwrap();
        let store = TableStore::new(db.pool());

        store
            .upsert_rows(
                "strategic_plans",
                &[row(&[("id", "plan-1"), ("user_id", "user-1")])],
            )
            .await
            .unwrap();
        store
            .upsert_rows(
                "document_history",
                &[row(&[
                    ("id", "doc-1"),
                    ("user_id", "user-1"),
                    ("source_plan_id", "plan-1"),
                ])],
            )
            .await
            .unwrap();

        // Empty snapshot: both rows are stale. With foreign keys enforced,
        // the plan can only go once the document referencing it is gone.
        let snapshot = Snapshot::new(UNIVERSAL_SCOPE);
        let report = reconcile(&store, &snapshot, None).await;

        assert_eq!(report.rows_deleted, 2);
        assert!(report.tables_skipped.is_empty());
        assert!(store.all_ids("strategic_plans").await.unwrap().is_empty());
        assert!(store.all_ids("document_history").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_empty_store_is_a_no_op() {
        let db = Database::in_memory().await.unwrap();
        let store = TableStore::new(db.pool());

        let snapshot = Snapshot::new(UNIVERSAL_SCOPE);
        let report = reconcile(&store, &snapshot, None).await;
        assert_eq!(report.rows_deleted, 0);
        assert!(report.tables_skipped.is_empty());
    }
}
