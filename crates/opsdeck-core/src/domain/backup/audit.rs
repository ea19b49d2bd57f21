//! Backup and restore audit trail
//!
//! Every export and restore attempt is recorded in `backup_audit_log`.
//! Recording is best-effort: an audit insert failure is logged and
//! swallowed so it can never undo an otherwise successful operation.

use crate::error::Result;
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

/// Which operation an audit entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    Backup,
    Restore,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backup => "backup",
            Self::Restore => "restore",
        }
    }
}

/// One row of the audit trail
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: String,
    pub op_type: String,
    pub scope: String,
    pub backup_path: String,
    pub triggered_by_user_id: String,
    pub details: Option<String>,
    pub created_at: String,
}

/// Record an operation in the audit trail. Failures are logged, never
/// propagated.
pub async fn record(
    pool: &SqlitePool,
    kind: AuditKind,
    scope: &str,
    backup_path: &str,
    operator_id: &str,
    details: Option<&str>,
) {
    let result = sqlx::query(
        "INSERT INTO backup_audit_log (id, op_type, scope, backup_path, triggered_by_user_id, details)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(kind.as_str())
    .bind(scope)
    .bind(backup_path)
    .bind(operator_id)
    .bind(details)
    .execute(pool)
    .await;

    if let Err(e) = result {
        warn!(
            op_type = kind.as_str(),
            backup_path, error = %e,
            "Failed to record audit entry"
        );
    }
}

/// Most recent audit entries, newest first
pub async fn recent(pool: &SqlitePool, limit: i64) -> Result<Vec<AuditEntry>> {
    let entries = sqlx::query_as::<_, AuditEntry>(
        "SELECT id, op_type, scope, backup_path, triggered_by_user_id, details, created_at
         FROM backup_audit_log
         ORDER BY created_at DESC, id DESC
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[tokio::test]
    async fn test_record_and_read_back() {
        let db = Database::in_memory().await.unwrap();

        record(
            db.pool(),
            AuditKind::Restore,
            "team-1",
            "2026-01-01/backup-x",
            "admin-1",
            Some("rows_upserted=12"),
        )
        .await;

        let entries = recent(db.pool(), 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].op_type, "restore");
        assert_eq!(entries[0].scope, "team-1");
        assert_eq!(entries[0].triggered_by_user_id, "admin-1");
        assert_eq!(entries[0].details.as_deref(), Some("rows_upserted=12"));
        assert!(!entries[0].created_at.is_empty());
    }

    #[tokio::test]
    async fn test_record_failure_is_swallowed() {
        let db = Database::in_memory().await.unwrap();

        // op_type is CHECK-constrained; an invalid value would fail the
        // insert, but record() must not panic or propagate
        sqlx::query("DROP TABLE backup_audit_log")
            .execute(db.pool())
            .await
            .unwrap();
        record(
            db.pool(),
            AuditKind::Backup,
            "all",
            "2026-01-01/backup-y",
            "admin-1",
            None,
        )
        .await;
    }

    #[tokio::test]
    async fn test_recent_respects_limit() {
        let db = Database::in_memory().await.unwrap();

        for i in 0..5 {
            record(
                db.pool(),
                AuditKind::Backup,
                "all",
                &format!("2026-01-01/backup-{}", i),
                "admin-1",
                None,
            )
            .await;
        }

        let entries = recent(db.pool(), 3).await.unwrap();
        assert_eq!(entries.len(), 3);
    }
}
