//! Backup and restore request handlers

use crate::config::BackupConfig;
use crate::domain::backup::{
    create_snapshot, list_snapshots, restore_snapshot, ExportOutcome, RestoreOutcome,
    RestoreRequest, RestoreScope,
};
use crate::error::{Error, Result};
use crate::objects::ObjectStore;
use crate::storage::Database;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Serializable error envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable kind, e.g. `scope_mismatch`
    pub kind: String,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl From<&Error> for ApiError {
    fn from(e: &Error) -> Self {
        Self {
            kind: e.kind().to_string(),
            code: e.code().to_string(),
            message: e.to_string(),
            suggestion: e.suggestion(),
        }
    }
}

/// A backup request as submitted by an operator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRequest {
    /// `"all"`, a team id, or absent for the universal scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl BackupRequest {
    pub fn scope(&self) -> RestoreScope {
        RestoreScope::parse(self.scope.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RestoreOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ExportOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSnapshotsResponse {
    pub success: bool,
    #[serde(default)]
    pub snapshots: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

/// Verify the operator exists and carries the super-admin role. Backup
/// and restore touch every tenant's data, so nothing less is allowed.
pub async fn require_super_admin(db: &Database, operator_id: &str) -> Result<()> {
    if operator_id.trim().is_empty() {
        return Err(Error::Unauthenticated);
    }

    let role: Option<(String,)> =
        sqlx::query_as("SELECT role FROM business_profiles WHERE user_id = ? LIMIT 1")
            .bind(operator_id)
            .fetch_optional(db.pool())
            .await?;

    match role {
        Some((role,)) if role == "super_admin" => Ok(()),
        Some(_) => Err(Error::Unauthorized(format!(
            "operator '{}' is not a super admin",
            operator_id
        ))),
        None => Err(Error::Unauthorized(format!(
            "no profile found for operator '{}'",
            operator_id
        ))),
    }
}

/// Run a restore on behalf of an operator
pub async fn handle_restore(
    db: &Database,
    objects: &dyn ObjectStore,
    config: &BackupConfig,
    operator_id: &str,
    request: &RestoreRequest,
) -> RestoreResponse {
    let result = async {
        require_super_admin(db, operator_id).await?;
        restore_snapshot(db, objects, config, request, operator_id).await
    }
    .await;

    match result {
        Ok(outcome) => RestoreResponse {
            success: true,
            outcome: Some(outcome),
            error: None,
        },
        Err(e) => {
            error!(error = %e, code = e.code(), "Restore request failed");
            RestoreResponse {
                success: false,
                outcome: None,
                error: Some(ApiError::from(&e)),
            }
        }
    }
}

/// Create a new snapshot on behalf of an operator
pub async fn handle_backup(
    db: &Database,
    objects: &dyn ObjectStore,
    config: &BackupConfig,
    operator_id: &str,
    request: &BackupRequest,
) -> BackupResponse {
    let result = async {
        require_super_admin(db, operator_id).await?;
        create_snapshot(db, objects, config, &request.scope(), operator_id).await
    }
    .await;

    match result {
        Ok(outcome) => BackupResponse {
            success: true,
            outcome: Some(outcome),
            error: None,
        },
        Err(e) => {
            error!(error = %e, code = e.code(), "Backup request failed");
            BackupResponse {
                success: false,
                outcome: None,
                error: Some(ApiError::from(&e)),
            }
        }
    }
}

/// List known snapshot locators, newest first
pub async fn handle_list_snapshots(
    db: &Database,
    objects: &dyn ObjectStore,
    config: &BackupConfig,
    operator_id: &str,
) -> ListSnapshotsResponse {
    let result = async {
        require_super_admin(db, operator_id).await?;
        list_snapshots(objects, &config.backup_bucket).await
    }
    .await;

    match result {
        Ok(snapshots) => ListSnapshotsResponse {
            success: true,
            snapshots,
            error: None,
        },
        Err(e) => {
            error!(error = %e, code = e.code(), "Snapshot listing failed");
            ListSnapshotsResponse {
                success: false,
                snapshots: Vec::new(),
                error: Some(ApiError::from(&e)),
            }
        }
    }
}
