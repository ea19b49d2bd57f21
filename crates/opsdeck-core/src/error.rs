//! Error types for Opsdeck

use thiserror::Error;

/// Result type alias using Opsdeck's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Opsdeck error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Auth errors (E001-E009)
    #[error("Not authenticated. Supply an operator id with `--operator`.")]
    Unauthenticated,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Request errors (E010-E019)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Snapshot errors (E020-E029)
    #[error("Snapshot not found at '{0}'. Run `opsdeck snapshots` to see available backups.")]
    SnapshotNotFound(String),

    #[error("Snapshot at '{0}' is corrupted: {1}")]
    SnapshotCorrupted(String, String),

    #[error("Scope mismatch: snapshot is scoped to '{snapshot}', cannot restore scope '{requested}'")]
    ScopeMismatch { snapshot: String, requested: String },

    // Restore errors (E030-E039)
    #[error("Conflict resolution failed for table '{table}': {message}")]
    ConflictResolutionFailed { table: String, message: String },

    #[error("Restore failed for table '{table}' (batch {batch}): {message}")]
    RestoreFailed {
        table: String,
        batch: usize,
        message: String,
    },

    // Export errors (E040-E049)
    #[error("Backup export failed: {0}")]
    ExportFailed(String),

    // Object store errors (E050-E059)
    #[error("Object store error: {0}")]
    ObjectStore(String),

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "E001",
            Self::Unauthorized(_) => "E002",
            Self::InvalidRequest(_) => "E010",
            Self::SnapshotNotFound(_) => "E020",
            Self::SnapshotCorrupted(..) => "E021",
            Self::ScopeMismatch { .. } => "E022",
            Self::ConflictResolutionFailed { .. } => "E030",
            Self::RestoreFailed { .. } => "E031",
            Self::ExportFailed(_) => "E040",
            Self::ObjectStore(_) => "E050",
            Self::Database(_) => "E400",
            Self::Serialization(_) => "E401",
            Self::Config(_) => "E600",
            Self::Io(_) => "E601",
            Self::Other(_) => "E9999",
        }
    }

    /// Machine-readable error kind for API responses
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidRequest(_) => "invalid_request",
            Self::SnapshotNotFound(_) => "snapshot_not_found",
            Self::SnapshotCorrupted(..) => "snapshot_corrupted",
            Self::ScopeMismatch { .. } => "scope_mismatch",
            Self::ConflictResolutionFailed { .. } => "conflict_resolution_failed",
            Self::RestoreFailed { .. } => "restore_failed",
            Self::ExportFailed(_) => "export_failed",
            Self::ObjectStore(_) => "object_store",
            Self::Database(_) => "database",
            Self::Serialization(_) => "serialization",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::SnapshotNotFound(_) => Some("opsdeck snapshots".to_string()),
            Self::InvalidRequest(_) => {
                Some("Pass --yes to confirm that the restore overwrites current data".to_string())
            }
            Self::ScopeMismatch { snapshot, .. } => {
                Some(format!("Re-run with --scope {}", snapshot))
            }
            Self::RestoreFailed { .. } => {
                Some("Restore is idempotent; re-run after diagnosing the failed batch".to_string())
            }
            _ => None,
        }
    }
}
