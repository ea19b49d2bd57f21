//! Request-style API surface for admin tooling
//!
//! Thin handlers over the backup engine: authorization, request
//! validation, and serializable success/error envelopes. The handlers
//! never return `Err`; every failure becomes a structured error response
//! a frontend or the CLI can render directly.

pub mod backup;

pub use backup::{
    handle_backup, handle_list_snapshots, handle_restore, require_super_admin, ApiError,
    BackupRequest, BackupResponse, ListSnapshotsResponse, RestoreResponse,
};
