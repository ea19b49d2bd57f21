//! Scoped backup and restore engine
//!
//! The engine moves a tenant dashboard's relational state and binary
//! objects in and out of write-once snapshots. Exports capture the
//! covered tables plus their associated objects; restores apply a
//! snapshot back with upsert-then-reconcile semantics, optionally
//! narrowed to a single tenant team.

pub mod apply;
pub mod audit;
pub mod conflict;
pub mod export;
pub mod objects;
pub mod reconcile;
pub mod restore;
pub mod scope;
pub mod snapshot;
pub mod tables;

pub use audit::{AuditEntry, AuditKind};
pub use export::{create_snapshot, list_snapshots, ExportOutcome};
pub use restore::{restore_snapshot, RestoreOutcome, RestoreRequest};
pub use scope::{RestoreScope, ScopeFilter};
pub use snapshot::{ManifestEntry, Snapshot, UNIVERSAL_SCOPE};
pub use tables::{EntityTable, ScopeRule, PROFILE_TABLE, RESTORE_ORDER};
