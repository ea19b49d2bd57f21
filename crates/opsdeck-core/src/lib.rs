//! Opsdeck Core Library
//!
//! This crate provides the core functionality for Opsdeck's backup and
//! restore engine, including:
//! - Storage (SQLite pool, migrations, dynamic-row table operations)
//! - Object store abstraction (binary objects: diagrams, exported documents)
//! - Scoped snapshot export (full dataset or a single tenant team)
//! - Scoped restore (conflict pre-clean, ordered upsert, reconciliation,
//!   object replay, audit trail)
//! - Request-style API surface for admin tooling

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod objects;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::backup::{RestoreOutcome, RestoreScope, Snapshot};
    pub use crate::error::{Error, Result};
}
