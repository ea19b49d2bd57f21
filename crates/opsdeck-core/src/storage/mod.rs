//! Storage layer - SQLite pool, migrations, dynamic-row table operations
//!
//! # Architecture
//!
//! - `database`: Connection pool management and initialization
//! - `migrations`: Schema versioning and automatic migration
//! - `store`: Batched dynamic-row operations (upsert / select ids / delete)
//!   over the fixed set of covered entity tables
//!
//! # Usage
//!
//! ```ignore
//! use opsdeck_core::storage::{Database, TableStore};
//!
//! let db = Database::in_memory().await?;
//! let store = TableStore::new(db.pool());
//! ```

pub mod database;
pub mod migrations;
pub mod store;

pub use database::{Database, DatabaseConfig};
pub use migrations::{migration_status, run_migrations, MigrationStatus, CURRENT_VERSION};
pub use store::{IdFilter, TableStore, QUERY_BATCH_SIZE, UPSERT_BATCH_SIZE};
