//! Secondary unique-constraint pre-clean
//!
//! An upsert keyed only by primary id misbehaves when a *different* live
//! row already owns the target unique-column value: live row (id=A,
//! team=T) plus incoming row (id=B, team=T) would insert a second row for
//! team T. Before upserting a table with a declared secondary unique
//! column, delete the live rows whose unique value is claimed by an
//! incoming row with a different primary id.

use super::snapshot::Row;
use super::tables::EntityTable;
use crate::error::{Error, Result};
use crate::storage::store::row_id;
use crate::storage::TableStore;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

/// Remove live rows that would collide with `incoming` on the table's
/// secondary unique column. No-op for tables without one. Returns the
/// number of conflicting rows deleted.
pub async fn pre_clean(
    store: &TableStore,
    table: &EntityTable,
    incoming: &[Row],
) -> Result<u64> {
    let Some(unique_column) = table.unique_column else {
        return Ok(0);
    };
    if incoming.is_empty() {
        return Ok(0);
    }

    // Incoming primary ids are never conflicts with themselves
    let incoming_ids: HashSet<&str> = incoming.iter().filter_map(row_id).collect();
    let incoming_values: Vec<String> = incoming
        .iter()
        .filter_map(|row| match row.get(unique_column) {
            Some(Value::String(v)) if !v.is_empty() => Some(v.clone()),
            _ => None,
        })
        .collect();
    if incoming_values.is_empty() {
        return Ok(0);
    }

    let live_ids = store
        .ids_where_in(table.name, unique_column, &incoming_values)
        .await
        .map_err(|e| conflict_error(table.name, e))?;

    let conflict_ids: Vec<String> = live_ids
        .into_iter()
        .filter(|id| !incoming_ids.contains(id.as_str()))
        .collect();
    if conflict_ids.is_empty() {
        debug!(table = table.name, "No unique-constraint conflicts");
        return Ok(0);
    }

    let deleted = store
        .delete_ids(table.name, &conflict_ids)
        .await
        .map_err(|e| conflict_error(table.name, e))?;

    info!(
        table = table.name,
        unique_column,
        deleted,
        "Removed live rows conflicting on secondary unique column"
    );
    Ok(deleted)
}

fn conflict_error(table: &str, source: Error) -> Error {
    Error::ConflictResolutionFailed {
        table: table.to_string(),
        message: source.to_string(),
    }
}
