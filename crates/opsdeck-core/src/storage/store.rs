//! Dynamic-row table operations
//!
//! The backup engine treats entity rows as loosely-typed records
//! (`Row = serde_json::Map<String, Value>`): the covered tables are
//! heterogeneous, and batching, id extraction, and generic upsert are
//! type-agnostic across all of them. `TableStore` provides the batched
//! primitives the restore pipeline is built on:
//!
//! - `upsert_rows`: insert-or-update-by-primary-key (`ON CONFLICT(id)`)
//! - `all_ids` / `ids_where_in`: id selection with `IN (...)` filtering,
//!   chunked to stay under query-parameter limits
//! - `delete_ids`: batched deletion by primary key
//! - `fetch_rows`: full-row capture for the export path
//!
//! Table and column names are interpolated into SQL, so they are validated
//! against a strict identifier charset before use.

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use sqlx::sqlite::Sqlite;
use sqlx::{Column, QueryBuilder, Row as SqlxRow, SqlitePool, TypeInfo};

/// A loosely-typed entity row. Every row carries a non-empty string `id`.
pub type Row = Map<String, Value>;

/// Maximum rows per upsert statement
pub const UPSERT_BATCH_SIZE: usize = 200;

/// Maximum values per `IN (...)` filter or batched delete
pub const QUERY_BATCH_SIZE: usize = 100;

/// An `IN (...)` filter over a single column
#[derive(Debug, Clone, Copy)]
pub struct IdFilter<'a> {
    pub column: &'a str,
    pub values: &'a [String],
}

/// Batched dynamic-row operations over the SQLite pool
#[derive(Debug, Clone)]
pub struct TableStore {
    pool: SqlitePool,
}

impl TableStore {
    pub fn new(pool: &SqlitePool) -> Self {
        Self { pool: pool.clone() }
    }

    /// Insert-or-update the given rows by primary key.
    ///
    /// Columns are the union of keys across the batch; a row missing a
    /// column is written as NULL (the snapshot is the source of truth).
    /// Returns the number of rows written.
    pub async fn upsert_rows(&self, table: &str, rows: &[Row]) -> Result<u64> {
        ensure_identifier(table)?;
        if rows.is_empty() {
            return Ok(0);
        }

        let columns = collect_columns(rows)?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("INSERT INTO {} (", table));
        {
            let mut sep = qb.separated(", ");
            for column in &columns {
                sep.push(column.as_str());
            }
        }
        qb.push(") ");
        qb.push_values(rows, |mut b, row| {
            for column in &columns {
                bind_json_value(&mut b, row.get(column.as_str()));
            }
        });

        let update_columns: Vec<&String> = columns.iter().filter(|c| c.as_str() != "id").collect();
        if update_columns.is_empty() {
            qb.push(" ON CONFLICT(id) DO NOTHING");
        } else {
            qb.push(" ON CONFLICT(id) DO UPDATE SET ");
            let mut sep = qb.separated(", ");
            for column in update_columns {
                sep.push(format!("{col} = excluded.{col}", col = column));
            }
        }

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// All primary ids in a table
    pub async fn all_ids(&self, table: &str) -> Result<Vec<String>> {
        ensure_identifier(table)?;
        let rows: Vec<(String,)> = sqlx::query_as(&format!("SELECT id FROM {}", table))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Primary ids of rows whose `column` value is in `values`, queried in
    /// chunks of at most [`QUERY_BATCH_SIZE`] values.
    pub async fn ids_where_in(
        &self,
        table: &str,
        column: &str,
        values: &[String],
    ) -> Result<Vec<String>> {
        ensure_identifier(table)?;
        ensure_identifier(column)?;

        let mut ids = Vec::new();
        for chunk in values.chunks(QUERY_BATCH_SIZE) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("SELECT id FROM {} WHERE {} IN (", table, column));
            {
                let mut sep = qb.separated(", ");
                for value in chunk {
                    sep.push_bind(value);
                }
            }
            qb.push(")");

            let rows = qb.build().fetch_all(&self.pool).await?;
            for row in rows {
                ids.push(row.try_get::<String, _>(0)?);
            }
        }
        Ok(ids)
    }

    /// Distinct non-null values of `column` for rows whose `filter.column`
    /// value is in `filter.values`. Used to derive a team's member user ids
    /// from the profile table.
    pub async fn column_values(
        &self,
        table: &str,
        column: &str,
        filter: IdFilter<'_>,
    ) -> Result<Vec<String>> {
        ensure_identifier(table)?;
        ensure_identifier(column)?;
        ensure_identifier(filter.column)?;

        let mut values = Vec::new();
        for chunk in filter.values.chunks(QUERY_BATCH_SIZE) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT DISTINCT {} FROM {} WHERE {} IS NOT NULL AND {} IN (",
                column, table, column, filter.column
            ));
            {
                let mut sep = qb.separated(", ");
                for value in chunk {
                    sep.push_bind(value);
                }
            }
            qb.push(")");

            let rows = qb.build().fetch_all(&self.pool).await?;
            for row in rows {
                values.push(row.try_get::<String, _>(0)?);
            }
        }
        Ok(values)
    }

    /// Delete rows by primary key, in chunks of at most [`QUERY_BATCH_SIZE`].
    /// Returns the number of rows deleted.
    pub async fn delete_ids(&self, table: &str, ids: &[String]) -> Result<u64> {
        ensure_identifier(table)?;

        let mut deleted = 0;
        for chunk in ids.chunks(QUERY_BATCH_SIZE) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("DELETE FROM {} WHERE id IN (", table));
            {
                let mut sep = qb.separated(", ");
                for id in chunk {
                    sep.push_bind(id);
                }
            }
            qb.push(")");

            let result = qb.build().execute(&self.pool).await?;
            deleted += result.rows_affected();
        }
        Ok(deleted)
    }

    /// Fetch full rows, optionally filtered by `column IN (values)`.
    /// Used by the export path to capture table contents as generic rows.
    pub async fn fetch_rows(&self, table: &str, filter: Option<IdFilter<'_>>) -> Result<Vec<Row>> {
        ensure_identifier(table)?;

        let mut out = Vec::new();
        match filter {
            None => {
                let rows = sqlx::query(&format!("SELECT * FROM {}", table))
                    .fetch_all(&self.pool)
                    .await?;
                for row in rows {
                    out.push(decode_row(&row)?);
                }
            }
            Some(filter) => {
                ensure_identifier(filter.column)?;
                for chunk in filter.values.chunks(QUERY_BATCH_SIZE) {
                    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                        "SELECT * FROM {} WHERE {} IN (",
                        table, filter.column
                    ));
                    {
                        let mut sep = qb.separated(", ");
                        for value in chunk {
                            sep.push_bind(value);
                        }
                    }
                    qb.push(")");

                    let rows = qb.build().fetch_all(&self.pool).await?;
                    for row in rows {
                        out.push(decode_row(&row)?);
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Extract the non-empty string `id` of a row
pub fn row_id(row: &Row) -> Option<&str> {
    match row.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.as_str()),
        _ => None,
    }
}

fn ensure_identifier(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!(
            "invalid SQL identifier: '{}'",
            name
        )))
    }
}

/// Ordered union of column names across the batch; `id` must be present
/// and non-empty in every row.
fn collect_columns(rows: &[Row]) -> Result<Vec<String>> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        if row_id(row).is_none() {
            return Err(Error::InvalidRequest(
                "row is missing a non-empty 'id' field".to_string(),
            ));
        }
        for key in row.keys() {
            ensure_identifier(key)?;
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    Ok(columns)
}

fn bind_json_value(
    b: &mut sqlx::query_builder::Separated<'_, '_, Sqlite, &str>,
    value: Option<&Value>,
) {
    match value {
        None | Some(Value::Null) => {
            b.push_bind(Option::<String>::None);
        }
        Some(Value::Bool(v)) => {
            b.push_bind(*v as i64);
        }
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                b.push_bind(i);
            } else {
                b.push_bind(n.as_f64().unwrap_or(0.0));
            }
        }
        Some(Value::String(s)) => {
            b.push_bind(s.clone());
        }
        // Nested structures are stored as serialized JSON text
        Some(other) => {
            b.push_bind(other.to_string());
        }
    }
}

fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Result<Row> {
    let mut out = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        let value = match column.type_info().name() {
            "INTEGER" | "BOOLEAN" => row
                .try_get::<Option<i64>, _>(i)?
                .map(Value::from)
                .unwrap_or(Value::Null),
            "REAL" => row
                .try_get::<Option<f64>, _>(i)?
                .map(Value::from)
                .unwrap_or(Value::Null),
            _ => row
                .try_get::<Option<String>, _>(i)?
                .map(Value::from)
                .unwrap_or(Value::Null),
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}
