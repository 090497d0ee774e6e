//! Reference-column resolution and caching.
//!
//! A reference column (`Ref:<Table>` / `RefList:<Table>`) stores row ids
//! of another table; dropdowns need the human-readable label of each
//! target row. Resolving that means picking the target's "display
//! column" and reading every row once. Resolution is cached per source
//! column for the lifetime of the owning [`crate::session::DocSession`].
//!
//! The cache is deliberately session-owned rather than a process-wide
//! singleton, and writes through the session evict the affected table's
//! entries. Schema changes made outside the session are still invisible
//! until a new session is built; there is no TTL.

use crate::backend::DocBackend;
use gridlink_core::{ColumnDescriptor, GridlinkError, Result, TableSnapshot};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// One selectable row of a reference dropdown.
#[derive(Debug, Clone, PartialEq)]
pub struct RefDisplayRow {
    /// Target row id (the value stored in the reference cell).
    pub id: i64,
    /// Human-readable label from the display column.
    pub label: String,
    /// Secondary display text (unused today, kept in the shape).
    pub extra: String,
    /// Lowercased "label id" haystack for substring search.
    pub q: String,
}

/// The resolved display rows of one reference column's target table.
#[derive(Debug, Clone)]
pub struct ResolvedRefs {
    /// Target table id.
    pub table_id: String,
    /// Column chosen to supply the labels.
    pub display_col: String,
    /// Display rows in target-table order.
    pub rows: Vec<RefDisplayRow>,
    by_id: HashMap<i64, usize>,
}

impl ResolvedRefs {
    /// Label for a target row id, if present.
    pub fn label_for(&self, row_id: i64) -> Option<&str> {
        self.by_id
            .get(&row_id)
            .map(|index| self.rows[*index].label.as_str())
    }

    /// Rows whose haystack contains the (lowercased) query.
    pub fn search(&self, query: &str) -> Vec<&RefDisplayRow> {
        let needle = query.to_lowercase();
        self.rows.iter().filter(|row| row.q.contains(&needle)).collect()
    }
}

/// Session-owned cache of resolved reference columns, keyed by source
/// column id.
#[derive(Default)]
pub struct RefCache {
    entries: RwLock<HashMap<String, Arc<ResolvedRefs>>>,
}

impl RefCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a reference column's display rows, memoized.
    ///
    /// `col_id_by_row` maps internal column-row-ids to column ids; it is
    /// how the descriptor's visible/display pointers become names (host
    /// mode builds it from the columns schema table, REST mode passes an
    /// empty map and relies on the widget-options hint).
    ///
    /// # Errors
    ///
    /// Fails if the descriptor is not reference-typed, or if the target
    /// table cannot be fetched.
    pub async fn resolve(
        &self,
        backend: &dyn DocBackend,
        column: &ColumnDescriptor,
        col_id_by_row: &HashMap<i64, String>,
    ) -> Result<Arc<ResolvedRefs>> {
        if let Some(cached) = self.entries.read().unwrap().get(&column.col_id) {
            return Ok(cached.clone());
        }

        let target = column
            .col_type
            .ref_table()
            .ok_or_else(|| GridlinkError::NotAReference(column.col_id.clone()))?;
        let target_columns = backend.fetch_columns(target).await?;
        let snapshot = backend.fetch_table(target, None).await?;
        let display_col = pick_display_col(column, col_id_by_row, &target_columns, &snapshot);
        let resolved = Arc::new(build_rows(target, display_col, &snapshot));
        debug!(
            "resolved {} rows of {} for column {} (display column {})",
            resolved.rows.len(),
            target,
            column.col_id,
            resolved.display_col
        );

        self.entries
            .write()
            .unwrap()
            .insert(column.col_id.clone(), resolved.clone());
        Ok(resolved)
    }

    /// Evict every entry resolved against the given target table.
    ///
    /// Called by the session after a write batch touching that table.
    pub fn invalidate_table(&self, table_id: &str) {
        self.entries
            .write()
            .unwrap()
            .retain(|_, entry| entry.table_id != table_id);
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    /// Number of memoized columns (test hook).
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pick the display column by priority:
///
/// 1. the descriptor's visible/display pointer, resolved through the
///    row-id lookup, when that name exists among the target's columns;
/// 2. the widget-options hint, when present among the target's columns;
/// 3. the first non-id column of the target table.
fn pick_display_col(
    column: &ColumnDescriptor,
    col_id_by_row: &HashMap<i64, String>,
    target_columns: &[ColumnDescriptor],
    snapshot: &TableSnapshot,
) -> Option<String> {
    let exists = |name: &str| target_columns.iter().any(|c| c.col_id == name);

    let pointer = column
        .visible_col_row_id
        .or(column.display_col_row_id)
        .and_then(|row_id| col_id_by_row.get(&row_id))
        .filter(|name| exists(name.as_str()));
    if let Some(name) = pointer {
        return Some(name.clone());
    }

    if let Some(hint) = column
        .options
        .display_col_hint()
        .filter(|name| exists(name))
    {
        return Some(hint.to_string());
    }

    // First non-id column, in the target's wire order.
    snapshot
        .column_ids()
        .find(|col_id| *col_id != "id")
        .map(str::to_string)
}

fn build_rows(table_id: &str, display_col: Option<String>, snapshot: &TableSnapshot) -> ResolvedRefs {
    let cells = display_col
        .as_deref()
        .and_then(|name| snapshot.column(name));
    let rows: Vec<RefDisplayRow> = snapshot
        .ids()
        .iter()
        .enumerate()
        .map(|(index, id)| {
            let label = cells
                .and_then(|cells| cells.get(index))
                .map(|value| display_string(value, *id))
                .unwrap_or_else(|| id.to_string());
            let q = format!("{} {}", label, id).to_lowercase();
            RefDisplayRow {
                id: *id,
                label,
                extra: String::new(),
                q,
            }
        })
        .collect();
    let by_id = rows.iter().enumerate().map(|(i, row)| (row.id, i)).collect();
    ResolvedRefs {
        table_id: table_id.to_string(),
        display_col: display_col.unwrap_or_default(),
        rows,
        by_id,
    }
}

/// Stringify a display cell, defaulting to the row id for empty values.
fn display_string(value: &Value, row_id: i64) -> String {
    match value {
        Value::Null => row_id.to_string(),
        Value::String(s) if s.is_empty() => row_id.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
