//! Column metadata loading.
//!
//! REST mode gets descriptors straight from the proxy's `/columns`
//! endpoint (the platform's internal metadata tables are not reliably
//! exposed over its public REST surface). Host mode recovers the same
//! information by scanning two internal schema tables fetched through the
//! plugin API:
//!
//! - `_grist_Tables`: one row per table, with its external `tableId`;
//! - `_grist_Tables_column`: one row per column, keyed to its table by
//!   `parentId`.
//!
//! Both paths return descriptors sorted ascending by column id so the UI
//! field order is deterministic.

use gridlink_core::{
    sort_by_col_id, ColumnDescriptor, GridlinkError, Result, TableSnapshot,
};
use serde_json::Value;
use std::collections::HashMap;

/// Internal schema table listing the document's tables.
pub const SCHEMA_TABLES: &str = "_grist_Tables";

/// Internal schema table listing every column of every table.
pub const SCHEMA_COLUMNS: &str = "_grist_Tables_column";

/// Find the internal row id of a table in the schema table.
///
/// # Errors
///
/// [`GridlinkError::TableNotFound`] when no row's `tableId` matches.
pub fn table_row_id(schema: &TableSnapshot, table_id: &str) -> Result<i64> {
    let names = schema
        .column("tableId")
        .ok_or_else(|| GridlinkError::TableNotFound(table_id.to_string()))?;
    names
        .iter()
        .position(|name| name.as_str() == Some(table_id))
        .map(|index| schema.ids()[index])
        .ok_or_else(|| GridlinkError::TableNotFound(table_id.to_string()))
}

/// Build descriptors for the columns whose `parentId` matches, sorted by
/// column id.
///
/// Rows with a missing or non-string `colId` are skipped; a bad
/// `widgetOptions` blob degrades to empty options.
pub fn columns_from_schema(columns_table: &TableSnapshot, parent_row_id: i64) -> Vec<ColumnDescriptor> {
    let mut columns = Vec::new();
    for record in columns_table.records() {
        if record.fields.get("parentId").and_then(Value::as_i64) != Some(parent_row_id) {
            continue;
        }
        let Some(col_id) = record.fields.get("colId").and_then(Value::as_str) else {
            continue;
        };
        let label = record
            .fields
            .get("label")
            .and_then(Value::as_str)
            .filter(|label| !label.is_empty())
            .unwrap_or(col_id);
        let col_type = record
            .fields
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("Text");
        let mut column = ColumnDescriptor::new(col_id, label, col_type);
        if let Some(raw) = record.fields.get("widgetOptions").and_then(Value::as_str) {
            column = column.with_widget_options(raw);
        }
        column.is_formula = is_truthy(record.fields.get("isFormula"));
        column.description = record
            .fields
            .get("description")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        column.visible_col_row_id = nonzero(record.fields.get("visibleCol"));
        column.display_col_row_id = nonzero(record.fields.get("displayCol"));
        columns.push(column);
    }
    sort_by_col_id(&mut columns);
    columns
}

/// Map internal column-row-ids to their column ids, across the whole
/// columns schema table. Used to resolve display-column pointers.
pub fn col_id_by_row(columns_table: &TableSnapshot) -> HashMap<i64, String> {
    columns_table
        .records()
        .filter_map(|record| {
            let col_id = record.fields.get("colId").and_then(Value::as_str)?;
            Some((record.id, col_id.to_string()))
        })
        .collect()
}

// Schema flags arrive as booleans from some surfaces and 0/1 from others.
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    }
}

// Pointer columns use 0 for "unset".
fn nonzero(value: Option<&Value>) -> Option<i64> {
    value.and_then(Value::as_i64).filter(|id| *id != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridlink_core::ColType;
    use serde_json::json;

    fn schema_tables() -> TableSnapshot {
        serde_json::from_value(json!({
            "id": [1, 2],
            "tableId": ["CANDIDATS", "ETABLISSEMENTS"]
        }))
        .unwrap()
    }

    fn schema_columns() -> TableSnapshot {
        serde_json::from_value(json!({
            "id": [11, 12, 13, 14, 15],
            "parentId": [1, 1, 1, 2, 1],
            "colId": ["Prenom", "Nom", "Total", "Ville", "Etablissement"],
            "label": ["Prénom", "", "Total", "Ville", "Établissement"],
            "type": ["Text", "Text", "Numeric", "Text", "Ref:ETABLISSEMENTS"],
            "widgetOptions": ["", "", "", "", "{\"visibleCol\":\"Ville\"}"],
            "isFormula": [false, false, true, false, 0],
            "visibleCol": [0, 0, 0, 0, 14],
            "displayCol": [0, 0, 0, 0, 0]
        }))
        .unwrap()
    }

    #[test]
    fn test_table_row_id_found() {
        assert_eq!(table_row_id(&schema_tables(), "ETABLISSEMENTS").unwrap(), 2);
    }

    #[test]
    fn test_table_row_id_missing() {
        assert!(matches!(
            table_row_id(&schema_tables(), "ABSENT"),
            Err(GridlinkError::TableNotFound(t)) if t == "ABSENT"
        ));
    }

    #[test]
    fn test_columns_filtered_by_parent_and_sorted() {
        let columns = columns_from_schema(&schema_columns(), 1);
        let ids: Vec<&str> = columns.iter().map(|c| c.col_id.as_str()).collect();
        assert_eq!(ids, vec!["Etablissement", "Nom", "Prenom", "Total"]);
    }

    #[test]
    fn test_label_falls_back_to_col_id() {
        let columns = columns_from_schema(&schema_columns(), 1);
        let nom = columns.iter().find(|c| c.col_id == "Nom").unwrap();
        assert_eq!(nom.label, "Nom");
        let prenom = columns.iter().find(|c| c.col_id == "Prenom").unwrap();
        assert_eq!(prenom.label, "Prénom");
    }

    #[test]
    fn test_formula_flag_and_pointers() {
        let columns = columns_from_schema(&schema_columns(), 1);
        let total = columns.iter().find(|c| c.col_id == "Total").unwrap();
        assert!(total.is_formula);
        assert!(!total.is_editable());

        let reference = columns.iter().find(|c| c.col_id == "Etablissement").unwrap();
        assert_eq!(reference.col_type, ColType::Ref("ETABLISSEMENTS".into()));
        assert_eq!(reference.visible_col_row_id, Some(14));
        assert_eq!(reference.display_col_row_id, None);
        assert_eq!(reference.options.display_col_hint(), Some("Ville"));
    }

    #[test]
    fn test_col_id_by_row() {
        let lookup = col_id_by_row(&schema_columns());
        assert_eq!(lookup.get(&14).map(String::as_str), Some("Ville"));
        assert_eq!(lookup.get(&11).map(String::as_str), Some("Prenom"));
    }
}
