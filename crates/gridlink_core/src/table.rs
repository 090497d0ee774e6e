//! Columnar table snapshots and row records.
//!
//! Both backend modes exchange table data in the same columnar shape: a
//! mapping from column id to an ordered sequence of cell values, plus a
//! parallel `id` sequence of row identifiers of equal length. The REST
//! surface speaks row-oriented `{id, fields}` records instead; the
//! transposition between the two shapes lives here.

use crate::error::{GridlinkError, Result};
use indexmap::IndexMap;
use serde::de::{Deserializer, Error as DeError, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Column id carrying the row identifiers in the wire shape.
pub const ID_COLUMN: &str = "id";

/// A row-oriented record as the REST surface returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Row identifier.
    pub id: i64,
    /// Field values keyed by column id.
    pub fields: IndexMap<String, Value>,
}

/// A read snapshot of a table in columnar form.
///
/// Invariant: every column holds exactly as many values as there are row
/// ids. Consumers must treat a snapshot as immutable read data; there are
/// no partial or streaming updates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableSnapshot {
    ids: Vec<i64>,
    columns: IndexMap<String, Vec<Value>>,
}

impl TableSnapshot {
    /// Build a snapshot from a row-id sequence and parallel columns.
    ///
    /// # Errors
    ///
    /// Fails with [`GridlinkError::ShapeMismatch`] if any column's length
    /// differs from the id sequence's.
    pub fn from_columns(ids: Vec<i64>, columns: IndexMap<String, Vec<Value>>) -> Result<Self> {
        for (col_id, cells) in &columns {
            if cells.len() != ids.len() {
                return Err(GridlinkError::ShapeMismatch {
                    col_id: col_id.clone(),
                    len: cells.len(),
                    expected: ids.len(),
                });
            }
        }
        Ok(Self { ids, columns })
    }

    /// Transpose row-oriented records into the columnar shape.
    ///
    /// Column order is first-seen order across the records. Records with
    /// heterogeneous field sets are filled with nulls so the length
    /// invariant holds.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut ids = Vec::with_capacity(records.len());
        let mut columns: IndexMap<String, Vec<Value>> = IndexMap::new();
        for (row, record) in records.into_iter().enumerate() {
            ids.push(record.id);
            for (col_id, value) in record.fields {
                let cells = columns.entry(col_id).or_insert_with(|| {
                    // Column first seen on this row: backfill earlier rows.
                    vec![Value::Null; row]
                });
                cells.push(value);
            }
            for cells in columns.values_mut() {
                if cells.len() < row + 1 {
                    cells.push(Value::Null);
                }
            }
        }
        Self { ids, columns }
    }

    /// Row identifiers, in table order.
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// Number of rows in the snapshot.
    pub fn row_count(&self) -> usize {
        self.ids.len()
    }

    /// Column ids, in wire order (excluding the `id` sequence).
    pub fn column_ids(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// The cell values of one column, if present.
    pub fn column(&self, col_id: &str) -> Option<&[Value]> {
        self.columns.get(col_id).map(Vec::as_slice)
    }

    /// The cell at (row id, column id), if both exist.
    pub fn cell(&self, row_id: i64, col_id: &str) -> Option<&Value> {
        let index = self.ids.iter().position(|id| *id == row_id)?;
        self.columns.get(col_id)?.get(index)
    }

    /// Iterate the snapshot back out as row-oriented records.
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        self.ids.iter().enumerate().map(|(index, id)| Record {
            id: *id,
            fields: self
                .columns
                .iter()
                .map(|(col_id, cells)| (col_id.clone(), cells[index].clone()))
                .collect(),
        })
    }
}

// The wire shape is a flat map: {"id": [7, 9], "Nom": ["Dupont", "Martin"]}.

impl Serialize for TableSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len() + 1))?;
        map.serialize_entry(ID_COLUMN, &self.ids)?;
        for (col_id, cells) in &self.columns {
            map.serialize_entry(col_id, cells)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TableSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SnapshotVisitor;

        impl<'de> Visitor<'de> for SnapshotVisitor {
            type Value = TableSnapshot;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column id to cell sequence with an `id` column")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<TableSnapshot, A::Error> {
                let mut ids: Option<Vec<i64>> = None;
                let mut columns: IndexMap<String, Vec<Value>> = IndexMap::new();
                while let Some(key) = access.next_key::<String>()? {
                    if key == ID_COLUMN {
                        ids = Some(access.next_value()?);
                    } else {
                        columns.insert(key, access.next_value()?);
                    }
                }
                let ids = ids.ok_or_else(|| A::Error::missing_field("id"))?;
                TableSnapshot::from_columns(ids, columns)
                    .map_err(|e| A::Error::custom(e.to_string()))
            }
        }

        deserializer.deserialize_map(SnapshotVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: i64, fields: &[(&str, Value)]) -> Record {
        Record {
            id,
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_transpose_records() {
        let snapshot = TableSnapshot::from_records(vec![
            record(7, &[("Nom", json!("Dupont"))]),
            record(9, &[("Nom", json!("Martin"))]),
        ]);
        assert_eq!(snapshot.ids(), &[7, 9]);
        assert_eq!(
            snapshot.column("Nom").unwrap(),
            &[json!("Dupont"), json!("Martin")]
        );
    }

    #[test]
    fn test_transpose_fills_missing_fields_with_null() {
        let snapshot = TableSnapshot::from_records(vec![
            record(1, &[("A", json!("a1"))]),
            record(2, &[("A", json!("a2")), ("B", json!("b2"))]),
            record(3, &[("B", json!("b3"))]),
        ]);
        assert_eq!(snapshot.column("A").unwrap(), &[json!("a1"), json!("a2"), Value::Null]);
        assert_eq!(snapshot.column("B").unwrap(), &[Value::Null, json!("b2"), json!("b3")]);
    }

    #[test]
    fn test_from_columns_rejects_length_mismatch() {
        let mut columns = IndexMap::new();
        columns.insert("Nom".to_string(), vec![json!("x")]);
        let err = TableSnapshot::from_columns(vec![1, 2], columns).unwrap_err();
        assert!(matches!(
            err,
            GridlinkError::ShapeMismatch { len: 1, expected: 2, .. }
        ));
    }

    #[test]
    fn test_cell_lookup_is_by_row_id() {
        let snapshot = TableSnapshot::from_records(vec![
            record(10, &[("Nom", json!("A"))]),
            record(20, &[("Nom", json!("B"))]),
        ]);
        assert_eq!(snapshot.cell(20, "Nom"), Some(&json!("B")));
        assert_eq!(snapshot.cell(30, "Nom"), None);
        assert_eq!(snapshot.cell(10, "Prenom"), None);
    }

    #[test]
    fn test_wire_shape_round_trip() {
        let wire = json!({"id": [7, 9], "Nom": ["Dupont", "Martin"]});
        let snapshot: TableSnapshot = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(snapshot.row_count(), 2);
        assert_eq!(serde_json::to_value(&snapshot).unwrap(), wire);
    }

    #[test]
    fn test_wire_shape_rejects_ragged_columns() {
        let wire = json!({"id": [7, 9], "Nom": ["Dupont"]});
        assert!(serde_json::from_value::<TableSnapshot>(wire).is_err());
    }

    #[test]
    fn test_records_round_trip() {
        let original = vec![
            record(1, &[("A", json!("a")), ("B", json!(2))]),
            record(2, &[("A", json!("aa")), ("B", json!(4))]),
        ];
        let snapshot = TableSnapshot::from_records(original.clone());
        let back: Vec<Record> = snapshot.records().collect();
        assert_eq!(back, original);
    }
}
