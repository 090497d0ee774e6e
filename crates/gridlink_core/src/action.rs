//! User-action tuples and per-action results.
//!
//! Document mutations travel as the platform's tuple shape:
//!
//! ```text
//! ["AddRecord",    tableId, null,  {col: value, ...}]
//! ["UpdateRecord", tableId, rowId, {col: value, ...}]
//! ```
//!
//! Only those two kinds exist on this surface. Anything else fails to
//! decode with [`GridlinkError::UnsupportedAction`] before any I/O is
//! attempted for the batch.

use crate::error::{GridlinkError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Field values for one row, keyed by column id, in insertion order.
pub type FieldMap = IndexMap<String, Value>;

/// A single document mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    /// Create a row with the given fields; the backend assigns the id.
    AddRecord {
        /// Target table id.
        table_id: String,
        /// Initial field values.
        fields: FieldMap,
    },
    /// Update the fields of an existing row.
    UpdateRecord {
        /// Target table id.
        table_id: String,
        /// Row to update.
        row_id: i64,
        /// Changed field values.
        fields: FieldMap,
    },
}

impl UserAction {
    /// Shorthand for an `AddRecord` action.
    pub fn add(table_id: impl Into<String>, fields: FieldMap) -> Self {
        UserAction::AddRecord {
            table_id: table_id.into(),
            fields,
        }
    }

    /// Shorthand for an `UpdateRecord` action.
    pub fn update(table_id: impl Into<String>, row_id: i64, fields: FieldMap) -> Self {
        UserAction::UpdateRecord {
            table_id: table_id.into(),
            row_id,
            fields,
        }
    }

    /// The action kind as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            UserAction::AddRecord { .. } => "AddRecord",
            UserAction::UpdateRecord { .. } => "UpdateRecord",
        }
    }

    /// The table this action targets.
    pub fn table_id(&self) -> &str {
        match self {
            UserAction::AddRecord { table_id, .. }
            | UserAction::UpdateRecord { table_id, .. } => table_id,
        }
    }

    /// Encode to the wire tuple.
    pub fn to_wire(&self) -> Value {
        match self {
            UserAction::AddRecord { table_id, fields } => serde_json::json!([
                "AddRecord",
                table_id,
                Value::Null,
                fields,
            ]),
            UserAction::UpdateRecord {
                table_id,
                row_id,
                fields,
            } => serde_json::json!(["UpdateRecord", table_id, row_id, fields]),
        }
    }

    /// Decode a wire tuple.
    ///
    /// # Errors
    ///
    /// [`GridlinkError::UnsupportedAction`] for any kind outside
    /// `{AddRecord, UpdateRecord}`; [`GridlinkError::Transport`] for
    /// tuples that are not the expected shape at all.
    pub fn from_wire(value: &Value) -> Result<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| GridlinkError::Transport("action is not a tuple".to_string()))?;
        let kind = items
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| GridlinkError::Transport("action tuple has no kind".to_string()))?;
        match kind {
            "AddRecord" => {
                let (table_id, fields) = split_tuple(items)?;
                Ok(UserAction::AddRecord { table_id, fields })
            }
            "UpdateRecord" => {
                let row_id = items.get(2).and_then(Value::as_i64).ok_or_else(|| {
                    GridlinkError::Transport("UpdateRecord tuple has no row id".to_string())
                })?;
                let (table_id, fields) = split_tuple(items)?;
                Ok(UserAction::UpdateRecord {
                    table_id,
                    row_id,
                    fields,
                })
            }
            other => Err(GridlinkError::UnsupportedAction(other.to_string())),
        }
    }

    /// Decode a whole batch, failing on the first bad tuple.
    ///
    /// Decoding the batch up front is what guarantees an unsupported kind
    /// fails before any I/O happens for any tuple.
    pub fn from_wire_batch(values: &[Value]) -> Result<Vec<Self>> {
        values.iter().map(UserAction::from_wire).collect()
    }
}

fn split_tuple(items: &[Value]) -> Result<(String, FieldMap)> {
    let table_id = items
        .get(1)
        .and_then(Value::as_str)
        .ok_or_else(|| GridlinkError::Transport("action tuple has no table id".to_string()))?
        .to_string();
    let fields = items
        .get(3)
        .cloned()
        .map(serde_json::from_value::<FieldMap>)
        .transpose()?
        .ok_or_else(|| GridlinkError::Transport("action tuple has no field map".to_string()))?;
    Ok((table_id, fields))
}

impl Serialize for UserAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UserAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        UserAction::from_wire(&value).map_err(serde::de::Error::custom)
    }
}

/// Per-action return value from `apply_user_actions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionResult {
    /// The affected row id (created id for adds, updated id for updates).
    RowId(i64),
    /// Any other backend return value, carried through untouched.
    Other(Value),
}

impl ActionResult {
    /// The affected row id, if this result carries one.
    pub fn row_id(&self) -> Option<i64> {
        match self {
            ActionResult::RowId(id) => Some(*id),
            ActionResult::Other(value) => value.as_i64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, Value)]) -> FieldMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_add_record_wire_shape() {
        let action = UserAction::add("CANDIDATS", fields(&[("Prenom", json!("Ana"))]));
        assert_eq!(
            action.to_wire(),
            json!(["AddRecord", "CANDIDATS", null, {"Prenom": "Ana"}])
        );
    }

    #[test]
    fn test_update_record_wire_shape() {
        let action = UserAction::update("CANDIDATS", 7, fields(&[("Nom", json!("Martin"))]));
        assert_eq!(
            action.to_wire(),
            json!(["UpdateRecord", "CANDIDATS", 7, {"Nom": "Martin"}])
        );
    }

    #[test]
    fn test_wire_round_trip() {
        let actions = vec![
            UserAction::add("T", fields(&[("A", json!(1))])),
            UserAction::update("T", 3, fields(&[("A", json!(2)), ("B", json!("x"))])),
        ];
        for action in actions {
            assert_eq!(UserAction::from_wire(&action.to_wire()).unwrap(), action);
        }
    }

    #[test]
    fn test_unsupported_kind_is_rejected() {
        let err = UserAction::from_wire(&json!(["DeleteRecord", "T", 1])).unwrap_err();
        match err {
            GridlinkError::UnsupportedAction(kind) => assert_eq!(kind, "DeleteRecord"),
            other => panic!("expected UnsupportedAction, got {other:?}"),
        }
    }

    #[test]
    fn test_batch_decode_fails_on_first_bad_tuple() {
        let batch = vec![
            json!(["AddRecord", "T", null, {"A": 1}]),
            json!(["BulkRemoveRecord", "T", [1, 2]]),
        ];
        assert!(matches!(
            UserAction::from_wire_batch(&batch),
            Err(GridlinkError::UnsupportedAction(_))
        ));
    }

    #[test]
    fn test_action_result_row_id() {
        assert_eq!(ActionResult::RowId(42).row_id(), Some(42));
        assert_eq!(ActionResult::Other(json!({"ok": true})).row_id(), None);
        let decoded: ActionResult = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(decoded, ActionResult::RowId(42));
    }
}
