//! Cell values and the tagged list-cell codec.
//!
//! Multi-valued cells (choice lists, reference lists, attachment lists)
//! travel on the wire as a tagged array whose first element is the literal
//! `"L"`, followed by the member values: strings for choices, numbers for
//! references and attachments. Single-valued cells are plain JSON scalars.
//!
//! Application code never passes raw tagged arrays around; it works with
//! [`CellValue`], a sum type over the two shapes, and converts at the wire
//! boundary with [`CellValue::from_wire`] / [`CellValue::to_wire`] (or the
//! lower-level [`decode_list_cell`] / [`encode_list_cell`] helpers).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Wire tag marking a multi-valued cell.
pub const LIST_TAG: &str = "L";

/// A single cell of a grid document: either a scalar or a list.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Single-valued cell (string, number, bool, or null).
    Scalar(Value),
    /// Multi-valued cell (choice list, reference list, attachments).
    List(Vec<Value>),
}

impl CellValue {
    /// Decode a wire value into a cell value.
    ///
    /// Tagged arrays become [`CellValue::List`]; untagged arrays are
    /// accepted as lists too (legacy/loose shapes); everything else is a
    /// scalar.
    pub fn from_wire(value: Value) -> Self {
        match value {
            Value::Array(_) => CellValue::List(decode_list_cell(value)),
            other => CellValue::Scalar(other),
        }
    }

    /// Encode this cell back to its wire form.
    ///
    /// Lists always re-gain the `"L"` tag; scalars pass through.
    pub fn to_wire(&self) -> Value {
        match self {
            CellValue::Scalar(v) => v.clone(),
            CellValue::List(vs) => encode_list_cell(vs),
        }
    }

    /// The cell's values as a sequence, regardless of shape.
    ///
    /// A list yields its members; a non-null scalar yields a singleton;
    /// null yields nothing.
    pub fn values(&self) -> Vec<Value> {
        match self {
            CellValue::List(vs) => vs.clone(),
            CellValue::Scalar(Value::Null) => Vec::new(),
            CellValue::Scalar(v) => vec![v.clone()],
        }
    }

    /// True if the cell holds no value at all.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Scalar(Value::Null) => true,
            CellValue::Scalar(_) => false,
            CellValue::List(vs) => vs.is_empty(),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(CellValue::from_wire(Value::deserialize(deserializer)?))
    }
}

/// Decode a wire cell into its member values.
///
/// - array tagged `"L"` at index 0: the remainder;
/// - array without the tag: returned as-is (defensive, accepts
///   legacy/loose shapes);
/// - null: empty sequence;
/// - any other scalar: singleton sequence.
pub fn decode_list_cell(cell: Value) -> Vec<Value> {
    match cell {
        Value::Array(mut items) => {
            if items.first().and_then(Value::as_str) == Some(LIST_TAG) {
                items.remove(0);
            }
            items
        }
        Value::Null => Vec::new(),
        scalar => vec![scalar],
    }
}

/// Encode member values as a tagged wire cell: always `["L", ...values]`.
pub fn encode_list_cell(values: &[Value]) -> Value {
    let mut items = Vec::with_capacity(values.len() + 1);
    items.push(Value::String(LIST_TAG.to_string()));
    items.extend(values.iter().cloned());
    Value::Array(items)
}
