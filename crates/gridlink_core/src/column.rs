//! Column descriptors and widget options.
//!
//! A column descriptor is the per-column slice of a table's schema the
//! widgets care about: id, label, type, the raw `widgetOptions` JSON blob
//! and its parsed form, the formula flag, and the display-column pointers
//! used to resolve reference labels.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Column ids that are never editable regardless of type: the row id,
/// the manual sort order, and the audit timestamps.
pub const PROTECTED_COL_IDS: [&str; 4] = ["id", "manualSort", "createdAt", "updatedAt"];

/// Parsed column type.
///
/// Keeps enough structure to route behavior (references, lists, dates);
/// unrecognized type strings are carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColType {
    /// Plain text.
    Text,
    /// Floating-point number.
    Numeric,
    /// Integer.
    Int,
    /// Boolean toggle.
    Bool,
    /// Calendar date.
    Date,
    /// Date and time in the given timezone.
    DateTime(String),
    /// Single choice from a fixed set.
    Choice,
    /// Multiple choices from a fixed set (list cell).
    ChoiceList,
    /// Reference to a row of the named table.
    Ref(String),
    /// References to rows of the named table (list cell).
    RefList(String),
    /// Attachment ids (list cell).
    Attachments,
    /// Any type string this layer does not interpret.
    Other(String),
}

impl ColType {
    /// Parse a platform type string such as `Ref:Etablissements` or
    /// `DateTime:Europe/Paris`.
    pub fn parse(raw: &str) -> Self {
        if let Some(table) = raw.strip_prefix("Ref:") {
            return ColType::Ref(table.to_string());
        }
        if let Some(table) = raw.strip_prefix("RefList:") {
            return ColType::RefList(table.to_string());
        }
        if let Some(tz) = raw.strip_prefix("DateTime:") {
            return ColType::DateTime(tz.to_string());
        }
        match raw {
            "Text" => ColType::Text,
            "Numeric" => ColType::Numeric,
            "Int" => ColType::Int,
            "Bool" => ColType::Bool,
            "Date" => ColType::Date,
            "Choice" => ColType::Choice,
            "ChoiceList" => ColType::ChoiceList,
            "Attachments" => ColType::Attachments,
            other => ColType::Other(other.to_string()),
        }
    }

    /// The table a reference column points at, if this is one.
    pub fn ref_table(&self) -> Option<&str> {
        match self {
            ColType::Ref(table) | ColType::RefList(table) => Some(table),
            _ => None,
        }
    }

    /// True for types whose cells are list cells on the wire.
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            ColType::ChoiceList | ColType::RefList(_) | ColType::Attachments
        )
    }
}

impl fmt::Display for ColType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ColType::Text => f.write_str("Text"),
            ColType::Numeric => f.write_str("Numeric"),
            ColType::Int => f.write_str("Int"),
            ColType::Bool => f.write_str("Bool"),
            ColType::Date => f.write_str("Date"),
            ColType::DateTime(tz) => write!(f, "DateTime:{}", tz),
            ColType::Choice => f.write_str("Choice"),
            ColType::ChoiceList => f.write_str("ChoiceList"),
            ColType::Ref(table) => write!(f, "Ref:{}", table),
            ColType::RefList(table) => write!(f, "RefList:{}", table),
            ColType::Attachments => f.write_str("Attachments"),
            ColType::Other(raw) => f.write_str(raw),
        }
    }
}

impl FromStr for ColType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ColType::parse(s))
    }
}

impl Serialize for ColType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ColType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ColType::parse(&raw))
    }
}

/// Decoded `widgetOptions` blob.
///
/// The blob is free-form JSON maintained by the host platform's editors;
/// this wrapper keeps the raw object and exposes the handful of keys the
/// widgets read. Invalid JSON degrades to an empty options object rather
/// than failing the page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetOptions(Map<String, Value>);

impl WidgetOptions {
    /// Parse a raw `widgetOptions` string; anything unparseable (or not a
    /// JSON object) yields empty options.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => WidgetOptions(map),
            _ => WidgetOptions::default(),
        }
    }

    /// Raw access to an option key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The configured choice labels, for `Choice`/`ChoiceList` columns.
    pub fn choices(&self) -> Vec<&str> {
        self.0
            .get("choices")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// The display-column name hinted by the options, under any of the
    /// aliases the platform's editors have used over time.
    pub fn display_col_hint(&self) -> Option<&str> {
        ["visibleCol", "displayCol", "showColumn", "visibleColumn"]
            .iter()
            .find_map(|key| self.0.get(*key).and_then(Value::as_str))
    }

    /// True if no options were configured (or the blob was unparseable).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One column of a table's schema, as the widgets see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column id, unique within its table.
    #[serde(rename = "colId")]
    pub col_id: String,
    /// Human-readable label (falls back to the col id upstream).
    pub label: String,
    /// Parsed column type.
    #[serde(rename = "type")]
    pub col_type: ColType,
    /// Raw `widgetOptions` JSON blob, kept verbatim for round-tripping.
    #[serde(rename = "widgetOptions", default)]
    pub widget_options: String,
    /// Decoded widget options (empty when the blob is invalid).
    #[serde(skip)]
    pub options: WidgetOptions,
    /// True for formula columns, which are never editable.
    #[serde(rename = "isFormula", default)]
    pub is_formula: bool,
    /// Optional column description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Internal row id of the column shown for reference values.
    #[serde(rename = "visibleCol", default, skip_serializing_if = "Option::is_none")]
    pub visible_col_row_id: Option<i64>,
    /// Internal row id of the helper display column, if any.
    #[serde(rename = "displayCol", default, skip_serializing_if = "Option::is_none")]
    pub display_col_row_id: Option<i64>,
}

impl ColumnDescriptor {
    /// Build a descriptor, parsing the type string and options blob.
    pub fn new(col_id: impl Into<String>, label: impl Into<String>, col_type: &str) -> Self {
        ColumnDescriptor {
            col_id: col_id.into(),
            label: label.into(),
            col_type: ColType::parse(col_type),
            widget_options: String::new(),
            options: WidgetOptions::default(),
            is_formula: false,
            description: None,
            visible_col_row_id: None,
            display_col_row_id: None,
        }
    }

    /// Attach a raw `widgetOptions` blob, parsing it leniently.
    pub fn with_widget_options(mut self, raw: impl Into<String>) -> Self {
        self.widget_options = raw.into();
        self.options = WidgetOptions::parse(&self.widget_options);
        self
    }

    /// Re-derive `options` from the raw blob. Needed after deserializing,
    /// since the parsed form is not part of the wire shape.
    pub fn reparse_options(&mut self) {
        self.options = WidgetOptions::parse(&self.widget_options);
    }

    /// A column is editable iff it is not a formula column and not one of
    /// the protected bookkeeping columns.
    pub fn is_editable(&self) -> bool {
        !self.is_formula && !PROTECTED_COL_IDS.contains(&self.col_id.as_str())
    }
}

/// Sort descriptors ascending by column id (stable, deterministic UI order).
pub fn sort_by_col_id(columns: &mut [ColumnDescriptor]) {
    columns.sort_by(|a, b| a.col_id.cmp(&b.col_id));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_col_type_parse() {
        assert_eq!(ColType::parse("Text"), ColType::Text);
        assert_eq!(ColType::parse("Ref:Etablissements"), ColType::Ref("Etablissements".into()));
        assert_eq!(ColType::parse("RefList:Contacts"), ColType::RefList("Contacts".into()));
        assert_eq!(
            ColType::parse("DateTime:Europe/Paris"),
            ColType::DateTime("Europe/Paris".into())
        );
        assert_eq!(ColType::parse("SomethingNew"), ColType::Other("SomethingNew".into()));
    }

    #[test]
    fn test_col_type_display_round_trip() {
        for raw in ["Text", "Ref:T", "RefList:T", "DateTime:UTC", "Attachments", "Weird:Thing"] {
            assert_eq!(ColType::parse(raw).to_string(), raw);
        }
    }

    #[test]
    fn test_list_types() {
        assert!(ColType::ChoiceList.is_list());
        assert!(ColType::RefList("T".into()).is_list());
        assert!(ColType::Attachments.is_list());
        assert!(!ColType::Choice.is_list());
        assert!(!ColType::Ref("T".into()).is_list());
    }

    #[test]
    fn test_widget_options_invalid_json_degrades_to_empty() {
        let options = WidgetOptions::parse("{not json");
        assert!(options.is_empty());
        assert_eq!(options.display_col_hint(), None);
        // Non-object JSON degrades too.
        assert!(WidgetOptions::parse("[1,2]").is_empty());
    }

    #[test]
    fn test_widget_options_choices_and_hint() {
        let options = WidgetOptions::parse(r#"{"choices":["A","B"],"showColumn":"Nom"}"#);
        assert_eq!(options.choices(), vec!["A", "B"]);
        assert_eq!(options.display_col_hint(), Some("Nom"));
    }

    #[test]
    fn test_display_col_hint_alias_priority() {
        let options =
            WidgetOptions::parse(r#"{"visibleColumn":"Last","visibleCol":"First"}"#);
        assert_eq!(options.display_col_hint(), Some("First"));
        // Numeric row-id values under the alias keys are ignored.
        let options = WidgetOptions::parse(r#"{"visibleCol":12,"displayCol":"Nom"}"#);
        assert_eq!(options.display_col_hint(), Some("Nom"));
    }

    #[test]
    fn test_editability() {
        let plain = ColumnDescriptor::new("Prenom", "Prénom", "Text");
        assert!(plain.is_editable());

        let mut formula = ColumnDescriptor::new("Total", "Total", "Numeric");
        formula.is_formula = true;
        assert!(!formula.is_editable());

        for protected in PROTECTED_COL_IDS {
            let column = ColumnDescriptor::new(protected, protected, "Text");
            assert!(!column.is_editable(), "{protected} must not be editable");
        }
    }

    #[test]
    fn test_sort_by_col_id() {
        let mut columns = vec![
            ColumnDescriptor::new("b", "B", "Text"),
            ColumnDescriptor::new("a", "A", "Text"),
            ColumnDescriptor::new("c", "C", "Text"),
        ];
        sort_by_col_id(&mut columns);
        let order: Vec<&str> = columns.iter().map(|c| c.col_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_descriptor_serde_reparse() {
        let wire = serde_json::json!({
            "colId": "Statut",
            "label": "Statut",
            "type": "Choice",
            "widgetOptions": r#"{"choices":["Ouvert","Clos"]}"#,
            "isFormula": false
        });
        let mut column: ColumnDescriptor = serde_json::from_value(wire).unwrap();
        assert!(column.options.is_empty());
        column.reparse_options();
        assert_eq!(column.options.choices(), vec!["Ouvert", "Clos"]);
    }
}
