//! Spreadsheet formatting of serialized records.
//!
//! Records arrive as ordered JSON objects. Each field is rendered according
//! to the [`FieldKind`] its resource's [`ExportSchema`] assigns it; fields
//! the schema does not know are passed through unchanged.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::util::title_case;

/// How a field is rendered in a spreadsheet cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `"True"` / `"False"` by truthiness.
    Boolean,
    /// A list of related records joined with `", "`.
    ManyToMany,
    /// A stored value mapped through a label table. Unmapped values render `"Unknown"`.
    Choice(&'static [(i64, &'static str)]),
    /// Left as is.
    Passthrough,
}

/// Field kinds for one exportable resource.
#[derive(Debug, Clone, Copy)]
pub struct ExportSchema {
    fields: &'static [(&'static str, FieldKind)],
}

impl ExportSchema {
    #[must_use]
    pub const fn new(fields: &'static [(&'static str, FieldKind)]) -> Self {
        Self { fields }
    }

    /// Kind of a field, `Passthrough` when the schema does not list it.
    #[must_use]
    pub fn kind(&self, field: &str) -> FieldKind {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map_or(FieldKind::Passthrough, |(_, kind)| *kind)
    }

    /// Field names in schema order.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|(name, _)| *name)
    }
}

/// One spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

/// A formatted table ready to be written out.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Formats records for one export, caching the kind of every field seen.
#[derive(Debug)]
pub struct Formatter<'a> {
    schema: &'a ExportSchema,
    kinds: HashMap<String, FieldKind>,
}

impl<'a> Formatter<'a> {
    #[must_use]
    pub fn new(schema: &'a ExportSchema) -> Self {
        Self {
            schema,
            kinds: HashMap::new(),
        }
    }

    fn kind(&mut self, field: &str) -> FieldKind {
        if let Some(kind) = self.kinds.get(field) {
            return *kind;
        }
        let kind = self.schema.kind(field);
        self.kinds.insert(field.to_string(), kind);
        kind
    }

    /// Render a single value of `field`.
    pub fn format_value(&mut self, field: &str, value: &Value) -> Cell {
        match self.kind(field) {
            FieldKind::Boolean => Cell::Text(python_bool(truthy(value)).to_string()),
            FieldKind::ManyToMany => match value {
                Value::Array(items) => Cell::Text(
                    items
                        .iter()
                        .map(related_label)
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
                other => passthrough(other),
            },
            FieldKind::Choice(table) => {
                let label = value
                    .as_i64()
                    .and_then(|v| table.iter().find(|(key, _)| *key == v))
                    .map_or("Unknown", |(_, label)| *label);
                Cell::Text(label.to_string())
            }
            FieldKind::Passthrough => passthrough(value),
        }
    }

    /// Format a collection of records into a table.
    ///
    /// Columns follow the key order of the first record. Keys missing from a
    /// later record leave an empty cell.
    pub fn format_records(&mut self, records: &[Map<String, Value>]) -> Table {
        let columns: Vec<String> = records
            .first()
            .map(|first| first.keys().cloned().collect())
            .unwrap_or_default();

        let headers = columns.iter().map(|c| title_case(c)).collect();
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| {
                        record
                            .get(column)
                            .map_or(Cell::Empty, |value| self.format_value(column, value))
                    })
                    .collect()
            })
            .collect();

        Table { headers, rows }
    }

    /// Number of distinct fields whose kind has been resolved.
    #[must_use]
    pub fn resolved_fields(&self) -> usize {
        self.kinds.len()
    }
}

const fn python_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        Value::Bool(b) => python_bool(*b).to_string(),
        other => other.to_string(),
    }
}

/// Label of one related record: its only value, or its first non-`id` field.
fn related_label(item: &Value) -> String {
    match item {
        Value::Object(map) if map.len() == 1 => map.values().next().map(stringify).unwrap_or_default(),
        Value::Object(map) => map
            .iter()
            .find(|(key, _)| key.as_str() != "id")
            .map(|(_, value)| stringify(value))
            .unwrap_or_default(),
        other => stringify(other),
    }
}

fn passthrough(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Empty,
        Value::Bool(b) => Cell::Bool(*b),
        Value::Number(n) => n.as_f64().map_or_else(|| Cell::Text(n.to_string()), Cell::Number),
        Value::String(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SCHEMA: ExportSchema = ExportSchema::new(&[
        ("active", FieldKind::Boolean),
        ("tags", FieldKind::ManyToMany),
        ("size", FieldKind::Choice(&[(1, "1-20"), (2, "21-50")])),
        ("name", FieldKind::Passthrough),
    ]);

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_boolean_renders_python_style() {
        let mut f = Formatter::new(&SCHEMA);
        assert_eq!(f.format_value("active", &json!(true)), Cell::Text("True".into()));
        assert_eq!(f.format_value("active", &json!(false)), Cell::Text("False".into()));
        assert_eq!(f.format_value("active", &json!(null)), Cell::Text("False".into()));
        assert_eq!(f.format_value("active", &json!(1)), Cell::Text("True".into()));
    }

    #[test]
    fn test_choice_maps_and_falls_back_to_unknown() {
        let mut f = Formatter::new(&SCHEMA);
        assert_eq!(f.format_value("size", &json!(2)), Cell::Text("21-50".into()));
        assert_eq!(f.format_value("size", &json!(9)), Cell::Text("Unknown".into()));
        assert_eq!(f.format_value("size", &json!(null)), Cell::Text("Unknown".into()));
    }

    #[test]
    fn test_many_to_many_labels() {
        let mut f = Formatter::new(&SCHEMA);
        let tags = json!([
            {"name": "Arts"},
            {"id": 7, "name": "Music", "color": "red"},
            "Loose",
            3
        ]);
        assert_eq!(
            f.format_value("tags", &tags),
            Cell::Text("Arts, Music, Loose, 3".into())
        );
        assert_eq!(f.format_value("tags", &json!([])), Cell::Text(String::new()));
        // Not a list: left alone.
        assert_eq!(f.format_value("tags", &json!("x")), Cell::Text("x".into()));
    }

    #[test]
    fn test_unknown_field_passes_through() {
        let mut f = Formatter::new(&SCHEMA);
        assert_eq!(f.format_value("mystery", &json!(4.5)), Cell::Number(4.5));
        assert_eq!(f.format_value("mystery", &json!(true)), Cell::Bool(true));
        assert_eq!(f.format_value("mystery", &json!(null)), Cell::Empty);
        assert_eq!(
            f.format_value("mystery", &json!({"a": 1})),
            Cell::Text(r#"{"a":1}"#.into())
        );
    }

    #[test]
    fn test_format_records_headers_and_cache() {
        let records = vec![
            record(json!({"name": "Chess", "active": true, "accepting_members": false})),
            record(json!({"name": "Go", "active": false})),
        ];
        let mut f = Formatter::new(&SCHEMA);
        let table = f.format_records(&records);

        assert_eq!(table.headers, vec!["Name", "Active", "Accepting Members"]);
        assert_eq!(
            table.rows[0],
            vec![
                Cell::Text("Chess".into()),
                Cell::Text("True".into()),
                Cell::Bool(false)
            ]
        );
        assert_eq!(table.rows[1][2], Cell::Empty);
        // Each distinct field is resolved once.
        assert_eq!(f.resolved_fields(), 3);
    }

    #[test]
    fn test_empty_export() {
        let table = Formatter::new(&SCHEMA).format_records(&[]);
        assert!(table.headers.is_empty());
        assert!(table.rows.is_empty());
    }
}
