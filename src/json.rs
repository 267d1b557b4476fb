//! JSON output contract: serializes an exported [`Record`] tree into the
//! documented shape. Each node is an object keyed by lowercased column
//! names; values are JSON primitives for scalar cells, and a node that
//! has any cell carrying nested rows also gets one additional `subRow`
//! key — a map from child-table-name to an array of child nodes, merged
//! across every cell of that node rather than nested per-column.
//!
//! `serde_json::Value` is built directly rather than via a single
//! `#[derive(Serialize)]` struct, since the shape (an optional,
//! dynamically-keyed `subRow` sibling per node) doesn't map onto one.

use crate::model::{CellValue, Record};
use serde_json::{Map, Number, Value};

/// Renders one export tree as a `serde_json::Value`.
pub fn to_value(record: &Record) -> Value {
    let mut node = Map::with_capacity(record.cells.len() + 1);
    let mut sub_row = Map::new();

    for cell in &record.cells {
        node.insert(cell.name.clone(), cell_value_to_json(&cell.value));

        for (table, children) in &cell.sub_rows {
            let entries = children.iter().map(to_value).collect();
            sub_row.insert(table.clone(), Value::Array(entries));
        }
    }

    if !sub_row.is_empty() {
        node.insert("subRow".to_string(), Value::Object(sub_row));
    }

    Value::Object(node)
}

/// Pretty-printed JSON for the root of an export.
pub fn to_string_pretty(record: &Record) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&to_value(record))
}

/// Compact JSON for the root of an export.
pub fn to_string(record: &Record) -> serde_json::Result<String> {
    serde_json::to_string(&to_value(record))
}

fn cell_value_to_json(value: &CellValue) -> Value {
    match value {
        CellValue::Null => Value::Null,
        CellValue::Bool(b) => Value::Bool(*b),
        CellValue::Int(i) => Value::Number(Number::from(*i)),
        CellValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        CellValue::Text(s) => Value::String(s.clone()),
        CellValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        CellValue::DateTime(dt) => Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
    }
}
