use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

pub type Row = Map<String, Value>;

/// Stable identity of a row: its `id` field when present, otherwise its
/// position in the original collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(pub String);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

pub fn row_id(row: &Row, index: usize) -> RowId {
    match row.get("id") {
        Some(Value::Null) | None => RowId(format!("#{index}")),
        Some(value) => RowId(stringify(value)),
    }
}

/// Converts typed records into rows. Records that do not serialize to a JSON
/// object land under a single `value` field.
pub fn to_rows<T: Serialize>(items: &[T]) -> serde_json::Result<Vec<Row>> {
    items
        .iter()
        .map(|item| {
            Ok(match serde_json::to_value(item)? {
                Value::Object(map) => map,
                other => {
                    let mut map = Map::new();
                    map.insert("value".to_string(), other);
                    map
                }
            })
        })
        .collect()
}

/// Display form of a cell value. `null` is the empty string.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Orders two defined values: numerically when both are numbers, otherwise
/// by their display form, case-insensitively first.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    if let (Value::Number(left), Value::Number(right)) = (a, b) {
        return compare_numbers(left, right);
    }

    let left = stringify(a);
    let right = stringify(b);
    left.to_lowercase()
        .cmp(&right.to_lowercase())
        .then_with(|| left.cmp(&right))
}

/// Integers compare exactly; `f64` is only used when a float is involved.
fn compare_numbers(left: &Number, right: &Number) -> Ordering {
    match (left.as_i64(), right.as_i64(), left.as_u64(), right.as_u64()) {
        (Some(l), Some(r), _, _) => l.cmp(&r),
        (_, _, Some(l), Some(r)) => l.cmp(&r),
        // One side is a negative i64 and the other a u64 above i64::MAX.
        (Some(_), None, None, Some(_)) => Ordering::Less,
        (None, Some(_), Some(_), None) => Ordering::Greater,
        _ => {
            let l = left.as_f64().unwrap_or(f64::NAN);
            let r = right.as_f64().unwrap_or(f64::NAN);
            l.partial_cmp(&r).unwrap_or(Ordering::Equal)
        }
    }
}
