//! JSON value helpers shared by the predicate engine.

use serde_json::Value;
use std::cmp::Ordering;

/// Walk a document value along an already-split path.
///
/// The leading `value` segment has been stripped by the parser; the
/// remaining segments index JSON objects only (no array indexing). A
/// missing segment or a non-object node yields `None`, which the
/// evaluator treats as JSON null.
pub fn resolve_path<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = value;
    for segment in path {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

/// Numeric comparison of two JSON values.
///
/// Returns `None` when either side is not a JSON number; ordering
/// comparisons on non-numeric values are false, never an error.
pub fn compare_numbers(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => {
            let f1 = n1.as_f64()?;
            let f2 = n2.as_f64()?;
            f1.partial_cmp(&f2)
        }
        _ => None,
    }
}
