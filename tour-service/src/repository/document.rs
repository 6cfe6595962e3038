//! Document representation and value ordering
//!
//! Documents are plain JSON objects. Every stored document carries a string
//! identifier under [`ID_FIELD`] and a revision counter under [`VERSION_FIELD`].

use std::cmp::Ordering;

use serde_json::{Map, Value};

/// A stored document
pub type Document = Map<String, Value>;

/// Field holding the document identifier
pub const ID_FIELD: &str = "_id";

/// Field holding the revision counter
pub const VERSION_FIELD: &str = "__v";

/// Read the identifier of a document
pub fn document_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

/// Resolve a dotted field path (`startLocation.coordinates`) inside a document
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Rank of a JSON type in the cross-type sort order
///
/// Missing and null sort first, then numbers, strings, objects, arrays, booleans.
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Total order over optional JSON values used for sorting
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Array(x)), Some(Value::Array(y))) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ordering = compare_values(Some(left), Some(right));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Compare a stored value with a query operand, casting across scalar types
///
/// Query-string operands arrive as numbers or booleans whenever they look like
/// one, so a stored string `"5"` must still compare against a number `5`.
pub fn compare_scalar(stored: &Value, operand: &Value) -> Option<Ordering> {
    match (stored, operand) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::Number(y)) => x.trim().parse::<f64>().ok()?.partial_cmp(&y.as_f64()?),
        (Value::Number(x), Value::String(y)) => x.as_f64()?.partial_cmp(&y.trim().parse::<f64>().ok()?),
        (Value::String(x), Value::Bool(y)) => Some(x.as_str().cmp(if *y { "true" } else { "false" })),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Loose equality between a stored value and a query operand
pub fn values_equal(stored: &Value, operand: &Value) -> bool {
    match (stored, operand) {
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(_), _) | (_, Value::Object(_)) => stored == operand,
        _ => compare_scalar(stored, operand) == Some(Ordering::Equal),
    }
}
