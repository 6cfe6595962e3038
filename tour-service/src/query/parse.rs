//! Filter key parser
//!
//! Turns query-string keys of the form `field` or `field[op]` into typed
//! [`FilterCondition`]s. The grammar is deliberately small:
//!
//! ```text
//! key      = field [ "[" operator "]" ]
//! field    = 1*( any char except "[" "]" ), not starting with "$"
//! operator = "eq" | "gt" | "gte" | "lt" | "lte"
//! ```

use serde_json::{Number, Value};
use thiserror::Error;

use super::raw::{RawQuery, RawValue};
use crate::repository::{Filter, FilterCondition, FilterOperator};

/// Reasons a query string cannot become a filter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The bracketed sub-key is not a supported operator
    #[error("unknown operator `{operator}` on field `{field}`")]
    UnknownOperator {
        /// Field the operator was applied to
        field: String,
        /// The rejected operator token
        operator: String,
    },

    /// A bracket is unbalanced or trails other text
    #[error("unterminated or misplaced bracket in `{0}`")]
    UnterminatedBracket(String),

    /// More than one bracketed sub-key
    #[error("nested operators are not supported in `{0}`")]
    NestedOperator(String),

    /// The key has no field name
    #[error("empty field name in `{0}`")]
    EmptyField(String),

    /// The field name starts with `$`
    #[error("field `{0}` is not allowed")]
    ReservedField(String),

    /// An operator was given more than one value
    #[error("operator `{operator}` on field `{field}` takes a single value")]
    OperatorOnArray {
        /// Field the operator was applied to
        field: String,
        /// The operator token
        operator: String,
    },
}

/// A parsed filter key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterKey {
    /// Field path
    pub field: String,

    /// Operator token, when the key carried one
    pub operator: Option<String>,
}

/// Split a key into field and optional operator token
///
/// ```rust
/// use tour_service::query::parse_key;
///
/// let key = parse_key("price[gte]").unwrap();
/// assert_eq!(key.field, "price");
/// assert_eq!(key.operator.as_deref(), Some("gte"));
/// assert!(parse_key("price[gte]extra").is_err());
/// ```
pub fn parse_key(key: &str) -> Result<FilterKey, QueryError> {
    let (field, operator) = match key.find('[') {
        None => {
            if key.contains(']') {
                return Err(QueryError::UnterminatedBracket(key.to_string()));
            }
            (key, None)
        }
        Some(open) => {
            let field = &key[..open];
            let rest = &key[open + 1..];
            let close = rest
                .find(']')
                .ok_or_else(|| QueryError::UnterminatedBracket(key.to_string()))?;
            let operator = &rest[..close];
            let trailing = &rest[close + 1..];
            if operator.contains('[') || trailing.starts_with('[') {
                return Err(QueryError::NestedOperator(key.to_string()));
            }
            if !trailing.is_empty() || field.contains(']') {
                return Err(QueryError::UnterminatedBracket(key.to_string()));
            }
            (field, Some(operator))
        }
    };

    let field = field.trim();
    if field.is_empty() {
        return Err(QueryError::EmptyField(key.to_string()));
    }
    if field.starts_with('$') {
        return Err(QueryError::ReservedField(field.to_string()));
    }

    Ok(FilterKey {
        field: field.to_string(),
        operator: operator.map(str::to_string),
    })
}

/// Interpret a query-string value
///
/// `true`/`false` become booleans, finite numerals become numbers, anything
/// else stays a string.
pub fn parse_scalar(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Number(n.into());
    }
    if looks_numeric(raw) {
        if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

fn looks_numeric(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        && raw.chars().any(|c| c.is_ascii_digit())
}

/// Parse one key/value pair into a condition
pub fn parse_condition(key: &str, value: &RawValue) -> Result<FilterCondition, QueryError> {
    let FilterKey { field, operator } = parse_key(key)?;

    let operator = match operator {
        None => None,
        Some(token) => match FilterOperator::from_query_token(&token) {
            Some(op) => Some((op, token)),
            None => {
                return Err(QueryError::UnknownOperator {
                    field,
                    operator: token,
                })
            }
        },
    };

    match (operator, value) {
        (None, RawValue::Single(v)) => Ok(FilterCondition::eq(field, parse_scalar(v))),
        (None, RawValue::Many(vs)) => Ok(FilterCondition::in_values(
            field,
            vs.iter().map(|v| parse_scalar(v)).collect(),
        )),
        (Some((FilterOperator::Eq, _)), RawValue::Many(vs)) => Ok(FilterCondition::in_values(
            field,
            vs.iter().map(|v| parse_scalar(v)).collect(),
        )),
        (Some((op, _)), RawValue::Single(v)) => Ok(FilterCondition::new(field, op, parse_scalar(v))),
        (Some((_, token)), RawValue::Many(_)) => Err(QueryError::OperatorOnArray {
            field,
            operator: token,
        }),
    }
}

/// Parse every non-control key of a raw query into a conjunctive filter
pub fn parse_filter(raw: &RawQuery, control_keys: &[&str]) -> Result<Filter, QueryError> {
    raw.iter()
        .filter(|(key, _)| !control_keys.contains(key))
        .map(|(key, value)| parse_condition(key, value))
        .collect::<Result<Vec<_>, _>>()
        .map(Filter::from_iter)
}
