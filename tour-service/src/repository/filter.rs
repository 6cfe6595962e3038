//! Filter predicates for document queries
//!
//! A [`Filter`] is a conjunction of [`FilterCondition`]s. Each condition names a
//! field, a comparison operator and a JSON operand.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tour_service::repository::{Filter, FilterCondition};
//!
//! let filter = Filter::new()
//!     .and(FilterCondition::gte("price", 100))
//!     .and(FilterCondition::eq("difficulty", "easy"));
//!
//! let doc = json!({"price": 497, "difficulty": "easy"});
//! assert!(filter.matches(doc.as_object().unwrap()));
//! ```

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use super::document::{compare_scalar, get_path, values_equal, Document};

/// Comparison operators for filter conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Not equal to
    Ne,
    /// Greater than
    Gt,
    /// Greater than or equal to
    Gte,
    /// Less than
    Lt,
    /// Less than or equal to
    Lte,
    /// Equal to any value in a list
    In,
}

impl FilterOperator {
    /// Parse a query-string operator token (`gte`, `lt`, ...)
    ///
    /// Only the operators a client may use are accepted; `ne` and `in` are
    /// produced internally.
    pub fn from_query_token(token: &str) -> Option<Self> {
        match token {
            "eq" => Some(Self::Eq),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            _ => None,
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "eq"),
            Self::Ne => write!(f, "ne"),
            Self::Gt => write!(f, "gt"),
            Self::Gte => write!(f, "gte"),
            Self::Lt => write!(f, "lt"),
            Self::Lte => write!(f, "lte"),
            Self::In => write!(f, "in"),
        }
    }
}

/// A single filter condition
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    /// The field path to filter on
    pub field: String,

    /// The comparison operator
    pub operator: FilterOperator,

    /// The operand to compare against
    pub value: Value,
}

impl FilterCondition {
    /// Create a new filter condition
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Create an equality condition
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    /// Create a not-equal condition
    ///
    /// A document without the field satisfies `ne`.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Ne, value)
    }

    /// Create a greater-than condition
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Gt, value)
    }

    /// Create a greater-than-or-equal condition
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Gte, value)
    }

    /// Create a less-than condition
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Lt, value)
    }

    /// Create a less-than-or-equal condition
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Lte, value)
    }

    /// Create a membership condition
    pub fn in_values(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, FilterOperator::In, Value::Array(values))
    }

    /// Evaluate the condition against a document
    ///
    /// Equality against an array field matches when any element is equal.
    pub fn matches(&self, doc: &Document) -> bool {
        let stored = get_path(doc, &self.field);
        match self.operator {
            FilterOperator::Eq => stored.is_some_and(|v| equals_or_contains(v, &self.value)),
            FilterOperator::Ne => !stored.is_some_and(|v| equals_or_contains(v, &self.value)),
            FilterOperator::In => match (&self.value, stored) {
                (Value::Array(candidates), Some(v)) => {
                    candidates.iter().any(|candidate| equals_or_contains(v, candidate))
                }
                _ => false,
            },
            FilterOperator::Gt => self.ordered(stored, |o| o == Ordering::Greater),
            FilterOperator::Gte => self.ordered(stored, |o| o != Ordering::Less),
            FilterOperator::Lt => self.ordered(stored, |o| o == Ordering::Less),
            FilterOperator::Lte => self.ordered(stored, |o| o != Ordering::Greater),
        }
    }

    fn ordered(&self, stored: Option<&Value>, accept: impl Fn(Ordering) -> bool) -> bool {
        match stored {
            Some(Value::Array(items)) => items
                .iter()
                .any(|item| compare_scalar(item, &self.value).is_some_and(&accept)),
            Some(value) => compare_scalar(value, &self.value).is_some_and(accept),
            None => false,
        }
    }
}

fn equals_or_contains(stored: &Value, operand: &Value) -> bool {
    if values_equal(stored, operand) {
        return true;
    }
    match (stored, operand) {
        (Value::Array(items), operand) if !operand.is_array() => {
            items.iter().any(|item| values_equal(item, operand))
        }
        _ => false,
    }
}

/// A conjunction of filter conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<FilterCondition>,
}

impl Filter {
    /// Create an empty filter that matches every document
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition
    #[must_use]
    pub fn and(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Merge another filter into this one
    #[must_use]
    pub fn merge(mut self, other: Filter) -> Self {
        self.conditions.extend(other.conditions);
        self
    }

    /// Borrow the conditions in evaluation order
    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    /// True when the filter has no conditions
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate the filter against a document
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|condition| condition.matches(doc))
    }
}

impl From<FilterCondition> for Filter {
    fn from(condition: FilterCondition) -> Self {
        Self::new().and(condition)
    }
}

impl FromIterator<FilterCondition> for Filter {
    fn from_iter<I: IntoIterator<Item = FilterCondition>>(iter: I) -> Self {
        Self {
            conditions: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tour() -> Document {
        json!({
            "name": "The Sea Explorer",
            "price": 497,
            "difficulty": "medium",
            "secretTour": false,
            "guides": ["user_a", "user_b"],
            "startDates": ["2021-06-19T09:00:00Z", "2021-07-20T09:00:00Z"]
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_operator_tokens() {
        assert_eq!(FilterOperator::from_query_token("gte"), Some(FilterOperator::Gte));
        assert_eq!(FilterOperator::from_query_token("eq"), Some(FilterOperator::Eq));
        assert_eq!(FilterOperator::from_query_token("ne"), None);
        assert_eq!(FilterOperator::from_query_token("regex"), None);
    }

    #[test]
    fn test_operator_display() {
        assert_eq!(format!("{}", FilterOperator::Gte), "gte");
        assert_eq!(format!("{}", FilterOperator::In), "in");
    }

    #[test]
    fn test_range_conditions() {
        let doc = tour();
        assert!(FilterCondition::gte("price", 497).matches(&doc));
        assert!(!FilterCondition::gt("price", 497).matches(&doc));
        assert!(FilterCondition::lt("price", 1000).matches(&doc));
        assert!(!FilterCondition::lte("price", 100).matches(&doc));
    }

    #[test]
    fn test_range_on_missing_field_never_matches() {
        let doc = tour();
        assert!(!FilterCondition::gte("ratingsAverage", 0).matches(&doc));
    }

    #[test]
    fn test_ne_matches_missing_field() {
        let doc = tour();
        assert!(FilterCondition::ne("active", false).matches(&doc));
        assert!(FilterCondition::ne("secretTour", true).matches(&doc));
        assert!(!FilterCondition::ne("secretTour", false).matches(&doc));
    }

    #[test]
    fn test_eq_against_array_field() {
        let doc = tour();
        assert!(FilterCondition::eq("guides", "user_b").matches(&doc));
        assert!(!FilterCondition::eq("guides", "user_c").matches(&doc));
    }

    #[test]
    fn test_in_condition() {
        let doc = tour();
        let cond = FilterCondition::in_values("difficulty", vec![json!("easy"), json!("medium")]);
        assert!(cond.matches(&doc));
        let cond = FilterCondition::in_values("difficulty", vec![json!("difficult")]);
        assert!(!cond.matches(&doc));
    }

    #[test]
    fn test_dates_compare_as_iso_strings() {
        let doc = tour();
        assert!(FilterCondition::gte("startDates", "2021-07-01").matches(&doc));
        assert!(!FilterCondition::gte("startDates", "2022-01-01").matches(&doc));
    }

    #[test]
    fn test_filter_conjunction() {
        let doc = tour();
        let filter = Filter::new()
            .and(FilterCondition::gte("price", 400))
            .and(FilterCondition::eq("difficulty", "easy"));
        assert!(!filter.matches(&doc));
        assert!(Filter::new().matches(&doc));
    }

    #[test]
    fn test_filter_merge_keeps_order() {
        let merged = Filter::from(FilterCondition::eq("a", 1)).merge(FilterCondition::eq("b", 2).into());
        let fields: Vec<_> = merged.conditions().iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["a", "b"]);
    }
}
