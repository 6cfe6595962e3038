//! Sorting, projection and windowing for document queries
//!
//! [`FindQuery`] bundles everything a store needs to answer a `find`:
//! a filter, an ordered list of sort keys, a projection and a skip/limit window.
//!
//! # Example
//!
//! ```rust
//! use tour_service::repository::{FilterCondition, FindQuery, Projection, SortKey};
//!
//! let query = FindQuery::new()
//!     .with_filter(FilterCondition::gte("price", 100).into())
//!     .with_sort(vec![SortKey::descending("ratingsAverage"), SortKey::ascending("price")])
//!     .with_projection(Projection::include(["name", "price"]))
//!     .with_window(5, 5);
//!
//! assert_eq!(query.skip, 5);
//! assert_eq!(query.limit, Some(5));
//! ```

use std::cmp::Ordering;
use std::fmt;

use super::document::{compare_values, get_path, Document, ID_FIELD};
use super::filter::Filter;

/// Direction for ordering results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Sort in ascending order (A-Z, 0-9)
    #[default]
    Ascending,

    /// Sort in descending order (Z-A, 9-0)
    Descending,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// A single sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Field path to sort by
    pub field: String,

    /// Sort direction
    pub direction: SortDirection,
}

impl SortKey {
    /// Ascending key
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Descending key
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Parse a `-field` / `field` token
    ///
    /// ```rust
    /// use tour_service::repository::{SortDirection, SortKey};
    ///
    /// let key = SortKey::parse("-price").unwrap();
    /// assert_eq!(key.field, "price");
    /// assert_eq!(key.direction, SortDirection::Descending);
    /// assert!(SortKey::parse(" ").is_none());
    /// ```
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let (field, direction) = match token.strip_prefix('-') {
            Some(rest) => (rest.trim(), SortDirection::Descending),
            None => (token.strip_prefix('+').unwrap_or(token).trim(), SortDirection::Ascending),
        };
        if field.is_empty() {
            return None;
        }
        Some(Self {
            field: field.to_string(),
            direction,
        })
    }

    fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ordering = compare_values(get_path(a, &self.field), get_path(b, &self.field));
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Compare two documents by an ordered list of sort keys
pub fn compare_by_keys(keys: &[SortKey], a: &Document, b: &Document) -> Ordering {
    keys.iter()
        .map(|key| key.compare(a, b))
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Field projection
///
/// Inclusion always keeps the identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Keep only the listed top-level fields (plus `_id`)
    Include(Vec<String>),

    /// Drop the listed top-level fields
    Exclude(Vec<String>),
}

impl Projection {
    /// Inclusion projection
    pub fn include<I, T>(fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::Include(fields.into_iter().map(Into::into).collect())
    }

    /// Exclusion projection
    pub fn exclude<I, T>(fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::Exclude(fields.into_iter().map(Into::into).collect())
    }

    /// Apply the projection to a document
    pub fn apply(&self, mut doc: Document) -> Document {
        match self {
            Self::Include(fields) => {
                doc.retain(|key, _| key == ID_FIELD || fields.iter().any(|f| f == key));
                doc
            }
            Self::Exclude(fields) => {
                for field in fields {
                    doc.remove(field);
                }
                doc
            }
        }
    }
}

/// A complete find request against one collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    /// Conjunctive filter
    pub filter: Filter,

    /// Sort keys, primary first
    pub sort: Vec<SortKey>,

    /// Optional projection
    pub projection: Option<Projection>,

    /// Number of matches to skip
    pub skip: u64,

    /// Maximum number of documents to return
    pub limit: Option<u64>,
}

impl FindQuery {
    /// Query matching every document in insertion order
    pub fn new() -> Self {
        Self::default()
    }

    /// AND a filter into the query
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = std::mem::take(&mut self.filter).merge(filter);
        self
    }

    /// Replace the sort keys
    #[must_use]
    pub fn with_sort(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = sort;
        self
    }

    /// Replace the projection
    #[must_use]
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Set the skip/limit window
    #[must_use]
    pub fn with_window(mut self, skip: u64, limit: u64) -> Self {
        self.skip = skip;
        self.limit = Some(limit);
        self
    }

    /// Evaluate the query over an in-memory sequence of documents
    ///
    /// Filtering, sorting (stable, so ties keep input order), windowing and
    /// projection are applied in that order.
    pub fn run<'a, I>(&self, documents: I) -> Vec<Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut matched: Vec<&Document> = documents
            .into_iter()
            .filter(|doc| self.filter.matches(doc))
            .collect();

        if !self.sort.is_empty() {
            matched.sort_by(|a, b| compare_by_keys(&self.sort, a, b));
        }

        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let limit = self
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| match &self.projection {
                Some(projection) => projection.apply(doc.clone()),
                None => doc.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::FilterCondition;
    use serde_json::json;

    fn docs() -> Vec<Document> {
        [
            json!({"_id": "t1", "name": "A", "price": 500, "ratingsAverage": 4.8, "__v": 0}),
            json!({"_id": "t2", "name": "B", "price": 300, "ratingsAverage": 4.8, "__v": 0}),
            json!({"_id": "t3", "name": "C", "price": 900, "ratingsAverage": 4.9, "__v": 0}),
            json!({"_id": "t4", "name": "D", "price": 100, "ratingsAverage": 3.1, "__v": 0}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect()
    }

    fn ids(result: &[Document]) -> Vec<&str> {
        result.iter().filter_map(|d| d["_id"].as_str()).collect()
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!(SortKey::parse("price"), Some(SortKey::ascending("price")));
        assert_eq!(SortKey::parse("-createdAt"), Some(SortKey::descending("createdAt")));
        assert_eq!(SortKey::parse("-"), None);
    }

    #[test]
    fn test_sort_direction_display() {
        assert_eq!(format!("{}", SortDirection::Ascending), "asc");
        assert_eq!(format!("{}", SortDirection::Descending), "desc");
    }

    #[test]
    fn test_run_multi_key_sort() {
        let docs = docs();
        let query = FindQuery::new()
            .with_sort(vec![SortKey::descending("ratingsAverage"), SortKey::ascending("price")]);
        assert_eq!(ids(&query.run(&docs)), vec!["t3", "t2", "t1", "t4"]);
    }

    #[test]
    fn test_run_filter_and_window() {
        let docs = docs();
        let query = FindQuery::new()
            .with_filter(FilterCondition::gte("price", 300).into())
            .with_sort(vec![SortKey::ascending("price")])
            .with_window(1, 1);
        assert_eq!(ids(&query.run(&docs)), vec!["t1"]);
    }

    #[test]
    fn test_run_without_sort_keeps_input_order() {
        let docs = docs();
        assert_eq!(ids(&FindQuery::new().run(&docs)), vec!["t1", "t2", "t3", "t4"]);
    }

    #[test]
    fn test_include_projection_keeps_id() {
        let docs = docs();
        let query = FindQuery::new().with_projection(Projection::include(["name", "price"]));
        let result = query.run(&docs);
        let keys: Vec<_> = result[0].keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 3);
        assert!(result[0].contains_key("_id"));
        assert!(result[0].contains_key("name"));
        assert!(!result[0].contains_key("__v"));
    }

    #[test]
    fn test_exclude_projection() {
        let docs = docs();
        let query = FindQuery::new().with_projection(Projection::exclude(["__v"]));
        assert!(query.run(&docs).iter().all(|d| !d.contains_key("__v")));
    }

    #[test]
    fn test_with_filter_accumulates() {
        let query = FindQuery::new()
            .with_filter(FilterCondition::eq("a", 1).into())
            .with_filter(FilterCondition::eq("b", 2).into());
        assert_eq!(query.filter.conditions().len(), 2);
    }
}
