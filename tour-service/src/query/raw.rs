//! Raw query-string map
//!
//! Keys keep every value they were given, so `difficulty=easy&difficulty=medium`
//! stays distinguishable from a single value.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// A query-string value: one occurrence or several
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// The key appeared once
    Single(String),

    /// The key appeared more than once, values in order of appearance
    Many(Vec<String>),
}

impl RawValue {
    /// The first (or only) value
    pub fn first(&self) -> &str {
        match self {
            Self::Single(value) => value,
            Self::Many(values) => values.first().map(String::as_str).unwrap_or_default(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            Self::Single(existing) => {
                let first = std::mem::take(existing);
                *self = Self::Many(vec![first, value]);
            }
            Self::Many(values) => values.push(value),
        }
    }
}

/// Query-string keys mapped to their values
///
/// # Example
///
/// ```rust
/// use tour_service::query::{RawQuery, RawValue};
///
/// let raw = RawQuery::from_pairs([
///     ("price[gte]", "100"),
///     ("difficulty", "easy"),
///     ("difficulty", "medium"),
/// ]);
/// assert_eq!(raw.get("price[gte]").map(RawValue::first), Some("100"));
/// assert!(matches!(raw.get("difficulty"), Some(RawValue::Many(v)) if v.len() == 2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQuery {
    entries: BTreeMap<String, RawValue>,
}

impl RawQuery {
    /// Create an empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from decoded key/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut raw = Self::new();
        for (key, value) in pairs {
            raw.append(key, value);
        }
        raw
    }

    /// Add an occurrence of a key
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        match self.entries.entry(key.into()) {
            Entry::Occupied(mut existing) => existing.get_mut().push(value),
            Entry::Vacant(slot) => {
                slot.insert(RawValue::Single(value));
            }
        }
    }

    /// Replace every occurrence of a key with a single value
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), RawValue::Single(value.into()));
        self
    }

    /// Look up a key
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.entries.get(key)
    }

    /// First value of a key
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).map(RawValue::first)
    }

    /// True when the key is present
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate over keys and values in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// True when no keys are present
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
