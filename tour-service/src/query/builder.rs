//! Query builder pipeline
//!
//! The builder consumes a [`RawQuery`] in four stages, each reading only its
//! own keys: `filter` (every non-control key), `sort`, `limit_fields`
//! (`fields`) and `paginate` (`page`, `limit`). The result is an immutable
//! [`QuerySpec`] which can be applied to anything implementing [`QueryTarget`].

use serde::{Deserialize, Serialize};

use super::parse::{parse_filter, QueryError};
use super::raw::RawQuery;
use crate::repository::{Filter, FindQuery, Projection, SortKey, ID_FIELD, VERSION_FIELD};

/// Keys the builder consumes itself; they never become filter conditions
pub const CONTROL_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Default page size when `limit` is absent or unusable
pub const DEFAULT_LIMIT: u32 = 100;

/// Largest accepted page size
pub const MAX_LIMIT: u32 = 1000;

/// Field used for the default sort
pub const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Page size limits applied by [`QueryBuilder::paginate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDefaults {
    /// Page size used when `limit` is absent, non-numeric or below one
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// Upper bound for `limit`
    #[serde(default = "max_limit")]
    pub max_limit: u32,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn max_limit() -> u32 {
    MAX_LIMIT
}

/// A 1-indexed page of results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Page number, at least 1
    pub page: u32,

    /// Page size, at least 1
    pub limit: u32,
}

impl PageWindow {
    /// Number of results to skip
    ///
    /// ```rust
    /// use tour_service::query::PageWindow;
    ///
    /// assert_eq!(PageWindow { page: 3, limit: 20 }.skip(), 40);
    /// ```
    #[must_use]
    pub const fn skip(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.limit as u64
    }
}

/// Abstract query object a [`QuerySpec`] can be applied to
///
/// Each stage returns the (possibly replaced) target so calls chain.
pub trait QueryTarget: Sized {
    /// Constrain results with a filter
    fn find(self, filter: Filter) -> Self;

    /// Order results by the keys, primary first
    fn sort(self, keys: Vec<SortKey>) -> Self;

    /// Restrict returned fields
    fn select(self, projection: Projection) -> Self;

    /// Skip and cap results
    fn paginate(self, window: PageWindow) -> Self;
}

impl QueryTarget for FindQuery {
    fn find(self, filter: Filter) -> Self {
        self.with_filter(filter)
    }

    fn sort(self, keys: Vec<SortKey>) -> Self {
        self.with_sort(keys)
    }

    fn select(self, projection: Projection) -> Self {
        self.with_projection(projection)
    }

    fn paginate(self, window: PageWindow) -> Self {
        self.with_window(window.skip(), u64::from(window.limit))
    }
}

/// The composed query: filter, sort, projection and optional window
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    filter: Filter,
    sort: Vec<SortKey>,
    projection: Projection,
    window: Option<PageWindow>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            filter: Filter::new(),
            sort: vec![SortKey::descending(DEFAULT_SORT_FIELD)],
            projection: Projection::exclude([VERSION_FIELD]),
            window: None,
        }
    }
}

impl QuerySpec {
    /// The filter predicate
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Sort keys, primary first
    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    /// The projection
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// The pagination window, if any
    pub fn window(&self) -> Option<PageWindow> {
        self.window
    }

    /// Apply to a query target, returning the chained target
    pub fn apply<Q: QueryTarget>(&self, target: Q) -> Q {
        let target = target
            .find(self.filter.clone())
            .sort(self.sort.clone())
            .select(self.projection.clone());
        match self.window {
            Some(window) => target.paginate(window),
            None => target,
        }
    }
}

/// Builder turning a raw query map into a [`QuerySpec`]
///
/// # Example
///
/// ```rust
/// use tour_service::query::{QueryBuilder, QueryDefaults, RawQuery};
/// use tour_service::repository::FindQuery;
///
/// let raw = RawQuery::from_pairs([("price[lt]", "1000"), ("sort", "-price"), ("limit", "5")]);
/// let spec = QueryBuilder::new(&raw, QueryDefaults::default())
///     .filter()?
///     .sort()
///     .limit_fields()
///     .paginate()
///     .build();
///
/// let query = spec.apply(FindQuery::new());
/// assert_eq!(query.limit, Some(5));
/// # Ok::<(), tour_service::query::QueryError>(())
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder<'a> {
    raw: &'a RawQuery,
    defaults: QueryDefaults,
    spec: QuerySpec,
}

impl<'a> QueryBuilder<'a> {
    /// Start a pipeline over a raw query
    pub fn new(raw: &'a RawQuery, defaults: QueryDefaults) -> Self {
        Self {
            raw,
            defaults,
            spec: QuerySpec::default(),
        }
    }

    /// Run every stage in order
    pub fn from_raw(raw: &'a RawQuery, defaults: QueryDefaults) -> Result<QuerySpec, QueryError> {
        Ok(Self::new(raw, defaults)
            .filter()?
            .sort()
            .limit_fields()
            .paginate()
            .build())
    }

    /// Parse every non-control key into the filter predicate
    pub fn filter(mut self) -> Result<Self, QueryError> {
        self.spec.filter = parse_filter(self.raw, &CONTROL_KEYS)?;
        Ok(self)
    }

    /// Read `sort`; defaults to descending `createdAt`
    #[must_use]
    pub fn sort(mut self) -> Self {
        if let Some(sort) = self.raw.first("sort") {
            let keys: Vec<SortKey> = sort.split(',').filter_map(SortKey::parse).collect();
            if !keys.is_empty() {
                self.spec.sort = keys;
            }
        }
        self
    }

    /// Read `fields` into an inclusion projection; defaults to excluding `__v`
    #[must_use]
    pub fn limit_fields(mut self) -> Self {
        if let Some(fields) = self.raw.first("fields") {
            let fields: Vec<String> = fields
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect();
            if !fields.is_empty() {
                let mut fields = fields;
                if !fields.iter().any(|f| f == ID_FIELD) {
                    fields.insert(0, ID_FIELD.to_string());
                }
                self.spec.projection = Projection::Include(fields);
            }
        }
        self
    }

    /// Read `page` and `limit` into a window when either is present
    #[must_use]
    pub fn paginate(mut self) -> Self {
        if !self.raw.contains("page") && !self.raw.contains("limit") {
            return self;
        }

        let page = self
            .raw
            .first("page")
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .map(|p| u32::try_from(p).unwrap_or(u32::MAX))
            .unwrap_or(1);

        let max = self.defaults.max_limit.max(1);
        let limit = self
            .raw
            .first("limit")
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l >= 1)
            .map(|l| u32::try_from(l).unwrap_or(u32::MAX))
            .unwrap_or(self.defaults.default_limit)
            .clamp(1, max);

        self.spec.window = Some(PageWindow { page, limit });
        self
    }

    /// Finish the pipeline
    pub fn build(self) -> QuerySpec {
        self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{Document, FilterCondition, SortDirection};
    use serde_json::json;

    fn spec(pairs: &[(&str, &str)]) -> QuerySpec {
        let raw = RawQuery::from_pairs(pairs.iter().copied());
        QueryBuilder::from_raw(&raw, QueryDefaults::default()).unwrap()
    }

    #[test]
    fn test_control_keys_never_reach_filter() {
        let spec = spec(&[("page", "1"), ("sort", "x"), ("limit", "3"), ("fields", "a"), ("duration", "5")]);
        assert_eq!(spec.filter().conditions(), &[FilterCondition::eq("duration", 5)]);
    }

    #[test]
    fn test_filter_independent_of_key_order() {
        let a = spec(&[("price[gte]", "100"), ("difficulty", "easy")]);
        let b = spec(&[("difficulty", "easy"), ("price[gte]", "100")]);
        assert_eq!(a.filter(), b.filter());
    }

    #[test]
    fn test_default_sort_is_newest_first() {
        let spec = spec(&[]);
        assert_eq!(spec.sort(), &[SortKey::descending("createdAt")]);
        assert_eq!(spec.sort()[0].direction, SortDirection::Descending);
    }

    #[test]
    fn test_sort_keys_in_listed_order() {
        let spec = spec(&[("sort", "-ratingsAverage,price")]);
        assert_eq!(
            spec.sort(),
            &[SortKey::descending("ratingsAverage"), SortKey::ascending("price")]
        );
    }

    #[test]
    fn test_fields_projection_keeps_id() {
        let spec = spec(&[("fields", "name,price")]);
        assert_eq!(
            spec.projection(),
            &Projection::Include(vec!["_id".into(), "name".into(), "price".into()])
        );
    }

    #[test]
    fn test_default_projection_excludes_version() {
        assert_eq!(spec(&[]).projection(), &Projection::Exclude(vec!["__v".into()]));
    }

    #[test]
    fn test_no_window_without_page_or_limit() {
        assert_eq!(spec(&[]).window(), None);
    }

    #[test]
    fn test_limit_alone_applies_window() {
        assert_eq!(spec(&[("limit", "5")]).window(), Some(PageWindow { page: 1, limit: 5 }));
    }

    #[test]
    fn test_page_alone_uses_default_limit() {
        assert_eq!(
            spec(&[("page", "3")]).window(),
            Some(PageWindow { page: 3, limit: DEFAULT_LIMIT })
        );
    }

    #[test]
    fn test_bad_page_and_limit_fall_back() {
        let window = spec(&[("page", "0"), ("limit", "abc")]).window().unwrap();
        assert_eq!(window, PageWindow { page: 1, limit: DEFAULT_LIMIT });

        let window = spec(&[("page", "-4"), ("limit", "-1")]).window().unwrap();
        assert_eq!(window, PageWindow { page: 1, limit: DEFAULT_LIMIT });
    }

    #[test]
    fn test_limit_clamped_to_maximum() {
        let window = spec(&[("limit", "50000")]).window().unwrap();
        assert_eq!(window.limit, MAX_LIMIT);
    }

    #[test]
    fn test_configured_defaults() {
        let raw = RawQuery::from_pairs([("page", "2")]);
        let defaults = QueryDefaults { default_limit: 10, max_limit: 20 };
        let spec = QueryBuilder::from_raw(&raw, defaults).unwrap();
        assert_eq!(spec.window(), Some(PageWindow { page: 2, limit: 10 }));
    }

    #[test]
    fn test_malformed_filter_fails() {
        let raw = RawQuery::from_pairs([("price[foo]", "1")]);
        assert!(QueryBuilder::from_raw(&raw, QueryDefaults::default()).is_err());
    }

    #[test]
    fn test_apply_to_find_query_windows_results() {
        let docs: Vec<Document> = (1..=12)
            .filter_map(|i| json!({"_id": format!("t{:02}", i), "rank": i}).as_object().cloned())
            .collect();
        let spec = spec(&[("page", "2"), ("limit", "5"), ("sort", "rank")]);
        let query = spec.apply(FindQuery::new());
        assert_eq!(query.skip, 5);
        assert_eq!(query.limit, Some(5));

        let ranks: Vec<i64> = query.run(&docs).iter().filter_map(|d| d["rank"].as_i64()).collect();
        assert_eq!(ranks, vec![6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_apply_fields_projection_returns_exact_fields() {
        let docs: Vec<Document> = vec![json!({"_id": "t1", "name": "A", "price": 1, "duration": 5, "__v": 0})]
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect();
        let query = spec(&[("fields", "name,price")]).apply(FindQuery::new());
        let result = query.run(&docs);
        let mut keys: Vec<&str> = result[0].keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["_id", "name", "price"]);
    }
}
