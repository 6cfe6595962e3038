//! Query-string to document query translation
//!
//! A request's query string is decoded into a [`RawQuery`], run through the
//! [`QueryBuilder`] stages and frozen into a [`QuerySpec`]. The spec is then
//! applied to a [`QueryTarget`], normally a [`FindQuery`](crate::repository::FindQuery).
//!
//! ```text
//! ?price[gte]=100&difficulty=easy&sort=-ratingsAverage,price&fields=name,price&page=2&limit=5
//!
//! filter      price >= 100 AND difficulty == "easy"
//! sort        ratingsAverage desc, price asc
//! projection  {_id, name, price}
//! window      skip 5, limit 5
//! ```
//!
//! Parsing performs no I/O; a malformed key fails with [`QueryError`].

mod builder;
mod parse;
mod raw;

pub use builder::{
    PageWindow, QueryBuilder, QueryDefaults, QuerySpec, QueryTarget, CONTROL_KEYS,
    DEFAULT_LIMIT, DEFAULT_SORT_FIELD, MAX_LIMIT,
};
pub use parse::{parse_condition, parse_filter, parse_key, parse_scalar, FilterKey, QueryError};
pub use raw::{RawQuery, RawValue};
