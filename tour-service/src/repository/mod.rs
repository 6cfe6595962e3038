//! Document storage abstractions
//!
//! This module provides the storage collaborator used by the resource handlers:
//! a [`DocumentStore`] trait over JSON documents grouped in collections, plus
//! the query vocabulary stores evaluate.
//!
//! # Features
//!
//! - **Document store**: [`DocumentStore`] trait for find, count, insert, update and delete
//! - **Filtering**: [`Filter`] and [`FilterCondition`] for conjunctive predicates
//! - **Sorting and projection**: [`SortKey`] and [`Projection`]
//! - **In-process backend**: [`MemoryStore`] with unique indexes
//!
//! # Example
//!
//! ```rust,ignore
//! use tour_service::repository::{
//!     DocumentStore, FilterCondition, FindQuery, MemoryStore, SortKey,
//! };
//!
//! let store = MemoryStore::new();
//! store.ensure_unique("users", "email").await?;
//!
//! let query = FindQuery::new()
//!     .with_filter(FilterCondition::eq("role", "guide").into())
//!     .with_sort(vec![SortKey::ascending("name")]);
//! let guides = store.find("users", &query).await?;
//! ```

mod document;
mod error;
mod filter;
mod find;
mod memory;
mod traits;

// Re-export all public types
pub use document::{
    compare_values, document_id, get_path, values_equal, Document, ID_FIELD, VERSION_FIELD,
};
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use filter::{Filter, FilterCondition, FilterOperator};
pub use find::{compare_by_keys, FindQuery, Projection, SortDirection, SortKey};
pub use memory::MemoryStore;
pub use traits::{DocumentStore, RepositoryResult};
