//! Document store trait
//!
//! Uses RPITIT (Return Position Impl Trait In Traits) for async methods without
//! requiring `async_trait`.
//!
//! # Example
//!
//! ```rust,ignore
//! use tour_service::repository::{DocumentStore, FindQuery, FilterCondition};
//!
//! async fn cheap_tours<S: DocumentStore>(store: &S) -> RepositoryResult<Vec<Document>> {
//!     let query = FindQuery::new().with_filter(FilterCondition::lt("price", 500).into());
//!     store.find("tours", &query).await
//! }
//! ```

use std::future::Future;

use super::document::Document;
use super::error::RepositoryError;
use super::filter::Filter;
use super::find::FindQuery;

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Storage collaborator for JSON documents grouped in named collections
///
/// Single-document writes are atomic: an insert or update either applies in
/// full (including its unique-index check) or not at all.
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Declare a unique index on a top-level field of a collection
    ///
    /// Subsequent inserts and updates that would produce a second document
    /// with the same value fail with a duplicate key error.
    fn ensure_unique(
        &self,
        collection: &str,
        field: &str,
    ) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Find documents matching a query
    fn find(
        &self,
        collection: &str,
        query: &FindQuery,
    ) -> impl Future<Output = RepositoryResult<Vec<Document>>> + Send;

    /// Count documents matching a filter
    fn count(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Find a document by identifier
    ///
    /// Returns `Ok(None)` when no document has the identifier.
    fn find_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = RepositoryResult<Option<Document>>> + Send;

    /// Insert a document that already carries its identifier
    ///
    /// The store initialises the revision counter and returns the stored copy.
    fn insert(
        &self,
        collection: &str,
        document: Document,
    ) -> impl Future<Output = RepositoryResult<Document>> + Send;

    /// Apply a partial update to a document
    ///
    /// Each field in `changes` replaces the stored field; a JSON `null` removes
    /// it. The revision counter is incremented. Returns `Ok(None)` when the
    /// identifier does not resolve.
    fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        changes: Document,
    ) -> impl Future<Output = RepositoryResult<Option<Document>>> + Send;

    /// Delete a document, returning it if it existed
    fn delete_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = RepositoryResult<Option<Document>>> + Send;
}
