//! Handler trait for REST collection endpoints
//!
//! Uses RPITIT (Return Position Impl Trait In Traits) for async methods
//! without requiring `async_trait`.
//!
//! # Example
//!
//! ```rust,ignore
//! use tour_service::handlers::{CollectionHandler, ResourceHandlers};
//! use tour_service::models::Tour;
//!
//! let handlers = ResourceHandlers::<Tour, _>::from_state(&state);
//! let cheap = RawQuery::from_pairs([("price[lt]", "500")]);
//! let response = handlers.list(&cheap, Filter::new()).await?;
//! println!("{} tours", response.results());
//! ```

use std::future::Future;

use super::response::{ItemResponse, ListResponse};
use crate::error::Result;
use crate::models::Populate;
use crate::query::RawQuery;
use crate::repository::{Document, Filter};

/// Standard REST CRUD operations over one collection
pub trait CollectionHandler: Send + Sync {
    /// List documents matching the query string
    ///
    /// `scope` is ANDed with the model decorator and the parsed query, e.g. to
    /// restrict reviews to one tour.
    fn list(
        &self,
        raw: &RawQuery,
        scope: Filter,
    ) -> impl Future<Output = Result<ListResponse>> + Send;

    /// Get one document, resolving the model's relations plus `extra`
    ///
    /// # Errors
    ///
    /// `NotFound` when the id does not resolve within `scope` and the decorator.
    fn get(
        &self,
        id: &str,
        scope: Filter,
        extra: Vec<Populate>,
    ) -> impl Future<Output = Result<ItemResponse>> + Send;

    /// Validate and insert a document, responding 201
    ///
    /// # Errors
    ///
    /// `ValidationFailed` when a field rule is violated (nothing is inserted),
    /// `DuplicateKey` when a unique field collides.
    fn create(&self, payload: Document) -> impl Future<Output = Result<ItemResponse>> + Send;

    /// Apply a partial update and return the updated document
    fn update(
        &self,
        id: &str,
        payload: Document,
    ) -> impl Future<Output = Result<ItemResponse>> + Send;

    /// Remove a document
    fn delete(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
}
