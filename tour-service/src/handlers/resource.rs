//! Generic CRUD handlers parameterized by a [`Resource`]

use std::marker::PhantomData;

use axum::{
    extract::{Path, State},
    http::StatusCode,
};

use super::extract::JsonBody;
use super::populate::{populate_all, populate_document};
use super::response::{ItemResponse, ListResponse};
use super::traits::CollectionHandler;
use crate::auth::PasswordHasher;
use crate::error::{Error, Result};
use crate::ids::is_document_id;
use crate::models::{Populate, Resource, WriteContext};
use crate::query::{QueryBuilder, QueryDefaults, RawQuery};
use crate::repository::{Document, DocumentStore, Filter, FilterCondition, FindQuery, ID_FIELD};
use crate::state::AppState;

/// [`CollectionHandler`] for any model over any store
#[derive(Debug)]
pub struct ResourceHandlers<R, S> {
    store: S,
    defaults: QueryDefaults,
    hasher: PasswordHasher,
    _model: PhantomData<fn() -> R>,
}

impl<R, S: Clone> Clone for ResourceHandlers<R, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            defaults: self.defaults,
            hasher: self.hasher.clone(),
            _model: PhantomData,
        }
    }
}

impl<R: Resource, S: DocumentStore> ResourceHandlers<R, S> {
    /// Create handlers over a store
    pub fn new(store: S, defaults: QueryDefaults, hasher: PasswordHasher) -> Self {
        Self {
            store,
            defaults,
            hasher,
            _model: PhantomData,
        }
    }

    /// Create handlers from application state
    pub fn from_state(state: &AppState<S>) -> Self {
        Self::new(
            state.store().clone(),
            state.config().query,
            state.hasher().clone(),
        )
    }

    fn check_id(id: &str) -> Result<()> {
        if is_document_id(R::ID_PREFIX, id) {
            Ok(())
        } else {
            Err(Error::BadRequest(format!("Invalid {}: {}.", ID_FIELD, id)))
        }
    }

    /// Fetch one document through the decorator and `scope`
    pub async fn find_visible(&self, id: &str, scope: Filter) -> Result<Document> {
        Self::check_id(id)?;
        let query = FindQuery::new()
            .with_filter(FilterCondition::eq(ID_FIELD, id).into())
            .with_filter(R::decorate())
            .with_filter(scope)
            .with_window(0, 1);
        self.store
            .find(R::COLLECTION, &query)
            .await?
            .pop()
            .ok_or_else(|| Error::not_found(R::SINGULAR, id))
    }

    async fn finish(&self, doc: Document, extra: &[Populate]) -> Result<Document> {
        let mut directives = R::populate();
        directives.extend_from_slice(extra);
        let doc = populate_document(&self.store, doc, &directives, 0).await?;
        Ok(R::present(doc))
    }
}

impl<R: Resource, S: DocumentStore> CollectionHandler for ResourceHandlers<R, S> {
    async fn list(&self, raw: &RawQuery, scope: Filter) -> Result<ListResponse> {
        let spec = QueryBuilder::from_raw(raw, self.defaults)?;
        let query = spec.apply(FindQuery::new().with_filter(R::decorate()).with_filter(scope));
        let docs = self.store.find(R::COLLECTION, &query).await?;
        let docs = populate_all(&self.store, docs, &R::populate()).await?;

        tracing::debug!(collection = R::COLLECTION, results = docs.len(), "listed");
        Ok(ListResponse::new(
            R::COLLECTION,
            docs.into_iter().map(R::present).collect(),
        ))
    }

    async fn get(&self, id: &str, scope: Filter, extra: Vec<Populate>) -> Result<ItemResponse> {
        let doc = self.find_visible(id, scope).await?;
        Ok(ItemResponse::new(R::SINGULAR, self.finish(doc, &extra).await?))
    }

    async fn create(&self, payload: Document) -> Result<ItemResponse> {
        let ctx = WriteContext::new(&self.hasher);
        let doc = R::prepare_create(payload, &ctx)?;
        R::check_conflicts(&self.store, &doc).await?;
        let stored = self.store.insert(R::COLLECTION, doc).await?;
        R::after_write(&self.store, &stored).await?;

        tracing::info!(collection = R::COLLECTION, id = ?stored.get(ID_FIELD), "created");
        Ok(ItemResponse::new(R::SINGULAR, R::present(stored)).created())
    }

    async fn update(&self, id: &str, payload: Document) -> Result<ItemResponse> {
        let current = self.find_visible(id, Filter::new()).await?;
        let ctx = WriteContext::new(&self.hasher);
        let changes = R::prepare_update(&current, payload, &ctx)?;
        let updated = self
            .store
            .update_by_id(R::COLLECTION, id, changes)
            .await?
            .ok_or_else(|| Error::not_found(R::SINGULAR, id))?;
        R::after_write(&self.store, &updated).await?;

        tracing::info!(collection = R::COLLECTION, id, "updated");
        Ok(ItemResponse::new(R::SINGULAR, self.finish(updated, &[]).await?))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.find_visible(id, Filter::new()).await?;
        let removed = self
            .store
            .delete_by_id(R::COLLECTION, id)
            .await?
            .ok_or_else(|| Error::not_found(R::SINGULAR, id))?;
        R::after_write(&self.store, &removed).await?;

        tracing::info!(collection = R::COLLECTION, id, "deleted");
        Ok(())
    }
}

/// `GET /` for a model
pub async fn list_all<R: Resource, S: DocumentStore>(
    State(state): State<AppState<S>>,
    raw: RawQuery,
) -> Result<ListResponse> {
    ResourceHandlers::<R, S>::from_state(&state)
        .list(&raw, Filter::new())
        .await
}

/// `GET /{id}` for a model
pub async fn get_one<R: Resource, S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<ItemResponse> {
    ResourceHandlers::<R, S>::from_state(&state)
        .get(&id, Filter::new(), Vec::new())
        .await
}

/// `POST /` for a model
pub async fn create_one<R: Resource, S: DocumentStore>(
    State(state): State<AppState<S>>,
    JsonBody(payload): JsonBody,
) -> Result<ItemResponse> {
    ResourceHandlers::<R, S>::from_state(&state)
        .create(payload)
        .await
}

/// `PATCH /{id}` for a model
pub async fn update_one<R: Resource, S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody,
) -> Result<ItemResponse> {
    ResourceHandlers::<R, S>::from_state(&state)
        .update(&id, payload)
        .await
}

/// `DELETE /{id}` for a model
pub async fn delete_one<R: Resource, S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    ResourceHandlers::<R, S>::from_state(&state)
        .delete(&id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
