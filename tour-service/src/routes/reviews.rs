//! Review routes, top level and nested under a tour

use axum::{
    extract::{Path, State},
    routing::{delete, get, patch, post, MethodRouter},
    Router,
};
use serde_json::Value;

use super::guarded;
use crate::auth::{CurrentUser, GuardChain};
use crate::error::Result;
use crate::handlers::{
    delete_one, get_one, update_one, CollectionHandler, ItemResponse, JsonBody, ListResponse,
    ResourceHandlers,
};
use crate::models::{Review, Role, Tour};
use crate::query::RawQuery;
use crate::repository::{Document, DocumentStore, Filter, FilterCondition};
use crate::state::AppState;

/// Roles allowed to write reviews
pub const REVIEWERS: &[Role] = &[Role::User];

/// Roles allowed to change reviews
pub const REVIEW_EDITORS: &[Role] = &[Role::User];

/// Roles allowed to remove reviews
pub const REVIEW_REMOVERS: &[Role] = &[Role::User, Role::Admin];

/// Review router, mounted at `/api/v1/reviews`
pub fn routes<S: DocumentStore>(state: &AppState<S>) -> Router<AppState<S>> {
    Router::new()
        .route(
            "/",
            get(list_reviews::<S>).merge(guarded(
                post(create_review::<S>),
                state,
                GuardChain::protect().restrict_to(REVIEWERS),
            )),
        )
        .route(
            "/{id}",
            get(get_one::<Review, S>)
                .merge(guarded(
                    patch(update_one::<Review, S>),
                    state,
                    GuardChain::protect().restrict_to(REVIEW_EDITORS),
                ))
                .merge(guarded(
                    delete(delete_one::<Review, S>),
                    state,
                    GuardChain::protect().restrict_to(REVIEW_REMOVERS),
                )),
        )
}

/// `GET|POST /api/v1/tours/{id}/reviews`
pub fn nested<S: DocumentStore>(state: &AppState<S>) -> MethodRouter<AppState<S>> {
    get(list_tour_reviews::<S>).merge(guarded(
        post(create_tour_review::<S>),
        state,
        GuardChain::protect().restrict_to(REVIEWERS),
    ))
}

/// `GET /`
pub async fn list_reviews<S: DocumentStore>(
    State(state): State<AppState<S>>,
    raw: RawQuery,
) -> Result<ListResponse> {
    ResourceHandlers::<Review, S>::from_state(&state)
        .list(&raw, Filter::new())
        .await
}

/// `GET /api/v1/tours/{id}/reviews`
pub async fn list_tour_reviews<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(tour_id): Path<String>,
    raw: RawQuery,
) -> Result<ListResponse> {
    ResourceHandlers::<Review, S>::from_state(&state)
        .list(&raw, FilterCondition::eq("tour", tour_id).into())
        .await
}

async fn create_for<S: DocumentStore>(
    state: &AppState<S>,
    user: &CurrentUser,
    tour_id: Option<String>,
    mut payload: Document,
) -> Result<ItemResponse> {
    if let Some(tour_id) = tour_id {
        payload
            .entry("tour")
            .or_insert_with(|| Value::String(tour_id));
    }
    payload.insert("user".to_string(), Value::String(user.id.clone()));

    if let Some(tour_id) = payload.get("tour").and_then(Value::as_str) {
        ResourceHandlers::<Tour, S>::from_state(state)
            .find_visible(tour_id, Filter::new())
            .await?;
    }
    ResourceHandlers::<Review, S>::from_state(state)
        .create(payload)
        .await
}

/// `POST /`: the tour comes from the body, the author from the token
pub async fn create_review<S: DocumentStore>(
    State(state): State<AppState<S>>,
    user: CurrentUser,
    JsonBody(payload): JsonBody,
) -> Result<ItemResponse> {
    create_for(&state, &user, None, payload).await
}

/// `POST /api/v1/tours/{id}/reviews`
pub async fn create_tour_review<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(tour_id): Path<String>,
    user: CurrentUser,
    JsonBody(payload): JsonBody,
) -> Result<ItemResponse> {
    create_for(&state, &user, Some(tour_id), payload).await
}
