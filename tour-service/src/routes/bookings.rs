//! Booking routes, staff only

use axum::{routing::get, Router};

use super::{guarded, STAFF};
use crate::auth::GuardChain;
use crate::handlers::{create_one, delete_one, get_one, list_all, update_one};
use crate::models::Booking;
use crate::repository::DocumentStore;
use crate::state::AppState;

/// Booking router, mounted at `/api/v1/bookings`
pub fn routes<S: DocumentStore>(state: &AppState<S>) -> Router<AppState<S>> {
    let staff = || GuardChain::protect().restrict_to(STAFF);

    Router::new()
        .route(
            "/",
            guarded(
                get(list_all::<Booking, S>).post(create_one::<Booking, S>),
                state,
                staff(),
            ),
        )
        .route(
            "/{id}",
            guarded(
                get(get_one::<Booking, S>)
                    .patch(update_one::<Booking, S>)
                    .delete(delete_one::<Booking, S>),
                state,
                staff(),
            ),
        )
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::routes::app;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_bookings_require_staff() {
        let state = state().await;
        let app = app(state.clone());
        let (user, _) = signup(&app, "Laura Wilson", "laura@example.io").await;

        let reply = send(&app, Method::GET, "/api/v1/bookings", None, None).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

        let reply = send(&app, Method::GET, "/api/v1/bookings", Some(&user), None).await;
        assert_eq!(reply.status, StatusCode::FORBIDDEN);
        assert_eq!(
            reply.body["message"],
            "You do not have permission to perform this action"
        );
    }

    #[tokio::test]
    async fn test_booking_crud() {
        let state = state().await;
        let app = app(state.clone());
        let (lead, lead_id) = user_with_role(&app, &state, "lead@example.io", "lead-guide").await;

        let reply = send(
            &app,
            Method::POST,
            "/api/v1/tours",
            Some(&lead),
            Some(json!({
                "name": "The Sea Explorer",
                "duration": 7,
                "maxGroupSize": 15,
                "difficulty": "medium",
                "price": 497,
                "imageCover": "cover.jpg"
            })),
        )
        .await;
        let tour = reply.body["data"]["tour"]["_id"].as_str().unwrap().to_string();

        let reply = send(
            &app,
            Method::POST,
            "/api/v1/bookings",
            Some(&lead),
            Some(json!({ "tour": tour, "user": lead_id })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);

        let reply = send(
            &app,
            Method::POST,
            "/api/v1/bookings",
            Some(&lead),
            Some(json!({ "tour": tour, "user": lead_id, "price": 497 })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.body);
        assert_eq!(reply.body["data"]["booking"]["paid"], true);
        let id = reply.body["data"]["booking"]["_id"].as_str().unwrap().to_string();
        let path = format!("/api/v1/bookings/{}", id);

        let reply = send(&app, Method::GET, &path, Some(&lead), None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["data"]["booking"]["tour"]["name"], "The Sea Explorer");
        assert_eq!(reply.body["data"]["booking"]["user"]["email"], "lead@example.io");

        let reply = send(&app, Method::PATCH, &path, Some(&lead), Some(json!({ "paid": false }))).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["data"]["booking"]["paid"], false);

        let reply = send(&app, Method::GET, "/api/v1/bookings", Some(&lead), None).await;
        assert_eq!(reply.body["results"], 1);

        let reply = send(&app, Method::DELETE, &path, Some(&lead), None).await;
        assert_eq!(reply.status, StatusCode::NO_CONTENT);
        let reply = send(&app, Method::GET, &path, Some(&lead), None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }
}
