//! HTTP routes under `/api/v1`
//!
//! [`app`] assembles the resource routers, attaches the guard chains, the
//! per-client rate limit, security headers and the error renderer. The outer
//! transport layers (CORS, compression, timeouts, tracing) are added by
//! [`Server`](crate::server::Server).
//!
//! | Prefix              | Router                |
//! |---------------------|-----------------------|
//! | `/api/v1/tours`     | [`tours::routes`]     |
//! | `/api/v1/users`     | [`users::routes`]     |
//! | `/api/v1/reviews`   | [`reviews::routes`]   |
//! | `/api/v1/bookings`  | [`bookings::routes`]  |

use axum::{
    extract::OriginalUri,
    middleware,
    routing::{get, MethodRouter},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer};

use crate::auth::{enforce, Guard, GuardChain};
use crate::error::Error;
use crate::health::{health, readiness};
use crate::middleware::{apply_security_headers, render_errors, RateLimit};
use crate::models::Role;
use crate::repository::DocumentStore;
use crate::state::AppState;

pub mod bookings;
pub mod reviews;
pub mod tours;
pub mod users;

/// Prefix of every API route
pub const API_PREFIX: &str = "/api/v1";

/// Roles allowed to manage tours and bookings
pub const STAFF: &[Role] = &[Role::Admin, Role::LeadGuide];

/// Attach a guard chain to a method router
pub fn guarded<S: DocumentStore>(
    route: MethodRouter<AppState<S>>,
    state: &AppState<S>,
    chain: GuardChain,
) -> MethodRouter<AppState<S>> {
    route.route_layer(middleware::from_fn_with_state(
        Guard::new(state.clone(), chain),
        enforce::<S>,
    ))
}

/// Routes with no match
pub async fn not_found(OriginalUri(uri): OriginalUri) -> Error {
    Error::NotFound(format!("Could not find {} on this server!", uri.path()))
}

/// Versioned API router, rate limited when enabled
pub fn api<S: DocumentStore>(state: &AppState<S>) -> Router<AppState<S>> {
    let api = Router::new()
        .nest("/tours", tours::routes(state))
        .nest("/users", users::routes(state))
        .nest("/reviews", reviews::routes(state))
        .nest("/bookings", bookings::routes(state));

    let limits = &state.config().rate_limit;
    if limits.enabled {
        tracing::debug!(
            requests = limits.requests_per_period,
            period_secs = limits.period_secs,
            "rate limiting enabled"
        );
        api.layer(middleware::from_fn_with_state(
            RateLimit::new(limits),
            RateLimit::middleware,
        ))
    } else {
        api
    }
}

/// The complete application
pub fn app<S: DocumentStore>(state: AppState<S>) -> Router {
    let config = state.config().clone();

    let mut router = Router::new()
        .route("/health", get(health::<S>))
        .route("/ready", get(readiness::<S>))
        .nest(API_PREFIX, api(&state))
        .fallback(not_found)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(config.middleware.body_limit_bytes()));

    if config.middleware.catch_panic {
        router = router.layer(CatchPanicLayer::new());
    }

    let router = router.layer(middleware::from_fn_with_state(
        config.environment(),
        render_errors,
    ));
    apply_security_headers(
        router,
        &config.security_headers,
        config.environment().is_production(),
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Helpers for driving the full router in tests

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::{Config, PasswordConfig};
    use crate::models::register_indexes;
    use crate::repository::MemoryStore;
    use crate::state::AppState;

    /// Configuration with cheap password hashing and no rate limit
    pub fn config() -> Config {
        let mut config = Config::default();
        config.password = PasswordConfig {
            memory_cost_kib: 1024,
            time_cost: 1,
            ..Default::default()
        };
        config.rate_limit.enabled = false;
        config
    }

    /// Fresh state over an empty store with indexes declared
    pub async fn state() -> AppState<MemoryStore> {
        let store = MemoryStore::new();
        register_indexes(&store).await.unwrap();
        AppState::new(config(), store).unwrap()
    }

    /// A captured response
    #[derive(Debug)]
    pub struct Reply {
        pub status: StatusCode,
        pub headers: axum::http::HeaderMap,
        pub body: Value,
    }

    /// Send one request through the app
    pub async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Reply {
            status,
            headers,
            body,
        }
    }

    /// Sign up a user and return their token and id
    pub async fn signup(app: &Router, name: &str, email: &str) -> (String, String) {
        let reply = send(
            app,
            Method::POST,
            "/api/v1/users/signup",
            None,
            Some(serde_json::json!({
                "name": name,
                "email": email,
                "password": "pass1234",
                "passwordConfirm": "pass1234"
            })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.body);
        let token = reply.body["token"].as_str().unwrap().to_string();
        let id = reply.body["data"]["user"]["_id"].as_str().unwrap().to_string();
        (token, id)
    }

    /// Sign up a user and give them a role directly in the store
    pub async fn user_with_role(
        app: &Router,
        state: &AppState<MemoryStore>,
        email: &str,
        role: &str,
    ) -> (String, String) {
        use crate::repository::DocumentStore;

        let (token, id) = signup(app, "Staff Member", email).await;
        let mut changes = crate::repository::Document::new();
        changes.insert("role".into(), Value::String(role.into()));
        state
            .store()
            .update_by_id("users", &id, changes)
            .await
            .unwrap()
            .unwrap();
        (token, id)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn test_unknown_route() {
        let app = app(state().await);
        let reply = send(&app, Method::GET, "/api/v1/nowhere", None, None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(reply.body["status"], "fail");
        assert_eq!(
            reply.body["message"],
            "Could not find /api/v1/nowhere on this server!"
        );
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(state().await);
        let reply = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["status"], "healthy");

        let reply = send(&app, Method::GET, "/ready", None, None).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["ready"], true);
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let mut config = config();
        config.rate_limit.enabled = true;
        config.rate_limit.requests_per_period = 2;
        let state = AppState::new(config, crate::repository::MemoryStore::new()).unwrap();
        let app = app(state);

        for _ in 0..2 {
            let reply = send(&app, Method::GET, "/api/v1/tours", None, None).await;
            assert_eq!(reply.status, StatusCode::OK);
        }
        let reply = send(&app, Method::GET, "/api/v1/tours", None, None).await;
        assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);
        assert!(reply.headers.contains_key("retry-after"));
        assert_eq!(reply.body["status"], "fail");

        // Health checks are not limited
        let reply = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let app = app(state().await);
        let reply = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(reply.headers["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn test_wrong_method_gets_envelope() {
        let app = app(state().await);
        let reply = send(&app, Method::PUT, "/api/v1/tours", None, None).await;
        assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(reply.body["status"], "fail");
    }
}
