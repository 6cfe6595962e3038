//! Environment-aware error rendering
//!
//! Handlers and extractors return [`Error`](crate::error::Error), whose
//! response carries the production body plus an [`ErrorReport`] extension.
//! This middleware is the last step: in development it swaps the body for
//! one exposing the error kind and full diagnostic. Error responses produced
//! outside the crate (tower-http layers, axum's method fallback) are wrapped
//! in the same envelope in both modes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::config::Environment;
use crate::error::{ErrorReport, ErrorResponse, GENERIC_FAILURE_MESSAGE};

/// Rewrite error responses for the configured environment
pub async fn render_errors(
    State(environment): State<Environment>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    match response.extensions().get::<ErrorReport>().cloned() {
        Some(report) if !environment.is_production() => {
            rebuild(response, Json(report.development_body(status)))
        }
        Some(_) => response,
        None if is_json(&response) => response,
        None => {
            let message = status.canonical_reason().unwrap_or(GENERIC_FAILURE_MESSAGE);
            tracing::debug!(status = status.as_u16(), "wrapping foreign error response");
            rebuild(response, Json(ErrorResponse::new(status, message)))
        }
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

/// Replace the body, keeping status and headers other than the body's own
fn rebuild(response: Response, body: Json<ErrorResponse>) -> Response {
    let (mut parts, _) = response.into_parts();
    let replacement = body.into_response();
    parts.headers.remove(header::CONTENT_LENGTH);
    for (name, value) in replacement.headers() {
        parts.headers.insert(name.clone(), value.clone());
    }
    let (_, body) = replacement.into_parts();
    Response::from_parts(parts, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(environment: Environment) -> Router {
        Router::new()
            .route(
                "/boom",
                get(|| async { Err::<(), _>(Error::Unexpected("disk full".into())) }),
            )
            .route(
                "/missing",
                get(|| async { Err::<(), _>(Error::NotFound("No tour found".into())) }),
            )
            .route("/plain", get(|| async { (StatusCode::PAYLOAD_TOO_LARGE, "too big") }))
            .layer(middleware::from_fn_with_state(environment, render_errors))
    }

    async fn call(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_production_hides_unexpected_detail() {
        let (status, body) = call(app(Environment::Production), "/boom").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Something went very wrong!");
        assert!(body.get("detail").is_none());
    }

    #[tokio::test]
    async fn test_development_exposes_detail() {
        let (status, body) = call(app(Environment::Development), "/boom").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "unexpected");
        assert!(body["detail"].as_str().unwrap().contains("disk full"));

        let (status, body) = call(app(Environment::Development), "/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "No tour found");
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_foreign_errors_get_envelope() {
        let (status, body) = call(app(Environment::Production), "/plain").await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "Payload Too Large");
    }
}
