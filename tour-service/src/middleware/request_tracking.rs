//! Request tracking middleware
//!
//! Generates a TypeID request id for every request, echoes it on the
//! response and masks credential headers in trace output.

use axum::{http::HeaderName, Router};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    sensitive_headers::SetSensitiveRequestHeadersLayer,
};

use crate::config::RequestTrackingConfig;
use crate::ids::MakeTypedRequestId;

/// Headers masked in logs and traces
pub const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie"];

/// Header carrying the request id when the configured name is unusable
pub const DEFAULT_REQUEST_ID_HEADER: &str = "x-request-id";

fn request_id_header(config: &RequestTrackingConfig) -> HeaderName {
    HeaderName::try_from(config.request_id_header.as_str()).unwrap_or_else(|_| {
        tracing::warn!(
            header = %config.request_id_header,
            "invalid request id header name, falling back to {}",
            DEFAULT_REQUEST_ID_HEADER
        );
        HeaderName::from_static(DEFAULT_REQUEST_ID_HEADER)
    })
}

/// Layer that generates `req_`-prefixed request ids
pub fn request_id_layer(header: HeaderName) -> SetRequestIdLayer<MakeTypedRequestId> {
    SetRequestIdLayer::new(header, MakeTypedRequestId)
}

/// Layer that copies the request id onto the response
pub fn request_id_propagation_layer(header: HeaderName) -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(header)
}

/// Layer that marks credential headers as sensitive
pub fn sensitive_headers_layer() -> SetSensitiveRequestHeadersLayer {
    let headers = SENSITIVE_HEADERS
        .iter()
        .copied()
        .map(HeaderName::from_static)
        .collect::<Vec<_>>();

    SetSensitiveRequestHeadersLayer::new(headers)
}

/// Apply the tracking layers selected by configuration
///
/// Propagation is layered inside generation so the generated id is the one
/// echoed back.
pub fn apply_request_tracking(mut app: Router, config: &RequestTrackingConfig) -> Router {
    let header = request_id_header(config);

    if config.mask_sensitive_headers {
        app = app.layer(sensitive_headers_layer());
    }
    if config.propagate_headers {
        app = app.layer(request_id_propagation_layer(header.clone()));
    }
    if config.request_id_enabled {
        app = app.layer(request_id_layer(header));
    }
    app
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    fn app(config: &RequestTrackingConfig) -> Router {
        apply_request_tracking(Router::new().route("/", get(|| async { "ok" })), config)
    }

    #[tokio::test]
    async fn test_generated_request_id_is_echoed() {
        let response = app(&RequestTrackingConfig::default())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let id = response.headers().get("x-request-id").unwrap().to_str().unwrap();
        assert!(id.starts_with("req_"));
    }

    #[tokio::test]
    async fn test_incoming_request_id_is_kept() {
        let response = app(&RequestTrackingConfig::default())
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-request-id", "req_from_upstream")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-request-id"], "req_from_upstream");
    }

    #[tokio::test]
    async fn test_custom_header_and_disabled_tracking() {
        let config = RequestTrackingConfig {
            request_id_header: "x-correlation-id".to_string(),
            ..Default::default()
        };
        let response = app(&config)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-correlation-id"));

        let config = RequestTrackingConfig {
            request_id_enabled: false,
            propagate_headers: false,
            ..Default::default()
        };
        let response = app(&config)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(!response.headers().contains_key("x-request-id"));
    }

    #[test]
    fn test_invalid_header_name_falls_back() {
        let config = RequestTrackingConfig {
            request_id_header: "not a header".to_string(),
            ..Default::default()
        };
        assert_eq!(request_id_header(&config), DEFAULT_REQUEST_ID_HEADER);
    }

    #[test]
    fn test_sensitive_headers_constant() {
        assert!(SENSITIVE_HEADERS.contains(&"authorization"));
        assert!(SENSITIVE_HEADERS.contains(&"cookie"));
    }
}
