//! Security headers middleware
//!
//! Applies standard HTTP security headers (HSTS, X-Content-Type-Options, etc.)
//! using `tower_http::set_header::SetResponseHeaderLayer`.

use axum::http::{header, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::SecurityHeadersConfig;

/// Apply security headers to the router based on configuration.
///
/// HSTS is only sent in production, where the service sits behind TLS.
pub fn apply_security_headers(
    mut app: Router,
    config: &SecurityHeadersConfig,
    production: bool,
) -> Router {
    if !config.enabled {
        return app;
    }

    if production && config.hsts {
        let value = format!("max-age={}; includeSubDomains", config.hsts_max_age_secs);
        if let Ok(hv) = HeaderValue::from_str(&value) {
            app = app.layer(SetResponseHeaderLayer::overriding(
                header::STRICT_TRANSPORT_SECURITY,
                hv,
            ));
        }
    }

    if config.x_content_type_options {
        app = app.layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ));
    }

    if !config.x_frame_options.is_empty() {
        if let Ok(hv) = HeaderValue::from_str(&config.x_frame_options) {
            app = app.layer(SetResponseHeaderLayer::if_not_present(
                header::X_FRAME_OPTIONS,
                hv,
            ));
        }
    }

    // Modern recommendation: disable the browser XSS filter
    if config.x_xss_protection {
        app = app.layer(SetResponseHeaderLayer::if_not_present(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("0"),
        ));
    }

    if !config.referrer_policy.is_empty() {
        if let Ok(hv) = HeaderValue::from_str(&config.referrer_policy) {
            app = app.layer(SetResponseHeaderLayer::if_not_present(
                header::REFERRER_POLICY,
                hv,
            ));
        }
    }

    app
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    async fn headers_for(config: &SecurityHeadersConfig, production: bool) -> axum::http::HeaderMap {
        let app = apply_security_headers(
            Router::new().route("/", get(|| async { "ok" })),
            config,
            production,
        );
        app.oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap()
            .headers()
            .clone()
    }

    #[tokio::test]
    async fn test_default_headers() {
        let headers = headers_for(&SecurityHeadersConfig::default(), false).await;
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_XSS_PROTECTION], "0");
        assert!(headers.contains_key(header::X_FRAME_OPTIONS));
        assert!(!headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
    }

    #[tokio::test]
    async fn test_hsts_in_production() {
        let headers = headers_for(&SecurityHeadersConfig::default(), true).await;
        let hsts = headers[header::STRICT_TRANSPORT_SECURITY].to_str().unwrap();
        assert!(hsts.starts_with("max-age="));
    }

    #[tokio::test]
    async fn test_disabled() {
        let config = SecurityHeadersConfig {
            enabled: false,
            ..Default::default()
        };
        let headers = headers_for(&config, true).await;
        assert!(!headers.contains_key(header::X_CONTENT_TYPE_OPTIONS));
    }
}
