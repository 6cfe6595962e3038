//! Middleware modules for error rendering, rate limiting, and more

pub mod errors;
pub mod rate_limit;
pub mod request_tracking;
pub mod security_headers;

pub use errors::render_errors;
pub use rate_limit::{client_key, RateLimit};
pub use request_tracking::{
    apply_request_tracking, request_id_layer, request_id_propagation_layer,
    sensitive_headers_layer, SENSITIVE_HEADERS,
};
pub use security_headers::apply_security_headers;
