//! TypeID identifiers for requests and documents
//!
//! Both are a readable prefix followed by a base32-encoded UUIDv7, so they
//! sort by creation time.
//!
//! ```rust
//! use tour_service::ids::{is_document_id, new_document_id, RequestId};
//!
//! assert!(RequestId::new().as_str().starts_with("req_"));
//!
//! let tour_id = new_document_id("tour");
//! assert!(is_document_id("tour", &tour_id));
//! ```

use std::fmt;
use std::str::FromStr;

use http::{HeaderValue, Request};
use mti::prelude::*;
use tower_http::request_id::{MakeRequestId, RequestId as TowerRequestId};

/// Identifier attached to every request span and echoed in `x-request-id`
///
/// Format: `req_<base32-encoded-uuidv7>`, e.g. `req_01h455vb4pex5vsknk084sn02q`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(MagicTypeId);

impl RequestId {
    /// The prefix used for request IDs
    pub const PREFIX: &'static str = "req";

    /// Creates a new time-sortable request ID
    #[must_use]
    pub fn new() -> Self {
        Self(Self::PREFIX.create_type_id::<V7>())
    }

    /// Returns the request ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generates [`RequestId`]s for `tower_http::request_id::SetRequestIdLayer`
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeTypedRequestId;

impl MakeRequestId for MakeTypedRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<TowerRequestId> {
        let header_value = HeaderValue::from_str(RequestId::new().as_str()).ok()?;
        Some(TowerRequestId::new(header_value))
    }
}

/// Create a fresh document id for a collection prefix
///
/// Prefixes must be lowercase ASCII; every resource declares a constant one.
pub fn new_document_id(prefix: &str) -> String {
    prefix.create_type_id::<V7>().to_string()
}

/// Check that a path segment is shaped like a document id of `prefix`
pub fn is_document_id(prefix: &str, candidate: &str) -> bool {
    MagicTypeId::from_str(candidate)
        .map(|id| id.prefix().as_str() == prefix)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_shape() {
        let id = RequestId::new();
        assert!(id.to_string().starts_with("req_"));
        // prefix (3) + underscore (1) + suffix (26)
        assert_eq!(id.as_str().len(), 30);
    }

    #[test]
    fn test_ids_sort_by_creation() {
        let first = new_document_id("review");
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = new_document_id("review");
        assert!(first < second);
    }

    #[test]
    fn test_document_ids() {
        let id = new_document_id("booking");
        assert!(id.starts_with("booking_"));
        assert!(is_document_id("booking", &id));
        assert!(!is_document_id("tour", &id));
        assert!(!is_document_id("tour", "tour_nope"));
        assert!(!is_document_id("tour", "507f1f77bcf86cd799439011"));
    }

    #[test]
    fn test_make_typed_request_id() {
        let request = Request::builder().body(()).unwrap();
        let id = MakeTypedRequestId.make_request_id(&request).unwrap();
        let header_value = id.into_header_value();
        assert!(header_value.to_str().unwrap().starts_with("req_"));
    }
}
