//! Error types and HTTP response conversion
//!
//! Every layer funnels into [`Error`]; [`Error::into_response`] is the single
//! translation point to the `{status, message}` envelope. The detailed
//! diagnostic travels in the response extensions as an [`ErrorReport`] so the
//! environment-aware `render_errors` middleware can expose it in development.

use std::fmt;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::AuthFailure;
use crate::query::QueryError;
use crate::repository::{RepositoryError, RepositoryErrorKind};

/// Message sent for unexpected failures outside development mode
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went very wrong!";

/// Result type alias using the service error
pub type Result<T> = std::result::Result<T, Error>;

/// Category of error, used for status mapping and development diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input failed model validation
    ValidationFailed,
    /// A unique field already holds the value
    DuplicateKey,
    /// The addressed resource does not exist
    NotFound,
    /// The query string could not be parsed
    MalformedQuery,
    /// Malformed request body, identifier or parameter
    BadRequest,
    /// Authentication required or failed
    Unauthorized,
    /// Authenticated but not allowed
    Forbidden,
    /// Too many requests from one client
    RateLimited,
    /// Anything the client cannot fix
    Unexpected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::DuplicateKey => write!(f, "duplicate_key"),
            Self::NotFound => write!(f, "not_found"),
            Self::MalformedQuery => write!(f, "malformed_query"),
            Self::BadRequest => write!(f, "bad_request"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Unexpected => write!(f, "unexpected"),
        }
    }
}

impl ErrorKind {
    /// Get the HTTP status code for this error kind
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationFailed
            | Self::DuplicateKey
            | Self::MalformedQuery
            | Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Operational errors are safe to describe to the client
    #[must_use]
    pub const fn is_operational(&self) -> bool {
        !matches!(self, Self::Unexpected)
    }
}

/// Main error type for the service
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Model validation failed
    #[error("Invalid input data. {0}")]
    ValidationFailed(String),

    /// Unique field collision
    #[error("Duplicate field value: {value:?} for {field}. Please use another value!")]
    DuplicateKey {
        /// The unique field
        field: String,
        /// The colliding value
        value: String,
    },

    /// Resource not found
    #[error("{0}")]
    NotFound(String),

    /// Query string rejected by the parser
    #[error("Invalid query: {0}")]
    MalformedQuery(#[from] QueryError),

    /// Bad request
    #[error("{0}")]
    BadRequest(String),

    /// Authentication error
    #[error("{0}")]
    Unauthorized(String),

    /// A guard step rejected the request
    #[error("{0}")]
    Auth(#[from] AuthFailure),

    /// Authorization error
    #[error("{0}")]
    Forbidden(String),

    /// Rate limit exceeded
    #[error("Too many requests from this IP, please try again in {retry_after_secs} seconds!")]
    RateLimited {
        /// Seconds until a request would be accepted
        retry_after_secs: u64,
    },

    /// Storage failure that is not the client's fault
    #[error("{0}")]
    Repository(RepositoryError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// The error category
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Self::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::MalformedQuery(_) => ErrorKind::MalformedQuery,
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Auth(failure) => failure.kind(),
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Config(_) | Self::Repository(_) | Self::Io(_) | Self::Unexpected(_) => {
                ErrorKind::Unexpected
            }
        }
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    /// The message a production client sees
    pub fn public_message(&self) -> String {
        if self.kind().is_operational() {
            self.to_string()
        } else {
            GENERIC_FAILURE_MESSAGE.to_string()
        }
    }

    /// Build a not found error for a resource identifier
    pub fn not_found(resource: &str, id: &str) -> Self {
        Self::NotFound(format!("No {} found with that ID: {}", resource, id))
    }
}

/// Envelope status: `fail` for client errors, `error` for server errors
pub fn envelope_status(status: StatusCode) -> &'static str {
    if status.is_client_error() {
        "fail"
    } else {
        "error"
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// `fail` or `error`
    pub status: String,

    /// Client-facing message
    pub message: String,

    /// Error category (development only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Full diagnostic (development only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    /// Create a production error body
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: envelope_status(status).to_string(),
            message: message.into(),
            error: None,
            detail: None,
        }
    }
}

/// Diagnostic attached to every error response's extensions
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// Error category
    pub kind: ErrorKind,

    /// Message sent in production
    pub public_message: String,

    /// Full diagnostic text
    pub detail: String,
}

impl ErrorReport {
    /// Render the development body: full message, kind and detail
    pub fn development_body(&self, status: StatusCode) -> ErrorResponse {
        let message = if self.kind.is_operational() {
            self.public_message.clone()
        } else {
            self.detail.clone()
        };
        ErrorResponse {
            status: envelope_status(status).to_string(),
            message,
            error: Some(self.kind.to_string()),
            detail: Some(self.detail.clone()),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = kind.status_code();
        let detail = match &self {
            Self::Repository(e) => format!("{} ({:?})", e, e.kind),
            other => other.to_string(),
        };

        if kind.is_operational() {
            tracing::debug!(kind = %kind, status = status.as_u16(), "{}", detail);
        } else {
            tracing::error!(kind = %kind, status = status.as_u16(), "{}", detail);
        }

        let report = ErrorReport {
            kind,
            public_message: self.public_message(),
            detail,
        };
        let body = ErrorResponse::new(status, report.public_message.clone());

        let mut response = (status, Json(body)).into_response();
        if let Self::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response.extensions_mut().insert(report);
        response
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

// Manual From implementations for boxed errors
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error::Unexpected(format!("Token signing failed: {}", err))
    }
}

impl From<RepositoryError> for Error {
    fn from(err: RepositoryError) -> Self {
        match err.kind {
            RepositoryErrorKind::DuplicateKey => {
                let (field, value) = err
                    .duplicate
                    .clone()
                    .unwrap_or_else(|| ("unknown".to_string(), String::new()));
                Error::DuplicateKey { field, value }
            }
            RepositoryErrorKind::NotFound => Error::NotFound(match (&err.collection, &err.document_id) {
                (Some(collection), Some(id)) => format!("No document in {} with ID {}", collection, id),
                _ => "Document not found".to_string(),
            }),
            _ => Error::Repository(err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Unexpected(format!("JSON error: {}", err))
    }
}
