//! Success envelopes
//!
//! ```text
//! item   {"status": "success", "token"?: "...", "data": {"tour": {...}}}
//! list   {"status": "success", "results": 2, "data": {"tours": [...]}}
//! ```
//!
//! Failures use the `{status, message}` body produced by
//! [`Error`](crate::error::Error).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::repository::Document;

/// Envelope status for successful responses
pub const SUCCESS: &str = "success";

struct Keyed<'a, T> {
    key: &'a str,
    value: &'a T,
}

impl<T: Serialize> Serialize for Keyed<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.key, self.value)?;
        map.end()
    }
}

/// Single item response wrapper
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResponse {
    status_code: StatusCode,
    key: &'static str,
    item: Document,
    token: Option<String>,
}

impl ItemResponse {
    /// A 200 response carrying `item` under `data.<key>`
    pub fn new(key: &'static str, item: Document) -> Self {
        Self {
            status_code: StatusCode::OK,
            key,
            item,
            token: None,
        }
    }

    /// Respond with 201 Created
    #[must_use]
    pub fn created(mut self) -> Self {
        self.status_code = StatusCode::CREATED;
        self
    }

    /// Include a session token at the top level
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// HTTP status of the response
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// The wrapped document
    pub fn item(&self) -> &Document {
        &self.item
    }

    /// Unwrap the document
    pub fn into_item(self) -> Document {
        self.item
    }
}

impl Serialize for ItemResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("status", SUCCESS)?;
        if let Some(token) = &self.token {
            map.serialize_entry("token", token)?;
        }
        map.serialize_entry(
            "data",
            &Keyed {
                key: self.key,
                value: &self.item,
            },
        )?;
        map.end()
    }
}

impl IntoResponse for ItemResponse {
    fn into_response(self) -> Response {
        (self.status_code, Json(self)).into_response()
    }
}

/// List response wrapper
#[derive(Debug, Clone, PartialEq)]
pub struct ListResponse<T = Document> {
    key: &'static str,
    items: Vec<T>,
}

impl<T> ListResponse<T> {
    /// A 200 response carrying `items` under `data.<key>`
    pub fn new(key: &'static str, items: Vec<T>) -> Self {
        Self { key, items }
    }

    /// Number of items
    pub fn results(&self) -> usize {
        self.items.len()
    }

    /// The wrapped items
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Unwrap the items
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T: Serialize> Serialize for ListResponse<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("status", SUCCESS)?;
        map.serialize_entry("results", &self.items.len())?;
        map.serialize_entry(
            "data",
            &Keyed {
                key: self.key,
                value: &self.items,
            },
        )?;
        map.end()
    }
}

impl<T: Serialize> IntoResponse for ListResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}
