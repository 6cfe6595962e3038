//! Request extractors with service error rejections

use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde_json::Value;

use crate::error::Error;
use crate::query::RawQuery;
use crate::repository::Document;

impl<S> FromRequestParts<S> for RawQuery
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|e| Error::BadRequest(format!("Invalid query string: {}", e.body_text())))?;
        Ok(RawQuery::from_pairs(pairs))
    }
}

/// A JSON object request body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonBody(pub Document);

impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|e| Error::BadRequest(e.body_text()))?;
        match value {
            Value::Object(doc) => Ok(Self(doc)),
            _ => Err(Error::BadRequest("Request body must be a JSON object".to_string())),
        }
    }
}
