//! Health check handlers

use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::models::{Resource, Tour};
use crate::repository::{DocumentStore, Filter};
use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service name
    pub service: String,

    /// Version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Readiness check response with dependency status
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Overall readiness status
    pub ready: bool,

    /// Service name
    pub service: String,

    /// Dependency statuses
    pub dependencies: HashMap<String, DependencyStatus>,
}

/// Individual dependency status
#[derive(Debug, Serialize, Deserialize)]
pub struct DependencyStatus {
    /// Dependency is healthy
    pub healthy: bool,

    /// Optional message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Simple health check (liveness probe)
///
/// Always returns 200 OK if the service is running.
pub async fn health<S: DocumentStore>(State(state): State<AppState<S>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        service: state.config().service.name.clone(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    };

    (StatusCode::OK, Json(response))
}

/// Readiness check (readiness probe)
///
/// Returns 503 Service Unavailable when the document store does not answer.
pub async fn readiness<S: DocumentStore>(State(state): State<AppState<S>>) -> impl IntoResponse {
    let mut dependencies = HashMap::new();

    let store = match state.store().count(Tour::COLLECTION, &Filter::new()).await {
        Ok(tours) => DependencyStatus {
            healthy: true,
            message: Some(format!("{} tours", tours)),
        },
        Err(e) => {
            tracing::error!("Document store health check failed: {}", e);
            DependencyStatus {
                healthy: false,
                message: Some(e.to_string()),
            }
        }
    };
    let ready = store.healthy;
    dependencies.insert("store".to_string(), store);

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready,
            service: state.config().service.name.clone(),
            dependencies,
        }),
    )
}
