//! # tour-service
//!
//! REST API for booking guided tours: CRUD for tours, users, reviews and
//! bookings over a pluggable document store, with a query-string driven
//! filter/sort/projection/pagination builder shared by every list route.
//!
//! ## Features
//!
//! - **Query builder**: `?price[lt]=1000&sort=-ratingsAverage&fields=name&page=2&limit=10`
//! - **Generic handlers**: one [`CollectionHandler`](handlers::CollectionHandler) for every model
//! - **Authentication**: HS256 JWT in a bearer header or cookie, Argon2id passwords
//! - **Authorization**: guard chains (`protect`, then `restrict_to`) per route
//! - **Password reset**: single-use blake3-hashed tokens delivered by a [`Mailer`](auth::Mailer)
//! - **Middleware stack**: per-client rate limiting, security headers, request tracking,
//!   panic recovery, body size limits
//! - **Graceful shutdown**: Proper signal handling (SIGTERM, SIGINT)
//!
//! ## Example
//!
//! ```rust,no_run
//! use tour_service::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Load configuration
//!     let config = Config::load()?;
//!
//!     // Initialize tracing
//!     init_tracing(&config)?;
//!
//!     // Build application state over an in-memory store
//!     let store = MemoryStore::new();
//!     register_indexes(&store).await?;
//!     let state = AppState::new(config.clone(), store)?;
//!
//!     // Run server
//!     Server::new(config).serve(app(state)).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod health;
pub mod ids;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod query;
pub mod repository;
pub mod routes;
pub mod server;
pub mod state;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::auth::{CurrentUser, GuardChain, LogMailer, Mailer, PasswordHasher};
    pub use crate::config::{Config, Environment, RateLimitConfig};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::handlers::{CollectionHandler, ItemResponse, ListResponse, ResourceHandlers};
    pub use crate::health::{health, readiness};
    pub use crate::middleware::RateLimit;
    pub use crate::models::{register_indexes, Booking, Resource, Review, Role, Tour, User};
    pub use crate::observability::init_tracing;
    pub use crate::query::{QueryBuilder, RawQuery};
    pub use crate::repository::{DocumentStore, Filter, FilterCondition, FindQuery, MemoryStore};
    pub use crate::routes::app;
    pub use crate::server::Server;
    pub use crate::state::AppState;

    pub use axum::{
        extract::{Path, Query, State},
        routing::{delete, get, patch, post},
        Json, Router,
    };
}
