//! Generic REST handlers for resource collections
//!
//! [`ResourceHandlers`] implements the list / get / create / update / delete
//! pattern once for every [`Resource`](crate::models::Resource). Reads run
//! the request's query string through the
//! [`QueryBuilder`](crate::query::QueryBuilder), AND in the model decorator,
//! populate relations and present the result in the success envelope.
//!
//! # Integration with Axum
//!
//! The free functions are ready-made axum handlers:
//!
//! ```rust,ignore
//! use axum::{routing::get, Router};
//! use tour_service::handlers::{get_one, list_all};
//! use tour_service::models::Booking;
//!
//! let router = Router::new()
//!     .route("/", get(list_all::<Booking, MemoryStore>))
//!     .route("/{id}", get(get_one::<Booking, MemoryStore>))
//!     .with_state(state);
//! ```

mod extract;
mod populate;
mod resource;
mod response;
mod traits;

pub use extract::JsonBody;
pub use populate::{populate_all, populate_document, MAX_POPULATE_DEPTH};
pub use resource::{create_one, delete_one, get_one, list_all, update_one, ResourceHandlers};
pub use response::{ItemResponse, ListResponse, SUCCESS};
pub use traits::CollectionHandler;
