//! HTTP API layer for civic-forum.
//!
//! - **Endpoints**: posts, polls, petitions, comment threads, categories
//! - **Extractors**: viewer authentication
//! - **Middleware**: application state and bearer token resolution
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::{AppState, app};
