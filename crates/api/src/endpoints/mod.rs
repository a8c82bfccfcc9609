//! API endpoints.

mod categories;
mod comments;
mod meta;
mod posts;
mod users;

use axum::Router;

use crate::middleware::AppState;

pub use categories::CategoryResponse;
pub use comments::CommentResponse;
pub use posts::{PetitionResponse, PollResponse, PostResponse};
pub use users::{AuthorResponse, UserResponse};

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/posts", posts::router())
        .nest("/comments", comments::router())
        .nest("/categories", categories::router())
        .nest("/meta", meta::router())
        .merge(users::router())
}
