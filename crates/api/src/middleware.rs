//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::{Next, from_fn_with_state},
    response::{IntoResponse, Response},
};
use civic_common::{AppError, Config, config::ForumConfig};
use civic_core::{
    CategoryService, CommentService, PetitionService, PollService, PostService, UserService,
};
use civic_db::repositories::{
    CategoryRepository, CommentRepository, CommentVoteRepository, PetitionRepository,
    PetitionSignatureRepository, PollRepository, PollVoteRepository, PostRepository,
    PostVoteRepository, UserRepository,
};
use sea_orm::DatabaseConnection;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub category_service: CategoryService,
    pub post_service: PostService,
    pub poll_service: PollService,
    pub petition_service: PetitionService,
    pub comment_service: CommentService,
    pub forum: ForumConfig,
}

impl AppState {
    /// Wire repositories and services over one database connection.
    #[must_use]
    pub fn new(db: &Arc<DatabaseConnection>, config: &Config) -> Self {
        let user_repo = UserRepository::new(Arc::clone(db));
        let category_repo = CategoryRepository::new(Arc::clone(db));
        let post_repo = PostRepository::new(Arc::clone(db));

        let poll_service = PollService::new(
            PollRepository::new(Arc::clone(db)),
            PollVoteRepository::new(Arc::clone(db)),
            post_repo.clone(),
        );
        let petition_service = PetitionService::new(
            PetitionRepository::new(Arc::clone(db)),
            PetitionSignatureRepository::new(Arc::clone(db)),
            post_repo.clone(),
            user_repo.clone(),
        );
        let post_service = PostService::new(
            post_repo.clone(),
            PostVoteRepository::new(Arc::clone(db)),
            user_repo.clone(),
            category_repo.clone(),
            poll_service.clone(),
            petition_service.clone(),
            config.forum.clone(),
        );
        let comment_service = CommentService::new(
            CommentRepository::new(Arc::clone(db)),
            CommentVoteRepository::new(Arc::clone(db)),
            post_repo,
            user_repo.clone(),
        );

        Self {
            user_service: UserService::new(user_repo),
            category_service: CategoryService::new(category_repo),
            post_service,
            poll_service,
            petition_service,
            comment_service,
            forum: config.forum.clone(),
        }
    }
}

/// Authentication middleware.
///
/// Resolves `Authorization: Bearer <token>` to a user and stores it in the
/// request extensions. Unknown tokens leave the request anonymous; handlers
/// that need a viewer reject it with 401. Lookup failures end the request.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    if let Some(token) = token {
        match state.user_service.authenticate_by_token(&token).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(AppError::Unauthorized) => {
                tracing::debug!("Bearer token did not resolve to a user");
            }
            Err(e) => return e.into_response(),
        }
    }

    next.run(req).await
}

/// The API router under `/api` with authentication applied.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", crate::router())
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
