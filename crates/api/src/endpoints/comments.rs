//! Comment endpoints.

use axum::{
    Router,
    extract::{Path, State},
    routing::post,
};
use chrono::{DateTime, Utc};
use civic_common::AppResult;
use civic_core::{CommentDetails, engine::{self, ThreadNode}};
use civic_db::entities::post_vote::VoteType;
use serde::{Deserialize, Serialize};

use crate::{
    endpoints::AuthorResponse,
    extractors::{ApiJson, AuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Vote request shared by posts and comments.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub vote_type: String,
}

/// A comment with its nested replies.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub post_id: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub author: AuthorResponse,
    pub upvotes: i32,
    pub downvotes: i32,
    pub score: i32,
    pub user_vote: Option<VoteType>,
    pub created_at: DateTime<Utc>,
    pub replies: Vec<CommentResponse>,
}

impl From<CommentDetails> for CommentResponse {
    fn from(details: CommentDetails) -> Self {
        let comment = details.comment;
        Self {
            id: comment.id,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            content: comment.content,
            author: details.author.into(),
            upvotes: comment.upvotes,
            downvotes: comment.downvotes,
            score: comment.score,
            user_vote: details.user_vote,
            created_at: comment.created_at,
            replies: Vec::new(),
        }
    }
}

impl From<ThreadNode<CommentDetails>> for CommentResponse {
    fn from(node: ThreadNode<CommentDetails>) -> Self {
        let mut response = Self::from(node.item);
        response.replies = node.replies.into_iter().map(Into::into).collect();
        response
    }
}

/// Toggle the viewer's vote on a comment.
async fn vote_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    ApiJson(req): ApiJson<VoteRequest>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let vote_type = engine::parse_vote_type(&req.vote_type)?;
    let details = state
        .comment_service
        .vote(&user, &comment_id, vote_type)
        .await?;
    Ok(ApiResponse::ok(details.into()))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/vote", post(vote_comment))
}
