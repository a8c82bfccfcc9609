//! Post endpoints: listing, creation, votes, polls, petitions, comments and
//! moderation.

use axum::{
    Router,
    extract::{Path, State},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use civic_common::AppResult;
use civic_core::{
    CommentDetails, CreateCommentInput, CreatePostInput, ListPostsInput, ModerationAction,
    PetitionDetails, PollDetails, PollVoteInput, PostDetails, PostPage, PostPayload,
    PostVoteResult, SignPetitionInput, SignatureDetails, engine,
};
use civic_db::{
    entities::{category, post::PostType, post_vote::VoteType, user},
    repositories::page_offset,
};
use serde::{Deserialize, Serialize};

use crate::{
    endpoints::{AuthorResponse, CommentResponse, comments::VoteRequest},
    extractors::{ApiJson, ApiQuery, AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Category summary embedded in a post.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRef {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub color: String,
}

impl From<category::Model> for CategoryRef {
    fn from(category: category::Model) -> Self {
        Self {
            id: category.id,
            name: category.name,
            slug: category.slug,
            color: category.color,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOptionResponse {
    pub id: String,
    pub text: String,
    pub votes: i32,
    pub percentage: u32,
}

/// Poll as shown to a viewer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub question: String,
    pub options: Vec<PollOptionResponse>,
    pub allow_multiple: bool,
    pub is_anonymous: bool,
    pub ends_at: Option<DateTime<Utc>>,
    pub total_votes: i32,
    pub is_active: bool,
    pub user_votes: Vec<String>,
}

impl PollResponse {
    fn new(details: PollDetails, now: DateTime<Utc>) -> Self {
        let is_active = details.is_active(now);
        let percentages = details.percentages();
        let options = details
            .options
            .into_iter()
            .zip(percentages)
            .map(|(option, percentage)| PollOptionResponse {
                id: option.id,
                text: option.text,
                votes: option.votes,
                percentage,
            })
            .collect();

        Self {
            question: details.poll.question,
            options,
            allow_multiple: details.poll.allow_multiple,
            is_anonymous: details.poll.is_anonymous,
            ends_at: details.poll.ends_at,
            total_votes: details.poll.total_votes,
            is_active,
            user_votes: details.user_votes,
        }
    }
}

/// Petition as shown to a viewer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PetitionResponse {
    pub target: String,
    pub goal: i32,
    pub signatures: i32,
    pub deadline: Option<DateTime<Utc>>,
    pub progress_percentage: f64,
    pub is_successful: bool,
    pub is_active: bool,
    pub user_signed: bool,
}

impl PetitionResponse {
    fn new(details: PetitionDetails, now: DateTime<Utc>) -> Self {
        let is_active = details.is_active(now);
        let progress_percentage = details.progress_percentage();
        Self {
            target: details.petition.target,
            goal: details.petition.goal,
            signatures: details.petition.signatures,
            deadline: details.petition.deadline,
            progress_percentage,
            is_successful: details.petition.is_successful,
            is_active,
            user_signed: details.user_signed,
        }
    }
}

/// Post as shown to a viewer.
///
/// `poll` is present only on polls and `petition` only on petitions.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: String,
    pub title: String,
    pub content: String,
    pub post_type: PostType,
    pub author: AuthorResponse,
    pub category: Option<CategoryRef>,
    pub tags: Vec<String>,
    pub views: i32,
    pub upvotes: i32,
    pub downvotes: i32,
    pub score: i32,
    pub comments_count: i32,
    pub user_vote: Option<VoteType>,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub petition: Option<PetitionResponse>,
}

impl PostResponse {
    fn new(details: PostDetails, now: DateTime<Utc>) -> Self {
        let post = details.post;
        let tags = serde_json::from_value(post.tags).unwrap_or_default();
        let (poll, petition) = match details.payload {
            PostPayload::None => (None, None),
            PostPayload::Poll(poll) => (Some(PollResponse::new(poll, now)), None),
            PostPayload::Petition(petition) => (None, Some(PetitionResponse::new(petition, now))),
        };

        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            post_type: post.post_type,
            author: details.author.into(),
            category: details.category.map(Into::into),
            tags,
            views: post.views,
            upvotes: post.upvotes,
            downvotes: post.downvotes,
            score: post.score,
            comments_count: post.comments_count,
            user_vote: details.user_vote,
            is_pinned: post.is_pinned,
            is_locked: post.is_locked,
            is_featured: post.is_featured,
            created_at: post.created_at,
            updated_at: post.updated_at,
            poll,
            petition,
        }
    }
}

/// One page of posts.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListResponse {
    pub results: Vec<PostResponse>,
    pub count: u64,
    pub page: u64,
    pub limit: u64,
    pub has_more: bool,
}

impl PostListResponse {
    fn new(page: PostPage, now: DateTime<Utc>) -> Self {
        Self {
            has_more: page.page.saturating_mul(page.limit) < page.count,
            results: page
                .results
                .into_iter()
                .map(|details| PostResponse::new(details, now))
                .collect(),
            count: page.count,
            page: page.page,
            limit: page.limit,
        }
    }
}

/// Post tally after a vote.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub upvotes: i32,
    pub downvotes: i32,
    pub score: i32,
    pub user_vote: Option<VoteType>,
}

impl From<PostVoteResult> for VoteResponse {
    fn from(result: PostVoteResult) -> Self {
        Self {
            upvotes: result.post.upvotes,
            downvotes: result.post.downvotes,
            score: result.post.score,
            user_vote: result.user_vote,
        }
    }
}

/// A petition signature. `signer` is hidden for anonymous signatures.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureResponse {
    pub signer: Option<AuthorResponse>,
    pub comment: Option<String>,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

impl From<SignatureDetails> for SignatureResponse {
    fn from(signature: SignatureDetails) -> Self {
        Self {
            signer: signature.signer.map(Into::into),
            comment: signature.comment,
            is_anonymous: signature.is_anonymous,
            created_at: signature.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// List posts.
async fn list_posts(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListPostsInput>,
) -> AppResult<ApiResponse<PostListResponse>> {
    let page = state.post_service.list(viewer.id(), query).await?;
    Ok(ApiResponse::ok(PostListResponse::new(page, Utc::now())))
}

/// Create a post.
async fn create_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreatePostInput>,
) -> AppResult<ApiResponse<PostResponse>> {
    let details = state.post_service.create(&user, req).await?;
    Ok(ApiResponse::ok(PostResponse::new(details, Utc::now())))
}

/// Get a post, counting the view.
async fn get_post(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<PostResponse>> {
    let details = state.post_service.get(viewer.id(), &post_id).await?;
    Ok(ApiResponse::ok(PostResponse::new(details, Utc::now())))
}

/// Toggle the viewer's vote on a post.
async fn vote_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    ApiJson(req): ApiJson<VoteRequest>,
) -> AppResult<ApiResponse<VoteResponse>> {
    let vote_type = engine::parse_vote_type(&req.vote_type)?;
    let result = state.post_service.vote(&user, &post_id, vote_type).await?;
    Ok(ApiResponse::ok(result.into()))
}

/// Vote on a poll.
async fn vote_poll(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    ApiJson(req): ApiJson<PollVoteInput>,
) -> AppResult<ApiResponse<PollResponse>> {
    let details = state.poll_service.vote(&user, &post_id, req).await?;
    Ok(ApiResponse::ok(PollResponse::new(details, Utc::now())))
}

/// Sign a petition. The body is optional.
async fn sign_petition(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    req: Option<ApiJson<SignPetitionInput>>,
) -> AppResult<ApiResponse<PetitionResponse>> {
    let req = req.map(|ApiJson(req)| req).unwrap_or_default();
    let details = state.petition_service.sign(&user, &post_id, req).await?;
    Ok(ApiResponse::ok(PetitionResponse::new(details, Utc::now())))
}

/// List petition signatures, newest first.
async fn list_signatures(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<ApiResponse<Vec<SignatureResponse>>> {
    let limit = query
        .limit
        .unwrap_or(state.forum.default_page_size)
        .clamp(1, state.forum.max_page_size.max(1));
    let offset = page_offset(query.page.unwrap_or(1), limit)?;

    let signatures = state
        .petition_service
        .signatures(&post_id, limit, offset)
        .await?;
    Ok(ApiResponse::ok(
        signatures.into_iter().map(Into::into).collect(),
    ))
}

/// Get the comment thread of a post.
async fn list_comments(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<Vec<CommentResponse>>> {
    let thread = state.comment_service.thread(&post_id, viewer.id()).await?;
    Ok(ApiResponse::ok(thread.into_iter().map(Into::into).collect()))
}

/// Add a comment or reply.
async fn create_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    ApiJson(req): ApiJson<CreateCommentInput>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let details: CommentDetails = state
        .comment_service
        .add_comment(&user, &post_id, req)
        .await?;
    Ok(ApiResponse::ok(details.into()))
}

async fn moderate(
    state: &AppState,
    user: &user::Model,
    post_id: &str,
    action: ModerationAction,
) -> AppResult<ApiResponse<PostResponse>> {
    let details = state.post_service.moderate(user, post_id, action).await?;
    Ok(ApiResponse::ok(PostResponse::new(details, Utc::now())))
}

async fn lock_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<PostResponse>> {
    moderate(&state, &user, &post_id, ModerationAction::Lock).await
}

async fn unlock_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<PostResponse>> {
    moderate(&state, &user, &post_id, ModerationAction::Unlock).await
}

async fn pin_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<PostResponse>> {
    moderate(&state, &user, &post_id, ModerationAction::Pin).await
}

async fn unpin_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<PostResponse>> {
    moderate(&state, &user, &post_id, ModerationAction::Unpin).await
}

async fn feature_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<PostResponse>> {
    moderate(&state, &user, &post_id, ModerationAction::Feature).await
}

async fn unfeature_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<PostResponse>> {
    moderate(&state, &user, &post_id, ModerationAction::Unfeature).await
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route("/{id}", get(get_post))
        .route("/{id}/vote", post(vote_post))
        .route("/{id}/poll/vote", post(vote_poll))
        .route("/{id}/petition/sign", post(sign_petition))
        .route("/{id}/petition/signatures", get(list_signatures))
        .route("/{id}/comments", get(list_comments).post(create_comment))
        .route("/{id}/lock", post(lock_post))
        .route("/{id}/unlock", post(unlock_post))
        .route("/{id}/pin", post(pin_post))
        .route("/{id}/unpin", post(unpin_post))
        .route("/{id}/feature", post(feature_post))
        .route("/{id}/unfeature", post(unfeature_post))
}
