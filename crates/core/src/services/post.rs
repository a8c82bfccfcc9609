//! Post service.

use std::collections::HashMap;

use chrono::Utc;
use civic_common::{AppError, AppResult, IdGenerator, config::ForumConfig};
use civic_db::{
    entities::{PostType, VoteType, category, post, user},
    repositories::{
        CategoryRepository, NewPostPayload, PostFilter, PostOrdering, PostRepository,
        PostVoteRepository, UserRepository, from_column, page_offset,
    },
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

use crate::engine::{self, VoteChange, VoteTally};
use crate::services::petition::{CreatePetitionInput, PetitionDetails, PetitionService};
use crate::services::poll::{CreatePollInput, PollDetails, PollService};

/// Longest accepted tag, in characters.
pub const MAX_TAG_LENGTH: usize = 50;

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    vote_repo: PostVoteRepository,
    user_repo: UserRepository,
    category_repo: CategoryRepository,
    poll_service: PollService,
    petition_service: PetitionService,
    limits: ForumConfig,
    id_gen: IdGenerator,
}

/// Type of a new post together with the payload that type requires.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "postType", rename_all = "lowercase")]
pub enum PostKindInput {
    Discussion,
    Announcement,
    Poll { poll: CreatePollInput },
    Petition { petition: CreatePetitionInput },
}

impl PostKindInput {
    #[must_use]
    pub const fn post_type(&self) -> PostType {
        match self {
            Self::Discussion => PostType::Discussion,
            Self::Announcement => PostType::Announcement,
            Self::Poll { .. } => PostType::Poll,
            Self::Petition { .. } => PostType::Petition,
        }
    }
}

/// Input for creating a new post.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(min = 1, max = 20000))]
    pub content: String,

    pub category_id: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(flatten)]
    pub kind: PostKindInput,
}

/// Query for post listings. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPostsInput {
    /// Category slug
    pub category: Option<String>,
    pub post_type: Option<String>,
    /// Author user ID
    pub author: Option<String>,
    pub is_pinned: Option<bool>,
    pub is_featured: Option<bool>,
    pub search: Option<String>,
    /// Comma-separated tags, all of which must match
    pub tags: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Type-specific part of a post.
#[derive(Debug, Clone)]
pub enum PostPayload {
    None,
    Poll(PollDetails),
    Petition(PetitionDetails),
}

/// Post with author, category, payload and the viewer's vote.
#[derive(Debug, Clone)]
pub struct PostDetails {
    pub post: post::Model,
    pub author: user::Model,
    pub category: Option<category::Model>,
    pub payload: PostPayload,
    pub user_vote: Option<VoteType>,
}

/// One page of a post listing.
#[derive(Debug, Clone)]
pub struct PostPage {
    pub results: Vec<PostDetails>,
    pub count: u64,
    pub page: u64,
    pub limit: u64,
}

/// Result of a post vote.
#[derive(Debug, Clone)]
pub struct PostVoteResult {
    pub post: post::Model,
    pub user_vote: Option<VoteType>,
    pub change: VoteChange,
}

/// Moderation actions available to officials and admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Lock,
    Unlock,
    Pin,
    Unpin,
    Feature,
    Unfeature,
}

/// Trim, lowercase and deduplicate tags, rejecting unusable ones.
pub fn normalize_tags(tags: &[String], max_tags: usize) -> AppResult<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().trim_start_matches('#').to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LENGTH {
            return Err(AppError::Validation(format!(
                "Tag is too long (max {MAX_TAG_LENGTH} characters)"
            )));
        }
        if tag.contains(['"', '%', '\\']) {
            return Err(AppError::Validation(format!("Invalid tag: {tag}")));
        }
        if !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }

    if normalized.len() > max_tags {
        return Err(AppError::Validation(format!(
            "Too many tags (max {max_tags})"
        )));
    }

    Ok(normalized)
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub const fn new(
        post_repo: PostRepository,
        vote_repo: PostVoteRepository,
        user_repo: UserRepository,
        category_repo: CategoryRepository,
        poll_service: PollService,
        petition_service: PetitionService,
        limits: ForumConfig,
    ) -> Self {
        Self {
            post_repo,
            vote_repo,
            user_repo,
            category_repo,
            poll_service,
            petition_service,
            limits,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a post with its poll or petition.
    pub async fn create(&self, author: &user::Model, input: CreatePostInput) -> AppResult<PostDetails> {
        input.validate()?;

        let title = input.title.trim();
        let content = input.content.trim();
        if title.is_empty() || content.is_empty() {
            return Err(AppError::Validation(
                "Title and content cannot be empty".to_string(),
            ));
        }

        let post_type = input.kind.post_type();
        if post_type == PostType::Announcement && !author.role.can_moderate() {
            return Err(AppError::Forbidden(
                "Only officials can publish announcements".to_string(),
            ));
        }

        let category = match &input.category_id {
            Some(category_id) => Some(
                self.category_repo
                    .find_by_id(category_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Category not found: {category_id}")))?,
            ),
            None => None,
        };

        let tags = normalize_tags(&input.tags, self.limits.max_tags)?;
        let now = Utc::now();
        let post_id = self.id_gen.generate();

        let payload = match input.kind {
            PostKindInput::Discussion | PostKindInput::Announcement => NewPostPayload::None,
            PostKindInput::Poll { poll } => {
                self.poll_service
                    .build_payload(&post_id, poll, self.limits.max_poll_options, now)?
            }
            PostKindInput::Petition { petition } => {
                PetitionService::build_payload(&post_id, petition, now)?
            }
        };

        let model = post::ActiveModel {
            id: Set(post_id.clone()),
            title: Set(title.to_string()),
            content: Set(content.to_string()),
            post_type: Set(post_type),
            author_id: Set(author.id.clone()),
            category_id: Set(category.as_ref().map(|c| c.id.clone())),
            tags: Set(serde_json::json!(tags)),
            views: Set(0),
            upvotes: Set(0),
            downvotes: Set(0),
            score: Set(0),
            comments_count: Set(0),
            is_pinned: Set(false),
            is_locked: Set(false),
            is_featured: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let post = self.post_repo.create_with_payload(model, payload).await?;
        tracing::info!(post_id = %post.id, author_id = %author.id, post_type = ?post.post_type, "Created post");

        let payload = self.load_payload(&post, Some(&author.id)).await?;
        Ok(PostDetails {
            post,
            author: author.clone(),
            category,
            payload,
            user_vote: None,
        })
    }

    /// List posts with filters, ordering and pagination.
    pub async fn list(&self, viewer_id: Option<&str>, input: ListPostsInput) -> AppResult<PostPage> {
        let page = input.page.unwrap_or(1).max(1);
        let limit = input
            .limit
            .unwrap_or(self.limits.default_page_size)
            .clamp(1, self.limits.max_page_size.max(1));
        page_offset(page, limit)?;

        let ordering = match input.ordering.as_deref() {
            None | Some("") => PostOrdering::default(),
            Some(value) => PostOrdering::parse(value)
                .ok_or_else(|| AppError::Validation(format!("Invalid ordering: {value}")))?,
        };
        let post_type = match input.post_type.as_deref() {
            None | Some("") => None,
            Some(value) => Some(
                PostType::parse(value)
                    .ok_or_else(|| AppError::Validation(format!("Invalid post type: {value}")))?,
            ),
        };
        let tags = match input.tags.as_deref() {
            Some(tags) => {
                let tags: Vec<String> = tags.split(',').map(str::to_string).collect();
                normalize_tags(&tags, usize::MAX)?
            }
            None => Vec::new(),
        };

        let categories: HashMap<String, category::Model> = self
            .category_repo
            .find_all()
            .await?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        let category_id = match input.category.as_deref().filter(|slug| !slug.is_empty()) {
            Some(slug) => match categories.values().find(|c| c.slug == slug) {
                Some(category) => Some(category.id.clone()),
                // Unknown category: nothing can match
                None => {
                    return Ok(PostPage {
                        results: Vec::new(),
                        count: 0,
                        page,
                        limit,
                    });
                }
            },
            None => None,
        };

        let filter = PostFilter {
            category_id,
            post_type,
            author_id: input.author.filter(|author| !author.is_empty()),
            is_pinned: input.is_pinned,
            is_featured: input.is_featured,
            search: input.search,
            tags,
        };
        let (posts, count) = self.post_repo.list(&filter, ordering, page, limit).await?;

        let post_ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
        let mut author_ids: Vec<String> = posts.iter().map(|p| p.author_id.clone()).collect();
        author_ids.sort();
        author_ids.dedup();

        let authors: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&author_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        let votes = match viewer_id {
            Some(viewer_id) => self.vote_repo.find_for_posts(viewer_id, &post_ids).await?,
            None => HashMap::new(),
        };

        let mut results = Vec::with_capacity(posts.len());
        for post in posts {
            let Some(author) = authors.get(&post.author_id).cloned() else {
                tracing::warn!(post_id = %post.id, author_id = %post.author_id, "Skipping post with unknown author");
                continue;
            };
            let payload = self.load_payload(&post, viewer_id).await?;
            let category = post
                .category_id
                .as_ref()
                .and_then(|id| categories.get(id))
                .cloned();
            let user_vote = votes.get(&post.id).copied();
            results.push(PostDetails {
                post,
                author,
                category,
                payload,
                user_vote,
            });
        }

        tracing::debug!(count, page, limit, returned = results.len(), "Listed posts");

        Ok(PostPage {
            results,
            count,
            page,
            limit,
        })
    }

    /// Get a post for display, counting the view.
    pub async fn get(&self, viewer_id: Option<&str>, post_id: &str) -> AppResult<PostDetails> {
        // Surface a missing post before touching the counter
        self.post_repo.get_by_id(post_id).await?;
        self.post_repo.increment_views(post_id).await?;

        let post = self.post_repo.get_by_id(post_id).await?;
        self.details(viewer_id, post).await
    }

    /// Toggle the viewer's vote on a post.
    pub async fn vote(
        &self,
        viewer: &user::Model,
        post_id: &str,
        requested: VoteType,
    ) -> AppResult<PostVoteResult> {
        let post = self.post_repo.get_by_id(post_id).await?;
        let current = self.vote_repo.find(post_id, &viewer.id).await?;

        let outcome = engine::apply_vote(
            VoteTally::new(from_column(post.upvotes), from_column(post.downvotes)),
            current,
            requested,
        );

        let post = self
            .post_repo
            .record_vote(post_id, &viewer.id, current, outcome.user_vote)
            .await?;

        tracing::info!(
            post_id = %post_id,
            user_id = %viewer.id,
            change = ?outcome.change,
            score = post.score,
            "Recorded post vote"
        );

        Ok(PostVoteResult {
            post,
            user_vote: outcome.user_vote,
            change: outcome.change,
        })
    }

    /// Apply a moderation action. Only officials and admins may moderate.
    pub async fn moderate(
        &self,
        moderator: &user::Model,
        post_id: &str,
        action: ModerationAction,
    ) -> AppResult<PostDetails> {
        if !moderator.role.can_moderate() {
            return Err(AppError::Forbidden(
                "Only officials can moderate posts".to_string(),
            ));
        }

        let post = match action {
            ModerationAction::Lock => self.post_repo.set_locked(post_id, true).await?,
            ModerationAction::Unlock => self.post_repo.set_locked(post_id, false).await?,
            ModerationAction::Pin => self.post_repo.set_pinned(post_id, true).await?,
            ModerationAction::Unpin => self.post_repo.set_pinned(post_id, false).await?,
            ModerationAction::Feature => self.post_repo.set_featured(post_id, true).await?,
            ModerationAction::Unfeature => self.post_repo.set_featured(post_id, false).await?,
        };

        tracing::info!(post_id = %post_id, moderator_id = %moderator.id, action = ?action, "Moderated post");

        self.details(Some(&moderator.id), post).await
    }

    async fn details(&self, viewer_id: Option<&str>, post: post::Model) -> AppResult<PostDetails> {
        let author = self.user_repo.get_by_id(&post.author_id).await?;
        let category = match &post.category_id {
            Some(category_id) => self.category_repo.find_by_id(category_id).await?,
            None => None,
        };
        let user_vote = match viewer_id {
            Some(viewer_id) => self.vote_repo.find(&post.id, viewer_id).await?,
            None => None,
        };
        let payload = self.load_payload(&post, viewer_id).await?;

        Ok(PostDetails {
            post,
            author,
            category,
            payload,
            user_vote,
        })
    }

    async fn load_payload(&self, post: &post::Model, viewer_id: Option<&str>) -> AppResult<PostPayload> {
        Ok(match post.post_type {
            PostType::Poll => PostPayload::Poll(self.poll_service.details(&post.id, viewer_id).await?),
            PostType::Petition => {
                PostPayload::Petition(self.petition_service.details(&post.id, viewer_id).await?)
            }
            PostType::Discussion | PostType::Announcement => PostPayload::None,
        })
    }
}
