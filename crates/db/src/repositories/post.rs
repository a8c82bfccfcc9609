//! Post repository.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::{
    Petition, Poll, PollOption, Post, PostType, PostVote, VoteType, petition, poll, poll_option,
    post, post_vote,
};
use super::{escape_like, page_offset};
use chrono::Utc;
use civic_common::{AppError, AppResult};
use sea_orm::sea_query::{Alias, Expr, Func, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};

/// Sort order for post listings. Pinned posts always come first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PostOrdering {
    #[default]
    Newest,
    Oldest,
    /// Highest score first
    Popular,
    /// Most viewed first
    Views,
}

impl PostOrdering {
    /// Parse an `ordering` query value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "newest" | "-created_at" => Some(Self::Newest),
            "oldest" | "created_at" => Some(Self::Oldest),
            "popular" | "-score" => Some(Self::Popular),
            "views" | "-views" => Some(Self::Views),
            _ => None,
        }
    }
}

/// Filters for post listings. Empty fields do not restrict the result.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub category_id: Option<String>,
    pub post_type: Option<PostType>,
    pub author_id: Option<String>,
    pub is_pinned: Option<bool>,
    pub is_featured: Option<bool>,
    /// Case-insensitive substring of title or content
    pub search: Option<String>,
    /// Every tag must be present on the post
    pub tags: Vec<String>,
}

/// Type-specific rows inserted together with a new post.
#[derive(Debug, Clone)]
pub enum NewPostPayload {
    None,
    Poll {
        poll: poll::ActiveModel,
        options: Vec<poll_option::ActiveModel>,
    },
    Petition(petition::ActiveModel),
}

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a post by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// List posts matching `filter`, returning one page and the total count.
    ///
    /// `page` is 1-based.
    pub async fn list(
        &self,
        filter: &PostFilter,
        ordering: PostOrdering,
        page: u64,
        limit: u64,
    ) -> AppResult<(Vec<post::Model>, u64)> {
        let mut query = Post::find();

        if let Some(category_id) = &filter.category_id {
            query = query.filter(post::Column::CategoryId.eq(category_id.as_str()));
        }

        if let Some(post_type) = filter.post_type {
            query = query.filter(post::Column::PostType.eq(post_type));
        }

        if let Some(author_id) = &filter.author_id {
            query = query.filter(post::Column::AuthorId.eq(author_id.as_str()));
        }

        if let Some(is_pinned) = filter.is_pinned {
            query = query.filter(post::Column::IsPinned.eq(is_pinned));
        }

        if let Some(is_featured) = filter.is_featured {
            query = query.filter(post::Column::IsFeatured.eq(is_featured));
        }

        if let Some(search) = filter.search.as_deref().map(str::trim) {
            if !search.is_empty() {
                let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
                let lower_like = |column: post::Column| {
                    Expr::expr(Func::lower(Expr::col(column)))
                        .like(LikeExpr::new(pattern.clone()).escape('\\'))
                };
                query = query.filter(
                    Condition::any()
                        .add(lower_like(post::Column::Title))
                        .add(lower_like(post::Column::Content)),
                );
            }
        }

        // Tags are stored as a compact JSON array, so each tag appears quoted
        for tag in &filter.tags {
            query = query.filter(
                Expr::expr(Expr::col(post::Column::Tags).cast_as(Alias::new("text")))
                    .like(LikeExpr::new(format!("%\"{}\"%", escape_like(tag))).escape('\\')),
            );
        }

        query = query.order_by_desc(post::Column::IsPinned);
        query = match ordering {
            PostOrdering::Newest => query.order_by_desc(post::Column::CreatedAt),
            PostOrdering::Oldest => query.order_by_asc(post::Column::CreatedAt),
            PostOrdering::Popular => query
                .order_by_desc(post::Column::Score)
                .order_by_desc(post::Column::CreatedAt),
            PostOrdering::Views => query
                .order_by_desc(post::Column::Views)
                .order_by_desc(post::Column::CreatedAt),
        };
        // IDs are time-ordered, which keeps pages stable for equal timestamps
        query = match ordering {
            PostOrdering::Oldest => query.order_by_asc(post::Column::Id),
            _ => query.order_by_desc(post::Column::Id),
        };

        let limit = limit.max(1);
        page_offset(page, limit)?;
        let paginator = query.paginate(self.db.as_ref(), limit);
        let count = paginator
            .num_items()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let posts = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((posts, count))
    }

    /// Insert a post together with its poll or petition.
    pub async fn create_with_payload(
        &self,
        model: post::ActiveModel,
        payload: NewPostPayload,
    ) -> AppResult<post::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let created = model
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match payload {
            NewPostPayload::None => {}
            NewPostPayload::Poll { poll, options } => {
                Poll::insert(poll)
                    .exec_without_returning(&txn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                if !options.is_empty() {
                    PollOption::insert_many(options)
                        .exec_without_returning(&txn)
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))?;
                }
            }
            NewPostPayload::Petition(petition) => {
                Petition::insert(petition)
                    .exec_without_returning(&txn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
            }
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Increment the view counter.
    pub async fn increment_views(&self, id: &str) -> AppResult<()> {
        Post::update_many()
            .col_expr(post::Column::Views, Expr::col(post::Column::Views).add(1))
            .filter(post::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Move the viewer's vote from `previous` to `next` and adjust counters.
    ///
    /// Fails with a conflict if the stored vote no longer matches `previous`.
    pub async fn record_vote(
        &self,
        post_id: &str,
        user_id: &str,
        previous: Option<VoteType>,
        next: Option<VoteType>,
    ) -> AppResult<post::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let stale = || AppError::Conflict("Vote changed concurrently".to_string());
        match (previous, next) {
            (None, Some(vote_type)) => {
                let overlay = post_vote::ActiveModel {
                    post_id: Set(post_id.to_string()),
                    user_id: Set(user_id.to_string()),
                    vote_type: Set(vote_type),
                    created_at: Set(Utc::now()),
                };
                PostVote::insert(overlay)
                    .exec_without_returning(&txn)
                    .await
                    .map_err(|e| super::conflict_or_database(e, "Vote changed concurrently"))?;
            }
            (Some(old), None) => {
                let result = PostVote::delete_many()
                    .filter(post_vote::Column::PostId.eq(post_id))
                    .filter(post_vote::Column::UserId.eq(user_id))
                    .filter(post_vote::Column::VoteType.eq(old))
                    .exec(&txn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                if result.rows_affected != 1 {
                    return Err(stale());
                }
            }
            (Some(old), Some(new)) => {
                let result = PostVote::update_many()
                    .col_expr(post_vote::Column::VoteType, Expr::value(new))
                    .filter(post_vote::Column::PostId.eq(post_id))
                    .filter(post_vote::Column::UserId.eq(user_id))
                    .filter(post_vote::Column::VoteType.eq(old))
                    .exec(&txn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                if result.rows_affected != 1 {
                    return Err(stale());
                }
            }
            (None, None) => {}
        }

        let (up, down) = super::vote_deltas(previous, next);
        Post::update_many()
            .col_expr(post::Column::Upvotes, Expr::col(post::Column::Upvotes).add(up))
            .col_expr(post::Column::Downvotes, Expr::col(post::Column::Downvotes).add(down))
            .col_expr(post::Column::Score, Expr::col(post::Column::Score).add(up - down))
            .filter(post::Column::Id.eq(post_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let updated = Post::find_by_id(post_id)
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::PostNotFound(post_id.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(updated)
    }

    /// Lock or unlock a post. Repeating the current state is a conflict.
    pub async fn set_locked(&self, id: &str, locked: bool) -> AppResult<post::Model> {
        let result = Post::update_many()
            .col_expr(post::Column::IsLocked, Expr::value(locked))
            .filter(post::Column::Id.eq(id))
            .filter(post::Column::IsLocked.eq(!locked))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            // Distinguish a missing post from one already in the target state
            self.get_by_id(id).await?;
            let message = if locked {
                "Post is already locked"
            } else {
                "Post is not locked"
            };
            return Err(AppError::Conflict(message.to_string()));
        }

        self.get_by_id(id).await
    }

    /// Pin or unpin a post.
    pub async fn set_pinned(&self, id: &str, pinned: bool) -> AppResult<post::Model> {
        self.set_flag(id, post::Column::IsPinned, pinned).await
    }

    /// Feature or unfeature a post.
    pub async fn set_featured(&self, id: &str, featured: bool) -> AppResult<post::Model> {
        self.set_flag(id, post::Column::IsFeatured, featured).await
    }

    async fn set_flag(&self, id: &str, column: post::Column, value: bool) -> AppResult<post::Model> {
        Post::update_many()
            .col_expr(column, Expr::value(value))
            .filter(post::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.get_by_id(id).await
    }
}

/// Read access to the per-viewer post vote overlay.
#[derive(Clone)]
pub struct PostVoteRepository {
    db: Arc<DatabaseConnection>,
}

impl PostVoteRepository {
    /// Create a new post vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// The viewer's current vote on a post.
    pub async fn find(&self, post_id: &str, user_id: &str) -> AppResult<Option<VoteType>> {
        let vote = PostVote::find_by_id((post_id.to_string(), user_id.to_string()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(vote.map(|v| v.vote_type))
    }

    /// The viewer's votes on several posts, keyed by post ID.
    pub async fn find_for_posts(
        &self,
        user_id: &str,
        post_ids: &[String],
    ) -> AppResult<HashMap<String, VoteType>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let votes = PostVote::find()
            .filter(post_vote::Column::UserId.eq(user_id))
            .filter(post_vote::Column::PostId.is_in(post_ids.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(votes
            .into_iter()
            .map(|v| (v.post_id, v.vote_type))
            .collect())
    }
}
