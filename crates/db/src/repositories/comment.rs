//! Comment repository.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::{Comment, CommentVote, Post, VoteType, comment, comment_vote, post};
use chrono::Utc;
use civic_common::{AppError, AppResult};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

/// Comment repository for database operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a comment by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<comment::Model>> {
        Comment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a comment by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<comment::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment not found: {id}")))
    }

    /// All comments of a post, oldest first.
    pub async fn find_by_post(&self, post_id: &str) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a comment and bump the owning post's comment count.
    pub async fn create_in_thread(&self, model: comment::ActiveModel) -> AppResult<comment::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let created = model
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let result = Post::update_many()
            .col_expr(
                post::Column::CommentsCount,
                Expr::col(post::Column::CommentsCount).add(1),
            )
            .filter(post::Column::Id.eq(created.post_id.as_str()))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if result.rows_affected != 1 {
            return Err(AppError::PostNotFound(created.post_id));
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Move the viewer's vote on a comment from `previous` to `next`.
    ///
    /// Fails with a conflict if the stored vote no longer matches `previous`.
    pub async fn record_vote(
        &self,
        comment_id: &str,
        user_id: &str,
        previous: Option<VoteType>,
        next: Option<VoteType>,
    ) -> AppResult<comment::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let stale = || AppError::Conflict("Vote changed concurrently".to_string());
        match (previous, next) {
            (None, Some(vote_type)) => {
                let overlay = comment_vote::ActiveModel {
                    comment_id: Set(comment_id.to_string()),
                    user_id: Set(user_id.to_string()),
                    vote_type: Set(vote_type),
                    created_at: Set(Utc::now()),
                };
                CommentVote::insert(overlay)
                    .exec_without_returning(&txn)
                    .await
                    .map_err(|e| super::conflict_or_database(e, "Vote changed concurrently"))?;
            }
            (Some(old), None) => {
                let result = CommentVote::delete_many()
                    .filter(comment_vote::Column::CommentId.eq(comment_id))
                    .filter(comment_vote::Column::UserId.eq(user_id))
                    .filter(comment_vote::Column::VoteType.eq(old))
                    .exec(&txn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                if result.rows_affected != 1 {
                    return Err(stale());
                }
            }
            (Some(old), Some(new)) => {
                let result = CommentVote::update_many()
                    .col_expr(comment_vote::Column::VoteType, Expr::value(new))
                    .filter(comment_vote::Column::CommentId.eq(comment_id))
                    .filter(comment_vote::Column::UserId.eq(user_id))
                    .filter(comment_vote::Column::VoteType.eq(old))
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
        Comment::update_many()
            .col_expr(comment::Column::Upvotes, Expr::col(comment::Column::Upvotes).add(up))
            .col_expr(
                comment::Column::Downvotes,
                Expr::col(comment::Column::Downvotes).add(down),
            )
            .col_expr(comment::Column::Score, Expr::col(comment::Column::Score).add(up - down))
            .filter(comment::Column::Id.eq(comment_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let updated = Comment::find_by_id(comment_id)
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Comment not found: {comment_id}")))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(updated)
    }
}

/// Read access to the per-viewer comment vote overlay.
#[derive(Clone)]
pub struct CommentVoteRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentVoteRepository {
    /// Create a new comment vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// The viewer's current vote on a comment.
    pub async fn find(&self, comment_id: &str, user_id: &str) -> AppResult<Option<VoteType>> {
        let vote = CommentVote::find_by_id((comment_id.to_string(), user_id.to_string()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(vote.map(|v| v.vote_type))
    }

    /// The viewer's votes on all comments of a post, keyed by comment ID.
    pub async fn find_for_post(
        &self,
        post_id: &str,
        user_id: &str,
    ) -> AppResult<HashMap<String, VoteType>> {
        let votes = CommentVote::find()
            .inner_join(Comment)
            .filter(comment::Column::PostId.eq(post_id))
            .filter(comment_vote::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(votes
            .into_iter()
            .map(|v| (v.comment_id, v.vote_type))
            .collect())
    }
}
