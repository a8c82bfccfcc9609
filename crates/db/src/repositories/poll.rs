//! Poll repository.

use std::sync::Arc;

use crate::entities::{Poll, PollOption, PollVote, poll, poll_option, poll_vote};
use chrono::Utc;
use civic_common::{AppError, AppResult};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the poll owned by a post.
    pub async fn find_by_post_id(&self, post_id: &str) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(post_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the poll owned by a post, returning error if not found.
    pub async fn get_by_post_id(&self, post_id: &str) -> AppResult<poll::Model> {
        self.find_by_post_id(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Poll not found for post: {post_id}")))
    }

    /// Options of a poll in display order.
    pub async fn find_options(&self, post_id: &str) -> AppResult<Vec<poll_option::Model>> {
        PollOption::find()
            .filter(poll_option::Column::PostId.eq(post_id))
            .order_by_asc(poll_option::Column::Position)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Replace the viewer's selection `previous` with `next`.
    ///
    /// Previously credited options lose one vote, newly selected ones gain
    /// one, and `total_votes` follows. Fails with a conflict if the stored
    /// selection no longer matches `previous`.
    pub async fn record_vote(
        &self,
        post_id: &str,
        user_id: &str,
        previous: &[String],
        next: &[String],
    ) -> AppResult<(poll::Model, Vec<poll_option::Model>)> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let removed = PollVote::delete_many()
            .filter(poll_vote::Column::PostId.eq(post_id))
            .filter(poll_vote::Column::UserId.eq(user_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if removed.rows_affected != previous.len() as u64 {
            return Err(AppError::Conflict(
                "Poll vote changed concurrently".to_string(),
            ));
        }

        if !previous.is_empty() {
            PollOption::update_many()
                .col_expr(
                    poll_option::Column::Votes,
                    Expr::col(poll_option::Column::Votes).sub(1),
                )
                .filter(poll_option::Column::PostId.eq(post_id))
                .filter(poll_option::Column::Id.is_in(previous.iter().cloned()))
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        if !next.is_empty() {
            let now = Utc::now();
            let rows = next.iter().map(|option_id| poll_vote::ActiveModel {
                post_id: Set(post_id.to_string()),
                option_id: Set(option_id.clone()),
                user_id: Set(user_id.to_string()),
                created_at: Set(now),
            });
            PollVote::insert_many(rows)
                .exec_without_returning(&txn)
                .await
                .map_err(|e| super::conflict_or_database(e, "Poll vote changed concurrently"))?;

            PollOption::update_many()
                .col_expr(
                    poll_option::Column::Votes,
                    Expr::col(poll_option::Column::Votes).add(1),
                )
                .filter(poll_option::Column::PostId.eq(post_id))
                .filter(poll_option::Column::Id.is_in(next.iter().cloned()))
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        let delta = next.len() as i64 - previous.len() as i64;
        Poll::update_many()
            .col_expr(
                poll::Column::TotalVotes,
                Expr::col(poll::Column::TotalVotes).add(delta),
            )
            .filter(poll::Column::PostId.eq(post_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let poll = Poll::find_by_id(post_id)
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Poll not found for post: {post_id}")))?;
        let options = PollOption::find()
            .filter(poll_option::Column::PostId.eq(post_id))
            .order_by_asc(poll_option::Column::Position)
            .all(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((poll, options))
    }
}

/// Read access to the per-viewer poll selection overlay.
#[derive(Clone)]
pub struct PollVoteRepository {
    db: Arc<DatabaseConnection>,
}

impl PollVoteRepository {
    /// Create a new poll vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Option IDs the viewer currently has selected.
    pub async fn find_selection(&self, post_id: &str, user_id: &str) -> AppResult<Vec<String>> {
        let votes = PollVote::find()
            .filter(poll_vote::Column::PostId.eq(post_id))
            .filter(poll_vote::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(votes.into_iter().map(|v| v.option_id).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::{PostType, UserRole, post, user};
    use crate::repositories::{NewPostPayload, PostRepository};
    use crate::test_utils::TestDatabase;
    use sea_orm::{ActiveModelTrait, DatabaseBackend, MockDatabase};

    async fn setup_poll(db: &TestDatabase) {
        let now = Utc::now();
        user::ActiveModel {
            id: Set("u1".to_string()),
            username: Set("alice".to_string()),
            display_name: Set("Alice".to_string()),
            role: Set(UserRole::Citizen),
            token: Set(None),
            created_at: Set(now),
        }
        .insert(db.conn.as_ref())
        .await
        .unwrap();

        let post = post::ActiveModel {
            id: Set("p1".to_string()),
            title: Set("Favourite park".to_string()),
            content: Set("Pick one".to_string()),
            post_type: Set(PostType::Poll),
            author_id: Set("u1".to_string()),
            category_id: Set(None),
            tags: Set(serde_json::json!([])),
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
        let poll = poll::ActiveModel {
            post_id: Set("p1".to_string()),
            question: Set("Which park?".to_string()),
            allow_multiple: Set(false),
            is_anonymous: Set(false),
            ends_at: Set(None),
            total_votes: Set(0),
            created_at: Set(now),
        };
        let options = ["A", "B"]
            .iter()
            .enumerate()
            .map(|(i, text)| poll_option::ActiveModel {
                id: Set(format!("o{i}")),
                post_id: Set("p1".to_string()),
                text: Set((*text).to_string()),
                position: Set(i as i32),
                votes: Set(0),
            })
            .collect();

        PostRepository::new(db.connection())
            .create_with_payload(post, NewPostPayload::Poll { poll, options })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_find_by_post_id() {
        let poll = poll::Model {
            post_id: "p1".to_string(),
            question: "Which park?".to_string(),
            allow_multiple: true,
            is_anonymous: false,
            ends_at: None,
            total_votes: 3,
            created_at: Utc::now(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[poll.clone()]])
                .into_connection(),
        );

        let repo = PollRepository::new(db);
        let found = repo.find_by_post_id("p1").await.unwrap().unwrap();

        assert!(found.allow_multiple);
        assert_eq!(found.total_votes, 3);
    }

    #[tokio::test]
    async fn test_record_vote_replaces_previous_selection() {
        let db = TestDatabase::in_memory().await.unwrap();
        setup_poll(&db).await;
        let repo = PollRepository::new(db.connection());

        let (poll, options) = repo
            .record_vote("p1", "u1", &[], &["o0".to_string()])
            .await
            .unwrap();
        assert_eq!(poll.total_votes, 1);
        assert_eq!((options[0].votes, options[1].votes), (1, 0));

        let (poll, options) = repo
            .record_vote("p1", "u1", &["o0".to_string()], &["o1".to_string()])
            .await
            .unwrap();
        assert_eq!(poll.total_votes, 1);
        assert_eq!((options[0].votes, options[1].votes), (0, 1));

        let selection = PollVoteRepository::new(db.connection())
            .find_selection("p1", "u1")
            .await
            .unwrap();
        assert_eq!(selection, vec!["o1".to_string()]);
    }

    #[tokio::test]
    async fn test_record_vote_with_stale_selection_is_conflict() {
        let db = TestDatabase::in_memory().await.unwrap();
        setup_poll(&db).await;
        let repo = PollRepository::new(db.connection());

        let result = repo
            .record_vote("p1", "u1", &["o0".to_string()], &["o1".to_string()])
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let options = repo.find_options("p1").await.unwrap();
        assert!(options.iter().all(|o| o.votes == 0));
    }
}
