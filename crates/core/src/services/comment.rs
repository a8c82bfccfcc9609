//! Comment thread service.

use std::collections::HashMap;

use chrono::Utc;
use civic_common::{AppError, AppResult, IdGenerator};
use civic_db::{
    entities::{VoteType, comment, user},
    repositories::{
        CommentRepository, CommentVoteRepository, PostRepository, UserRepository, from_column,
    },
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

use crate::engine::{self, ParentRef, ThreadNode, VoteTally};

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    vote_repo: CommentVoteRepository,
    post_repo: PostRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

/// Input for adding a comment.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentInput {
    #[validate(length(max = 5000))]
    pub content: String,

    /// Comment being replied to (absent for top-level)
    pub parent_id: Option<String>,
}

/// Comment with author and the viewer's vote.
#[derive(Debug, Clone)]
pub struct CommentDetails {
    pub comment: comment::Model,
    pub author: user::Model,
    pub user_vote: Option<VoteType>,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub const fn new(
        comment_repo: CommentRepository,
        vote_repo: CommentVoteRepository,
        post_repo: PostRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self {
            comment_repo,
            vote_repo,
            post_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// The comment thread of a post as a tree, oldest first at every level.
    pub async fn thread(
        &self,
        post_id: &str,
        viewer_id: Option<&str>,
    ) -> AppResult<Vec<ThreadNode<CommentDetails>>> {
        self.post_repo.get_by_id(post_id).await?;

        let comments = self.comment_repo.find_by_post(post_id).await?;
        let mut author_ids: Vec<String> = comments.iter().map(|c| c.author_id.clone()).collect();
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
            Some(viewer_id) => self.vote_repo.find_for_post(post_id, viewer_id).await?,
            None => HashMap::new(),
        };

        let details: Vec<CommentDetails> = comments
            .into_iter()
            .filter_map(|comment| {
                let Some(author) = authors.get(&comment.author_id).cloned() else {
                    tracing::warn!(comment_id = %comment.id, author_id = %comment.author_id, "Skipping comment with unknown author");
                    return None;
                };
                let user_vote = votes.get(&comment.id).copied();
                Some(CommentDetails {
                    comment,
                    author,
                    user_vote,
                })
            })
            .collect();

        tracing::debug!(post_id = %post_id, comments = details.len(), "Loaded comment thread");

        Ok(engine::build_tree(
            details,
            |d| d.comment.id.as_str(),
            |d| d.comment.parent_id.as_deref(),
        ))
    }

    /// Add a comment to a post, optionally as a reply.
    pub async fn add_comment(
        &self,
        viewer: &user::Model,
        post_id: &str,
        input: CreateCommentInput,
    ) -> AppResult<CommentDetails> {
        input.validate()?;

        let post = self.post_repo.get_by_id(post_id).await?;

        let parent = match &input.parent_id {
            Some(parent_id) => self.comment_repo.find_by_id(parent_id).await?,
            None => None,
        };
        let parent_ref = match (&input.parent_id, &parent) {
            (None, _) => ParentRef::None,
            (Some(_), Some(parent)) => ParentRef::Found(parent),
            (Some(_), None) => ParentRef::Missing,
        };

        let content = engine::validate_comment(post_id, post.is_locked, &input.content, parent_ref)?;

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(post_id.to_string()),
            author_id: Set(viewer.id.clone()),
            parent_id: Set(input.parent_id),
            content: Set(content),
            upvotes: Set(0),
            downvotes: Set(0),
            score: Set(0),
            created_at: Set(Utc::now()),
        };

        let comment = self.comment_repo.create_in_thread(model).await?;
        tracing::info!(
            comment_id = %comment.id,
            post_id = %post_id,
            parent_id = ?comment.parent_id,
            "Added comment"
        );

        Ok(CommentDetails {
            comment,
            author: viewer.clone(),
            user_vote: None,
        })
    }

    /// Toggle the viewer's vote on a comment.
    pub async fn vote(
        &self,
        viewer: &user::Model,
        comment_id: &str,
        requested: VoteType,
    ) -> AppResult<CommentDetails> {
        let comment = self.comment_repo.get_by_id(comment_id).await?;
        let current = self.vote_repo.find(comment_id, &viewer.id).await?;

        let outcome = engine::apply_vote(
            VoteTally::new(from_column(comment.upvotes), from_column(comment.downvotes)),
            current,
            requested,
        );

        let updated = self
            .comment_repo
            .record_vote(comment_id, &viewer.id, current, outcome.user_vote)
            .await?;
        tracing::info!(
            comment_id = %comment_id,
            user_id = %viewer.id,
            change = ?outcome.change,
            score = updated.score,
            "Recorded comment vote"
        );

        let author = self.user_repo.get_by_id(&updated.author_id).await?;
        Ok(CommentDetails {
            comment: updated,
            author,
            user_vote: outcome.user_vote,
        })
    }
}
