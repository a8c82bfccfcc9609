//! Poll service.

use chrono::{DateTime, Utc};
use civic_common::{AppError, AppResult, IdGenerator};
use civic_db::{
    entities::{PostType, poll, poll_option, user},
    repositories::{
        NewPostPayload, PollRepository, PollVoteRepository, PostRepository, from_column,
    },
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

use crate::engine::{self, OptionTally, PollSnapshot};

/// Longest accepted option text, in characters.
pub const MAX_OPTION_LENGTH: usize = 200;

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    poll_repo: PollRepository,
    vote_repo: PollVoteRepository,
    post_repo: PostRepository,
    id_gen: IdGenerator,
}

/// Poll part of a new `poll` post.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollInput {
    #[validate(length(min = 1, max = 200))]
    pub question: String,

    /// Option texts in display order
    #[validate(length(min = 2))]
    pub options: Vec<String>,

    #[serde(default)]
    pub allow_multiple: bool,

    #[serde(default)]
    pub is_anonymous: bool,

    pub ends_at: Option<DateTime<Utc>>,
}

/// Input for voting on a poll.
///
/// The selection is checked against the poll itself, after the closed check.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollVoteInput {
    pub option_ids: Vec<String>,
}

/// Poll with its options and the viewer's selection.
#[derive(Debug, Clone)]
pub struct PollDetails {
    pub poll: poll::Model,
    /// Options in display order
    pub options: Vec<poll_option::Model>,
    /// Option IDs the viewer selected (empty without a viewer)
    pub user_votes: Vec<String>,
}

impl PollDetails {
    /// Whether the poll still accepts votes at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        engine::is_open(self.poll.ends_at, now)
    }

    /// Percentage of each option, in option order.
    #[must_use]
    pub fn percentages(&self) -> Vec<u32> {
        let total = from_column(self.poll.total_votes);
        self.options
            .iter()
            .map(|option| engine::percentage(from_column(option.votes), total))
            .collect()
    }
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub const fn new(
        poll_repo: PollRepository,
        vote_repo: PollVoteRepository,
        post_repo: PostRepository,
    ) -> Self {
        Self {
            poll_repo,
            vote_repo,
            post_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Validate poll input and build the rows stored with a new post.
    pub fn build_payload(
        &self,
        post_id: &str,
        input: CreatePollInput,
        max_options: usize,
        now: DateTime<Utc>,
    ) -> AppResult<NewPostPayload> {
        input.validate()?;

        let question = input.question.trim();
        if question.is_empty() {
            return Err(AppError::Validation(
                "Poll question cannot be empty".to_string(),
            ));
        }
        if input.options.len() > max_options {
            return Err(AppError::Validation(format!(
                "Poll cannot have more than {max_options} options"
            )));
        }
        for text in &input.options {
            if text.trim().is_empty() {
                return Err(AppError::Validation(
                    "Poll options cannot be empty".to_string(),
                ));
            }
            if text.trim().chars().count() > MAX_OPTION_LENGTH {
                return Err(AppError::Validation(format!(
                    "Poll option is too long (max {MAX_OPTION_LENGTH} characters)"
                )));
            }
        }
        if input.ends_at.is_some_and(|ends_at| ends_at <= now) {
            return Err(AppError::Validation(
                "Poll end time must be in the future".to_string(),
            ));
        }

        let poll = poll::ActiveModel {
            post_id: Set(post_id.to_string()),
            question: Set(question.to_string()),
            allow_multiple: Set(input.allow_multiple),
            is_anonymous: Set(input.is_anonymous),
            ends_at: Set(input.ends_at),
            total_votes: Set(0),
            created_at: Set(now),
        };
        let options = input
            .options
            .iter()
            .enumerate()
            .map(|(position, text)| poll_option::ActiveModel {
                id: Set(self.id_gen.generate()),
                post_id: Set(post_id.to_string()),
                text: Set(text.trim().to_string()),
                position: Set(position as i32),
                votes: Set(0),
            })
            .collect();

        Ok(NewPostPayload::Poll { poll, options })
    }

    /// Load a poll with the viewer's selection.
    pub async fn details(&self, post_id: &str, viewer_id: Option<&str>) -> AppResult<PollDetails> {
        let poll = self.poll_repo.get_by_post_id(post_id).await?;
        let options = self.poll_repo.find_options(post_id).await?;
        let user_votes = match viewer_id {
            Some(viewer_id) => self.vote_repo.find_selection(post_id, viewer_id).await?,
            None => Vec::new(),
        };

        Ok(PollDetails {
            poll,
            options,
            user_votes,
        })
    }

    /// Vote on the poll of a post, replacing the viewer's earlier choice.
    pub async fn vote(
        &self,
        viewer: &user::Model,
        post_id: &str,
        input: PollVoteInput,
    ) -> AppResult<PollDetails> {
        let post = self.post_repo.get_by_id(post_id).await?;
        if post.post_type != PostType::Poll {
            return Err(AppError::NotFound(format!("Post {post_id} has no poll")));
        }

        let current = self.details(post_id, Some(&viewer.id)).await?;
        let snapshot = PollSnapshot {
            allow_multiple: current.poll.allow_multiple,
            ends_at: current.poll.ends_at,
            options: current
                .options
                .iter()
                .map(|option| OptionTally {
                    id: option.id.clone(),
                    votes: from_column(option.votes),
                })
                .collect(),
        };

        let outcome = engine::apply_poll_vote(
            &snapshot,
            &current.user_votes,
            &input.option_ids,
            Utc::now(),
        )?;

        let (poll, options) = self
            .poll_repo
            .record_vote(post_id, &viewer.id, &current.user_votes, &outcome.selection)
            .await?;

        tracing::info!(
            post_id = %post_id,
            user_id = %viewer.id,
            selected = outcome.selection.len(),
            replaced = current.user_votes.len(),
            total_votes = poll.total_votes,
            "Recorded poll vote"
        );

        Ok(PollDetails {
            poll,
            options,
            user_votes: outcome.selection,
        })
    }
}
