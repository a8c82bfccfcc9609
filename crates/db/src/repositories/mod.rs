//! Repository layer.
//!
//! Each repository wraps a shared [`sea_orm::DatabaseConnection`]. Methods
//! that apply a forum transition write the aggregate and the viewer's
//! overlay row inside one transaction.

#![allow(missing_docs)]

pub mod category;
pub mod comment;
pub mod petition;
pub mod poll;
pub mod post;
pub mod user;

pub use category::CategoryRepository;
pub use comment::{CommentRepository, CommentVoteRepository};
pub use petition::{PetitionRepository, PetitionSignatureRepository};
pub use poll::{PollRepository, PollVoteRepository};
pub use post::{NewPostPayload, PostFilter, PostOrdering, PostRepository, PostVoteRepository};
pub use user::UserRepository;

use civic_common::{AppError, AppResult};
use sea_orm::{DbErr, SqlErr};

/// Map a database error, turning unique-key violations into a conflict.
pub(crate) fn conflict_or_database(err: DbErr, conflict: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict(conflict.to_string()),
        _ => AppError::Database(err.to_string()),
    }
}

/// Convert a stored counter to `i32`, saturating on overflow.
#[must_use]
pub fn to_column(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Convert a stored counter column to `u32`; negative values read as 0.
#[must_use]
pub fn from_column(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

/// Row offset of a 1-based `page`, rejecting pages past what the store can address.
pub fn page_offset(page: u64, limit: u64) -> AppResult<u64> {
    let max_offset = u64::try_from(i64::MAX).unwrap_or(u64::MAX);
    page.max(1)
        .saturating_sub(1)
        .checked_mul(limit)
        .filter(|offset| offset.saturating_add(limit) <= max_offset)
        .ok_or_else(|| AppError::Validation(format!("Page {page} is out of range")))
}

/// Escape `LIKE` wildcards so `value` only matches itself. Pair with `ESCAPE '\\'`.
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Counter deltas `(upvotes, downvotes)` for a vote moving from `previous` to `next`.
pub(crate) fn vote_deltas(
    previous: Option<crate::entities::VoteType>,
    next: Option<crate::entities::VoteType>,
) -> (i32, i32) {
    use crate::entities::VoteType;

    let weight = |vote: Option<VoteType>, direction: VoteType| i32::from(vote == Some(direction));
    (
        weight(next, VoteType::Up) - weight(previous, VoteType::Up),
        weight(next, VoteType::Down) - weight(previous, VoteType::Down),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 10).ok(), Some(0));
        assert_eq!(page_offset(0, 10).ok(), Some(0));
        assert_eq!(page_offset(3, 10).ok(), Some(20));
        assert!(matches!(
            page_offset(u64::MAX, 10),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            page_offset(u64::MAX / 10, 10),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("50%"), "50\\%");
        assert_eq!(escape_like("plain"), "plain");
    }
}
