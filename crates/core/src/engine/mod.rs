//! Pure forum state transitions.
//!
//! Each engine takes the current shared aggregate plus the viewer's overlay
//! and returns the next state or an error. Nothing here performs I/O; the
//! services persist an outcome only after the engine accepted it, so a
//! rejected action never leaves a partial write behind.

pub mod petition;
pub mod poll;
pub mod thread;
pub mod vote;

pub use petition::{PetitionOutcome, PetitionSnapshot, progress_percentage, sign_petition};
pub use poll::{OptionTally, PollOutcome, PollSnapshot, apply_poll_vote, percentage};
pub use thread::{ParentRef, ThreadNode, build_tree, validate_comment};
pub use vote::{VoteChange, VoteOutcome, VoteTally, apply_vote, parse_vote_type};

use chrono::{DateTime, Utc};

/// Whether something closing at `closes_at` still accepts input at `now`.
#[must_use]
pub fn is_open(closes_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    closes_at.is_none_or(|at| now < at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_is_open() {
        let now = Utc::now();
        assert!(is_open(None, now));
        assert!(is_open(Some(now + Duration::seconds(1)), now));
        assert!(!is_open(Some(now), now));
        assert!(!is_open(Some(now - Duration::days(1)), now));
    }
}
