//! Up/down vote toggling, shared by posts and comments.

use civic_common::{AppError, AppResult};
use civic_db::entities::VoteType;

/// Up and down counters of a post or comment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub upvotes: u32,
    pub downvotes: u32,
}

impl VoteTally {
    #[must_use]
    pub const fn new(upvotes: u32, downvotes: u32) -> Self {
        Self { upvotes, downvotes }
    }

    /// `upvotes - downvotes`.
    #[must_use]
    pub const fn score(self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }

    fn increment(&mut self, direction: VoteType) {
        match direction {
            VoteType::Up => self.upvotes = self.upvotes.saturating_add(1),
            VoteType::Down => self.downvotes = self.downvotes.saturating_add(1),
        }
    }

    fn decrement(&mut self, direction: VoteType) {
        match direction {
            VoteType::Up => self.upvotes = self.upvotes.saturating_sub(1),
            VoteType::Down => self.downvotes = self.downvotes.saturating_sub(1),
        }
    }
}

/// What a vote request did to the viewer's vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChange {
    /// No previous vote; the requested one was added.
    Applied,
    /// The previous vote pointed the other way and was flipped.
    Switched,
    /// The same vote was requested again and was withdrawn.
    Retracted,
}

/// Result of [`apply_vote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub tally: VoteTally,
    /// The viewer's vote after the transition.
    pub user_vote: Option<VoteType>,
    pub change: VoteChange,
}

/// Parse a client-supplied vote direction.
pub fn parse_vote_type(value: &str) -> AppResult<VoteType> {
    match value {
        "up" => Ok(VoteType::Up),
        "down" => Ok(VoteType::Down),
        other => Err(AppError::Validation(format!(
            "Invalid vote type: {other} (expected \"up\" or \"down\")"
        ))),
    }
}

/// Toggle the viewer's vote.
///
/// Requesting the current direction withdraws it, requesting the opposite
/// direction flips it, and with no current vote the request is applied.
#[must_use]
pub fn apply_vote(
    tally: VoteTally,
    current: Option<VoteType>,
    requested: VoteType,
) -> VoteOutcome {
    let mut tally = tally;

    let (user_vote, change) = match current {
        Some(existing) if existing == requested => {
            tally.decrement(existing);
            (None, VoteChange::Retracted)
        }
        Some(existing) => {
            tally.decrement(existing);
            tally.increment(requested);
            (Some(requested), VoteChange::Switched)
        }
        None => {
            tally.increment(requested);
            (Some(requested), VoteChange::Applied)
        }
    };

    VoteOutcome {
        tally,
        user_vote,
        change,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_first_vote_is_applied() {
        let outcome = apply_vote(VoteTally::default(), None, VoteType::Up);

        assert_eq!(outcome.tally, VoteTally::new(1, 0));
        assert_eq!(outcome.tally.score(), 1);
        assert_eq!(outcome.user_vote, Some(VoteType::Up));
        assert_eq!(outcome.change, VoteChange::Applied);
    }

    #[test]
    fn test_same_vote_twice_returns_to_baseline() {
        let baseline = VoteTally::new(4, 2);

        let first = apply_vote(baseline, None, VoteType::Up);
        let second = apply_vote(first.tally, first.user_vote, VoteType::Up);

        assert_eq!(second.tally, baseline);
        assert_eq!(second.user_vote, None);
        assert_eq!(second.change, VoteChange::Retracted);
    }

    #[test]
    fn test_up_then_down_switches() {
        let up = apply_vote(VoteTally::default(), None, VoteType::Up);
        let down = apply_vote(up.tally, up.user_vote, VoteType::Down);

        assert_eq!(down.tally, VoteTally::new(0, 1));
        assert_eq!(down.tally.score(), -1);
        assert_eq!(down.user_vote, Some(VoteType::Down));
        assert_eq!(down.change, VoteChange::Switched);
    }

    #[test]
    fn test_counters_never_go_negative() {
        // An overlay that disagrees with the counters must not underflow
        let outcome = apply_vote(VoteTally::default(), Some(VoteType::Down), VoteType::Down);

        assert_eq!(outcome.tally, VoteTally::default());
    }

    #[test]
    fn test_score_tracks_counters_over_a_sequence() {
        let requests = [
            VoteType::Up,
            VoteType::Down,
            VoteType::Down,
            VoteType::Up,
            VoteType::Up,
            VoteType::Down,
        ];
        let mut tally = VoteTally::new(10, 3);
        let mut current = None;

        for requested in requests {
            let outcome = apply_vote(tally, current, requested);
            tally = outcome.tally;
            current = outcome.user_vote;
            assert_eq!(
                tally.score(),
                i64::from(tally.upvotes) - i64::from(tally.downvotes)
            );
        }
    }

    #[test]
    fn test_parse_vote_type() {
        assert_eq!(parse_vote_type("up").unwrap(), VoteType::Up);
        assert_eq!(parse_vote_type("down").unwrap(), VoteType::Down);
        assert!(matches!(
            parse_vote_type("sideways"),
            Err(AppError::Validation(_))
        ));
        assert!(parse_vote_type("UP").is_err());
    }
}
