//! Poll option selection.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use civic_common::{AppError, AppResult};

/// Vote count of a single option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionTally {
    pub id: String,
    pub votes: u32,
}

/// The parts of a poll that a vote depends on.
#[derive(Debug, Clone)]
pub struct PollSnapshot {
    pub allow_multiple: bool,
    pub ends_at: Option<DateTime<Utc>>,
    /// Options in display order
    pub options: Vec<OptionTally>,
}

/// Result of [`apply_poll_vote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    /// Options in display order with updated counts
    pub options: Vec<OptionTally>,
    pub total_votes: u32,
    /// The viewer's selection after the vote
    pub selection: Vec<String>,
}

impl PollOutcome {
    /// Percentages in option order.
    #[must_use]
    pub fn percentages(&self) -> Vec<u32> {
        self.options
            .iter()
            .map(|option| percentage(option.votes, self.total_votes))
            .collect()
    }
}

/// Share of `total` held by `votes`, rounded half up to a whole percent.
///
/// Each option is rounded on its own, so the shares of a poll need not add
/// up to 100.
#[must_use]
pub fn percentage(votes: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (votes, total) = (u64::from(votes), u64::from(total));
    ((votes * 200 + total) / (2 * total)) as u32
}

/// Record the viewer's selection, replacing whatever they chose before.
///
/// `previous` is the viewer's current selection (empty if they have not
/// voted). The returned counts already have `previous` withdrawn.
pub fn apply_poll_vote(
    poll: &PollSnapshot,
    previous: &[String],
    selected: &[String],
    now: DateTime<Utc>,
) -> AppResult<PollOutcome> {
    if !super::is_open(poll.ends_at, now) {
        return Err(AppError::Closed("Poll has ended".to_string()));
    }

    if selected.is_empty() {
        return Err(AppError::Validation(
            "Select at least one option".to_string(),
        ));
    }

    if !poll.allow_multiple && selected.len() > 1 {
        return Err(AppError::Validation(
            "Multiple selections are not allowed in this poll".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(selected.len());
    for id in selected {
        if !seen.insert(id.as_str()) {
            return Err(AppError::Validation(format!(
                "Option selected more than once: {id}"
            )));
        }
        if !poll.options.iter().any(|option| &option.id == id) {
            return Err(AppError::Validation(format!("Poll option not found: {id}")));
        }
    }

    let options: Vec<OptionTally> = poll
        .options
        .iter()
        .map(|option| {
            let mut votes = option.votes;
            if previous.contains(&option.id) {
                votes = votes.saturating_sub(1);
            }
            if seen.contains(option.id.as_str()) {
                votes = votes.saturating_add(1);
            }
            OptionTally {
                id: option.id.clone(),
                votes,
            }
        })
        .collect();

    let total_votes = options
        .iter()
        .fold(0u32, |sum, option| sum.saturating_add(option.votes));

    // Keep the viewer's selection in display order
    let selection = options
        .iter()
        .filter(|option| seen.contains(option.id.as_str()))
        .map(|option| option.id.clone())
        .collect();

    Ok(PollOutcome {
        options,
        total_votes,
        selection,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot(votes: &[u32], allow_multiple: bool) -> PollSnapshot {
        PollSnapshot {
            allow_multiple,
            ends_at: None,
            options: votes
                .iter()
                .enumerate()
                .map(|(i, votes)| OptionTally {
                    id: format!("{}", (b'A' + i as u8) as char),
                    votes: *votes,
                })
                .collect(),
        }
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| (*id).to_string()).collect()
    }

    fn votes_of(outcome: &PollOutcome) -> Vec<u32> {
        outcome.options.iter().map(|o| o.votes).collect()
    }

    #[test]
    fn test_vote_a_then_switch_to_b() {
        let now = Utc::now();
        let poll = snapshot(&[0, 0], false);

        let first = apply_poll_vote(&poll, &[], &ids(&["A"]), now).unwrap();
        assert_eq!(votes_of(&first), vec![1, 0]);
        assert_eq!(first.percentages(), vec![100, 0]);

        let poll = PollSnapshot {
            options: first.options.clone(),
            ..poll
        };
        let second = apply_poll_vote(&poll, &first.selection, &ids(&["B"]), now).unwrap();
        assert_eq!(votes_of(&second), vec![0, 1]);
        assert_eq!(second.percentages(), vec![0, 100]);
        assert_eq!(second.total_votes, first.total_votes);
        assert_eq!(second.selection, ids(&["B"]));
    }

    #[test]
    fn test_percentages_round_independently() {
        let poll = snapshot(&[1, 1, 0], false);
        let outcome = apply_poll_vote(&poll, &[], &ids(&["C"]), Utc::now()).unwrap();

        assert_eq!(outcome.total_votes, 3);
        assert_eq!(outcome.percentages(), vec![33, 33, 33]);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn test_multiple_selection_when_allowed() {
        let poll = snapshot(&[2, 0, 1], true);
        let outcome = apply_poll_vote(&poll, &[], &ids(&["C", "A"]), Utc::now()).unwrap();

        assert_eq!(votes_of(&outcome), vec![3, 0, 2]);
        assert_eq!(outcome.total_votes, 5);
        assert_eq!(outcome.selection, ids(&["A", "C"]));
    }

    #[test]
    fn test_multiple_selection_rejected_in_single_mode() {
        let poll = snapshot(&[0, 0], false);
        let result = apply_poll_vote(&poll, &[], &ids(&["A", "B"]), Utc::now());

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_empty_duplicate_and_unknown_selections_rejected() {
        let poll = snapshot(&[0, 0], true);
        let now = Utc::now();

        assert!(matches!(
            apply_poll_vote(&poll, &[], &[], now),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            apply_poll_vote(&poll, &[], &ids(&["A", "A"]), now),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            apply_poll_vote(&poll, &[], &ids(&["Z"]), now),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_ended_poll_is_closed() {
        let now = Utc::now();
        let poll = PollSnapshot {
            ends_at: Some(now - Duration::minutes(1)),
            ..snapshot(&[0, 0], false)
        };

        let result = apply_poll_vote(&poll, &[], &ids(&["A"]), now);
        assert!(matches!(result, Err(AppError::Closed(_))));
    }

    #[test]
    fn test_revoting_same_option_keeps_counts() {
        let poll = snapshot(&[1, 0], false);
        let outcome = apply_poll_vote(&poll, &ids(&["A"]), &ids(&["A"]), Utc::now()).unwrap();

        assert_eq!(votes_of(&outcome), vec![1, 0]);
        assert_eq!(outcome.total_votes, 1);
    }
}
