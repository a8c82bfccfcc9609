//! Petition signing.

use chrono::{DateTime, Utc};
use civic_common::{AppError, AppResult};

/// The parts of a petition that a signature depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PetitionSnapshot {
    pub goal: u32,
    pub signatures: u32,
    pub deadline: Option<DateTime<Utc>>,
    pub is_successful: bool,
}

/// Result of [`sign_petition`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PetitionOutcome {
    pub signatures: u32,
    pub is_successful: bool,
    pub progress_percentage: f64,
}

/// Progress toward the goal in percent, one decimal place, capped at 100.
#[must_use]
pub fn progress_percentage(signatures: u32, goal: u32) -> f64 {
    if goal == 0 {
        return 100.0;
    }
    let raw = f64::from(signatures) / f64::from(goal) * 100.0;
    (raw.min(100.0) * 10.0).round() / 10.0
}

/// Add the viewer's signature.
///
/// Signatures only ever grow, and once the goal is reached the petition
/// stays successful.
pub fn sign_petition(
    petition: &PetitionSnapshot,
    already_signed: bool,
    now: DateTime<Utc>,
) -> AppResult<PetitionOutcome> {
    if !super::is_open(petition.deadline, now) {
        return Err(AppError::Closed("Petition deadline has passed".to_string()));
    }

    if already_signed {
        return Err(AppError::Conflict("Petition already signed".to_string()));
    }

    let signatures = petition.signatures.saturating_add(1);

    Ok(PetitionOutcome {
        signatures,
        is_successful: petition.is_successful || signatures >= petition.goal,
        progress_percentage: progress_percentage(signatures, petition.goal),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn petition(goal: u32, signatures: u32) -> PetitionSnapshot {
        PetitionSnapshot {
            goal,
            signatures,
            deadline: None,
            is_successful: false,
        }
    }

    #[test]
    fn test_goal_of_two_reached_by_second_signature() {
        let now = Utc::now();
        let first = sign_petition(&petition(2, 0), false, now).unwrap();
        assert_eq!(first.signatures, 1);
        assert_eq!(first.progress_percentage, 50.0);
        assert!(!first.is_successful);

        let second = sign_petition(&petition(2, first.signatures), false, now).unwrap();
        assert_eq!(second.signatures, 2);
        assert_eq!(second.progress_percentage, 100.0);
        assert!(second.is_successful);
    }

    #[test]
    fn test_second_signature_by_same_viewer_is_rejected() {
        let result = sign_petition(&petition(10, 1), true, Utc::now());
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_past_deadline_is_closed() {
        let now = Utc::now();
        let closed = PetitionSnapshot {
            deadline: Some(now - Duration::hours(1)),
            ..petition(10, 0)
        };

        let result = sign_petition(&closed, false, now);
        assert!(matches!(result, Err(AppError::Closed(_))));
    }

    #[test]
    fn test_progress_is_capped_and_rounded() {
        assert_eq!(progress_percentage(0, 3), 0.0);
        assert_eq!(progress_percentage(1, 3), 33.3);
        assert_eq!(progress_percentage(2, 3), 66.7);
        assert_eq!(progress_percentage(7, 5), 100.0);
    }

    #[test]
    fn test_success_is_one_way() {
        let reached = PetitionSnapshot {
            is_successful: true,
            ..petition(5, 5)
        };
        let outcome = sign_petition(&reached, false, Utc::now()).unwrap();

        assert_eq!(outcome.signatures, 6);
        assert!(outcome.is_successful);
    }
}
