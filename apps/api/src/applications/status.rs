//! Application status state machine.
//!
//! ```text
//! pending -> reviewed -> interviewing -> offered -> hired
//! any non-terminal -> rejected | withdrawn
//! ```

use crate::errors::LifecycleError;
use crate::models::application::ApplicationStatus;

impl ApplicationStatus {
    /// Hired, rejected and withdrawn applications never move again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Hired | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }

    /// Staying in a non-terminal status is allowed so reviewers can edit notes.
    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;

        if self.is_terminal() {
            return false;
        }
        if *self == next {
            return true;
        }
        matches!(
            (*self, next),
            (Pending, Reviewed)
                | (Reviewed, Interviewing)
                | (Interviewing, Offered)
                | (Offered, Hired)
                | (_, Rejected)
                | (_, Withdrawn)
        )
    }
}

pub fn validate_transition(
    from: ApplicationStatus,
    to: ApplicationStatus,
) -> Result<(), LifecycleError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidState { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ApplicationStatus::*;

    #[test]
    fn test_happy_path_edges() {
        assert!(Pending.can_transition_to(Reviewed));
        assert!(Reviewed.can_transition_to(Interviewing));
        assert!(Interviewing.can_transition_to(Offered));
        assert!(Offered.can_transition_to(Hired));
    }

    #[test]
    fn test_reject_and_withdraw_from_every_open_state() {
        for from in [Pending, Reviewed, Interviewing, Offered] {
            assert!(from.can_transition_to(Rejected), "{from} -> rejected");
            assert!(from.can_transition_to(Withdrawn), "{from} -> withdrawn");
        }
    }

    #[test]
    fn test_terminal_states_are_frozen() {
        for from in [Hired, Rejected, Withdrawn] {
            assert!(from.is_terminal());
            for to in ApplicationStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be refused");
            }
        }
    }

    #[test]
    fn test_skipping_steps_is_refused() {
        assert!(!Pending.can_transition_to(Interviewing));
        assert!(!Pending.can_transition_to(Hired));
        assert!(!Reviewed.can_transition_to(Offered));
        assert!(!Interviewing.can_transition_to(Pending));
    }

    #[test]
    fn test_same_status_on_open_application() {
        assert!(Reviewed.can_transition_to(Reviewed));
    }

    #[test]
    fn test_validate_transition_error_carries_both_states() {
        match validate_transition(Hired, Pending) {
            Err(LifecycleError::InvalidState { from, to }) => {
                assert_eq!(from, Hired);
                assert_eq!(to, Pending);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
