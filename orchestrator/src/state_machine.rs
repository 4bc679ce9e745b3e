//! State Machine (C7): validates and applies status transitions per the
//! session's fixed transition graph; rejects illegal edges outright.

use crate::errors::CoordinatorError;
use crate::types::SessionStatus;

/// True if `from -> to` is an allowed edge in the transition graph.
pub fn is_allowed_transition(from: SessionStatus, to: SessionStatus) -> bool {
    use SessionStatus::*;

    matches!(
        (from, to),
        (Initialized, SourceLocking)
            | (Initialized, Cancelling)
            | (Initialized, Failed)
            | (SourceLocking, SourceLocked)
            | (SourceLocking, Failed)
            | (SourceLocking, Cancelling)
            | (SourceLocked, DestinationLocking)
            | (SourceLocked, Timeout)
            | (DestinationLocking, BothLocked)
            | (DestinationLocking, Failed)
            | (DestinationLocking, Timeout)
            | (BothLocked, RevealingSecret)
            | (BothLocked, Timeout)
            | (RevealingSecret, Completed)
            | (RevealingSecret, Failed)
            | (Timeout, Refunding)
            | (Refunding, Refunded)
            | (Refunding, Failed)
            | (Cancelling, Cancelled)
            | (Cancelling, Failed)
    )
}

/// Validate `from -> to`; callers apply the transition only on `Ok`.
pub fn validate_transition(from: SessionStatus, to: SessionStatus) -> Result<(), CoordinatorError> {
    if is_allowed_transition(from, to) {
        Ok(())
    } else {
        Err(CoordinatorError::InvalidState)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionStatus::*;

    #[test]
    fn test_happy_path_edges_allowed() {
        assert!(is_allowed_transition(Initialized, SourceLocking));
        assert!(is_allowed_transition(SourceLocking, SourceLocked));
        assert!(is_allowed_transition(SourceLocked, DestinationLocking));
        assert!(is_allowed_transition(DestinationLocking, BothLocked));
        assert!(is_allowed_transition(BothLocked, RevealingSecret));
        assert!(is_allowed_transition(RevealingSecret, Completed));
    }

    #[test]
    fn test_illegal_cancel_from_both_locked_rejected() {
        assert!(!is_allowed_transition(BothLocked, Cancelling));
        assert!(validate_transition(BothLocked, Cancelling).is_err());
    }

    #[test]
    fn test_terminal_states_have_no_outgoing_edges() {
        for terminal in [Completed, Cancelled, Refunded, Failed] {
            for target in [
                Initialized,
                SourceLocking,
                SourceLocked,
                DestinationLocking,
                BothLocked,
                RevealingSecret,
                Completed,
                Cancelling,
                Cancelled,
                Timeout,
                Refunding,
                Refunded,
                Failed,
            ] {
                assert!(!is_allowed_transition(terminal, target));
            }
        }
    }

    #[test]
    fn test_timeout_path_from_any_pre_completion_state() {
        assert!(is_allowed_transition(SourceLocked, Timeout));
        assert!(is_allowed_transition(DestinationLocking, Timeout));
        assert!(is_allowed_transition(BothLocked, Timeout));
        assert!(is_allowed_transition(Timeout, Refunding));
        assert!(is_allowed_transition(Refunding, Refunded));
    }
}
