//! State → disposition mapping.
//!
//! | EMR state                              | Disposition |
//! |----------------------------------------|-------------|
//! | `COMPLETED`                            | `Success`   |
//! | `CANCELLED`, `FAILED`, `INTERRUPTED`   | `Failure`   |
//! | anything else (`PENDING`, `RUNNING`, …) | `Heartbeat` |
//!
//! Unrecognised states keep the wait alive rather than being dropped: EMR emits
//! many intermediate states and none of them may end the workflow's wait.
//! `Ignore` is never produced here; it only arises when no token is stored.

use crate::types::Disposition;

pub const SUCCESS_STATE: &str = "COMPLETED";

pub const FAILURE_STATES: [&str; 3] = ["CANCELLED", "FAILED", "INTERRUPTED"];

/// Classify an EMR lifecycle state. Comparison is exact and case-sensitive.
pub fn classify(state: &str) -> Disposition {
    if state == SUCCESS_STATE {
        Disposition::Success
    } else if FAILURE_STATES.contains(&state) {
        Disposition::Failure
    } else {
        Disposition::Heartbeat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_completed_is_success() {
        assert_eq!(classify("COMPLETED"), Disposition::Success);
    }

    #[test]
    fn test_failure_states() {
        for state in FAILURE_STATES {
            assert_eq!(classify(state), Disposition::Failure, "{state}");
        }
    }

    #[test]
    fn test_intermediate_states_heartbeat() {
        for state in ["PENDING", "RUNNING", "CANCEL_PENDING", "STARTING", "WAITING"] {
            assert_eq!(classify(state), Disposition::Heartbeat, "{state}");
        }
    }

    #[test]
    fn test_case_sensitive() {
        assert_eq!(classify("completed"), Disposition::Heartbeat);
        assert_eq!(classify("Failed"), Disposition::Heartbeat);
    }

    proptest! {
        #[test]
        fn unrecognised_states_never_terminal(state in "[A-Za-z_]{1,24}") {
            prop_assume!(state != SUCCESS_STATE);
            prop_assume!(!FAILURE_STATES.contains(&state.as_str()));
            prop_assert_eq!(classify(&state), Disposition::Heartbeat);
        }

        #[test]
        fn classify_never_ignores(state in ".*") {
            prop_assert_ne!(classify(&state), Disposition::Ignore);
        }
    }
}
