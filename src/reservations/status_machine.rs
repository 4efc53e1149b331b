use crate::reservations::ReservationStatus;

/// Transition rules for the reservation lifecycle
///
/// The lifecycle commands only ever move a reservation forward:
/// Pending/Confirmed into CheckedIn, CheckedIn into CheckedOut. Cancelled
/// and NoShow are terminal and outside this processor's mutation path.
/// A rejected transition is terminal for that command invocation; the
/// caller may resubmit.
pub struct StatusMachine;

impl StatusMachine {
    /// Check-in is allowed only from Pending or Confirmed
    pub fn can_check_in(from: ReservationStatus) -> bool {
        matches!(
            from,
            ReservationStatus::Pending | ReservationStatus::Confirmed
        )
    }

    /// Check-out is allowed only from CheckedIn
    pub fn can_check_out(from: ReservationStatus) -> bool {
        matches!(from, ReservationStatus::CheckedIn)
    }

    /// Terminal states are never mutated by lifecycle commands
    pub fn is_terminal(status: ReservationStatus) -> bool {
        matches!(
            status,
            ReservationStatus::CheckedOut | ReservationStatus::Cancelled | ReservationStatus::NoShow
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_can_check_in() {
        assert!(StatusMachine::can_check_in(ReservationStatus::Pending));
    }

    #[test]
    fn test_confirmed_can_check_in() {
        assert!(StatusMachine::can_check_in(ReservationStatus::Confirmed));
    }

    #[test]
    fn test_checked_in_cannot_check_in_again() {
        assert!(!StatusMachine::can_check_in(ReservationStatus::CheckedIn));
    }

    #[test]
    fn test_checked_out_cannot_check_in() {
        assert!(!StatusMachine::can_check_in(ReservationStatus::CheckedOut));
    }

    #[test]
    fn test_cancelled_cannot_check_in() {
        assert!(!StatusMachine::can_check_in(ReservationStatus::Cancelled));
    }

    #[test]
    fn test_no_show_cannot_check_in() {
        assert!(!StatusMachine::can_check_in(ReservationStatus::NoShow));
    }

    #[test]
    fn test_checked_in_can_check_out() {
        assert!(StatusMachine::can_check_out(ReservationStatus::CheckedIn));
    }

    #[test]
    fn test_pending_cannot_check_out() {
        assert!(!StatusMachine::can_check_out(ReservationStatus::Pending));
    }

    #[test]
    fn test_confirmed_cannot_check_out() {
        assert!(!StatusMachine::can_check_out(ReservationStatus::Confirmed));
    }

    #[test]
    fn test_checked_out_cannot_check_out_again() {
        assert!(!StatusMachine::can_check_out(ReservationStatus::CheckedOut));
    }

    #[test]
    fn test_terminal_states() {
        assert!(StatusMachine::is_terminal(ReservationStatus::CheckedOut));
        assert!(StatusMachine::is_terminal(ReservationStatus::Cancelled));
        assert!(StatusMachine::is_terminal(ReservationStatus::NoShow));
        assert!(!StatusMachine::is_terminal(ReservationStatus::Pending));
        assert!(!StatusMachine::is_terminal(ReservationStatus::Confirmed));
        assert!(!StatusMachine::is_terminal(ReservationStatus::CheckedIn));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn reservation_status_strategy() -> impl Strategy<Value = ReservationStatus> {
        prop_oneof![
            Just(ReservationStatus::Pending),
            Just(ReservationStatus::Confirmed),
            Just(ReservationStatus::CheckedIn),
            Just(ReservationStatus::CheckedOut),
            Just(ReservationStatus::Cancelled),
            Just(ReservationStatus::NoShow),
        ]
    }

    /// Check-in and check-out preconditions never overlap: no status is
    /// eligible for both commands at once.
    #[test]
    fn prop_check_in_and_check_out_are_disjoint() {
        proptest!(|(status in reservation_status_strategy())| {
            prop_assert!(
                !(StatusMachine::can_check_in(status) && StatusMachine::can_check_out(status)),
                "Status {} must not allow both commands",
                status
            );
        });
    }

    /// Terminal states admit neither lifecycle command.
    #[test]
    fn prop_terminal_states_admit_no_command() {
        proptest!(|(status in reservation_status_strategy())| {
            if StatusMachine::is_terminal(status) {
                prop_assert!(!StatusMachine::can_check_in(status));
                prop_assert!(!StatusMachine::can_check_out(status));
            }
        });
    }

    /// Every status is either terminal, check-in eligible, or check-out
    /// eligible; the machine has no unreachable dead states.
    #[test]
    fn prop_every_status_is_classified() {
        proptest!(|(status in reservation_status_strategy())| {
            let classified = StatusMachine::is_terminal(status)
                || StatusMachine::can_check_in(status)
                || StatusMachine::can_check_out(status);
            prop_assert!(classified, "Status {} is unclassified", status);
        });
    }
}
