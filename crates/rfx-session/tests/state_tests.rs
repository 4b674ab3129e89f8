use proptest::prelude::*;
use rfx_session::state::{allowed_transitions, validate_transition, SessionState};

fn any_state() -> impl Strategy<Value = SessionState> {
    use SessionState::*;
    prop_oneof![
        Just(Created),
        Just(Editing),
        Just(Validating),
        Just(Blocked),
        Just(AwaitingReview),
        Just(Applying),
        Just(Committed),
        Just(RolledBack),
        Just(Cancelled),
        Just(CorruptionSuspected),
    ]
}

#[test]
fn test_created_transitions() {
    assert!(validate_transition(SessionState::Created, SessionState::Editing).is_ok());
    assert!(validate_transition(SessionState::Created, SessionState::Cancelled).is_ok());

    // Invalid
    assert!(validate_transition(SessionState::Created, SessionState::Applying).is_err());
    assert!(validate_transition(SessionState::Created, SessionState::Committed).is_err());
}

#[test]
fn test_validating_fan_out() {
    for to in [
        SessionState::Blocked,
        SessionState::AwaitingReview,
        SessionState::Applying,
        SessionState::Editing,
        SessionState::Cancelled,
    ] {
        assert!(validate_transition(SessionState::Validating, to).is_ok());
    }
    assert!(validate_transition(SessionState::Validating, SessionState::Committed).is_err());
}

#[test]
fn test_applying_outcomes() {
    assert!(validate_transition(SessionState::Applying, SessionState::Committed).is_ok());
    assert!(validate_transition(SessionState::Applying, SessionState::RolledBack).is_ok());
    assert!(
        validate_transition(SessionState::Applying, SessionState::CorruptionSuspected).is_ok()
    );
    assert!(validate_transition(SessionState::Applying, SessionState::Editing).is_err());
}

proptest! {
    #[test]
    fn prop_all_transitions_are_subset_of_allowed(from in any_state(), to in any_state()) {
        let res = validate_transition(from, to);
        let allowed = allowed_transitions(from);

        if res.is_ok() {
            prop_assert!(allowed.contains(&to));
        } else {
            prop_assert!(!allowed.contains(&to));
        }
    }

    #[test]
    fn prop_terminal_states_are_absorbing(from in any_state(), to in any_state()) {
        if from.is_terminal() {
            prop_assert!(validate_transition(from, to).is_err());
        }
    }

    #[test]
    fn prop_cancel_reachable_from_every_non_terminal(from in any_state()) {
        if !from.is_terminal() {
            prop_assert!(validate_transition(from, SessionState::Cancelled).is_ok());
        }
    }
}
