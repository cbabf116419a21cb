use super::types::State;

/// Legal moves out of each state. Completed and Failed are terminal.
const STATE_TRANSITIONS: &[(State, &[State])] = &[
    (State::Pending, &[State::Scheduled]),
    (
        State::Scheduled,
        &[State::Scheduled, State::Running, State::Failed],
    ),
    (
        State::Running,
        &[State::Running, State::Completed, State::Failed],
    ),
    (State::Completed, &[]),
    (State::Failed, &[]),
];

/// Runtime operation the worker performs for a requested state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
}

/// Requested states the worker knows how to act on. Every entry must be
/// reachable through `STATE_TRANSITIONS`.
const STATE_ACTIONS: &[(State, Action)] = &[
    (State::Scheduled, Action::Start),
    (State::Completed, Action::Stop),
];

pub fn valid_state_transition(src: State, dst: State) -> bool {
    STATE_TRANSITIONS
        .iter()
        .find(|(from, _)| *from == src)
        .is_some_and(|(_, valid_states)| valid_states.contains(&dst))
}

impl Action {
    pub fn for_state(state: State) -> Option<Action> {
        STATE_ACTIONS
            .iter()
            .find(|(target, _)| *target == state)
            .map(|(_, action)| *action)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const ALL_STATES: [State; 5] = [
        State::Pending,
        State::Scheduled,
        State::Running,
        State::Completed,
        State::Failed,
    ];

    #[rstest]
    #[case(State::Pending, State::Pending, false)]
    #[case(State::Pending, State::Scheduled, true)]
    #[case(State::Pending, State::Running, false)]
    #[case(State::Pending, State::Completed, false)]
    #[case(State::Pending, State::Failed, false)]
    #[case(State::Scheduled, State::Pending, false)]
    #[case(State::Scheduled, State::Scheduled, true)]
    #[case(State::Scheduled, State::Running, true)]
    #[case(State::Scheduled, State::Completed, false)]
    #[case(State::Scheduled, State::Failed, true)]
    #[case(State::Running, State::Pending, false)]
    #[case(State::Running, State::Scheduled, false)]
    #[case(State::Running, State::Running, true)]
    #[case(State::Running, State::Completed, true)]
    #[case(State::Running, State::Failed, true)]
    #[case(State::Completed, State::Pending, false)]
    #[case(State::Completed, State::Scheduled, false)]
    #[case(State::Completed, State::Running, false)]
    #[case(State::Completed, State::Completed, false)]
    #[case(State::Completed, State::Failed, false)]
    #[case(State::Failed, State::Pending, false)]
    #[case(State::Failed, State::Scheduled, false)]
    #[case(State::Failed, State::Running, false)]
    #[case(State::Failed, State::Completed, false)]
    #[case(State::Failed, State::Failed, false)]
    fn transition_table(#[case] from: State, #[case] to: State, #[case] expected: bool) {
        assert_eq!(valid_state_transition(from, to), expected);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [State::Completed, State::Failed] {
            assert!(ALL_STATES.iter().all(|to| !valid_state_transition(from, *to)));
        }
    }

    #[test]
    fn every_dispatched_state_is_reachable() {
        for (target, _) in STATE_ACTIONS {
            assert!(
                ALL_STATES.iter().any(|from| valid_state_transition(*from, *target)),
                "{target} has a handler but no legal transition into it"
            );
        }
    }

    #[rstest]
    #[case(State::Scheduled, Some(Action::Start))]
    #[case(State::Completed, Some(Action::Stop))]
    #[case(State::Running, None)]
    #[case(State::Failed, None)]
    #[case(State::Pending, None)]
    fn dispatch_table(#[case] state: State, #[case] expected: Option<Action>) {
        assert_eq!(Action::for_state(state), expected);
    }
}
