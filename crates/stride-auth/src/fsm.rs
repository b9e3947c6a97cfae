//! Session state machine using rust-fsm.
//!
//! ```text
//! Loading ──┬── Verified | OfflineCachedAuth ──────────────► Authenticated
//!           └── Rejected | OfflineCachedAnon | SignedOut ──► Unauthenticated
//! ```
//!
//! Both settled states accept the same inputs with the same targets.
//!
//! `Loading` is only the initial state; once settled the session moves
//! between the two settled states and never returns to it.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub session_machine(Loading)

    Loading => {
        Verified => Authenticated,
        OfflineCachedAuth => Authenticated,
        Rejected => Unauthenticated,
        OfflineCachedAnon => Unauthenticated,
        SignedOut => Unauthenticated
    },
    Authenticated => {
        Verified => Authenticated,
        OfflineCachedAuth => Authenticated,
        Rejected => Unauthenticated,
        OfflineCachedAnon => Unauthenticated,
        SignedOut => Unauthenticated
    },
    Unauthenticated => {
        Verified => Authenticated,
        OfflineCachedAuth => Authenticated,
        Rejected => Unauthenticated,
        OfflineCachedAnon => Unauthenticated,
        SignedOut => Unauthenticated
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Auth status exposed to the rest of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Loading,
    Authenticated,
    Unauthenticated,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Loading => "loading",
            SessionStatus::Authenticated => "authenticated",
            SessionStatus::Unauthenticated => "unauthenticated",
        }
    }
}

impl From<&SessionMachineState> for SessionStatus {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Loading => SessionStatus::Loading,
            SessionMachineState::Authenticated => SessionStatus::Authenticated,
            SessionMachineState::Unauthenticated => SessionStatus::Unauthenticated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_loading() {
        let machine = SessionMachine::new();
        assert_eq!(*machine.state(), SessionMachineState::Loading);
    }

    #[test]
    fn test_verified_then_signed_out() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionMachineInput::Verified).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Authenticated);

        machine.consume(&SessionMachineInput::SignedOut).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);
    }

    #[test]
    fn test_offline_keeps_cached_identity() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::OfflineCachedAuth).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Authenticated);

        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::OfflineCachedAnon).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);
    }

    #[test]
    fn test_rejected_from_authenticated() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::Verified).unwrap();
        machine.consume(&SessionMachineInput::Rejected).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Unauthenticated);
    }

    #[test]
    fn test_status_conversion() {
        assert_eq!(
            SessionStatus::from(&SessionMachineState::Loading),
            SessionStatus::Loading
        );
        assert_eq!(
            SessionStatus::from(&SessionMachineState::Authenticated),
            SessionStatus::Authenticated
        );
        assert_eq!(
            SessionStatus::from(&SessionMachineState::Unauthenticated),
            SessionStatus::Unauthenticated
        );
        assert_eq!(SessionStatus::Unauthenticated.as_str(), "unauthenticated");
    }
}
