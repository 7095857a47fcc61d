use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Phases a quiz session moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    /// Players may join; nothing has been asked yet.
    Lobby,
    /// A question is open for answers and its timer is armed.
    QuestionActive,
    /// The question closed; answers are frozen and can be revealed.
    Processing,
    /// Standings are displayed between questions.
    Leaderboard,
    /// Terminal phase.
    Ended,
}

impl SessionPhase {
    /// Stable wire name of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Lobby => "LOBBY",
            SessionPhase::QuestionActive => "QUESTION_ACTIVE",
            SessionPhase::Processing => "PROCESSING",
            SessionPhase::Leaderboard => "LEADERBOARD",
            SessionPhase::Ended => "ENDED",
        }
    }
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Host starts the quiz from the lobby.
    Start,
    /// The open question closes (timer or host).
    EndQuestion,
    /// Standings are shown after a closed question.
    ShowLeaderboard,
    /// Move past the leaderboard; `remaining` tells whether another question exists.
    NextQuestion {
        /// Whether another question is left to ask.
        remaining: bool,
    },
    /// Terminate the session from wherever it is.
    End,
}

impl SessionEvent {
    /// Operation name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Start => "start",
            SessionEvent::EndQuestion => "end_current_question",
            SessionEvent::ShowLeaderboard => "show_leaderboard",
            SessionEvent::NextQuestion { .. } => "next_question",
            SessionEvent::End => "end",
        }
    }
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: SessionPhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
}

/// Per-session lifecycle: LOBBY → QUESTION_ACTIVE → PROCESSING → LEADERBOARD → … → ENDED.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: SessionPhase,
    version: usize,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Lobby,
            version: 0,
        }
    }
}

impl SessionStateMachine {
    /// Create a new state machine initialised in the lobby.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
        }
    }

    /// Apply `event`, returning the new phase or leaving the machine untouched on error.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (SessionPhase::Lobby, SessionEvent::Start) => SessionPhase::QuestionActive,
            (SessionPhase::QuestionActive, SessionEvent::EndQuestion) => SessionPhase::Processing,
            (SessionPhase::Processing, SessionEvent::ShowLeaderboard) => SessionPhase::Leaderboard,
            (SessionPhase::Leaderboard, SessionEvent::NextQuestion { remaining: true }) => {
                SessionPhase::QuestionActive
            }
            (SessionPhase::Leaderboard, SessionEvent::NextQuestion { remaining: false }) => {
                SessionPhase::Ended
            }
            (_, SessionEvent::End) => SessionPhase::Ended,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_lobby() {
        let sm = SessionStateMachine::new();
        assert_eq!(sm.phase(), SessionPhase::Lobby);
        assert_eq!(sm.snapshot().version, 0);
    }

    #[test]
    fn full_happy_path_through_quiz() {
        let mut sm = SessionStateMachine::new();

        assert_eq!(
            sm.apply(SessionEvent::Start).unwrap(),
            SessionPhase::QuestionActive
        );
        assert_eq!(
            sm.apply(SessionEvent::EndQuestion).unwrap(),
            SessionPhase::Processing
        );
        assert_eq!(
            sm.apply(SessionEvent::ShowLeaderboard).unwrap(),
            SessionPhase::Leaderboard
        );
        assert_eq!(
            sm.apply(SessionEvent::NextQuestion { remaining: true })
                .unwrap(),
            SessionPhase::QuestionActive
        );
        sm.apply(SessionEvent::EndQuestion).unwrap();
        sm.apply(SessionEvent::ShowLeaderboard).unwrap();
        assert_eq!(
            sm.apply(SessionEvent::NextQuestion { remaining: false })
                .unwrap(),
            SessionPhase::Ended
        );
        assert_eq!(sm.snapshot().version, 7);
    }

    #[test]
    fn end_is_accepted_from_every_phase() {
        let mut sm = SessionStateMachine::new();
        assert_eq!(sm.apply(SessionEvent::End).unwrap(), SessionPhase::Ended);
        assert_eq!(sm.apply(SessionEvent::End).unwrap(), SessionPhase::Ended);

        let mut sm = SessionStateMachine::new();
        sm.apply(SessionEvent::Start).unwrap();
        assert_eq!(sm.apply(SessionEvent::End).unwrap(), SessionPhase::Ended);
    }

    #[test]
    fn invalid_transition_returns_error() {
        let mut sm = SessionStateMachine::new();
        let err = sm.apply(SessionEvent::EndQuestion).unwrap_err();
        assert_eq!(err.from, SessionPhase::Lobby);
        assert_eq!(err.event, SessionEvent::EndQuestion);
        assert_eq!(sm.phase(), SessionPhase::Lobby);
        assert_eq!(sm.snapshot().version, 0);
    }

    #[test]
    fn ended_is_terminal_except_for_end() {
        let mut sm = SessionStateMachine::new();
        sm.apply(SessionEvent::End).unwrap();
        for event in [
            SessionEvent::Start,
            SessionEvent::EndQuestion,
            SessionEvent::ShowLeaderboard,
            SessionEvent::NextQuestion { remaining: true },
        ] {
            assert!(sm.apply(event).is_err(), "{event:?} should be rejected");
        }
    }
}
