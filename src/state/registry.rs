//! PIN-keyed collection of live sessions plus a best-effort player → PIN index.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::state::{
    quiz::{QuestionView, QuizSnapshot},
    scoring::{ScoreResult, ScoringConfig},
    session::{LeaderboardEntry, PlayerState, QuestionResults, Session, SessionError},
    state_machine::SessionPhase,
    timer::TimeoutHook,
};

/// Number of characters in a join code.
pub const PIN_LENGTH: usize = 6;

/// A session shared between request handlers and its own timer callback.
pub type SharedSession = Arc<Mutex<Session>>;

/// Errors raised by registry lookups and delegations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// PIN is malformed and was rejected before lookup.
    #[error("invalid pin `{0}`: expected {PIN_LENGTH} characters")]
    InvalidPin(String),
    /// No active session under that PIN.
    #[error("no active session for pin `{0}`")]
    NotFound(String),
    /// No free PIN found within the attempt budget.
    #[error("could not allocate a unique pin after {0} attempts")]
    PinExhausted(usize),
    /// The addressed session rejected the operation.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Compact description of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SessionSummary {
    /// Join code.
    pub pin: String,
    /// Current phase.
    pub state: SessionPhase,
    /// Number of players in the roster.
    pub player_count: usize,
    /// Title of the quiz being played.
    pub quiz_title: String,
    /// Question pointer, absent before the start.
    pub current_question_index: Option<usize>,
    /// Number of questions in the quiz.
    pub total_questions: usize,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            pin: session.pin().to_string(),
            state: session.phase(),
            player_count: session.player_count(),
            quiz_title: session.quiz().title.clone(),
            current_question_index: session.current_question_index(),
            total_questions: session.quiz().questions.len(),
        }
    }
}

/// Read-only diagnostic counters.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegistryStats {
    /// Number of live sessions.
    pub active_sessions: usize,
    /// Number of entries in the player → PIN index.
    pub indexed_players: usize,
    /// Summary of every live session, ordered by PIN.
    pub sessions: Vec<SessionSummary>,
}

/// Owns every active session. Constructed once at startup and shared through the app state.
pub struct SessionRegistry {
    sessions: DashMap<String, SharedSession>,
    player_index: DashMap<String, String>,
    scoring: ScoringConfig,
    pin_attempts: usize,
}

impl SessionRegistry {
    /// Build an empty registry.
    pub fn new(scoring: ScoringConfig, pin_attempts: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            player_index: DashMap::new(),
            scoring,
            pin_attempts: pin_attempts.max(1),
        }
    }

    /// Create a session for `quiz` under a freshly drawn PIN.
    pub fn create_session(
        &self,
        quiz: Arc<QuizSnapshot>,
        host_user_id: &str,
        host_socket_id: &str,
    ) -> Result<SessionSummary, RegistryError> {
        self.create_session_with_pins(random_pin, quiz, host_user_id, host_socket_id)
    }

    fn create_session_with_pins(
        &self,
        mut draw_pin: impl FnMut() -> String,
        quiz: Arc<QuizSnapshot>,
        host_user_id: &str,
        host_socket_id: &str,
    ) -> Result<SessionSummary, RegistryError> {
        for _ in 0..self.pin_attempts {
            let pin = draw_pin();
            // The entry API makes the collision check and the insert one atomic step.
            if let Entry::Vacant(slot) = self.sessions.entry(pin.clone()) {
                let session = Session::new(
                    pin.clone(),
                    quiz,
                    host_user_id.to_string(),
                    host_socket_id.to_string(),
                    self.scoring,
                );
                let summary = SessionSummary::from(&session);
                slot.insert(Arc::new(Mutex::new(session)));
                info!(%pin, host = %host_user_id, quiz = %summary.quiz_title, "session created");
                return Ok(summary);
            }
        }

        warn!(attempts = self.pin_attempts, "pin space exhausted");
        Err(RegistryError::PinExhausted(self.pin_attempts))
    }

    /// Look up a session, rejecting malformed PINs before touching the map.
    pub fn get_session(&self, pin: &str) -> Result<SharedSession, RegistryError> {
        if pin.chars().count() != PIN_LENGTH {
            return Err(RegistryError::InvalidPin(pin.to_string()));
        }
        self.sessions
            .get(pin)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RegistryError::NotFound(pin.to_string()))
    }

    /// Run `f` against the addressed session while holding its lock.
    pub async fn with_session<T>(
        &self,
        pin: &str,
        f: impl FnOnce(&mut Session) -> Result<T, SessionError>,
    ) -> Result<T, RegistryError> {
        let session = self.get_session(pin)?;
        let mut guard = session.lock().await;
        Ok(f(&mut guard)?)
    }

    /// Read from the addressed session.
    pub async fn inspect<T>(
        &self,
        pin: &str,
        f: impl FnOnce(&Session) -> T,
    ) -> Result<T, RegistryError> {
        let session = self.get_session(pin)?;
        let guard = session.lock().await;
        Ok(f(&guard))
    }

    /// Summary of one session.
    pub async fn summary(&self, pin: &str) -> Result<SessionSummary, RegistryError> {
        self.inspect(pin, |session| SessionSummary::from(session))
            .await
    }

    /// Add a player and index it.
    pub async fn add_player(
        &self,
        pin: &str,
        user_id: &str,
        nickname: &str,
        socket_id: &str,
    ) -> Result<PlayerState, RegistryError> {
        let player = self
            .with_session(pin, |session| {
                session.add_player(user_id, nickname, socket_id)
            })
            .await?;
        self.player_index
            .insert(user_id.to_string(), pin.to_string());
        Ok(player)
    }

    /// Remove a player and drop its index entry.
    pub async fn remove_player(
        &self,
        pin: &str,
        user_id: &str,
    ) -> Result<PlayerState, RegistryError> {
        let player = self
            .with_session(pin, |session| session.remove_player(user_id))
            .await?;
        self.player_index
            .remove_if(user_id, |_, indexed| indexed == pin);
        Ok(player)
    }

    /// Rebind a player to a new connection.
    pub async fn update_player_socket(
        &self,
        pin: &str,
        user_id: &str,
        socket_id: &str,
    ) -> Result<PlayerState, RegistryError> {
        self.with_session(pin, |session| {
            session.update_player_socket(user_id, socket_id)
        })
        .await
    }

    /// Open the first question.
    pub async fn start_session(
        &self,
        pin: &str,
        on_timeout: TimeoutHook,
    ) -> Result<Arc<QuestionView>, RegistryError> {
        self.with_session(pin, |session| session.start(on_timeout))
            .await
    }

    /// Submit an answer for the open question.
    pub async fn submit_answer(
        &self,
        pin: &str,
        user_id: &str,
        answer_index: usize,
    ) -> Result<ScoreResult, RegistryError> {
        self.with_session(pin, |session| {
            session.submit_answer(user_id, answer_index)
        })
        .await
    }

    /// Close the open question on behalf of the host.
    pub async fn end_current_question(&self, pin: &str) -> Result<QuestionResults, RegistryError> {
        self.with_session(pin, |session| {
            session.end_current_question()?;
            closed_results(session)
        })
        .await
    }

    /// Timer path: close question `question_index` if it is still open.
    ///
    /// `None` means the session already moved on and nothing changed.
    pub async fn expire_question(
        &self,
        pin: &str,
        question_index: usize,
    ) -> Result<Option<QuestionResults>, RegistryError> {
        self.with_session(pin, |session| {
            if session.expire_question(question_index)? {
                closed_results(session).map(Some)
            } else {
                Ok(None)
            }
        })
        .await
    }

    /// Show the standings after a closed question.
    pub async fn show_leaderboard(&self, pin: &str) -> Result<(), RegistryError> {
        self.with_session(pin, Session::show_leaderboard).await
    }

    /// Advance past the leaderboard. Returns the opened question, or `None` when
    /// the quiz is exhausted and the session ended.
    pub async fn next_question(
        &self,
        pin: &str,
        on_timeout: TimeoutHook,
    ) -> Result<Option<Arc<QuestionView>>, RegistryError> {
        self.with_session(pin, |session| {
            let opened = session.next_question(on_timeout)?;
            Ok(if opened { session.current_question() } else { None })
        })
        .await
    }

    /// End the session from any phase.
    pub async fn end_session(&self, pin: &str) -> Result<(), RegistryError> {
        self.with_session(pin, |session| {
            session.end();
            Ok(())
        })
        .await
    }

    /// Ranked players of a session.
    pub async fn leaderboard(
        &self,
        pin: &str,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, RegistryError> {
        self.inspect(pin, |session| session.leaderboard(limit))
            .await
    }

    /// Remove a session, purge its index entries and release its players.
    ///
    /// Returns whether a session was removed; unknown PINs are a no-op.
    pub async fn delete_session(&self, pin: &str) -> bool {
        let Some((_, session)) = self.sessions.remove(pin) else {
            return false;
        };

        let mut guard = session.lock().await;
        for player in guard.players() {
            self.player_index
                .remove_if(&player.id, |_, indexed| indexed == pin);
        }
        guard.destroy();
        info!(%pin, "session deleted");
        true
    }

    /// PIN of the session a player joined most recently, if still indexed.
    pub fn session_for_player(&self, user_id: &str) -> Option<String> {
        self.player_index
            .get(user_id)
            .map(|entry| entry.value().clone())
    }

    /// Number of live sessions.
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Aggregate diagnostic counters.
    pub async fn stats(&self) -> RegistryStats {
        let sessions: Vec<SharedSession> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut summaries = Vec::with_capacity(sessions.len());
        for session in sessions {
            summaries.push(SessionSummary::from(&*session.lock().await));
        }
        summaries.sort_by(|a, b| a.pin.cmp(&b.pin));

        RegistryStats {
            active_sessions: summaries.len(),
            indexed_players: self.player_index.len(),
            sessions: summaries,
        }
    }
}

fn closed_results(session: &Session) -> Result<QuestionResults, SessionError> {
    session
        .question_results()
        .ok_or(SessionError::InvalidState {
            operation: "question_results",
            phase: session.phase(),
        })
}

fn random_pin() -> String {
    rand::rng().random_range(100_000..=999_999u32).to_string()
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;
    use crate::state::quiz::{Question, QuestionKind};

    fn quiz() -> Arc<QuizSnapshot> {
        Arc::new(QuizSnapshot {
            id: "quiz-1".into(),
            title: "Registry".into(),
            host_id: "host".into(),
            questions: vec![Question {
                id: "q1".into(),
                text: "Pick a".into(),
                kind: QuestionKind::MultipleChoice,
                time_limit_seconds: 10,
                points_multiplier: 1.0,
                options: vec!["a".into(), "b".into()],
                correct_option_index: 0,
            }],
        })
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(ScoringConfig::default(), 100)
    }

    fn noop_hook() -> TimeoutHook {
        Arc::new(|_, _| {})
    }

    #[tokio::test]
    async fn scenario_d_pin_lookup() {
        let registry = registry();
        let first = registry.create_session(quiz(), "host", "hs").unwrap();
        let second = registry.create_session(quiz(), "host", "hs").unwrap();
        assert_ne!(first.pin, second.pin);
        assert_eq!(first.pin.len(), PIN_LENGTH);
        assert_eq!(first.state, SessionPhase::Lobby);
        assert_eq!(first.quiz_title, "Registry");

        assert_eq!(
            registry.get_session("12").unwrap_err(),
            RegistryError::InvalidPin("12".into())
        );
        if first.pin != "000000" && second.pin != "000000" {
            assert_eq!(
                registry.get_session("000000").unwrap_err(),
                RegistryError::NotFound("000000".into())
            );
        }

        assert!(registry.delete_session(&first.pin).await);
        assert_eq!(
            registry.get_session(&first.pin).unwrap_err(),
            RegistryError::NotFound(first.pin.clone())
        );
        assert!(!registry.delete_session(&first.pin).await);
        assert!(registry.get_session(&second.pin).is_ok());
    }

    #[tokio::test]
    async fn colliding_pins_are_redrawn() {
        let registry = registry();
        registry
            .create_session_with_pins(|| "111111".into(), quiz(), "host", "hs")
            .unwrap();

        let draws = AtomicUsize::new(0);
        let summary = registry
            .create_session_with_pins(
                || {
                    if draws.fetch_add(1, Ordering::SeqCst) < 3 {
                        "111111".into()
                    } else {
                        "222222".into()
                    }
                },
                quiz(),
                "host",
                "hs",
            )
            .unwrap();
        assert_eq!(summary.pin, "222222");
        assert_eq!(draws.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn pin_exhaustion_is_bounded() {
        let registry = SessionRegistry::new(ScoringConfig::default(), 5);
        registry
            .create_session_with_pins(|| "111111".into(), quiz(), "host", "hs")
            .unwrap();

        let err = registry
            .create_session_with_pins(|| "111111".into(), quiz(), "host", "hs")
            .unwrap_err();
        assert_eq!(err, RegistryError::PinExhausted(5));
        assert_eq!(registry.active_count(), 1);
    }

    #[tokio::test]
    async fn player_index_follows_join_and_leave() {
        let registry = registry();
        let pin = registry.create_session(quiz(), "host", "hs").unwrap().pin;

        registry.add_player(&pin, "p1", "Alice", "s1").await.unwrap();
        registry.add_player(&pin, "p2", "Bob", "s2").await.unwrap();
        assert_eq!(registry.session_for_player("p1"), Some(pin.clone()));

        registry.remove_player(&pin, "p1").await.unwrap();
        assert_eq!(registry.session_for_player("p1"), None);
        assert!(matches!(
            registry.remove_player(&pin, "p1").await.unwrap_err(),
            RegistryError::Session(SessionError::NotFound(_))
        ));

        let stats = registry.stats().await;
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.indexed_players, 1);
        assert_eq!(stats.sessions[0].player_count, 1);

        assert!(registry.delete_session(&pin).await);
        assert_eq!(registry.session_for_player("p2"), None);
        assert_eq!(registry.stats().await.indexed_players, 0);
    }

    #[tokio::test]
    async fn deleting_one_session_keeps_newer_index_entries() {
        let registry = registry();
        let old_pin = registry.create_session(quiz(), "host", "hs").unwrap().pin;
        let new_pin = registry.create_session(quiz(), "host", "hs").unwrap().pin;

        registry.add_player(&old_pin, "p1", "Alice", "s1").await.unwrap();
        registry.add_player(&new_pin, "p1", "Alice", "s2").await.unwrap();
        assert_eq!(registry.session_for_player("p1"), Some(new_pin.clone()));

        registry.delete_session(&old_pin).await;
        assert_eq!(registry.session_for_player("p1"), Some(new_pin));
    }

    #[tokio::test]
    async fn delegations_reach_the_session() {
        let registry = registry();
        let pin = registry.create_session(quiz(), "host", "hs").unwrap().pin;
        registry.add_player(&pin, "p1", "Alice", "s1").await.unwrap();

        let view = registry.start_session(&pin, noop_hook()).await.unwrap();
        assert_eq!(view.index, 0);

        let result = registry.submit_answer(&pin, "p1", 0).await.unwrap();
        assert!(result.is_correct);
        assert!(matches!(
            registry.submit_answer(&pin, "p1", 0).await.unwrap_err(),
            RegistryError::Session(SessionError::AlreadyAnswered(_))
        ));

        let results = registry.end_current_question(&pin).await.unwrap();
        assert_eq!(results.distribution, vec![1, 0]);
        assert_eq!(results.answered_count, 1);
        registry.show_leaderboard(&pin).await.unwrap();
        assert!(registry.next_question(&pin, noop_hook()).await.unwrap().is_none());
        assert_eq!(
            registry.summary(&pin).await.unwrap().state,
            SessionPhase::Ended
        );

        let board = registry.leaderboard(&pin, 10).await.unwrap();
        assert_eq!(board[0].total_score, 1_000);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_drives_the_same_transition_as_the_host() {
        let registry = Arc::new(registry());
        let pin = registry.create_session(quiz(), "host", "hs").unwrap().pin;
        registry.add_player(&pin, "p1", "Alice", "s1").await.unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let hook_registry = registry.clone();
        let hook: TimeoutHook = Arc::new(move |pin, index| {
            let registry = hook_registry.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let closed = registry.expire_question(&pin, index).await;
                let _ = tx.send(closed);
            });
        });

        registry.start_session(&pin, hook).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10_600)).await;

        let closed = rx.recv().await.unwrap().unwrap();
        assert_eq!(closed.map(|results| results.question_index), Some(0));
        assert_eq!(
            registry.summary(&pin).await.unwrap().state,
            SessionPhase::Processing
        );
        assert!(matches!(
            registry.end_current_question(&pin).await.unwrap_err(),
            RegistryError::Session(SessionError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn end_session_is_idempotent() {
        let registry = registry();
        let pin = registry.create_session(quiz(), "host", "hs").unwrap().pin;
        registry.end_session(&pin).await.unwrap();
        registry.end_session(&pin).await.unwrap();
        assert_eq!(
            registry.summary(&pin).await.unwrap().state,
            SessionPhase::Ended
        );
    }
}
