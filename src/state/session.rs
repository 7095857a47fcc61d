//! One run of a quiz: roster, question pointer, timer and scoring.
//!
//! Every operation here is synchronous and runs to completion; callers serialise
//! access per session (see [`crate::state::registry::SessionRegistry`]), which is
//! what makes the "already answered" and "duplicate player" guards race-free.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, SystemTime},
};

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::state::{
    quiz::{Question, QuestionView, QuizSnapshot},
    scoring::{ScoreResult, ScoringConfig, score},
    state_machine::{InvalidTransition, SessionEvent, SessionPhase, SessionStateMachine},
    timer::{QuestionTimer, TimeoutHook},
};

/// Errors raised by session operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Operation not allowed in the current phase.
    #[error("{operation} is not allowed while the session is {}", phase.as_str())]
    InvalidState {
        /// Rejected operation.
        operation: &'static str,
        /// Phase the session was in.
        phase: SessionPhase,
    },
    /// Player is not part of the session.
    #[error("player `{0}` is not part of this session")]
    NotFound(String),
    /// Player already joined.
    #[error("player `{0}` already joined this session")]
    DuplicatePlayer(String),
    /// Player already has a recorded answer for the open question.
    #[error("player `{0}` already answered the current question")]
    AlreadyAnswered(String),
    /// Submitted option does not exist.
    #[error("answer index {index} is out of range for {options} options")]
    InvalidIndex {
        /// Submitted index.
        index: usize,
        /// Number of options of the question.
        options: usize,
    },
    /// Submission arrived after the time limit plus grace window.
    #[error("answer arrived {elapsed_ms} ms after the question opened (limit {limit_ms} ms)")]
    TooLate {
        /// Time elapsed since the question opened.
        elapsed_ms: u64,
        /// Time limit including the grace window.
        limit_ms: u64,
    },
    /// Start requested with nobody in the lobby.
    #[error("cannot start a session without players")]
    EmptyRoom,
    /// Correct answer requested while the question is still open.
    #[error("the correct answer stays hidden while the question is open")]
    AnswerHidden,
}

impl From<InvalidTransition> for SessionError {
    fn from(err: InvalidTransition) -> Self {
        SessionError::InvalidState {
            operation: err.event.name(),
            phase: err.from,
        }
    }
}

/// Answer recorded for the open question.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RecordedAnswer {
    /// Option chosen by the player.
    pub answer_index: usize,
    /// Wall-clock time of the submission.
    #[serde(skip)]
    pub submitted_at: SystemTime,
    /// Time elapsed since the question opened.
    pub elapsed_ms: u64,
    /// Points awarded for this answer.
    pub points: u32,
    /// Whether the answer was correct.
    pub is_correct: bool,
}

/// Per-player state tracked by a session.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PlayerState {
    /// Trusted user identifier.
    pub id: String,
    /// Realtime connection currently bound to the player; swapped on reconnect.
    pub socket_id: String,
    /// Display name.
    pub nickname: String,
    /// Accumulated score.
    pub total_score: u32,
    /// Consecutive correct answers.
    pub current_combo: u32,
    /// Answer recorded for the open question, reset whenever a question opens.
    pub last_answer: Option<RecordedAnswer>,
}

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    /// 1-based rank.
    pub rank: usize,
    /// Player identifier.
    pub player_id: String,
    /// Display name.
    pub nickname: String,
    /// Accumulated score.
    pub total_score: u32,
    /// Current streak.
    pub current_combo: u32,
    /// Rank held when the latest question opened, if the player was ranked then.
    pub previous_rank: Option<usize>,
}

/// Outcome of a closed question, captured under the session lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct QuestionResults {
    /// Index of the question that closed.
    pub question_index: usize,
    /// Correct option, revealed now that answering is over.
    pub correct_option_index: usize,
    /// Players with a recorded answer.
    pub answered_count: usize,
    /// Players in the roster.
    pub player_count: usize,
    /// Recorded answers per option.
    pub distribution: Vec<u32>,
}

/// Mutable state of a single quiz room.
#[derive(Debug)]
pub struct Session {
    pin: String,
    quiz: Arc<QuizSnapshot>,
    machine: SessionStateMachine,
    current_question_index: Option<usize>,
    question_started_at: Option<Instant>,
    current_question_view: Option<Arc<QuestionView>>,
    players: IndexMap<String, PlayerState>,
    previous_ranks: HashMap<String, usize>,
    timer: QuestionTimer,
    host_user_id: String,
    host_socket_id: String,
    scoring: ScoringConfig,
    created_at: SystemTime,
    started_at: Option<SystemTime>,
    ended_at: Option<SystemTime>,
}

impl Session {
    /// Create a session in the lobby.
    pub fn new(
        pin: String,
        quiz: Arc<QuizSnapshot>,
        host_user_id: String,
        host_socket_id: String,
        scoring: ScoringConfig,
    ) -> Self {
        Self {
            pin,
            quiz,
            machine: SessionStateMachine::new(),
            current_question_index: None,
            question_started_at: None,
            current_question_view: None,
            players: IndexMap::new(),
            previous_ranks: HashMap::new(),
            timer: QuestionTimer::default(),
            host_user_id,
            host_socket_id,
            scoring,
            created_at: SystemTime::now(),
            started_at: None,
            ended_at: None,
        }
    }

    /// Join code of the session.
    pub fn pin(&self) -> &str {
        &self.pin
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    /// Number of applied transitions.
    pub fn version(&self) -> usize {
        self.machine.snapshot().version
    }

    /// Quiz snapshot played by this session.
    pub fn quiz(&self) -> &QuizSnapshot {
        &self.quiz
    }

    /// User allowed to drive transitions.
    pub fn host_user_id(&self) -> &str {
        &self.host_user_id
    }

    /// Connection of the host.
    pub fn host_socket_id(&self) -> &str {
        &self.host_socket_id
    }

    /// Rebind the host to a new connection.
    pub fn update_host_socket(&mut self, socket_id: String) {
        self.host_socket_id = socket_id;
    }

    /// Index of the question asked last, `None` before the start.
    pub fn current_question_index(&self) -> Option<usize> {
        self.current_question_index
    }

    /// Number of players in the roster.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Players in join order.
    pub fn players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.values()
    }

    /// Look up a player.
    pub fn player(&self, user_id: &str) -> Option<&PlayerState> {
        self.players.get(user_id)
    }

    /// Creation time.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Time the first question opened.
    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    /// Time the session ended.
    pub fn ended_at(&self) -> Option<SystemTime> {
        self.ended_at
    }

    /// Whether a question timer is pending.
    pub fn has_pending_timer(&self) -> bool {
        self.timer.is_armed()
    }

    /// Add a player while in the lobby.
    pub fn add_player(
        &mut self,
        user_id: &str,
        nickname: &str,
        socket_id: &str,
    ) -> Result<PlayerState, SessionError> {
        self.require_phase("add_player", SessionPhase::Lobby)?;
        if self.players.contains_key(user_id) {
            return Err(SessionError::DuplicatePlayer(user_id.to_string()));
        }

        let player = PlayerState {
            id: user_id.to_string(),
            socket_id: socket_id.to_string(),
            nickname: nickname.to_string(),
            total_score: 0,
            current_combo: 0,
            last_answer: None,
        };
        self.players.insert(user_id.to_string(), player.clone());
        debug!(pin = %self.pin, player_id = %user_id, "player joined");
        Ok(player)
    }

    /// Remove a player; legal in any phase.
    pub fn remove_player(&mut self, user_id: &str) -> Result<PlayerState, SessionError> {
        // shift_remove keeps join order intact for leaderboard tie-breaking.
        self.players
            .shift_remove(user_id)
            .ok_or_else(|| SessionError::NotFound(user_id.to_string()))
    }

    /// Rebind a player to a new connection after a reconnect; legal in any phase.
    pub fn update_player_socket(
        &mut self,
        user_id: &str,
        socket_id: &str,
    ) -> Result<PlayerState, SessionError> {
        let player = self
            .players
            .get_mut(user_id)
            .ok_or_else(|| SessionError::NotFound(user_id.to_string()))?;
        player.socket_id = socket_id.to_string();
        Ok(player.clone())
    }

    /// Open the first question and arm its timer.
    pub fn start(&mut self, on_timeout: TimeoutHook) -> Result<Arc<QuestionView>, SessionError> {
        self.require_phase("start", SessionPhase::Lobby)?;
        if self.players.is_empty() {
            return Err(SessionError::EmptyRoom);
        }
        if self.quiz.questions.is_empty() {
            return Err(SessionError::InvalidState {
                operation: "start",
                phase: self.phase(),
            });
        }

        self.machine.apply(SessionEvent::Start)?;
        self.started_at = Some(SystemTime::now());
        info!(pin = %self.pin, players = self.players.len(), "session started");
        Ok(self.open_question(0, on_timeout))
    }

    /// Record and score an answer for the open question.
    pub fn submit_answer(
        &mut self,
        user_id: &str,
        answer_index: usize,
    ) -> Result<ScoreResult, SessionError> {
        self.require_phase("submit_answer", SessionPhase::QuestionActive)?;
        let (Some(question_index), Some(started)) =
            (self.current_question_index, self.question_started_at)
        else {
            return Err(SessionError::InvalidState {
                operation: "submit_answer",
                phase: self.phase(),
            });
        };

        let quiz = Arc::clone(&self.quiz);
        let question = &quiz.questions[question_index];
        let deadline_ms = question.time_limit_ms() + self.scoring.grace_window_ms;

        let player = self
            .players
            .get_mut(user_id)
            .ok_or_else(|| SessionError::NotFound(user_id.to_string()))?;
        if player.last_answer.is_some() {
            return Err(SessionError::AlreadyAnswered(user_id.to_string()));
        }
        if answer_index >= question.options.len() {
            return Err(SessionError::InvalidIndex {
                index: answer_index,
                options: question.options.len(),
            });
        }

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if elapsed_ms > deadline_ms {
            // Time-barred: the streak breaks but nothing is recorded.
            player.current_combo = 0;
            return Err(SessionError::TooLate {
                elapsed_ms,
                limit_ms: deadline_ms,
            });
        }

        let result = score(
            &self.scoring,
            question,
            elapsed_ms,
            answer_index,
            player.current_combo,
        );
        player.last_answer = Some(RecordedAnswer {
            answer_index,
            submitted_at: SystemTime::now(),
            elapsed_ms,
            points: result.points,
            is_correct: result.is_correct,
        });
        player.current_combo = result.new_combo;
        player.total_score = player.total_score.saturating_add(result.points);

        debug!(
            pin = %self.pin,
            player_id = %user_id,
            question_index,
            correct = result.is_correct,
            points = result.points,
            "answer recorded"
        );
        Ok(result)
    }

    /// Close the open question. Shared by the timer and the host action.
    pub fn end_current_question(&mut self) -> Result<(), SessionError> {
        self.machine.apply(SessionEvent::EndQuestion)?;
        self.timer.cancel();
        self.question_started_at = None;
        self.current_question_view = None;

        for player in self.players.values_mut() {
            if player.last_answer.is_none() {
                player.current_combo = 0;
            }
        }

        debug!(pin = %self.pin, question_index = ?self.current_question_index, "question closed");
        Ok(())
    }

    /// Close the question armed as `question_index` if it is still the open one.
    ///
    /// Returns `false` when the session already moved on, so a stale timer is a no-op.
    pub fn expire_question(&mut self, question_index: usize) -> Result<bool, SessionError> {
        if self.phase() != SessionPhase::QuestionActive
            || self.current_question_index != Some(question_index)
        {
            return Ok(false);
        }
        self.end_current_question()?;
        Ok(true)
    }

    /// Move from PROCESSING to LEADERBOARD.
    pub fn show_leaderboard(&mut self) -> Result<(), SessionError> {
        self.machine.apply(SessionEvent::ShowLeaderboard)?;
        Ok(())
    }

    /// Open the next question, or end the session when none remain.
    ///
    /// Returns `true` when another question was armed.
    pub fn next_question(&mut self, on_timeout: TimeoutHook) -> Result<bool, SessionError> {
        let next_index = self.current_question_index.map_or(0, |index| index + 1);
        let remaining = next_index < self.quiz.questions.len();
        self.machine
            .apply(SessionEvent::NextQuestion { remaining })?;

        if remaining {
            self.open_question(next_index, on_timeout);
        } else {
            self.mark_ended();
        }
        Ok(remaining)
    }

    /// Terminate the session from any phase. Idempotent.
    pub fn end(&mut self) {
        // End is accepted from every phase.
        let _ = self.machine.apply(SessionEvent::End);
        self.timer.cancel();
        self.question_started_at = None;
        self.current_question_view = None;
        self.mark_ended();
    }

    /// Final cleanup: end the session and drop every player record.
    pub fn destroy(&mut self) {
        self.end();
        self.players.clear();
        self.previous_ranks.clear();
    }

    /// Players sorted by score (descending), ties kept in join order, truncated to `limit`.
    pub fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        self.ranked()
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(position, player)| LeaderboardEntry {
                rank: position + 1,
                player_id: player.id.clone(),
                nickname: player.nickname.clone(),
                total_score: player.total_score,
                current_combo: player.current_combo,
                previous_rank: self.previous_ranks.get(&player.id).copied(),
            })
            .collect()
    }

    /// 1-based rank of a single player.
    pub fn rank_of(&self, user_id: &str) -> Option<usize> {
        self.ranked()
            .iter()
            .position(|player| player.id == user_id)
            .map(|position| position + 1)
    }

    /// Redacted view of the open question, cached when the question opened.
    pub fn current_question(&self) -> Option<Arc<QuestionView>> {
        self.current_question_view.clone()
    }

    /// Correct option of the question at the pointer; refused while it is still open.
    pub fn correct_answer(&self) -> Result<usize, SessionError> {
        if self.phase() == SessionPhase::QuestionActive {
            return Err(SessionError::AnswerHidden);
        }
        self.pointed_question()
            .map(|question| question.correct_option_index)
            .ok_or(SessionError::InvalidState {
                operation: "correct_answer",
                phase: self.phase(),
            })
    }

    /// Number of recorded answers per option for the question at the pointer.
    pub fn answer_distribution(&self) -> Vec<u32> {
        let Some(question) = self.pointed_question() else {
            return Vec::new();
        };
        let mut counts = vec![0u32; question.options.len()];
        for answer in self.players.values().filter_map(|p| p.last_answer.as_ref()) {
            if let Some(slot) = counts.get_mut(answer.answer_index) {
                *slot += 1;
            }
        }
        counts
    }

    /// Results of the question at the pointer once it is no longer open.
    pub fn question_results(&self) -> Option<QuestionResults> {
        if self.phase() == SessionPhase::QuestionActive {
            return None;
        }
        let question_index = self.current_question_index?;
        let question = self.quiz.questions.get(question_index)?;
        Some(QuestionResults {
            question_index,
            correct_option_index: question.correct_option_index,
            answered_count: self
                .players
                .values()
                .filter(|player| player.last_answer.is_some())
                .count(),
            player_count: self.players.len(),
            distribution: self.answer_distribution(),
        })
    }

    fn pointed_question(&self) -> Option<&Question> {
        self.current_question_index
            .and_then(|index| self.quiz.questions.get(index))
    }

    fn ranked(&self) -> Vec<&PlayerState> {
        let mut ranked: Vec<&PlayerState> = self.players.values().collect();
        // sort_by is stable: equal scores keep insertion order.
        ranked.sort_by(|a, b| b.total_score.cmp(&a.total_score));
        ranked
    }

    fn open_question(&mut self, index: usize, on_timeout: TimeoutHook) -> Arc<QuestionView> {
        let ranks: HashMap<String, usize> = self
            .ranked()
            .iter()
            .enumerate()
            .map(|(position, player)| (player.id.clone(), position + 1))
            .collect();
        self.previous_ranks = ranks;
        for player in self.players.values_mut() {
            player.last_answer = None;
        }

        let question = &self.quiz.questions[index];
        let view = Arc::new(QuestionView::redact(
            question,
            index,
            self.quiz.questions.len(),
        ));
        let delay = Duration::from_millis(question.time_limit_ms() + self.scoring.grace_window_ms);

        self.current_question_index = Some(index);
        self.question_started_at = Some(Instant::now());
        self.current_question_view = Some(view.clone());
        self.timer.arm(delay, self.pin.clone(), index, on_timeout);

        info!(pin = %self.pin, question_index = index, "question opened");
        view
    }

    fn mark_ended(&mut self) {
        if self.ended_at.is_none() {
            self.ended_at = Some(SystemTime::now());
            info!(pin = %self.pin, "session ended");
        }
    }

    fn require_phase(
        &self,
        operation: &'static str,
        expected: SessionPhase,
    ) -> Result<(), SessionError> {
        let phase = self.phase();
        if phase == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState { operation, phase })
        }
    }
}
