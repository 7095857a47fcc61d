mod memory;

pub use memory::InMemoryQuizStore;

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::quiz::QuizSnapshot;

/// Minimum number of options a playable question carries.
pub const MIN_OPTIONS: usize = 2;
/// Maximum number of options a playable question carries.
pub const MAX_OPTIONS: usize = 6;

/// Result alias for quiz repository operations.
pub type QuizStoreResult<T> = Result<T, QuizStoreError>;

/// Error raised by quiz repositories regardless of the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizStoreError {
    /// No quiz stored under this identifier.
    #[error("quiz `{0}` not found")]
    NotFound(String),
    /// The quiz exists but cannot be played.
    #[error("quiz is not playable: {0}")]
    NotPlayable(String),
    /// The catalog file could not be loaded.
    #[error("failed to load quiz catalog `{path}`: {message}")]
    Catalog {
        /// Catalog location.
        path: String,
        /// Underlying failure.
        message: String,
    },
}

/// Listing row for a stored quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct QuizListItem {
    /// Identifier of the quiz.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Owner of the quiz.
    pub host_id: String,
    /// Number of questions.
    pub question_count: usize,
}

impl From<&QuizSnapshot> for QuizListItem {
    fn from(quiz: &QuizSnapshot) -> Self {
        Self {
            id: quiz.id.clone(),
            title: quiz.title.clone(),
            host_id: quiz.host_id.clone(),
            question_count: quiz.questions.len(),
        }
    }
}

/// Abstraction over the repository that serves quiz snapshots to new sessions.
pub trait QuizStore: Send + Sync {
    /// Fetch a quiz and check that it can be played.
    fn get_playable_quiz(&self, id: String) -> BoxFuture<'static, QuizStoreResult<Arc<QuizSnapshot>>>;
    /// Insert or replace a quiz; unplayable quizzes are rejected.
    fn save_quiz(&self, quiz: QuizSnapshot) -> BoxFuture<'static, QuizStoreResult<()>>;
    /// List every stored quiz.
    fn list_quizzes(&self) -> BoxFuture<'static, QuizStoreResult<Vec<QuizListItem>>>;
}

/// Check the structural rules a quiz must satisfy before a session can run it.
pub fn ensure_playable(quiz: &QuizSnapshot) -> QuizStoreResult<()> {
    if quiz.questions.is_empty() {
        return Err(QuizStoreError::NotPlayable(format!(
            "quiz `{}` has no questions",
            quiz.id
        )));
    }

    for (position, question) in quiz.questions.iter().enumerate() {
        let reason = if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&question.options.len()) {
            Some(format!(
                "has {} options, expected {MIN_OPTIONS} to {MAX_OPTIONS}",
                question.options.len()
            ))
        } else if question.correct_option_index >= question.options.len() {
            Some(format!(
                "correct option {} is out of range",
                question.correct_option_index
            ))
        } else if question.time_limit_seconds == 0 {
            Some("has no time limit".to_string())
        } else if !(question.points_multiplier.is_finite() && question.points_multiplier > 0.0) {
            Some(format!(
                "has invalid points multiplier {}",
                question.points_multiplier
            ))
        } else {
            None
        };

        if let Some(reason) = reason {
            return Err(QuizStoreError::NotPlayable(format!(
                "question {position} (`{}`) {reason}",
                question.id
            )));
        }
    }

    Ok(())
}
