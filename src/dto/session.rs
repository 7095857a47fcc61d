//! Request and response bodies of the session endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dto::{format_system_time, validation::validate_nickname},
    state::{
        quiz::QuestionView,
        registry::SessionSummary,
        scoring::ScoreResult,
        session::{LeaderboardEntry, PlayerState, Session},
        state_machine::SessionPhase,
    },
};

/// Payload used to open a new session for a stored quiz.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, max = 128))]
    pub quiz_id: String,
    /// Realtime connection of the host console.
    #[validate(length(min = 1, max = 128))]
    pub host_socket_id: String,
}

/// Payload used by a player to join the lobby.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinSessionRequest {
    #[validate(custom(function = "validate_nickname"))]
    pub nickname: String,
    #[validate(length(min = 1, max = 128))]
    pub socket_id: String,
}

/// Payload used to rebind a player or the host to a new connection.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateSocketRequest {
    #[validate(length(min = 1, max = 128))]
    pub socket_id: String,
}

/// Answer submitted for the open question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitAnswerRequest {
    pub answer_index: usize,
}

/// Query string of the leaderboard endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// Number of rows, defaults to the configured limit.
    pub limit: Option<usize>,
}

/// Public projection of a player (connection ids are not exposed).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSummary {
    pub id: String,
    pub nickname: String,
    pub total_score: u32,
    pub current_combo: u32,
    pub has_answered: bool,
}

impl From<&PlayerState> for PlayerSummary {
    fn from(player: &PlayerState) -> Self {
        Self {
            id: player.id.clone(),
            nickname: player.nickname.clone(),
            total_score: player.total_score,
            current_combo: player.current_combo,
            has_answered: player.last_answer.is_some(),
        }
    }
}

/// Detailed view of a session.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub summary: SessionSummary,
    pub host_user_id: String,
    pub created_at: String,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub players: Vec<PlayerSummary>,
}

impl From<&Session> for SessionDetail {
    fn from(session: &Session) -> Self {
        Self {
            summary: SessionSummary::from(session),
            host_user_id: session.host_user_id().to_string(),
            created_at: format_system_time(session.created_at()),
            started_at: session.started_at().map(format_system_time),
            ended_at: session.ended_at().map(format_system_time),
            players: session.players().map(PlayerSummary::from).collect(),
        }
    }
}

/// Result of an accepted answer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnswerResponse {
    #[serde(flatten)]
    pub result: ScoreResult,
    pub total_score: u32,
}

/// Phase reached by a host action, with the question opened by it, if any.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransitionResponse {
    pub state: SessionPhase,
    pub question: Option<QuestionView>,
}

/// Ranked players.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
}

/// Correct option of the question at the pointer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CorrectAnswerResponse {
    pub question_index: usize,
    pub correct_option_index: usize,
}
