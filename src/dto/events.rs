//! Payloads carried in the `data` field of webhook envelopes.

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{
    quiz::QuestionView,
    session::{LeaderboardEntry, PlayerState, QuestionResults},
    state_machine::SessionPhase,
};

/// Sent as `game.joined` and `player.left`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerPresenceEvent {
    pub player_id: String,
    pub nickname: String,
    pub player_count: usize,
}

impl PlayerPresenceEvent {
    pub fn new(player: &PlayerState, player_count: usize) -> Self {
        Self {
            player_id: player.id.clone(),
            nickname: player.nickname.clone(),
            player_count,
        }
    }
}

/// Sent as `game.state_changed` after every lifecycle transition.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StateChangedEvent {
    pub state: SessionPhase,
    pub current_question_index: Option<usize>,
    pub total_questions: usize,
}

/// Sent as `quiz.question_start`; never contains the correct option.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionStartedEvent {
    pub question: QuestionView,
}

/// Sent as `quiz.question_end` to hosts and players.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionEndedEvent {
    pub question_index: usize,
    pub correct_option_index: usize,
    pub answered_count: usize,
    pub player_count: usize,
}

impl From<&QuestionResults> for QuestionEndedEvent {
    fn from(results: &QuestionResults) -> Self {
        Self {
            question_index: results.question_index,
            correct_option_index: results.correct_option_index,
            answered_count: results.answered_count,
            player_count: results.player_count,
        }
    }
}

/// Whiteboard variant of `quiz.question_end` with per-option answer counts.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionStatsEvent {
    #[serde(flatten)]
    pub summary: QuestionEndedEvent,
    pub distribution: Vec<u32>,
}

/// Sent as `player.feedback`, only to the answering player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerFeedbackEvent {
    pub player_id: String,
    pub is_correct: bool,
    pub points: u32,
    pub total_score: u32,
    pub combo: u32,
    pub rank: Option<usize>,
}

/// Leaderboard row sent to hosts and players.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub player_id: String,
    pub nickname: String,
    pub total_score: u32,
    pub current_combo: u32,
}

impl From<&LeaderboardEntry> for LeaderboardRow {
    fn from(entry: &LeaderboardEntry) -> Self {
        Self {
            rank: entry.rank,
            player_id: entry.player_id.clone(),
            nickname: entry.nickname.clone(),
            total_score: entry.total_score,
            current_combo: entry.current_combo,
        }
    }
}

/// Whiteboard leaderboard row with rank movement since the last question opened.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RankedRow {
    #[serde(flatten)]
    pub row: LeaderboardRow,
    pub previous_rank: Option<usize>,
    /// Positive when the player climbed.
    pub rank_change: Option<i64>,
}

impl From<&LeaderboardEntry> for RankedRow {
    fn from(entry: &LeaderboardEntry) -> Self {
        Self {
            row: LeaderboardRow::from(entry),
            previous_rank: entry.previous_rank,
            rank_change: entry
                .previous_rank
                .map(|previous| previous as i64 - entry.rank as i64),
        }
    }
}

/// Sent as `game.leaderboard` to hosts and players.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardEvent {
    pub entries: Vec<LeaderboardRow>,
}

/// Whiteboard variant of `game.leaderboard`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WhiteboardLeaderboardEvent {
    pub entries: Vec<RankedRow>,
}

/// Sent as `game.ended` with the final standings.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameEndedEvent {
    pub total_questions: usize,
    pub leaderboard: Vec<LeaderboardRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rank: usize, previous_rank: Option<usize>) -> LeaderboardEntry {
        LeaderboardEntry {
            rank,
            player_id: "p1".into(),
            nickname: "Alice".into(),
            total_score: 1_500,
            current_combo: 2,
            previous_rank,
        }
    }

    #[test]
    fn rank_change_is_positive_when_climbing() {
        assert_eq!(RankedRow::from(&entry(1, Some(3))).rank_change, Some(2));
        assert_eq!(RankedRow::from(&entry(4, Some(2))).rank_change, Some(-2));
        assert_eq!(RankedRow::from(&entry(1, None)).rank_change, None);
    }

    #[test]
    fn whiteboard_stats_flatten_the_summary() {
        let stats = QuestionStatsEvent {
            summary: QuestionEndedEvent {
                question_index: 1,
                correct_option_index: 2,
                answered_count: 3,
                player_count: 4,
            },
            distribution: vec![0, 1, 2],
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["correct_option_index"], 2);
        assert_eq!(json["distribution"], serde_json::json!([0, 1, 2]));
    }
}
