//! Speed and combo based scoring for a single answer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::quiz::Question;

/// Deployment-wide scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Points for a correct answer given instantly, before combo and multiplier.
    pub base_points: u32,
    /// Extra multiplier per consecutive correct answer already on the streak.
    pub combo_bonus: f64,
    /// Upper bound of the combo multiplier.
    pub max_combo_multiplier: f64,
    /// Time accepted after the nominal limit to absorb network jitter.
    pub grace_window_ms: u64,
    /// Reserved: carried from configuration, not applied by [`score`].
    pub minimum_points_ratio: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_points: 1_000,
            combo_bonus: 0.1,
            max_combo_multiplier: 1.5,
            grace_window_ms: 500,
            minimum_points_ratio: 0.5,
        }
    }
}

/// Outcome of scoring one submitted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScoreResult {
    /// Points awarded (0 for a wrong answer).
    pub points: u32,
    /// Whether the submitted index matches the correct option.
    pub is_correct: bool,
    /// Streak after this answer.
    pub new_combo: u32,
    /// Time elapsed between the question start and the submission.
    pub elapsed_ms: u64,
}

/// Score a submission. Pure: identical inputs always yield identical results.
///
/// Elapsed time is clamped to the nominal time limit so that answers landing
/// inside the grace window score like answers given right at the deadline.
pub fn score(
    config: &ScoringConfig,
    question: &Question,
    elapsed_ms: u64,
    submitted_index: usize,
    prior_combo: u32,
) -> ScoreResult {
    let is_correct = submitted_index == question.correct_option_index;
    if !is_correct {
        return ScoreResult {
            points: 0,
            is_correct,
            new_combo: 0,
            elapsed_ms,
        };
    }

    let limit_ms = question.time_limit_ms().max(1);
    let counted_ms = elapsed_ms.min(limit_ms);
    let elapsed_seconds = counted_ms as f64 / 1_000.0;
    let limit_seconds = limit_ms as f64 / 1_000.0;

    let time_ratio = 1.0 - (elapsed_seconds / limit_seconds / 2.0);
    let raw_score = (f64::from(config.base_points) * time_ratio).round();
    let combo_multiplier =
        (1.0 + f64::from(prior_combo) * config.combo_bonus).min(config.max_combo_multiplier);
    let final_score = (raw_score * combo_multiplier * question.points_multiplier).floor();

    ScoreResult {
        points: final_score.max(0.0) as u32,
        is_correct,
        new_combo: prior_combo.saturating_add(1),
        elapsed_ms,
    }
}
