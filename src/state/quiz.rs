use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Kind of question presented to players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionKind {
    /// Two to six options, exactly one correct.
    MultipleChoice,
    /// Two options (true / false).
    TrueFalse,
}

/// A single question of a quiz snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Question {
    /// Stable identifier of the question inside its quiz.
    pub id: String,
    /// Prompt displayed to players.
    pub text: String,
    /// Presentation kind.
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    /// Nominal answering window.
    pub time_limit_seconds: u32,
    /// Factor applied on top of the speed and combo score.
    #[serde(default = "default_points_multiplier")]
    pub points_multiplier: f64,
    /// Answer options, 2 to 6 entries.
    pub options: Vec<String>,
    /// Index of the correct entry in `options`.
    pub correct_option_index: usize,
}

fn default_points_multiplier() -> f64 {
    1.0
}

impl Question {
    /// Nominal time limit expressed in milliseconds.
    pub fn time_limit_ms(&self) -> u64 {
        u64::from(self.time_limit_seconds) * 1_000
    }
}

/// Immutable copy of a quiz that a session plays through.
///
/// Sessions hold it behind an `Arc` and never mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuizSnapshot {
    /// Identifier of the quiz in the repository.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Owner of the quiz.
    pub host_id: String,
    /// Ordered questions.
    pub questions: Vec<Question>,
}

/// Player-facing view of the active question, without the correct index.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct QuestionView {
    /// Position of the question in the quiz (0-based).
    pub index: usize,
    /// Number of questions in the quiz.
    pub total: usize,
    /// Identifier of the question.
    pub id: String,
    /// Prompt text.
    pub text: String,
    /// Presentation kind.
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    /// Nominal answering window.
    pub time_limit_seconds: u32,
    /// Factor applied to the awarded points.
    pub points_multiplier: f64,
    /// Answer options.
    pub options: Vec<String>,
}

impl QuestionView {
    /// Build the redacted view for the question at `index`.
    pub fn redact(question: &Question, index: usize, total: usize) -> Self {
        Self {
            index,
            total,
            id: question.id.clone(),
            text: question.text.clone(),
            kind: question.kind,
            time_limit_seconds: question.time_limit_seconds,
            points_multiplier: question.points_multiplier,
            options: question.options.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_snapshot_parses_with_default_multiplier() {
        let raw = r#"{
            "id": "q1",
            "title": "Capitals",
            "host_id": "host-1",
            "questions": [{
                "id": "a",
                "text": "Capital of France?",
                "type": "MULTIPLE_CHOICE",
                "time_limit_seconds": 10,
                "options": ["Paris", "Lyon"],
                "correct_option_index": 0
            }]
        }"#;

        let quiz: QuizSnapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].points_multiplier, 1.0);
        assert_eq!(quiz.questions[0].kind, QuestionKind::MultipleChoice);
        assert_eq!(quiz.questions[0].time_limit_ms(), 10_000);
    }

    #[test]
    fn redacted_view_has_no_correct_index() {
        let question = Question {
            id: "a".into(),
            text: "2 + 2?".into(),
            kind: QuestionKind::TrueFalse,
            time_limit_seconds: 5,
            points_multiplier: 2.0,
            options: vec!["4".into(), "5".into()],
            correct_option_index: 0,
        };

        let view = QuestionView::redact(&question, 1, 3);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("correct_option_index").is_none());
        assert_eq!(json["index"], 1);
        assert_eq!(json["total"], 3);
        assert_eq!(json["type"], "TRUE_FALSE");
    }
}
