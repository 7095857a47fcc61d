//! Quiz catalog payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::validation::validate_options,
    state::quiz::{Question, QuestionKind, QuizSnapshot},
};

/// Payload used to add a quiz to the catalog. The caller becomes its owner.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateQuizRequest {
    /// Identifier to store the quiz under; generated when omitted.
    #[serde(default)]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1), nested)]
    pub questions: Vec<QuestionInput>,
}

/// Question definition inside [`CreateQuizRequest`].
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct QuestionInput {
    #[serde(default)]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub text: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: QuestionKind,
    #[validate(range(min = 1, max = 600))]
    pub time_limit_seconds: u32,
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0, max = 10.0))]
    pub points_multiplier: Option<f64>,
    #[validate(custom(function = "validate_options"))]
    pub options: Vec<String>,
    pub correct_option_index: usize,
}

fn default_kind() -> QuestionKind {
    QuestionKind::MultipleChoice
}

impl CreateQuizRequest {
    /// Build the snapshot stored in the catalog.
    pub fn into_snapshot(self, host_id: &str) -> QuizSnapshot {
        let questions = self
            .questions
            .into_iter()
            .enumerate()
            .map(|(position, input)| Question {
                id: input.id.unwrap_or_else(|| format!("q{}", position + 1)),
                text: input.text,
                kind: input.kind,
                time_limit_seconds: input.time_limit_seconds,
                points_multiplier: input.points_multiplier.unwrap_or(1.0),
                options: input.options,
                correct_option_index: input.correct_option_index,
            })
            .collect();

        QuizSnapshot {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: self.title,
            host_id: host_id.to_string(),
            questions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CreateQuizRequest {
        serde_json::from_value(serde_json::json!({
            "title": "Capitals",
            "questions": [{
                "text": "Capital of Italy?",
                "time_limit_seconds": 15,
                "options": ["Rome", "Milan", "Turin"],
                "correct_option_index": 0
            }]
        }))
        .unwrap()
    }

    #[test]
    fn defaults_are_filled_in() {
        let request = sample();
        assert!(request.validate().is_ok());

        let quiz = request.into_snapshot("host-1");
        assert_eq!(quiz.host_id, "host-1");
        assert!(Uuid::parse_str(&quiz.id).is_ok());
        assert_eq!(quiz.questions[0].id, "q1");
        assert_eq!(quiz.questions[0].kind, QuestionKind::MultipleChoice);
        assert_eq!(quiz.questions[0].points_multiplier, 1.0);
    }

    #[test]
    fn nested_questions_are_validated() {
        let mut request = sample();
        request.questions[0].options.truncate(1);
        assert!(request.validate().is_err());

        let mut request = sample();
        request.questions[0].time_limit_seconds = 0;
        assert!(request.validate().is_err());

        let mut request = sample();
        request.questions.clear();
        assert!(request.validate().is_err());
    }
}
