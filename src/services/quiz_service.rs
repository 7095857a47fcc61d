use tracing::info;

use crate::{
    dao::quiz_store::QuizListItem, dto::quiz::CreateQuizRequest, error::ServiceError,
    state::SharedState,
};

/// Store a quiz owned by the caller.
pub async fn create_quiz(
    state: &SharedState,
    caller: &str,
    request: CreateQuizRequest,
) -> Result<QuizListItem, ServiceError> {
    let quiz = request.into_snapshot(caller);
    let item = QuizListItem::from(&quiz);
    state.quizzes().save_quiz(quiz).await?;
    info!(quiz_id = %item.id, host = %caller, questions = item.question_count, "quiz stored");
    Ok(item)
}

/// Every quiz available to new sessions.
pub async fn list_quizzes(state: &SharedState) -> Result<Vec<QuizListItem>, ServiceError> {
    Ok(state.quizzes().list_quizzes().await?)
}
