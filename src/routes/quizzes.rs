use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use axum_valid::Valid;

use crate::{
    dao::quiz_store::QuizListItem, dto::quiz::CreateQuizRequest, error::AppError,
    routes::identity::CallerId, services::quiz_service, state::SharedState,
};

/// Quiz catalog endpoints.
pub fn router() -> Router<SharedState> {
    Router::new().route("/quizzes", get(list_quizzes).post(create_quiz))
}

#[utoipa::path(
    get,
    path = "/quizzes",
    tag = "quizzes",
    responses((status = 200, description = "Stored quizzes", body = [QuizListItem]))
)]
pub async fn list_quizzes(
    State(state): State<SharedState>,
) -> Result<Json<Vec<QuizListItem>>, AppError> {
    Ok(Json(quiz_service::list_quizzes(&state).await?))
}

/// Store a quiz owned by the caller.
#[utoipa::path(
    post,
    path = "/quizzes",
    tag = "quizzes",
    params(("X-User-Id" = String, Header, description = "Owner of the quiz")),
    request_body = CreateQuizRequest,
    responses(
        (status = 201, description = "Quiz stored", body = QuizListItem),
        (status = 422, description = "Quiz cannot be played")
    )
)]
pub async fn create_quiz(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Valid(Json(payload)): Valid<Json<CreateQuizRequest>>,
) -> Result<(StatusCode, Json<QuizListItem>), AppError> {
    let item = quiz_service::create_quiz(&state, &caller, payload).await?;
    Ok((StatusCode::CREATED, Json(item)))
}
