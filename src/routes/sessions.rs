use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::session::{
        AnswerResponse, CorrectAnswerResponse, CreateSessionRequest, JoinSessionRequest,
        LeaderboardQuery, LeaderboardResponse, PlayerSummary, SessionDetail, SubmitAnswerRequest,
        TransitionResponse, UpdateSocketRequest,
    },
    error::AppError,
    routes::identity::CallerId,
    services::game_service,
    state::{SharedState, quiz::QuestionView, session::QuestionResults},
};

/// Session lifecycle and gameplay endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{pin}", get(get_session).delete(delete_session))
        .route(
            "/sessions/{pin}/players",
            post(join_session).delete(leave_session),
        )
        .route("/sessions/{pin}/players/socket", put(update_socket))
        .route("/sessions/{pin}/start", post(start_session))
        .route("/sessions/{pin}/answers", post(submit_answer))
        .route("/sessions/{pin}/question", get(current_question))
        .route("/sessions/{pin}/question/end", post(end_question))
        .route("/sessions/{pin}/answer", get(correct_answer))
        .route(
            "/sessions/{pin}/leaderboard",
            get(leaderboard).post(show_leaderboard),
        )
        .route("/sessions/{pin}/next", post(next_question))
        .route("/sessions/{pin}/end", post(end_session))
}

/// Open a lobby for a stored quiz. The caller becomes the host.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    params(("X-User-Id" = String, Header, description = "Calling user")),
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionDetail),
        (status = 404, description = "Unknown quiz"),
        (status = 422, description = "Quiz cannot be played")
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Valid(Json(payload)): Valid<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<SessionDetail>), AppError> {
    let detail = game_service::create_session(&state, &caller, payload).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Fetch a session with its roster.
#[utoipa::path(
    get,
    path = "/sessions/{pin}",
    tag = "sessions",
    params(("pin" = String, Path, description = "Six character join code")),
    responses(
        (status = 200, description = "Session found", body = SessionDetail),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
) -> Result<Json<SessionDetail>, AppError> {
    Ok(Json(game_service::session_detail(&state, &pin).await?))
}

/// Tear a session down immediately.
#[utoipa::path(
    delete,
    path = "/sessions/{pin}",
    tag = "sessions",
    params(
        ("pin" = String, Path, description = "Six character join code"),
        ("X-User-Id" = String, Header, description = "Host of the session")
    ),
    responses((status = 204, description = "Session deleted"))
)]
pub async fn delete_session(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(pin): Path<String>,
) -> Result<StatusCode, AppError> {
    game_service::delete_session(&state, &caller, &pin).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Join the lobby as the calling user.
#[utoipa::path(
    post,
    path = "/sessions/{pin}/players",
    tag = "players",
    params(
        ("pin" = String, Path, description = "Six character join code"),
        ("X-User-Id" = String, Header, description = "Joining user")
    ),
    request_body = JoinSessionRequest,
    responses(
        (status = 201, description = "Player joined", body = PlayerSummary),
        (status = 409, description = "Already joined or game in progress")
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(pin): Path<String>,
    Valid(Json(payload)): Valid<Json<JoinSessionRequest>>,
) -> Result<(StatusCode, Json<PlayerSummary>), AppError> {
    let player = game_service::join(&state, &caller, &pin, payload).await?;
    Ok((StatusCode::CREATED, Json(player)))
}

/// Leave the session.
#[utoipa::path(
    delete,
    path = "/sessions/{pin}/players",
    tag = "players",
    params(
        ("pin" = String, Path, description = "Six character join code"),
        ("X-User-Id" = String, Header, description = "Leaving player")
    ),
    responses((status = 204, description = "Player removed"))
)]
pub async fn leave_session(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(pin): Path<String>,
) -> Result<StatusCode, AppError> {
    game_service::leave(&state, &caller, &pin).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rebind the caller to a new realtime connection.
#[utoipa::path(
    put,
    path = "/sessions/{pin}/players/socket",
    tag = "players",
    params(
        ("pin" = String, Path, description = "Six character join code"),
        ("X-User-Id" = String, Header, description = "Host or player")
    ),
    request_body = UpdateSocketRequest,
    responses((status = 204, description = "Connection updated"))
)]
pub async fn update_socket(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(pin): Path<String>,
    Valid(Json(payload)): Valid<Json<UpdateSocketRequest>>,
) -> Result<StatusCode, AppError> {
    game_service::reconnect(&state, &caller, &pin, &payload.socket_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/sessions/{pin}/start",
    tag = "host",
    params(
        ("pin" = String, Path, description = "Six character join code"),
        ("X-User-Id" = String, Header, description = "Host of the session")
    ),
    responses(
        (status = 200, description = "First question opened", body = TransitionResponse),
        (status = 409, description = "Not in lobby or no players")
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(pin): Path<String>,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(game_service::start(&state, &caller, &pin).await?))
}

/// Answer the open question.
#[utoipa::path(
    post,
    path = "/sessions/{pin}/answers",
    tag = "players",
    params(
        ("pin" = String, Path, description = "Six character join code"),
        ("X-User-Id" = String, Header, description = "Answering player")
    ),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer scored", body = AnswerResponse),
        (status = 400, description = "Option out of range"),
        (status = 409, description = "Already answered, too late or no open question")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(pin): Path<String>,
    Valid(Json(payload)): Valid<Json<SubmitAnswerRequest>>,
) -> Result<Json<AnswerResponse>, AppError> {
    let answer = game_service::submit_answer(&state, &caller, &pin, payload.answer_index).await?;
    Ok(Json(answer))
}

/// The open question, without its correct option.
#[utoipa::path(
    get,
    path = "/sessions/{pin}/question",
    tag = "sessions",
    params(("pin" = String, Path, description = "Six character join code")),
    responses(
        (status = 200, description = "Open question", body = QuestionView),
        (status = 409, description = "No question is open")
    )
)]
pub async fn current_question(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
) -> Result<Json<QuestionView>, AppError> {
    Ok(Json(game_service::current_question(&state, &pin).await?))
}

#[utoipa::path(
    post,
    path = "/sessions/{pin}/question/end",
    tag = "host",
    params(
        ("pin" = String, Path, description = "Six character join code"),
        ("X-User-Id" = String, Header, description = "Host of the session")
    ),
    responses((status = 200, description = "Question closed", body = QuestionResults))
)]
pub async fn end_question(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(pin): Path<String>,
) -> Result<Json<QuestionResults>, AppError> {
    Ok(Json(game_service::end_question(&state, &caller, &pin).await?))
}

/// Correct option of the last closed question.
#[utoipa::path(
    get,
    path = "/sessions/{pin}/answer",
    tag = "host",
    params(
        ("pin" = String, Path, description = "Six character join code"),
        ("X-User-Id" = String, Header, description = "Host of the session")
    ),
    responses(
        (status = 200, description = "Correct option", body = CorrectAnswerResponse),
        (status = 409, description = "Question still open")
    )
)]
pub async fn correct_answer(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(pin): Path<String>,
) -> Result<Json<CorrectAnswerResponse>, AppError> {
    Ok(Json(game_service::correct_answer(&state, &caller, &pin).await?))
}

#[utoipa::path(
    get,
    path = "/sessions/{pin}/leaderboard",
    tag = "sessions",
    params(
        ("pin" = String, Path, description = "Six character join code"),
        LeaderboardQuery
    ),
    responses((status = 200, description = "Ranked players", body = LeaderboardResponse))
)]
pub async fn leaderboard(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    Ok(Json(game_service::leaderboard(&state, &pin, query.limit).await?))
}

#[utoipa::path(
    post,
    path = "/sessions/{pin}/leaderboard",
    tag = "host",
    params(
        ("pin" = String, Path, description = "Six character join code"),
        ("X-User-Id" = String, Header, description = "Host of the session")
    ),
    responses((status = 200, description = "Leaderboard shown", body = LeaderboardResponse))
)]
pub async fn show_leaderboard(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(pin): Path<String>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    Ok(Json(game_service::show_leaderboard(&state, &caller, &pin).await?))
}

/// Open the next question, or end the game after the last one.
#[utoipa::path(
    post,
    path = "/sessions/{pin}/next",
    tag = "host",
    params(
        ("pin" = String, Path, description = "Six character join code"),
        ("X-User-Id" = String, Header, description = "Host of the session")
    ),
    responses((status = 200, description = "Next question or end of game", body = TransitionResponse))
)]
pub async fn next_question(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(pin): Path<String>,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(game_service::next_question(&state, &caller, &pin).await?))
}

#[utoipa::path(
    post,
    path = "/sessions/{pin}/end",
    tag = "host",
    params(
        ("pin" = String, Path, description = "Six character join code"),
        ("X-User-Id" = String, Header, description = "Host of the session")
    ),
    responses((status = 200, description = "Session ended", body = TransitionResponse))
)]
pub async fn end_session(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(pin): Path<String>,
) -> Result<Json<TransitionResponse>, AppError> {
    Ok(Json(game_service::end_session(&state, &caller, &pin).await?))
}
