use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Live Quiz Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::health::stats,
        crate::routes::quizzes::list_quizzes,
        crate::routes::quizzes::create_quiz,
        crate::routes::sessions::create_session,
        crate::routes::sessions::get_session,
        crate::routes::sessions::delete_session,
        crate::routes::sessions::join_session,
        crate::routes::sessions::leave_session,
        crate::routes::sessions::update_socket,
        crate::routes::sessions::start_session,
        crate::routes::sessions::submit_answer,
        crate::routes::sessions::current_question,
        crate::routes::sessions::end_question,
        crate::routes::sessions::correct_answer,
        crate::routes::sessions::leaderboard,
        crate::routes::sessions::show_leaderboard,
        crate::routes::sessions::next_question,
        crate::routes::sessions::end_session,
        crate::routes::webhooks::register_webhook,
        crate::routes::webhooks::list_webhooks,
        crate::routes::webhooks::unregister_webhook,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::StatsResponse,
            crate::dto::quiz::CreateQuizRequest,
            crate::dto::quiz::QuestionInput,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::JoinSessionRequest,
            crate::dto::session::UpdateSocketRequest,
            crate::dto::session::SubmitAnswerRequest,
            crate::dto::session::SessionDetail,
            crate::dto::session::PlayerSummary,
            crate::dto::session::AnswerResponse,
            crate::dto::session::TransitionResponse,
            crate::dto::session::LeaderboardResponse,
            crate::dto::session::CorrectAnswerResponse,
            crate::dto::webhook::RegisterWebhookRequest,
            crate::dto::webhook::SubscriptionView,
            crate::dto::events::PlayerPresenceEvent,
            crate::dto::events::StateChangedEvent,
            crate::dto::events::QuestionStartedEvent,
            crate::dto::events::QuestionEndedEvent,
            crate::dto::events::QuestionStatsEvent,
            crate::dto::events::PlayerFeedbackEvent,
            crate::dto::events::LeaderboardEvent,
            crate::dto::events::WhiteboardLeaderboardEvent,
            crate::dto::events::GameEndedEvent,
            crate::dao::quiz_store::QuizListItem,
            crate::state::quiz::QuestionView,
            crate::state::quiz::QuestionKind,
            crate::state::session::QuestionResults,
            crate::state::session::LeaderboardEntry,
            crate::state::state_machine::SessionPhase,
            crate::state::webhooks::ClientType,
            crate::state::webhooks::SubscriptionStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check and diagnostics"),
        (name = "quizzes", description = "Quiz catalog"),
        (name = "sessions", description = "Session lookup and standings"),
        (name = "host", description = "Host-only session control"),
        (name = "players", description = "Player actions"),
        (name = "webhooks", description = "Signed event delivery subscriptions"),
    )
)]
pub struct ApiDoc;
