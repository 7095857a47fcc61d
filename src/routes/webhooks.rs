use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::webhook::{RegisterWebhookRequest, SubscriptionView},
    error::AppError,
    routes::identity::CallerId,
    services::subscription_service,
    state::SharedState,
};

/// Webhook subscription management.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/sessions/{pin}/webhooks",
            post(register_webhook).get(list_webhooks),
        )
        .route("/webhooks/{id}", delete(unregister_webhook))
}

/// Register an endpoint that receives signed session events.
#[utoipa::path(
    post,
    path = "/sessions/{pin}/webhooks",
    tag = "webhooks",
    params(
        ("pin" = String, Path, description = "Six character join code"),
        ("X-User-Id" = String, Header, description = "Host, or the player owning the endpoint")
    ),
    request_body = RegisterWebhookRequest,
    responses(
        (status = 201, description = "Subscription created", body = SubscriptionView),
        (status = 403, description = "Host or whiteboard endpoint requested by a non-host")
    )
)]
pub async fn register_webhook(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(pin): Path<String>,
    Valid(Json(payload)): Valid<Json<RegisterWebhookRequest>>,
) -> Result<(StatusCode, Json<SubscriptionView>), AppError> {
    let view = subscription_service::register(&state, &caller, &pin, payload).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[utoipa::path(
    get,
    path = "/sessions/{pin}/webhooks",
    tag = "webhooks",
    params(
        ("pin" = String, Path, description = "Six character join code"),
        ("X-User-Id" = String, Header, description = "Host of the session")
    ),
    responses((status = 200, description = "Subscriptions of the session", body = [SubscriptionView]))
)]
pub async fn list_webhooks(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(pin): Path<String>,
) -> Result<Json<Vec<SubscriptionView>>, AppError> {
    Ok(Json(subscription_service::list(&state, &caller, &pin).await?))
}

#[utoipa::path(
    delete,
    path = "/webhooks/{id}",
    tag = "webhooks",
    params(
        ("id" = Uuid, Path, description = "Subscription identifier"),
        ("X-User-Id" = String, Header, description = "Host or owning player")
    ),
    responses((status = 204, description = "Subscription removed"))
)]
pub async fn unregister_webhook(
    State(state): State<SharedState>,
    CallerId(caller): CallerId,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    subscription_service::unregister(&state, &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
