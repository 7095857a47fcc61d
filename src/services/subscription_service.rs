//! Webhook registration on behalf of hosts, whiteboards and players.

use tracing::debug;
use uuid::Uuid;

use crate::{
    dto::webhook::{RegisterWebhookRequest, SubscriptionView},
    error::ServiceError,
    services::game_service::ensure_host,
    state::{SharedState, state_machine::SessionPhase, webhooks::ClientType},
};

/// Register an endpoint for a live session.
///
/// Host and whiteboard endpoints can only be added by the host. Player
/// endpoints are bound to the caller, who must be in the roster. Ended
/// sessions accept no new endpoints.
pub async fn register(
    state: &SharedState,
    caller: &str,
    pin: &str,
    request: RegisterWebhookRequest,
) -> Result<SubscriptionView, ServiceError> {
    let ended = state
        .registry()
        .inspect(pin, |s| s.phase() == SessionPhase::Ended)
        .await?;
    if ended {
        return Err(ServiceError::InvalidState(format!(
            "session `{pin}` has ended"
        )));
    }

    let subscription = match request.client_type {
        ClientType::Host | ClientType::Whiteboard => {
            ensure_host(state, pin, caller).await?;
            state
                .webhooks()
                .register(pin, request.client_type, &request.target_url, &request.secret)
        }
        ClientType::Player => {
            let in_roster = state
                .registry()
                .inspect(pin, |s| s.player(caller).is_some())
                .await?;
            if !in_roster {
                return Err(ServiceError::NotFound(format!(
                    "player `{caller}` is not in session `{pin}`"
                )));
            }
            state
                .webhooks()
                .register_for_player(pin, caller, &request.target_url, &request.secret)
        }
    };
    Ok(SubscriptionView::from(&subscription))
}

/// Every subscription of a session. Host only.
pub async fn list(
    state: &SharedState,
    caller: &str,
    pin: &str,
) -> Result<Vec<SubscriptionView>, ServiceError> {
    ensure_host(state, pin, caller).await?;
    Ok(state
        .webhooks()
        .list(pin)
        .iter()
        .map(SubscriptionView::from)
        .collect())
}

/// Remove a subscription. Allowed for its owning player or the session host.
pub async fn unregister(state: &SharedState, caller: &str, id: Uuid) -> Result<(), ServiceError> {
    let subscription = state
        .webhooks()
        .get(id)
        .ok_or_else(|| ServiceError::NotFound(format!("subscription `{id}`")))?;

    let owns_it = subscription.player_id.as_deref() == Some(caller);
    if !owns_it {
        ensure_host(state, &subscription.pin, caller).await?;
    }
    state.webhooks().unregister(id)?;
    debug!(subscription_id = %id, user_id = %caller, "webhook removed on request");
    Ok(())
}
