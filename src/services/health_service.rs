use crate::{
    dto::health::{HealthResponse, StatsResponse},
    state::SharedState,
};

/// Liveness payload with the number of live sessions.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(state.registry().active_count())
}

/// Registry and webhook counters for diagnostics.
pub async fn stats(state: &SharedState) -> StatsResponse {
    StatsResponse {
        registry: state.registry().stats().await,
        webhook_subscriptions: state.webhooks().subscription_count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::game_service::tests::{app, lobby};

    #[tokio::test]
    async fn counters_follow_live_sessions() {
        let state = app().await;
        assert_eq!(health_status(&state).await.active_sessions, 0);

        let pin = lobby(&state).await;
        let stats = stats(&state).await;
        assert_eq!(stats.registry.active_sessions, 1);
        assert_eq!(stats.registry.indexed_players, 2);
        assert_eq!(stats.registry.sessions[0].pin, pin);
        assert_eq!(stats.webhook_subscriptions, 0);
    }
}
