use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod health;
pub mod identity;
pub mod quizzes;
pub mod sessions;
pub mod webhooks;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(quizzes::router())
        .merge(sessions::router())
        .merge(webhooks::router());

    api_router.merge(docs::router()).with_state(state)
}
