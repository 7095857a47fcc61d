pub mod quiz;
pub mod registry;
pub mod scoring;
pub mod session;
pub mod state_machine;
pub mod timer;
pub mod webhooks;

use std::sync::Arc;

use crate::{
    config::AppConfig, dao::quiz_store::QuizStore, services::webhook_service::WebhookDispatcher,
};

use self::registry::SessionRegistry;

pub type SharedState = Arc<AppState>;

/// Central application state: live sessions, webhook fan-out and the quiz repository.
pub struct AppState {
    registry: SessionRegistry,
    webhooks: Arc<WebhookDispatcher>,
    quizzes: Arc<dyn QuizStore>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, quizzes: Arc<dyn QuizStore>) -> SharedState {
        Arc::new(Self {
            registry: SessionRegistry::new(config.scoring, config.sessions.pin_attempts),
            webhooks: Arc::new(WebhookDispatcher::new(config.webhooks)),
            quizzes,
            config,
        })
    }

    /// Live sessions.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Webhook dispatcher.
    pub fn webhooks(&self) -> &Arc<WebhookDispatcher> {
        &self.webhooks
    }

    /// Quiz repository.
    pub fn quizzes(&self) -> &Arc<dyn QuizStore> {
        &self.quizzes
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
