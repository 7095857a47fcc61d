//! Signed webhook fan-out with retry, backoff and subscription health tracking.

use std::{sync::Arc, time::Instant};

use futures::future::join_all;
use reqwest::{Client, header::CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::WebhookConfig,
    services::signing::sign,
    state::webhooks::{
        ClientType, Subscription, SubscriptionError, SubscriptionStatus, SubscriptionStore,
    },
};

/// Header carrying the delivery identifier, stable across retries.
pub const HEADER_ID: &str = "X-Webhook-Id";
/// Header carrying the delivery time in unix seconds.
pub const HEADER_TIMESTAMP: &str = "X-Webhook-Timestamp";
/// Header carrying the event type.
pub const HEADER_EVENT: &str = "X-Webhook-Event";
/// Header carrying `sha256=<hex>` over the request body.
pub const HEADER_SIGNATURE: &str = "X-Webhook-Signature";

/// Event data, resolved per recipient class.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Every recipient receives the same data.
    Uniform(Value),
    /// Whiteboard recipients receive a richer variant.
    Enhanced {
        /// Data for host and player recipients.
        base: Value,
        /// Data for whiteboard recipients.
        whiteboard: Value,
    },
}

impl EventPayload {
    /// Data delivered to a recipient of class `client_type`.
    pub fn for_client(&self, client_type: ClientType) -> &Value {
        match (self, client_type) {
            (EventPayload::Uniform(data), _) => data,
            (EventPayload::Enhanced { whiteboard, .. }, ClientType::Whiteboard) => whiteboard,
            (EventPayload::Enhanced { base, .. }, _) => base,
        }
    }
}

/// Optional recipient filters for an emit.
#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    /// Only deliver to these client classes.
    pub target_client_types: Option<Vec<ClientType>>,
    /// Only deliver to this player's subscription.
    pub target_player_id: Option<String>,
}

impl EmitOptions {
    /// Restrict delivery to the given player.
    pub fn to_player(player_id: impl Into<String>) -> Self {
        Self {
            target_client_types: None,
            target_player_id: Some(player_id.into()),
        }
    }

    /// Restrict delivery to the given client classes.
    pub fn to_clients(client_types: impl Into<Vec<ClientType>>) -> Self {
        Self {
            target_client_types: Some(client_types.into()),
            target_player_id: None,
        }
    }

    fn accepts(&self, subscription: &Subscription) -> bool {
        let type_ok = self
            .target_client_types
            .as_ref()
            .is_none_or(|types| types.contains(&subscription.client_type));
        let player_ok = self
            .target_player_id
            .as_ref()
            .is_none_or(|player| subscription.player_id.as_ref() == Some(player));
        type_ok && player_ok
    }
}

/// Outcome of delivering one event to one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeliveryReport {
    /// Recipient subscription.
    pub subscription_id: Uuid,
    /// Whether a 2xx response was received.
    pub success: bool,
    /// Status of the last response, if any.
    pub status_code: Option<u16>,
    /// Failure description of the last attempt.
    pub error: Option<String>,
    /// Wall time spent on the delivery, retries included.
    pub duration_ms: u64,
    /// Attempts made.
    pub attempts: u32,
}

#[derive(Serialize)]
struct Envelope<'a> {
    event: &'a str,
    timestamp: &'a str,
    pin: &'a str,
    data: &'a Value,
}

struct AttemptFailure {
    status_code: Option<u16>,
    message: String,
}

/// Owns the subscriptions and delivers events to them.
pub struct WebhookDispatcher {
    client: Client,
    store: SubscriptionStore,
    config: WebhookConfig,
}

impl WebhookDispatcher {
    /// Build a dispatcher with its own HTTP client.
    pub fn new(config: WebhookConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Build a dispatcher around an existing HTTP client.
    pub fn with_client(client: Client, config: WebhookConfig) -> Self {
        Self {
            client,
            store: SubscriptionStore::new(),
            config,
        }
    }

    /// Delivery tuning in use.
    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// Register a host or whiteboard endpoint for a game.
    pub fn register(
        &self,
        pin: &str,
        client_type: ClientType,
        target_url: &str,
        secret: &str,
    ) -> Subscription {
        let subscription = Subscription::new(
            pin.to_string(),
            client_type,
            None,
            target_url.to_string(),
            secret.to_string(),
        );
        self.store.insert(subscription.clone());
        info!(%pin, subscription_id = %subscription.id, ?client_type, "webhook registered");
        subscription
    }

    /// Register a player endpoint, replacing that player's previous one in this game.
    pub fn register_for_player(
        &self,
        pin: &str,
        player_id: &str,
        target_url: &str,
        secret: &str,
    ) -> Subscription {
        let subscription = Subscription::new(
            pin.to_string(),
            ClientType::Player,
            Some(player_id.to_string()),
            target_url.to_string(),
            secret.to_string(),
        );
        if let Some(previous) = self.store.insert(subscription.clone()) {
            debug!(%pin, %player_id, superseded = %previous.id, "player webhook replaced");
        }
        info!(%pin, %player_id, subscription_id = %subscription.id, "player webhook registered");
        subscription
    }

    /// Remove one subscription.
    pub fn unregister(&self, id: Uuid) -> Result<Subscription, SubscriptionError> {
        let removed = self.store.remove(id)?;
        info!(pin = %removed.pin, subscription_id = %id, "webhook unregistered");
        Ok(removed)
    }

    /// Remove every subscription of a game; returns how many were removed.
    pub fn unregister_all(&self, pin: &str) -> usize {
        let removed = self.store.remove_all(pin).len();
        if removed > 0 {
            info!(%pin, removed, "webhooks unregistered");
        }
        removed
    }

    /// Subscriptions of a game, oldest first.
    pub fn list(&self, pin: &str) -> Vec<Subscription> {
        self.store.for_pin(pin)
    }

    /// Look up one subscription.
    pub fn get(&self, id: Uuid) -> Option<Subscription> {
        self.store.get(id)
    }

    /// Number of stored subscriptions across every game.
    pub fn subscription_count(&self) -> usize {
        self.store.len()
    }

    /// Stop delivering to a finished game, then drop its subscriptions after the
    /// cleanup delay so deliveries already in flight can land.
    pub fn retire_game(self: &Arc<Self>, pin: &str) {
        let disabled = self.store.disable_all(pin);
        debug!(%pin, disabled, "webhooks disabled");

        let dispatcher = Arc::clone(self);
        let pin = pin.to_string();
        let delay = self.config.cleanup_delay();
        tokio::spawn(async move {
            sleep(delay).await;
            dispatcher.unregister_all(&pin);
        });
    }

    /// Deliver `event` to every active, matching subscription of `pin` concurrently.
    ///
    /// Never fails: delivery problems are reported per subscription.
    pub async fn emit(
        &self,
        pin: &str,
        event: &str,
        payload: &EventPayload,
        options: &EmitOptions,
    ) -> Vec<DeliveryReport> {
        let recipients: Vec<Subscription> = self
            .store
            .for_pin(pin)
            .into_iter()
            .filter(|subscription| subscription.status == SubscriptionStatus::Active)
            .filter(|subscription| options.accepts(subscription))
            .collect();

        if recipients.is_empty() {
            debug!(%pin, %event, "no webhook recipients");
            return Vec::new();
        }

        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();

        let deliveries = recipients.into_iter().map(|subscription| {
            let envelope = Envelope {
                event,
                timestamp: &timestamp,
                pin,
                data: payload.for_client(subscription.client_type),
            };
            let body = serde_json::to_vec(&envelope);
            async move {
                match body {
                    Ok(body) => self.deliver(subscription, event, body).await,
                    Err(err) => failed_report(subscription.id, None, err.to_string(), 0, 0),
                }
            }
        });

        join_all(deliveries).await
    }

    async fn deliver(&self, subscription: Subscription, event: &str, body: Vec<u8>) -> DeliveryReport {
        let started = Instant::now();
        let signature = match sign(&subscription.secret, &body) {
            Ok(signature) => signature,
            Err(err) => return failed_report(subscription.id, None, err.to_string(), 0, 0),
        };
        let delivery_id = Uuid::new_v4();

        let mut attempts = 0;
        let outcome = loop {
            attempts += 1;
            let result = self
                .attempt(&subscription, event, delivery_id, &signature, &body)
                .await;
            match result {
                Ok(status) => break Ok(status),
                Err(failure) if attempts > self.config.max_retries => break Err(failure),
                Err(failure) => {
                    let delay = self.config.backoff_delay(attempts - 1);
                    debug!(
                        subscription_id = %subscription.id,
                        attempt = attempts,
                        status = ?failure.status_code,
                        error = %failure.message,
                        delay_ms = delay.as_millis() as u64,
                        "webhook delivery failed; retrying"
                    );
                    sleep(delay).await;
                }
            }
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(status) => {
                self.store.record_success(subscription.id);
                debug!(
                    pin = %subscription.pin,
                    subscription_id = %subscription.id,
                    %event,
                    status,
                    attempt = attempts,
                    "webhook delivered"
                );
                DeliveryReport {
                    subscription_id: subscription.id,
                    success: true,
                    status_code: Some(status),
                    error: None,
                    duration_ms,
                    attempts,
                }
            }
            Err(failure) => {
                warn!(
                    pin = %subscription.pin,
                    subscription_id = %subscription.id,
                    %event,
                    attempt = attempts,
                    status = ?failure.status_code,
                    error = %failure.message,
                    "webhook delivery failed; retries exhausted"
                );
                if self
                    .store
                    .record_failure(subscription.id, self.config.failure_threshold)
                {
                    warn!(
                        pin = %subscription.pin,
                        subscription_id = %subscription.id,
                        "webhook subscription marked failed"
                    );
                }
                failed_report(
                    subscription.id,
                    failure.status_code,
                    failure.message,
                    duration_ms,
                    attempts,
                )
            }
        }
    }

    async fn attempt(
        &self,
        subscription: &Subscription,
        event: &str,
        delivery_id: Uuid,
        signature: &str,
        body: &[u8],
    ) -> Result<u16, AttemptFailure> {
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        let response = self
            .client
            .post(&subscription.target_url)
            .timeout(self.config.request_timeout())
            .header(CONTENT_TYPE, "application/json")
            .header(HEADER_ID, delivery_id.to_string())
            .header(HEADER_TIMESTAMP, timestamp.to_string())
            .header(HEADER_EVENT, event)
            .header(HEADER_SIGNATURE, signature)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|err| AttemptFailure {
                status_code: None,
                message: err.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(AttemptFailure {
                status_code: Some(status.as_u16()),
                message: format!("endpoint responded with {status}"),
            })
        }
    }
}

fn failed_report(
    subscription_id: Uuid,
    status_code: Option<u16>,
    error: String,
    duration_ms: u64,
    attempts: u32,
) -> DeliveryReport {
    DeliveryReport {
        subscription_id,
        success: false,
        status_code,
        error: Some(error),
        duration_ms,
        attempts,
    }
}
