use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::format_system_time,
    state::webhooks::{ClientType, Subscription, SubscriptionStatus},
};

/// Payload used to register a webhook endpoint for a session.
///
/// Player subscriptions are bound to the calling user.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RegisterWebhookRequest {
    pub client_type: ClientType,
    #[validate(url)]
    pub target_url: String,
    /// Shared HMAC key used to sign deliveries.
    #[validate(length(min = 16, max = 256))]
    pub secret: String,
}

/// Subscription as exposed over the API; the secret is never returned.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionView {
    pub id: Uuid,
    pub pin: String,
    pub client_type: ClientType,
    pub player_id: Option<String>,
    pub target_url: String,
    pub status: SubscriptionStatus,
    pub consecutive_failures: u32,
    pub created_at: String,
    pub last_seen_at: Option<String>,
}

impl From<&Subscription> for SubscriptionView {
    fn from(subscription: &Subscription) -> Self {
        Self {
            id: subscription.id,
            pin: subscription.pin.clone(),
            client_type: subscription.client_type,
            player_id: subscription.player_id.clone(),
            target_url: subscription.target_url.clone(),
            status: subscription.status,
            consecutive_failures: subscription.consecutive_failures,
            created_at: format_system_time(subscription.created_at),
            last_seen_at: subscription.last_seen_at.map(format_system_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_checks_url_and_secret() {
        let valid = RegisterWebhookRequest {
            client_type: ClientType::Host,
            target_url: "https://example.com/hook".into(),
            secret: "0123456789abcdef".into(),
        };
        assert!(valid.validate().is_ok());

        let bad_url = RegisterWebhookRequest {
            target_url: "not a url".into(),
            ..valid
        };
        assert!(bad_url.validate().is_err());
    }

    #[test]
    fn view_hides_secret() {
        let subscription = Subscription::new(
            "123456".into(),
            ClientType::Whiteboard,
            None,
            "https://example.com".into(),
            "super-secret-value".into(),
        );
        let json = serde_json::to_string(&SubscriptionView::from(&subscription)).unwrap();
        assert!(!json.contains("super-secret-value"));
        assert!(json.contains("\"whiteboard\""));
    }
}
