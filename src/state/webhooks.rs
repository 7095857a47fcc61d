//! Webhook subscriptions indexed by id, by PIN and by (PIN, player).

use std::{collections::HashSet, time::SystemTime};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Class of client a subscription delivers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    /// The quiz host console.
    Host,
    /// A single player's device.
    Player,
    /// Shared spectator screen; receives enhanced payloads.
    Whiteboard,
}

/// Delivery health of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Receives events.
    Active,
    /// Crossed the consecutive failure threshold; kept for inspection.
    Failed,
    /// Switched off once its game ended; awaiting cleanup.
    Disabled,
}

/// Errors raised by the subscription store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// No subscription under this identifier.
    #[error("subscription `{0}` not found")]
    NotFound(Uuid),
}

/// A registered webhook endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    /// Identifier assigned at registration.
    pub id: Uuid,
    /// Game the subscription listens to.
    pub pin: String,
    /// Client class.
    pub client_type: ClientType,
    /// Owning player, for player subscriptions.
    pub player_id: Option<String>,
    /// Endpoint receiving POSTed events.
    pub target_url: String,
    /// HMAC key shared with the receiver.
    pub secret: String,
    /// Delivery health.
    pub status: SubscriptionStatus,
    /// Failed deliveries since the last success.
    pub consecutive_failures: u32,
    /// Registration time.
    pub created_at: SystemTime,
    /// Last successful delivery.
    pub last_seen_at: Option<SystemTime>,
}

impl Subscription {
    /// Build an active subscription with a fresh identifier.
    pub fn new(
        pin: String,
        client_type: ClientType,
        player_id: Option<String>,
        target_url: String,
        secret: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pin,
            client_type,
            player_id,
            target_url,
            secret,
            status: SubscriptionStatus::Active,
            consecutive_failures: 0,
            created_at: SystemTime::now(),
            last_seen_at: None,
        }
    }
}

/// Concurrent subscription indexes.
#[derive(Default)]
pub struct SubscriptionStore {
    by_id: DashMap<Uuid, Subscription>,
    by_pin: DashMap<String, HashSet<Uuid>>,
    by_player: DashMap<(String, String), Uuid>,
}

impl SubscriptionStore {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `subscription`. A player subscription supersedes the previous one for
    /// the same (PIN, player), which is removed and returned.
    pub fn insert(&self, subscription: Subscription) -> Option<Subscription> {
        let id = subscription.id;
        let superseded = subscription.player_id.as_ref().and_then(|player_id| {
            self.by_player
                .insert((subscription.pin.clone(), player_id.clone()), id)
        });

        self.by_pin
            .entry(subscription.pin.clone())
            .or_default()
            .insert(id);
        self.by_id.insert(id, subscription);

        superseded.and_then(|old| self.detach(old))
    }

    /// Remove one subscription.
    pub fn remove(&self, id: Uuid) -> Result<Subscription, SubscriptionError> {
        let removed = self.detach(id).ok_or(SubscriptionError::NotFound(id))?;
        if let Some(player_id) = &removed.player_id {
            self.by_player
                .remove_if(&(removed.pin.clone(), player_id.clone()), |_, indexed| {
                    *indexed == id
                });
        }
        Ok(removed)
    }

    /// Remove every subscription of a game. Tolerates an unknown or empty PIN.
    pub fn remove_all(&self, pin: &str) -> Vec<Subscription> {
        let Some((_, ids)) = self.by_pin.remove(pin) else {
            return Vec::new();
        };
        self.by_player.retain(|(indexed_pin, _), _| indexed_pin != pin);
        ids.into_iter()
            .filter_map(|id| self.by_id.remove(&id).map(|(_, subscription)| subscription))
            .collect()
    }

    /// Copy of one subscription.
    pub fn get(&self, id: Uuid) -> Option<Subscription> {
        self.by_id.get(&id).map(|entry| entry.value().clone())
    }

    /// Copies of every subscription of a game, oldest first.
    pub fn for_pin(&self, pin: &str) -> Vec<Subscription> {
        let ids: Vec<Uuid> = self
            .by_pin
            .get(pin)
            .map(|entry| entry.value().iter().copied().collect())
            .unwrap_or_default();
        let mut subscriptions: Vec<Subscription> =
            ids.into_iter().filter_map(|id| self.get(id)).collect();
        subscriptions.sort_by_key(|subscription| subscription.created_at);
        subscriptions
    }

    /// Subscription id registered for a player in a game.
    pub fn player_subscription(&self, pin: &str, player_id: &str) -> Option<Uuid> {
        self.by_player
            .get(&(pin.to_string(), player_id.to_string()))
            .map(|entry| *entry.value())
    }

    /// Reset the failure streak after a delivered event.
    pub fn record_success(&self, id: Uuid) {
        if let Some(mut subscription) = self.by_id.get_mut(&id) {
            subscription.consecutive_failures = 0;
            subscription.last_seen_at = Some(SystemTime::now());
        }
    }

    /// Extend the failure streak; returns `true` when this call marked the
    /// subscription failed.
    pub fn record_failure(&self, id: Uuid, threshold: u32) -> bool {
        let Some(mut subscription) = self.by_id.get_mut(&id) else {
            return false;
        };
        subscription.consecutive_failures = subscription.consecutive_failures.saturating_add(1);
        if subscription.status == SubscriptionStatus::Active
            && subscription.consecutive_failures >= threshold
        {
            subscription.status = SubscriptionStatus::Failed;
            return true;
        }
        false
    }

    /// Disable every active subscription of a game. Returns how many changed.
    pub fn disable_all(&self, pin: &str) -> usize {
        let ids: Vec<Uuid> = self
            .by_pin
            .get(pin)
            .map(|entry| entry.value().iter().copied().collect())
            .unwrap_or_default();
        let mut disabled = 0;
        for id in ids {
            if let Some(mut subscription) = self.by_id.get_mut(&id) {
                if subscription.status == SubscriptionStatus::Active {
                    subscription.status = SubscriptionStatus::Disabled;
                    disabled += 1;
                }
            }
        }
        disabled
    }

    /// Number of stored subscriptions.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the store holds no subscription.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn detach(&self, id: Uuid) -> Option<Subscription> {
        let (_, removed) = self.by_id.remove(&id)?;
        if let Some(mut ids) = self.by_pin.get_mut(&removed.pin) {
            ids.remove(&id);
        }
        self.by_pin.remove_if(&removed.pin, |_, ids| ids.is_empty());
        Some(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(pin: &str) -> Subscription {
        Subscription::new(
            pin.into(),
            ClientType::Host,
            None,
            "http://host".into(),
            "s".into(),
        )
    }

    fn player(pin: &str, id: &str) -> Subscription {
        Subscription::new(
            pin.into(),
            ClientType::Player,
            Some(id.into()),
            format!("http://{id}"),
            "s".into(),
        )
    }

    #[test]
    fn player_registration_supersedes_previous_one() {
        let store = SubscriptionStore::new();
        let first = player("111111", "p1");
        let first_id = first.id;
        assert!(store.insert(first).is_none());

        let second = player("111111", "p1");
        let second_id = second.id;
        let superseded = store.insert(second).unwrap();

        assert_eq!(superseded.id, first_id);
        assert!(store.get(first_id).is_none());
        assert_eq!(store.player_subscription("111111", "p1"), Some(second_id));
        assert_eq!(store.for_pin("111111").len(), 1);
    }

    #[test]
    fn same_player_in_other_game_is_independent() {
        let store = SubscriptionStore::new();
        store.insert(player("111111", "p1"));
        assert!(store.insert(player("222222", "p1")).is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn remove_unknown_is_not_found() {
        let store = SubscriptionStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.remove(id), Err(SubscriptionError::NotFound(id)));
    }

    #[test]
    fn remove_clears_every_index() {
        let store = SubscriptionStore::new();
        let sub = player("111111", "p1");
        let id = sub.id;
        store.insert(sub);

        store.remove(id).unwrap();
        assert!(store.is_empty());
        assert!(store.for_pin("111111").is_empty());
        assert_eq!(store.player_subscription("111111", "p1"), None);
    }

    #[test]
    fn remove_all_only_touches_one_game() {
        let store = SubscriptionStore::new();
        store.insert(host("111111"));
        store.insert(player("111111", "p1"));
        store.insert(host("222222"));

        assert_eq!(store.remove_all("111111").len(), 2);
        assert!(store.remove_all("111111").is_empty());
        assert_eq!(store.len(), 1);
        assert_eq!(store.player_subscription("111111", "p1"), None);
    }

    #[test]
    fn failures_cross_threshold_once_and_success_resets() {
        let store = SubscriptionStore::new();
        let sub = host("111111");
        let id = sub.id;
        store.insert(sub);

        assert!(!store.record_failure(id, 2));
        store.record_success(id);
        assert_eq!(store.get(id).unwrap().consecutive_failures, 0);
        assert!(store.get(id).unwrap().last_seen_at.is_some());

        assert!(!store.record_failure(id, 2));
        assert!(store.record_failure(id, 2));
        assert!(!store.record_failure(id, 2));

        let failed = store.get(id).unwrap();
        assert_eq!(failed.status, SubscriptionStatus::Failed);
        assert_eq!(failed.consecutive_failures, 3);
    }

    #[test]
    fn disable_all_skips_failed_subscriptions() {
        let store = SubscriptionStore::new();
        let failing = host("111111");
        let failing_id = failing.id;
        store.insert(failing);
        store.insert(player("111111", "p1"));
        store.record_failure(failing_id, 1);

        assert_eq!(store.disable_all("111111"), 1);
        assert_eq!(
            store.get(failing_id).unwrap().status,
            SubscriptionStatus::Failed
        );
    }
}
