//! Typed game events and the webhook fan-out behind each of them.
//!
//! Every wrapper builds its payload, emits it under one of the `EVENT_*`
//! names below and returns the per-subscription delivery reports.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::{
    dto::events::{
        GameEndedEvent, LeaderboardEvent, LeaderboardRow, PlayerFeedbackEvent,
        PlayerPresenceEvent, QuestionEndedEvent, QuestionStartedEvent, QuestionStatsEvent,
        RankedRow, StateChangedEvent, WhiteboardLeaderboardEvent,
    },
    services::webhook_service::{DeliveryReport, EmitOptions, EventPayload, WebhookDispatcher},
    state::{
        quiz::QuestionView,
        session::{LeaderboardEntry, QuestionResults},
    },
};

/// A player entered the lobby. Sent to every subscription of the game.
pub const EVENT_PLAYER_JOINED: &str = "game.joined";
/// A player left the session.
pub const EVENT_PLAYER_LEFT: &str = "player.left";
/// The session moved to another phase.
pub const EVENT_STATE_CHANGED: &str = "game.state_changed";
/// A question opened, without its correct option.
pub const EVENT_QUESTION_STARTED: &str = "quiz.question_start";
/// A question closed. Whiteboards also receive the answer distribution.
pub const EVENT_QUESTION_ENDED: &str = "quiz.question_end";
/// Scoring of one answer, sent only to the answering player.
pub const EVENT_PLAYER_FEEDBACK: &str = "player.feedback";
/// Current standings. Whiteboards also receive rank movement.
pub const EVENT_LEADERBOARD: &str = "game.leaderboard";
/// Final standings. Last event a game emits before its subscriptions retire.
pub const EVENT_GAME_ENDED: &str = "game.ended";

/// Notify that a player entered the lobby.
pub async fn player_joined(
    webhooks: &WebhookDispatcher,
    pin: &str,
    payload: PlayerPresenceEvent,
) -> Vec<DeliveryReport> {
    let payload = uniform(EVENT_PLAYER_JOINED, &payload);
    send(webhooks, pin, EVENT_PLAYER_JOINED, payload, EmitOptions::default()).await
}

/// Notify that a player left the session.
pub async fn player_left(
    webhooks: &WebhookDispatcher,
    pin: &str,
    payload: PlayerPresenceEvent,
) -> Vec<DeliveryReport> {
    let payload = uniform(EVENT_PLAYER_LEFT, &payload);
    send(webhooks, pin, EVENT_PLAYER_LEFT, payload, EmitOptions::default()).await
}

/// Notify a lifecycle transition.
pub async fn state_changed(
    webhooks: &WebhookDispatcher,
    pin: &str,
    payload: StateChangedEvent,
) -> Vec<DeliveryReport> {
    let payload = uniform(EVENT_STATE_CHANGED, &payload);
    send(webhooks, pin, EVENT_STATE_CHANGED, payload, EmitOptions::default()).await
}

/// Publish the redacted question that just opened.
pub async fn question_started(
    webhooks: &WebhookDispatcher,
    pin: &str,
    question: QuestionView,
) -> Vec<DeliveryReport> {
    let payload = uniform(EVENT_QUESTION_STARTED, &QuestionStartedEvent { question });
    send(webhooks, pin, EVENT_QUESTION_STARTED, payload, EmitOptions::default()).await
}

/// Reveal the correct option; whiteboards also get the answer distribution.
pub async fn question_ended(
    webhooks: &WebhookDispatcher,
    pin: &str,
    results: &QuestionResults,
) -> Vec<DeliveryReport> {
    let summary = QuestionEndedEvent::from(results);
    let stats = QuestionStatsEvent {
        summary: summary.clone(),
        distribution: results.distribution.clone(),
    };
    let payload = enhanced(EVENT_QUESTION_ENDED, &summary, &stats);
    send(webhooks, pin, EVENT_QUESTION_ENDED, payload, EmitOptions::default()).await
}

/// Tell one player how their answer scored.
pub async fn player_feedback(
    webhooks: &WebhookDispatcher,
    pin: &str,
    payload: PlayerFeedbackEvent,
) -> Vec<DeliveryReport> {
    let options = EmitOptions::to_player(payload.player_id.clone());
    let payload = uniform(EVENT_PLAYER_FEEDBACK, &payload);
    send(webhooks, pin, EVENT_PLAYER_FEEDBACK, payload, options).await
}

/// Publish the standings; whiteboards also get rank movement.
pub async fn leaderboard(
    webhooks: &WebhookDispatcher,
    pin: &str,
    entries: &[LeaderboardEntry],
) -> Vec<DeliveryReport> {
    let base = LeaderboardEvent {
        entries: entries.iter().map(LeaderboardRow::from).collect(),
    };
    let whiteboard = WhiteboardLeaderboardEvent {
        entries: entries.iter().map(RankedRow::from).collect(),
    };
    let payload = enhanced(EVENT_LEADERBOARD, &base, &whiteboard);
    send(webhooks, pin, EVENT_LEADERBOARD, payload, EmitOptions::default()).await
}

/// Publish the final standings, then retire the game's subscriptions.
pub async fn game_ended(
    webhooks: &Arc<WebhookDispatcher>,
    pin: &str,
    total_questions: usize,
    entries: &[LeaderboardEntry],
) -> Vec<DeliveryReport> {
    let payload = GameEndedEvent {
        total_questions,
        leaderboard: entries.iter().map(LeaderboardRow::from).collect(),
    };
    let payload = uniform(EVENT_GAME_ENDED, &payload);
    let reports = send(webhooks, pin, EVENT_GAME_ENDED, payload, EmitOptions::default()).await;
    webhooks.retire_game(pin);
    reports
}

async fn send(
    webhooks: &WebhookDispatcher,
    pin: &str,
    event: &str,
    payload: Option<EventPayload>,
    options: EmitOptions,
) -> Vec<DeliveryReport> {
    match payload {
        Some(payload) => webhooks.emit(pin, event, &payload, &options).await,
        None => Vec::new(),
    }
}

fn uniform<T: Serialize>(event: &str, payload: &T) -> Option<EventPayload> {
    to_value(event, payload).map(EventPayload::Uniform)
}

fn enhanced<B: Serialize, W: Serialize>(
    event: &str,
    base: &B,
    whiteboard: &W,
) -> Option<EventPayload> {
    Some(EventPayload::Enhanced {
        base: to_value(event, base)?,
        whiteboard: to_value(event, whiteboard)?,
    })
}

fn to_value<T: Serialize>(event: &str, payload: &T) -> Option<Value> {
    match serde_json::to_value(payload) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(%event, error = %err, "failed to serialize webhook payload");
            None
        }
    }
}
