/// OpenAPI documentation generation.
pub mod documentation;
/// Session lifecycle orchestration and event fan-out.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Quiz catalog operations.
pub mod quiz_service;
/// HMAC signing of webhook bodies.
pub mod signing;
/// Webhook registration rules per caller role.
pub mod subscription_service;
/// Webhook event names and payload builders.
pub mod webhook_events;
/// Signed HTTP delivery with retries and health tracking.
pub mod webhook_service;
