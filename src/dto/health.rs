use serde::Serialize;
use utoipa::ToSchema;

use crate::state::registry::RegistryStats;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status.
    pub status: String,
    /// Number of live sessions.
    pub active_sessions: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(active_sessions: usize) -> Self {
        Self {
            status: "ok".to_string(),
            active_sessions,
        }
    }
}

/// Diagnostic counters returned by `/stats`.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub registry: RegistryStats,
    pub webhook_subscriptions: usize,
}
