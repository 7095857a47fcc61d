//! Application-level configuration loading: scoring, session and webhook tuning.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::scoring::ScoringConfig;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LIVE_QUIZ_BACK_CONFIG_PATH";
/// Port used when neither `PORT` nor `SERVER_PORT` is set.
const DEFAULT_PORT: u16 = 8080;

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scoring formula parameters.
    pub scoring: ScoringConfig,
    /// Session registry tuning.
    pub sessions: SessionsConfig,
    /// Webhook delivery tuning.
    pub webhooks: WebhookConfig,
    /// Optional JSON catalog preloaded into the quiz repository.
    pub quiz_catalog_path: Option<PathBuf>,
}

/// Session registry tuning.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// PIN draws attempted before giving up.
    pub pin_attempts: usize,
    /// Grace period before an ended session is deleted.
    pub ended_session_ttl_ms: u64,
    /// Default number of leaderboard rows.
    pub leaderboard_limit: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            pin_attempts: 100,
            ended_session_ttl_ms: 30_000,
            leaderboard_limit: 10,
        }
    }
}

impl SessionsConfig {
    /// Delay before an ended session is removed from the registry.
    pub fn ended_session_ttl(&self) -> Duration {
        Duration::from_millis(self.ended_session_ttl_ms)
    }
}

/// Webhook delivery tuning.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Growth factor applied to the delay after each retry.
    pub backoff_multiplier: f64,
    /// Per-attempt request timeout.
    pub request_timeout_ms: u64,
    /// Consecutive failed deliveries before a subscription is marked failed.
    pub failure_threshold: u32,
    /// Delay between `game.ended` and the removal of the game's subscriptions.
    pub cleanup_delay_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
            backoff_multiplier: 2.0,
            request_timeout_ms: 5_000,
            failure_threshold: 5,
            cleanup_delay_ms: 10_000,
        }
    }
}

impl WebhookConfig {
    /// Backoff before retry number `attempt` (0-based): `base × multiplier^attempt`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let millis = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        if millis.is_finite() && millis > 0.0 {
            Duration::from_millis(millis as u64)
        } else {
            Duration::ZERO
        }
    }

    /// Timeout applied to each delivery attempt.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Delay before subscriptions of an ended game are dropped.
    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }
}

impl AppConfig {
    /// Load the configuration from the resolved path, falling back to built-in defaults.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration from `path`, falling back to built-in defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

/// Listening port taken from `PORT`, then `SERVER_PORT`, then the default.
pub fn server_port() -> u16 {
    env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn temp_file(contents: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = env::temp_dir().join(format!("live-quiz-config-{nanos}.json"));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = AppConfig::load_from(Path::new("/definitely/not/here.json"));
        assert_eq!(config.scoring, ScoringConfig::default());
        assert_eq!(config.sessions, SessionsConfig::default());
        assert_eq!(config.webhooks, WebhookConfig::default());
        assert!(config.quiz_catalog_path.is_none());
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let path = temp_file(
            r#"{
                "scoring": { "base_points": 2000 },
                "webhooks": { "max_retries": 0 },
                "quiz_catalog_path": "config/quizzes.json"
            }"#,
        );
        let config = AppConfig::load_from(&path);
        fs::remove_file(&path).unwrap();

        assert_eq!(config.scoring.base_points, 2_000);
        assert_eq!(config.scoring.combo_bonus, 0.1);
        assert_eq!(config.webhooks.max_retries, 0);
        assert_eq!(config.webhooks.failure_threshold, 5);
        assert_eq!(config.sessions.pin_attempts, 100);
        assert_eq!(
            config.quiz_catalog_path,
            Some(PathBuf::from("config/quizzes.json"))
        );
    }

    #[test]
    fn invalid_file_uses_defaults() {
        let path = temp_file("{ not json");
        let config = AppConfig::load_from(&path);
        fs::remove_file(&path).unwrap();
        assert_eq!(config.sessions, SessionsConfig::default());
    }

    #[test]
    fn backoff_grows_exponentially() {
        let config = WebhookConfig::default();
        assert_eq!(config.backoff_delay(0), Duration::from_millis(200));
        assert_eq!(config.backoff_delay(1), Duration::from_millis(400));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(800));
    }
}
