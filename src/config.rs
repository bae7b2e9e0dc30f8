//! Configuration module

use std::env;
use std::time::Duration;

use crate::constants;
use crate::error::ConfigError;
use crate::logic::risk::RegressionThresholds;

/// Console configuration
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Simulation REST base URL
    pub api_base_url: String,

    /// Default timeout for every request (ms)
    pub request_timeout_ms: u64,

    /// Timeout for `start` (ms)
    pub start_timeout_ms: u64,

    /// Status loop period (ms)
    pub status_poll_ms: u64,

    /// History loop period (ms)
    pub history_poll_ms: u64,

    /// `limit` for history fetches
    pub history_limit: usize,

    /// Newest records counted for active alerts
    pub alert_window: usize,

    /// Notification visibility (ms)
    pub toast_ms: u64,

    /// Regression band boundaries
    pub thresholds: RegressionThresholds,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_base_url: constants::DEFAULT_API_BASE_URL.to_string(),
            request_timeout_ms: constants::DEFAULT_REQUEST_TIMEOUT_MS,
            start_timeout_ms: constants::DEFAULT_START_TIMEOUT_MS,
            status_poll_ms: constants::DEFAULT_STATUS_POLL_MS,
            history_poll_ms: constants::DEFAULT_HISTORY_POLL_MS,
            history_limit: constants::DEFAULT_HISTORY_LIMIT,
            alert_window: constants::DEFAULT_ALERT_WINDOW,
            toast_ms: constants::DEFAULT_TOAST_MS,
            thresholds: RegressionThresholds::default(),
        }
    }
}

impl ConsoleConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup, falling back to the
    /// defaults for missing or unparseable values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            api_base_url: lookup("TERRAGUARD_API_BASE_URL")
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or(defaults.api_base_url),
            request_timeout_ms: parse_or(&lookup, "TERRAGUARD_REQUEST_TIMEOUT_MS", defaults.request_timeout_ms),
            start_timeout_ms: parse_or(&lookup, "TERRAGUARD_START_TIMEOUT_MS", defaults.start_timeout_ms),
            status_poll_ms: parse_or(&lookup, "TERRAGUARD_STATUS_POLL_MS", defaults.status_poll_ms),
            history_poll_ms: parse_or(&lookup, "TERRAGUARD_HISTORY_POLL_MS", defaults.history_poll_ms),
            history_limit: parse_or(&lookup, "TERRAGUARD_HISTORY_LIMIT", defaults.history_limit),
            alert_window: parse_or(&lookup, "TERRAGUARD_ALERT_WINDOW", defaults.alert_window),
            toast_ms: parse_or(&lookup, "TERRAGUARD_TOAST_MS", defaults.toast_ms),
            thresholds: defaults.thresholds,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would produce false-negative errors or
    /// a scheduler that never ticks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(ConfigError::BaseUrl {
                url: self.api_base_url.clone(),
                reason: "expected an http:// or https:// URL".to_string(),
            });
        }

        for (name, value) in [
            ("request timeout", self.request_timeout_ms),
            ("start timeout", self.start_timeout_ms),
            ("status poll period", self.status_poll_ms),
            ("history poll period", self.history_poll_ms),
            ("toast duration", self.toast_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { name });
            }
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Zero { name: "history limit" });
        }

        for (loop_name, period_ms) in [("status", self.status_poll_ms), ("history", self.history_poll_ms)] {
            if self.request_timeout_ms < period_ms {
                return Err(ConfigError::TimeoutBelowPeriod {
                    timeout_ms: self.request_timeout_ms,
                    period_ms,
                    loop_name,
                });
            }
        }

        self.thresholds.validate()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn status_period(&self) -> Duration {
        Duration::from_millis(self.status_poll_ms)
    }

    pub fn history_period(&self) -> Duration {
        Duration::from_millis(self.history_poll_ms)
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_ms)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("{} has unparseable value '{}', using default {}", key, raw, default);
                default
            }
        },
        None => default,
    }
}
