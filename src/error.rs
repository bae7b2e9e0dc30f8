//! Error handling

use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Failures talking to the simulation REST surface.
///
/// The `Display` text is what ends up in the store's `error` slot, so it
/// must read well on its own.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Server error {status}: {detail}")]
    Server { status: u16, detail: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Transient failures are worth another poll tick; the rest point at a
    /// contract problem.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout(_) => true,
            ApiError::Server { status, .. } => *status >= 500,
            ApiError::Parse(_) | ApiError::InvalidRequest(_) => false,
        }
    }
}

/// Invalid console configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },

    #[error("request timeout ({timeout_ms} ms) is shorter than the {loop_name} poll period ({period_ms} ms)")]
    TimeoutBelowPeriod {
        timeout_ms: u64,
        period_ms: u64,
        loop_name: &'static str,
    },

    #[error("regression thresholds must be strictly ascending (got {moderate}, {high}, {critical})")]
    Thresholds { moderate: f64, high: f64, critical: f64 },

    #[error("invalid base URL '{url}': {reason}")]
    BaseUrl { url: String, reason: String },
}
