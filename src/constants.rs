//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! To change the default simulation server, only edit this file.

/// Default simulation API base URL
///
/// This is the fallback URL when no environment variable is set.
/// For development: http://localhost:8000
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Default request timeout (milliseconds). Covers slow dataset loads.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;

/// Timeout for `start`, which may load a large dataset server-side (milliseconds)
pub const DEFAULT_START_TIMEOUT_MS: u64 = 60_000;

/// Status loop period (milliseconds)
pub const DEFAULT_STATUS_POLL_MS: u64 = 1_000;

/// History loop period (milliseconds)
pub const DEFAULT_HISTORY_POLL_MS: u64 = 2_000;

/// `limit` sent with every history fetch
pub const DEFAULT_HISTORY_LIMIT: usize = 300;

/// Number of newest history records counted for active alerts
pub const DEFAULT_ALERT_WINDOW: usize = 200;

/// How long one alert notification stays visible (milliseconds)
pub const DEFAULT_TOAST_MS: u64 = 6_500;

/// Liveness: younger than this is "live" (milliseconds)
pub const LIVENESS_LIVE_MS: i64 = 5_000;

/// Liveness: younger than this is "slow", older is "idle" (milliseconds)
pub const LIVENESS_SLOW_MS: i64 = 15_000;

// ============================================
// Regression risk thresholds
// ============================================
// Shared with the simulation server's threshold policy. Changing one side
// without the other silently shifts every regression band.

/// Scores at or above this are Moderate
pub const REGRESSION_MODERATE_MIN: f64 = 8.0;

/// Scores at or above this are High
pub const REGRESSION_HIGH_MIN: f64 = 20.0;

/// Scores at or above this are Critical
pub const REGRESSION_CRITICAL_MIN: f64 = 35.0;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "TerraGuard";
