//! Sync Store
//!
//! The single mutable aggregate of the session. Only the polling
//! scheduler and the control gate write to it; everyone else reads
//! snapshots. Derived values are recomputed on every write.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::api::{SimulationHistoryRecord, SimulationMode, SimulationStatus};
use crate::constants;
use crate::logic::risk::{RiskReading, RiskNormalizer};

/// Gate-held control actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Start,
    Stop,
    Reset,
}

impl ControlAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::Start => "start",
            ControlAction::Stop => "stop",
            ControlAction::Reset => "reset",
        }
    }

    /// Button label while in flight
    pub fn progress_label(&self) -> &'static str {
        match self {
            ControlAction::Start => "Starting...",
            ControlAction::Stop => "Stopping...",
            ControlAction::Reset => "Resetting...",
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// API connection indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Liveness {
    Error,
    Live,
    Slow,
    Idle,
}

impl Liveness {
    pub fn label(&self) -> &'static str {
        match self {
            Liveness::Error => "API error",
            Liveness::Live => "API live",
            Liveness::Slow => "API slow",
            Liveness::Idle => "API idle",
        }
    }
}

/// Point-in-time copy of the store
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot {
    pub status: Option<SimulationStatus>,
    /// Fetch order, oldest first
    pub history: Arc<Vec<SimulationHistoryRecord>>,
    /// True until the first poll attempt of either loop completes
    pub loading: bool,
    pub error: Option<String>,
    pub last_status_at: Option<DateTime<Utc>>,
    pub last_history_at: Option<DateTime<Utc>>,
    pub action_in_progress: bool,
    pub action_label: Option<ControlAction>,

    // derived
    pub risk: RiskReading,
    pub active_alerts_count: usize,
}

impl SyncSnapshot {
    fn initial() -> Self {
        Self {
            status: None,
            history: Arc::new(Vec::new()),
            loading: true,
            error: None,
            last_status_at: None,
            last_history_at: None,
            action_in_progress: false,
            action_label: None,
            risk: RiskReading::UNKNOWN,
            active_alerts_count: 0,
        }
    }

    pub fn latest_record(&self) -> Option<&SimulationHistoryRecord> {
        self.history.last()
    }

    /// Most recent successful sync of either slice.
    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_status_at.max(self.last_history_at)
    }

    /// Staleness judged from data arrival, measured at `now`.
    pub fn liveness(&self, now: DateTime<Utc>) -> Liveness {
        if self.error.is_some() {
            return Liveness::Error;
        }
        match self.last_synced_at() {
            Some(at) => {
                let age_ms = (now - at).num_milliseconds();
                if age_ms < constants::LIVENESS_LIVE_MS {
                    Liveness::Live
                } else if age_ms < constants::LIVENESS_SLOW_MS {
                    Liveness::Slow
                } else {
                    Liveness::Idle
                }
            }
            None => Liveness::Idle,
        }
    }

    /// Mode shown to the user: status first, then newest record.
    pub fn effective_mode(&self) -> SimulationMode {
        effective_mode(self.status.as_ref(), &self.history)
    }
}

fn effective_mode(status: Option<&SimulationStatus>, history: &[SimulationHistoryRecord]) -> SimulationMode {
    status
        .map(|s| s.mode)
        .or_else(|| history.last().map(|r| r.simulation_mode()))
        .unwrap_or_default()
}

/// Current risk: `last_prediction.hazard_level`, else the newest record's
/// `risk_level`, else missing.
pub fn derive_risk(
    status: Option<&SimulationStatus>,
    history: &[SimulationHistoryRecord],
    normalizer: &RiskNormalizer,
) -> RiskReading {
    let mode = effective_mode(status, history);
    let hazard = status
        .and_then(|s| s.hazard_level())
        .or_else(|| history.last().map(|r| &r.risk_level).filter(|v| !v.is_null()));

    normalizer.normalize(mode, hazard.unwrap_or(&Value::Null))
}

/// Alerts among the newest `window` records.
pub fn count_active_alerts(history: &[SimulationHistoryRecord], window: usize) -> usize {
    history[history.len().saturating_sub(window)..]
        .iter()
        .filter(|r| r.has_alert())
        .count()
}

#[derive(Debug)]
pub struct SyncStore {
    state: RwLock<SyncSnapshot>,
    normalizer: RiskNormalizer,
    alert_window: usize,
}

impl Default for SyncStore {
    fn default() -> Self {
        Self::new(RiskNormalizer::default(), constants::DEFAULT_ALERT_WINDOW)
    }
}

impl SyncStore {
    pub fn new(normalizer: RiskNormalizer, alert_window: usize) -> Self {
        Self {
            state: RwLock::new(SyncSnapshot::initial()),
            normalizer,
            alert_window,
        }
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.state.read().clone()
    }

    /// Borrow the current state without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&SyncSnapshot) -> R) -> R {
        f(&*self.state.read())
    }

    pub fn normalizer(&self) -> &RiskNormalizer {
        &self.normalizer
    }

    fn mutate(&self, f: impl FnOnce(&mut SyncSnapshot)) {
        let mut state = self.state.write();
        f(&mut state);
        state.risk = derive_risk(state.status.as_ref(), &state.history, &self.normalizer);
        state.active_alerts_count = count_active_alerts(&state.history, self.alert_window);
    }

    pub(crate) fn apply_status(&self, status: SimulationStatus, at: DateTime<Utc>) {
        self.mutate(|s| {
            s.status = Some(status);
            s.error = None;
            s.last_status_at = Some(at);
            s.loading = false;
        });
    }

    pub(crate) fn apply_history(&self, history: Vec<SimulationHistoryRecord>, at: DateTime<Utc>) {
        self.mutate(|s| {
            s.history = Arc::new(history);
            s.error = None;
            s.last_history_at = Some(at);
            s.loading = false;
        });
    }

    /// A poll attempt failed: keep last-known-good data.
    pub(crate) fn record_poll_failure(&self, message: String) {
        self.mutate(|s| {
            s.error = Some(message);
            s.loading = false;
        });
    }

    pub(crate) fn record_error(&self, message: String) {
        self.mutate(|s| s.error = Some(message));
    }

    /// `None` marks a request that holds the gate without a label.
    pub(crate) fn begin_action(&self, label: Option<ControlAction>) {
        self.mutate(|s| {
            s.action_in_progress = true;
            s.action_label = label;
        });
    }

    pub(crate) fn end_action(&self) {
        self.mutate(|s| {
            s.action_in_progress = false;
            s.action_label = None;
        });
    }
}
