//! Alert Notifications
//!
//! The deduplicator decides *whether* to notify. Everything here is about
//! delivering that decision to a presentation layer.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::api::{SimulationHistoryRecord, SimulationMode};
use crate::logic::risk::{RiskBand, RiskNormalizer};

/// An alert observed in fresh history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertNotice {
    pub notice_id: Uuid,
    pub record_id: i64,
    pub mode: SimulationMode,
    pub band: RiskBand,
    pub message: String,
    pub record_timestamp: String,
    pub raised_at: DateTime<Utc>,
}

impl AlertNotice {
    pub fn from_record(record: &SimulationHistoryRecord, normalizer: &RiskNormalizer, raised_at: DateTime<Utc>) -> Self {
        let mode = record.simulation_mode();
        Self {
            notice_id: Uuid::new_v4(),
            record_id: record.id,
            mode,
            band: normalizer.normalize(mode, &record.risk_level).band,
            message: record.alert_message.clone(),
            record_timestamp: record.timestamp.clone(),
            raised_at,
        }
    }
}

/// Receives "alert observed" events.
///
/// Each notice supersedes the previous one; a sink that renders notices
/// should dismiss whatever it showed before.
pub trait AlertSink: Send + Sync + 'static {
    fn alert_observed(&self, notice: AlertNotice);
}

impl<F> AlertSink for F
where
    F: Fn(AlertNotice) + Send + Sync + 'static,
{
    fn alert_observed(&self, notice: AlertNotice) {
        self(notice)
    }
}

/// Drops every notice. For sessions that only need the store.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AlertSink for NullSink {
    fn alert_observed(&self, _notice: AlertNotice) {}
}

/// Fans notices out over a broadcast channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: broadcast::Sender<AlertNotice>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<AlertNotice>) {
        let (sender, receiver) = broadcast::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertNotice> {
        self.sender.subscribe()
    }
}

impl AlertSink for ChannelSink {
    fn alert_observed(&self, notice: AlertNotice) {
        // No receivers is fine: nobody is watching
        if self.sender.send(notice).is_err() {
            tracing::trace!("Alert notice dropped, no subscribers");
        }
    }
}

/// Holds at most one visible notice.
///
/// Raising a new notice dismisses the current one; a notice expires on
/// its own after `duration`.
#[derive(Debug)]
pub struct ToastSlot {
    duration: Duration,
    current: Mutex<Option<AlertNotice>>,
}

impl ToastSlot {
    pub fn new(duration: std::time::Duration) -> Self {
        Self {
            duration: Duration::from_std(duration).unwrap_or_else(|_| Duration::milliseconds(6_500)),
            current: Mutex::new(None),
        }
    }

    /// Show `notice`, returning the one it replaced (if still showing).
    pub fn raise(&self, notice: AlertNotice, now: DateTime<Utc>) -> Option<AlertNotice> {
        let mut current = self.current.lock();
        let replaced = current.take().filter(|n| self.is_visible(n, now));
        *current = Some(notice);
        replaced
    }

    pub fn dismiss(&self, notice_id: Uuid) -> bool {
        let mut current = self.current.lock();
        if current.as_ref().map(|n| n.notice_id) == Some(notice_id) {
            *current = None;
            true
        } else {
            false
        }
    }

    pub fn visible(&self, now: DateTime<Utc>) -> Option<AlertNotice> {
        self.current
            .lock()
            .as_ref()
            .filter(|n| self.is_visible(n, now))
            .cloned()
    }

    fn is_visible(&self, notice: &AlertNotice, now: DateTime<Utc>) -> bool {
        now < notice.raised_at + self.duration
    }
}

impl AlertSink for ToastSlot {
    fn alert_observed(&self, notice: AlertNotice) {
        let now = notice.raised_at;
        if let Some(old) = self.raise(notice, now) {
            tracing::debug!("Dismissed alert #{} for a newer one", old.record_id);
        }
    }
}
