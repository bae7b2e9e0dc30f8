//! Polling Scheduler
//!
//! Two independent loops: status and history. Each loop has its own
//! overlap guard, shared with `refresh_now`, so there is never more than
//! one outstanding request per slice.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use super::store::SyncStore;
use super::ticker::{InFlight, PeriodicTask};
use crate::api::SimulationApi;
use crate::config::ConsoleConfig;
use crate::error::ApiError;
use crate::logic::alerts::{AlertDeduplicator, AlertNotice, AlertSink};

/// Result of one poll attempt
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Updated,
    Failed(ApiError),
    /// The previous request for this slice was still outstanding.
    Skipped,
}

/// Poll cadence and limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSettings {
    pub status_period: Duration,
    pub history_period: Duration,
    pub history_limit: usize,
}

impl From<&ConsoleConfig> for PollSettings {
    fn from(config: &ConsoleConfig) -> Self {
        Self {
            status_period: config.status_period(),
            history_period: config.history_period(),
            history_limit: config.history_limit,
        }
    }
}

/// Network trouble is routine for a poll loop; anything else is a
/// contract problem with the server.
fn log_poll_failure(slice: &str, err: &ApiError) {
    if err.is_transient() {
        tracing::warn!("{} poll failed: {}", slice, err);
    } else {
        tracing::error!("{} poll rejected: {}", slice, err);
    }
}

struct PollContext<A> {
    api: A,
    store: Arc<SyncStore>,
    dedup: Mutex<AlertDeduplicator>,
    sink: Arc<dyn AlertSink>,
    status_guard: InFlight,
    history_guard: InFlight,
    settings: PollSettings,
}

impl<A: SimulationApi> PollContext<A> {
    async fn poll_status(&self) -> PollOutcome {
        match self.api.status().await {
            Ok(status) => {
                tracing::debug!(
                    "Status: running={} index={}/{} mode={}",
                    status.running,
                    status.current_index,
                    status.dataset_length,
                    status.mode
                );
                self.store.apply_status(status, Utc::now());
                PollOutcome::Updated
            }
            Err(e) => {
                log_poll_failure("status", &e);
                self.store.record_poll_failure(e.to_string());
                PollOutcome::Failed(e)
            }
        }
    }

    async fn poll_history(&self) -> PollOutcome {
        match self.api.history(self.settings.history_limit).await {
            Ok(mut records) => {
                let limit = self.settings.history_limit;
                if records.len() > limit {
                    records.drain(..records.len() - limit);
                }

                let at = Utc::now();
                let notice = self
                    .dedup
                    .lock()
                    .ingest(&records)
                    .map(|r| AlertNotice::from_record(r, self.store.normalizer(), at));

                tracing::debug!("History: {} records", records.len());
                self.store.apply_history(records, at);

                if let Some(notice) = notice {
                    tracing::info!("New alert #{} [{}]: {}", notice.record_id, notice.band, notice.message);
                    self.sink.alert_observed(notice);
                }
                PollOutcome::Updated
            }
            Err(e) => {
                log_poll_failure("history", &e);
                self.store.record_poll_failure(e.to_string());
                PollOutcome::Failed(e)
            }
        }
    }
}

/// Drives both fetch loops into one store
pub struct PollingScheduler<A> {
    ctx: Arc<PollContext<A>>,
}

impl<A> Clone for PollingScheduler<A> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
        }
    }
}

impl<A: SimulationApi> PollingScheduler<A> {
    pub fn new(api: A, store: Arc<SyncStore>, sink: Arc<dyn AlertSink>, settings: PollSettings) -> Self {
        Self {
            ctx: Arc::new(PollContext {
                api,
                store,
                dedup: Mutex::new(AlertDeduplicator::new()),
                sink,
                status_guard: InFlight::new(),
                history_guard: InFlight::new(),
                settings,
            }),
        }
    }

    pub fn api(&self) -> &A {
        &self.ctx.api
    }

    pub fn store(&self) -> &Arc<SyncStore> {
        &self.ctx.store
    }

    /// Highest alert id already surfaced
    pub fn watermark(&self) -> i64 {
        self.ctx.dedup.lock().watermark()
    }

    pub async fn fetch_status(&self) -> PollOutcome {
        let Some(_permit) = self.ctx.status_guard.try_acquire() else {
            tracing::trace!("Status fetch skipped, request outstanding");
            return PollOutcome::Skipped;
        };
        self.ctx.poll_status().await
    }

    pub async fn fetch_history(&self) -> PollOutcome {
        let Some(_permit) = self.ctx.history_guard.try_acquire() else {
            tracing::trace!("History fetch skipped, request outstanding");
            return PollOutcome::Skipped;
        };
        self.ctx.poll_history().await
    }

    /// Run both fetches concurrently, outside the timer cadence.
    pub async fn refresh_now(&self) -> (PollOutcome, PollOutcome) {
        tokio::join!(self.fetch_status(), self.fetch_history())
    }

    /// Start both loops. Stop them through the returned handle.
    pub fn start(&self) -> SchedulerHandle {
        let settings = self.ctx.settings;

        let mut status = PeriodicTask::new("status", settings.status_period, self.ctx.status_guard.clone());
        let ctx = Arc::clone(&self.ctx);
        status.start(move || {
            let ctx = Arc::clone(&ctx);
            async move {
                ctx.poll_status().await;
            }
        });

        let mut history = PeriodicTask::new("history", settings.history_period, self.ctx.history_guard.clone());
        let ctx = Arc::clone(&self.ctx);
        history.start(move || {
            let ctx = Arc::clone(&ctx);
            async move {
                ctx.poll_history().await;
            }
        });

        SchedulerHandle { status, history }
    }
}

/// Both running loops
#[derive(Debug)]
pub struct SchedulerHandle {
    status: PeriodicTask,
    history: PeriodicTask,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        self.status.is_running() || self.history.is_running()
    }

    pub fn stop(&mut self) {
        self.status.stop();
        self.history.stop();
    }
}
