//! Session wiring
//!
//! One store, one scheduler, one gate. Nothing here is global: every
//! session owns its state, so several can run side by side.

use std::sync::Arc;

use super::gate::ControlGate;
use super::scheduler::{PollSettings, PollingScheduler, SchedulerHandle};
use super::store::{SyncSnapshot, SyncStore};
use crate::api::SimulationApi;
use crate::config::ConsoleConfig;
use crate::logic::alerts::AlertSink;
use crate::logic::risk::RiskNormalizer;
use crate::logic::sensors::{self, NodeReading};

pub struct Session<A> {
    store: Arc<SyncStore>,
    scheduler: PollingScheduler<A>,
    gate: ControlGate<A>,
}

impl<A: SimulationApi> Session<A> {
    pub fn new(api: A, config: &ConsoleConfig, sink: Arc<dyn AlertSink>) -> Self {
        let normalizer = RiskNormalizer::new(config.thresholds);
        let store = Arc::new(SyncStore::new(normalizer, config.alert_window));
        let scheduler = PollingScheduler::new(api, Arc::clone(&store), sink, PollSettings::from(config));
        let gate = ControlGate::new(scheduler.clone());

        Self { store, scheduler, gate }
    }

    pub fn store(&self) -> &Arc<SyncStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &PollingScheduler<A> {
        &self.scheduler
    }

    pub fn gate(&self) -> &ControlGate<A> {
        &self.gate
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.store.snapshot()
    }

    /// Initial sync, then both loops.
    pub async fn open(&self) -> SchedulerHandle {
        self.scheduler.refresh_now().await;
        self.scheduler.start()
    }

    /// Per-node display values for the current history.
    pub fn nodes(&self) -> Vec<NodeReading> {
        self.store
            .read(|s| sensors::project_nodes(&s.history, self.store.normalizer()))
    }
}
