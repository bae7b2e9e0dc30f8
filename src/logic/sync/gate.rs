//! Control Gate
//!
//! At most one mutating control action in flight at any time, and the
//! store's `action_in_progress` is true exactly while the gate is held.
//! Start, stop and reset also publish their label and reconcile with a
//! full refresh. Set-speed and set-mode publish no label and reconcile
//! only what they change.

use std::future::Future;
use std::sync::Arc;

use super::scheduler::PollingScheduler;
use super::store::{ControlAction, SyncStore};
use super::ticker::InFlight;
use crate::api::{SimulationApi, SimulationMode, StartParams};
use crate::error::{ApiError, ApiResult};

/// Result of asking the gate to run something
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    Completed,
    Failed(ApiError),
    /// Another action held the gate; nothing was sent.
    Busy,
}

/// What a lightweight action refreshes on success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reconcile {
    Status,
    StatusThenHistory,
}

/// Clears the published label even if the action future is dropped.
struct ActionScope<'a> {
    store: &'a SyncStore,
}

impl<'a> ActionScope<'a> {
    fn enter(store: &'a SyncStore, label: Option<ControlAction>) -> Self {
        store.begin_action(label);
        Self { store }
    }
}

impl Drop for ActionScope<'_> {
    fn drop(&mut self) {
        self.store.end_action();
    }
}

pub struct ControlGate<A> {
    scheduler: PollingScheduler<A>,
    busy: InFlight,
}

impl<A> Clone for ControlGate<A> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
            busy: self.busy.clone(),
        }
    }
}

impl<A: SimulationApi> ControlGate<A> {
    pub fn new(scheduler: PollingScheduler<A>) -> Self {
        Self {
            scheduler,
            busy: InFlight::new(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    fn store(&self) -> &Arc<SyncStore> {
        self.scheduler.store()
    }

    /// Run `request` under the gate.
    ///
    /// No-op if any action is in flight. On success the store is
    /// reconciled with `refresh_now`; on failure the error is recorded.
    /// The gate and label are released either way.
    pub async fn run<F, Fut, T>(&self, action: ControlAction, request: F) -> GateOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let Some(_permit) = self.busy.try_acquire() else {
            tracing::debug!("Ignoring {}: another control action is in flight", action);
            return GateOutcome::Busy;
        };
        let _scope = ActionScope::enter(self.store(), Some(action));

        tracing::info!("Control action: {}", action);
        match request().await {
            Ok(_) => {
                self.scheduler.refresh_now().await;
                GateOutcome::Completed
            }
            Err(e) => {
                tracing::warn!("Control action {} failed: {}", action, e);
                self.store().record_error(format!("Failed to {} simulation: {}", action, e));
                GateOutcome::Failed(e)
            }
        }
    }

    async fn run_light<F, Fut, T>(&self, name: &'static str, reconcile: Reconcile, request: F) -> GateOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let Some(_permit) = self.busy.try_acquire() else {
            tracing::debug!("Ignoring {}: another control action is in flight", name);
            return GateOutcome::Busy;
        };
        let _scope = ActionScope::enter(self.store(), None);

        match request().await {
            Ok(_) => {
                self.scheduler.fetch_status().await;
                if reconcile == Reconcile::StatusThenHistory {
                    self.scheduler.fetch_history().await;
                }
                GateOutcome::Completed
            }
            Err(e) => {
                tracing::warn!("{} failed: {}", name, e);
                self.store().record_error(format!("Failed to {}: {}", name, e));
                GateOutcome::Failed(e)
            }
        }
    }

    pub async fn start(&self, params: StartParams) -> GateOutcome {
        let api = self.scheduler.api();
        self.run(ControlAction::Start, || api.start(&params)).await
    }

    pub async fn stop(&self) -> GateOutcome {
        let api = self.scheduler.api();
        self.run(ControlAction::Stop, || api.stop()).await
    }

    pub async fn reset(&self) -> GateOutcome {
        let api = self.scheduler.api();
        self.run(ControlAction::Reset, || api.reset()).await
    }

    pub async fn set_speed(&self, speed: f64) -> GateOutcome {
        let api = self.scheduler.api();
        self.run_light("set speed", Reconcile::Status, || api.set_speed(speed)).await
    }

    pub async fn set_mode(&self, mode: SimulationMode) -> GateOutcome {
        let api = self.scheduler.api();
        self.run_light("set mode", Reconcile::StatusThenHistory, || api.set_mode(mode)).await
    }
}
