//! Periodic Task
//!
//! Fire an async job every `period`, skipping a tick entirely while the
//! previous run still holds the overlap guard. Started and stopped
//! explicitly through the handle.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Overlap guard shared by everything that runs the same job.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    busy: Arc<AtomicBool>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` if another run holds the guard.
    pub fn try_acquire(&self) -> Option<InFlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the guard on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Handle to one fixed-period loop
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    period: Duration,
    guard: InFlight,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    pub fn new(name: &'static str, period: Duration, guard: InFlight) -> Self {
        Self {
            name,
            period,
            guard,
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Begin ticking. The first tick fires one period from now. Calling
    /// `start` on a running task is a no-op.
    pub fn start<F, Fut>(&mut self, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_running() {
            tracing::debug!("{} loop already running", self.name);
            return;
        }

        let name = self.name;
        let period = self.period;
        let guard = self.guard.clone();

        tracing::info!("Starting {} loop every {} ms", name, period.as_millis());

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let Some(permit) = guard.try_acquire() else {
                    tracing::trace!("{} tick skipped, previous run outstanding", name);
                    continue;
                };

                let run = job();
                tokio::spawn(async move {
                    run.await;
                    drop(permit);
                });
            }
        }));
    }

    /// Stop scheduling new ticks. A run already in flight completes.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::info!("Stopped {} loop", self.name);
        }
    }
}
