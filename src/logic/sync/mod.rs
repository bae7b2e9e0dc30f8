//! Sync Module - Simulation State Mirror
//!
//! This module handles:
//! - Periodic status and history polling
//! - Reconciliation into a single store
//! - Serialized control actions
//!
//! All writes to the store go through the scheduler or the gate.

pub mod gate;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod ticker;

#[cfg(test)]
mod tests;

pub use gate::{ControlGate, GateOutcome};
pub use scheduler::{PollOutcome, PollSettings, PollingScheduler, SchedulerHandle};
pub use session::Session;
pub use store::{ControlAction, Liveness, SyncSnapshot, SyncStore};
pub use ticker::{InFlight, PeriodicTask};
