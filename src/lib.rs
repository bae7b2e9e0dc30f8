//! TerraGuard Console - Simulation Sync Core
//!
//! Mirrors server-side simulation state into a live view model:
//! two independently paced polling loops, one reconciled store, alerts
//! surfaced exactly once, risk normalized onto a single band, and one
//! telemetry scalar fanned out across the sensor nodes.

pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod logic;

pub use api::{HttpSimulationApi, SimulationApi};
pub use config::ConsoleConfig;
pub use error::{ApiError, ApiResult, ConfigError};
pub use logic::alerts::{AlertNotice, AlertSink};
pub use logic::risk::{RiskBand, RiskReading};
pub use logic::sync::{ControlAction, GateOutcome, Session, SyncSnapshot};
