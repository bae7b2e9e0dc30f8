//! API Module
//!
//! Structure:
//! - types.rs: wire types for the simulation REST surface
//! - client.rs: `SimulationApi` seam and its reqwest implementation

pub mod client;
pub mod types;

pub use client::{HttpSimulationApi, SimulationApi};
pub use types::{Ack, SimulationHistoryRecord, SimulationMode, SimulationStatus, StartParams};
