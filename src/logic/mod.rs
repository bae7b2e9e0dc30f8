//! Logic Module - Sync Core & Engines
//!
//! - `risk` - hazard normalization onto one ordinal band
//! - `sensors` - sensor registry and deterministic per-node fan-out
//! - `alerts` - alert deduplication and notification delivery
//! - `sync` - store, polling scheduler and control gate
//! - `format` - display formatting

pub mod alerts;
pub mod format;
pub mod risk;
pub mod sensors;
pub mod sync;
