//! Sensor Nodes & Scalar Distribution
//!
//! The simulation emits one shared telemetry stream. The map shows five
//! nodes, so each node gets a deterministic perturbation of the shared
//! value. No randomness: identical inputs give bit-identical outputs.

use serde::Serialize;
use super::risk::{coerce_number, RiskNormalizer};
use crate::api::SimulationHistoryRecord;

/// Default perturbation spread
pub const DEFAULT_SPREAD: f64 = 0.22;

/// Spread used for the per-node hazard index
pub const HAZARD_SPREAD: f64 = 0.55;

/// Spread used for per-node hazard trend points
pub const TREND_SPREAD: f64 = 0.45;

/// Spread used for per-node confidence
pub const CONFIDENCE_SPREAD: f64 = 0.06;

/// Number of newest records in a node trend
pub const TREND_LEN: usize = 36;

/// Alerts kept per node
pub const NODE_ALERTS: usize = 3;

/// A fixed sensor location
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorNode {
    pub id: &'static str,
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

/// Mandi–Kullu highway corridor
pub const SENSOR_NODES: [SensorNode; 5] = [
    SensorNode { id: "TG-01", name: "Mandi (South Gate)", lat: 31.7089, lng: 76.9325 },
    SensorNode { id: "TG-02", name: "Pandoh Dam Stretch", lat: 31.7715, lng: 77.0022 },
    SensorNode { id: "TG-03", name: "Aut Tunnel Approach", lat: 31.8308, lng: 77.0701 },
    SensorNode { id: "TG-04", name: "Bhuntar Junction", lat: 31.8787, lng: 77.1552 },
    SensorNode { id: "TG-05", name: "Kullu (North Ridge)", lat: 31.9578, lng: 77.1095 },
];

/// Perturb `base` for one node.
///
/// Two out-of-phase wobbles keyed by `seed` and `node_index`; the offset
/// is bounded by `1.5 * |spread|`. Unclamped: callers clamp into their
/// own domain.
pub fn distribute(base: f64, node_index: usize, seed: i64, spread: f64) -> f64 {
    let seed = seed as f64;
    let node = node_index as f64;
    let wobble = ((seed + 1.0) * 0.9 + node * 1.7).sin() * spread
        + ((seed + 2.0) * 0.3 + node * 0.8).cos() * (spread / 2.0);
    base + wobble
}

/// Hazard index for display: rounded and held to 0..=3.
pub fn node_hazard_index(base_index: f64, node_index: usize, seed: i64, spread: f64) -> u8 {
    distribute(base_index, node_index, seed, spread).round().clamp(0.0, 3.0) as u8
}

/// Displacement from whatever field the model populated.
pub fn pick_displacement(record: &SimulationHistoryRecord) -> Option<f64> {
    let candidates = [
        record.model_output.get("displacement_value"),
        record.model_output.get("risk_score"),
        record.raw_row.get("Displacement"),
        record.raw_row.get("displacement"),
    ];
    // First non-null candidate wins, even if it fails to parse
    candidates
        .into_iter()
        .flatten()
        .find(|v| !v.is_null())
        .and_then(coerce_number)
}

pub fn pick_confidence(record: &SimulationHistoryRecord) -> Option<f64> {
    record.model_output.get("confidence").and_then(coerce_number)
}

/// Display values for one node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeReading {
    pub node: SensorNode,
    pub hazard: u8,
    pub displacement: f64,
    pub confidence: Option<f64>,
    /// Hazard index per trend record, oldest first
    pub trend: Vec<u8>,
    /// Newest first
    pub alerts: Vec<SimulationHistoryRecord>,
}

/// Fan the newest record out across the sensor registry.
pub fn project_nodes(history: &[SimulationHistoryRecord], normalizer: &RiskNormalizer) -> Vec<NodeReading> {
    let last = history.last();
    let seed = last.map(|r| r.id).unwrap_or(0);

    let base_index = last
        .map(|r| normalizer.normalize(r.simulation_mode(), &r.risk_level).base_index())
        .unwrap_or(0.0);
    let base_disp = last.and_then(pick_displacement).unwrap_or(0.0);
    let base_conf = last.and_then(pick_confidence);

    let tail = &history[history.len().saturating_sub(TREND_LEN)..];
    let node_count = SENSOR_NODES.len() as i64;

    SENSOR_NODES
        .iter()
        .enumerate()
        .map(|(idx, node)| {
            let displacement_spread = (base_disp * 0.03).max(0.15);

            let trend = tail
                .iter()
                .map(|r| {
                    let base = normalizer.normalize(r.simulation_mode(), &r.risk_level).base_index();
                    node_hazard_index(base, idx, r.id, TREND_SPREAD)
                })
                .collect();

            let mut alerts: Vec<SimulationHistoryRecord> = history
                .iter()
                .filter(|r| r.has_alert() && r.id.rem_euclid(node_count) == idx as i64)
                .cloned()
                .collect();
            let keep_from = alerts.len().saturating_sub(NODE_ALERTS);
            alerts.drain(..keep_from);
            alerts.reverse();

            NodeReading {
                node: *node,
                hazard: node_hazard_index(base_index, idx, seed, HAZARD_SPREAD),
                displacement: distribute(base_disp, idx, seed, displacement_spread).max(0.0),
                confidence: base_conf.map(|c| distribute(c, idx, seed, CONFIDENCE_SPREAD).clamp(0.0, 1.0)),
                trend,
                alerts,
            }
        })
        .collect()
}
