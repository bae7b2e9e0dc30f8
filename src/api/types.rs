//! Wire types for the simulation REST surface.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Which model family drives the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationMode {
    #[default]
    Classification,
    Regression,
}

impl SimulationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationMode::Classification => "classification",
            SimulationMode::Regression => "regression",
        }
    }

    /// Strict parse, used for user input.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "classification" => Some(SimulationMode::Classification),
            "regression" => Some(SimulationMode::Regression),
            _ => None,
        }
    }

    /// History records carry the mode as free text; anything that is not
    /// `classification` is read as regression.
    pub fn from_record(raw: &str) -> Self {
        if raw == "classification" {
            SimulationMode::Classification
        } else {
            SimulationMode::Regression
        }
    }
}

impl fmt::Display for SimulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-authoritative simulation state, replaced wholesale each poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationStatus {
    pub running: bool,
    pub current_index: i64,
    pub mode: SimulationMode,
    /// Seconds between simulated steps
    pub speed: f64,
    #[serde(default)]
    pub last_prediction: Option<Map<String, Value>>,
    #[serde(default)]
    pub dataset_length: i64,
}

impl SimulationStatus {
    /// `last_prediction.hazard_level`, if present and not null.
    pub fn hazard_level(&self) -> Option<&Value> {
        self.last_prediction
            .as_ref()
            .and_then(|p| p.get("hazard_level"))
            .filter(|v| !v.is_null())
    }
}

/// One append-only history log entry.
///
/// Every field except `id` tolerates `null` or absence; the server maps
/// NaN/inf floats to `null`, so `risk_level` in particular may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationHistoryRecord {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mode: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub raw_row: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model_output: Map<String, Value>,
    #[serde(default)]
    pub risk_level: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub alert_message: String,
}

impl SimulationHistoryRecord {
    /// Empty message means "no alert".
    pub fn has_alert(&self) -> bool {
        !self.alert_message.is_empty()
    }

    pub fn simulation_mode(&self) -> SimulationMode {
        SimulationMode::from_record(&self.mode)
    }
}

/// Query parameters for `POST /simulation/start`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StartParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<SimulationMode>,
}

/// Opaque acknowledgement from a control endpoint.
pub type Ack = Value;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
