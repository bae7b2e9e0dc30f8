//! Risk Normalizer
//!
//! Maps heterogeneous hazard signals onto one ordinal scale:
//! classification emits a class index 0..=3, regression emits a free
//! score that is banded by threshold. Total and pure; bad input is
//! `Unknown`, never an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::api::SimulationMode;
use crate::constants;
use crate::error::ConfigError;

/// Ordinal hazard band. `Unknown` sits outside the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskBand {
    Low,
    Moderate,
    High,
    Critical,
    Unknown,
}

impl RiskBand {
    /// 0..=3 for known bands, -1 for `Unknown`.
    pub fn index(&self) -> i8 {
        match self {
            RiskBand::Low => 0,
            RiskBand::Moderate => 1,
            RiskBand::High => 2,
            RiskBand::Critical => 3,
            RiskBand::Unknown => -1,
        }
    }

    pub fn from_index(index: i64) -> Self {
        match index {
            0 => RiskBand::Low,
            1 => RiskBand::Moderate,
            2 => RiskBand::High,
            3 => RiskBand::Critical,
            _ => RiskBand::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        *self != RiskBand::Unknown
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskBand::Low => "Low",
            RiskBand::Moderate => "Moderate",
            RiskBand::High => "High",
            RiskBand::Critical => "Critical",
            RiskBand::Unknown => "Unknown",
        }
    }
}

impl PartialOrd for RiskBand {
    /// `Unknown` compares only with itself.
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self.is_known(), other.is_known()) {
            (true, true) => self.index().partial_cmp(&other.index()),
            (false, false) => Some(std::cmp::Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Band plus ordinal position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskReading {
    pub band: RiskBand,
    pub index: i8,
}

impl RiskReading {
    pub const UNKNOWN: RiskReading = RiskReading {
        band: RiskBand::Unknown,
        index: -1,
    };

    fn from_band(band: RiskBand) -> Self {
        Self { band, index: band.index() }
    }

    /// Index usable as a numeric base, with `Unknown` read as 0.
    pub fn base_index(&self) -> f64 {
        self.index.max(0) as f64
    }
}

/// Regression band boundaries (lower bound of each band, inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionThresholds {
    pub moderate: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RegressionThresholds {
    fn default() -> Self {
        Self {
            moderate: constants::REGRESSION_MODERATE_MIN,
            high: constants::REGRESSION_HIGH_MIN,
            critical: constants::REGRESSION_CRITICAL_MIN,
        }
    }
}

impl RegressionThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ascending = self.moderate < self.high && self.high < self.critical;
        let finite = self.moderate.is_finite() && self.high.is_finite() && self.critical.is_finite();
        if ascending && finite {
            Ok(())
        } else {
            Err(ConfigError::Thresholds {
                moderate: self.moderate,
                high: self.high,
                critical: self.critical,
            })
        }
    }

    /// A boundary value lands in the higher band.
    pub fn band_for(&self, score: f64) -> RiskBand {
        if !score.is_finite() {
            RiskBand::Unknown
        } else if score < self.moderate {
            RiskBand::Low
        } else if score < self.high {
            RiskBand::Moderate
        } else if score < self.critical {
            RiskBand::High
        } else {
            RiskBand::Critical
        }
    }
}

/// Numeric coercion for hazard payloads: numbers and numeric strings.
///
/// Null, booleans, empty strings, arrays and objects are not numbers here.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// Normalizer bound to a threshold policy.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RiskNormalizer {
    thresholds: RegressionThresholds,
}

impl RiskNormalizer {
    pub fn new(thresholds: RegressionThresholds) -> Self {
        Self { thresholds }
    }

    pub fn normalize(&self, mode: SimulationMode, hazard: &Value) -> RiskReading {
        match coerce_number(hazard) {
            Some(number) => self.normalize_number(mode, number),
            None => RiskReading::UNKNOWN,
        }
    }

    pub fn normalize_number(&self, mode: SimulationMode, hazard: f64) -> RiskReading {
        let band = match mode {
            SimulationMode::Classification => classification_band(hazard),
            SimulationMode::Regression => self.thresholds.band_for(hazard),
        };
        RiskReading::from_band(band)
    }
}

/// Only the exact class indices 0..=3 are bands; 1.5 is not a class.
fn classification_band(index: f64) -> RiskBand {
    if index.fract() != 0.0 || !(0.0..=3.0).contains(&index) {
        return RiskBand::Unknown;
    }
    RiskBand::from_index(index as i64)
}

/// Normalize with the default server threshold policy.
pub fn normalize(mode: SimulationMode, hazard: &Value) -> RiskReading {
    RiskNormalizer::default().normalize(mode, hazard)
}
