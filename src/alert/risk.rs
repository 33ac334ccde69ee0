/// Risk classification for a single measurement.
///
/// The rule is evaluated top-down and the first match wins:
///
/// 1. water level >= high level, rain > high rain, or a civil defense alert → High
/// 2. water level >= moderate level, or rain > moderate rain → Moderate
/// 3. otherwise → Low
///
/// Boundary values belong to the higher band. Water level compares with `>=`
/// while rain intensity compares with a strict `>`; both are intentional and
/// must not be harmonised.

use serde::Deserialize;

use crate::model::{Measurement, RiskLevel};

/// Cut points for the classification rule.
///
/// `Default` is the canonical rule (2.0 m / 80 %, 1.0 m / 50 %). The `[risk]`
/// table in `flood_ledger.toml` may override individual values.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub high_water_level_m: f64,
    pub high_rain_intensity: u8,
    pub moderate_water_level_m: f64,
    pub moderate_rain_intensity: u8,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high_water_level_m: 2.0,
            high_rain_intensity: 80,
            moderate_water_level_m: 1.0,
            moderate_rain_intensity: 50,
        }
    }
}

/// Classifies a measurement with the canonical thresholds.
pub fn classify(m: &Measurement) -> RiskLevel {
    classify_with(m, &RiskThresholds::default())
}

/// Classifies a measurement with caller-supplied thresholds.
pub fn classify_with(m: &Measurement, t: &RiskThresholds) -> RiskLevel {
    if m.water_level >= t.high_water_level_m
        || m.rain_intensity > t.high_rain_intensity
        || m.civil_defense_alert
    {
        RiskLevel::High
    } else if m.water_level >= t.moderate_water_level_m
        || m.rain_intensity > t.moderate_rain_intensity
    {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}
