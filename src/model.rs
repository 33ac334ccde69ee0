/// Shared data types for the flood risk ledger.
///
/// `Measurement` is what the input collaborator hands to the core, already
/// validated. `RiskLevel` is the classifier's output. `LedgerEntry` is one
/// persisted row: a measurement, its risk level, and the session that wrote it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Risk level
// ---------------------------------------------------------------------------

/// Classification outcome for one measurement.
///
/// The derived ordering (Low < Moderate < High) is only used for reporting
/// and for stable key order in statistics maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    /// Token written to the `risk` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    /// Accepts the canonical tokens plus the Portuguese labels found in
    /// older `historico.csv` files (`Baixo`, `Moderado`, `Alto`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "baixo" => Ok(RiskLevel::Low),
            "moderate" | "moderado" => Ok(RiskLevel::Moderate),
            "high" | "alto" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Measurement
// ---------------------------------------------------------------------------

/// One manual flood-risk reading.
///
/// Constructed by `ingest::input::validate_measurement` (or directly by
/// callers that have already validated their values). The core never
/// re-validates.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub city: String,
    /// Water level in metres, >= 0.
    pub water_level: f64,
    /// Rain intensity as a percentage, 0..=100.
    pub rain_intensity: u8,
    pub civil_defense_alert: bool,
}

// ---------------------------------------------------------------------------
// Ledger entry
// ---------------------------------------------------------------------------

/// One row of the historical ledger.
///
/// `water_level` and `rain_intensity` are `None` only for rows loaded from a
/// store whose cell could not be read as a number. Entries built by
/// `MeasurementLedger::append` always carry values.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub session: u32,
    pub city: String,
    pub water_level: Option<f64>,
    pub rain_intensity: Option<u8>,
    pub civil_defense_alert: bool,
    pub risk: RiskLevel,
}

impl LedgerEntry {
    pub fn new(session: u32, measurement: &Measurement, risk: RiskLevel) -> Self {
        Self {
            session,
            city: measurement.city.clone(),
            water_level: Some(measurement.water_level),
            rain_intensity: Some(measurement.rain_intensity),
            civil_defense_alert: measurement.civil_defense_alert,
            risk,
        }
    }
}

// ---------------------------------------------------------------------------
// Civil defense alert tokens
// ---------------------------------------------------------------------------

/// Token written for a raised alert.
pub const ALERT_YES: &str = "Yes";
/// Token written when no alert was raised.
pub const ALERT_NO: &str = "No";

pub fn alert_token(alert: bool) -> &'static str {
    if alert { ALERT_YES } else { ALERT_NO }
}

/// Parses a persisted alert cell. Tolerates the Portuguese tokens and plain
/// booleans so older ledgers keep loading.
pub fn parse_alert_token(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "yes" | "sim" | "true" | "1" => Some(true),
        "no" | "não" | "nao" | "false" | "0" => Some(false),
        _ => None,
    }
}
