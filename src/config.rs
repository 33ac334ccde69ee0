/// Configuration loader - parses flood_ledger.toml
///
/// Keeps the ledger location, the risk thresholds, and the trend model
/// settings out of the code so they can be adjusted without recompiling.
/// Every key has a default; an empty file (or no file, via
/// `load_config_or_default`) gives the canonical behaviour.
///
/// ```toml
/// [ledger]
/// backend = "csv"          # or "postgres" (uses DATABASE_URL)
/// path = "historico.csv"
///
/// [risk]
/// high_water_level_m = 2.0
/// high_rain_intensity = 80
/// moderate_water_level_m = 1.0
/// moderate_rain_intensity = 50
///
/// [trend]
/// strategy = "least_squares_fit"   # fixed_formula_direct | fixed_formula_normalized
/// breach_threshold_m = 2.0
/// normalization_ceiling_m = 3.0
/// fit_degree = 3
/// grid_points = 100
/// first_day = 1
/// last_day = 10
/// ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::alert::risk::RiskThresholds;
use crate::analysis::trend::{
    DayDomain, TrendModel, TrendStrategy, DEFAULT_BREACH_THRESHOLD_M, DEFAULT_FIT_DEGREE,
    DEFAULT_GRID_POINTS, DEFAULT_NORMALIZATION_CEILING_M,
};
use crate::db::DbConfigError;
use crate::ledger::csv_store::DEFAULT_LEDGER_FILE;
use crate::ledger::{CsvLedgerStore, LedgerStore, PgLedgerStore};

/// Configuration file looked up in the working directory by default.
pub const DEFAULT_CONFIG_FILE: &str = "flood_ledger.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ledger: LedgerConfig,
    pub risk: RiskThresholds,
    pub trend: TrendConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    #[default]
    Csv,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    /// CSV file path; ignored by the postgres backend.
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::Csv,
            path: PathBuf::from(DEFAULT_LEDGER_FILE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    FixedFormulaDirect,
    FixedFormulaNormalized,
    #[default]
    LeastSquaresFit,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub strategy: StrategyKind,
    pub breach_threshold_m: f64,
    pub normalization_ceiling_m: f64,
    pub fit_degree: usize,
    pub grid_points: usize,
    pub first_day: i32,
    pub last_day: i32,
}

impl Default for TrendConfig {
    fn default() -> Self {
        let domain = DayDomain::default();
        Self {
            strategy: StrategyKind::default(),
            breach_threshold_m: DEFAULT_BREACH_THRESHOLD_M,
            normalization_ceiling_m: DEFAULT_NORMALIZATION_CEILING_M,
            fit_degree: DEFAULT_FIT_DEGREE,
            grid_points: DEFAULT_GRID_POINTS,
            first_day: domain.first_day,
            last_day: domain.last_day,
        }
    }
}

impl TrendConfig {
    pub fn domain(&self) -> DayDomain {
        DayDomain {
            first_day: self.first_day,
            last_day: self.last_day,
        }
    }

    pub fn strategy(&self) -> TrendStrategy {
        match self.strategy {
            StrategyKind::FixedFormulaDirect => TrendStrategy::FixedFormulaDirect,
            StrategyKind::FixedFormulaNormalized => TrendStrategy::FixedFormulaNormalized {
                ceiling: self.normalization_ceiling_m,
            },
            StrategyKind::LeastSquaresFit => TrendStrategy::LeastSquaresFit {
                degree: self.fit_degree,
                grid_points: self.grid_points,
            },
        }
    }

    /// Builds the trend model described by this table.
    pub fn model(&self) -> TrendModel {
        TrendModel::new(self.strategy())
            .with_threshold(self.breach_threshold_m)
            .with_domain(self.domain())
    }
}

impl AppConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.trend;
        if t.first_day > t.last_day {
            return Err(ConfigError::Invalid(format!(
                "trend.first_day ({}) must not exceed trend.last_day ({})",
                t.first_day, t.last_day
            )));
        }
        if t.grid_points < 2 {
            return Err(ConfigError::Invalid("trend.grid_points must be at least 2".to_string()));
        }
        if !t.breach_threshold_m.is_finite() {
            return Err(ConfigError::Invalid("trend.breach_threshold_m must be finite".to_string()));
        }
        if !(t.normalization_ceiling_m.is_finite() && t.normalization_ceiling_m > 0.0) {
            return Err(ConfigError::Invalid(
                "trend.normalization_ceiling_m must be a positive number".to_string(),
            ));
        }

        let r = &self.risk;
        if r.moderate_water_level_m > r.high_water_level_m
            || r.moderate_rain_intensity > r.high_rain_intensity
        {
            return Err(ConfigError::Invalid(
                "risk moderate thresholds must not exceed the high thresholds".to_string(),
            ));
        }
        Ok(())
    }

    /// Opens the configured ledger backend.
    pub fn open_store(&self) -> Result<Box<dyn LedgerStore>, DbConfigError> {
        match self.ledger.backend {
            LedgerBackend::Csv => Ok(Box::new(CsvLedgerStore::new(&self.ledger.path))),
            LedgerBackend::Postgres => Ok(Box::new(PgLedgerStore::connect()?)),
        }
    }
}

/// Parses configuration text.
pub fn parse_config(contents: &str, origin: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: origin.to_string(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads and validates a configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&contents, &path.display().to_string())
}

/// Like `load_config`, but a missing file yields the defaults.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        log::info!("{} not found; using default configuration", path.display());
        return Ok(AppConfig::default());
    }
    load_config(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_project_config_succeeds() {
        let config = load_config(DEFAULT_CONFIG_FILE).expect("flood_ledger.toml should load");
        assert_eq!(config.ledger.backend, LedgerBackend::Csv);
        assert_eq!(config.risk, RiskThresholds::default());
        assert_eq!(config.trend.domain(), DayDomain::default());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("", "inline").unwrap();
        assert_eq!(config.ledger.path, PathBuf::from("historico.csv"));
        assert_eq!(config.trend.strategy, StrategyKind::LeastSquaresFit);
        assert_eq!(
            config.trend.strategy(),
            TrendStrategy::LeastSquaresFit { degree: 3, grid_points: 100 }
        );
        assert_eq!(config.trend.breach_threshold_m, 2.0);
    }

    #[test]
    fn test_partial_tables_override_individual_keys() {
        let config = parse_config(
            r#"
            [ledger]
            backend = "postgres"

            [risk]
            high_rain_intensity = 70

            [trend]
            strategy = "fixed_formula_normalized"
            normalization_ceiling_m = 2.0
            "#,
            "inline",
        )
        .unwrap();

        assert_eq!(config.ledger.backend, LedgerBackend::Postgres);
        assert_eq!(config.risk.high_rain_intensity, 70);
        assert_eq!(config.risk.high_water_level_m, 2.0);
        assert_eq!(
            config.trend.model().strategy,
            TrendStrategy::FixedFormulaNormalized { ceiling: 2.0 }
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            parse_config("[trend]\nfirst_day = 5\nlast_day = 1\n", "inline"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_config("[trend]\nnormalization_ceiling_m = 0.0\n", "inline"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_config("[risk]\nmoderate_water_level_m = 3.0\n", "inline"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_config("[trend]\nstrategy = \"spline\"\n", "inline"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.ledger.backend, LedgerBackend::Csv);
        assert!(load_config(dir.path().join("absent.toml")).is_err());
    }
}
