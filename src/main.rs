//! Flood Risk Ledger - command line entry point
//!
//! Records manual flood-risk measurements into the historical ledger, prints
//! ledger statistics, and evaluates river level trends. Non-interactive:
//! every value comes from the command line.
//!
//! Usage:
//!   flood_ledger record CITY LEVEL RAIN ALERT [CITY LEVEL RAIN ALERT ...]
//!   flood_ledger stats
//!   flood_ledger trend CITY DAY[:LEVEL] [DAY[:LEVEL] ...]
//!
//! Options:
//!   --config PATH   configuration file (default: flood_ledger.toml)
//!
//! ALERT is `y` (or `s`) or `n`. All measurements given to one `record` call are
//! stored as one session.
//!
//! Environment:
//!   RUST_LOG     - log filter for env_logger (e.g. `info`)
//!   DATABASE_URL - PostgreSQL connection string (postgres backend only)

use flood_ledger::alert::risk::classify_with;
use flood_ledger::analysis::statistics::LedgerStatistics;
use flood_ledger::analysis::trend::{TrendPoint, TrendSeries};
use flood_ledger::config::{self, AppConfig, DEFAULT_CONFIG_FILE};
use flood_ledger::ingest::input::{parse_city, validate_measurement};
use flood_ledger::ledger::{LedgerStore, MeasurementLedger};
use flood_ledger::report;
use std::env;
use std::error::Error;
use std::process;

const USAGE: &str = "Usage: flood_ledger [--config PATH] <record CITY LEVEL RAIN ALERT ... | stats | trend CITY DAY[:LEVEL] ...>";

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let mut config_path = DEFAULT_CONFIG_FILE.to_string();
    let mut rest: Vec<String> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if i + 1 < args.len() {
                    config_path = args[i + 1].clone();
                    i += 2;
                } else {
                    eprintln!("Error: --config requires a file path");
                    process::exit(1);
                }
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                return;
            }
            _ => {
                rest.push(args[i].clone());
                i += 1;
            }
        }
    }

    let config = match config::load_config_or_default(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            process::exit(1);
        }
    };

    let Some((command, command_args)) = rest.split_first() else {
        eprintln!("{}", USAGE);
        process::exit(1);
    };

    let result = match command.as_str() {
        "record" => run_record(&config, command_args),
        "stats" => run_stats(&config),
        "trend" => run_trend(&config, command_args),
        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!("{}", USAGE);
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("\n❌ {}", e);
        process::exit(1);
    }
}

fn run_record(config: &AppConfig, args: &[String]) -> Result<(), Box<dyn Error>> {
    if args.is_empty() || args.len() % 4 != 0 {
        return Err("record expects groups of CITY LEVEL RAIN ALERT".into());
    }

    let mut batch = Vec::new();
    for (n, group) in args.chunks(4).enumerate() {
        let measurement = validate_measurement(&group[0], &group[1], &group[2], &group[3])
            .map_err(|e| format!("measurement {}: {}", n + 1, e))?;
        let risk = classify_with(&measurement, &config.risk);
        println!("{}", report::render_measurement(&measurement, risk));
        batch.push((measurement, risk));
    }

    let mut ledger = MeasurementLedger::with_thresholds(config.open_store()?, config.risk);
    let updated = ledger.append(&batch)?;
    println!(
        "✅ Session {} saved to {} ({} measurements in ledger)",
        updated.max_session().unwrap_or(1),
        ledger.store().describe(),
        updated.len()
    );
    Ok(())
}

fn run_stats(config: &AppConfig) -> Result<(), Box<dyn Error>> {
    let mut ledger = MeasurementLedger::new(config.open_store()?);
    let loaded = ledger.load();
    if loaded.is_empty() {
        println!("⚠️  No ledger entries found at {}.", ledger.store().describe());
        return Ok(());
    }

    let stats = LedgerStatistics::from_ledger(&loaded);
    println!("{}", report::render_statistics(&stats, chrono::Utc::now()));
    Ok(())
}

fn run_trend(config: &AppConfig, args: &[String]) -> Result<(), Box<dyn Error>> {
    let Some((city, days)) = args.split_first() else {
        return Err("trend expects CITY followed by DAY[:LEVEL] values".into());
    };
    let city = parse_city(city)?;

    let mut points = Vec::with_capacity(days.len());
    for raw in days {
        let (day, level) = match raw.split_once(':') {
            Some((day, level)) => (day, Some(level)),
            None => (raw.as_str(), None),
        };
        let day: i32 = day
            .trim()
            .parse()
            .map_err(|_| format!("'{}' is not a day number", day))?;
        let level = match level {
            Some(level) => Some(
                level
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| format!("'{}' is not a river level", level))?,
            ),
            None => None,
        };
        points.push(TrendPoint { day, level });
    }

    let model = config.trend.model();
    let series = TrendSeries::from_points(points, &model.domain)?;
    let result = model.evaluate(&series);
    println!("{}", report::render_trend(&city, &result));
    Ok(())
}
