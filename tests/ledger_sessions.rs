/// Integration tests for the ledger's session accumulation across runs.
///
/// These tests exercise the full path a run takes:
/// 1. Validate raw input tokens into measurements
/// 2. Classify and append as one session to a CSV ledger
/// 3. Reload in a fresh "run" and append again
/// 4. Aggregate statistics over the reloaded ledger
///
/// Each test uses its own temporary directory, so they can run in parallel.

use flood_ledger::alert::risk::classify;
use flood_ledger::analysis::statistics::{
    count_by_risk_per_session, mean_water_level_per_session, top_cities_by_high_risk_count,
    LedgerStatistics,
};
use flood_ledger::ingest::input::validate_measurement;
use flood_ledger::ledger::{CsvLedgerStore, LedgerError, MeasurementLedger};
use flood_ledger::model::{Measurement, RiskLevel};

use std::fs;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn readings() -> Vec<(Measurement, RiskLevel)> {
    [
        ("blumenau", "2.0", "0", "n"),
        ("itajaí", "1.5", "0", "n"),
        ("gaspar", "0.5", "30", "n"),
        ("brusque", "0", "90", "n"),
        ("ilhota", "0", "0", "y"),
    ]
    .iter()
    .map(|(city, level, rain, alert)| {
        let m = validate_measurement(city, level, rain, alert).expect("fixture input is valid");
        let risk = classify(&m);
        (m, risk)
    })
    .collect()
}

// ---------------------------------------------------------------------------
// Session numbering and round-trip fidelity
// ---------------------------------------------------------------------------

#[test]
fn test_two_runs_produce_sessions_one_and_two() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("historico.csv");
    let batch = readings();

    // First run
    let mut run1 = MeasurementLedger::new(CsvLedgerStore::new(&path));
    let after_first = run1.append(&batch).expect("first append should persist");
    assert!(after_first.entries().iter().all(|e| e.session == 1));

    // Second run, fresh ledger object over the same file
    let mut run2 = MeasurementLedger::new(CsvLedgerStore::new(&path));
    let after_second = run2.append(&batch).expect("second append should persist");
    assert_eq!(after_second.len(), 2 * batch.len());
    assert!(after_second.entries()[batch.len()..].iter().all(|e| e.session == 2));

    // Reload and compare field by field
    let mut run3 = MeasurementLedger::new(CsvLedgerStore::new(&path));
    let reloaded = run3.load();
    assert_eq!(reloaded, after_second);

    for (entry, (m, risk)) in reloaded.entries().iter().zip(batch.iter().chain(batch.iter())) {
        assert_eq!(entry.city, m.city);
        assert_eq!(entry.water_level, Some(m.water_level));
        assert_eq!(entry.rain_intensity, Some(m.rain_intensity));
        assert_eq!(entry.civil_defense_alert, m.civil_defense_alert);
        assert_eq!(entry.risk, *risk);
    }
}

#[test]
fn test_reference_readings_classify_as_documented() {
    let risks: Vec<RiskLevel> = readings().into_iter().map(|(_, r)| r).collect();
    assert_eq!(
        risks,
        vec![
            RiskLevel::High,
            RiskLevel::Moderate,
            RiskLevel::Low,
            RiskLevel::High,
            RiskLevel::High,
        ]
    );
}

#[test]
fn test_unrecognised_file_is_treated_as_no_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("historico.csv");
    // Output of an older tool: no session column.
    fs::write(
        &path,
        "cidade,nivel_agua,intensidade_chuva,alerta_defesa_civil,risco\nBlumenau,2.1,40,Não,Alto\n",
    )
    .unwrap();

    let mut ledger = MeasurementLedger::new(CsvLedgerStore::new(&path));
    assert!(ledger.load().is_empty());

    let updated = ledger.append(&readings()).unwrap();
    assert!(updated.entries().iter().all(|e| e.session == 1));
}

#[test]
fn test_garbage_file_is_treated_as_no_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("historico.csv");
    fs::write(&path, [0xffu8, 0xfe, 0x00, 0x12]).unwrap();

    let mut ledger = MeasurementLedger::new(CsvLedgerStore::new(&path));
    assert!(ledger.load().is_empty());
}

#[test]
fn test_write_failure_is_reported_to_caller() {
    let dir = tempfile::tempdir().unwrap();
    // The parent of the ledger path is a plain file, so nothing can be written.
    let blocker = dir.path().join("not_a_dir");
    fs::write(&blocker, "x").unwrap();
    let path = blocker.join("historico.csv");

    let mut ledger = MeasurementLedger::new(CsvLedgerStore::new(&path));
    let err = ledger.append(&readings()).unwrap_err();
    assert!(matches!(err, LedgerError::Write { .. }));
}

// ---------------------------------------------------------------------------
// Existing history is never lost by an append
// ---------------------------------------------------------------------------

const HEADER: &str = "session,city,water_level,rain_intensity,civil_defense_alert,risk\n";

#[test]
fn test_append_keeps_row_with_non_utf8_city() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("historico.csv");
    let legacy_row: &[u8] = b"1,Itaja\xED,0.3,10,No,Low\n";
    let mut bytes = format!("{}1,Blumenau,2.4,70,No,High\n", HEADER).into_bytes();
    bytes.extend_from_slice(legacy_row);
    fs::write(&path, &bytes).unwrap();

    let gaspar = validate_measurement("gaspar", "0.5", "0", "n").unwrap();
    let mut ledger = MeasurementLedger::new(CsvLedgerStore::new(&path));
    let updated = ledger.append_measurements(&[gaspar]).unwrap();

    assert_eq!(updated.len(), 3);
    assert_eq!(updated.sessions(), vec![1, 2]);
    let written = fs::read(&path).unwrap();
    assert!(written.windows(legacy_row.len()).any(|w| w == legacy_row));
}

#[test]
fn test_append_keeps_unreadable_rows_and_numbers_above_them() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("historico.csv");
    fs::write(
        &path,
        format!("{}1,Blumenau,2.4,70,No,High\n5,Gaspar,0.4,10,maybe,Low\n", HEADER),
    )
    .unwrap();

    let mut ledger = MeasurementLedger::new(CsvLedgerStore::new(&path));
    let updated = ledger.append(&readings()).unwrap();
    assert!(updated.entries()[1..].iter().all(|e| e.session == 6));

    let text = fs::read_to_string(&path).unwrap();
    let rows: Vec<&str> = text.lines().collect();
    assert_eq!(rows.len(), 1 + 2 + readings().len());
    assert_eq!(rows[2], "5,Gaspar,0.4,10,maybe,Low");
}

#[test]
fn test_append_refuses_file_missing_a_required_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("historico.csv");
    let original = "session,city,water_level,rain_intensity,risk\n\
                    1,Blumenau,2.4,70,High\n\
                    2,Itajaí,0.3,10,Low\n";
    fs::write(&path, original).unwrap();

    let mut ledger = MeasurementLedger::new(CsvLedgerStore::new(&path));
    let err = ledger.append(&readings()).unwrap_err();
    assert!(matches!(err, LedgerError::Read { .. }));
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

// ---------------------------------------------------------------------------
// Statistics over an accumulated ledger
// ---------------------------------------------------------------------------

#[test]
fn test_statistics_over_accumulated_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("historico.csv");

    let mut ledger = MeasurementLedger::new(CsvLedgerStore::new(&path));
    ledger.append(&readings()).unwrap();
    // Second session only has calm readings.
    let calm = validate_measurement("gaspar", "0.2", "10", "n").unwrap();
    let loaded = ledger.append(&[(calm.clone(), classify(&calm))]).unwrap();

    let table = count_by_risk_per_session(&loaded);
    assert_eq!(table[&2][&RiskLevel::High], 0);
    assert_eq!(table[&2][&RiskLevel::Moderate], 0);
    assert_eq!(table[&2][&RiskLevel::Low], 1);

    let means = mean_water_level_per_session(&loaded);
    assert!((means[&1].unwrap() - 0.8).abs() < 1e-12);
    assert!((means[&2].unwrap() - 0.2).abs() < 1e-12);

    let high: Vec<String> = top_cities_by_high_risk_count(&loaded)
        .into_iter()
        .map(|c| c.city)
        .collect();
    assert_eq!(high, vec!["Blumenau", "Brusque", "Ilhota"]);

    let stats = LedgerStatistics::from_ledger(&loaded);
    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.total_measurements, 6);
    assert_eq!(stats.top_cities[0].city, "Gaspar");
}
