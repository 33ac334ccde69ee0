/// CSV file backend for the ledger (`historico.csv` by default).
///
/// File layout: a header row followed by one row per entry.
///
/// ```text
/// session,city,water_level,rain_intensity,civil_defense_alert,risk
/// 1,Blumenau,2.4,70,No,High
/// 1,Itajaí,0.3,10,No,Low
/// ```
///
/// Columns are located by header name, so column order does not matter and
/// unknown extra columns are ignored. Headers from the older Portuguese
/// layout (`registro`, `cidade`, `nivel_agua`, `intensidade_chuva`,
/// `alerta_defesa_civil`, `risco`) are recognised as aliases.
///
/// A file without a `session` column is not a ledger: loading it yields
/// `None` and the next persist replaces it. A file with a `session` column
/// but without `city`, `civil_defense_alert` or `risk` is a damaged ledger
/// and fails to load, so it is never overwritten.
///
/// Cells are read as bytes and decoded leniently, so a stray non-UTF-8 byte
/// only affects the text shown for that cell. Numeric cells that do not
/// parse become `None` on the entry. Rows whose session, risk or alert cell
/// does not parse produce no entry but are kept: every row read by `load`
/// is written back byte for byte by the following `persist`, in the
/// canonical column order.

use std::fs;
use std::path::{Path, PathBuf};

use csv::{ByteRecord, ReaderBuilder, WriterBuilder};
use log::{info, warn};

use crate::ledger::store::{LedgerStore, StoreError};
use crate::model::{alert_token, parse_alert_token, LedgerEntry, RiskLevel};

/// Column names written to the header row, in order.
pub const LEDGER_COLUMNS: [&str; 6] = [
    "session",
    "city",
    "water_level",
    "rain_intensity",
    "civil_defense_alert",
    "risk",
];

// Positions in `LEDGER_COLUMNS`.
const SESSION: usize = 0;
const CITY: usize = 1;
const WATER_LEVEL: usize = 2;
const RAIN_INTENSITY: usize = 3;
const CIVIL_DEFENSE_ALERT: usize = 4;
const RISK: usize = 5;

/// Default ledger file name, relative to the working directory.
pub const DEFAULT_LEDGER_FILE: &str = "historico.csv";

/// Maps a header cell to its position in `LEDGER_COLUMNS`.
fn canonical_column(header: &str) -> Option<usize> {
    let name = header.trim_start_matches('\u{feff}').trim().to_lowercase();
    match name.as_str() {
        "session" | "registro" => Some(SESSION),
        "city" | "cidade" => Some(CITY),
        "water_level" | "nivel_agua" => Some(WATER_LEVEL),
        "rain_intensity" | "intensidade_chuva" => Some(RAIN_INTENSITY),
        "civil_defense_alert" | "alerta_defesa_civil" => Some(CIVIL_DEFENSE_ALERT),
        "risk" | "risco" => Some(RISK),
        _ => None,
    }
}

/// A data row as read from disk, cells in `LEDGER_COLUMNS` order.
#[derive(Debug, Clone)]
struct StoredRow {
    cells: ByteRecord,
    session: Option<u32>,
    entry: Option<LedgerEntry>,
}

impl StoredRow {
    fn parse(cells: ByteRecord) -> Self {
        let text = |idx: usize| {
            String::from_utf8_lossy(cells.get(idx).unwrap_or_default())
                .trim()
                .to_string()
        };

        let session = text(SESSION).parse::<u32>().ok().filter(|s| *s >= 1);
        let alert = parse_alert_token(&text(CIVIL_DEFENSE_ALERT));
        let risk = text(RISK).parse::<RiskLevel>().ok();

        let entry = match (session, alert, risk) {
            (Some(session), Some(civil_defense_alert), Some(risk)) => Some(LedgerEntry {
                session,
                city: text(CITY),
                water_level: text(WATER_LEVEL)
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite()),
                rain_intensity: parse_rain_cell(&text(RAIN_INTENSITY)),
                civil_defense_alert,
                risk,
            }),
            _ => None,
        };

        Self { cells, session, entry }
    }
}

#[derive(Debug, Clone)]
pub struct CsvLedgerStore {
    path: PathBuf,
    /// Rows from the last `load`, kept so `persist` can write them back
    /// unchanged.
    rows: Vec<StoredRow>,
}

impl CsvLedgerStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            rows: Vec::new(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Default for CsvLedgerStore {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_FILE)
    }
}

/// Column indices resolved from the header row, one slot per ledger column.
struct ColumnMap {
    indices: [Option<usize>; 6],
}

impl ColumnMap {
    fn from_headers(headers: &ByteRecord) -> Self {
        let mut indices = [None; 6];
        for (idx, header) in headers.iter().enumerate() {
            if let Some(column) = canonical_column(&String::from_utf8_lossy(header)) {
                // First occurrence wins if a header is duplicated.
                if indices[column].is_none() {
                    indices[column] = Some(idx);
                }
            }
        }
        Self { indices }
    }

    fn has_session(&self) -> bool {
        self.indices[SESSION].is_some()
    }

    fn missing_required(&self) -> Option<&'static str> {
        [CITY, CIVIL_DEFENSE_ALERT, RISK]
            .into_iter()
            .find(|&column| self.indices[column].is_none())
            .map(|column| LEDGER_COLUMNS[column])
    }

    /// The row's cells rearranged into `LEDGER_COLUMNS` order. Optional
    /// columns absent from the file become empty cells.
    fn canonical_cells(&self, row: &ByteRecord) -> ByteRecord {
        let mut cells = ByteRecord::new();
        for idx in self.indices {
            cells.push_field(idx.and_then(|i| row.get(i)).unwrap_or_default());
        }
        cells
    }
}

/// Rain is written as an integer, but spreadsheet round trips can turn it
/// into `40.0`; accept integral floats in range.
fn parse_rain_cell(s: &str) -> Option<u8> {
    if let Ok(v) = s.parse::<u8>() {
        return (v <= 100).then_some(v);
    }
    let v = s.parse::<f64>().ok()?;
    if v.fract() == 0.0 && (0.0..=100.0).contains(&v) {
        Some(v as u8)
    } else {
        None
    }
}

fn entry_cells(e: &LedgerEntry) -> [String; 6] {
    [
        e.session.to_string(),
        e.city.clone(),
        e.water_level.map(|v| v.to_string()).unwrap_or_default(),
        e.rain_intensity.map(|v| v.to_string()).unwrap_or_default(),
        alert_token(e.civil_defense_alert).to_string(),
        e.risk.as_str().to_string(),
    ]
}

impl LedgerStore for CsvLedgerStore {
    fn load(&mut self) -> Result<Option<Vec<LedgerEntry>>, StoreError> {
        self.rows.clear();
        if !self.path.exists() {
            return Ok(None);
        }

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;

        let columns = ColumnMap::from_headers(rdr.byte_headers()?);
        if !columns.has_session() {
            warn!("{} has no 'session' column; not a ledger file", self.path.display());
            return Ok(None);
        }
        if let Some(column) = columns.missing_required() {
            return Err(StoreError::MissingColumn {
                column,
                location: self.path.display().to_string(),
            });
        }

        let mut rows = Vec::new();
        for record in rdr.byte_records() {
            rows.push(StoredRow::parse(columns.canonical_cells(&record?)));
        }

        let entries: Vec<LedgerEntry> = rows.iter().filter_map(|r| r.entry.clone()).collect();
        let unreadable = rows.len() - entries.len();
        if unreadable > 0 {
            warn!(
                "{} rows in {} could not be read; they are kept as stored",
                unreadable,
                self.path.display()
            );
        }
        info!("Read {} rows from {}", entries.len(), self.path.display());

        self.rows = rows;
        Ok(Some(entries))
    }

    /// Writes the full ledger to a sibling temporary file, then renames it
    /// over the target so a failed write never leaves a truncated ledger.
    fn persist(&mut self, entries: &[LedgerEntry]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let loaded: Vec<&LedgerEntry> = self.rows.iter().filter_map(|r| r.entry.as_ref()).collect();
        let extends_loaded = entries.len() >= loaded.len()
            && loaded.iter().zip(entries).all(|(stored, e)| *stored == e);

        let (kept, fresh): (&[StoredRow], &[LedgerEntry]) = if extends_loaded {
            (self.rows.as_slice(), &entries[loaded.len()..])
        } else {
            let dropped = self.rows.len() - loaded.len();
            if dropped > 0 {
                warn!(
                    "Replacing {} with a different ledger; {} unreadable rows are not carried over",
                    self.path.display(),
                    dropped
                );
            }
            (&[][..], entries)
        };

        let tmp = self.temp_path();
        let mut wtr = WriterBuilder::new().has_headers(false).from_path(&tmp)?;
        wtr.write_record(LEDGER_COLUMNS)?;
        for row in kept {
            wtr.write_byte_record(&row.cells)?;
        }
        for e in fresh {
            wtr.write_record(entry_cells(e))?;
        }

        let file = wtr.into_inner().map_err(|e| StoreError::Io(e.into_error()))?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn unreadable_max_session(&self) -> Option<u32> {
        self.rows
            .iter()
            .filter(|r| r.entry.is_none())
            .filter_map(|r| r.session)
            .max()
    }
}
