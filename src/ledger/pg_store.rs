/// PostgreSQL backend for the ledger.
///
/// Entries live in `flood_ledger.entries` (see `sql/001_flood_ledger.sql`),
/// ordered by `position`. A persist that extends what was last loaded only
/// inserts the new rows, so stored rows are never rewritten, including rows
/// `load` had to skip. Any other persist replaces the table. Both happen
/// inside a single transaction, so readers see either the old ledger or the
/// new one.
///
/// Connection setup and schema checks go through `crate::db`, which reads
/// `DATABASE_URL` from the environment or `.env`.

use log::warn;
use postgres::Client;

use crate::db::{self, DbConfigError};
use crate::ledger::store::{LedgerStore, StoreError};
use crate::model::{LedgerEntry, RiskLevel};

/// Schema holding the ledger table.
pub const LEDGER_SCHEMA: &str = "flood_ledger";

pub struct PgLedgerStore {
    client: Client,
    /// Entries as of the last `load` or `persist`.
    loaded: Vec<LedgerEntry>,
    unreadable_max_session: Option<u32>,
}

impl PgLedgerStore {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            loaded: Vec::new(),
            unreadable_max_session: None,
        }
    }

    /// Connects via `DATABASE_URL` and verifies the ledger schema exists.
    pub fn connect() -> Result<Self, DbConfigError> {
        let client = db::connect_and_verify(&[LEDGER_SCHEMA])?;
        Ok(Self::new(client))
    }
}

impl LedgerStore for PgLedgerStore {
    fn load(&mut self) -> Result<Option<Vec<LedgerEntry>>, StoreError> {
        self.loaded.clear();
        self.unreadable_max_session = None;

        let rows = self.client.query(
            "SELECT session, city, water_level, rain_intensity, civil_defense_alert, risk \
             FROM flood_ledger.entries \
             ORDER BY position",
            &[],
        )?;

        let mut entries = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for row in rows {
            let session = u32::try_from(row.get::<_, i64>(0)).ok().filter(|s| *s >= 1);
            let risk = row.get::<_, String>(5).parse::<RiskLevel>();

            let (Some(session), Ok(risk)) = (session, risk) else {
                skipped += 1;
                self.unreadable_max_session = self.unreadable_max_session.max(session);
                continue;
            };

            let rain: Option<i32> = row.get(3);
            entries.push(LedgerEntry {
                session,
                city: row.get(1),
                water_level: row.get::<_, Option<f64>>(2).filter(|v| v.is_finite()),
                rain_intensity: rain.and_then(|r| u8::try_from(r).ok()).filter(|r| *r <= 100),
                civil_defense_alert: row.get(4),
                risk,
            });
        }

        if skipped > 0 {
            warn!(
                "{} rows in flood_ledger.entries could not be read; they are kept as stored",
                skipped
            );
        }
        self.loaded = entries.clone();
        Ok(Some(entries))
    }

    fn persist(&mut self, entries: &[LedgerEntry]) -> Result<(), StoreError> {
        let extends_loaded = entries.starts_with(&self.loaded);
        let mut tx = self.client.transaction()?;

        let (fresh, first_position) = if extends_loaded {
            let row = tx.query_one(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM flood_ledger.entries",
                &[],
            )?;
            (&entries[self.loaded.len()..], row.get::<_, i64>(0))
        } else {
            warn!("Replacing every row in flood_ledger.entries");
            tx.execute("DELETE FROM flood_ledger.entries", &[])?;
            (entries, 0)
        };

        let insert = tx.prepare(
            "INSERT INTO flood_ledger.entries \
             (position, session, city, water_level, rain_intensity, civil_defense_alert, risk) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )?;

        for (offset, e) in fresh.iter().enumerate() {
            let position = first_position + offset as i64;
            let session = i64::from(e.session);
            let rain = e.rain_intensity.map(i32::from);
            tx.execute(
                &insert,
                &[
                    &position,
                    &session,
                    &e.city,
                    &e.water_level,
                    &rain,
                    &e.civil_defense_alert,
                    &e.risk.as_str(),
                ],
            )?;
        }

        tx.commit()?;
        self.loaded = entries.to_vec();
        Ok(())
    }

    fn describe(&self) -> String {
        "postgres:flood_ledger.entries".to_string()
    }

    fn unreadable_max_session(&self) -> Option<u32> {
        self.unreadable_max_session
    }
}
