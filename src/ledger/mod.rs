/// Append-only measurement ledger with per-run session numbering.
///
/// # Sessions
///
/// Every call to `MeasurementLedger::append` writes one batch, and every
/// entry in that batch shares one session id: the highest session already in
/// the ledger plus one, or 1 for an empty ledger. Entries are never mutated
/// or removed; appending the same batch twice records it twice.
///
/// # Persistence
///
/// The ledger does not touch files directly. It is handed a `LedgerStore`
/// (CSV file, PostgreSQL table, or in-memory) and goes through it for every
/// load and persist. For reading, a store that cannot be read is treated as
/// "no history": the failure is logged and an empty ledger is used. `append`
/// is stricter: it refuses to write over a store it could not read, since
/// that would replace history it never saw. A store that cannot be written
/// is an error returned to the caller, since the batch would be lost.
///
/// Rows a store keeps but cannot turn into entries are never dropped by an
/// append, and their session ids are never reused.
///
/// # Concurrency
///
/// `append` is a read-modify-write (load → next session → persist) and is
/// not atomic. Two processes appending to the same store at once can pick
/// the same session id or overwrite each other's rows. Callers that may run
/// concurrently must serialize the whole `append` call themselves, for
/// example behind an advisory file lock or a database lock.

pub mod csv_store;
pub mod pg_store;
pub mod store;

use std::collections::BTreeSet;

use log::{info, warn};
use thiserror::Error;

use crate::alert::risk::{classify_with, RiskThresholds};
use crate::model::{LedgerEntry, Measurement, RiskLevel};

pub use csv_store::CsvLedgerStore;
pub use pg_store::PgLedgerStore;
pub use store::{LedgerStore, MemoryLedgerStore, StoreError};

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The existing ledger could not be read, so nothing was written.
    #[error("refusing to append: could not read existing ledger at {store}: {source}")]
    Read {
        store: String,
        #[source]
        source: StoreError,
    },
    /// The updated ledger could not be written. The batch is not recorded.
    #[error("failed to write ledger to {store}: {source}")]
    Write {
        store: String,
        #[source]
        source: StoreError,
    },
    #[error("session counter exhausted (highest session is {0})")]
    SessionOverflow(u32),
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Ordered sequence of ledger entries, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<LedgerEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<LedgerEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_session(&self) -> Option<u32> {
        self.entries.iter().map(|e| e.session).max()
    }

    /// Session id following this ledger's entries. `None` only if the
    /// counter would overflow.
    pub fn next_session(&self) -> Option<u32> {
        session_after(self.max_session())
    }

    /// Distinct session ids, ascending.
    pub fn sessions(&self) -> Vec<u32> {
        self.entries
            .iter()
            .map(|e| e.session)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn session_entries(&self, session: u32) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().filter(move |e| e.session == session)
    }
}

fn session_after(highest: Option<u32>) -> Option<u32> {
    match highest {
        Some(max) => max.checked_add(1),
        None => Some(1),
    }
}

// ---------------------------------------------------------------------------
// MeasurementLedger
// ---------------------------------------------------------------------------

/// Ledger operations bound to a storage backend.
pub struct MeasurementLedger<S: LedgerStore> {
    store: S,
    thresholds: RiskThresholds,
}

impl<S: LedgerStore> MeasurementLedger<S> {
    /// Ledger using the canonical risk thresholds for `append_measurements`.
    pub fn new(store: S) -> Self {
        Self::with_thresholds(store, RiskThresholds::default())
    }

    pub fn with_thresholds(store: S, thresholds: RiskThresholds) -> Self {
        Self { store, thresholds }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reads the persisted ledger. Never fails: a missing, unrecognised or
    /// unreadable store yields an empty ledger.
    pub fn load(&mut self) -> Ledger {
        match self.read() {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!(
                    "Could not read ledger from {} ({}); treating as no history",
                    self.store.describe(),
                    e
                );
                Ledger::new()
            }
        }
    }

    fn read(&mut self) -> Result<Ledger, StoreError> {
        match self.store.load()? {
            Some(entries) => {
                info!("Loaded {} ledger entries from {}", entries.len(), self.store.describe());
                Ok(Ledger::from_entries(entries))
            }
            None => {
                info!("No existing ledger at {}; starting empty", self.store.describe());
                Ok(Ledger::new())
            }
        }
    }

    /// Appends one batch as a new session and persists the result.
    ///
    /// Not idempotent: the same batch appended twice is recorded twice under
    /// two sessions. An empty batch leaves the store untouched and does not
    /// consume a session id. Fails with `LedgerError::Read` without writing
    /// if the existing ledger cannot be read.
    ///
    /// Not safe against concurrent writers to the same store; see the module
    /// documentation.
    pub fn append(&mut self, batch: &[(Measurement, RiskLevel)]) -> Result<Ledger, LedgerError> {
        let current = self.read().map_err(|source| LedgerError::Read {
            store: self.store.describe(),
            source,
        })?;
        if batch.is_empty() {
            return Ok(current);
        }

        let highest = current.max_session().max(self.store.unreadable_max_session());
        let session = session_after(highest)
            .ok_or(LedgerError::SessionOverflow(highest.unwrap_or(u32::MAX)))?;

        let mut entries = current.into_entries();
        entries.extend(
            batch
                .iter()
                .map(|(measurement, risk)| LedgerEntry::new(session, measurement, *risk)),
        );

        self.store
            .persist(&entries)
            .map_err(|source| LedgerError::Write {
                store: self.store.describe(),
                source,
            })?;

        info!(
            "Recorded session {} ({} measurements, {} total) to {}",
            session,
            batch.len(),
            entries.len(),
            self.store.describe()
        );
        Ok(Ledger::from_entries(entries))
    }

    /// Classifies each measurement with this ledger's thresholds, then appends
    /// them as one session.
    pub fn append_measurements(&mut self, measurements: &[Measurement]) -> Result<Ledger, LedgerError> {
        let batch: Vec<(Measurement, RiskLevel)> = measurements
            .iter()
            .map(|m| (m.clone(), classify_with(m, &self.thresholds)))
            .collect();
        self.append(&batch)
    }
}
