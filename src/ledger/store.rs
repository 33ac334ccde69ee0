/// Storage port for the ledger.
///
/// A store knows how to read the full ledger and how to replace it with an
/// updated one. Session numbering and append semantics live in
/// `MeasurementLedger`, not here.

use thiserror::Error;

use crate::model::LedgerEntry;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("database error: {0}")]
    Postgres(#[from] postgres::Error),
    /// The data has a session column but lacks another required one.
    #[error("{location} has no '{column}' column")]
    MissingColumn {
        column: &'static str,
        location: String,
    },
    #[error("{0}")]
    Unavailable(String),
}

pub trait LedgerStore {
    /// Reads all persisted entries in order.
    ///
    /// `Ok(None)` means there is no recognisable ledger (nothing stored yet,
    /// or stored data without a `session` column).
    fn load(&mut self) -> Result<Option<Vec<LedgerEntry>>, StoreError>;

    /// Replaces the persisted ledger with `entries`.
    ///
    /// When `entries` starts with everything the last `load` returned, the
    /// backend must leave the stored rows behind that prefix untouched,
    /// including rows `load` could not read, and only add the rest.
    fn persist(&mut self, entries: &[LedgerEntry]) -> Result<(), StoreError>;

    /// Human-readable location used in log lines and error messages.
    fn describe(&self) -> String;

    /// Highest session id held by stored rows that the last `load` could not
    /// turn into entries. Those rows stay in storage and keep their session
    /// id, so a new session must be numbered above it.
    fn unreadable_max_session(&self) -> Option<u32> {
        None
    }
}

/// Lets a backend chosen at runtime (`AppConfig::open_store`) drive a
/// `MeasurementLedger`.
impl<S: LedgerStore + ?Sized> LedgerStore for Box<S> {
    fn load(&mut self) -> Result<Option<Vec<LedgerEntry>>, StoreError> {
        (**self).load()
    }

    fn persist(&mut self, entries: &[LedgerEntry]) -> Result<(), StoreError> {
        (**self).persist(entries)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn unreadable_max_session(&self) -> Option<u32> {
        (**self).unreadable_max_session()
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Store that keeps the ledger in process memory. Used by tests and by
/// callers embedding the ledger without persistence. Read and write failures
/// can be injected.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    entries: Option<Vec<LedgerEntry>>,
    persist_count: usize,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<LedgerEntry>) -> Self {
        Self {
            entries: Some(entries),
            ..Self::default()
        }
    }

    pub fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Number of successful `persist` calls.
    pub fn persist_count(&self) -> usize {
        self.persist_count
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        self.entries.as_deref().unwrap_or(&[])
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load(&mut self) -> Result<Option<Vec<LedgerEntry>>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Unavailable("injected read failure".to_string()));
        }
        Ok(self.entries.clone())
    }

    fn persist(&mut self, entries: &[LedgerEntry]) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        self.entries = Some(entries.to_vec());
        self.persist_count += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory store".to_string()
    }
}
