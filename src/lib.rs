/// flood_ledger: manual flood-risk measurement ledger and river level trend analysis.
///
/// # Module structure
///
/// ```text
/// flood_ledger
/// ├── model       — shared data types (Measurement, RiskLevel, LedgerEntry, …)
/// ├── config      — flood_ledger.toml loader (ledger backend, risk, trend settings)
/// ├── db          — PostgreSQL connection validation for the postgres backend
/// ├── ingest
/// │   └── input   — raw text tokens → validated Measurement
/// ├── alert
/// │   └── risk    — water level / rain / civil-defense risk classification
/// ├── ledger      — append-only ledger with per-run session numbering
/// │   ├── store     — LedgerStore port + in-memory store
/// │   ├── csv_store — CSV file backend (historico.csv)
/// │   └── pg_store  — PostgreSQL backend
/// ├── analysis
/// │   ├── statistics — counts, per-session means, city rankings
/// │   ├── polynomial — evaluation and least-squares fitting
/// │   └── trend      — trend strategies, peak and breach detection
/// └── report      — plain-text rendering of measurements, statistics, trends
/// ```

/// Public modules
pub mod alert;
pub mod analysis;
pub mod config;
pub mod db;
pub mod ingest;
pub mod ledger;
pub mod model;
pub mod report;
