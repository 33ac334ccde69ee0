/// Analysis over the ledger and over river level series.
///
/// Submodules:
/// - `statistics` — counts, per-session means, and city rankings over a `Ledger`.
/// - `polynomial` — polynomial evaluation and least-squares fitting.
/// - `trend`      — river level trend strategies, peak and breach detection.

pub mod polynomial;
pub mod statistics;
pub mod trend;
