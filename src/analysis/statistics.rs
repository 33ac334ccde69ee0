/// Read-only statistics over a loaded ledger.
///
/// All functions are folds over `Ledger::entries()`; none of them touch the
/// store. Maps keyed by session or risk level are `BTreeMap`s so reports list
/// them in ascending order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::ledger::Ledger;
use crate::model::{LedgerEntry, RiskLevel};

/// A city and how many entries matched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityCount {
    pub city: String,
    pub count: usize,
}

pub fn total_sessions(ledger: &Ledger) -> usize {
    ledger.sessions().len()
}

pub fn total_measurements(ledger: &Ledger) -> usize {
    ledger.len()
}

/// Entries per risk level across the whole ledger. Levels that never occur
/// are absent.
pub fn count_by_risk(ledger: &Ledger) -> BTreeMap<RiskLevel, usize> {
    let mut counts = BTreeMap::new();
    for e in ledger.entries() {
        *counts.entry(e.risk).or_insert(0) += 1;
    }
    counts
}

/// Entries per (session, risk level).
///
/// Every risk level that appears anywhere in the ledger is present in every
/// session's map, with 0 where that session has none.
pub fn count_by_risk_per_session(ledger: &Ledger) -> BTreeMap<u32, BTreeMap<RiskLevel, usize>> {
    let levels: BTreeSet<RiskLevel> = ledger.entries().iter().map(|e| e.risk).collect();

    let mut table: BTreeMap<u32, BTreeMap<RiskLevel, usize>> = BTreeMap::new();
    for e in ledger.entries() {
        let row = table
            .entry(e.session)
            .or_insert_with(|| levels.iter().map(|&level| (level, 0)).collect());
        *row.entry(e.risk).or_insert(0) += 1;
    }
    table
}

/// Mean water level per session over readable values. A session whose
/// values are all unreadable maps to `None`.
pub fn mean_water_level_per_session(ledger: &Ledger) -> BTreeMap<u32, Option<f64>> {
    mean_per_session(ledger, |e| e.water_level)
}

/// Mean rain intensity per session over readable values.
pub fn mean_rain_per_session(ledger: &Ledger) -> BTreeMap<u32, Option<f64>> {
    mean_per_session(ledger, |e| e.rain_intensity.map(f64::from))
}

fn mean_per_session<F>(ledger: &Ledger, value: F) -> BTreeMap<u32, Option<f64>>
where
    F: Fn(&LedgerEntry) -> Option<f64>,
{
    let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for e in ledger.entries() {
        let slot = sums.entry(e.session).or_insert((0.0, 0));
        if let Some(v) = value(e) {
            slot.0 += v;
            slot.1 += 1;
        }
    }

    sums.into_iter()
        .map(|(session, (sum, n))| (session, (n > 0).then(|| sum / n as f64)))
        .collect()
}

/// Cities by number of entries, most frequent first. Ties keep the order in
/// which the cities first appear in the ledger.
pub fn top_cities_by_frequency(ledger: &Ledger) -> Vec<CityCount> {
    rank_cities(ledger, |_| true)
}

/// Cities by number of High entries, most first. Ties keep the order in
/// which the cities first appear in the ledger, counting entries of any
/// risk level. Cities without any High entry are not listed.
pub fn top_cities_by_high_risk_count(ledger: &Ledger) -> Vec<CityCount> {
    rank_cities(ledger, |e| e.risk == RiskLevel::High)
}

/// Counts entries matching `counts` per city, ranked by count with ties in
/// first-appearance order over the whole ledger. Cities with a zero count
/// are dropped.
fn rank_cities<F>(ledger: &Ledger, counts: F) -> Vec<CityCount>
where
    F: Fn(&LedgerEntry) -> bool,
{
    let mut ranking: Vec<CityCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for e in ledger.entries() {
        let slot = *index.entry(e.city.as_str()).or_insert_with(|| {
            ranking.push(CityCount {
                city: e.city.clone(),
                count: 0,
            });
            ranking.len() - 1
        });
        if counts(e) {
            ranking[slot].count += 1;
        }
    }

    ranking.retain(|c| c.count > 0);
    // Stable sort keeps first-appearance order among equal counts.
    ranking.sort_by(|a, b| b.count.cmp(&a.count));
    ranking
}

// ---------------------------------------------------------------------------
// Bundled statistics
// ---------------------------------------------------------------------------

/// Everything the statistics report shows, computed in one pass per figure.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerStatistics {
    pub total_sessions: usize,
    pub total_measurements: usize,
    pub risk_counts: BTreeMap<RiskLevel, usize>,
    pub risk_counts_per_session: BTreeMap<u32, BTreeMap<RiskLevel, usize>>,
    pub mean_water_level_per_session: BTreeMap<u32, Option<f64>>,
    pub mean_rain_per_session: BTreeMap<u32, Option<f64>>,
    pub top_cities: Vec<CityCount>,
    pub top_high_risk_cities: Vec<CityCount>,
}

impl LedgerStatistics {
    pub fn from_ledger(ledger: &Ledger) -> Self {
        Self {
            total_sessions: total_sessions(ledger),
            total_measurements: total_measurements(ledger),
            risk_counts: count_by_risk(ledger),
            risk_counts_per_session: count_by_risk_per_session(ledger),
            mean_water_level_per_session: mean_water_level_per_session(ledger),
            mean_rain_per_session: mean_rain_per_session(ledger),
            top_cities: top_cities_by_frequency(ledger),
            top_high_risk_cities: top_cities_by_high_risk_count(ledger),
        }
    }
}
