/// River level trend modeling over a fixed day domain.
///
/// One capability, three interchangeable strategies:
///
/// | Strategy                 | Curve                                                        |
/// |--------------------------|--------------------------------------------------------------|
/// | `FixedFormulaDirect`     | `f(x) = -0.05x² + 0.7x + 0.2` at each supplied day           |
/// | `FixedFormulaNormalized` | as above, rescaled so the maximum equals the ceiling         |
/// | `LeastSquaresFit`        | polynomial fitted to observed levels, sampled on a dense grid |
///
/// Every strategy then goes through the same post-processing: first-argmax
/// peak, points strictly above the breach threshold (ascending x), and the
/// (min, max) range of the evaluated curve.
///
/// x is always a day index inside the model's `DayDomain` (1..=10 by
/// default). Degenerate input (empty series, non-positive maximum when
/// normalizing, too few points for the requested degree) never fails; the
/// result carries a `Degeneracy` flag describing the fallback taken.

use serde::Deserialize;
use thiserror::Error;

use crate::analysis::polynomial::{fit_least_squares, Polynomial};

pub const DEFAULT_BREACH_THRESHOLD_M: f64 = 2.0;
pub const DEFAULT_NORMALIZATION_CEILING_M: f64 = 3.0;
pub const DEFAULT_FIT_DEGREE: usize = 3;
pub const DEFAULT_GRID_POINTS: usize = 100;

/// Coefficients of the fixed river level formula, ascending powers.
pub const RIVER_LEVEL_FORMULA: [f64; 3] = [0.2, 0.7, -0.05];

/// The fixed formula as a polynomial.
pub fn river_level_formula() -> Polynomial {
    Polynomial::new(RIVER_LEVEL_FORMULA.to_vec())
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrendError {
    #[error("day {day} is outside the model domain {first}..={last}")]
    DayOutOfDomain { day: i32, first: i32, last: i32 },
    #[error("day {0} appears more than once in the series")]
    DuplicateDay(i32),
    #[error("level for day {0} is not a finite number")]
    NonFiniteLevel(i32),
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// Inclusive range of day indices the model works over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DayDomain {
    pub first_day: i32,
    pub last_day: i32,
}

impl Default for DayDomain {
    fn default() -> Self {
        Self { first_day: 1, last_day: 10 }
    }
}

impl DayDomain {
    pub fn contains(&self, day: i32) -> bool {
        (self.first_day..=self.last_day).contains(&day)
    }
}

/// One day of a series. `level` is the observed river level, if any; the
/// fixed-formula strategies only look at `day`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendPoint {
    pub day: i32,
    pub level: Option<f64>,
}

/// Day-indexed series, sorted by day, days unique and inside the domain.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSeries {
    points: Vec<TrendPoint>,
}

impl TrendSeries {
    /// Series of observed (day, level) pairs, as used by `LeastSquaresFit`.
    pub fn observed(points: &[(i32, f64)], domain: &DayDomain) -> Result<Self, TrendError> {
        Self::build(
            points
                .iter()
                .map(|&(day, level)| TrendPoint { day, level: Some(level) })
                .collect(),
            domain,
        )
    }

    /// Series of bare days, as used by the fixed-formula strategies.
    pub fn days(days: &[i32], domain: &DayDomain) -> Result<Self, TrendError> {
        Self::build(
            days.iter().map(|&day| TrendPoint { day, level: None }).collect(),
            domain,
        )
    }

    pub fn from_points(points: Vec<TrendPoint>, domain: &DayDomain) -> Result<Self, TrendError> {
        Self::build(points, domain)
    }

    fn build(mut points: Vec<TrendPoint>, domain: &DayDomain) -> Result<Self, TrendError> {
        for p in &points {
            if !domain.contains(p.day) {
                return Err(TrendError::DayOutOfDomain {
                    day: p.day,
                    first: domain.first_day,
                    last: domain.last_day,
                });
            }
            if matches!(p.level, Some(level) if !level.is_finite()) {
                return Err(TrendError::NonFiniteLevel(p.day));
            }
        }

        points.sort_by_key(|p| p.day);
        if let Some(pair) = points.windows(2).find(|w| w[0].day == w[1].day) {
            return Err(TrendError::DuplicateDay(pair[0].day));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[TrendPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Strategy and result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrendStrategy {
    FixedFormulaDirect,
    FixedFormulaNormalized { ceiling: f64 },
    LeastSquaresFit { degree: usize, grid_points: usize },
}

impl TrendStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            TrendStrategy::FixedFormulaDirect => "fixed formula",
            TrendStrategy::FixedFormulaNormalized { .. } => "normalized fixed formula",
            TrendStrategy::LeastSquaresFit { .. } => "least-squares fit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub x: f64,
    pub y: f64,
}

/// Fallback taken for input the strategy could not handle normally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Degeneracy {
    /// Nothing to evaluate; curve, peak and range are empty.
    EmptySeries,
    /// Normalization skipped because the maximum was not positive; the
    /// curve holds the raw formula values.
    NonPositiveMaximum { max: f64 },
    /// Fewer observed points than `requested + 1`; fitted at `used` instead.
    ReducedDegree { requested: usize, used: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendResult {
    pub strategy: TrendStrategy,
    /// Evaluated curve, ascending x.
    pub curve: Vec<CurvePoint>,
    /// First point with the maximum y.
    pub peak: Option<CurvePoint>,
    /// Points with y strictly above the threshold, ascending x.
    pub breaches: Vec<CurvePoint>,
    pub breach_threshold: f64,
    /// (min y, max y) over the curve.
    pub y_range: Option<(f64, f64)>,
    /// Polynomial behind the curve, power basis in x, ascending. For the
    /// normalized strategy this is the raw formula before rescaling.
    pub coefficients: Vec<f64>,
    pub degeneracy: Option<Degeneracy>,
}

impl TrendResult {
    pub fn breach_days(&self) -> Vec<f64> {
        self.breaches.iter().map(|p| p.x).collect()
    }

    pub fn breach_levels(&self) -> Vec<f64> {
        self.breaches.iter().map(|p| p.y).collect()
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendModel {
    pub strategy: TrendStrategy,
    pub breach_threshold: f64,
    pub domain: DayDomain,
}

impl Default for TrendModel {
    fn default() -> Self {
        Self::new(TrendStrategy::LeastSquaresFit {
            degree: DEFAULT_FIT_DEGREE,
            grid_points: DEFAULT_GRID_POINTS,
        })
    }
}

impl TrendModel {
    /// Model with the default threshold (2.0) and domain (1..=10).
    pub fn new(strategy: TrendStrategy) -> Self {
        Self {
            strategy,
            breach_threshold: DEFAULT_BREACH_THRESHOLD_M,
            domain: DayDomain::default(),
        }
    }

    pub fn with_threshold(mut self, breach_threshold: f64) -> Self {
        self.breach_threshold = breach_threshold;
        self
    }

    pub fn with_domain(mut self, domain: DayDomain) -> Self {
        self.domain = domain;
        self
    }

    pub fn evaluate(&self, series: &TrendSeries) -> TrendResult {
        let (curve, coefficients, degeneracy) = match self.strategy {
            TrendStrategy::FixedFormulaDirect => {
                let (curve, coefficients) = fixed_formula_curve(series);
                (curve, coefficients, None)
            }
            TrendStrategy::FixedFormulaNormalized { ceiling } => {
                let (curve, coefficients) = fixed_formula_curve(series);
                let (curve, degeneracy) = normalize(curve, ceiling);
                (curve, coefficients, degeneracy)
            }
            TrendStrategy::LeastSquaresFit { degree, grid_points } => {
                self.least_squares_curve(series, degree, grid_points)
            }
        };

        let degeneracy = if curve.is_empty() {
            Some(Degeneracy::EmptySeries)
        } else {
            degeneracy
        };

        TrendResult {
            strategy: self.strategy,
            peak: find_peak(&curve),
            breaches: find_breaches(&curve, self.breach_threshold),
            breach_threshold: self.breach_threshold,
            y_range: y_range(&curve),
            curve,
            coefficients,
            degeneracy,
        }
    }

    fn least_squares_curve(
        &self,
        series: &TrendSeries,
        degree: usize,
        grid_points: usize,
    ) -> (Vec<CurvePoint>, Vec<f64>, Option<Degeneracy>) {
        let (xs, ys): (Vec<f64>, Vec<f64>) = series
            .points()
            .iter()
            .filter_map(|p| p.level.map(|level| (f64::from(p.day), level)))
            .unzip();

        if xs.is_empty() {
            return (Vec::new(), Vec::new(), Some(Degeneracy::EmptySeries));
        }

        // Days are unique, so every point is a distinct x.
        let used = degree.min(xs.len() - 1);
        let degeneracy = (used < degree).then_some(Degeneracy::ReducedDegree {
            requested: degree,
            used,
        });

        let Some(fitted) = fit_least_squares(&xs, &ys, used) else {
            return (Vec::new(), Vec::new(), Some(Degeneracy::EmptySeries));
        };

        let curve = dense_grid(&self.domain, grid_points)
            .into_iter()
            .map(|x| CurvePoint { x, y: fitted.eval(x) })
            .collect();
        let coefficients = fitted.to_power_basis().coefficients().to_vec();
        (curve, coefficients, degeneracy)
    }
}

// ---------------------------------------------------------------------------
// Evaluation helpers
// ---------------------------------------------------------------------------

fn fixed_formula_curve(series: &TrendSeries) -> (Vec<CurvePoint>, Vec<f64>) {
    let formula = river_level_formula();
    let curve = series
        .points()
        .iter()
        .map(|p| {
            let x = f64::from(p.day);
            CurvePoint { x, y: formula.eval(x) }
        })
        .collect();
    (curve, formula.coefficients().to_vec())
}

/// Rescales so the maximum maps to `ceiling`. A non-positive maximum leaves
/// the values untouched and is reported.
fn normalize(curve: Vec<CurvePoint>, ceiling: f64) -> (Vec<CurvePoint>, Option<Degeneracy>) {
    let Some(max) = curve.iter().map(|p| p.y).reduce(f64::max) else {
        return (curve, None);
    };
    if max <= 0.0 {
        return (curve, Some(Degeneracy::NonPositiveMaximum { max }));
    }

    let scaled = curve
        .into_iter()
        .map(|p| CurvePoint { x: p.x, y: p.y / max * ceiling })
        .collect();
    (scaled, None)
}

/// `points` evenly spaced x values from the first to the last day inclusive.
fn dense_grid(domain: &DayDomain, points: usize) -> Vec<f64> {
    let first = f64::from(domain.first_day);
    let last = f64::from(domain.last_day);
    if points < 2 {
        return vec![first];
    }
    let steps = (points - 1) as f64;
    (0..points)
        .map(|i| first + (last - first) * i as f64 / steps)
        .collect()
}

fn find_peak(curve: &[CurvePoint]) -> Option<CurvePoint> {
    let mut iter = curve.iter().copied();
    let first = iter.next()?;
    Some(iter.fold(first, |best, p| if p.y > best.y { p } else { best }))
}

fn find_breaches(curve: &[CurvePoint], threshold: f64) -> Vec<CurvePoint> {
    curve.iter().copied().filter(|p| p.y > threshold).collect()
}

fn y_range(curve: &[CurvePoint]) -> Option<(f64, f64)> {
    let first = curve.first()?.y;
    Some(
        curve
            .iter()
            .fold((first, first), |(lo, hi), p| (lo.min(p.y), hi.max(p.y))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> DayDomain {
        DayDomain::default()
    }

    fn all_days() -> TrendSeries {
        TrendSeries::days(&(1..=10).collect::<Vec<_>>(), &domain()).unwrap()
    }

    /// Builds a curve directly, bypassing the strategies.
    fn curve(points: &[(f64, f64)]) -> Vec<CurvePoint> {
        points.iter().map(|&(x, y)| CurvePoint { x, y }).collect()
    }

    // --- Series construction -----------------------------------------------

    #[test]
    fn test_series_sorts_by_day() {
        let series = TrendSeries::observed(&[(3, 1.0), (1, 0.5), (2, 0.7)], &domain()).unwrap();
        let days: Vec<i32> = series.points().iter().map(|p| p.day).collect();
        assert_eq!(days, vec![1, 2, 3]);
    }

    #[test]
    fn test_series_rejects_bad_input() {
        assert_eq!(
            TrendSeries::days(&[0, 4], &domain()),
            Err(TrendError::DayOutOfDomain { day: 0, first: 1, last: 10 })
        );
        assert_eq!(
            TrendSeries::days(&[4, 2, 4], &domain()),
            Err(TrendError::DuplicateDay(4))
        );
        assert_eq!(
            TrendSeries::observed(&[(2, f64::NAN)], &domain()),
            Err(TrendError::NonFiniteLevel(2))
        );
    }

    // --- Fixed formula -----------------------------------------------------

    #[test]
    fn test_fixed_formula_direct_peaks_at_day_seven() {
        let result = TrendModel::new(TrendStrategy::FixedFormulaDirect).evaluate(&all_days());

        assert_eq!(result.curve.len(), 10);
        let peak = result.peak.unwrap();
        assert_eq!(peak.x, 7.0);
        assert!((peak.y - 2.65).abs() < 1e-12);

        // f(x) > 2 for days 4..=10 (f(4) = 2.2, f(3) = 1.85).
        assert_eq!(result.breach_days(), vec![4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);

        let (lo, hi) = result.y_range.unwrap();
        assert!((lo - 0.85).abs() < 1e-12);
        assert!((hi - 2.65).abs() < 1e-12);
        assert_eq!(result.coefficients, RIVER_LEVEL_FORMULA.to_vec());
        assert!(result.degeneracy.is_none());
    }

    #[test]
    fn test_fixed_formula_ignores_observed_levels() {
        let series = TrendSeries::observed(&[(2, 99.0), (5, -4.0)], &domain()).unwrap();
        let result = TrendModel::new(TrendStrategy::FixedFormulaDirect).evaluate(&series);
        assert!((result.curve[0].y - 1.4).abs() < 1e-12);
        assert!((result.curve[1].y - 2.45).abs() < 1e-12);
    }

    #[test]
    fn test_normalized_maximum_equals_ceiling() {
        let model = TrendModel::new(TrendStrategy::FixedFormulaNormalized { ceiling: 3.0 });
        let result = model.evaluate(&all_days());

        let (_, hi) = result.y_range.unwrap();
        assert!((hi - 3.0).abs() < 1e-12);
        assert_eq!(result.peak.unwrap().x, 7.0);
        assert!(result.degeneracy.is_none());
    }

    #[test]
    fn test_normalize_all_zero_returns_raw_values_with_flag() {
        let raw = curve(&[(1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]);
        let (out, degeneracy) = normalize(raw.clone(), 3.0);
        assert_eq!(out, raw);
        assert_eq!(degeneracy, Some(Degeneracy::NonPositiveMaximum { max: 0.0 }));
    }

    #[test]
    fn test_normalize_positive_maximum() {
        let (out, degeneracy) = normalize(curve(&[(1.0, 0.5), (2.0, 2.0), (3.0, 1.0)]), 2.0);
        assert_eq!(degeneracy, None);
        let ys: Vec<f64> = out.iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![0.5, 2.0, 1.0]);
    }

    // --- Least squares -----------------------------------------------------

    #[test]
    fn test_least_squares_recovers_known_cubic() {
        let truth = Polynomial::new(vec![0.3, 1.1, -0.2, 0.01]);
        let points: Vec<(i32, f64)> = (1..=10).map(|d| (d, truth.eval(f64::from(d)))).collect();
        let series = TrendSeries::observed(&points, &domain()).unwrap();

        let result = TrendModel::default().evaluate(&series);
        assert_eq!(result.curve.len(), DEFAULT_GRID_POINTS);
        assert_eq!(result.curve.first().unwrap().x, 1.0);
        assert_eq!(result.curve.last().unwrap().x, 10.0);

        for p in &result.curve {
            assert!((p.y - truth.eval(p.x)).abs() < 1e-6, "mismatch at x = {}", p.x);
        }
        let fitted = Polynomial::new(result.coefficients.clone());
        for d in 1..=10 {
            let x = f64::from(d);
            assert!((fitted.eval(x) - truth.eval(x)).abs() < 1e-6);
        }
        assert!(result.degeneracy.is_none());
    }

    #[test]
    fn test_least_squares_with_two_points_reduces_degree() {
        let series = TrendSeries::observed(&[(1, 1.0), (10, 2.8)], &domain()).unwrap();
        let result = TrendModel::default().evaluate(&series);

        assert_eq!(
            result.degeneracy,
            Some(Degeneracy::ReducedDegree { requested: 3, used: 1 })
        );
        let peak = result.peak.unwrap();
        assert_eq!(peak.x, 10.0);
        assert!((peak.y - 2.8).abs() < 1e-9);
    }

    #[test]
    fn test_least_squares_single_point_is_flat() {
        let series = TrendSeries::observed(&[(5, 1.2)], &domain()).unwrap();
        let result = TrendModel::default().evaluate(&series);
        assert!(result.curve.iter().all(|p| (p.y - 1.2).abs() < 1e-12));
        // Flat curve: the first grid point is the peak.
        assert_eq!(result.peak.unwrap().x, 1.0);
        assert!(result.breaches.is_empty());
    }

    #[test]
    fn test_least_squares_without_levels_is_empty() {
        let result = TrendModel::default().evaluate(&all_days());
        assert!(result.curve.is_empty());
        assert_eq!(result.degeneracy, Some(Degeneracy::EmptySeries));
    }

    // --- Post-processing ---------------------------------------------------

    #[test]
    fn test_peak_of_increasing_series_is_last_point() {
        let c = curve(&[(1.0, 0.1), (2.0, 0.4), (3.0, 0.9), (4.0, 1.6)]);
        assert_eq!(find_peak(&c), Some(CurvePoint { x: 4.0, y: 1.6 }));
    }

    #[test]
    fn test_peak_ties_keep_first_occurrence() {
        let c = curve(&[(1.0, 2.0), (2.0, 3.0), (3.0, 3.0)]);
        assert_eq!(find_peak(&c).unwrap().x, 2.0);
    }

    #[test]
    fn test_breaches_above_threshold() {
        let c = curve(&[(1.0, 1.0), (2.0, 2.5), (3.0, 1.8), (4.0, 3.0)]);
        let breaches = find_breaches(&c, 2.0);
        let days: Vec<f64> = breaches.iter().map(|p| p.x).collect();
        let levels: Vec<f64> = breaches.iter().map(|p| p.y).collect();
        assert_eq!(days, vec![2.0, 4.0]);
        assert_eq!(levels, vec![2.5, 3.0]);
    }

    #[test]
    fn test_breach_threshold_is_strict() {
        let c = curve(&[(1.0, 2.0), (2.0, 2.0000001)]);
        assert_eq!(find_breaches(&c, 2.0).len(), 1);
    }

    #[test]
    fn test_empty_series_degrades_without_panicking() {
        let empty = TrendSeries::days(&[], &domain()).unwrap();
        for strategy in [
            TrendStrategy::FixedFormulaDirect,
            TrendStrategy::FixedFormulaNormalized { ceiling: 3.0 },
            TrendStrategy::LeastSquaresFit { degree: 3, grid_points: 100 },
        ] {
            let result = TrendModel::new(strategy).evaluate(&empty);
            assert!(result.curve.is_empty());
            assert!(result.peak.is_none());
            assert!(result.y_range.is_none());
            assert!(result.breaches.is_empty());
            assert_eq!(result.degeneracy, Some(Degeneracy::EmptySeries));
        }
    }

    #[test]
    fn test_single_day_is_its_own_peak() {
        let series = TrendSeries::days(&[3], &domain()).unwrap();
        let result = TrendModel::new(TrendStrategy::FixedFormulaDirect).evaluate(&series);
        assert_eq!(result.peak, Some(result.curve[0]));
        assert_eq!(result.y_range, Some((result.curve[0].y, result.curve[0].y)));
    }

    #[test]
    fn test_dense_grid_spans_domain() {
        let grid = dense_grid(&DayDomain { first_day: 1, last_day: 10 }, 4);
        assert_eq!(grid, vec![1.0, 4.0, 7.0, 10.0]);
        assert_eq!(dense_grid(&domain(), 1), vec![1.0]);
    }
}
