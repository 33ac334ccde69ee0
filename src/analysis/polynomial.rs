/// Polynomial evaluation and least-squares fitting.
///
/// Fitting maps x onto [-1, 1] before building the Vandermonde matrix and
/// solves it with Householder QR rather than the normal equations. For day
/// indices 1..=10 and degree 3 that keeps the fitted values accurate to well
/// below 1e-9, where the normal equations would lose several digits.

use log::debug;

/// Polynomial in the power basis, coefficients ascending
/// (`c[0] + c[1]·x + c[2]·x² + …`).
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Degree of the highest stored coefficient (0 for an empty polynomial).
    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// Horner evaluation.
    pub fn eval(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * x + c)
    }

    /// Substitutes `x ↦ a·x + b`, returning the composed polynomial in x.
    fn compose_linear(&self, a: f64, b: f64) -> Polynomial {
        let mut result: Vec<f64> = Vec::with_capacity(self.coefficients.len());
        for &c in self.coefficients.iter().rev() {
            // result = result * (a·x + b) + c
            let mut next = vec![0.0; result.len() + 1];
            for (i, &r) in result.iter().enumerate() {
                next[i] += r * b;
                next[i + 1] += r * a;
            }
            next[0] += c;
            result = next;
        }
        Polynomial::new(result)
    }
}

/// A polynomial fitted on x mapped to `t = (x - center) / half_width`.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedPolynomial {
    scaled: Polynomial,
    center: f64,
    half_width: f64,
}

impl FittedPolynomial {
    pub fn eval(&self, x: f64) -> f64 {
        self.scaled.eval((x - self.center) / self.half_width)
    }

    /// The same polynomial expressed directly in x.
    pub fn to_power_basis(&self) -> Polynomial {
        let a = 1.0 / self.half_width;
        self.scaled.compose_linear(a, -self.center * a)
    }
}

/// Fits a polynomial of `degree` to the points by least squares.
///
/// Returns `None` when there are no points or the system is rank deficient
/// (fewer distinct x values than `degree + 1`). Callers wanting a fit anyway
/// should lower the degree first.
pub fn fit_least_squares(xs: &[f64], ys: &[f64], degree: usize) -> Option<FittedPolynomial> {
    let m = xs.len().min(ys.len());
    let n = degree + 1;
    if m == 0 || m < n {
        return None;
    }

    let (lo, hi) = xs[..m]
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
    let center = (lo + hi) / 2.0;
    let half_width = if hi > lo { (hi - lo) / 2.0 } else { 1.0 };

    let vandermonde: Vec<Vec<f64>> = xs[..m]
        .iter()
        .map(|&x| {
            let t = (x - center) / half_width;
            let mut row = Vec::with_capacity(n);
            let mut power = 1.0;
            for _ in 0..n {
                row.push(power);
                power *= t;
            }
            row
        })
        .collect();

    let coefficients = solve_householder(vandermonde, ys[..m].to_vec(), n)?;
    debug!(
        "Fitted degree-{} polynomial to {} points (scaled coefficients {:?})",
        degree, m, coefficients
    );

    Some(FittedPolynomial {
        scaled: Polynomial::new(coefficients),
        center,
        half_width,
    })
}

/// Minimises ‖A·c − b‖ for an m×n matrix A (m ≥ n) via Householder QR.
fn solve_householder(mut a: Vec<Vec<f64>>, mut b: Vec<f64>, n: usize) -> Option<Vec<f64>> {
    const RANK_TOLERANCE: f64 = 1e-10;
    let m = b.len();

    for k in 0..n {
        let norm = (k..m).map(|i| a[i][k] * a[i][k]).sum::<f64>().sqrt();
        if norm < RANK_TOLERANCE {
            return None;
        }
        let alpha = if a[k][k] > 0.0 { -norm } else { norm };

        let mut v: Vec<f64> = (k..m).map(|i| a[i][k]).collect();
        v[0] -= alpha;
        let v_norm_sq: f64 = v.iter().map(|x| x * x).sum();

        for j in k..n {
            let dot: f64 = (k..m).map(|i| v[i - k] * a[i][j]).sum();
            let factor = 2.0 * dot / v_norm_sq;
            for i in k..m {
                a[i][j] -= factor * v[i - k];
            }
        }
        let dot: f64 = (k..m).map(|i| v[i - k] * b[i]).sum();
        let factor = 2.0 * dot / v_norm_sq;
        for i in k..m {
            b[i] -= factor * v[i - k];
        }
    }

    // Back substitution on the upper-triangular R.
    let mut c = vec![0.0; n];
    for k in (0..n).rev() {
        if a[k][k].abs() < RANK_TOLERANCE {
            return None;
        }
        let tail: f64 = ((k + 1)..n).map(|j| a[k][j] * c[j]).sum();
        c[k] = (b[k] - tail) / a[k][k];
    }
    Some(c)
}
