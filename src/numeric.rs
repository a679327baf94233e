//! Shared numeric utilities for log-space estimation.
//!
//! Log-likelihood computations run entirely in log space; the helpers here
//! keep probabilities away from the 0/1 boundaries and normalize log-joint
//! rows without underflow.

use crate::primitives::Matrix;
use rand::rngs::StdRng;
use rand::Rng;

/// Probability clip bound. Every probability parameter is kept inside
/// `[PROB_CLIP, 1 - PROB_CLIP]` so that its logarithm stays finite.
pub const PROB_CLIP: f64 = 1e-15;

/// Clamps a probability into the open unit interval.
#[must_use]
pub fn clip_prob(p: f64) -> f64 {
    p.clamp(PROB_CLIP, 1.0 - PROB_CLIP)
}

/// Log-sum-exp of a slice, stable against underflow.
///
/// Returns negative infinity for an empty slice or a slice of negative
/// infinities.
#[must_use]
pub fn logsumexp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = values.iter().map(|&v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Row-wise softmax of a matrix of logits, computed via log-sum-exp.
#[must_use]
pub fn softmax_rows(logits: &Matrix<f64>) -> Matrix<f64> {
    let (n_rows, n_cols) = logits.shape();
    let mut out = Matrix::zeros(n_rows, n_cols);
    let mut row = vec![0.0; n_cols];
    for i in 0..n_rows {
        for (j, r) in row.iter_mut().enumerate() {
            *r = logits.get(i, j);
        }
        let lse = logsumexp(&row);
        for j in 0..n_cols {
            out.set(i, j, (row[j] - lse).exp());
        }
    }
    out
}

/// Index of the largest value in a row, ties broken by first index.
#[must_use]
pub fn argmax_row(m: &Matrix<f64>, row: usize) -> usize {
    let mut best = 0;
    let mut best_val = m.get(row, 0);
    for j in 1..m.n_cols() {
        let v = m.get(row, j);
        if v > best_val {
            best = j;
            best_val = v;
        }
    }
    best
}

/// Hardens soft class probabilities into a one-hot modal assignment.
///
/// Ties are broken by the first (lowest) class index.
///
/// # Examples
///
/// ```
/// use mezcla::primitives::Matrix;
/// use mezcla::numeric::modal;
///
/// let resp = Matrix::from_vec(1, 3, vec![0.2, 0.5, 0.3]).expect("valid matrix");
/// let hard = modal(&resp);
/// assert_eq!(hard.as_slice(), &[0.0, 1.0, 0.0]);
/// ```
#[must_use]
pub fn modal(resp: &Matrix<f64>) -> Matrix<f64> {
    let (n_samples, n_components) = resp.shape();
    let mut out = Matrix::zeros(n_samples, n_components);
    for i in 0..n_samples {
        out.set(i, argmax_row(resp, i), 1.0);
    }
    out
}

/// Finds a reference configuration for structural regression coefficients.
///
/// Softmax invariance leaves the coefficients identifiable only up to an
/// additive per-row shift. This picks the class whose first-row coefficient
/// is second-smallest by value (the closest-to-zero class when the row is
/// roughly centered) and subtracts that class's whole column from every
/// column, yielding a null reference class.
///
/// Matrices with fewer than two columns are returned unchanged.
///
/// # Examples
///
/// ```
/// use mezcla::primitives::Matrix;
/// use mezcla::numeric::identify_coef;
///
/// let coef = Matrix::from_vec(1, 3, vec![0.0, 5.0, -5.0]).expect("valid matrix");
/// let fixed = identify_coef(&coef);
/// assert_eq!(fixed.get(0, 0), 0.0);
/// ```
#[must_use]
pub fn identify_coef(coef: &Matrix<f64>) -> Matrix<f64> {
    let (n_rows, n_cols) = coef.shape();
    if n_cols < 2 {
        return coef.clone();
    }

    let mut order: Vec<usize> = (0..n_cols).collect();
    order.sort_by(|&a, &b| coef.get(0, a).total_cmp(&coef.get(0, b)));
    let closest_id = order[1];

    let mut out = coef.clone();
    for i in 0..n_rows {
        let shift = coef.get(i, closest_id);
        for j in 0..n_cols {
            out.set(i, j, coef.get(i, j) - shift);
        }
    }
    out
}

/// Draws one standard normal variate via the Box-Muller transform.
#[must_use]
pub fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(1e-12..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
