//! Weighted statistics over a value array and a parallel weight array.
//!
//! Empty subgroups are not errors. [`weighted_mean`] returns `0.0` when the
//! inputs are empty or the weights sum to zero, so a breakdown over a group
//! with no members reports a rate of `0.0` and a count of `0`.

use nalgebra::DVector;
use tracing::debug;

/// Computes `sum(v_i * w_i)`.
///
/// # Panics
///
/// Panics if `values` and `weights` have different lengths.
pub fn weighted_total(values: &[f64], weights: &[f64]) -> f64 {
    assert_eq!(
        values.len(),
        weights.len(),
        "values and weights must have the same length"
    );
    if values.is_empty() {
        return 0.0;
    }
    let v = DVector::from_column_slice(values);
    let w = DVector::from_column_slice(weights);
    v.dot(&w)
}

/// Computes `sum(v_i * w_i) / sum(w_i)`.
///
/// Returns `0.0` when the inputs are empty or the total weight is zero.
///
/// # Panics
///
/// Panics if `values` and `weights` have different lengths.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
    let total_weight: f64 = weights.iter().sum();
    if values.is_empty() || total_weight == 0.0 {
        debug!(records = values.len(), "empty group, weighted mean is 0.0");
        return 0.0;
    }
    weighted_total(values, weights) / total_weight
}

/// Weighted total restricted to the records where `mask` is `true`.
pub fn weighted_total_where(values: &[f64], weights: &[f64], mask: &[bool]) -> f64 {
    let (v, w) = select(values, weights, mask);
    weighted_total(&v, &w)
}

/// Weighted mean restricted to the records where `mask` is `true`.
pub fn weighted_mean_where(values: &[f64], weights: &[f64], mask: &[bool]) -> f64 {
    let (v, w) = select(values, weights, mask);
    weighted_mean(&v, &w)
}

/// Sum of the weights of the records where `mask` is `true`.
pub fn weight_sum_where(weights: &[f64], mask: &[bool]) -> f64 {
    assert_eq!(
        weights.len(),
        mask.len(),
        "weights and mask must have the same length"
    );
    weights
        .iter()
        .zip(mask)
        .filter(|(_, &keep)| keep)
        .map(|(w, _)| w)
        .sum()
}

fn select(values: &[f64], weights: &[f64], mask: &[bool]) -> (Vec<f64>, Vec<f64>) {
    assert_eq!(
        values.len(),
        weights.len(),
        "values and weights must have the same length"
    );
    assert_eq!(
        values.len(),
        mask.len(),
        "values and mask must have the same length"
    );
    values
        .iter()
        .zip(weights)
        .zip(mask)
        .filter(|(_, &keep)| keep)
        .map(|((&v, &w), _)| (v, w))
        .unzip()
}

/// Computes weighted quantile breakpoints.
///
/// Records are sorted by value, the cumulative weight curve is formed, and the
/// value at `fraction * total_weight` is linearly interpolated along that
/// curve. Targets before the first point of the curve take the smallest value
/// and targets past the last point take the largest one. `fractions` are
/// expected in ascending order, which makes the breakpoints non-decreasing.
///
/// Returns an empty vector when `values` is empty.
pub fn weighted_quantile_breakpoints(
    values: &[f64],
    weights: &[f64],
    fractions: &[f64],
) -> Vec<f64> {
    assert_eq!(
        values.len(),
        weights.len(),
        "values and weights must have the same length"
    );
    if values.is_empty() {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let sorted_values: Vec<f64> = order.iter().map(|&i| values[i]).collect();
    let cumulative: Vec<f64> = order
        .iter()
        .scan(0.0, |acc, &i| {
            *acc += weights[i];
            Some(*acc)
        })
        .collect();
    let total = cumulative[cumulative.len() - 1];

    fractions
        .iter()
        .map(|&q| interpolate(q * total, &cumulative, &sorted_values))
        .collect()
}

/// Piecewise-linear interpolation of `x` on the curve `(xp, fp)`, clamped at
/// both ends. `xp` must be non-decreasing.
fn interpolate(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let last = xp.len() - 1;
    if x < xp[0] {
        return fp[0];
    }
    if x >= xp[last] {
        return fp[last];
    }
    // Last index whose cumulative weight does not exceed x.
    let j = xp.partition_point(|&c| c <= x) - 1;
    let slope = (fp[j + 1] - fp[j]) / (xp[j + 1] - xp[j]);
    fp[j] + slope * (x - xp[j])
}
