use crate::counterfactual::poverty_flags;
use crate::error::DecompositionError;
use crate::math::weighted::{weight_sum_where, weighted_mean_where};
use crate::provider::{EntityLevel, Microsimulation};
use getset::CopyGetters;
use serde::Serialize;
use tracing::debug;

/// Child poverty rates of one sample.
#[derive(Debug, Clone, Copy, PartialEq, CopyGetters, Serialize)]
#[getset(get_copy = "pub")]
pub struct PovertyRates {
    /// From the modeled `person_in_poverty` flag.
    computed: f64,
    /// From reported SPM resources against the SPM threshold.
    reported: f64,
    /// Weighted number of children.
    total_children: f64,
}

impl PovertyRates {
    pub fn new(computed: f64, reported: f64, total_children: f64) -> Self {
        Self {
            computed,
            reported,
            total_children,
        }
    }
}

/// Values of `variable` broadcast to persons, checked against the person count.
pub(crate) fn person_values(
    sim: &dyn Microsimulation,
    variable: &str,
    period: u32,
    n_persons: usize,
) -> Result<Vec<f64>, DecompositionError> {
    let series = sim.calc(variable, period, Some(EntityLevel::Person))?;
    if series.len() != n_persons {
        return Err(DecompositionError::length_mismatch(
            variable,
            n_persons,
            series.len(),
        ));
    }
    Ok(series.values)
}

/// Child mask and person weights, the inputs every child-level statistic needs.
pub(crate) fn child_mask_and_weights(
    sim: &dyn Microsimulation,
    period: u32,
) -> Result<(Vec<bool>, Vec<f64>), DecompositionError> {
    let person = Some(EntityLevel::Person);
    let weights = sim.calc("person_weight", period, person)?;
    let is_child = sim.calc("is_child", period, person)?;
    if is_child.len() != weights.len() {
        return Err(DecompositionError::length_mismatch(
            "is_child",
            weights.len(),
            is_child.len(),
        ));
    }
    Ok((is_child.flag_mask(), weights.values))
}

/// Computed and reported child poverty rates.
///
/// A sample without children yields 0.0 for both rates.
pub fn compute_child_poverty_rate(
    sim: &dyn Microsimulation,
    period: u32,
) -> Result<PovertyRates, DecompositionError> {
    let (children, weights) = child_mask_and_weights(sim, period)?;
    if !children.iter().any(|&c| c) {
        debug!(period, "sample has no children");
        return Ok(PovertyRates::new(0.0, 0.0, 0.0));
    }
    let n = weights.len();

    let in_poverty = person_values(sim, "person_in_poverty", period, n)?;
    let computed = weighted_mean_where(&in_poverty, &weights, &children);

    let resources = person_values(sim, "spm_unit_net_income_reported", period, n)?;
    let thresholds = person_values(sim, "spm_unit_spm_threshold", period, n)?;
    let reported_poor = poverty_flags(&resources, &thresholds);
    let reported = weighted_mean_where(&reported_poor, &weights, &children);

    Ok(PovertyRates::new(
        computed,
        reported,
        weight_sum_where(&weights, &children),
    ))
}
