use crate::error::DecompositionError;
use crate::math::quantile::assign_bucket;
use crate::math::weighted::weighted_mean_where;
use crate::provider::{EntityLevel, Microsimulation};
use serde::Serialize;

pub const N_DECILES: usize = 10;

/// Mean income and federal tax of one SPM-unit income decile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecileTaxGap {
    /// 1 to 10.
    pub decile: usize,
    pub mean_income: f64,
    pub computed_federal_tax: f64,
    pub reported_federal_tax: f64,
    /// Computed minus reported.
    pub gap: f64,
}

/// Modeled versus reported federal tax by decile of reported total income.
///
/// Always returns ten records. Empty deciles report zeros.
pub fn compute_tax_gap(
    sim: &dyn Microsimulation,
    period: u32,
) -> Result<Vec<DecileTaxGap>, DecompositionError> {
    let unit = Some(EntityLevel::SpmUnit);
    let income = sim.calc("spm_unit_total_income_reported", period, unit)?;
    let computed_tax = sim.calc("spm_unit_federal_tax", period, unit)?;
    let reported_tax = sim.calc("spm_unit_federal_tax_reported", period, unit)?;
    for (variable, series) in [
        ("spm_unit_federal_tax", &computed_tax),
        ("spm_unit_federal_tax_reported", &reported_tax),
    ] {
        if series.len() != income.len() {
            return Err(DecompositionError::length_mismatch(
                variable,
                income.len(),
                series.len(),
            ));
        }
    }

    let deciles = assign_bucket(&income.values, &income.weights, N_DECILES);
    Ok((0..N_DECILES)
        .map(|d| {
            let mask = deciles.mask(d);
            let computed = weighted_mean_where(&computed_tax.values, &income.weights, &mask);
            let reported = weighted_mean_where(&reported_tax.values, &income.weights, &mask);
            DecileTaxGap {
                decile: d + 1,
                mean_income: weighted_mean_where(&income.values, &income.weights, &mask),
                computed_federal_tax: computed,
                reported_federal_tax: reported,
                gap: computed - reported,
            }
        })
        .collect())
}
