use crate::counterfactual::poverty_flags;
use crate::error::DecompositionError;
use crate::math::weighted::{weight_sum_where, weighted_mean_where};
use crate::poverty::{child_mask_and_weights, person_values};
use crate::provider::Microsimulation;
use serde::Serialize;
use tracing::{debug, warn};

/// Age bands of children with their Census SPM poverty rates.
pub const AGE_GROUPS: [(f64, f64, &str, f64); 3] = [
    (0.0, 5.0, "Under 6", 0.151),
    (6.0, 11.0, "6-11", 0.126),
    (12.0, 17.0, "12-17", 0.125),
];

/// `cps_race` codes.
pub const RACE_GROUPS: [(f64, &str, Option<f64>); 4] = [
    (1.0, "White", Some(0.11)),
    (2.0, "Black", Some(0.21)),
    (3.0, "American Indian", None),
    (4.0, "Asian", Some(0.11)),
];

/// `is_hispanic` values.
pub const HISPANIC_GROUPS: [(f64, &str, Option<f64>); 2] = [
    (1.0, "Hispanic (any race)", Some(0.20)),
    (0.0, "Non-Hispanic", None),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRate {
    pub group: String,
    pub rate: f64,
    pub census_rate: Option<f64>,
    pub total_children: f64,
}

/// An optional breakdown the sample could not provide.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownFailure {
    pub variable: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DemographicBreakdowns {
    pub by_age: Vec<GroupRate>,
    pub by_race: Vec<GroupRate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<BreakdownFailure>,
}

struct ChildPoverty {
    children: Vec<bool>,
    weights: Vec<f64>,
    poor: Vec<f64>,
}

impl ChildPoverty {
    fn group(
        &self,
        label: &str,
        census_rate: Option<f64>,
        member: impl Fn(usize) -> bool,
    ) -> GroupRate {
        let mask: Vec<bool> = self
            .children
            .iter()
            .enumerate()
            .map(|(i, &child)| child && member(i))
            .collect();
        let total_children = weight_sum_where(&self.weights, &mask);
        if total_children == 0.0 {
            debug!(group = label, "empty demographic group");
        }
        GroupRate {
            group: label.to_string(),
            rate: weighted_mean_where(&self.poor, &self.weights, &mask),
            census_rate,
            total_children,
        }
    }
}

/// Child poverty by age band and by race and Hispanic origin.
///
/// Poverty is computed net income against the SPM threshold. `age` is
/// required; `cps_race` and `is_hispanic` are optional and recorded in
/// `errors` when absent.
pub fn compute_demographic_breakdowns(
    sim: &dyn Microsimulation,
    period: u32,
) -> Result<DemographicBreakdowns, DecompositionError> {
    let (children, weights) = child_mask_and_weights(sim, period)?;
    let n = weights.len();
    let age = person_values(sim, "age", period, n)?;
    let net_income = person_values(sim, "spm_unit_net_income", period, n)?;
    let threshold = person_values(sim, "spm_unit_spm_threshold", period, n)?;
    let poverty = ChildPoverty {
        children,
        weights,
        poor: poverty_flags(&net_income, &threshold),
    };

    let mut breakdowns = DemographicBreakdowns::default();
    for (min, max, label, census) in AGE_GROUPS {
        breakdowns
            .by_age
            .push(poverty.group(label, Some(census), |i| age[i] >= min && age[i] <= max));
    }

    for (variable, groups) in [
        ("cps_race", &RACE_GROUPS[..]),
        ("is_hispanic", &HISPANIC_GROUPS[..]),
    ] {
        match person_values(sim, variable, period, n) {
            Ok(codes) => {
                for &(code, label, census) in groups {
                    breakdowns
                        .by_race
                        .push(poverty.group(label, census, |i| codes[i] == code));
                }
            }
            Err(e) if e.is_missing_variable() => {
                warn!(variable, error = %e, "demographic breakdown skipped");
                breakdowns.errors.push(BreakdownFailure {
                    variable: variable.to_string(),
                    error: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(breakdowns)
}
