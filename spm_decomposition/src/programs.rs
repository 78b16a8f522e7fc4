//! Effect of each safety-net program on SPM poverty.
//!
//! A program's SPM-unit amount is subtracted from SPM net income and the
//! poverty flag recomputed with the threshold held fixed. The difference in
//! weighted poor persons is the number the program lifts out of poverty.

use crate::counterfactual::PovertyBaseline;
use crate::entity::UnitMembership;
use crate::error::DecompositionError;
use crate::math::weighted::weighted_total;
use crate::poverty::child_mask_and_weights;
use crate::provider::{EntityLevel, Microsimulation};
use serde::Serialize;
use tracing::{info, warn};

/// One entry of the program catalog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Program {
    pub key: &'static str,
    pub label: &'static str,
    /// Variables summed into the SPM-unit contribution.
    pub variables: &'static [&'static str],
    /// Census estimate of children lifted, in millions.
    pub census_children_lifted_m: Option<f64>,
    /// Census estimate of all persons lifted, in millions.
    pub census_total_lifted_m: Option<f64>,
}

const fn program(
    key: &'static str,
    label: &'static str,
    variables: &'static [&'static str],
) -> Program {
    Program {
        key,
        label,
        variables,
        census_children_lifted_m: None,
        census_total_lifted_m: None,
    }
}

const fn with_children_benchmark(mut p: Program, millions: f64) -> Program {
    p.census_children_lifted_m = Some(millions);
    p
}

const fn with_total_benchmark(mut p: Program, millions: f64) -> Program {
    p.census_total_lifted_m = Some(millions);
    p
}

pub const PROGRAMS: [Program; 12] = [
    with_children_benchmark(program("snap", "SNAP", &["snap"]), 1.4),
    with_total_benchmark(
        program("social_security", "Social Security", &["social_security"]),
        28.7,
    ),
    with_children_benchmark(program("ssi", "SSI", &["ssi"]), 0.5),
    with_total_benchmark(
        program("housing", "Housing subsidies", &["spm_unit_capped_housing_subsidy"]),
        2.1,
    ),
    with_total_benchmark(
        program(
            "school_meals",
            "School meals",
            &["free_school_meals", "reduced_price_school_meals"],
        ),
        0.9,
    ),
    program("wic", "WIC", &["wic"]),
    program("energy", "Energy assistance", &["spm_unit_energy_subsidy"]),
    program("tanf", "TANF", &["tanf"]),
    with_total_benchmark(
        program(
            "unemployment_compensation",
            "Unemployment compensation",
            &["unemployment_compensation"],
        ),
        0.3,
    ),
    program("eitc", "EITC", &["eitc"]),
    program("refundable_ctc", "Refundable CTC", &["refundable_ctc"]),
    with_children_benchmark(
        program(
            "refundable_credits",
            "EITC + refundable CTC",
            &["eitc", "refundable_ctc"],
        ),
        3.7,
    ),
];

/// Poverty effect of removing one program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramEffect {
    pub program: String,
    pub label: String,
    pub children_lifted: f64,
    pub total_lifted: f64,
    pub rate_with: f64,
    pub rate_without: f64,
    /// SPM-unit-weighted total amount, in dollars.
    pub total_amount: f64,
    pub census_children_lifted_m: Option<f64>,
    pub census_total_lifted_m: Option<f64>,
}

/// A program whose variables the sample does not provide.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramFailure {
    pub program: String,
    pub label: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProgramOutcome {
    Computed(ProgramEffect),
    Failed(ProgramFailure),
}

impl ProgramOutcome {
    pub fn program(&self) -> &str {
        match self {
            ProgramOutcome::Computed(effect) => &effect.program,
            ProgramOutcome::Failed(failure) => &failure.program,
        }
    }

    pub fn effect(&self) -> Option<&ProgramEffect> {
        match self {
            ProgramOutcome::Computed(effect) => Some(effect),
            ProgramOutcome::Failed(_) => None,
        }
    }
}

/// SPM-unit resources, thresholds and memberships shared by every program.
pub struct ProgramContext {
    baseline: PovertyBaseline,
    membership: UnitMembership<i64>,
    children: Vec<bool>,
    unit_weights: Vec<f64>,
    period: u32,
}

impl ProgramContext {
    pub fn new(sim: &dyn Microsimulation, period: u32) -> Result<Self, DecompositionError> {
        let (children, person_weights) = child_mask_and_weights(sim, period)?;
        let unit = Some(EntityLevel::SpmUnit);
        let net_income = sim.calc("spm_unit_net_income", period, unit)?;
        let threshold = sim.calc("spm_unit_spm_threshold", period, unit)?;
        let membership = sim.membership(EntityLevel::SpmUnit, period)?;

        let baseline = PovertyBaseline::new(
            membership.project(&net_income.values)?,
            membership.project(&threshold.values)?,
            person_weights,
        )?;
        Ok(Self {
            baseline,
            membership,
            children,
            unit_weights: threshold.weights,
            period,
        })
    }

    pub fn baseline(&self) -> &PovertyBaseline {
        &self.baseline
    }

    /// Sum of `variables`, each re-expressed at the SPM unit level.
    pub fn contribution(
        &self,
        sim: &dyn Microsimulation,
        variables: &[&str],
    ) -> Result<Vec<f64>, DecompositionError> {
        let mut total = vec![0.0; self.membership.n_units()];
        for variable in variables {
            let series = sim.calc(variable, self.period, Some(EntityLevel::SpmUnit))?;
            if series.len() != total.len() {
                return Err(DecompositionError::length_mismatch(
                    variable,
                    total.len(),
                    series.len(),
                ));
            }
            for (t, v) in total.iter_mut().zip(&series.values) {
                *t += v;
            }
        }
        Ok(total)
    }

    /// Removes an SPM-unit contribution and measures the swing.
    pub fn effect(
        &self,
        program: &Program,
        contribution: &[f64],
    ) -> Result<ProgramEffect, DecompositionError> {
        let counterfactual = self
            .baseline
            .remove_unit_contribution(&self.membership, contribution)?;
        let children = counterfactual.effect(Some(&self.children));
        let everyone = counterfactual.effect(None);

        Ok(ProgramEffect {
            program: program.key.to_string(),
            label: program.label.to_string(),
            children_lifted: children.swing_count(),
            total_lifted: everyone.swing_count(),
            rate_with: children.rate_with(),
            rate_without: children.rate_without(),
            total_amount: weighted_total(contribution, &self.unit_weights),
            census_children_lifted_m: program.census_children_lifted_m,
            census_total_lifted_m: program.census_total_lifted_m,
        })
    }
}

/// Effect of every program in `catalog`.
///
/// A program whose variable the sample lacks becomes a failed record; any
/// other error aborts.
pub fn compute_effects_for(
    sim: &dyn Microsimulation,
    period: u32,
    catalog: &[Program],
) -> Result<Vec<ProgramOutcome>, DecompositionError> {
    let context = ProgramContext::new(sim, period)?;
    let mut outcomes = Vec::with_capacity(catalog.len());

    for program in catalog {
        let contribution = match context.contribution(sim, program.variables) {
            Ok(contribution) => contribution,
            Err(e) if e.is_missing_variable() => {
                warn!(program = program.key, error = %e, "program skipped");
                outcomes.push(ProgramOutcome::Failed(ProgramFailure {
                    program: program.key.to_string(),
                    label: program.label.to_string(),
                    error: e.to_string(),
                }));
                continue;
            }
            Err(e) => return Err(e),
        };
        let effect = context.effect(program, &contribution)?;
        info!(
            program = program.key,
            children_lifted = effect.children_lifted,
            "program effect"
        );
        outcomes.push(ProgramOutcome::Computed(effect));
    }
    Ok(outcomes)
}

/// Effect of every program in [`PROGRAMS`].
pub fn compute_program_effects(
    sim: &dyn Microsimulation,
    period: u32,
) -> Result<Vec<ProgramOutcome>, DecompositionError> {
    compute_effects_for(sim, period, &PROGRAMS)
}
