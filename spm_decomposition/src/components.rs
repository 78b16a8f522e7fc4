use crate::error::DecompositionError;
use crate::math::weighted::{weighted_mean, weighted_total};
use crate::provider::{EntityLevel, Microsimulation};
use serde::Serialize;
use tracing::warn;

/// Terms of SPM net income: market income + benefits - taxes - expenses.
pub const NET_INCOME_COMPONENTS: [&str; 5] = [
    "spm_unit_market_income",
    "spm_unit_benefits",
    "spm_unit_taxes",
    "spm_unit_spm_expenses",
    "spm_unit_net_income",
];

pub const TAX_COMPONENTS: [&str; 4] = [
    "spm_unit_federal_tax",
    "spm_unit_payroll_tax",
    "spm_unit_self_employment_tax",
    "spm_unit_state_tax",
];

/// SPM-unit-weighted aggregate of one income variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ComponentOutcome {
    Computed {
        variable: String,
        /// Weighted total, in dollars.
        total: f64,
        mean: f64,
    },
    Failed {
        variable: String,
        error: String,
    },
}

impl ComponentOutcome {
    pub fn variable(&self) -> &str {
        match self {
            ComponentOutcome::Computed { variable, .. }
            | ComponentOutcome::Failed { variable, .. } => variable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct IncomeComponents {
    pub net_income: Vec<ComponentOutcome>,
    pub taxes: Vec<ComponentOutcome>,
}

fn summarize(
    sim: &dyn Microsimulation,
    period: u32,
    variables: &[&str],
) -> Result<Vec<ComponentOutcome>, DecompositionError> {
    variables
        .iter()
        .map(|&variable| match sim.calc(variable, period, Some(EntityLevel::SpmUnit)) {
            Ok(series) => Ok(ComponentOutcome::Computed {
                variable: variable.to_string(),
                total: weighted_total(&series.values, &series.weights),
                mean: weighted_mean(&series.values, &series.weights),
            }),
            Err(e) if e.is_missing_variable() => {
                warn!(variable, error = %e, "income component skipped");
                Ok(ComponentOutcome::Failed {
                    variable: variable.to_string(),
                    error: e.to_string(),
                })
            }
            Err(e) => Err(e),
        })
        .collect()
}

/// Weighted totals and means of the net income and tax components.
pub fn compute_income_components(
    sim: &dyn Microsimulation,
    period: u32,
) -> Result<IncomeComponents, DecompositionError> {
    Ok(IncomeComponents {
        net_income: summarize(sim, period, &NET_INCOME_COMPONENTS)?,
        taxes: summarize(sim, period, &TAX_COMPONENTS)?,
    })
}
