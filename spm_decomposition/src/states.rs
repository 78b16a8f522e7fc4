use crate::config::DecompositionConfig;
use crate::error::DecompositionError;
use crate::poverty::compute_child_poverty_rate;
use crate::provider::SampleLoader;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StateOutcome {
    Computed {
        state: String,
        reported_child_poverty: f64,
        computed_child_poverty: f64,
        total_children: f64,
    },
    Failed {
        state: String,
        error: String,
    },
}

impl StateOutcome {
    pub fn state(&self) -> &str {
        match self {
            StateOutcome::Computed { state, .. } | StateOutcome::Failed { state, .. } => state,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StateOutcome::Failed { .. })
    }
}

fn state_result(
    loader: &dyn SampleLoader,
    locator: &str,
    period: u32,
) -> Result<(f64, f64, f64), DecompositionError> {
    let sim = loader.load(locator)?;
    let rates = compute_child_poverty_rate(sim.as_ref(), period)?;
    Ok((rates.reported(), rates.computed(), rates.total_children()))
}

/// Child poverty of every configured region.
///
/// Regions are loaded one at a time; each sample is released before the
/// next is loaded. A failing region becomes an error record.
pub fn compute_state_results(
    loader: &dyn SampleLoader,
    config: &DecompositionConfig,
) -> Vec<StateOutcome> {
    let mut results = Vec::with_capacity(config.states.len());
    for state in &config.states {
        let locator = config.state_dataset(state);
        match state_result(loader, &locator, config.period) {
            Ok((reported, computed, total_children)) => {
                info!(state = %state, computed, "state done");
                results.push(StateOutcome::Computed {
                    state: state.clone(),
                    reported_child_poverty: reported,
                    computed_child_poverty: computed,
                    total_children,
                });
            }
            Err(e) => {
                warn!(state = %state, error = %e, "state failed");
                results.push(StateOutcome::Failed {
                    state: state.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    results
}
