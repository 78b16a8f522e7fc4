//! Run configuration: benchmark, period, dataset locators and regions.

use crate::error::DecompositionError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_PERIOD: u32 = 2024;

/// Census published SPM child poverty rate for 2024.
pub const CENSUS_CHILD_POVERTY_BENCHMARK: f64 = 0.134;

/// Region codes: the 50 states and DC.
pub const STATES: [&str; 51] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DC", "DE", "FL", "GA", "HI", "IA", "ID", "IL", "IN",
    "KS", "KY", "LA", "MA", "MD", "ME", "MI", "MN", "MO", "MS", "MT", "NC", "ND", "NE", "NH", "NJ",
    "NM", "NV", "NY", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VA", "VT", "WA",
    "WI", "WV", "WY",
];

pub const STATE_PLACEHOLDER: &str = "{state}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionConfig {
    pub benchmark_rate: f64,
    pub period: u32,
    pub raw_dataset: String,
    pub enhanced_dataset: String,
    /// Locator of one region sample, with `{state}` standing for the code.
    pub state_dataset_template: String,
    pub states: Vec<String>,
    pub skip_states: bool,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            benchmark_rate: CENSUS_CHILD_POVERTY_BENCHMARK,
            period: DEFAULT_PERIOD,
            raw_dataset: "data/cps_2024".to_string(),
            enhanced_dataset: "data/enhanced_cps_2024".to_string(),
            state_dataset_template: "data/states/{state}".to_string(),
            states: STATES.iter().map(|s| s.to_string()).collect(),
            skip_states: false,
        }
    }
}

impl DecompositionConfig {
    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DecompositionError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Locator of the sample for one region.
    pub fn state_dataset(&self, state: &str) -> String {
        self.state_dataset_template.replace(STATE_PLACEHOLDER, state)
    }

    pub fn validate(&self) -> Result<(), DecompositionError> {
        if !(0.0..=1.0).contains(&self.benchmark_rate) {
            return Err(DecompositionError::InvalidConfig(format!(
                "benchmark rate {} is outside [0, 1]",
                self.benchmark_rate
            )));
        }
        if !self.skip_states
            && !self.states.is_empty()
            && !self.state_dataset_template.contains(STATE_PLACEHOLDER)
        {
            return Err(DecompositionError::InvalidConfig(format!(
                "state dataset template '{}' has no {} placeholder",
                self.state_dataset_template, STATE_PLACEHOLDER
            )));
        }
        Ok(())
    }
}
