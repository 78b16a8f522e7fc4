//! Decomposition of the gap between the published SPM child poverty rate and
//! microsimulated estimates.
//!
//! The gap is traced through survey privacy edits, tax/benefit modeling and
//! sample reweighting, and poverty outcomes are further broken down by
//! program, demographic group, income quintile and income decile.
//!
//! Samples are reached through the [`Microsimulation`] trait. The bundled
//! [`FrameSimulation`] holds one polars frame per entity level (person, SPM
//! unit, tax unit) and can be loaded from a directory of CSV files.
//!
//! # Example
//!
//! ```ignore
//! use spm_decomposition::{CsvSampleLoader, DecompositionConfig, DecompositionPipeline};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DecompositionConfig {
//!         raw_dataset: "data/cps_2024".to_string(),
//!         enhanced_dataset: "data/enhanced_cps_2024".to_string(),
//!         ..Default::default()
//!     };
//!     let results = DecompositionPipeline::new(config, Box::new(CsvSampleLoader::new(2024)))
//!         .skip_states(true)
//!         .run()?;
//!
//!     results.summary();
//!     Ok(())
//! }
//! ```
//!
//! ### Single breakdowns
//!
//! ```ignore
//! use spm_decomposition::{compute_program_effects, FrameSimulation};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sim = FrameSimulation::from_csv_dir("data/enhanced_cps_2024", 2024)?;
//!     for outcome in compute_program_effects(&sim, 2024)? {
//!         println!("{:?}", outcome);
//!     }
//!     Ok(())
//! }
//! ```

pub mod components;
pub mod config;
pub mod counterfactual;
pub mod decomposition;
pub mod demographics;
pub mod entity;
pub mod error;
pub mod math;
pub mod poverty;
pub mod programs;
pub mod provider;
pub mod report;
pub mod states;
pub mod tax_gap;
pub mod weights;

pub use crate::components::compute_income_components;
pub use crate::config::DecompositionConfig;
pub use crate::counterfactual::{PovertyBaseline, SwingEffect};
pub use crate::decomposition::{build_waterfall, DecompositionPipeline, DecompositionResults};
pub use crate::demographics::compute_demographic_breakdowns;
pub use crate::entity::{aggregate_person_to_unit, map_unit_to_person, UnitMembership};
pub use crate::error::DecompositionError;
pub use crate::math::quantile::assign_bucket;
pub use crate::math::weighted::{weighted_mean, weighted_quantile_breakpoints, weighted_total};
pub use crate::poverty::{compute_child_poverty_rate, PovertyRates};
pub use crate::programs::{compute_program_effects, ProgramOutcome};
pub use crate::provider::{
    CsvSampleLoader, EntityLevel, FrameSimulation, Microsimulation, SampleLoader, WeightedSeries,
};
pub use crate::report::DecompositionReport;
pub use crate::states::compute_state_results;
pub use crate::tax_gap::compute_tax_gap;
pub use crate::weights::compute_weight_rebalancing;
