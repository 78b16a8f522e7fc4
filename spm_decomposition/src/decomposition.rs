//! The full decomposition run: load both samples, run every breakdown and
//! assemble the waterfall.

use crate::components::{compute_income_components, IncomeComponents};
use crate::config::DecompositionConfig;
use crate::demographics::{compute_demographic_breakdowns, DemographicBreakdowns};
use crate::error::DecompositionError;
use crate::poverty::{compute_child_poverty_rate, PovertyRates};
use crate::programs::{compute_program_effects, ProgramOutcome};
use crate::provider::SampleLoader;
use crate::report::DecompositionReport;
use crate::states::{compute_state_results, StateOutcome};
use crate::tax_gap::{compute_tax_gap, DecileTaxGap};
use crate::weights::{compute_weight_rebalancing, RebalancingGroup};
use chrono::{DateTime, Utc};
use getset::Getters;
use serde::Serialize;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterfallStep {
    pub label: String,
    pub value: f64,
}

/// Change between two consecutive steps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterfallDelta {
    pub from: String,
    pub to: String,
    pub delta: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waterfall {
    pub steps: Vec<WaterfallStep>,
    pub deltas: Vec<WaterfallDelta>,
}

const WATERFALL_EXPLANATIONS: [&str; 4] = [
    "Public-use ASEC vs internal Census file (privacy edits, minor corrections)",
    "Tax/benefit modeling on raw CPS data",
    "Enhanced CPS weight recalibration to IRS SOI targets + PUF income imputation",
    "Tax/benefit modeling on enhanced CPS (PUF-imputed income taxed higher)",
];

/// Traces child poverty from the published benchmark through reported and
/// modeled rates of the raw and enhanced samples.
pub fn build_waterfall(
    benchmark: f64,
    raw: &PovertyRates,
    enhanced: &PovertyRates,
    period: u32,
) -> Waterfall {
    let steps: Vec<WaterfallStep> = [
        ("Census published", benchmark),
        ("Raw CPS reported", raw.reported()),
        ("Raw CPS computed", raw.computed()),
        ("Enhanced CPS reported", enhanced.reported()),
        ("Enhanced CPS computed", enhanced.computed()),
    ]
    .into_iter()
    .map(|(label, value)| WaterfallStep {
        label: format!("{} ({})", label, period),
        value,
    })
    .collect();

    let deltas = steps
        .windows(2)
        .zip(WATERFALL_EXPLANATIONS)
        .map(|(pair, explanation)| WaterfallDelta {
            from: pair[0].label.clone(),
            to: pair[1].label.clone(),
            delta: pair[1].value - pair[0].value,
            explanation: explanation.to_string(),
        })
        .collect();

    Waterfall { steps, deltas }
}

/// Provenance of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    pub generated_at: DateTime<Utc>,
    pub raw_dataset: String,
    pub enhanced_dataset: String,
    pub period: u32,
    pub version: String,
    pub runtime_seconds: f64,
}

/// Holds every section of a decomposition run, unrounded.
#[derive(Debug, Clone, Getters, Serialize)]
#[getset(get = "pub")]
pub struct DecompositionResults {
    benchmark_rate: f64,
    raw_poverty: PovertyRates,
    enhanced_poverty: PovertyRates,
    waterfall: Waterfall,
    /// Computed on the enhanced sample.
    program_effects: Vec<ProgramOutcome>,
    /// Computed on the enhanced sample.
    demographics: DemographicBreakdowns,
    /// Computed on the enhanced sample.
    income_components: IncomeComponents,
    weight_rebalancing: Vec<RebalancingGroup>,
    /// Computed on the enhanced sample.
    tax_gap_by_decile: Vec<DecileTaxGap>,
    state_results: Vec<StateOutcome>,
    metadata: RunMetadata,
}

impl DecompositionResults {
    /// The rounded, externally facing form of the results.
    pub fn to_report(&self) -> DecompositionReport {
        DecompositionReport::from_results(self)
    }

    /// Prints the waterfall, program and tax gap tables to the console.
    pub fn summary(&self) {
        self.to_report().summary();
    }

    /// Exports the rounded results to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_report())
    }

    /// Exports the rounded results to Markdown tables.
    pub fn to_markdown(&self) -> String {
        self.to_report().to_markdown()
    }
}

/// A builder for running the decomposition.
pub struct DecompositionPipeline {
    config: DecompositionConfig,
    loader: Box<dyn SampleLoader>,
}

impl DecompositionPipeline {
    pub fn new(config: DecompositionConfig, loader: Box<dyn SampleLoader>) -> Self {
        Self { config, loader }
    }

    /// Replaces the region section with an empty list.
    pub fn skip_states(&mut self, skip: bool) -> &mut Self {
        self.config.skip_states = skip;
        self
    }

    pub fn period(&mut self, period: u32) -> &mut Self {
        self.config.period = period;
        self
    }

    pub fn config(&self) -> &DecompositionConfig {
        &self.config
    }

    /// Runs every breakdown in order and assembles the results.
    pub fn run(&self) -> Result<DecompositionResults, DecompositionError> {
        self.config.validate()?;
        let start = Instant::now();
        let period = self.config.period;

        info!(dataset = %self.config.raw_dataset, "loading raw sample");
        let raw = self.loader.load(&self.config.raw_dataset)?;
        info!(dataset = %self.config.enhanced_dataset, "loading enhanced sample");
        let enhanced = self.loader.load(&self.config.enhanced_dataset)?;

        let raw_poverty = compute_child_poverty_rate(raw.as_ref(), period)?;
        let enhanced_poverty = compute_child_poverty_rate(enhanced.as_ref(), period)?;
        info!(
            raw_computed = raw_poverty.computed(),
            raw_reported = raw_poverty.reported(),
            enhanced_computed = enhanced_poverty.computed(),
            enhanced_reported = enhanced_poverty.reported(),
            "child poverty rates"
        );

        info!("computing program effects");
        let program_effects = compute_program_effects(enhanced.as_ref(), period)?;
        info!("computing demographic breakdowns");
        let demographics = compute_demographic_breakdowns(enhanced.as_ref(), period)?;
        let income_components = compute_income_components(enhanced.as_ref(), period)?;
        info!("computing weight rebalancing");
        let weight_rebalancing =
            compute_weight_rebalancing(raw.as_ref(), enhanced.as_ref(), period)?;
        info!("computing tax gap");
        let tax_gap_by_decile = compute_tax_gap(enhanced.as_ref(), period)?;
        drop(raw);
        drop(enhanced);

        let state_results = if self.config.skip_states {
            info!("skipping state results");
            Vec::new()
        } else {
            info!(states = self.config.states.len(), "computing state results");
            compute_state_results(self.loader.as_ref(), &self.config)
        };

        let waterfall = build_waterfall(
            self.config.benchmark_rate,
            &raw_poverty,
            &enhanced_poverty,
            period,
        );
        let metadata = RunMetadata {
            generated_at: Utc::now(),
            raw_dataset: self.config.raw_dataset.clone(),
            enhanced_dataset: self.config.enhanced_dataset.clone(),
            period,
            version: env!("CARGO_PKG_VERSION").to_string(),
            runtime_seconds: start.elapsed().as_secs_f64(),
        };
        info!(runtime_seconds = metadata.runtime_seconds, "decomposition finished");

        Ok(DecompositionResults {
            benchmark_rate: self.config.benchmark_rate,
            raw_poverty,
            enhanced_poverty,
            waterfall,
            program_effects,
            demographics,
            income_components,
            weight_rebalancing,
            tax_gap_by_decile,
            state_results,
            metadata,
        })
    }
}
