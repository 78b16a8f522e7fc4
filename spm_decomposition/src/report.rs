//! Rounded, serializable form of the results and its console and Markdown
//! renderings.
//!
//! Rates carry 4 decimals, counts are whole persons, program and component
//! totals are billions with 1 decimal and decile dollar means carry 2
//! decimals. Nothing upstream of this module rounds.

use crate::components::{ComponentOutcome, IncomeComponents};
use crate::decomposition::{
    DecompositionResults, RunMetadata, Waterfall, WaterfallDelta, WaterfallStep,
};
use crate::demographics::{DemographicBreakdowns, GroupRate};
use crate::poverty::PovertyRates;
use crate::programs::{ProgramFailure, ProgramOutcome};
use crate::states::StateOutcome;
use crate::tax_gap::DecileTaxGap;
use crate::weights::RebalancingGroup;
use comfy_table::{Cell, Table};
use serde::Serialize;

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn round_rate(value: f64) -> f64 {
    round_to(value, 4)
}

pub fn round_count(value: f64) -> f64 {
    value.round()
}

pub fn round_dollars(value: f64) -> f64 {
    round_to(value, 2)
}

/// Dollars to billions, 1 decimal.
pub fn to_billions(value: f64) -> f64 {
    round_to(value / 1e9, 1)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PovertySection {
    pub benchmark_rate: f64,
    pub raw: PovertyRates,
    pub enhanced: PovertyRates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProgramRow {
    Computed {
        program: String,
        label: String,
        children_lifted: f64,
        total_lifted: f64,
        rate_with: f64,
        rate_without: f64,
        total_amount_b: f64,
        census_children_lifted_m: Option<f64>,
        census_total_lifted_m: Option<f64>,
    },
    Failed(ProgramFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ComponentRow {
    Computed {
        variable: String,
        total_b: f64,
        mean: f64,
    },
    Failed {
        variable: String,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentSection {
    pub net_income: Vec<ComponentRow>,
    pub taxes: Vec<ComponentRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightRebalancingSection {
    pub groups: Vec<RebalancingGroup>,
}

/// The externally facing structure with stable section keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecompositionReport {
    pub waterfall: Waterfall,
    pub poverty: PovertySection,
    pub program_effects: Vec<ProgramRow>,
    pub demographics: DemographicBreakdowns,
    pub income_components: ComponentSection,
    pub weight_rebalancing: WeightRebalancingSection,
    pub tax_gap_by_decile: Vec<DecileTaxGap>,
    pub state_results: Vec<StateOutcome>,
    pub metadata: RunMetadata,
}

fn rounded_rates(rates: &PovertyRates) -> PovertyRates {
    PovertyRates::new(
        round_rate(rates.computed()),
        round_rate(rates.reported()),
        round_count(rates.total_children()),
    )
}

fn rounded_waterfall(waterfall: &Waterfall) -> Waterfall {
    Waterfall {
        steps: waterfall
            .steps
            .iter()
            .map(|s| WaterfallStep {
                label: s.label.clone(),
                value: round_rate(s.value),
            })
            .collect(),
        deltas: waterfall
            .deltas
            .iter()
            .map(|d| WaterfallDelta {
                delta: round_rate(d.delta),
                ..d.clone()
            })
            .collect(),
    }
}

fn program_row(outcome: &ProgramOutcome) -> ProgramRow {
    match outcome {
        ProgramOutcome::Computed(e) => ProgramRow::Computed {
            program: e.program.clone(),
            label: e.label.clone(),
            children_lifted: round_count(e.children_lifted),
            total_lifted: round_count(e.total_lifted),
            rate_with: round_rate(e.rate_with),
            rate_without: round_rate(e.rate_without),
            total_amount_b: to_billions(e.total_amount),
            census_children_lifted_m: e.census_children_lifted_m,
            census_total_lifted_m: e.census_total_lifted_m,
        },
        ProgramOutcome::Failed(failure) => ProgramRow::Failed(failure.clone()),
    }
}

fn rounded_groups(groups: &[GroupRate]) -> Vec<GroupRate> {
    groups
        .iter()
        .map(|g| GroupRate {
            rate: round_rate(g.rate),
            total_children: round_count(g.total_children),
            ..g.clone()
        })
        .collect()
}

fn component_rows(outcomes: &[ComponentOutcome]) -> Vec<ComponentRow> {
    outcomes
        .iter()
        .map(|outcome| match outcome {
            ComponentOutcome::Computed { variable, total, mean } => ComponentRow::Computed {
                variable: variable.clone(),
                total_b: to_billions(*total),
                mean: round_dollars(*mean),
            },
            ComponentOutcome::Failed { variable, error } => ComponentRow::Failed {
                variable: variable.clone(),
                error: error.clone(),
            },
        })
        .collect()
}

fn rounded_components(components: &IncomeComponents) -> ComponentSection {
    ComponentSection {
        net_income: component_rows(&components.net_income),
        taxes: component_rows(&components.taxes),
    }
}

fn rounded_state(outcome: &StateOutcome) -> StateOutcome {
    match outcome {
        StateOutcome::Computed {
            state,
            reported_child_poverty,
            computed_child_poverty,
            total_children,
        } => StateOutcome::Computed {
            state: state.clone(),
            reported_child_poverty: round_rate(*reported_child_poverty),
            computed_child_poverty: round_rate(*computed_child_poverty),
            total_children: round_count(*total_children),
        },
        failed => failed.clone(),
    }
}

impl DecompositionReport {
    pub fn from_results(results: &DecompositionResults) -> Self {
        let demographics = results.demographics();
        let metadata = results.metadata();
        Self {
            waterfall: rounded_waterfall(results.waterfall()),
            poverty: PovertySection {
                benchmark_rate: round_rate(*results.benchmark_rate()),
                raw: rounded_rates(results.raw_poverty()),
                enhanced: rounded_rates(results.enhanced_poverty()),
            },
            program_effects: results.program_effects().iter().map(program_row).collect(),
            demographics: DemographicBreakdowns {
                by_age: rounded_groups(&demographics.by_age),
                by_race: rounded_groups(&demographics.by_race),
                errors: demographics.errors.clone(),
            },
            income_components: rounded_components(results.income_components()),
            weight_rebalancing: WeightRebalancingSection {
                groups: results
                    .weight_rebalancing()
                    .iter()
                    .map(|g| RebalancingGroup {
                        label: g.label.clone(),
                        raw_poverty_rate: round_rate(g.raw_poverty_rate),
                        enhanced_poverty_rate: round_rate(g.enhanced_poverty_rate),
                        raw_child_share: round_rate(g.raw_child_share),
                        enhanced_child_share: round_rate(g.enhanced_child_share),
                    })
                    .collect(),
            },
            tax_gap_by_decile: rounded_tax_gap(results.tax_gap_by_decile()),
            state_results: results.state_results().iter().map(rounded_state).collect(),
            metadata: RunMetadata {
                runtime_seconds: round_to(metadata.runtime_seconds, 1),
                ..metadata.clone()
            },
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Prints the waterfall, program and tax gap tables.
    pub fn summary(&self) {
        println!("SPM Child Poverty Decomposition");
        println!("========================================");
        println!("Period: {}", self.metadata.period);
        println!("Raw sample:      {}", self.metadata.raw_dataset);
        println!("Enhanced sample: {}", self.metadata.enhanced_dataset);
        println!();

        println!("Waterfall");
        println!("{}", waterfall_table(&self.waterfall));
        println!("\nProgram Effects (enhanced sample)");
        println!("{}", program_rows_table(&self.program_effects));
        println!("\nFederal Tax Gap by Income Decile (enhanced sample)");
        println!("{}", tax_gap_table(&self.tax_gap_by_decile));

        if !self.state_results.is_empty() {
            let failed = self.state_results.iter().filter(|s| s.is_failed()).count();
            println!(
                "\nState results: {} computed, {} failed",
                self.state_results.len() - failed,
                failed
            );
        }
        println!("Runtime: {:.1}s", self.metadata.runtime_seconds);
    }

    /// Exports the waterfall, program effects and tax gap as Markdown tables.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str("### SPM Child Poverty Decomposition\n\n");
        md.push_str("| Step | Rate | Change | Explanation |\n");
        md.push_str("|---|---|---|---|\n");
        if let Some(first) = self.waterfall.steps.first() {
            md.push_str(&format!("| {} | {:.4} | | |\n", first.label, first.value));
        }
        for (step, delta) in self.waterfall.steps.iter().skip(1).zip(&self.waterfall.deltas) {
            md.push_str(&format!(
                "| {} | {:.4} | {:+.4} | {} |\n",
                step.label, step.value, delta.delta, delta.explanation
            ));
        }

        md.push_str("\n### Program Effects\n\n");
        md.push_str("| Program | Children lifted | Persons lifted ");
        md.push_str("| Rate with | Rate without | Total ($B) |\n");
        md.push_str("|---|---|---|---|---|---|\n");
        for row in &self.program_effects {
            match row {
                ProgramRow::Computed {
                    label,
                    children_lifted,
                    total_lifted,
                    rate_with,
                    rate_without,
                    total_amount_b,
                    ..
                } => md.push_str(&format!(
                    "| {} | {:.0} | {:.0} | {:.4} | {:.4} | {:.1} |\n",
                    label, children_lifted, total_lifted, rate_with, rate_without, total_amount_b
                )),
                ProgramRow::Failed(failure) => md.push_str(&format!(
                    "| {} | error: {} | | | | |\n",
                    failure.label, failure.error
                )),
            }
        }

        md.push_str("\n### Federal Tax Gap by Decile\n\n");
        md.push_str("| Decile | Mean income | Computed tax | Reported tax | Gap |\n");
        md.push_str("|---|---|---|---|---|\n");
        for d in &self.tax_gap_by_decile {
            md.push_str(&format!(
                "| {} | {:.2} | {:.2} | {:.2} | {:.2} |\n",
                d.decile, d.mean_income, d.computed_federal_tax, d.reported_federal_tax, d.gap
            ));
        }
        md
    }
}

pub fn rounded_tax_gap(deciles: &[DecileTaxGap]) -> Vec<DecileTaxGap> {
    deciles
        .iter()
        .map(|d| DecileTaxGap {
            decile: d.decile,
            mean_income: round_dollars(d.mean_income),
            computed_federal_tax: round_dollars(d.computed_federal_tax),
            reported_federal_tax: round_dollars(d.reported_federal_tax),
            gap: round_dollars(d.gap),
        })
        .collect()
}

pub fn rounded_program_rows(outcomes: &[ProgramOutcome]) -> Vec<ProgramRow> {
    outcomes.iter().map(program_row).collect()
}

fn waterfall_table(waterfall: &Waterfall) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Step", "Rate", "Change", "Explanation"]);
    if let Some(first) = waterfall.steps.first() {
        table.add_row(vec![
            Cell::new(&first.label),
            Cell::new(format!("{:.4}", first.value)),
            Cell::new(""),
            Cell::new(""),
        ]);
    }
    for (step, delta) in waterfall.steps.iter().skip(1).zip(&waterfall.deltas) {
        table.add_row(vec![
            Cell::new(&step.label),
            Cell::new(format!("{:.4}", step.value)),
            Cell::new(format!("{:+.4}", delta.delta)),
            Cell::new(&delta.explanation),
        ]);
    }
    table
}

/// Console table of program effects.
pub fn program_rows_table(rows: &[ProgramRow]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Program",
        "Children lifted",
        "Persons lifted",
        "Rate with",
        "Rate without",
        "Total ($B)",
        "Census children (M)",
    ]);
    for row in rows {
        match row {
            ProgramRow::Computed {
                label,
                children_lifted,
                total_lifted,
                rate_with,
                rate_without,
                total_amount_b,
                census_children_lifted_m,
                ..
            } => {
                table.add_row(vec![
                    Cell::new(label),
                    Cell::new(format!("{:.0}", children_lifted)),
                    Cell::new(format!("{:.0}", total_lifted)),
                    Cell::new(format!("{:.4}", rate_with)),
                    Cell::new(format!("{:.4}", rate_without)),
                    Cell::new(format!("{:.1}", total_amount_b)),
                    Cell::new(
                        census_children_lifted_m
                            .map(|m| format!("{:.1}", m))
                            .unwrap_or_default(),
                    ),
                ]);
            }
            ProgramRow::Failed(failure) => {
                table.add_row(vec![
                    Cell::new(&failure.label),
                    Cell::new(format!("error: {}", failure.error)),
                ]);
            }
        }
    }
    table
}

/// Console table of the tax gap by decile.
pub fn tax_gap_table(deciles: &[DecileTaxGap]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Decile", "Mean income", "Computed tax", "Reported tax", "Gap"]);
    for d in deciles {
        table.add_row(vec![
            Cell::new(d.decile),
            Cell::new(format!("{:.2}", d.mean_income)),
            Cell::new(format!("{:.2}", d.computed_federal_tax)),
            Cell::new(format!("{:.2}", d.reported_federal_tax)),
            Cell::new(format!("{:.2}", d.gap)),
        ]);
    }
    table
}
