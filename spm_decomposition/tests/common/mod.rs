#![allow(dead_code)]

use polars::prelude::*;
use spm_decomposition::{DecompositionError, FrameSimulation, Microsimulation, SampleLoader};
use std::collections::HashMap;

pub fn frame(columns: Vec<(String, Vec<f64>)>) -> DataFrame {
    DataFrame::new(
        columns
            .into_iter()
            .map(|(name, values)| Series::new(name.into(), values).into())
            .collect(),
    )
    .unwrap()
}

fn with_ids(prefix: Vec<(&str, &Vec<f64>)>, rest: Vec<(String, Vec<f64>)>) -> DataFrame {
    let mut columns: Vec<(String, Vec<f64>)> = prefix
        .into_iter()
        .map(|(name, values)| (name.to_string(), values.clone()))
        .collect();
    columns.extend(rest);
    frame(columns)
}

/// Builds a sample where every person is their own SPM unit and tax unit.
pub struct FlatSample {
    weights: Vec<f64>,
    person: Vec<(String, Vec<f64>)>,
    spm_unit: Vec<(String, Vec<f64>)>,
    tax_unit: Vec<(String, Vec<f64>)>,
}

impl FlatSample {
    pub fn new(weights: &[f64]) -> Self {
        Self {
            weights: weights.to_vec(),
            person: Vec::new(),
            spm_unit: Vec::new(),
            tax_unit: Vec::new(),
        }
    }

    pub fn person(mut self, name: &str, values: &[f64]) -> Self {
        self.person.push((name.to_string(), values.to_vec()));
        self
    }

    pub fn spm_unit(mut self, name: &str, values: &[f64]) -> Self {
        self.spm_unit.push((name.to_string(), values.to_vec()));
        self
    }

    pub fn tax_unit(mut self, name: &str, values: &[f64]) -> Self {
        self.tax_unit.push((name.to_string(), values.to_vec()));
        self
    }

    pub fn build(self) -> FrameSimulation {
        let ids: Vec<f64> = (1..=self.weights.len()).map(|i| i as f64).collect();
        let person = with_ids(
            vec![
                ("person_id", &ids),
                ("person_spm_unit_id", &ids),
                ("person_tax_unit_id", &ids),
                ("person_weight", &self.weights),
            ],
            self.person,
        );
        let spm_unit = with_ids(
            vec![("spm_unit_id", &ids), ("spm_unit_weight", &self.weights)],
            self.spm_unit,
        );
        let tax_unit = with_ids(
            vec![("tax_unit_id", &ids), ("tax_unit_weight", &self.weights)],
            self.tax_unit,
        );

        FrameSimulation::builder(person)
            .spm_units(spm_unit)
            .tax_units(tax_unit)
            .build()
            .unwrap()
    }
}

/// Four persons: children with weights 3 and 1, two adults; only the first
/// child is poor.
pub fn four_person_sample() -> FrameSimulation {
    FlatSample::new(&[3.0, 1.0, 2.0, 2.0])
        .person("is_child", &[1.0, 1.0, 0.0, 0.0])
        .person("person_in_poverty", &[1.0, 0.0, 0.0, 0.0])
        .person("age", &[4.0, 10.0, 40.0, 45.0])
        .spm_unit("spm_unit_net_income_reported", &[10_000.0, 50_000.0, 50_000.0, 50_000.0])
        .spm_unit("spm_unit_net_income", &[10_000.0, 50_000.0, 50_000.0, 50_000.0])
        .spm_unit("spm_unit_spm_threshold", &[20_000.0; 4])
        .build()
}

/// A sample with every variable the full decomposition needs. `shift`
/// perturbs weights and incomes so two samples differ.
pub fn full_sample(shift: f64) -> FrameSimulation {
    let n = 20;
    let weights: Vec<f64> = (0..n).map(|i| 100.0 + 10.0 * i as f64 + shift).collect();
    let income: Vec<f64> = (0..n).map(|i| 8_000.0 + 4_000.0 * i as f64 + shift).collect();
    let threshold = vec![30_000.0; n];
    let is_child: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 1.0 } else { 0.0 }).collect();
    let poor: Vec<f64> = income
        .iter()
        .zip(&threshold)
        .map(|(i, t)| if i < t { 1.0 } else { 0.0 })
        .collect();
    let age: Vec<f64> = (0..n)
        .map(|i| if i % 2 == 0 { (i % 18) as f64 } else { 40.0 })
        .collect();
    let race: Vec<f64> = (0..n).map(|i| (i % 4 + 1) as f64).collect();
    let joint: Vec<f64> = (0..n).map(|i| ((i / 2) % 2) as f64).collect();
    let snap: Vec<f64> = income
        .iter()
        .map(|&i| if i < 30_000.0 { 3_000.0 } else { 0.0 })
        .collect();
    let eitc: Vec<f64> = income
        .iter()
        .map(|&i| if i < 40_000.0 { 2_500.0 } else { 0.0 })
        .collect();
    let federal_tax: Vec<f64> = income.iter().map(|i| 0.12 * i).collect();
    let reported_tax: Vec<f64> = income.iter().map(|i| 0.10 * i).collect();

    FlatSample::new(&weights)
        .person("is_child", &is_child)
        .person("person_in_poverty", &poor)
        .person("age", &age)
        .person("cps_race", &race)
        .person("ssi", &vec![0.0; n])
        .spm_unit("spm_unit_net_income", &income)
        .spm_unit("spm_unit_net_income_reported", &income)
        .spm_unit("spm_unit_spm_threshold", &threshold)
        .spm_unit("spm_unit_total_income_reported", &income)
        .spm_unit("spm_unit_federal_tax", &federal_tax)
        .spm_unit("spm_unit_federal_tax_reported", &reported_tax)
        .spm_unit("snap", &snap)
        .spm_unit("spm_unit_market_income", &income)
        .tax_unit("tax_unit_is_joint", &joint)
        .tax_unit("eitc", &eitc)
        .build()
}

/// Serves prepared samples by locator.
#[derive(Default)]
pub struct MapLoader {
    samples: HashMap<String, FrameSimulation>,
}

impl MapLoader {
    pub fn with(mut self, locator: &str, sample: FrameSimulation) -> Self {
        self.samples.insert(locator.to_string(), sample);
        self
    }
}

impl SampleLoader for MapLoader {
    fn load(&self, locator: &str) -> Result<Box<dyn Microsimulation>, DecompositionError> {
        self.samples
            .get(locator)
            .cloned()
            .map(|sim| Box::new(sim) as Box<dyn Microsimulation>)
            .ok_or_else(|| DecompositionError::SampleLoad {
                locator: locator.to_string(),
                reason: "no such sample".to_string(),
            })
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}
