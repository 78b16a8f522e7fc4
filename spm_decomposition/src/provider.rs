//! The microsimulation provider interface and a provider backed by polars frames.
//!
//! Assemblers never touch a dataset directly. They ask a [`Microsimulation`]
//! for a named variable in a period, optionally pre-aggregated to an entity
//! level, and get back values with the matching sample weights.

use crate::entity::UnitMembership;
use crate::error::DecompositionError;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Aggregation levels of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityLevel {
    Person,
    SpmUnit,
    TaxUnit,
}

impl EntityLevel {
    /// Variable holding the unit ids of this level.
    pub fn id_variable(self) -> &'static str {
        match self {
            EntityLevel::Person => "person_id",
            EntityLevel::SpmUnit => "spm_unit_id",
            EntityLevel::TaxUnit => "tax_unit_id",
        }
    }

    /// Person-level variable holding each person's unit id at this level.
    pub fn person_link_variable(self) -> &'static str {
        match self {
            EntityLevel::Person => "person_id",
            EntityLevel::SpmUnit => "person_spm_unit_id",
            EntityLevel::TaxUnit => "person_tax_unit_id",
        }
    }

    pub fn weight_variable(self) -> &'static str {
        match self {
            EntityLevel::Person => "person_weight",
            EntityLevel::SpmUnit => "spm_unit_weight",
            EntityLevel::TaxUnit => "tax_unit_weight",
        }
    }
}

impl fmt::Display for EntityLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EntityLevel::Person => write!(f, "person"),
            EntityLevel::SpmUnit => write!(f, "spm_unit"),
            EntityLevel::TaxUnit => write!(f, "tax_unit"),
        }
    }
}

/// Values of one variable together with the sample weights of its level.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedSeries {
    pub values: Vec<f64>,
    pub weights: Vec<f64>,
}

impl WeightedSeries {
    pub fn new(values: Vec<f64>, weights: Vec<f64>) -> Result<Self, DecompositionError> {
        if values.len() != weights.len() {
            return Err(DecompositionError::length_mismatch(
                "weighted series",
                values.len(),
                weights.len(),
            ));
        }
        Ok(Self { values, weights })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `values == 1` as a mask, for 0/1 flag variables.
    pub fn flag_mask(&self) -> Vec<bool> {
        self.values.iter().map(|&v| v == 1.0).collect()
    }
}

/// Query interface of an external microsimulation engine.
pub trait Microsimulation {
    /// Returns `variable` for `period`. With `map_to`, the result is first
    /// re-expressed at that entity level.
    ///
    /// Unknown variables fail with [`DecompositionError::UnknownVariable`].
    fn calc(
        &self,
        variable: &str,
        period: u32,
        map_to: Option<EntityLevel>,
    ) -> Result<WeightedSeries, DecompositionError>;

    /// Person membership of the units at `level`, built from the id variables.
    fn membership(
        &self,
        level: EntityLevel,
        period: u32,
    ) -> Result<UnitMembership<i64>, DecompositionError> {
        let unit_ids = self.calc(level.id_variable(), period, None)?;
        let links = self.calc(level.person_link_variable(), period, None)?;
        let unit_ids = ids_from_values(level.id_variable(), &unit_ids.values)?;
        let links = ids_from_values(level.person_link_variable(), &links.values)?;
        UnitMembership::new(&unit_ids, &links)
    }
}

/// Converts float-encoded ids to integer keys, rejecting fractional or
/// non-finite values.
pub fn ids_from_values(variable: &str, values: &[f64]) -> Result<Vec<i64>, DecompositionError> {
    values
        .iter()
        .map(|&v| {
            if v.is_finite() && v.fract() == 0.0 {
                Ok(v as i64)
            } else {
                Err(DecompositionError::InvalidValues {
                    variable: variable.to_string(),
                    reason: format!("{} is not an integral id", v),
                })
            }
        })
        .collect()
}

/// A sample held as one polars frame per entity level.
///
/// Columns other than ids and weights are variables of their frame's level.
/// Lookup searches the person, SPM unit and tax unit frames in that order.
#[derive(Debug, Clone)]
pub struct FrameSimulation {
    person: DataFrame,
    spm_unit: DataFrame,
    tax_unit: Option<DataFrame>,
    period: u32,
}

/// Builder for [`FrameSimulation`].
#[derive(Debug, Clone)]
pub struct FrameSimulationBuilder {
    person: DataFrame,
    spm_unit: Option<DataFrame>,
    tax_unit: Option<DataFrame>,
    period: u32,
}

impl FrameSimulationBuilder {
    pub fn spm_units(&mut self, frame: DataFrame) -> &mut Self {
        self.spm_unit = Some(frame);
        self
    }

    pub fn tax_units(&mut self, frame: DataFrame) -> &mut Self {
        self.tax_unit = Some(frame);
        self
    }

    pub fn period(&mut self, period: u32) -> &mut Self {
        self.period = period;
        self
    }

    /// Validates the id and weight columns of every frame.
    pub fn build(&self) -> Result<FrameSimulation, DecompositionError> {
        let spm_unit = self
            .spm_unit
            .clone()
            .ok_or_else(|| DecompositionError::UnknownVariable {
                variable: EntityLevel::SpmUnit.id_variable().to_string(),
            })?;

        require_columns(
            &self.person,
            &[
                EntityLevel::Person.id_variable(),
                EntityLevel::SpmUnit.person_link_variable(),
                EntityLevel::Person.weight_variable(),
            ],
        )?;
        require_columns(
            &spm_unit,
            &[
                EntityLevel::SpmUnit.id_variable(),
                EntityLevel::SpmUnit.weight_variable(),
            ],
        )?;
        if let Some(tax_unit) = &self.tax_unit {
            require_columns(&self.person, &[EntityLevel::TaxUnit.person_link_variable()])?;
            require_columns(
                tax_unit,
                &[
                    EntityLevel::TaxUnit.id_variable(),
                    EntityLevel::TaxUnit.weight_variable(),
                ],
            )?;
        }

        Ok(FrameSimulation {
            person: self.person.clone(),
            spm_unit,
            tax_unit: self.tax_unit.clone(),
            period: self.period,
        })
    }
}

fn require_columns(frame: &DataFrame, columns: &[&str]) -> Result<(), DecompositionError> {
    for column in columns {
        if frame.column(column).is_err() {
            return Err(DecompositionError::UnknownVariable {
                variable: column.to_string(),
            });
        }
    }
    Ok(())
}

/// Reads a column as `f64`, failing on nulls and non-finite values.
fn column_values(frame: &DataFrame, name: &str) -> Result<Vec<f64>, DecompositionError> {
    let column = frame
        .column(name)
        .map_err(|_| DecompositionError::UnknownVariable {
            variable: name.to_string(),
        })?
        .cast(&DataType::Float64)?;
    let values = column.f64()?;
    if values.null_count() > 0 {
        return Err(DecompositionError::InvalidValues {
            variable: name.to_string(),
            reason: format!("{} null values", values.null_count()),
        });
    }
    let values: Vec<f64> = values.into_no_null_iter().collect();
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(DecompositionError::InvalidValues {
            variable: name.to_string(),
            reason: format!("non-finite value {}", bad),
        });
    }
    Ok(values)
}

impl FrameSimulation {
    /// Starts a builder from the person frame. The default period is 2024.
    pub fn builder(person: DataFrame) -> FrameSimulationBuilder {
        FrameSimulationBuilder {
            person,
            spm_unit: None,
            tax_unit: None,
            period: crate::config::DEFAULT_PERIOD,
        }
    }

    /// Loads `person.csv`, `spm_unit.csv` and, when present, `tax_unit.csv`
    /// from a directory.
    pub fn from_csv_dir(dir: impl AsRef<Path>, period: u32) -> Result<Self, DecompositionError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(DecompositionError::SampleLoad {
                locator: dir.display().to_string(),
                reason: "not a directory".to_string(),
            });
        }
        let person = read_csv(&dir.join("person.csv"))?;
        let spm_unit = read_csv(&dir.join("spm_unit.csv"))?;
        let tax_path = dir.join("tax_unit.csv");

        let mut builder = FrameSimulation::builder(person);
        builder.spm_units(spm_unit).period(period);
        if tax_path.is_file() {
            builder.tax_units(read_csv(&tax_path)?);
        }
        let sim = builder.build()?;
        info!(
            dataset = %dir.display(),
            persons = sim.person.height(),
            spm_units = sim.spm_unit.height(),
            "loaded sample"
        );
        Ok(sim)
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    fn frame(&self, level: EntityLevel) -> Option<&DataFrame> {
        match level {
            EntityLevel::Person => Some(&self.person),
            EntityLevel::SpmUnit => Some(&self.spm_unit),
            EntityLevel::TaxUnit => self.tax_unit.as_ref(),
        }
    }

    /// Entity level whose frame holds `variable`.
    pub fn level_of(&self, variable: &str) -> Option<EntityLevel> {
        [EntityLevel::Person, EntityLevel::SpmUnit, EntityLevel::TaxUnit]
            .into_iter()
            .find(|&level| {
                self.frame(level)
                    .is_some_and(|frame| frame.column(variable).is_ok())
            })
    }

    fn level_weights(&self, level: EntityLevel) -> Result<Vec<f64>, DecompositionError> {
        let frame = self
            .frame(level)
            .ok_or_else(|| DecompositionError::UnknownVariable {
                variable: level.weight_variable().to_string(),
            })?;
        column_values(frame, level.weight_variable())
    }

    fn level_membership(
        &self,
        level: EntityLevel,
    ) -> Result<UnitMembership<i64>, DecompositionError> {
        let unit_frame = self
            .frame(level)
            .ok_or_else(|| DecompositionError::UnknownVariable {
                variable: level.id_variable().to_string(),
            })?;
        let unit_ids = ids_from_values(
            level.id_variable(),
            &column_values(unit_frame, level.id_variable())?,
        )?;
        let links = ids_from_values(
            level.person_link_variable(),
            &column_values(&self.person, level.person_link_variable())?,
        )?;
        UnitMembership::new(&unit_ids, &links)
    }

    /// Re-expresses `values` held at `source` at the `target` level.
    fn remap(
        &self,
        values: &[f64],
        source: EntityLevel,
        target: EntityLevel,
    ) -> Result<Vec<f64>, DecompositionError> {
        match (source, target) {
            (s, t) if s == t => Ok(values.to_vec()),
            (EntityLevel::Person, unit) => self.level_membership(unit)?.aggregate(values),
            (unit, EntityLevel::Person) => self.level_membership(unit)?.project(values),
            (from, to) => {
                let per_person = self.level_membership(from)?.split_evenly(values)?;
                self.level_membership(to)?.aggregate(&per_person)
            }
        }
    }
}

impl Microsimulation for FrameSimulation {
    fn calc(
        &self,
        variable: &str,
        period: u32,
        map_to: Option<EntityLevel>,
    ) -> Result<WeightedSeries, DecompositionError> {
        if period != self.period {
            return Err(DecompositionError::PeriodUnavailable {
                requested: period,
                available: self.period,
            });
        }
        let source = self
            .level_of(variable)
            .ok_or_else(|| DecompositionError::UnknownVariable {
                variable: variable.to_string(),
            })?;
        let frame = self.frame(source).ok_or_else(|| DecompositionError::UnknownVariable {
            variable: variable.to_string(),
        })?;

        let values = column_values(frame, variable)?;
        if values.is_empty() {
            return Err(DecompositionError::EmptyResult {
                variable: variable.to_string(),
            });
        }

        let target = map_to.unwrap_or(source);
        debug!(variable, %source, %target, "calc");
        let values = self.remap(&values, source, target)?;
        WeightedSeries::new(values, self.level_weights(target)?)
    }

    fn membership(
        &self,
        level: EntityLevel,
        period: u32,
    ) -> Result<UnitMembership<i64>, DecompositionError> {
        if period != self.period {
            return Err(DecompositionError::PeriodUnavailable {
                requested: period,
                available: self.period,
            });
        }
        self.level_membership(level)
    }
}

fn read_csv(path: &Path) -> Result<DataFrame, DecompositionError> {
    if !path.is_file() {
        return Err(DecompositionError::SampleLoad {
            locator: path.display().to_string(),
            reason: "file not found".to_string(),
        });
    }
    let frame = LazyCsvReader::new(path)
        .with_has_header(true)
        .finish()?
        .collect()?;
    Ok(frame)
}

/// Produces samples from locators such as dataset paths.
pub trait SampleLoader {
    fn load(&self, locator: &str) -> Result<Box<dyn Microsimulation>, DecompositionError>;
}

/// Loads samples from directories of CSV files.
#[derive(Debug, Clone)]
pub struct CsvSampleLoader {
    root: Option<PathBuf>,
    period: u32,
}

impl CsvSampleLoader {
    pub fn new(period: u32) -> Self {
        Self { root: None, period }
    }

    /// Resolves relative locators against `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }
}

impl SampleLoader for CsvSampleLoader {
    fn load(&self, locator: &str) -> Result<Box<dyn Microsimulation>, DecompositionError> {
        let path = match &self.root {
            Some(root) => root.join(locator),
            None => PathBuf::from(locator),
        };
        Ok(Box::new(FrameSimulation::from_csv_dir(path, self.period)?))
    }
}
