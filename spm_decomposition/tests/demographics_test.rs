mod common;

use common::{assert_close, FlatSample};
use polars::prelude::*;
use spm_decomposition::{
    compute_demographic_breakdowns, DecompositionError, EntityLevel, FrameSimulation,
    Microsimulation, WeightedSeries,
};

/// Three children in two households; race is recorded per household.
fn household_race_sample() -> FrameSimulation {
    let person = df!(
        "person_id" => &[1i64, 2, 3],
        "person_spm_unit_id" => &[10i64, 10, 20],
        "person_weight" => &[1.0, 2.0, 4.0],
        "is_child" => &[1.0, 1.0, 1.0],
        "age" => &[3.0, 8.0, 14.0]
    )
    .unwrap();
    let spm_unit = df!(
        "spm_unit_id" => &[10i64, 20],
        "spm_unit_weight" => &[2.0, 4.0],
        "spm_unit_net_income" => &[5.0, 50.0],
        "spm_unit_spm_threshold" => &[10.0, 10.0],
        "cps_race" => &[2.0, 1.0]
    )
    .unwrap();
    FrameSimulation::builder(person)
        .spm_units(spm_unit)
        .build()
        .unwrap()
}

/// Answers every query at the variable's own level.
struct IgnoresMapping(FrameSimulation);

impl Microsimulation for IgnoresMapping {
    fn calc(
        &self,
        variable: &str,
        period: u32,
        _map_to: Option<EntityLevel>,
    ) -> Result<WeightedSeries, DecompositionError> {
        self.0.calc(variable, period, None)
    }
}

#[test]
fn test_age_and_race_groups() -> Result<(), Box<dyn std::error::Error>> {
    let sim = FlatSample::new(&[2.0, 1.0, 1.0, 3.0, 5.0])
        .person("is_child", &[1.0, 1.0, 1.0, 1.0, 0.0])
        .person("age", &[2.0, 5.0, 8.0, 16.0, 40.0])
        .person("cps_race", &[1.0, 2.0, 2.0, 1.0, 1.0])
        .person("is_hispanic", &[1.0, 0.0, 0.0, 0.0, 1.0])
        .spm_unit("spm_unit_net_income", &[9.0, 20.0, 5.0, 30.0, 1.0])
        .spm_unit("spm_unit_spm_threshold", &[10.0; 5])
        .build();

    let breakdowns = compute_demographic_breakdowns(&sim, 2024)?;
    assert!(breakdowns.errors.is_empty());

    let under_six = &breakdowns.by_age[0];
    assert_eq!(under_six.group, "Under 6");
    assert_eq!(under_six.census_rate, Some(0.151));
    assert_close(under_six.rate, 2.0 / 3.0);
    assert_close(under_six.total_children, 3.0);
    assert_close(breakdowns.by_age[1].rate, 1.0);
    assert_close(breakdowns.by_age[2].rate, 0.0);
    assert_close(breakdowns.by_age[2].total_children, 3.0);

    // four race groups then two Hispanic origin groups; the poor adult is excluded
    assert_eq!(breakdowns.by_race.len(), 6);
    let white = &breakdowns.by_race[0];
    assert_close(white.rate, 0.4);
    assert_close(breakdowns.by_race[1].rate, 0.5);
    let hispanic = &breakdowns.by_race[4];
    assert_eq!(hispanic.group, "Hispanic (any race)");
    assert_close(hispanic.rate, 1.0);
    assert_close(hispanic.total_children, 2.0);
    Ok(())
}

#[test]
fn test_zero_weight_group_has_zero_rate_and_count() -> Result<(), Box<dyn std::error::Error>> {
    let sim = FlatSample::new(&[0.0, 4.0])
        .person("is_child", &[1.0, 1.0])
        .person("age", &[3.0, 9.0])
        .spm_unit("spm_unit_net_income", &[1.0, 1.0])
        .spm_unit("spm_unit_spm_threshold", &[10.0, 10.0])
        .build();

    let breakdowns = compute_demographic_breakdowns(&sim, 2024)?;
    // zero weight
    assert_eq!(breakdowns.by_age[0].rate, 0.0);
    assert_eq!(breakdowns.by_age[0].total_children, 0.0);
    // no members
    assert_eq!(breakdowns.by_age[2].rate, 0.0);
    assert_eq!(breakdowns.by_age[2].total_children, 0.0);
    assert_close(breakdowns.by_age[1].rate, 1.0);
    Ok(())
}

#[test]
fn test_missing_optional_variables_are_recorded() -> Result<(), Box<dyn std::error::Error>> {
    let sim = FlatSample::new(&[1.0])
        .person("is_child", &[1.0])
        .person("age", &[7.0])
        .person("is_hispanic", &[0.0])
        .spm_unit("spm_unit_net_income", &[1.0])
        .spm_unit("spm_unit_spm_threshold", &[10.0])
        .build();

    let breakdowns = compute_demographic_breakdowns(&sim, 2024)?;
    assert_eq!(breakdowns.errors.len(), 1);
    assert_eq!(breakdowns.errors[0].variable, "cps_race");
    assert_eq!(breakdowns.by_race.len(), 2);
    assert_eq!(breakdowns.by_race[1].group, "Non-Hispanic");
    assert_close(breakdowns.by_race[1].rate, 1.0);
    Ok(())
}

#[test]
fn test_missing_age_aborts() {
    let sim = FlatSample::new(&[1.0])
        .person("is_child", &[1.0])
        .spm_unit("spm_unit_net_income", &[1.0])
        .spm_unit("spm_unit_spm_threshold", &[10.0])
        .build();
    let err = compute_demographic_breakdowns(&sim, 2024).unwrap_err();
    assert!(err.is_missing_variable());
}

#[test]
fn test_household_race_is_broadcast() -> Result<(), Box<dyn std::error::Error>> {
    let breakdowns = compute_demographic_breakdowns(&household_race_sample(), 2024)?;

    let white = &breakdowns.by_race[0];
    assert_close(white.rate, 0.0);
    assert_close(white.total_children, 4.0);
    let black = &breakdowns.by_race[1];
    assert_close(black.rate, 1.0);
    assert_close(black.total_children, 3.0);
    Ok(())
}

#[test]
fn test_provider_returning_unit_values_is_an_error() {
    let sim = IgnoresMapping(household_race_sample());
    let err = compute_demographic_breakdowns(&sim, 2024).unwrap_err();
    assert!(matches!(
        err,
        DecompositionError::LengthMismatch { expected: 3, found: 2, .. }
    ));
}
