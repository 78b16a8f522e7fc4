mod common;

use common::{assert_close, FlatSample};
use spm_decomposition::{compute_tax_gap, FrameSimulation};

fn linear_sample(incomes: &[f64]) -> FrameSimulation {
    let computed: Vec<f64> = incomes.iter().map(|i| 0.12 * i).collect();
    let reported: Vec<f64> = incomes.iter().map(|i| 0.10 * i).collect();
    FlatSample::new(&vec![1.0; incomes.len()])
        .spm_unit("spm_unit_total_income_reported", incomes)
        .spm_unit("spm_unit_federal_tax", &computed)
        .spm_unit("spm_unit_federal_tax_reported", &reported)
        .build()
}

#[test]
fn test_linear_incomes() -> Result<(), Box<dyn std::error::Error>> {
    let incomes: Vec<f64> = (1..=100).map(|i| 1_000.0 * i as f64).collect();
    let deciles = compute_tax_gap(&linear_sample(&incomes), 2024)?;

    assert_eq!(deciles.len(), 10);
    for (k, d) in deciles.iter().enumerate() {
        assert_eq!(d.decile, k + 1);
        // units 10k+1 ..= 10k+10
        assert_close(d.mean_income, 1_000.0 * (10.0 * k as f64 + 5.5));
        assert!((d.gap - 0.02 * d.mean_income).abs() < 1e-6);
        assert!((d.gap - (d.computed_federal_tax - d.reported_federal_tax)).abs() < 1e-9);
    }
    for pair in deciles.windows(2) {
        assert!(pair[1].mean_income >= pair[0].mean_income);
    }
    Ok(())
}

#[test]
fn test_ties_leave_empty_deciles() -> Result<(), Box<dyn std::error::Error>> {
    let deciles = compute_tax_gap(&linear_sample(&[50_000.0; 12]), 2024)?;
    assert_eq!(deciles.len(), 10);
    assert_close(deciles[0].mean_income, 50_000.0);
    assert!((deciles[0].gap - 1_000.0).abs() < 1e-6);
    for d in &deciles[1..] {
        assert_eq!(d.mean_income, 0.0);
        assert_eq!(d.computed_federal_tax, 0.0);
        assert_eq!(d.reported_federal_tax, 0.0);
        assert_eq!(d.gap, 0.0);
    }
    Ok(())
}

#[test]
fn test_missing_tax_variable_aborts() {
    let sim = FlatSample::new(&[1.0, 1.0])
        .spm_unit("spm_unit_total_income_reported", &[1.0, 2.0])
        .spm_unit("spm_unit_federal_tax", &[0.0, 0.0])
        .build();
    let err = compute_tax_gap(&sim, 2024).unwrap_err();
    assert!(err.is_missing_variable());
}
