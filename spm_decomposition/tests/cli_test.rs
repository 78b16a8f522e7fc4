use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_run_skip_states() {
    let mut cmd = Command::cargo_bin("spm-decomposition").unwrap();
    cmd.arg("run")
        .arg("--raw")
        .arg("tests/data/raw")
        .arg("--enhanced")
        .arg("tests/data/enhanced")
        .arg("--skip-states");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("SPM Child Poverty Decomposition"))
        .stdout(predicate::str::contains("Census published (2024)"))
        .stdout(predicate::str::contains("Program Effects"))
        .stdout(predicate::str::contains("Federal Tax Gap by Income Decile"));
}

#[test]
fn test_run_exports_json_and_markdown() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let json_path = dir.path().join("decomposition.json");
    let md_path = dir.path().join("decomposition.md");

    let mut cmd = Command::cargo_bin("spm-decomposition")?;
    cmd.arg("run")
        .arg("--raw")
        .arg("tests/data/raw")
        .arg("--enhanced")
        .arg("tests/data/enhanced")
        .arg("--states-template")
        .arg("tests/data/{state}")
        .arg("--states")
        .arg("raw,missing")
        .arg("--output-json")
        .arg(&json_path)
        .arg("--output-markdown")
        .arg(&md_path);
    cmd.assert().success();

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_path)?)?;
    assert_eq!(json["waterfall"]["steps"].as_array().unwrap().len(), 5);
    assert_eq!(json["waterfall"]["deltas"].as_array().unwrap().len(), 4);
    assert_eq!(json["tax_gap_by_decile"].as_array().unwrap().len(), 10);
    assert_eq!(json["metadata"]["raw_dataset"], "tests/data/raw");

    let states = json["state_results"].as_array().unwrap();
    assert_eq!(states.len(), 2);
    assert_eq!(states[0]["state"], "raw");
    assert!(states[0]["computed_child_poverty"].is_number());
    assert_eq!(states[1]["state"], "missing");
    assert!(states[1]["error"].is_string());

    let markdown = std::fs::read_to_string(&md_path)?;
    assert!(markdown.contains("### Program Effects"));
    Ok(())
}

#[test]
fn test_config_file_is_layered_under_flags() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config_path = dir.path().join("config.json");
    std::fs::write(
        &config_path,
        r#"{"raw_dataset": "tests/data/raw", "enhanced_dataset": "tests/data/enhanced", "benchmark_rate": 0.2, "skip_states": true}"#,
    )?;
    let json_path = dir.path().join("out.json");

    let mut cmd = Command::cargo_bin("spm-decomposition")?;
    cmd.arg("run")
        .arg("--config")
        .arg(&config_path)
        .arg("--benchmark")
        .arg("0.15")
        .arg("--output-json")
        .arg(&json_path);
    cmd.assert().success();

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_path)?)?;
    assert_eq!(json["waterfall"]["steps"][0]["value"], 0.15);
    assert!(json["state_results"].as_array().unwrap().is_empty());
    Ok(())
}

#[test]
fn test_programs_subcommand() {
    let mut cmd = Command::cargo_bin("spm-decomposition").unwrap();
    cmd.arg("programs").arg("--data").arg("tests/data/enhanced");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("SNAP"))
        .stdout(predicate::str::contains("EITC + refundable CTC"))
        .stdout(predicate::str::contains("error: Unknown variable: tanf"));
}

#[test]
fn test_tax_gap_subcommand() {
    let mut cmd = Command::cargo_bin("spm-decomposition").unwrap();
    cmd.arg("tax-gap").arg("--data").arg("tests/data/raw");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Federal Tax Gap by Income Decile (2024)"))
        .stdout(predicate::str::contains("Reported tax"));
}

#[test]
fn test_missing_dataset_fails() {
    let mut cmd = Command::cargo_bin("spm-decomposition").unwrap();
    cmd.arg("run")
        .arg("--raw")
        .arg("tests/data/does_not_exist")
        .arg("--enhanced")
        .arg("tests/data/enhanced")
        .arg("--skip-states");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("does_not_exist"));
}

#[test]
fn test_invalid_benchmark_fails() {
    let mut cmd = Command::cargo_bin("spm-decomposition").unwrap();
    cmd.arg("run")
        .arg("--raw")
        .arg("tests/data/raw")
        .arg("--enhanced")
        .arg("tests/data/enhanced")
        .arg("--benchmark")
        .arg("1.5");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}
