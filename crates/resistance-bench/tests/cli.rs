use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

const VALID: &str = r#"
run_id: "cli_check"
models:
  - name: "tuned"
    kind: "tuned"
evaluation:
  belief_model: "tuned"
outputs:
  jsonl: "out/{run_id}/results.jsonl"
  summary_md: "out/{run_id}/summary.md"
  plots_dir: "out/{run_id}/plots"
"#;

#[test]
fn validate_only_skips_the_analysis() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("config.yaml");
    fs::write(&path, VALID).expect("write config");

    cargo_bin_cmd!("resistance-bench")
        .current_dir(dir.path())
        .arg("--config")
        .arg(&path)
        .arg("--validate-only")
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded configuration 'cli_check'"))
        .stdout(predicate::str::contains("Validation-only mode"));

    assert!(!dir.path().join("out").exists());
}

#[test]
fn unknown_model_is_reported() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("config.yaml");
    fs::write(
        &path,
        VALID.replace("belief_model: \"tuned\"", "belief_model: \"ghost\""),
    )
    .expect("write config");

    cargo_bin_cmd!("resistance-bench")
        .arg("--config")
        .arg(&path)
        .arg("--validate-only")
        .assert()
        .failure()
        .stderr(predicate::str::contains("evaluation.belief_model"));
}

#[test]
fn missing_config_names_the_path() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("absent.yaml");

    cargo_bin_cmd!("resistance-bench")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.yaml"));
}
