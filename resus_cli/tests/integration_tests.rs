use assert_cmd::Command;
use predicates::prelude::*;

fn resus() -> Command {
    Command::cargo_bin("resus").unwrap()
}

#[test]
fn test_help_lists_subcommands() {
    resus()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("weight"))
        .stdout(predicate::str::contains("assess"))
        .stdout(predicate::str::contains("simulate"));
}

#[test]
fn test_weight_from_length_table() {
    resus()
        .args(["weight", "--length-cm", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("14.0 kg"))
        .stdout(predicate::str::contains("LengthTable"))
        .stdout(predicate::str::contains("5.5 mm"))
        .stdout(predicate::str::contains("28 J"))
        .stdout(predicate::str::contains("280 mL"));
}

#[test]
fn test_actual_weight_beats_length() {
    resus()
        .args(["weight", "--actual-kg", "23.4", "--length-cm", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("23.4 kg"))
        .stdout(predicate::str::contains("Actual"));
}

#[test]
fn test_weight_from_age_formula() {
    resus()
        .args(["weight", "--age-years", "6"])
        .assert()
        .success()
        .stdout(predicate::str::contains("20.0 kg"))
        .stdout(predicate::str::contains("AgeFormulaPrimary"))
        // Secondary formula shown for comparison, never selected
        .stdout(predicate::str::contains("25.0 kg"));
}

#[test]
fn test_weight_default_fallback() {
    resus()
        .arg("weight")
        .assert()
        .success()
        .stdout(predicate::str::contains("10.0 kg"))
        .stdout(predicate::str::contains("Default"))
        .stdout(predicate::str::contains("Low"));
}

#[test]
fn test_weight_for_age_advisory() {
    resus()
        .args(["weight", "--actual-kg", "3.0", "--age-years", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Advisory"))
        .stdout(predicate::str::contains("TooLow"));
}

#[test]
fn test_assess_hypoglycemia_fires_with_dose() {
    let temp_dir = tempfile::tempdir().unwrap();

    resus()
        .args([
            "--data-dir",
            temp_dir.path().to_str().unwrap(),
            "assess",
            "--actual-kg",
            "12",
            "--glucose",
            "2.0",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hypoglycemia"))
        .stdout(predicate::str::contains("24 mL"))
        .stdout(predicate::str::contains("IV/IO"))
        .stdout(predicate::str::contains("1 critical trigger(s) fired"));

    // Audit trail was written
    let audit = std::fs::read_to_string(temp_dir.path().join("audit/assessment.jsonl")).unwrap();
    assert!(audit.contains("weight_resolved"));
    assert!(audit.contains("trigger_fired"));
}

#[test]
fn test_assess_mg_dl_converts_before_threshold() {
    let temp_dir = tempfile::tempdir().unwrap();

    resus()
        .args([
            "--data-dir",
            temp_dir.path().to_str().unwrap(),
            "assess",
            "--actual-kg",
            "12",
            "--glucose",
            "50",
            "--glucose-unit",
            "mgdl",
            "--dry-run",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hypoglycemia"));
}

#[test]
fn test_assess_all_normal_is_quiet() {
    let temp_dir = tempfile::tempdir().unwrap();

    resus()
        .args([
            "--data-dir",
            temp_dir.path().to_str().unwrap(),
            "assess",
            "--actual-kg",
            "12",
            "--breathing",
            "yes",
            "--pulse",
            "yes",
            "--glucose",
            "5.0",
            "--cap-refill",
            "normal",
            "--dry-run",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("No critical triggers fired"));
}

#[test]
fn test_assess_shock_bolus_scales_with_weight() {
    let temp_dir = tempfile::tempdir().unwrap();

    resus()
        .args([
            "--data-dir",
            temp_dir.path().to_str().unwrap(),
            "assess",
            "--actual-kg",
            "15",
            "--cap-refill",
            "prolonged",
            "--dry-run",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Shock"))
        .stdout(predicate::str::contains("300 mL"));
}

#[test]
fn test_assess_dry_run_writes_nothing() {
    let temp_dir = tempfile::tempdir().unwrap();

    resus()
        .args([
            "--data-dir",
            temp_dir.path().to_str().unwrap(),
            "assess",
            "--actual-kg",
            "12",
            "--glucose",
            "2.0",
            "--dry-run",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"));

    assert!(!temp_dir.path().join("audit/assessment.jsonl").exists());
}

#[test]
fn test_simulate_produces_handover_csv() {
    let temp_dir = tempfile::tempdir().unwrap();

    resus()
        .args(["--data-dir", temp_dir.path().to_str().unwrap(), "simulate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("14.0 kg"))
        .stdout(predicate::str::contains("Trigger fired"))
        .stdout(predicate::str::contains("Reassessment due"))
        .stdout(predicate::str::contains("Second bolus"))
        .stdout(predicate::str::contains("Escalation spawned"))
        .stdout(predicate::str::contains("Counts:"))
        .stdout(predicate::str::contains("Handover exported"));

    let csv = std::fs::read_to_string(temp_dir.path().join("handover.csv")).unwrap();
    assert!(csv.starts_with("id,template_id,title,priority,status"));
    assert!(csv.contains("fluid_bolus"));
    assert!(csv.contains("inotrope_support"));

    // Audit log recorded the whole run
    let audit = std::fs::read_to_string(temp_dir.path().join("audit/simulation.jsonl")).unwrap();
    assert!(audit.contains("weight_resolved"));
    assert!(audit.contains("intervention_created"));
    assert!(audit.contains("status_changed"));
}
