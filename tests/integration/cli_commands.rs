#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/employees.json")
}

fn config_dir() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("cli.toml");
    (dir, path)
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("valid json")
}

#[test]
fn format_uppercases_identifiers() {
    let (_dir, config) = config_dir();
    let output = cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args(["format", "select e from Employee e where e.name = 'x'"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(
        String::from_utf8(output).expect("utf8").trim(),
        "SELECT e FROM Employee e WHERE e.name = 'x'"
    );

    let output = cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args(["--format", "json", "format", "--lowercase", "SELECT e FROM Employee e"])
        .assert()
        .success()
        .get_output()
        .clone();
    assert_eq!(stdout_json(&output)["text"], "select e from Employee e");
}

#[test]
fn validate_exit_codes() {
    let (_dir, config) = config_dir();
    cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args(["--quiet", "validate", "SELECT e FROM Employee e WHERE e.name = 'x'"])
        .arg("--metadata")
        .arg(fixture())
        .assert()
        .success();

    let output = cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args(["--format", "json", "validate", "SELECT e FROM Employee e WHERE e.nam = 'x'"])
        .arg("--metadata")
        .arg(fixture())
        .assert()
        .code(2)
        .get_output()
        .clone();
    let json = stdout_json(&output);
    assert_eq!(json["grammar"], "jpql-2.1");
    assert_eq!(json["semantic"], true);
    assert_eq!(json["diagnostics"][0]["key"], "PATH_NOT_RESOLVABLE");
}

#[test]
fn validate_without_metadata_checks_grammar_only() {
    let (_dir, config) = config_dir();
    let output = cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args([
            "--grammar",
            "jpql-1.0",
            "--format",
            "json",
            "validate",
            "SELECT e FROM Employee e JOIN e.phones p ON p.number = '1'",
        ])
        .assert()
        .code(2)
        .get_output()
        .clone();
    let json = stdout_json(&output);
    assert_eq!(json["grammar"], "jpql-1.0");
    assert_eq!(json["semantic"], false);
    let keys: Vec<&str> = json["diagnostics"]
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|d| d["key"].as_str())
        .collect();
    assert_eq!(keys, vec!["IDENTIFIER_NOT_SUPPORTED"]);
}

#[test]
fn rename_field_reports_changes() {
    let (_dir, config) = config_dir();
    let output = cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args([
            "--format",
            "json",
            "rename",
            "SELECT e FROM Employee e WHERE e.name = 'x' ORDER BY e.name",
            "field",
            "name",
            "fullName",
            "--type",
            "com.acme.Employee",
        ])
        .arg("--metadata")
        .arg(fixture())
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output);
    assert_eq!(json["changes"], 2);
    assert_eq!(
        json["text"],
        "SELECT e FROM Employee e WHERE e.fullName = 'x' ORDER BY e.fullName"
    );
}

#[test]
fn rename_field_requires_type() {
    let (_dir, config) = config_dir();
    cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args(["rename", "SELECT e FROM Employee e", "field", "name", "label"])
        .assert()
        .code(1);
}

#[test]
fn complete_lists_entities_after_from() {
    let (_dir, config) = config_dir();
    let output = cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args(["--format", "json", "complete", "SELECT e FROM ", "--cursor", "14"])
        .arg("--metadata")
        .arg(fixture())
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output);
    let labels: Vec<&str> = json
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|p| p["label"].as_str())
        .collect();
    assert_eq!(labels, vec!["Employee", "Phone"]);
    assert_eq!(json[0]["kind"], "entity");
}

#[test]
fn grammars_lists_chains() {
    let output = cargo_bin_cmd!("jpql")
        .args(["--format", "json", "grammars"])
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output);
    let grammars = json.as_array().expect("array");
    assert_eq!(grammars.len(), 5);
    let eclipselink = grammars
        .iter()
        .find(|g| g["name"] == "eclipselink-2.1")
        .expect("eclipselink");
    assert_eq!(eclipselink["version"], "2.1");
    assert_eq!(eclipselink["provider"], "EclipseLink");
    assert_eq!(eclipselink["chain"][1], "jpql-2.1");
}

#[test]
fn profile_lifecycle() {
    let (_dir, config) = config_dir();
    cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args(["profile", "set", "legacy", "--grammar-name", "jpql-1.0", "--style", "lower"])
        .arg("--metadata")
        .arg(fixture())
        .assert()
        .success();
    assert!(config.exists());
    let written = fs::read_to_string(&config).expect("config written");
    assert!(written.contains("legacy"));

    cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args(["profile", "default", "legacy"])
        .assert()
        .success();

    let output = cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args(["--format", "json", "profile", "list"])
        .assert()
        .success()
        .get_output()
        .clone();
    assert_eq!(stdout_json(&output), serde_json::json!(["legacy (default)"]));

    let output = cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args(["--format", "json", "profile", "show", "legacy"])
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output);
    assert_eq!(json["grammar"], "jpql-1.0");
    assert_eq!(json["style"], "lower");

    // The default profile applies its grammar, style and metadata.
    let output = cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args(["format", "SELECT e FROM Employee e"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(
        String::from_utf8(output).expect("utf8").trim(),
        "select e from Employee e"
    );
    let output = cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args(["--format", "json", "validate", "SELECT e FROM Employee e"])
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output);
    assert_eq!(json["grammar"], "jpql-1.0");
    assert_eq!(json["semantic"], true);

    cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args(["profile", "delete", "legacy"])
        .assert()
        .success();
    cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args(["profile", "show", "legacy"])
        .assert()
        .code(1);
}

#[test]
fn unknown_profile_and_grammar_fail() {
    let (_dir, config) = config_dir();
    cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args(["--profile", "missing", "format", "SELECT e FROM Employee e"])
        .assert()
        .code(1);
    cargo_bin_cmd!("jpql")
        .arg("--config")
        .arg(&config)
        .args(["profile", "set", "bad", "--grammar-name", "hql-6"])
        .assert()
        .code(1);
}

#[test]
fn profiling_counters_go_to_stderr() {
    let (_dir, config) = config_dir();
    let output = cargo_bin_cmd!("jpql")
        .env("JPQL_PROFILE", "1")
        .arg("--config")
        .arg(&config)
        .args(["validate", "SELECT e FROM Employee e"])
        .arg("--metadata")
        .arg(fixture())
        .assert()
        .success()
        .get_output()
        .clone();
    let stderr = String::from_utf8(output.stderr).expect("utf8");
    let line = stderr
        .lines()
        .find_map(|line| line.strip_prefix("profile: "))
        .expect("profile line");
    let snapshot: Value = serde_json::from_str(line).expect("json");
    assert_eq!(snapshot["parse_count"], 1);
    assert_eq!(snapshot["semantic_validation_count"], 1);
}
