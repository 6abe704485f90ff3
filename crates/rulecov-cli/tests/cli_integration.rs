use assert_cmd::Command;
use predicates::prelude::*;

fn rulecov() -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("rulecov");
    cmd.current_dir(workspace_root());
    cmd.env_remove("RULECOV_LOG");
    cmd
}

fn workspace_root() -> &'static std::path::Path {
    use std::sync::OnceLock;

    static ROOT: OnceLock<std::path::PathBuf> = OnceLock::new();
    ROOT.get_or_init(|| {
        let manifest_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        for ancestor in manifest_dir.ancestors() {
            let cargo_toml = ancestor.join("Cargo.toml");
            if let Ok(content) = std::fs::read_to_string(&cargo_toml) {
                if content.contains("[workspace]") || content.contains("[workspace.") {
                    return ancestor.to_path_buf();
                }
            }
        }
        panic!(
            "Failed to locate workspace root from CARGO_MANIFEST_DIR={}",
            manifest_dir.display()
        );
    })
    .as_path()
}

fn config_file(body: &str) -> tempfile::NamedTempFile {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

// ============================================================================
// Exit codes
// ============================================================================

#[test]
fn test_covered_rule_exits_zero() {
    rulecov()
        .arg("tests/fixtures/covered")
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("AvoidPublicTest (covered)"))
        .stdout(predicate::str::contains("All 1 rules covered in 1 files"));
}

#[test]
fn test_uncovered_rule_exits_one() {
    rulecov()
        .arg("tests/fixtures/uncovered")
        .arg("--no-color")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("MissingVisibility (uncovered)"))
        .stdout(predicate::str::contains("@Visibility (line 8)"))
        .stdout(predicate::str::contains("Found 1 uncovered of 1 rules in 1 files"));
}

#[test]
fn test_mixed_directory_exits_one() {
    rulecov()
        .arg("tests/fixtures/covered")
        .arg("tests/fixtures/uncovered")
        .arg("--no-color")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Found 1 uncovered of 2 rules in 2 files"));
}

#[test]
fn test_missing_config_exits_two() {
    rulecov()
        .arg("tests/fixtures/covered")
        .arg("--config")
        .arg("does/not/exist.toml")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_unknown_flag_exits_two() {
    rulecov().arg("--bogus").assert().code(2);
}

// ============================================================================
// Text output
// ============================================================================

#[test]
fn test_text_shows_file_location() {
    rulecov()
        .arg("tests/fixtures/uncovered")
        .arg("--no-color")
        .assert()
        .failure()
        .stdout(predicate::str::is_match(r"MissingVisibility\.xml:\d+: attribute @Visibility").unwrap());
}

#[test]
fn test_text_shows_category_marks() {
    rulecov()
        .arg("tests/fixtures/uncovered")
        .arg("--no-color")
        .assert()
        .failure()
        .stdout(predicate::str::contains("✓ Node types"))
        .stdout(predicate::str::contains("✗ Attributes"));
}

#[test]
fn test_show_hardcoded() {
    rulecov()
        .arg("tests/fixtures/covered")
        .arg("--no-color")
        .arg("--show-hardcoded")
        .assert()
        .success()
        .stdout(predicate::str::contains("hardcoded: 'public', \"test\""));
}

#[test]
fn test_hardcoded_hidden_by_default() {
    rulecov()
        .arg("tests/fixtures/covered")
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("hardcoded:").not());
}

#[test]
fn test_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    rulecov()
        .arg(dir.path())
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("No rule files found"));
}

// ============================================================================
// JSON output
// ============================================================================

#[test]
fn test_json_output_parses() {
    let output = rulecov()
        .arg("tests/fixtures/uncovered")
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["filesChecked"], 1);
    let rule = &json["files"][0]["rules"][0];
    assert_eq!(rule["ruleName"], "MissingVisibility");
    assert_eq!(rule["coverage"]["overallSuccess"], false);
    let branches = rule["coverage"]["uncoveredBranches"].as_array().unwrap();
    assert!(
        branches
            .iter()
            .any(|b| b.as_str().unwrap().contains("@Visibility (line 8)")),
        "{branches:?}"
    );
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_config_disables_attribute_checks() {
    let config = config_file(
        r#"[checks]
attributes = false
conditionals = false
"#,
    );
    rulecov()
        .arg("tests/fixtures/uncovered")
        .arg("--no-color")
        .arg("--config")
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("MissingVisibility (covered)"));
}

#[test]
fn test_config_exclude_skips_files() {
    let config = config_file(
        r#"exclude = ["uncovered/**"]
"#,
    );
    rulecov()
        .arg("tests/fixtures")
        .arg("--no-color")
        .arg("--config")
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("MissingVisibility").not());
}

#[test]
fn test_max_files_exceeded_exits_two() {
    let config = config_file("max_files = 1\n");
    rulecov()
        .arg("tests/fixtures")
        .arg("--config")
        .arg(config.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error:"));
}
