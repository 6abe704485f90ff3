//! End-to-end tests driving the public `rulecov-core` API over rule files on
//! disk.

use std::path::{Path, PathBuf};

use rulecov_core::{CoverageConfig, CoverageDetail, ProjectReport, check_paths};

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn rule_file(name: &str, xpath: &str, example: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<ruleset name="e2e">
    <rule name="{name}" message="m">
        <properties>
            <property name="xpath">
                <value>
<![CDATA[
{xpath}
]]>
                </value>
            </property>
        </properties>
        <example>
<![CDATA[
{example}
]]>
        </example>
    </rule>
</ruleset>
"#
    )
}

fn check_dir(dir: &Path) -> ProjectReport {
    check_paths(&[dir.to_path_buf()], &CoverageConfig::default()).unwrap()
}

// ============================================================================
// Fixture tree
// ============================================================================

#[test]
fn fixtures_report_covered_and_uncovered_rules() {
    let report = check_dir(&fixtures());
    assert_eq!(report.files_checked, 2);
    assert!(report.failures.is_empty());
    assert!(!report.overall_success());
    assert_eq!(report.uncovered_rules(), 1);

    // sorted by path: covered/ before uncovered/
    assert!(report.files[0].path.ends_with("covered/AvoidPublicTest.xml"));
    assert!(report.files[1].path.ends_with("uncovered/MissingVisibility.xml"));
    assert!(report.files[0].rules[0].is_covered());
    assert!(!report.files[1].rules[0].is_covered());
}

#[test]
fn uncovered_attribute_points_at_xpath_line() {
    let report = check_dir(&fixtures().join("uncovered"));
    let rule = &report.files[0].rules[0];
    let attributes = rule
        .coverage
        .coverage
        .iter()
        .find(|r| r.category == rulecov_core::CoverageCategory::Attributes)
        .unwrap();
    assert!(!attributes.success);
    assert!(attributes.details.contains(&CoverageDetail::MissingAttribute {
        attribute: "Visibility".into(),
        line: Some(8),
    }));
}

#[test]
fn explicit_file_is_checked() {
    let path = fixtures().join("covered/AvoidPublicTest.xml");
    let report = check_paths(&[path], &CoverageConfig::default()).unwrap();
    assert_eq!(report.files_checked, 1);
    assert!(report.overall_success());
}

// ============================================================================
// Scenarios on temporary trees
// ============================================================================

#[test]
fn differently_named_public_method_covers_both_attributes() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("AvoidPublicTest.xml"),
        rule_file(
            "AvoidPublicTest",
            r#"//Method[@Visibility='public' and @Name="test"]"#,
            "public class Foo {\n    public void testSomething() {} // ❌ public test\n}",
        ),
    )
    .unwrap();

    let report = check_dir(dir.path());
    let rule = &report.files[0].rules[0];
    assert!(rule.is_covered(), "{:?}", rule.coverage.uncovered_branches);
    assert_eq!(rule.analysis.attributes, vec!["Visibility", "Name"]);
}

#[test]
fn comparison_needs_differing_demonstrated_values() {
    let dir = tempfile::tempdir().unwrap();
    let xpath = "//Method[@Name='x' and @BeginLine != @EndLine]";
    std::fs::write(
        dir.path().join("Differ.xml"),
        rule_file(
            "Differ",
            xpath,
            "// Name: x\n// BeginLine: 5\n// EndLine: 10\npublic void x() {} // ❌ spans lines",
        ),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("Same.xml"),
        rule_file(
            "Same",
            xpath,
            "// Name: x\n// BeginLine: 5\n// EndLine: 5\npublic void x() {} // ❌ one line",
        ),
    )
    .unwrap();

    let report = check_dir(dir.path());
    let by_name = |name: &str| {
        report
            .rules()
            .find(|(_, r)| r.rule_name == name)
            .map(|(_, r)| r)
            .unwrap()
    };
    let conditional_success = |name: &str| {
        by_name(name)
            .coverage
            .coverage
            .iter()
            .filter(|r| matches!(r.category, rulecov_core::CoverageCategory::Conditional { .. }))
            .all(|r| r.success)
    };
    assert!(conditional_success("Differ"));
    assert!(!conditional_success("Same"));
}

#[test]
fn rule_without_examples_is_uncovered() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("Bare.xml"),
        r#"<rule name="Bare"><properties><property name="xpath" value="//Method[@Static]"/></properties></rule>"#,
    )
    .unwrap();
    let report = check_dir(dir.path());
    let rule = &report.files[0].rules[0];
    assert!(!rule.is_covered());
    assert!(
        rule.coverage
            .uncovered_branches
            .iter()
            .any(|b| b.contains("No example content to check")),
        "{:?}",
        rule.coverage.uncovered_branches
    );
}

#[test]
fn non_xml_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "//Method").unwrap();
    std::fs::write(dir.path().join("Foo.cls"), "public class Foo {}").unwrap();
    let report = check_dir(dir.path());
    assert_eq!(report.files_checked, 0);
    assert!(report.overall_success());
}

#[test]
fn excluded_directories_are_pruned() {
    let dir = tempfile::tempdir().unwrap();
    let skipped = dir.path().join("target");
    std::fs::create_dir_all(&skipped).unwrap();
    std::fs::write(skipped.join("Rule.xml"), rule_file("R", "//Method", "void a() {}")).unwrap();
    let report = check_dir(dir.path());
    assert_eq!(report.files_checked, 0);
}

#[test]
fn max_files_limit_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["A", "B", "C"] {
        std::fs::write(
            dir.path().join(format!("{name}.xml")),
            rule_file(name, "//Method", "void a() {}"),
        )
        .unwrap();
    }
    let config = CoverageConfig::builder().max_files(Some(2)).build();
    let result = check_paths(&[dir.path().to_path_buf()], &config);
    assert!(matches!(
        result,
        Err(rulecov_core::CoverageError::TooManyFiles { limit: 2, .. })
    ));
}

#[test]
fn malformed_rule_file_becomes_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Broken.xml"), "<ruleset><rule name=\"Open\">").unwrap();
    std::fs::write(
        dir.path().join("Fine.xml"),
        rule_file("Fine", "//Method", "void a() {} // ❌ method"),
    )
    .unwrap();

    let report = check_dir(dir.path());
    assert_eq!(report.files_checked, 2);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].path.ends_with("Broken.xml"));
    assert!(report.failures[0].error.starts_with("Malformed rule file"));
    assert_eq!(report.files.len(), 1);
}

#[cfg(unix)]
#[test]
fn symlinked_rule_file_becomes_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let real = dir.path().join("Real.txt");
    std::fs::write(&real, rule_file("Linked", "//Method", "void a() {}")).unwrap();
    std::os::unix::fs::symlink(&real, dir.path().join("Linked.xml")).unwrap();

    let report = check_dir(dir.path());
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].path.ends_with("Linked.xml"));
    assert_eq!(report.files_checked, 1);
}
