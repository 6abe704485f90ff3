//! Text and JSON rendering of a [`ProjectReport`].

use std::fmt::Write as _;
use std::path::Path;

use colored::{ColoredString, Colorize};
use rulecov_core::{CoverageDetail, CoverageResult, ProjectReport, RuleReport};

pub fn error_label() -> ColoredString {
    "error:".red().bold()
}

/// Grouped per file, then per rule, then per category.
pub fn format_text(report: &ProjectReport, show_hardcoded: bool) -> String {
    let mut out = String::new();

    for file in &report.files {
        let _ = writeln!(out, "{}", file.path.display().to_string().as_str().bold());
        if file.rules.is_empty() {
            let _ = writeln!(out, "  {}", "no rules found".dimmed());
        }
        for rule in &file.rules {
            write_rule(&mut out, &file.path, rule, show_hardcoded);
        }
        out.push('\n');
    }

    for failure in &report.failures {
        let _ = writeln!(
            out,
            "{} {}: {}",
            error_label(),
            failure.path.display(),
            failure.error
        );
    }

    let _ = writeln!(out, "{}", summary(report));
    out
}

fn write_rule(out: &mut String, path: &Path, rule: &RuleReport, show_hardcoded: bool) {
    let status = if rule.is_covered() {
        "covered".green()
    } else {
        "uncovered".red()
    };
    let _ = writeln!(out, "  {} ({status})", rule.rule_name.as_str().bold());

    for result in &rule.coverage.coverage {
        write_result(out, path, result);
    }

    if show_hardcoded && !rule.hardcoded_values.is_empty() {
        let values: Vec<&str> = rule
            .hardcoded_values
            .iter()
            .map(|v| v.value.as_str())
            .collect();
        let _ = writeln!(out, "    {} {}", "hardcoded:".yellow(), values.join(", "));
    }
}

fn write_result(out: &mut String, path: &Path, result: &CoverageResult) {
    let mark = if result.success {
        "✓".green()
    } else {
        "✗".red()
    };
    let _ = writeln!(out, "    {mark} {}: {}", result.category, result.message);
    if result.success {
        return;
    }
    for detail in &result.details {
        let Some(label) = describe(detail) else {
            continue;
        };
        let location = match detail.line() {
            Some(line) => format!("{}:{line}", path.display()),
            None => path.display().to_string(),
        };
        let _ = writeln!(out, "      {} {label}", format!("{location}:").as_str().cyan());
    }
}

/// One-line description of an uncovered branch; `None` for informational
/// details.
fn describe(detail: &CoverageDetail) -> Option<String> {
    match detail {
        CoverageDetail::MissingNodeType { node_type, .. } => {
            Some(format!("node type {node_type} not found in examples"))
        }
        CoverageDetail::MissingAttribute { attribute, .. } => {
            Some(format!("attribute @{attribute} not demonstrated"))
        }
        CoverageDetail::MissingOperator { operator, .. } => {
            Some(format!("operator '{operator}' not demonstrated"))
        }
        CoverageDetail::UncoveredConditional {
            expression,
            strategy,
            ..
        } => Some(format!("{strategy} `{expression}` not demonstrated")),
        CoverageDetail::UnimplementedStrategy { strategy, .. } => {
            Some(format!("no checker for {strategy} conditionals"))
        }
        CoverageDetail::ParseFailure { example, reason } => {
            Some(format!("example {example} could not be parsed: {reason}"))
        }
        CoverageDetail::SkippedStrategy { .. }
        | CoverageDetail::DemonstratedValues { .. }
        | CoverageDetail::HeuristicMatch { .. } => None,
    }
}

fn summary(report: &ProjectReport) -> ColoredString {
    let total = report.rules().count();
    let uncovered = report.uncovered_rules();
    let files = report.files_checked;
    if files == 0 {
        return "No rule files found".yellow();
    }
    let line = if uncovered == 0 {
        format!("All {total} rules covered in {files} files")
    } else {
        format!("Found {uncovered} uncovered of {total} rules in {files} files")
    };
    if report.failures.is_empty() && uncovered == 0 {
        line.as_str().green().bold()
    } else {
        line.as_str().red().bold()
    }
}

pub fn format_json(report: &ProjectReport) -> anyhow::Result<String> {
    let mut json = serde_json::to_string_pretty(report)?;
    json.push('\n');
    Ok(json)
}
