//! Coverage of an XPath's components by a rule's examples.
//!
//! Each category (node types, attributes, operators, one per conditional)
//! yields a [`CoverageResult`]; [`XPathCoverageResult::aggregate`] combines
//! them. Gaps are data: nothing in this module returns an error.

pub mod components;
pub mod conditionals;
pub mod evidence;
pub mod node_types;

pub use components::{check_attributes, check_operators};
pub use conditionals::{ConditionalStrategy, check_conditional};
pub use node_types::check_node_types;

use crate::apex::ApexParser;
use crate::config::CoverageConfig;
use crate::examples::{ExampleData, combined_content};
use crate::location::{LineLocator, LineTarget};
use crate::xpath::{Conditional, XPathAnalysis};
use serde::Serialize;

pub(crate) const NO_CONTENT: &str = "No example content to check";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceKind {
    Valid,
    Violation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageEvidence {
    #[serde(rename = "type")]
    pub kind: EvidenceKind,
    pub count: usize,
    pub required: usize,
    pub description: String,
}

impl CoverageEvidence {
    pub fn new(
        kind: EvidenceKind,
        count: usize,
        required: usize,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            count,
            required,
            description: description.into(),
        }
    }
}

/// What a [`CoverageResult`] was computed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoverageCategory {
    /// The rule has no usable XPath.
    Expression,
    NodeTypes,
    Attributes,
    Operators,
    Conditional {
        conditional: Conditional,
        strategy: ConditionalStrategy,
    },
}

impl std::fmt::Display for CoverageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoverageCategory::Expression => f.write_str("XPath expression"),
            CoverageCategory::NodeTypes => f.write_str("Node types"),
            CoverageCategory::Attributes => f.write_str("Attributes"),
            CoverageCategory::Operators => f.write_str("Operators"),
            CoverageCategory::Conditional { conditional, .. } => {
                write!(f, "Conditional `{}`", conditional.search_text())
            }
        }
    }
}

/// Structured reasons attached to a [`CoverageResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoverageDetail {
    MissingNodeType {
        node_type: String,
        line: Option<usize>,
    },
    MissingAttribute {
        attribute: String,
        line: Option<usize>,
    },
    MissingOperator {
        operator: String,
        line: Option<usize>,
    },
    UncoveredConditional {
        expression: String,
        strategy: ConditionalStrategy,
        line: Option<usize>,
    },
    UnimplementedStrategy {
        strategy: ConditionalStrategy,
        line: Option<usize>,
    },
    SkippedStrategy {
        strategy: ConditionalStrategy,
    },
    DemonstratedValues {
        attribute: String,
        values: Vec<String>,
    },
    /// Credited by a text heuristic because no tree was available.
    HeuristicMatch {
        node_type: String,
    },
    ParseFailure {
        example: usize,
        reason: String,
    },
}

impl CoverageDetail {
    /// Rule-file line the detail points at, if resolved.
    pub fn line(&self) -> Option<usize> {
        match self {
            CoverageDetail::MissingNodeType { line, .. }
            | CoverageDetail::MissingAttribute { line, .. }
            | CoverageDetail::MissingOperator { line, .. }
            | CoverageDetail::UncoveredConditional { line, .. }
            | CoverageDetail::UnimplementedStrategy { line, .. } => *line,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageResult {
    pub category: CoverageCategory,
    pub success: bool,
    pub message: String,
    pub evidence: Vec<CoverageEvidence>,
    pub details: Vec<CoverageDetail>,
}

impl CoverageResult {
    pub fn new(category: CoverageCategory, success: bool, message: impl Into<String>) -> Self {
        Self {
            category,
            success,
            message: message.into(),
            evidence: Vec::new(),
            details: Vec::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: CoverageEvidence) -> Self {
        self.evidence.push(evidence);
        self
    }

    pub fn with_details(mut self, details: impl IntoIterator<Item = CoverageDetail>) -> Self {
        self.details.extend(details);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XPathCoverageResult {
    pub coverage: Vec<CoverageResult>,
    pub uncovered_branches: Vec<String>,
    pub overall_success: bool,
}

impl XPathCoverageResult {
    /// AND of every category's success; failing categories become uncovered
    /// branches, in order.
    pub fn aggregate(coverage: Vec<CoverageResult>) -> Self {
        let uncovered_branches = coverage
            .iter()
            .filter(|r| !r.success)
            .map(|r| format!("{}: {}", r.category, r.message))
            .collect();
        let overall_success = coverage.iter().all(|r| r.success);
        Self {
            coverage,
            uncovered_branches,
            overall_success,
        }
    }
}

/// Inputs shared by every checker for one rule.
pub struct CoverageContext<'a> {
    pub examples: &'a [ExampleData],
    /// All example contents joined by newlines.
    pub content: String,
    pub xpath: &'a str,
    pub parser: &'a dyn ApexParser,
    locator: Option<LineLocator<'a>>,
}

impl<'a> CoverageContext<'a> {
    pub fn new(examples: &'a [ExampleData], xpath: &'a str, parser: &'a dyn ApexParser) -> Self {
        Self {
            examples,
            content: combined_content(examples),
            xpath,
            parser,
            locator: None,
        }
    }

    /// Resolve lines of missing components through `locator`.
    pub fn with_locator(mut self, locator: LineLocator<'a>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    pub fn has_violation_markers(&self) -> bool {
        self.examples.iter().any(|e| !e.violation_markers.is_empty())
    }

    pub fn has_valid_markers(&self) -> bool {
        self.examples.iter().any(|e| !e.valid_markers.is_empty())
    }

    pub(crate) fn line(&self, target: LineTarget<'_>) -> Option<usize> {
        self.locator.as_ref().and_then(|l| l.locate(target))
    }
}

/// `name (line N)` or just `name` when unresolved.
pub(crate) fn with_line(name: &str, line: Option<usize>) -> String {
    match line {
        Some(line) => format!("{name} (line {line})"),
        None => name.to_string(),
    }
}

/// Run every enabled category over one rule's analysis.
pub fn check_coverage(
    analysis: &XPathAnalysis,
    ctx: &CoverageContext<'_>,
    config: &CoverageConfig,
) -> XPathCoverageResult {
    if ctx.xpath.trim().is_empty() {
        return XPathCoverageResult::aggregate(vec![CoverageResult::new(
            CoverageCategory::Expression,
            false,
            "No XPath expression to check",
        )]);
    }

    let checks = config.checks();
    let mut results = vec![check_node_types(&analysis.node_types, ctx)];
    if checks.attributes {
        results.push(check_attributes(&analysis.attributes, ctx));
    }
    if checks.operators {
        results.push(check_operators(&analysis.operators, ctx));
    }
    if checks.conditionals {
        results.extend(
            analysis
                .conditionals
                .iter()
                .map(|cond| check_conditional(cond, ctx, config)),
        );
    }
    XPathCoverageResult::aggregate(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apex::BuiltinApexParser;
    use crate::xpath::analyze_xpath;

    fn parse(contents: &[&str]) -> Vec<ExampleData> {
        let owned: Vec<String> = contents.iter().map(|c| c.to_string()).collect();
        crate::examples::parse_examples(&owned, None)
    }

    #[test]
    fn test_aggregate_ands_success() {
        let ok = CoverageResult::new(CoverageCategory::NodeTypes, true, "fine");
        let bad = CoverageResult::new(CoverageCategory::Attributes, false, "Missing attributes: Name");
        let result = XPathCoverageResult::aggregate(vec![ok.clone(), bad]);
        assert!(!result.overall_success);
        assert_eq!(result.uncovered_branches, vec!["Attributes: Missing attributes: Name"]);

        let all_ok = XPathCoverageResult::aggregate(vec![ok]);
        assert!(all_ok.overall_success);
        assert!(all_ok.uncovered_branches.is_empty());
    }

    #[test]
    fn test_empty_xpath_is_a_failure() {
        let examples = parse(&["insert acc;"]);
        let ctx = CoverageContext::new(&examples, "", &BuiltinApexParser);
        let result = check_coverage(&analyze_xpath(None), &ctx, &CoverageConfig::default());
        assert!(!result.overall_success);
        assert_eq!(result.coverage[0].category, CoverageCategory::Expression);
        assert_eq!(result.coverage[0].message, "No XPath expression to check");
    }

    #[test]
    fn test_disabled_categories_are_not_checked() {
        let xpath = "//Method[@Missing]";
        let examples = parse(&["public class A { public void m() {} }"]);
        let ctx = CoverageContext::new(&examples, xpath, &BuiltinApexParser);
        let config = CoverageConfig::builder().check_attributes(false).build();
        let result = check_coverage(&analyze_xpath(Some(xpath)), &ctx, &config);
        assert!(result.overall_success);
        assert!(
            !result
                .coverage
                .iter()
                .any(|r| r.category == CoverageCategory::Attributes)
        );

        let result = check_coverage(&analyze_xpath(Some(xpath)), &ctx, &CoverageConfig::default());
        assert!(!result.overall_success);
    }

    #[test]
    fn test_one_result_per_conditional() {
        let xpath = "//Method[not(@Static) and @Name='x']";
        let examples = parse(&["public class A { static void x() {} } // ❌ bad"]);
        let ctx = CoverageContext::new(&examples, xpath, &BuiltinApexParser);
        let result = check_coverage(&analyze_xpath(Some(xpath)), &ctx, &CoverageConfig::default());
        let conditionals = result
            .coverage
            .iter()
            .filter(|r| matches!(r.category, CoverageCategory::Conditional { .. }))
            .count();
        assert_eq!(conditionals, 2);
    }

    #[test]
    fn test_category_display() {
        let cond = Conditional::new(crate::xpath::ConditionalType::And, "@A = 'x'", 3);
        let category = CoverageCategory::Conditional {
            conditional: cond,
            strategy: ConditionalStrategy::AndOperator,
        };
        assert_eq!(category.to_string(), "Conditional `and @A = 'x'`");
        assert_eq!(CoverageCategory::NodeTypes.to_string(), "Node types");
    }

    #[test]
    fn test_detail_line() {
        let detail = CoverageDetail::MissingAttribute {
            attribute: "Name".into(),
            line: Some(4),
        };
        assert_eq!(detail.line(), Some(4));
        assert_eq!(
            CoverageDetail::HeuristicMatch {
                node_type: "Class".into()
            }
            .line(),
            None
        );
    }
}
