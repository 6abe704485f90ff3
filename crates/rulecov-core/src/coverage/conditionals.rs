//! Conditional coverage through named strategies.
//!
//! A conditional is classified once, then checked by the strategy registered
//! for its class in [`STRATEGIES`]. Classes without an entry are reported as
//! unimplemented failures, distinct from checked-and-uncovered ones.

use super::evidence::{
    annotated_values, contains_text, is_attribute_evidenced, string_literals,
};
use super::{
    CoverageCategory, CoverageContext, CoverageDetail, CoverageEvidence, CoverageResult,
    EvidenceKind, NO_CONTENT, with_line,
};
use crate::config::CoverageConfig;
use crate::location::LineTarget;
use crate::xpath::{Conditional, ConditionalType, extract_attributes};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

static COMPARISON: OnceLock<Regex> = OnceLock::new();
static QUANTIFIED: OnceLock<Regex> = OnceLock::new();
static IF_CONDITION: OnceLock<Regex> = OnceLock::new();
static BOOLEAN_FUNCTION: OnceLock<Regex> = OnceLock::new();

fn comparison() -> &'static Regex {
    COMPARISON.get_or_init(|| {
        Regex::new(r"@[A-Za-z_][\w-]*\s*(?:!=|<=|>=|=|<|>)\s*@[A-Za-z_]").unwrap()
    })
}

fn quantified() -> &'static Regex {
    QUANTIFIED.get_or_init(|| Regex::new(r"\b(?:some|every)\s+\$").unwrap())
}

fn if_condition() -> &'static Regex {
    IF_CONDITION.get_or_init(|| Regex::new(r"\bif\s*\(").unwrap())
}

fn boolean_function() -> &'static Regex {
    BOOLEAN_FUNCTION.get_or_init(|| {
        Regex::new(r"\b(?:starts-with|ends-with|contains|matches|exists|empty|boolean)\s*\(")
            .unwrap()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionalStrategy {
    Comparison,
    Quantified,
    IfCondition,
    BooleanFunction,
    NotCondition,
    AndOperator,
    OrBranch,
}

impl ConditionalStrategy {
    pub fn name(self) -> &'static str {
        match self {
            ConditionalStrategy::Comparison => "comparison",
            ConditionalStrategy::Quantified => "quantified",
            ConditionalStrategy::IfCondition => "if_condition",
            ConditionalStrategy::BooleanFunction => "boolean_function",
            ConditionalStrategy::NotCondition => "not_condition",
            ConditionalStrategy::AndOperator => "and_operator",
            ConditionalStrategy::OrBranch => "or_branch",
        }
    }

    /// First match wins: attribute comparison, quantifier, `if`, boolean
    /// function call, then the conditional's own keyword.
    pub fn classify(conditional: &Conditional) -> Self {
        let expr = conditional.expression.as_str();
        if comparison().is_match(expr) {
            ConditionalStrategy::Comparison
        } else if quantified().is_match(expr) {
            ConditionalStrategy::Quantified
        } else if if_condition().is_match(expr) {
            ConditionalStrategy::IfCondition
        } else if boolean_function().is_match(expr) {
            ConditionalStrategy::BooleanFunction
        } else {
            match conditional.kind {
                ConditionalType::Not => ConditionalStrategy::NotCondition,
                ConditionalType::And => ConditionalStrategy::AndOperator,
                ConditionalType::Or => ConditionalStrategy::OrBranch,
            }
        }
    }
}

impl std::fmt::Display for ConditionalStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one strategy.
#[derive(Debug, Clone, Default)]
pub struct StrategyVerdict {
    pub demonstrated: bool,
    pub reason: String,
    pub details: Vec<CoverageDetail>,
}

impl StrategyVerdict {
    fn new(demonstrated: bool, reason: impl Into<String>) -> Self {
        Self {
            demonstrated,
            reason: reason.into(),
            details: Vec::new(),
        }
    }
}

pub type StrategyCheck = fn(&Conditional, &CoverageContext<'_>) -> StrategyVerdict;

const STRATEGIES: &[(ConditionalStrategy, StrategyCheck)] = &[
    (ConditionalStrategy::Comparison, check_comparison),
    (ConditionalStrategy::BooleanFunction, check_boolean_function),
    (ConditionalStrategy::NotCondition, check_not_condition),
    (ConditionalStrategy::AndOperator, check_and_operator),
    (ConditionalStrategy::OrBranch, check_or_branch),
];

fn strategy_for(strategy: ConditionalStrategy) -> Option<StrategyCheck> {
    STRATEGIES
        .iter()
        .find(|(s, _)| *s == strategy)
        .map(|&(_, check)| check)
}

pub fn check_conditional(
    conditional: &Conditional,
    ctx: &CoverageContext<'_>,
    config: &CoverageConfig,
) -> CoverageResult {
    let strategy = ConditionalStrategy::classify(conditional);
    let category = CoverageCategory::Conditional {
        conditional: conditional.clone(),
        strategy,
    };
    let line = ctx.line(LineTarget::Conditional(conditional));

    if config.is_strategy_disabled(strategy.name()) {
        return CoverageResult::new(category, true, format!("Strategy `{strategy}` skipped"))
            .with_details([CoverageDetail::SkippedStrategy { strategy }]);
    }

    let Some(check) = strategy_for(strategy) else {
        let message = with_line(
            &format!("Strategy `{strategy}` is not implemented"),
            line,
        );
        return CoverageResult::new(category, false, message)
            .with_details([CoverageDetail::UnimplementedStrategy { strategy, line }]);
    };

    if !ctx.has_content() {
        return CoverageResult::new(category, false, NO_CONTENT)
            .with_evidence(CoverageEvidence::new(EvidenceKind::Violation, 0, 1, NO_CONTENT));
    }

    let verdict = check(conditional, ctx);
    let evidence = CoverageEvidence::new(
        EvidenceKind::Violation,
        usize::from(verdict.demonstrated),
        1,
        verdict.reason.clone(),
    );
    let result = if verdict.demonstrated {
        CoverageResult::new(category, true, verdict.reason)
    } else {
        let message = with_line(&format!("Not demonstrated: {}", verdict.reason), line);
        CoverageResult::new(category, false, message).with_details([
            CoverageDetail::UncoveredConditional {
                expression: conditional.expression.clone(),
                strategy,
                line,
            },
        ])
    };
    result.with_evidence(evidence).with_details(verdict.details)
}

/// `@A != @B`: at least two of the compared attributes carry `Attr: value`
/// annotations and the annotated values are not all equal.
fn check_comparison(conditional: &Conditional, ctx: &CoverageContext<'_>) -> StrategyVerdict {
    let attributes = extract_attributes(&conditional.expression);
    let annotated: Vec<(String, Vec<String>)> = attributes
        .iter()
        .map(|attr| (attr.clone(), annotated_values(&ctx.content, attr)))
        .filter(|(_, values)| !values.is_empty())
        .collect();

    let details: Vec<CoverageDetail> = annotated
        .iter()
        .map(|(attribute, values)| CoverageDetail::DemonstratedValues {
            attribute: attribute.clone(),
            values: values.clone(),
        })
        .collect();

    let mut verdict = if annotated.len() < 2 {
        StrategyVerdict::new(
            false,
            format!(
                "annotate values for at least two of {} (e.g. `// {}: 5`)",
                attributes
                    .iter()
                    .map(|a| format!("@{a}"))
                    .collect::<Vec<_>>()
                    .join(", "),
                attributes.first().map_or("Attr", String::as_str)
            ),
        )
    } else {
        let first = &annotated[0].1[0];
        let differing = annotated
            .iter()
            .flat_map(|(_, values)| values.iter())
            .any(|v| v != first);
        if differing {
            StrategyVerdict::new(true, "Compared attributes show differing values")
        } else {
            StrategyVerdict::new(false, "all annotated values are identical")
        }
    };
    verdict.details = details;
    verdict
}

/// A literal argument of the function shows up in the examples, or, without
/// literal arguments, every referenced attribute is evidenced.
fn check_boolean_function(conditional: &Conditional, ctx: &CoverageContext<'_>) -> StrategyVerdict {
    let literals = string_literals(&conditional.expression);
    if !literals.is_empty() {
        return match literals.iter().find(|l| contains_text(&ctx.content, l)) {
            Some(hit) => {
                StrategyVerdict::new(true, format!("Function argument '{hit}' appears in examples"))
            }
            None => StrategyVerdict::new(
                false,
                format!(
                    "no example contains {}",
                    literals
                        .iter()
                        .map(|l| format!("'{l}'"))
                        .collect::<Vec<_>>()
                        .join(" or ")
                ),
            ),
        };
    }
    attributes_verdict(conditional, ctx, "Function attributes are evidenced")
}

/// A negation must be seen both ways: every attribute evidenced, plus at
/// least one violation and one valid marker.
fn check_not_condition(conditional: &Conditional, ctx: &CoverageContext<'_>) -> StrategyVerdict {
    let verdict = attributes_verdict(conditional, ctx, "Negated attributes are evidenced");
    if !verdict.demonstrated {
        return verdict;
    }
    if !(ctx.has_violation_markers() && ctx.has_valid_markers()) {
        return StrategyVerdict::new(
            false,
            "a negation needs both a violation and a valid example",
        );
    }
    StrategyVerdict::new(true, "Negation shown with violation and valid examples")
}

fn check_and_operator(conditional: &Conditional, ctx: &CoverageContext<'_>) -> StrategyVerdict {
    let verdict = attributes_verdict(conditional, ctx, "All clause attributes are evidenced");
    if verdict.demonstrated && !ctx.has_violation_markers() {
        return StrategyVerdict::new(false, "no violation marker exercises the clause");
    }
    verdict
}

/// Any one attribute or literal of the branch is enough.
fn check_or_branch(conditional: &Conditional, ctx: &CoverageContext<'_>) -> StrategyVerdict {
    let attributes = extract_attributes(&conditional.expression);
    let literals = string_literals(&conditional.expression);
    if attributes.is_empty() && literals.is_empty() {
        return if ctx.has_violation_markers() {
            StrategyVerdict::new(true, "Branch has nothing to evidence beyond a violation")
        } else {
            StrategyVerdict::new(
                false,
                "branch has no attribute or literal and no violation marker",
            )
        };
    }
    if let Some(attr) = attributes.iter().find(|a| evidenced(a, conditional, ctx)) {
        return StrategyVerdict::new(true, format!("Branch attribute @{attr} is evidenced"));
    }
    if let Some(literal) = literals.iter().find(|l| contains_text(&ctx.content, l)) {
        let reason = format!("Branch literal '{literal}' appears in examples");
        return StrategyVerdict::new(true, reason);
    }
    StrategyVerdict::new(false, "no attribute or literal of the branch appears in examples")
}

/// Literals compared inside the conditional count as well as those elsewhere
/// in the XPath.
fn evidenced(attribute: &str, conditional: &Conditional, ctx: &CoverageContext<'_>) -> bool {
    is_attribute_evidenced(attribute, &ctx.content, ctx.xpath)
        || is_attribute_evidenced(attribute, &ctx.content, &conditional.expression)
}

/// Demonstrated iff every attribute in the expression is evidenced.
fn attributes_verdict(
    conditional: &Conditional,
    ctx: &CoverageContext<'_>,
    success_reason: &str,
) -> StrategyVerdict {
    let missing: Vec<String> = extract_attributes(&conditional.expression)
        .into_iter()
        .filter(|a| !evidenced(a, conditional, ctx))
        .map(|a| format!("@{a}"))
        .collect();
    if missing.is_empty() {
        StrategyVerdict::new(true, success_reason)
    } else {
        StrategyVerdict::new(false, format!("no evidence for {}", missing.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apex::BuiltinApexParser;
    use crate::examples::{ExampleData, parse_examples};

    fn examples(content: &str) -> Vec<ExampleData> {
        parse_examples(&[content.to_string()], None)
    }

    fn cond(kind: ConditionalType, expression: &str) -> Conditional {
        Conditional::new(kind, expression, 0)
    }

    fn run(conditional: &Conditional, content: &str) -> CoverageResult {
        let ex = examples(content);
        let ctx = CoverageContext::new(&ex, "", &BuiltinApexParser);
        check_conditional(conditional, &ctx, &CoverageConfig::default())
    }

    #[test]
    fn test_classification_order() {
        use ConditionalStrategy::*;
        let cases = [
            (ConditionalType::And, "@BeginLine != @EndLine", Comparison),
            (ConditionalType::Or, "some $x in //Y satisfies $x", Quantified),
            (ConditionalType::And, "if (@A) then 1 else 2", IfCondition),
            (ConditionalType::Not, "starts-with(@Name, 'test'", BooleanFunction),
            (ConditionalType::Not, "@Static", NotCondition),
            (ConditionalType::And, "@Name='x'", AndOperator),
            (ConditionalType::Or, "@Name='y'", OrBranch),
        ];
        for (kind, expr, expected) in cases {
            assert_eq!(ConditionalStrategy::classify(&cond(kind, expr)), expected, "{expr}");
        }
    }

    #[test]
    fn test_comparison_needs_differing_values() {
        let c = cond(ConditionalType::And, "@BeginLine != @EndLine");
        let result = run(&c, "// BeginLine: 5\n// EndLine: 10\ninsert acc;");
        assert!(result.success, "{}", result.message);
        assert_eq!(
            result
                .details
                .iter()
                .filter(|d| matches!(d, CoverageDetail::DemonstratedValues { .. }))
                .count(),
            2
        );

        let result = run(&c, "// BeginLine: 5\n// EndLine: 5");
        assert!(!result.success);
        assert!(result.message.contains("identical"));
    }

    #[test]
    fn test_comparison_single_attribute_never_enough() {
        let c = cond(ConditionalType::And, "@BeginLine != @EndLine");
        let result = run(&c, "// BeginLine: 5\n// BeginLine: 6");
        assert!(!result.success);
        assert!(result.message.contains("at least two"));
    }

    #[test]
    fn test_unimplemented_strategy_is_labelled() {
        let c = cond(ConditionalType::Or, "every $m in //Method satisfies $m");
        let result = run(&c, "anything");
        assert!(!result.success);
        assert_eq!(result.message, "Strategy `quantified` is not implemented");
        assert_eq!(
            result.details,
            vec![CoverageDetail::UnimplementedStrategy {
                strategy: ConditionalStrategy::Quantified,
                line: None
            }]
        );
    }

    #[test]
    fn test_disabled_strategy_is_skipped() {
        let c = cond(ConditionalType::Or, "every $m in //Method satisfies $m");
        let ex = examples("x");
        let ctx = CoverageContext::new(&ex, "", &BuiltinApexParser);
        let config = CoverageConfig::builder().disable_strategy("quantified").build();
        let result = check_conditional(&c, &ctx, &config);
        assert!(result.success);
        assert_eq!(
            result.details,
            vec![CoverageDetail::SkippedStrategy {
                strategy: ConditionalStrategy::Quantified
            }]
        );
    }

    #[test]
    fn test_boolean_function_literal() {
        let c = cond(ConditionalType::And, "starts-with(@Name, 'test')");
        assert!(run(&c, "void testFoo() {}").success);
        let result = run(&c, "void run() {}");
        assert!(!result.success);
        assert!(result.message.contains("'test'"));
    }

    #[test]
    fn test_not_condition_needs_both_markers() {
        let c = cond(ConditionalType::Not, "@Static");
        assert!(!run(&c, "static void a() {} // ❌ static").success);
        assert!(run(&c, "static void a() {} // ❌ static\nvoid b() {} // ✅ ok").success);
        assert!(!run(&c, "void a() {} // ❌ x\nvoid b() {} // ✅ y").success);
    }

    #[test]
    fn test_and_operator_needs_violation() {
        let c = cond(ConditionalType::And, "@Visibility='public'");
        assert!(run(&c, "public void a() {} // ❌ public").success);
        let result = run(&c, "public void a() {} // ✅ fine");
        assert!(!result.success);
        assert!(result.message.contains("no violation marker"));
    }

    #[test]
    fn test_or_branch_any_evidence() {
        let c = cond(ConditionalType::Or, "@Name='check' or @Other");
        assert!(run(&c, "void check() {}").success);
        assert!(!run(&c, "void run() {}").success);
    }

    #[test]
    fn test_no_content_fails_implemented_strategies() {
        let c = cond(ConditionalType::Or, "@Name='check'");
        let result = run(&c, "");
        assert!(!result.success);
        assert_eq!(result.message, NO_CONTENT);
    }

    #[test]
    fn test_uncovered_conditional_detail() {
        let c = cond(ConditionalType::Or, "@Name='check'");
        let result = run(&c, "void run() {}");
        assert!(result.details.contains(&CoverageDetail::UncoveredConditional {
            expression: "@Name='check'".into(),
            strategy: ConditionalStrategy::OrBranch,
            line: None,
        }));
    }
}
