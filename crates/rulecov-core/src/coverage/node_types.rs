//! Node-type coverage.

use super::{
    CoverageCategory, CoverageContext, CoverageDetail, CoverageEvidence, CoverageResult,
    EvidenceKind, NO_CONTENT, with_line,
};
use crate::apex::{ParseOutcome, PresenceCheck, check_presence};
use crate::location::LineTarget;

const IMPLICIT_NODE: &str = "StandardCondition";

/// Every extracted node type must be present in at least one example.
///
/// Each example is parsed on its own so a snippet and a full class can sit
/// side by side. `StandardCondition` counts as covered without looking.
pub fn check_node_types(node_types: &[String], ctx: &CoverageContext<'_>) -> CoverageResult {
    let required = node_types.len();
    let implicit = node_types.iter().filter(|t| *t == IMPLICIT_NODE).count();

    if implicit == required {
        let message = if required == 0 {
            "No node types to check".to_string()
        } else {
            format!("All {required} node types covered")
        };
        return CoverageResult::new(CoverageCategory::NodeTypes, true, message.clone())
            .with_evidence(CoverageEvidence::new(
                EvidenceKind::Violation,
                required,
                required,
                message,
            ));
    }

    if !ctx.has_content() {
        return CoverageResult::new(CoverageCategory::NodeTypes, false, NO_CONTENT).with_evidence(
            CoverageEvidence::new(EvidenceKind::Violation, implicit, required, NO_CONTENT),
        );
    }

    let parsed: Vec<(usize, &str, ParseOutcome)> = ctx
        .examples
        .iter()
        .filter(|e| !e.content.trim().is_empty())
        .map(|e| (e.example_index, e.content.as_str(), ctx.parser.parse(&e.content)))
        .collect();

    let mut details = Vec::new();
    let mut missing = Vec::new();
    let mut covered = 0;
    for node_type in node_types {
        match presence_across(node_type, &parsed) {
            PresenceCheck::Absent => {
                let line = ctx.line(LineTarget::NodeType(node_type));
                missing.push(with_line(node_type, line));
                details.push(CoverageDetail::MissingNodeType {
                    node_type: node_type.clone(),
                    line,
                });
            }
            PresenceCheck::Heuristic => {
                covered += 1;
                details.push(CoverageDetail::HeuristicMatch {
                    node_type: node_type.clone(),
                });
            }
            PresenceCheck::Present | PresenceCheck::Implicit => covered += 1,
        }
    }

    let failures: Vec<(usize, &str)> = parsed
        .iter()
        .filter_map(|(index, _, outcome)| match outcome {
            ParseOutcome::Unusable { reason } => Some((*index, reason.as_str())),
            ParseOutcome::Parsed(_) => None,
        })
        .collect();
    details.extend(failures.iter().map(|(example, reason)| CoverageDetail::ParseFailure {
        example: *example,
        reason: reason.to_string(),
    }));

    let success = missing.is_empty();
    let message = if success {
        format!("All {required} node types covered")
    } else if covered == implicit && failures.len() == parsed.len() {
        let reason = failures.first().map_or("", |(_, r)| *r);
        format!("AST parsing failed ({reason}); missing node types: {}", missing.join(", "))
    } else {
        format!("Missing node types: {}", missing.join(", "))
    };

    let mut result = CoverageResult::new(CoverageCategory::NodeTypes, success, message.clone())
        .with_evidence(CoverageEvidence::new(
            EvidenceKind::Violation,
            covered,
            required,
            message,
        ));
    if let Some(valid) = valid_evidence(node_types, ctx) {
        result = result.with_evidence(valid);
    }
    result.with_details(details)
}

/// Best answer for one node type over all examples.
fn presence_across(node_type: &str, parsed: &[(usize, &str, ParseOutcome)]) -> PresenceCheck {
    let mut best = PresenceCheck::Absent;
    for (_, source, outcome) in parsed {
        match check_presence(node_type, source, outcome) {
            PresenceCheck::Absent => {}
            PresenceCheck::Heuristic => best = PresenceCheck::Heuristic,
            found => return found,
        }
    }
    if node_type == IMPLICIT_NODE {
        return PresenceCheck::Implicit;
    }
    best
}

/// Informational count of node types exercised by valid-classified code.
fn valid_evidence(node_types: &[String], ctx: &CoverageContext<'_>) -> Option<CoverageEvidence> {
    let codes: Vec<(usize, String)> = ctx
        .examples
        .iter()
        .filter(|e| !e.valids.is_empty())
        .map(|e| (e.example_index, e.valids.join("\n")))
        .collect();
    if codes.is_empty() {
        return None;
    }
    let parsed: Vec<(usize, &str, ParseOutcome)> = codes
        .iter()
        .map(|(index, code)| (*index, code.as_str(), ctx.parser.parse(code)))
        .collect();
    let count = node_types
        .iter()
        .filter(|t| presence_across(t, &parsed).is_present())
        .count();
    Some(CoverageEvidence::new(
        EvidenceKind::Valid,
        count,
        node_types.len(),
        "Node types also present in valid code",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apex::BuiltinApexParser;
    use crate::examples::{ExampleData, parse_examples};
    use crate::location::LineLocator;

    fn examples(contents: &[&str]) -> Vec<ExampleData> {
        let owned: Vec<String> = contents.iter().map(|c| c.to_string()).collect();
        parse_examples(&owned, None)
    }

    fn types(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_standard_condition_always_covered() {
        for content in ["", "Integer x;", "}}}"] {
            let ex = examples(&[content]);
            let ctx = CoverageContext::new(&ex, "//StandardCondition", &BuiltinApexParser);
            let result = check_node_types(&types(&["StandardCondition"]), &ctx);
            assert!(result.success, "content {content:?}");
        }
    }

    #[test]
    fn test_no_content() {
        let ex = examples(&["  "]);
        let ctx = CoverageContext::new(&ex, "//Method", &BuiltinApexParser);
        let result = check_node_types(&types(&["Method", "StandardCondition"]), &ctx);
        assert!(!result.success);
        assert_eq!(result.message, NO_CONTENT);
        assert_eq!(result.evidence[0].count, 1);
        assert_eq!(result.evidence[0].required, 2);
    }

    #[test]
    fn test_user_class_needs_nesting() {
        let nested = examples(&["class A { class B {} }"]);
        let ctx = CoverageContext::new(&nested, "//UserClass", &BuiltinApexParser);
        assert!(check_node_types(&types(&["UserClass"]), &ctx).success);

        let flat = examples(&["class A {} class B {}"]);
        let ctx = CoverageContext::new(&flat, "//UserClass", &BuiltinApexParser);
        assert!(!check_node_types(&types(&["UserClass"]), &ctx).success);
    }

    #[test]
    fn test_presence_in_any_example() {
        let ex = examples(&[
            "public class A {\n  public void run() {}\n}",
            "insert acc;",
        ]);
        let ctx = CoverageContext::new(&ex, "", &BuiltinApexParser);
        let result = check_node_types(&types(&["Method", "DmlInsertStatement"]), &ctx);
        assert!(result.success, "{}", result.message);
        assert_eq!(result.message, "All 2 node types covered");
        assert!(result.details.is_empty());
    }

    #[test]
    fn test_parse_failure_is_reported() {
        let ex = examples(&["}}} insert"]);
        let ctx = CoverageContext::new(&ex, "//DmlInsertStatement", &BuiltinApexParser);
        let result = check_node_types(&types(&["DmlInsertStatement"]), &ctx);
        assert!(!result.success);
        assert!(result.message.starts_with("AST parsing failed"), "{}", result.message);
        assert!(
            result
                .details
                .iter()
                .any(|d| matches!(d, CoverageDetail::ParseFailure { example: 1, .. }))
        );
    }

    #[test]
    fn test_heuristic_credit_when_unparseable() {
        let ex = examples(&["public class A {\n  @isTest static void run() {"]);
        let ctx = CoverageContext::new(&ex, "//Method", &BuiltinApexParser);
        let result = check_node_types(&types(&["Method"]), &ctx);
        assert!(result.success);
        assert!(result.details.contains(&CoverageDetail::HeuristicMatch {
            node_type: "Method".into()
        }));
    }

    #[test]
    fn test_missing_node_type_line() {
        let text = "<rule>\n<property name=\"xpath\">\n<value>\n//Method\n//DmlUpdateStatement\n</value>\n</property>\n</rule>";
        let xpath = "//Method\n//DmlUpdateStatement";
        let ex = examples(&["insert acc;"]);
        let ctx = CoverageContext::new(&ex, xpath, &BuiltinApexParser)
            .with_locator(LineLocator::new(text, xpath));
        let result = check_node_types(&types(&["Method", "DmlUpdateStatement"]), &ctx);
        assert!(!result.success);
        assert_eq!(
            result.message,
            "Missing node types: Method (line 4), DmlUpdateStatement (line 5)"
        );
        assert_eq!(result.evidence[0].count, 0);
    }

    #[test]
    fn test_valid_evidence_counts_valid_code_only() {
        let ex = examples(&["insert acc; // ❌ dml\nupdate acc; // ✅ fine"]);
        let ctx = CoverageContext::new(&ex, "", &BuiltinApexParser);
        let result =
            check_node_types(&types(&["DmlInsertStatement", "DmlUpdateStatement"]), &ctx);
        assert!(result.success);
        let valid = result
            .evidence
            .iter()
            .find(|e| e.kind == EvidenceKind::Valid)
            .unwrap();
        assert_eq!((valid.count, valid.required), (1, 2));
    }
}
