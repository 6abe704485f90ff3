//! Attribute and operator coverage.

use super::evidence::{contains_text, is_attribute_evidenced};
use super::{
    CoverageCategory, CoverageContext, CoverageDetail, CoverageEvidence, CoverageResult,
    EvidenceKind, NO_CONTENT, with_line,
};
use crate::location::LineTarget;

/// Every extracted attribute must be evidenced somewhere in the examples.
pub fn check_attributes(attributes: &[String], ctx: &CoverageContext<'_>) -> CoverageResult {
    check_members(
        CoverageCategory::Attributes,
        "attributes",
        attributes,
        ctx,
        |attr| is_attribute_evidenced(attr, &ctx.content, ctx.xpath),
        |attr| CoverageDetail::MissingAttribute {
            attribute: attr.to_string(),
            line: ctx.line(LineTarget::Attribute(attr)),
        },
    )
}

/// Every `@Op` value must appear in the examples.
pub fn check_operators(operators: &[String], ctx: &CoverageContext<'_>) -> CoverageResult {
    check_members(
        CoverageCategory::Operators,
        "operators",
        operators,
        ctx,
        |op| contains_text(&ctx.content, op),
        |op| CoverageDetail::MissingOperator {
            operator: op.to_string(),
            line: ctx.line(LineTarget::Operator(op)),
        },
    )
}

fn check_members(
    category: CoverageCategory,
    noun: &str,
    items: &[String],
    ctx: &CoverageContext<'_>,
    evidenced: impl Fn(&str) -> bool,
    missing_detail: impl Fn(&str) -> CoverageDetail,
) -> CoverageResult {
    if items.is_empty() {
        return CoverageResult::new(category, true, format!("No {noun} to check"));
    }
    if !ctx.has_content() {
        return CoverageResult::new(category, false, NO_CONTENT).with_evidence(
            CoverageEvidence::new(EvidenceKind::Violation, 0, items.len(), NO_CONTENT),
        );
    }

    let missing: Vec<CoverageDetail> = items
        .iter()
        .filter(|item| !evidenced(item.as_str()))
        .map(|item| missing_detail(item.as_str()))
        .collect();
    let covered = items.len() - missing.len();

    if missing.is_empty() {
        let message = format!("All {} {noun} covered", items.len());
        return CoverageResult::new(category, true, message.clone()).with_evidence(
            CoverageEvidence::new(EvidenceKind::Violation, covered, items.len(), message),
        );
    }

    let listed = missing
        .iter()
        .filter_map(|detail| match detail {
            CoverageDetail::MissingAttribute { attribute, line } => {
                Some(with_line(&format!("@{attribute}"), *line))
            }
            CoverageDetail::MissingOperator { operator, line } => {
                Some(with_line(&format!("'{operator}'"), *line))
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(", ");
    let message = format!("Missing {noun}: {listed}");
    CoverageResult::new(category, false, message.clone())
        .with_evidence(CoverageEvidence::new(
            EvidenceKind::Violation,
            covered,
            items.len(),
            message,
        ))
        .with_details(missing)
}
