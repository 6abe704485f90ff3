//! Boolean conditional extraction.
//!
//! Three independent passes over the expression:
//!
//! - `not(...)` captures up to the first `)`, without balancing nested parens.
//! - `and <expr>` and `or <expr>` capture up to the next `]`.
//!
//! An outer `and` therefore swallows a nested `or` clause and the `or` is
//! reported again on its own. The line locator relies on that duplication:
//! it searches for `operator + expression` from the end of the rule file so
//! the narrowest clause wins.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

static NOT_PATTERN: OnceLock<Regex> = OnceLock::new();
static AND_PATTERN: OnceLock<Regex> = OnceLock::new();
static OR_PATTERN: OnceLock<Regex> = OnceLock::new();

fn not_pattern() -> &'static Regex {
    NOT_PATTERN.get_or_init(|| Regex::new(r"\bnot\s*\(([^)]*)\)").unwrap())
}

fn and_pattern() -> &'static Regex {
    AND_PATTERN.get_or_init(|| Regex::new(r"\band\s+([^\]]+)").unwrap())
}

fn or_pattern() -> &'static Regex {
    OR_PATTERN.get_or_init(|| Regex::new(r"\bor\s+([^\]]+)").unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionalType {
    Not,
    And,
    Or,
}

impl ConditionalType {
    /// The XPath keyword for this conditional.
    pub fn keyword(self) -> &'static str {
        match self {
            ConditionalType::Not => "not",
            ConditionalType::And => "and",
            ConditionalType::Or => "or",
        }
    }
}

impl std::fmt::Display for ConditionalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One boolean sub-expression of a rule's XPath.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditional {
    #[serde(rename = "type")]
    pub kind: ConditionalType,
    /// Trimmed sub-expression text.
    pub expression: String,
    /// Byte offset of the expression's first character in the XPath.
    pub position: usize,
}

impl Conditional {
    pub fn new(kind: ConditionalType, expression: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            expression: expression.into(),
            position,
        }
    }

    /// Text the line locator searches for: `and <expr>` / `or <expr>`, or the
    /// bare expression for `not`. Only the first line of a multi-line
    /// expression is used.
    pub fn search_text(&self) -> String {
        let first_line = self.expression.lines().next().unwrap_or("").trim_end();
        match self.kind {
            ConditionalType::Not => first_line.to_string(),
            ConditionalType::And | ConditionalType::Or => {
                format!("{} {}", self.kind.keyword(), first_line)
            }
        }
    }
}

fn collect(xpath: &str, pattern: &Regex, kind: ConditionalType, out: &mut Vec<Conditional>) {
    for caps in pattern.captures_iter(xpath) {
        let Some(group) = caps.get(1) else {
            continue;
        };
        let raw = group.as_str();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let leading = raw.len() - raw.trim_start().len();
        out.push(Conditional::new(kind, trimmed, group.start() + leading));
    }
}

/// Extract `not`, `and` and `or` conditionals, in that pass order.
pub fn extract_conditionals(xpath: &str) -> Vec<Conditional> {
    let mut out = Vec::new();
    collect(xpath, not_pattern(), ConditionalType::Not, &mut out);
    collect(xpath, and_pattern(), ConditionalType::And, &mut out);
    collect(xpath, or_pattern(), ConditionalType::Or, &mut out);
    out
}
