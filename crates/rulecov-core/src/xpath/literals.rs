//! Hardcoded literal and `let` variable extraction.

use super::scan::{find_closing_return, find_let, is_ident_char, let_declaration_span};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

static LET_BINDING_PATTERN: OnceLock<Regex> = OnceLock::new();

fn let_binding_pattern() -> &'static Regex {
    LET_BINDING_PATTERN.get_or_init(|| {
        Regex::new(r"^\$([A-Za-z_][A-Za-z0-9_.\-]*)\s*(?::=|=)\s*([\s\S]*)$").unwrap()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiteralKind {
    String,
    Number,
}

/// A literal written directly into the expression rather than bound by `let`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardcodedValue {
    #[serde(rename = "type")]
    pub kind: LiteralKind,
    /// Literal text; strings keep their quotes.
    pub value: String,
    pub position: usize,
}

/// A `let $name := value` binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetVariable {
    /// Name including the leading `$`.
    pub name: String,
    pub value: String,
}

/// Numbers that are too common to count as hardcoded.
fn is_innocuous_number(text: &str) -> bool {
    text == "0" || text == "1"
}

/// Extract string and numeric literals outside the first `let` declaration
/// block. `0` and `1` are never reported.
pub fn extract_hardcoded_values(xpath: &str) -> Vec<HardcodedValue> {
    let parameterized = let_declaration_span(xpath);
    let in_let = |pos: usize| parameterized.as_ref().is_some_and(|span| span.contains(&pos));

    let bytes = xpath.as_bytes();
    let mut values = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if b == b'\'' || b == b'"' {
            let Some(rel) = bytes[i + 1..].iter().position(|&c| c == b) else {
                // unterminated literal
                break;
            };
            let end = i + 1 + rel + 1;
            if !in_let(i) {
                values.push(HardcodedValue {
                    kind: LiteralKind::String,
                    value: xpath[i..end].to_string(),
                    position: i,
                });
            }
            i = end;
            continue;
        }

        let attached = i > 0 && {
            let prev = bytes[i - 1];
            is_ident_char(prev) || matches!(prev, b'.' | b'$' | b'@' | b'-')
        };
        if b.is_ascii_digit() && !attached {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if bytes.get(i).is_some_and(|&c| is_ident_char(c)) {
                // `2x` is not a number literal
                while i < bytes.len() && is_ident_char(bytes[i]) {
                    i += 1;
                }
                continue;
            }
            let text = &xpath[start..i];
            if !is_innocuous_number(text) && !in_let(start) {
                values.push(HardcodedValue {
                    kind: LiteralKind::Number,
                    value: text.to_string(),
                    position: start,
                });
            }
            continue;
        }

        i += 1;
    }

    values
}

/// Extract the bindings of the first `let ... return` block.
///
/// A binding starts at a `$` outside quotes and brackets while no binding is
/// open, and ends at the next depth-zero, unquoted `,`. Values may contain
/// nested parentheses, commas and quoted strings.
pub fn extract_let_variables(xpath: &str) -> Vec<LetVariable> {
    let Some((_, decl_start)) = find_let(xpath) else {
        return Vec::new();
    };
    let Some(decl_end) = find_closing_return(xpath, decl_start) else {
        return Vec::new();
    };

    let decls = &xpath[decl_start..decl_end];
    let bytes = decls.as_bytes();
    let mut raw_bindings: Vec<&str> = Vec::new();
    let mut current: Option<usize> = None;
    let mut in_single = false;
    let mut in_double = false;
    let mut depth: i32 = 0;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            _ if in_single || in_double => {}
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'$' if depth == 0 && current.is_none() => current = Some(i),
            b',' if depth == 0 => {
                if let Some(start) = current.take() {
                    raw_bindings.push(&decls[start..i]);
                }
            }
            _ => {}
        }
    }
    if let Some(start) = current {
        raw_bindings.push(&decls[start..]);
    }

    raw_bindings
        .into_iter()
        .filter_map(|raw| {
            let caps = let_binding_pattern().captures(raw.trim())?;
            let value = caps.get(2)?.as_str().trim();
            if value.is_empty() {
                return None;
            }
            Some(LetVariable {
                name: format!("${}", &caps[1]),
                value: value.to_string(),
            })
        })
        .collect()
}
