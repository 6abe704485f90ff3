//! Attribute and operator extraction.

use super::scan::{is_ident_char, is_ident_start, skip_quoted};
use regex::Regex;
use std::sync::OnceLock;

static OPERATOR_PATTERN: OnceLock<Regex> = OnceLock::new();

fn operator_pattern() -> &'static Regex {
    OPERATOR_PATTERN
        .get_or_init(|| Regex::new(r#"@Op\s*=\s*(?:'([^']*)'|"([^"]*)")"#).unwrap())
}

/// Attribute name reserved for operator comparisons.
pub const OPERATOR_ATTRIBUTE: &str = "Op";

/// Extract `@Attribute` names in discovery order, deduplicated, without `Op`.
pub fn extract_attributes(xpath: &str) -> Vec<String> {
    extract_attribute_refs(xpath)
        .into_iter()
        .map(|(name, _)| name)
        .fold(Vec::new(), |mut acc, name| {
            if name != OPERATOR_ATTRIBUTE && !acc.contains(&name) {
                acc.push(name);
            }
            acc
        })
}

/// Every `@Attribute` reference with its byte offset (of the `@`), including
/// duplicates and `Op`.
pub(crate) fn extract_attribute_refs(xpath: &str) -> Vec<(String, usize)> {
    let bytes = xpath.as_bytes();
    let mut refs = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                i = skip_quoted(bytes, i);
            }
            b'@' if bytes.get(i + 1).is_some_and(|&b| is_ident_start(b)) => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && is_ident_char(bytes[end]) {
                    end += 1;
                }
                // `@ns:Name` and `@Name-x` are part of a larger token
                let joined = bytes
                    .get(end)
                    .is_some_and(|&b| b == b':' && bytes.get(end + 1) != Some(&b'=') || b == b'-');
                if !joined {
                    refs.push((xpath[start..end].to_string(), i));
                }
                i = end;
            }
            _ => i += 1,
        }
    }

    refs
}

/// Extract the quoted values of `@Op = '...'` comparisons, deduplicated.
pub fn extract_operators(xpath: &str) -> Vec<String> {
    let mut ops: Vec<String> = Vec::new();
    for caps in operator_pattern().captures_iter(xpath) {
        let value = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        if !ops.contains(&value) {
            ops.push(value);
        }
    }
    ops
}
