//! Textual evidence that example content exercises an XPath component.

use crate::xpath::scan::is_ident_char;
use regex::Regex;

/// Case-insensitive whole-word search.
pub fn contains_word(content: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    let haystack = content.to_ascii_lowercase();
    let needle = word.to_ascii_lowercase();
    let bytes = haystack.as_bytes();
    haystack.match_indices(&needle).any(|(i, _)| {
        let before = i == 0 || !is_ident_char(bytes[i - 1]);
        let after = bytes.get(i + needle.len()).is_none_or(|&b| !is_ident_char(b));
        before && after
    })
}

/// Case-insensitive substring search.
pub fn contains_text(content: &str, text: &str) -> bool {
    !text.is_empty()
        && content
            .to_ascii_lowercase()
            .contains(&text.to_ascii_lowercase())
}

/// Values from `Attr: value` annotations in content, in order of appearance.
///
/// Quotes around a value are dropped.
pub fn annotated_values(content: &str, attribute: &str) -> Vec<String> {
    let pattern = format!(
        r#"(?i)\b{}\s*:\s*([^\s,;)]+)"#,
        regex::escape(attribute)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };
    re.captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim_matches(['\'', '"']).to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Literals the XPath compares an attribute against, e.g. `public` in
/// `@Visibility = 'public'`.
pub fn compared_literals(xpath: &str, attribute: &str) -> Vec<String> {
    let pattern = format!(
        r#"@{}\s*(?:!=|<=|>=|=|<|>)\s*(?:'([^']*)'|"([^"]*)")"#,
        regex::escape(attribute)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };
    re.captures_iter(xpath)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// An attribute is evidenced when its name appears as a word, when an
/// `Attr: value` annotation names it, or when a literal it is compared to
/// appears in the content.
pub fn is_attribute_evidenced(attribute: &str, content: &str, xpath: &str) -> bool {
    contains_word(content, attribute)
        || !annotated_values(content, attribute).is_empty()
        || compared_literals(xpath, attribute)
            .iter()
            .any(|literal| contains_text(content, literal))
}

/// String literal values in an expression, without their quotes.
pub fn string_literals(expression: &str) -> Vec<String> {
    crate::xpath::extract_hardcoded_values(expression)
        .into_iter()
        .filter(|v| v.kind == crate::xpath::LiteralKind::String)
        .map(|v| {
            let inner = v.value.get(1..v.value.len().saturating_sub(1)).unwrap_or("");
            inner.to_string()
        })
        .filter(|v| !v.is_empty())
        .collect()
}
