//! Projecting XPath components back onto rule-file lines.
//!
//! Lookups go through three stages, stopping at the first hit:
//!
//! 1. a line mentioning `xpath`, `value` and the token (single-line property);
//! 2. the first line inside the `xpath` property element holding the token;
//! 3. the token's offset inside the XPath, counted in newlines from the line
//!    where the XPath value starts (after `<value>`, `value="` or `<![CDATA[`).
//!
//! Conditionals search from the last line backwards in stages 1 and 2 so a
//! nested `or` clause lands on its own line rather than on the enclosing
//! `and`. Every answer is a 1-based line or `None`.

use crate::fs::RuleFileCache;
use crate::rule_file::xpath_property_span;
use crate::xpath::Conditional;
use crate::xpath::scan::is_ident_char;
use std::ops::Range;
use std::path::Path;

const CDATA_OPEN: &str = "<![CDATA[";

/// A component of an XPath to locate.
#[derive(Debug, Clone, Copy)]
pub enum LineTarget<'a> {
    /// Attribute name without the `@`.
    Attribute(&'a str),
    NodeType(&'a str),
    /// Value compared against `@Op`, without quotes.
    Operator(&'a str),
    Conditional(&'a Conditional),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Exact,
    /// Identifier boundary on both sides, not an `@attribute`.
    Word,
    /// Identifier boundary after the match only.
    End,
}

impl Boundary {
    fn accepts(self, haystack: &str, start: usize, len: usize) -> bool {
        let bytes = haystack.as_bytes();
        let after_ok = bytes.get(start + len).is_none_or(|&b| !is_ident_char(b));
        match self {
            Boundary::Exact => true,
            Boundary::End => after_ok,
            Boundary::Word => {
                let before_ok = start == 0 || {
                    let b = bytes[start - 1];
                    !is_ident_char(b) && b != b'@'
                };
                before_ok && after_ok
            }
        }
    }
}

/// Search patterns for one target. Several needles cover the quoting styles
/// an operator value may be written in.
struct Needles {
    patterns: Vec<String>,
    boundary: Boundary,
    backward: bool,
}

impl Needles {
    fn for_target(target: LineTarget<'_>) -> Self {
        match target {
            LineTarget::Attribute(name) => Self {
                patterns: vec![format!("@{name}")],
                boundary: Boundary::End,
                backward: false,
            },
            LineTarget::NodeType(name) => Self {
                patterns: vec![name.to_string()],
                boundary: Boundary::Word,
                backward: false,
            },
            LineTarget::Operator(value) => Self {
                patterns: vec![format!("'{value}'"), format!("\"{value}\"")],
                boundary: Boundary::Exact,
                backward: false,
            },
            LineTarget::Conditional(cond) => Self {
                patterns: vec![cond.search_text()],
                boundary: Boundary::Exact,
                backward: true,
            },
        }
    }

    /// First match in `haystack`, trying each pattern in turn.
    fn find_in(&self, haystack: &str) -> Option<usize> {
        self.patterns
            .iter()
            .filter(|p| !p.is_empty())
            .filter_map(|p| {
                haystack
                    .match_indices(p.as_str())
                    .map(|(i, _)| i)
                    .find(|&i| self.boundary.accepts(haystack, i, p.len()))
            })
            .min()
    }

    /// True if `line` holds a pattern as written or XML-escaped.
    fn in_line(&self, line: &str) -> bool {
        self.find_in(line).is_some() || {
            let escaped = Needles {
                patterns: self.patterns.iter().map(|p| escape_xml(p)).collect(),
                boundary: self.boundary,
                backward: self.backward,
            };
            escaped.find_in(line).is_some()
        }
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Resolves lines for one rule's XPath within that rule's text.
#[derive(Debug, Clone)]
pub struct LineLocator<'a> {
    text: &'a str,
    xpath: &'a str,
    /// Byte range of the `xpath` property element in `text`.
    property: Option<Range<usize>>,
    line_offset: usize,
}

impl<'a> LineLocator<'a> {
    /// `text` is the rule file (or one rule's slice of it) and `xpath` the
    /// expression extracted from it.
    pub fn new(text: &'a str, xpath: &'a str) -> Self {
        Self::with_property(text, xpath, xpath_property_span(text))
    }

    /// Like [`new`](Self::new) with the property range already known.
    pub fn with_property(text: &'a str, xpath: &'a str, property: Option<Range<usize>>) -> Self {
        let property = property.filter(|span| text.get(span.clone()).is_some());
        Self {
            text,
            xpath,
            property,
            line_offset: 0,
        }
    }

    /// Shift every answer by the 0-based line where `text` starts in its file.
    pub fn with_line_offset(mut self, line_offset: usize) -> Self {
        self.line_offset = line_offset;
        self
    }

    pub fn locate(&self, target: LineTarget<'_>) -> Option<usize> {
        let needles = Needles::for_target(target);
        let line = self
            .single_line(&needles)
            .or_else(|| self.in_property(&needles))
            .or_else(|| self.positional(&needles, target));
        if line.is_none() {
            tracing::debug!(?target, "no line found for xpath component");
        }
        line.map(|l| l + self.line_offset)
    }

    pub fn attribute(&self, name: &str) -> Option<usize> {
        self.locate(LineTarget::Attribute(name))
    }

    pub fn node_type(&self, name: &str) -> Option<usize> {
        self.locate(LineTarget::NodeType(name))
    }

    pub fn operator(&self, value: &str) -> Option<usize> {
        self.locate(LineTarget::Operator(value))
    }

    pub fn conditional(&self, conditional: &Conditional) -> Option<usize> {
        self.locate(LineTarget::Conditional(conditional))
    }

    fn single_line(&self, needles: &Needles) -> Option<usize> {
        let matches =
            |line: &str| line.contains("xpath") && line.contains("value") && needles.in_line(line);
        let lines: Vec<&str> = self.text.lines().collect();
        let found = if needles.backward {
            lines.iter().rposition(|l| matches(l))
        } else {
            lines.iter().position(|l| matches(l))
        };
        found.map(|idx| idx + 1)
    }

    fn in_property(&self, needles: &Needles) -> Option<usize> {
        let span = self.property.clone()?;
        let first_line = line_of(self.text, span.start);
        let section: Vec<&str> = self.text[span].lines().collect();
        let found = if needles.backward {
            section.iter().rposition(|l| needles.in_line(l))
        } else {
            section.iter().position(|l| needles.in_line(l))
        };
        found.map(|idx| first_line + idx)
    }

    fn positional(&self, needles: &Needles, target: LineTarget<'_>) -> Option<usize> {
        let offset = match target {
            LineTarget::Conditional(cond) => Some(cond.position),
            _ => needles.find_in(self.xpath),
        }?;
        let newlines = self.xpath.get(..offset)?.matches('\n').count();
        Some(self.value_start_line()? + newlines)
    }

    /// Line holding the first character of the XPath value.
    fn value_start_line(&self) -> Option<usize> {
        let span = self.property.clone()?;
        let section = &self.text[span.clone()];
        let value_at = match section.find("<value>") {
            Some(i) => i + "<value>".len(),
            None => {
                let attr = section.find("value=")?;
                attr + "value=".len() + 1
            }
        };
        let mut pos = span.start + value_at.min(section.len());
        pos = skip_whitespace(self.text, pos);
        if self.text[pos..].starts_with(CDATA_OPEN) {
            pos = skip_whitespace(self.text, pos + CDATA_OPEN.len());
        }
        Some(line_of(self.text, pos))
    }
}

fn skip_whitespace(text: &str, pos: usize) -> usize {
    text[pos..]
        .find(|c: char| !c.is_whitespace())
        .map_or(text.len(), |i| pos + i)
}

/// 1-based line containing byte `pos`.
fn line_of(text: &str, pos: usize) -> usize {
    text[..pos].matches('\n').count() + 1
}

/// Locate a component in a rule file on disk.
///
/// Unreadable files resolve to `None`.
pub fn locate_in_file(
    cache: &RuleFileCache,
    path: &Path,
    xpath: &str,
    target: LineTarget<'_>,
) -> Option<usize> {
    let text = cache.get(path)?;
    LineLocator::new(&text, xpath).locate(target)
}
