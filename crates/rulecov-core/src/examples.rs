//! Example blocks and their violation/valid markers.
//!
//! Two marker styles are recognised inside example code:
//!
//! - inline: a trailing comment carrying `❌` (violation) or `✅` (valid),
//!   e.g. `insert acc; // ❌ DML in loop`. A marker comment on a line of its
//!   own applies to the next code line.
//! - sections: a `// Violation: ...` or `// Valid: ...` header; the code lines
//!   that follow belong to that section until the next header.
//!
//! When an example carries any inline marker, section headers in it are
//! ignored.

use crate::apex::{ApexParser, ParseOutcome};
use regex::Regex;
use serde::Serialize;
use std::ops::Range;
use std::sync::OnceLock;

pub const VIOLATION_GLYPH: char = '❌';
pub const VALID_GLYPH: char = '✅';

static SECTION_HEADER: OnceLock<Regex> = OnceLock::new();

fn section_header() -> &'static Regex {
    SECTION_HEADER
        .get_or_init(|| Regex::new(r"(?i)^\s*//\s*(violation|valid)s?\s*:\s*(.*)$").unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    /// 1-based line within the example's content.
    pub line_number: usize,
    pub description: String,
    pub is_violation: bool,
    /// 0-based position among markers of the same type.
    pub index: usize,
    /// PMD name of the outermost node starting on the marked line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ast_node_type: Option<String>,
    /// Byte columns of the code portion of the marked line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_span: Option<Range<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_text: Option<String>,
}

impl Marker {
    fn new(line_number: usize, description: impl Into<String>, is_violation: bool) -> Self {
        Self {
            line_number,
            description: description.into(),
            is_violation,
            index: 0,
            ast_node_type: None,
            code_span: None,
            code_text: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleData {
    /// 1-based position of the example in its rule.
    pub example_index: usize,
    pub content: String,
    /// Code lines classified as violations, trimmed.
    pub violations: Vec<String>,
    pub valids: Vec<String>,
    pub violation_markers: Vec<Marker>,
    pub valid_markers: Vec<Marker>,
}

impl ExampleData {
    /// Classify the lines of one example.
    ///
    /// With a parser, markers whose line starts an AST node are annotated with
    /// that node.
    pub fn parse(example_index: usize, content: &str, parser: Option<&dyn ApexParser>) -> Self {
        let lines: Vec<&str> = content.lines().collect();
        let mut markers = inline_markers(&lines);
        let inline = !markers.is_empty();
        let mut violations = Vec::new();
        let mut valids = Vec::new();

        if inline {
            for marker in &markers {
                let code = split_comment(lines[marker.line_number - 1]).0.trim();
                if !code.is_empty() {
                    let bucket = if marker.is_violation {
                        &mut violations
                    } else {
                        &mut valids
                    };
                    bucket.push(code.to_string());
                }
            }
        } else {
            markers = section_markers(&lines, &mut violations, &mut valids);
        }

        if let Some(parser) = parser
            && !markers.is_empty()
        {
            annotate_with_ast(&mut markers, &lines, &parser.parse(content));
        }

        let (mut violation_markers, mut valid_markers): (Vec<_>, Vec<_>) =
            markers.into_iter().partition(|m| m.is_violation);
        for (index, marker) in violation_markers.iter_mut().enumerate() {
            marker.index = index;
        }
        for (index, marker) in valid_markers.iter_mut().enumerate() {
            marker.index = index;
        }

        Self {
            example_index,
            content: content.to_string(),
            violations,
            valids,
            violation_markers,
            valid_markers,
        }
    }

    pub fn has_markers(&self) -> bool {
        !self.violation_markers.is_empty() || !self.valid_markers.is_empty()
    }
}

/// Parse every example of a rule, numbering them from 1.
pub fn parse_examples(examples: &[String], parser: Option<&dyn ApexParser>) -> Vec<ExampleData> {
    examples
        .iter()
        .enumerate()
        .map(|(i, content)| ExampleData::parse(i + 1, content, parser))
        .collect()
}

/// All example contents joined by newlines.
pub fn combined_content(examples: &[ExampleData]) -> String {
    examples
        .iter()
        .map(|e| e.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split a line into its code and its `//` comment, ignoring `//` inside
/// string literals.
pub fn split_comment(line: &str) -> (&str, Option<&str>) {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_string => i += 1,
            b'\'' => in_string = !in_string,
            b'/' if !in_string && bytes.get(i + 1) == Some(&b'/') => {
                return (&line[..i], Some(&line[i + 2..]));
            }
            _ => {}
        }
        i += 1;
    }
    (line, None)
}

fn inline_markers(lines: &[&str]) -> Vec<Marker> {
    let mut markers = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let (code, Some(comment)) = split_comment(line) else {
            continue;
        };
        let (is_violation, glyph) = if comment.contains(VIOLATION_GLYPH) {
            (true, VIOLATION_GLYPH)
        } else if comment.contains(VALID_GLYPH) {
            (false, VALID_GLYPH)
        } else {
            continue;
        };
        let description = comment
            .split_once(glyph)
            .map_or("", |(_, rest)| rest)
            .trim();

        let target = if code.trim().is_empty() {
            next_code_line(lines, idx + 1).unwrap_or(idx)
        } else {
            idx
        };
        markers.push(Marker::new(target + 1, description, is_violation));
    }
    markers
}

fn next_code_line(lines: &[&str], from: usize) -> Option<usize> {
    (from..lines.len()).find(|&i| !split_comment(lines[i]).0.trim().is_empty())
}

fn section_markers(
    lines: &[&str],
    violations: &mut Vec<String>,
    valids: &mut Vec<String>,
) -> Vec<Marker> {
    let mut markers: Vec<Marker> = Vec::new();
    // (is_violation, index of the section's marker, first code line seen)
    let mut section: Option<(bool, usize, bool)> = None;

    for (idx, line) in lines.iter().enumerate() {
        if let Some(caps) = section_header().captures(line) {
            let is_violation = caps[1].eq_ignore_ascii_case("violation");
            markers.push(Marker::new(idx + 1, caps[2].trim(), is_violation));
            section = Some((is_violation, markers.len() - 1, false));
            continue;
        }
        let code = split_comment(line).0.trim();
        if code.is_empty() {
            continue;
        }
        if let Some((is_violation, marker_idx, seen_code)) = section.as_mut() {
            if !*seen_code {
                markers[*marker_idx].line_number = idx + 1;
                *seen_code = true;
            }
            if *is_violation {
                violations.push(code.to_string());
            } else {
                valids.push(code.to_string());
            }
        }
    }
    markers
}

fn annotate_with_ast(markers: &mut [Marker], lines: &[&str], outcome: &ParseOutcome) {
    let Some(root) = outcome.root() else {
        return;
    };
    for marker in markers {
        let Some(node) = root.node_on_line(marker.line_number) else {
            continue;
        };
        let line = lines[marker.line_number - 1];
        let code = split_comment(line).0;
        let trimmed = code.trim();
        if trimmed.is_empty() {
            continue;
        }
        let start = code.len() - code.trim_start().len();
        marker.ast_node_type = Some(node.kind.name().to_string());
        marker.code_span = Some(start..start + trimmed.len());
        marker.code_text = Some(trimmed.to_string());
    }
}
