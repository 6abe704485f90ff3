//! Node-type presence in example code.

use super::{NodeKind, ParseOutcome};
use regex::Regex;
use std::sync::OnceLock;

static CLASS_KEYWORD: OnceLock<Regex> = OnceLock::new();
static METHOD_SIGNATURE: OnceLock<Regex> = OnceLock::new();
static ANNOTATION: OnceLock<Regex> = OnceLock::new();
static CALL_SHAPE: OnceLock<Regex> = OnceLock::new();

fn class_keyword() -> &'static Regex {
    CLASS_KEYWORD.get_or_init(|| Regex::new(r"(?i)(?:^|[^.\w])class\s+[A-Za-z_]").unwrap())
}

fn method_signature() -> &'static Regex {
    METHOD_SIGNATURE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:public|private|protected|global|static|override|virtual|void)\b[^;{}()=]*\b[A-Za-z_]\w*\s*\([^)]*\)\s*\{",
        )
        .unwrap()
    })
}

fn annotation() -> &'static Regex {
    ANNOTATION.get_or_init(|| Regex::new(r"@[A-Za-z_]\w*").unwrap())
}

fn call_shape() -> &'static Regex {
    CALL_SHAPE.get_or_init(|| {
        Regex::new(r"\b([A-Za-z_]\w*)(?:\s*\.\s*[A-Za-z_]\w*)*\s*\(").unwrap()
    })
}

/// Words followed by `(` that are not calls.
const NOT_CALLS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "new", "class", "void",
];

/// How a node type was (or was not) found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceCheck {
    Present,
    /// Implicit node that example authors never write.
    Implicit,
    /// The tree was unavailable and a syntactic heuristic matched.
    Heuristic,
    Absent,
}

impl PresenceCheck {
    pub fn is_present(self) -> bool {
        !matches!(self, PresenceCheck::Absent)
    }
}

/// Decide whether `node_type` appears in `source`.
///
/// `StandardCondition` is always present and `UserClass` means a class
/// declared inside another class's body. Everything else is looked up in the
/// parsed tree; when the parse is unusable, or the node type is one the
/// built-in grammar never produces, per-type heuristics over the raw text are
/// used instead.
pub fn check_presence(node_type: &str, source: &str, outcome: &ParseOutcome) -> PresenceCheck {
    match node_type {
        "StandardCondition" => return PresenceCheck::Implicit,
        "UserClass" => {
            return if has_nested_class(source) {
                PresenceCheck::Present
            } else {
                PresenceCheck::Absent
            };
        }
        _ => {}
    }

    if let Some(root) = outcome.root()
        && NodeKind::from_name(node_type).is_some()
    {
        return if root.contains_kind(node_type) {
            PresenceCheck::Present
        } else {
            PresenceCheck::Absent
        };
    }

    if heuristic_match(node_type, source) {
        tracing::debug!(node_type, "node type credited by text heuristic");
        PresenceCheck::Heuristic
    } else {
        PresenceCheck::Absent
    }
}

fn heuristic_match(node_type: &str, source: &str) -> bool {
    match node_type {
        "Class" => class_keyword().is_match(source),
        "Method" => method_signature().is_match(source),
        "Annotation" | "AnnotationParameter" => annotation().is_match(source),
        "MethodCallExpression" => call_shape().captures_iter(source).any(|caps| {
            caps.get(1)
                .is_some_and(|m| !NOT_CALLS.iter().any(|k| m.as_str().eq_ignore_ascii_case(k)))
        }),
        _ => false,
    }
}

/// True if a `class` declaration opens inside another class's braces.
///
/// Works on raw text so it also covers code the parser rejects. Comments
/// and string literals are skipped; `Foo.class` is not a declaration.
pub fn has_nested_class(source: &str) -> bool {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    // brace depth outside each open class body
    let mut class_scopes: Vec<usize> = Vec::new();
    let mut pending_class = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 2;
                continue;
            }
            b'\'' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'\'' && bytes[i] != b'\n' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'{' => {
                if pending_class {
                    if !class_scopes.is_empty() {
                        return true;
                    }
                    class_scopes.push(depth);
                    pending_class = false;
                }
                depth += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                if class_scopes.last() == Some(&depth) {
                    class_scopes.pop();
                }
            }
            b';' => pending_class = false,
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let after_dot = source[..start].trim_end().ends_with('.');
                if source[start..i].eq_ignore_ascii_case("class") && !after_dot {
                    pending_class = true;
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    false
}
