//! Node-type extraction.
//!
//! A node type is an identifier that sits in step position (after `//`, `/`,
//! `(`, `[`, `,`, `|`, `::` or whitespace), ends at a step boundary, and has
//! the shape of a PMD Apex AST node name. Quoted literals are skipped.

use super::scan::{is_ident_char, is_ident_start, skip_quoted};

/// Standalone short names.
const STANDALONE: &[&str] = &[
    "Method",
    "Field",
    "Class",
    "Type",
    "Condition",
    "Loop",
    "Block",
    "Parameter",
    "Property",
    "Annotation",
];

/// `*Statement`, `*Expression`, ... families.
const SUFFIXES: &[&str] = &["Statement", "Expression", "Declaration", "Node", "Block"];

/// Names containing one of these are node-shaped (`MethodCallExpression`, `UserClass`).
const INFIXES: &[&str] = &["Method", "Class", "Field", "Condition", "Loop", "Type"];

const ROOT_NODES: &[&str] = &["ApexFile", "AnonymousClass", "FormalComment"];

const USER_NODES: &[&str] = &[
    "UserClass",
    "UserClassMethods",
    "UserEnum",
    "UserExceptionMethods",
    "UserInterface",
    "UserTrigger",
];

const DML_NODES: &[&str] = &[
    "DmlDeleteStatement",
    "DmlInsertStatement",
    "DmlMergeStatement",
    "DmlUndeleteStatement",
    "DmlUpdateStatement",
    "DmlUpsertStatement",
];

const INITIALIZER_NODES: &[&str] = &[
    "NewKeyValueObjectExpression",
    "NewListInitExpression",
    "NewListLiteralExpression",
    "NewMapInitExpression",
    "NewMapLiteralExpression",
    "NewObjectExpression",
    "NewSetInitExpression",
    "NewSetLiteralExpression",
    "ConstructorPreamble",
    "ConstructorPreambleStatement",
];

const MODIFIER_NODES: &[&str] = &[
    "Modifier",
    "ModifierNode",
    "ModifierOrAnnotation",
    "AnnotationParameter",
];

const MISC_NODES: &[&str] = &[
    "BindExpressions",
    "CatchBlockStatement",
    "ElseWhenBlock",
    "IdentifierCase",
    "LiteralCase",
    "MapEntryNode",
    "MultiStatement",
    "StandardCondition",
    "StatementExecuted",
    "TypeWhenBlock",
    "ValueWhenBlock",
];

const QUERY_NODES: &[&str] = &["SoqlExpression", "SoslExpression"];

/// PMD attribute names that share a node-type shape.
pub const ATTRIBUTE_COLLISIONS: &[&str] = &[
    "Type",
    "Name",
    "ReturnType",
    "DefiningType",
    "FullMethodName",
    "MethodName",
    "TypeName",
    "CanonicalName",
    "Image",
];

/// How node-type-shaped attribute names are handled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Keep every node-shaped token.
    PatternOnly,
    /// Drop [`ATTRIBUTE_COLLISIONS`].
    #[default]
    ExcludeAttributeNames,
    /// Drop [`ATTRIBUTE_COLLISIONS`] and the given names.
    ExcludeWith(Vec<String>),
}

impl CollisionPolicy {
    fn excludes(&self, name: &str) -> bool {
        match self {
            CollisionPolicy::PatternOnly => false,
            CollisionPolicy::ExcludeAttributeNames => ATTRIBUTE_COLLISIONS.contains(&name),
            CollisionPolicy::ExcludeWith(extra) => {
                ATTRIBUTE_COLLISIONS.contains(&name) || extra.iter().any(|e| e == name)
            }
        }
    }
}

/// Whether `name` has the shape of a PMD Apex node name.
pub fn is_node_type_name(name: &str) -> bool {
    let Some(first) = name.chars().next() else {
        return false;
    };
    if !first.is_ascii_uppercase() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }

    let catalogs = [
        ROOT_NODES,
        USER_NODES,
        DML_NODES,
        INITIALIZER_NODES,
        MODIFIER_NODES,
        MISC_NODES,
        QUERY_NODES,
        STANDALONE,
    ];
    if catalogs.iter().any(|catalog| catalog.contains(&name)) {
        return true;
    }

    SUFFIXES
        .iter()
        .any(|suffix| name.len() > suffix.len() && name.ends_with(suffix))
        || INFIXES.iter().any(|infix| name.contains(infix))
}

fn is_step_delimiter(bytes: &[u8], ident_start: usize) -> bool {
    if ident_start == 0 {
        return false;
    }
    match bytes[ident_start - 1] {
        b'/' | b'(' | b'[' | b',' | b'|' => true,
        b':' => ident_start >= 2 && bytes[ident_start - 2] == b':',
        c => c.is_ascii_whitespace(),
    }
}

fn is_step_boundary(bytes: &[u8], ident_end: usize) -> bool {
    match bytes.get(ident_end) {
        None => true,
        Some(c) => {
            matches!(c, b'[' | b'(' | b'/' | b')' | b',' | b'|' | b']') || c.is_ascii_whitespace()
        }
    }
}

/// Extract node types with the default collision policy.
pub fn extract_node_types(xpath: &str) -> Vec<String> {
    extract_node_types_with(xpath, &CollisionPolicy::default())
}

/// Extract node types in discovery order, deduplicated.
pub fn extract_node_types_with(xpath: &str, policy: &CollisionPolicy) -> Vec<String> {
    let bytes = xpath.as_bytes();
    let mut found: Vec<String> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\'' || b == b'"' {
            i = skip_quoted(bytes, i);
            continue;
        }
        if !is_ident_start(b) || (i > 0 && is_ident_char(bytes[i - 1])) {
            i += 1;
            continue;
        }

        let start = i;
        while i < bytes.len() && is_ident_char(bytes[i]) {
            i += 1;
        }
        let name = &xpath[start..i];

        if is_step_delimiter(bytes, start)
            && is_step_boundary(bytes, i)
            && is_node_type_name(name)
            && !policy.excludes(name)
            && !found.iter().any(|f| f == name)
        {
            found.push(name.to_string());
        }
    }

    found
}
