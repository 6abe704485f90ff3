//! Apex source parsing for node-type presence checks.
//!
//! The tree is small: a closed [`NodeKind`] carrying the PMD
//! node name, a 1-based start line, and ordered children. Attributes are not
//! modelled; the engine only asks "does a node of this kind exist" and "which
//! node starts on this line".

pub mod lexer;
pub mod parser;
pub mod presence;

pub use parser::BuiltinApexParser;
pub use presence::{PresenceCheck, check_presence};

use serde::Serialize;

macro_rules! node_kinds {
    ($($kind:ident),* $(,)?) => {
        /// PMD Apex AST node kinds produced by the built-in parser.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum NodeKind {
            $($kind),*
        }

        impl NodeKind {
            pub const ALL: &'static [NodeKind] = &[$(NodeKind::$kind),*];

            /// The PMD node name, as written in XPath rules.
            pub fn name(self) -> &'static str {
                match self {
                    $(NodeKind::$kind => stringify!($kind)),*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($kind) => Some(NodeKind::$kind),)*
                    _ => None,
                }
            }
        }
    };
}

node_kinds! {
    ApexFile,
    // declarations
    UserClass,
    UserInterface,
    UserEnum,
    UserTrigger,
    Method,
    Parameter,
    Field,
    FieldDeclarationStatements,
    FieldDeclaration,
    Property,
    ModifierNode,
    Annotation,
    AnnotationParameter,
    // statements
    BlockStatement,
    ExpressionStatement,
    IfElseBlockStatement,
    IfBlockStatement,
    StandardCondition,
    ForLoopStatement,
    ForEachStatement,
    WhileLoopStatement,
    DoLoopStatement,
    SwitchStatement,
    ValueWhenBlock,
    TypeWhenBlock,
    ElseWhenBlock,
    LiteralCase,
    IdentifierCase,
    TryCatchFinallyBlockStatement,
    CatchBlockStatement,
    RunAsBlockStatement,
    ReturnStatement,
    ThrowStatement,
    BreakStatement,
    ContinueStatement,
    DmlInsertStatement,
    DmlUpdateStatement,
    DmlUpsertStatement,
    DmlDeleteStatement,
    DmlUndeleteStatement,
    DmlMergeStatement,
    VariableDeclarationStatements,
    VariableDeclaration,
    // expressions
    AssignmentExpression,
    TernaryExpression,
    NullCoalescingExpression,
    BooleanExpression,
    BinaryExpression,
    InstanceOfExpression,
    PrefixExpression,
    PostfixExpression,
    CastExpression,
    MethodCallExpression,
    VariableExpression,
    ClassRefExpression,
    ArrayLoadExpression,
    LiteralExpression,
    ThisVariableExpression,
    ThisMethodCallExpression,
    SuperVariableExpression,
    SuperMethodCallExpression,
    NewObjectExpression,
    NewKeyValueObjectExpression,
    NewListInitExpression,
    NewListLiteralExpression,
    NewSetInitExpression,
    NewSetLiteralExpression,
    NewMapInitExpression,
    NewMapLiteralExpression,
    MapEntryNode,
    SoqlExpression,
    SoslExpression,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AstNode {
    pub kind: NodeKind,
    /// 1-based line of the node's first token.
    pub line: usize,
    pub children: Vec<AstNode>,
}

impl AstNode {
    pub fn new(kind: NodeKind, line: usize) -> Self {
        Self {
            kind,
            line,
            children: Vec::new(),
        }
    }

    pub fn with_children(kind: NodeKind, line: usize, children: Vec<AstNode>) -> Self {
        Self {
            kind,
            line,
            children,
        }
    }

    /// Pre-order traversal, the node itself first.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// True if this node or any descendant has the given PMD name.
    pub fn contains_kind(&self, name: &str) -> bool {
        match NodeKind::from_name(name) {
            Some(kind) => self.walk().any(|n| n.kind == kind),
            None => false,
        }
    }

    /// Outermost node starting on `line`, ignoring the file root.
    pub fn node_on_line(&self, line: usize) -> Option<&AstNode> {
        self.walk().find(|n| n.line == line && n.kind != NodeKind::ApexFile)
    }
}

/// Iterator returned by [`AstNode::walk`].
pub struct Walk<'a> {
    stack: Vec<&'a AstNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a AstNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Result of handing example code to an [`ApexParser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed(AstNode),
    /// The code could not be turned into a tree; `reason` is for diagnostics.
    Unusable { reason: String },
}

impl ParseOutcome {
    pub fn root(&self) -> Option<&AstNode> {
        match self {
            ParseOutcome::Parsed(root) => Some(root),
            ParseOutcome::Unusable { .. } => None,
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, ParseOutcome::Parsed(_))
    }
}

/// Seam between the coverage engine and whatever produces Apex trees.
pub trait ApexParser: Send + Sync {
    /// Parse example code. Must not panic on arbitrary input.
    fn parse(&self, source: &str) -> ParseOutcome;
}
