//! Recursive-descent parser for Apex example code.
//!
//! Examples are often fragments, so three entry points are tried in order:
//! a full compilation unit (classes, interfaces, enums, triggers), a list of
//! statements, then a list of class-body members. The first one that consumes
//! every token wins; if none does, the error that got furthest is reported.

use super::lexer::{Token, TokenKind, tokenize};
use super::{ApexParser, AstNode, NodeKind, ParseOutcome};

const MAX_DEPTH: usize = 200;

const MODIFIERS: &[&str] = &[
    "public",
    "private",
    "protected",
    "global",
    "static",
    "final",
    "abstract",
    "virtual",
    "override",
    "transient",
    "webservice",
    "testmethod",
];

/// Words that can never start an expression.
const RESERVED: &[&str] = &[
    "abstract",
    "catch",
    "class",
    "do",
    "else",
    "enum",
    "finally",
    "for",
    "global",
    "if",
    "interface",
    "override",
    "private",
    "protected",
    "public",
    "return",
    "static",
    "throw",
    "try",
    "virtual",
    "while",
];

const DML: &[(&str, NodeKind)] = &[
    ("insert", NodeKind::DmlInsertStatement),
    ("update", NodeKind::DmlUpdateStatement),
    ("upsert", NodeKind::DmlUpsertStatement),
    ("delete", NodeKind::DmlDeleteStatement),
    ("undelete", NodeKind::DmlUndeleteStatement),
    ("merge", NodeKind::DmlMergeStatement),
];

const ASSIGNMENT_OPS: &[&str] = &["=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<="];

/// Parser backed by the in-crate lexer and grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinApexParser;

impl ApexParser for BuiltinApexParser {
    fn parse(&self, source: &str) -> ParseOutcome {
        let tokens = match tokenize(source) {
            Ok(tokens) => tokens,
            Err(e) => {
                return ParseOutcome::Unusable {
                    reason: e.to_string(),
                };
            }
        };
        if tokens.is_empty() {
            return ParseOutcome::Unusable {
                reason: "no code to parse".to_string(),
            };
        }

        let mut furthest: Option<SyntaxError> = None;
        for entry in [Entry::TypeDeclarations, Entry::Statements, Entry::Members] {
            let mut parser = Parser::new(&tokens);
            match parser.parse_as(entry) {
                Ok(children) => {
                    return ParseOutcome::Parsed(AstNode::with_children(
                        NodeKind::ApexFile,
                        1,
                        children,
                    ));
                }
                Err(e) => {
                    if furthest.as_ref().is_none_or(|f| e.pos > f.pos) {
                        furthest = Some(e);
                    }
                }
            }
        }

        let reason = furthest.map(|e| e.to_string()).unwrap_or_default();
        tracing::debug!(%reason, "apex snippet is not parseable");
        ParseOutcome::Unusable { reason }
    }
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    TypeDeclarations,
    Statements,
    Members,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} at line {line}")]
struct SyntaxError {
    message: String,
    line: usize,
    /// Token index where parsing stopped.
    pos: usize,
}

type PResult<T> = Result<T, SyntaxError>;

struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    depth: usize,
}

impl<'t, 'a> Parser<'t, 'a> {
    fn new(tokens: &'t [Token<'a>]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn parse_as(&mut self, entry: Entry) -> PResult<Vec<AstNode>> {
        let mut nodes = Vec::new();
        while !self.at_end() {
            match entry {
                Entry::TypeDeclarations => {
                    if !self.eat_punct(";") {
                        nodes.push(self.type_declaration()?);
                    }
                }
                Entry::Statements => nodes.extend(self.statement()?),
                Entry::Members => nodes.extend(self.member()?),
            }
        }
        Ok(nodes)
    }

    // ---- token helpers ----

    fn peek(&self) -> Option<&'t Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, n: usize) -> Option<&'t Token<'a>> {
        self.tokens.get(self.pos + n)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn at_word(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.is_word(word))
    }

    fn at_punct(&self, punct: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(punct))
    }

    fn at_ident(&self) -> bool {
        self.peek().is_some_and(|t| t.kind == TokenKind::Ident)
    }

    fn nth_is_word(&self, n: usize, word: &str) -> bool {
        self.peek_at(n).is_some_and(|t| t.is_word(word))
    }

    fn nth_is_punct(&self, n: usize, punct: &str) -> bool {
        self.peek_at(n).is_some_and(|t| t.is_punct(punct))
    }

    fn line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn bump(&mut self) -> Option<&'t Token<'a>> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(tok)
    }

    fn eat_word(&mut self, word: &str) -> bool {
        let hit = self.at_word(word);
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        let hit = self.at_punct(punct);
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn expect_punct(&mut self, punct: &str) -> PResult<()> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", punct)))
        }
    }

    fn expect_ident(&mut self) -> PResult<&'t Token<'a>> {
        match self.peek() {
            Some(tok) if tok.kind == TokenKind::Ident => {
                self.pos += 1;
                Ok(tok)
            }
            _ => Err(self.error("expected identifier")),
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        let found = self
            .peek()
            .map_or_else(|| "end of input".to_string(), |t| format!("'{}'", t.text));
        SyntaxError {
            message: format!("{}, found {}", message.into(), found),
            line: self.line(),
            pos: self.pos,
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    // ---- declarations ----

    fn type_declaration(&mut self) -> PResult<AstNode> {
        if self.at_word("trigger") && self.peek_at(1).is_some_and(|t| t.kind == TokenKind::Ident)
        {
            return self.trigger();
        }
        let modifiers = self.modifiers()?;
        self.type_body(modifiers)
    }

    fn trigger(&mut self) -> PResult<AstNode> {
        let line = self.line();
        self.pos += 1;
        self.expect_ident()?;
        if !self.eat_word("on") {
            return Err(self.error("expected 'on'"));
        }
        self.expect_ident()?;
        self.expect_punct("(")?;
        while !self.eat_punct(")") {
            match self.bump() {
                Some(tok) if tok.kind == TokenKind::Ident || tok.is_punct(",") => {}
                _ => return Err(self.error("expected trigger event")),
            }
        }
        let body = self.block()?;
        Ok(AstNode::with_children(
            NodeKind::UserTrigger,
            line,
            vec![body],
        ))
    }

    /// `class`, `interface` or `enum` declaration after its modifiers.
    fn type_body(&mut self, modifiers: AstNode) -> PResult<AstNode> {
        let line = self.line();
        let kind = if self.eat_word("class") {
            NodeKind::UserClass
        } else if self.eat_word("interface") {
            NodeKind::UserInterface
        } else if self.eat_word("enum") {
            NodeKind::UserEnum
        } else {
            return Err(self.error("expected class, interface, enum or trigger"));
        };
        self.expect_ident()?;
        let mut children = vec![modifiers];

        if kind == NodeKind::UserEnum {
            self.expect_punct("{")?;
            while !self.eat_punct("}") {
                if self.at_end() {
                    return Err(self.error("unclosed enum"));
                }
                if !self.eat_punct(",") && !self.eat_punct(";") {
                    self.expect_ident()?;
                }
            }
            return Ok(AstNode::with_children(kind, line, children));
        }

        if self.eat_word("extends") {
            self.type_list()?;
        }
        if self.eat_word("implements") {
            self.type_list()?;
        }
        self.expect_punct("{")?;
        while !self.eat_punct("}") {
            if self.at_end() {
                return Err(self.error("unclosed type body"));
            }
            children.extend(self.member()?);
        }
        Ok(AstNode::with_children(kind, line, children))
    }

    /// Annotations and modifier keywords, always producing a `ModifierNode`.
    fn modifiers(&mut self) -> PResult<AstNode> {
        let mut node = AstNode::new(NodeKind::ModifierNode, self.line());
        loop {
            if self.at_punct("@") {
                node.children.push(self.annotation()?);
            } else if self
                .peek()
                .is_some_and(|t| MODIFIERS.iter().any(|m| t.is_word(m)))
            {
                self.pos += 1;
            } else if (self.at_word("with") || self.at_word("without") || self.at_word("inherited"))
                && self.nth_is_word(1, "sharing")
            {
                self.pos += 2;
            } else {
                return Ok(node);
            }
        }
    }

    fn annotation(&mut self) -> PResult<AstNode> {
        let line = self.line();
        self.expect_punct("@")?;
        self.expect_ident()?;
        let mut node = AstNode::new(NodeKind::Annotation, line);
        if !self.eat_punct("(") {
            return Ok(node);
        }
        while !self.eat_punct(")") {
            if self.eat_punct(",") {
                continue;
            }
            let param_line = self.line();
            if self.at_ident() && self.nth_is_punct(1, "=") {
                self.pos += 2;
            }
            match self.peek() {
                Some(tok) if tok.kind != TokenKind::Punct => self.pos += 1,
                _ => return Err(self.error("expected annotation value")),
            }
            node.children
                .push(AstNode::new(NodeKind::AnnotationParameter, param_line));
        }
        Ok(node)
    }

    fn member(&mut self) -> PResult<Vec<AstNode>> {
        self.nested(|p| p.member_inner())
    }

    fn member_inner(&mut self) -> PResult<Vec<AstNode>> {
        if self.eat_punct(";") {
            return Ok(Vec::new());
        }
        let modifiers = self.modifiers()?;
        let line = self.line();

        if self.at_word("class") || self.at_word("interface") || self.at_word("enum") {
            return Ok(vec![self.type_body(modifiers)?]);
        }
        if self.at_punct("{") {
            // initializer block
            return Ok(vec![self.block()?]);
        }
        if self.at_ident() && self.nth_is_punct(1, "(") {
            // constructor
            self.pos += 1;
            return Ok(vec![self.method_rest(line, modifiers)?]);
        }

        self.type_ref()?;
        let name = self.expect_ident()?;
        if self.at_punct("(") {
            return Ok(vec![self.method_rest(line, modifiers)?]);
        }
        if self.at_punct("{") {
            return Ok(vec![self.property_rest(line, modifiers)?]);
        }
        self.field_rest(line, modifiers, name.line)
    }

    fn method_rest(&mut self, line: usize, modifiers: AstNode) -> PResult<AstNode> {
        let mut children = vec![modifiers];
        self.expect_punct("(")?;
        while !self.eat_punct(")") {
            if self.at_end() {
                return Err(self.error("unclosed parameter list"));
            }
            if self.eat_punct(",") {
                continue;
            }
            let param_line = self.line();
            let param_modifiers = self.modifiers()?;
            self.type_ref()?;
            self.expect_ident()?;
            children.push(AstNode::with_children(
                NodeKind::Parameter,
                param_line,
                vec![param_modifiers],
            ));
        }
        if !self.eat_punct(";") {
            children.push(self.block()?);
        }
        Ok(AstNode::with_children(NodeKind::Method, line, children))
    }

    fn property_rest(&mut self, line: usize, modifiers: AstNode) -> PResult<AstNode> {
        let mut children = vec![modifiers];
        self.expect_punct("{")?;
        while !self.eat_punct("}") {
            if self.at_end() {
                return Err(self.error("unclosed property"));
            }
            self.modifiers()?;
            if !self.eat_word("get") && !self.eat_word("set") {
                return Err(self.error("expected 'get' or 'set'"));
            }
            if !self.eat_punct(";") {
                children.push(self.block()?);
            }
        }
        Ok(AstNode::with_children(NodeKind::Property, line, children))
    }

    fn field_rest(
        &mut self,
        line: usize,
        modifiers: AstNode,
        first_name_line: usize,
    ) -> PResult<Vec<AstNode>> {
        let mut declarations = Vec::new();
        let mut name_line = first_name_line;
        loop {
            let mut declaration = AstNode::new(NodeKind::FieldDeclaration, name_line);
            if self.eat_punct("=") {
                declaration.children.push(self.expression()?);
            }
            declarations.push(declaration);
            if !self.eat_punct(",") {
                break;
            }
            name_line = self.expect_ident()?.line;
        }
        self.expect_punct(";")?;

        let mut nodes: Vec<AstNode> = declarations
            .iter()
            .map(|d| AstNode::new(NodeKind::Field, d.line))
            .collect();
        let mut children = vec![modifiers];
        children.extend(declarations);
        nodes.push(AstNode::with_children(
            NodeKind::FieldDeclarationStatements,
            line,
            children,
        ));
        Ok(nodes)
    }

    /// `Name(.Name)*<Args>?([])*`
    fn type_ref(&mut self) -> PResult<()> {
        self.nested(|p| {
            p.expect_ident()?;
            while p.at_punct(".") && p.peek_at(1).is_some_and(|t| t.kind == TokenKind::Ident) {
                p.pos += 2;
            }
            if p.at_punct("<") {
                p.type_args()?;
            }
            while p.at_punct("[") && p.nth_is_punct(1, "]") {
                p.pos += 2;
            }
            Ok(())
        })
    }

    fn type_args(&mut self) -> PResult<()> {
        self.expect_punct("<")?;
        loop {
            self.type_ref()?;
            if !self.eat_punct(",") {
                return self.expect_punct(">");
            }
        }
    }

    fn type_list(&mut self) -> PResult<()> {
        loop {
            self.type_ref()?;
            if !self.eat_punct(",") {
                return Ok(());
            }
        }
    }

    // ---- statements ----

    fn block(&mut self) -> PResult<AstNode> {
        let line = self.line();
        self.expect_punct("{")?;
        let mut children = Vec::new();
        while !self.eat_punct("}") {
            if self.at_end() {
                return Err(self.error("unclosed block"));
            }
            children.extend(self.statement()?);
        }
        Ok(AstNode::with_children(
            NodeKind::BlockStatement,
            line,
            children,
        ))
    }

    /// One statement; `None` for an empty `;`.
    fn statement(&mut self) -> PResult<Option<AstNode>> {
        self.nested(|p| p.statement_inner())
    }

    fn statement_inner(&mut self) -> PResult<Option<AstNode>> {
        let line = self.line();
        let Some(tok) = self.peek() else {
            return Err(self.error("expected statement"));
        };
        if tok.is_punct(";") {
            self.pos += 1;
            return Ok(None);
        }
        if tok.is_punct("{") {
            return self.block().map(Some);
        }

        if tok.kind == TokenKind::Ident {
            let keyword = tok.text.to_ascii_lowercase();
            let node = match keyword.as_str() {
                "if" => Some(self.if_statement(line)?),
                "for" => Some(self.for_statement(line)?),
                "while" => {
                    self.pos += 1;
                    let mut children = vec![self.condition()?];
                    children.extend(self.statement()?);
                    Some(AstNode::with_children(
                        NodeKind::WhileLoopStatement,
                        line,
                        children,
                    ))
                }
                "do" => {
                    self.pos += 1;
                    let mut children: Vec<AstNode> = self.statement()?.into_iter().collect();
                    if !self.eat_word("while") {
                        return Err(self.error("expected 'while'"));
                    }
                    children.push(self.condition()?);
                    self.expect_punct(";")?;
                    Some(AstNode::with_children(
                        NodeKind::DoLoopStatement,
                        line,
                        children,
                    ))
                }
                "switch" if self.nth_is_word(1, "on") => Some(self.switch_statement(line)?),
                "try" => Some(self.try_statement(line)?),
                "return" => {
                    self.pos += 1;
                    let mut node = AstNode::new(NodeKind::ReturnStatement, line);
                    if !self.at_punct(";") {
                        node.children.push(self.expression()?);
                    }
                    self.expect_punct(";")?;
                    Some(node)
                }
                "throw" => {
                    self.pos += 1;
                    let value = self.expression()?;
                    self.expect_punct(";")?;
                    Some(AstNode::with_children(
                        NodeKind::ThrowStatement,
                        line,
                        vec![value],
                    ))
                }
                "break" | "continue" => {
                    self.pos += 1;
                    self.expect_punct(";")?;
                    let kind = if keyword == "break" {
                        NodeKind::BreakStatement
                    } else {
                        NodeKind::ContinueStatement
                    };
                    Some(AstNode::new(kind, line))
                }
                "system" if self.nth_is_punct(1, ".") && self.nth_is_word(2, "runas") => {
                    self.pos += 3;
                    let mut children = self.arguments()?;
                    children.push(self.block()?);
                    Some(AstNode::with_children(
                        NodeKind::RunAsBlockStatement,
                        line,
                        children,
                    ))
                }
                _ => None,
            };
            if node.is_some() {
                return Ok(node);
            }
            if let Some(dml) = self.dml_statement(line)? {
                return Ok(Some(dml));
            }
        }

        if let Some(declaration) = self.local_declaration(line)? {
            self.expect_punct(";")?;
            return Ok(Some(declaration));
        }
        let expr = self.expression()?;
        self.expect_punct(";")?;
        Ok(Some(AstNode::with_children(
            NodeKind::ExpressionStatement,
            line,
            vec![expr],
        )))
    }

    fn dml_statement(&mut self, line: usize) -> PResult<Option<AstNode>> {
        let Some(tok) = self.peek() else {
            return Ok(None);
        };
        let Some(&(_, kind)) = DML.iter().find(|(word, _)| tok.is_word(word)) else {
            return Ok(None);
        };
        // `update = x;` and `insert.foo()` use the word as a name
        if self
            .peek_at(1)
            .is_none_or(|t| t.kind == TokenKind::Punct && t.text != "[")
        {
            return Ok(None);
        }
        self.pos += 1;
        if self.at_word("as") && (self.nth_is_word(1, "user") || self.nth_is_word(1, "system")) {
            self.pos += 2;
        }
        let mut children = vec![self.expression()?];
        if !self.at_punct(";") {
            // upsert external id field, merge duplicate
            children.push(self.expression()?);
        }
        self.expect_punct(";")?;
        Ok(Some(AstNode::with_children(kind, line, children)))
    }

    /// `[final] Type name [= expr] (, name [= expr])*` without the `;`.
    /// Restores the position and returns `None` when the tokens are not a
    /// declaration.
    fn local_declaration(&mut self, line: usize) -> PResult<Option<AstNode>> {
        let start = self.pos;
        self.eat_word("final");
        let is_declaration = self.type_ref().is_ok()
            && self.at_ident()
            && self
                .peek_at(1)
                .is_some_and(|t| t.is_punct("=") || t.is_punct(";") || t.is_punct(","));
        if !is_declaration {
            self.pos = start;
            return Ok(None);
        }

        let mut declarations = Vec::new();
        loop {
            let name = self.expect_ident()?;
            let mut declaration = AstNode::new(NodeKind::VariableDeclaration, name.line);
            if self.eat_punct("=") {
                declaration.children.push(self.expression()?);
            }
            declarations.push(declaration);
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(Some(AstNode::with_children(
            NodeKind::VariableDeclarationStatements,
            line,
            declarations,
        )))
    }

    /// `( expr )` wrapped in a `StandardCondition`.
    fn condition(&mut self) -> PResult<AstNode> {
        let line = self.line();
        self.expect_punct("(")?;
        let expr = self.expression()?;
        self.expect_punct(")")?;
        Ok(AstNode::with_children(
            NodeKind::StandardCondition,
            line,
            vec![expr],
        ))
    }

    fn if_statement(&mut self, line: usize) -> PResult<AstNode> {
        let mut branches = Vec::new();
        let mut branch_line = line;
        loop {
            self.pos += 1; // `if`
            let mut children = vec![self.condition()?];
            children.extend(self.statement()?);
            branches.push(AstNode::with_children(
                NodeKind::IfBlockStatement,
                branch_line,
                children,
            ));
            if !self.eat_word("else") {
                break;
            }
            if self.at_word("if") {
                branch_line = self.line();
                continue;
            }
            branches.extend(self.statement()?);
            break;
        }
        Ok(AstNode::with_children(
            NodeKind::IfElseBlockStatement,
            line,
            branches,
        ))
    }

    fn for_statement(&mut self, line: usize) -> PResult<AstNode> {
        self.pos += 1;
        self.expect_punct("(")?;

        let start = self.pos;
        if self.type_ref().is_ok() && self.at_ident() && self.nth_is_punct(1, ":") {
            let var_line = self.line();
            self.pos += 2;
            let mut children = vec![
                AstNode::new(NodeKind::VariableDeclaration, var_line),
                self.expression()?,
            ];
            self.expect_punct(")")?;
            children.extend(self.statement()?);
            return Ok(AstNode::with_children(
                NodeKind::ForEachStatement,
                line,
                children,
            ));
        }
        self.pos = start;

        let mut children = Vec::new();
        if !self.eat_punct(";") {
            let init_line = self.line();
            match self.local_declaration(init_line)? {
                Some(declaration) => children.push(declaration),
                None => loop {
                    children.push(self.expression()?);
                    if !self.eat_punct(",") {
                        break;
                    }
                },
            }
            self.expect_punct(";")?;
        }
        if !self.at_punct(";") {
            let cond_line = self.line();
            let cond = self.expression()?;
            children.push(AstNode::with_children(
                NodeKind::StandardCondition,
                cond_line,
                vec![cond],
            ));
        }
        self.expect_punct(";")?;
        while !self.at_punct(")") {
            children.push(self.expression()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        children.extend(self.statement()?);
        Ok(AstNode::with_children(
            NodeKind::ForLoopStatement,
            line,
            children,
        ))
    }

    fn switch_statement(&mut self, line: usize) -> PResult<AstNode> {
        self.pos += 2; // `switch on`
        let mut children = vec![self.expression()?];
        self.expect_punct("{")?;
        while !self.eat_punct("}") {
            let when_line = self.line();
            if !self.eat_word("when") {
                return Err(self.error("expected 'when'"));
            }
            if self.eat_word("else") {
                let body = self.block()?;
                children.push(AstNode::with_children(
                    NodeKind::ElseWhenBlock,
                    when_line,
                    vec![body],
                ));
                continue;
            }

            let start = self.pos;
            if self.type_ref().is_ok() && self.at_ident() && self.nth_is_punct(1, "{") {
                self.pos += 1;
                let body = self.block()?;
                children.push(AstNode::with_children(
                    NodeKind::TypeWhenBlock,
                    when_line,
                    vec![body],
                ));
                continue;
            }
            self.pos = start;

            let mut cases = Vec::new();
            loop {
                let case_line = self.line();
                self.eat_punct("-");
                let kind = match self.bump() {
                    Some(tok) if tok.is_word("null") => NodeKind::LiteralCase,
                    Some(tok) if tok.kind == TokenKind::Ident => NodeKind::IdentifierCase,
                    Some(tok) if matches!(tok.kind, TokenKind::Number | TokenKind::Str) => {
                        NodeKind::LiteralCase
                    }
                    _ => return Err(self.error("expected when value")),
                };
                cases.push(AstNode::new(kind, case_line));
                if !self.eat_punct(",") {
                    break;
                }
            }
            cases.push(self.block()?);
            children.push(AstNode::with_children(
                NodeKind::ValueWhenBlock,
                when_line,
                cases,
            ));
        }
        Ok(AstNode::with_children(
            NodeKind::SwitchStatement,
            line,
            children,
        ))
    }

    fn try_statement(&mut self, line: usize) -> PResult<AstNode> {
        self.pos += 1;
        let mut children = vec![self.block()?];
        while self.at_word("catch") {
            let catch_line = self.line();
            self.pos += 1;
            self.expect_punct("(")?;
            self.modifiers()?;
            self.type_ref()?;
            self.expect_ident()?;
            self.expect_punct(")")?;
            let body = self.block()?;
            children.push(AstNode::with_children(
                NodeKind::CatchBlockStatement,
                catch_line,
                vec![body],
            ));
        }
        if self.eat_word("finally") {
            children.push(self.block()?);
        }
        if children.len() == 1 {
            return Err(self.error("expected 'catch' or 'finally'"));
        }
        Ok(AstNode::with_children(
            NodeKind::TryCatchFinallyBlockStatement,
            line,
            children,
        ))
    }

    // ---- expressions ----

    fn expression(&mut self) -> PResult<AstNode> {
        self.nested(|p| p.assignment())
    }

    fn assignment(&mut self) -> PResult<AstNode> {
        let line = self.line();
        let target = self.ternary()?;
        let is_assignment = self
            .peek()
            .is_some_and(|t| t.kind == TokenKind::Punct && ASSIGNMENT_OPS.contains(&t.text));
        if !is_assignment {
            return Ok(target);
        }
        self.pos += 1;
        let value = self.expression()?;
        Ok(AstNode::with_children(
            NodeKind::AssignmentExpression,
            line,
            vec![target, value],
        ))
    }

    fn ternary(&mut self) -> PResult<AstNode> {
        let line = self.line();
        let condition = self.binary(0)?;
        if !self.eat_punct("?") {
            return Ok(condition);
        }
        let then = self.expression()?;
        self.expect_punct(":")?;
        let otherwise = self.expression()?;
        Ok(AstNode::with_children(
            NodeKind::TernaryExpression,
            line,
            vec![condition, then, otherwise],
        ))
    }

    /// Precedence climbing over the binary operators.
    fn binary(&mut self, min_precedence: u8) -> PResult<AstNode> {
        let line = self.line();
        let mut lhs = self.unary()?;
        while let Some((precedence, kind, width)) = self.binary_operator() {
            if precedence < min_precedence {
                break;
            }
            self.pos += width;
            if kind == NodeKind::InstanceOfExpression {
                self.type_ref()?;
                lhs = AstNode::with_children(kind, line, vec![lhs]);
                continue;
            }
            let rhs = self.binary(precedence + 1)?;
            lhs = AstNode::with_children(kind, line, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    /// Precedence, node kind and token width of the operator at the cursor.
    fn binary_operator(&self) -> Option<(u8, NodeKind, usize)> {
        let tok = self.peek()?;
        if tok.is_word("instanceof") {
            return Some((7, NodeKind::InstanceOfExpression, 1));
        }
        if tok.kind != TokenKind::Punct {
            return None;
        }
        let (precedence, kind) = match tok.text {
            "??" => (0, NodeKind::NullCoalescingExpression),
            "||" => (1, NodeKind::BooleanExpression),
            "&&" => (2, NodeKind::BooleanExpression),
            "|" => (3, NodeKind::BinaryExpression),
            "^" => (4, NodeKind::BinaryExpression),
            "&" => (5, NodeKind::BinaryExpression),
            "==" | "!=" | "===" | "!==" => (6, NodeKind::BooleanExpression),
            ">" => {
                let run = self.adjacent_gt_run();
                if run > 1 {
                    return Some((8, NodeKind::BinaryExpression, run));
                }
                (7, NodeKind::BooleanExpression)
            }
            "<" | "<=" | ">=" => (7, NodeKind::BooleanExpression),
            "<<" => (8, NodeKind::BinaryExpression),
            "+" | "-" => (9, NodeKind::BinaryExpression),
            "*" | "/" | "%" => (10, NodeKind::BinaryExpression),
            _ => return None,
        };
        Some((precedence, kind, 1))
    }

    /// Number of touching `>` tokens at the cursor (`>>` and `>>>` shifts).
    fn adjacent_gt_run(&self) -> usize {
        let mut run = 1;
        while run < 3 {
            match (self.peek_at(run - 1), self.peek_at(run)) {
                (Some(prev), Some(next)) if next.is_punct(">") && next.offset == prev.offset + 1 => {
                    run += 1;
                }
                _ => break,
            }
        }
        run
    }

    fn unary(&mut self) -> PResult<AstNode> {
        let line = self.line();
        if self.peek().is_some_and(|t| {
            t.kind == TokenKind::Punct && matches!(t.text, "!" | "-" | "+" | "~" | "++" | "--")
        }) {
            self.pos += 1;
            let operand = self.nested(|p| p.unary())?;
            return Ok(AstNode::with_children(
                NodeKind::PrefixExpression,
                line,
                vec![operand],
            ));
        }
        if self.at_punct("(")
            && let Some(end) = self.cast_end()
        {
            self.pos = end;
            let operand = self.nested(|p| p.unary())?;
            return Ok(AstNode::with_children(
                NodeKind::CastExpression,
                line,
                vec![operand],
            ));
        }
        self.postfix()
    }

    /// Position after `(Type)` when the parenthesis at the cursor is a cast.
    fn cast_end(&mut self) -> Option<usize> {
        let start = self.pos;
        self.pos += 1;
        let is_cast = self.type_ref().is_ok()
            && self.eat_punct(")")
            && self.peek().is_some_and(|t| match t.kind {
                TokenKind::Ident => !t.is_word("instanceof"),
                TokenKind::Number | TokenKind::Str => true,
                TokenKind::Punct => t.text == "(",
            });
        let end = self.pos;
        self.pos = start;
        is_cast.then_some(end)
    }

    fn postfix(&mut self) -> PResult<AstNode> {
        let line = self.line();
        let mut expr = self.primary()?;
        loop {
            if self.at_punct(".") || self.at_punct("?.") {
                self.pos += 1;
                let name = self.expect_ident()?;
                expr = if name.is_word("class") {
                    AstNode::with_children(NodeKind::ClassRefExpression, line, vec![expr])
                } else if self.at_punct("(") {
                    let mut children = vec![expr];
                    children.extend(self.arguments()?);
                    AstNode::with_children(NodeKind::MethodCallExpression, line, children)
                } else {
                    AstNode::with_children(NodeKind::VariableExpression, line, vec![expr])
                };
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = AstNode::with_children(
                    NodeKind::ArrayLoadExpression,
                    line,
                    vec![expr, index],
                );
            } else if self.eat_punct("++") || self.eat_punct("--") {
                expr = AstNode::with_children(NodeKind::PostfixExpression, line, vec![expr]);
            } else {
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> PResult<Vec<AstNode>> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        if self.eat_punct(")") {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                return Ok(args);
            }
        }
    }

    fn primary(&mut self) -> PResult<AstNode> {
        let line = self.line();
        let Some(tok) = self.peek() else {
            return Err(self.error("expected expression"));
        };
        match tok.kind {
            TokenKind::Number | TokenKind::Str => {
                self.pos += 1;
                Ok(AstNode::new(NodeKind::LiteralExpression, line))
            }
            TokenKind::Punct if tok.text == "(" => {
                self.pos += 1;
                let inner = self.expression()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            TokenKind::Punct if tok.text == "[" => self.query(line),
            TokenKind::Punct => Err(self.error("expected expression")),
            TokenKind::Ident => {
                if RESERVED.iter().any(|w| tok.is_word(w)) {
                    return Err(self.error("unexpected keyword"));
                }
                if ["true", "false", "null"].iter().any(|w| tok.is_word(w)) {
                    self.pos += 1;
                    return Ok(AstNode::new(NodeKind::LiteralExpression, line));
                }
                if tok.is_word("new") {
                    return self.new_expression(line);
                }
                self.pos += 1;
                let this = tok.is_word("this");
                let is_super = tok.is_word("super");
                let call = self.at_punct("(");
                let kind = match (this, is_super, call) {
                    (true, _, true) => NodeKind::ThisMethodCallExpression,
                    (true, _, false) => NodeKind::ThisVariableExpression,
                    (_, true, true) => NodeKind::SuperMethodCallExpression,
                    (_, true, false) => NodeKind::SuperVariableExpression,
                    (_, _, true) => NodeKind::MethodCallExpression,
                    (_, _, false) => NodeKind::VariableExpression,
                };
                let args = if call { self.arguments()? } else { Vec::new() };
                Ok(AstNode::with_children(kind, line, args))
            }
        }
    }

    /// `[SELECT ...]` or `[FIND ...]`, skipped as one opaque node.
    fn query(&mut self, line: usize) -> PResult<AstNode> {
        let kind = if self.nth_is_word(1, "select") {
            NodeKind::SoqlExpression
        } else if self.nth_is_word(1, "find") {
            NodeKind::SoslExpression
        } else {
            return Err(self.error("expected SOQL or SOSL query"));
        };
        let mut depth = 0usize;
        while let Some(tok) = self.bump() {
            if tok.is_punct("[") {
                depth += 1;
            } else if tok.is_punct("]") {
                depth -= 1;
                if depth == 0 {
                    return Ok(AstNode::new(kind, line));
                }
            }
        }
        Err(self.error("unclosed query"))
    }

    fn new_expression(&mut self, line: usize) -> PResult<AstNode> {
        self.pos += 1; // `new`
        let base = self.expect_ident()?;
        while self.at_punct(".") && self.peek_at(1).is_some_and(|t| t.kind == TokenKind::Ident) {
            self.pos += 2;
        }
        let generic = self.at_punct("<");
        if generic {
            self.type_args()?;
        }
        let collection = ["list", "set", "map"].into_iter().find(|c| base.is_word(c));

        if self.eat_punct("[") {
            if self.eat_punct("]") {
                let items = self.literal_items()?;
                return Ok(AstNode::with_children(
                    NodeKind::NewListLiteralExpression,
                    line,
                    items,
                ));
            }
            let size = self.expression()?;
            self.expect_punct("]")?;
            return Ok(AstNode::with_children(
                NodeKind::NewListInitExpression,
                line,
                vec![size],
            ));
        }

        if self.at_punct("{") {
            return match collection {
                Some("map") => {
                    let entries = self.map_entries()?;
                    Ok(AstNode::with_children(
                        NodeKind::NewMapLiteralExpression,
                        line,
                        entries,
                    ))
                }
                Some("set") => {
                    let items = self.literal_items()?;
                    Ok(AstNode::with_children(
                        NodeKind::NewSetLiteralExpression,
                        line,
                        items,
                    ))
                }
                _ => {
                    let items = self.literal_items()?;
                    Ok(AstNode::with_children(
                        NodeKind::NewListLiteralExpression,
                        line,
                        items,
                    ))
                }
            };
        }

        let args = self.arguments()?;
        let kind = match collection {
            Some("list") if generic => NodeKind::NewListInitExpression,
            Some("set") if generic => NodeKind::NewSetInitExpression,
            Some("map") if generic => NodeKind::NewMapInitExpression,
            _ if !args.is_empty()
                && args.iter().all(|a| a.kind == NodeKind::AssignmentExpression) =>
            {
                NodeKind::NewKeyValueObjectExpression
            }
            _ => NodeKind::NewObjectExpression,
        };
        Ok(AstNode::with_children(kind, line, args))
    }

    fn literal_items(&mut self) -> PResult<Vec<AstNode>> {
        self.expect_punct("{")?;
        let mut items = Vec::new();
        while !self.eat_punct("}") {
            items.push(self.expression()?);
            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                break;
            }
        }
        Ok(items)
    }

    fn map_entries(&mut self) -> PResult<Vec<AstNode>> {
        self.expect_punct("{")?;
        let mut entries = Vec::new();
        while !self.eat_punct("}") {
            let line = self.line();
            let key = self.expression()?;
            self.expect_punct("=>")?;
            let value = self.expression()?;
            entries.push(AstNode::with_children(
                NodeKind::MapEntryNode,
                line,
                vec![key, value],
            ));
            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                break;
            }
        }
        Ok(entries)
    }
}
