//! Apex tokenizer.
//!
//! Produces identifiers (keywords are identifiers; Apex keywords are
//! case-insensitive and the parser compares them that way), numbers, string
//! literals and punctuation. Comments and whitespace are dropped. Lines are
//! 1-based, columns 0-based byte offsets within the line.

use logos::Logos;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    Punct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Token<'_> {
    /// Case-insensitive keyword/identifier comparison.
    #[inline]
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text.eq_ignore_ascii_case(word)
    }

    #[inline]
    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == punct
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated string literal at line {line}")]
    UnterminatedString { line: usize },
    #[error("unterminated block comment at line {line}")]
    UnterminatedComment { line: usize },
    #[error("unexpected character '{ch}' at line {line}")]
    UnexpectedCharacter { ch: char, line: usize },
}

impl LexError {
    pub fn line(&self) -> usize {
        match self {
            LexError::UnterminatedString { line }
            | LexError::UnterminatedComment { line }
            | LexError::UnexpectedCharacter { line, .. } => *line,
        }
    }
}

/// Raw token classes. Longest match wins, so `===` beats `==` and `=`.
///
/// There is no `>>` token: closing generics (`List<List<String>>`) lex as two
/// `>` and the parser joins adjacent ones into shift operators.
#[derive(Logos, Clone, Copy, Debug, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+|//[^\n]*|/\*([^*]|\*+[^*/])*\*+/")]
enum Raw {
    /// `/*` with no closing `*/` before the end of input.
    #[regex(r"/\*([^*]|\*+[^*/])*\**")]
    UnterminatedComment,
    #[regex(r"'([^'\\\n]|\\.)*'")]
    Str,
    /// A string cut short by a newline or the end of input.
    #[regex(r"'([^'\\\n]|\\.)*")]
    UnterminatedString,
    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*")]
    Ident,
    // `1.foo()` is not valid Apex; a dot followed by a letter ends the number
    #[regex(r"[0-9][A-Za-z0-9]*(\.[0-9][A-Za-z0-9]*)*")]
    Number,
    #[token("===")]
    #[token("!==")]
    #[token("<<=")]
    #[token("==")]
    #[token("!=")]
    #[token("<=")]
    #[token(">=")]
    #[token("&&")]
    #[token("||")]
    #[token("++")]
    #[token("--")]
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("%=")]
    #[token("&=")]
    #[token("|=")]
    #[token("^=")]
    #[token("=>")]
    #[token("<<")]
    #[token("?.")]
    #[token("??")]
    #[token("{")]
    #[token("}")]
    #[token("(")]
    #[token(")")]
    #[token("[")]
    #[token("]")]
    #[token(";")]
    #[token(",")]
    #[token(".")]
    #[token("@")]
    #[token("=")]
    #[token("<")]
    #[token(">")]
    #[token("!")]
    #[token("~")]
    #[token("?")]
    #[token(":")]
    #[token("+")]
    #[token("-")]
    #[token("*")]
    #[token("/")]
    #[token("%")]
    #[token("&")]
    #[token("|")]
    #[token("^")]
    Punct,
}

/// Byte offsets where each line starts.
struct LineStarts(Vec<usize>);

impl LineStarts {
    fn new(source: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self(starts)
    }

    /// 1-based line and 0-based column of `offset`.
    fn position(&self, offset: usize) -> (usize, usize) {
        let line = self.0.partition_point(|&start| start <= offset);
        (line, offset - self.0[line - 1])
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, LexError> {
    let lines = LineStarts::new(source);
    let mut tokens = Vec::new();

    for (raw, span) in Raw::lexer(source).spanned() {
        let (line, column) = lines.position(span.start);
        let kind = match raw {
            Ok(Raw::Ident) => TokenKind::Ident,
            Ok(Raw::Number) => TokenKind::Number,
            Ok(Raw::Str) => TokenKind::Str,
            Ok(Raw::Punct) => TokenKind::Punct,
            Ok(Raw::UnterminatedString) => return Err(LexError::UnterminatedString { line }),
            Ok(Raw::UnterminatedComment) => return Err(LexError::UnterminatedComment { line }),
            Err(()) => {
                let ch = source[span.start..].chars().next().unwrap_or('?');
                return Err(LexError::UnexpectedCharacter { ch, line });
            }
        };
        tokens.push(Token {
            kind,
            text: &source[span.clone()],
            line,
            column,
            offset: span.start,
        });
    }

    Ok(tokens)
}
