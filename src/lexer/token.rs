//! Token definitions for the line-oriented source language

use lazy_static::lazy_static;
use std::collections::HashSet;
use std::fmt;

lazy_static! {
    /// Words that can never be used as variable names
    pub static ref RESERVED_WORDS: HashSet<&'static str> = {
        let mut set = HashSet::new();
        for word in [
            "if", "elif", "else", "while", "print", "input", "and", "or", "not",
        ] {
            set.insert(word);
        }
        set
    };
}

/// Token kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Integer literal
    Int(i64),
    /// Identifier (variable name)
    Ident(String),

    // Keywords
    /// `if`
    If,
    /// `elif`
    Elif,
    /// `else`
    Else,
    /// `while`
    While,
    /// `print`
    Print,
    /// `input`
    Input,
    /// `and`
    And,
    /// `or`
    Or,
    /// `not`
    Not,

    // Operators and punctuation
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `&`
    Amp,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `~`
    Tilde,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    EqEq,
    /// `!=`
    Ne,
    /// `=`
    Assign,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `:`
    Colon,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Int(v) => write!(f, "{v}"),
            TokenKind::Ident(name) => write!(f, "{name}"),
            TokenKind::If => write!(f, "if"),
            TokenKind::Elif => write!(f, "elif"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::While => write!(f, "while"),
            TokenKind::Print => write!(f, "print"),
            TokenKind::Input => write!(f, "input"),
            TokenKind::And => write!(f, "and"),
            TokenKind::Or => write!(f, "or"),
            TokenKind::Not => write!(f, "not"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Amp => write!(f, "&"),
            TokenKind::Pipe => write!(f, "|"),
            TokenKind::Caret => write!(f, "^"),
            TokenKind::Tilde => write!(f, "~"),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Le => write!(f, "<="),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::Ge => write!(f, ">="),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::Ne => write!(f, "!="),
            TokenKind::Assign => write!(f, "="),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Colon => write!(f, ":"),
        }
    }
}

/// Token with its source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token kind and payload
    pub kind: TokenKind,
    /// Source line (1-based)
    pub line: usize,
}

impl Token {
    /// Create a token
    pub fn new(kind: TokenKind, line: usize) -> Self {
        Self { kind, line }
    }
}

/// One logical source line: indentation depth plus its tokens.
///
/// Blank and comment-only lines never reach the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// Number of leading whitespace characters
    pub indent: usize,
    /// Tokens on the line, in order
    pub tokens: Vec<Token>,
    /// Source line number (1-based)
    pub line: usize,
}
