//! Line scanner
//!
//! Splits a source program into [`SourceLine`]s, one token vector per
//! non-blank line, preserving indentation depth for the block parser.

use super::token::{SourceLine, Token, TokenKind};
use crate::error::{Error, Result};

/// Tokenizer for the line-oriented source language
pub struct Scanner<'a> {
    source: &'a str,
}

impl<'a> Scanner<'a> {
    /// Create a scanner over a full program text
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    /// Scan every line of the program.
    ///
    /// Comments (`#` to end of line) and blank lines are dropped here, so
    /// the parser only ever sees lines that carry a statement.
    pub fn scan_lines(&self) -> Result<Vec<SourceLine>> {
        let mut lines = Vec::new();
        for (idx, raw) in self.source.lines().enumerate() {
            let line_no = idx + 1;
            let indent = raw.len() - raw.trim_start_matches([' ', '\t']).len();
            let tokens = scan_line(raw, line_no)?;
            if tokens.is_empty() {
                continue;
            }
            lines.push(SourceLine {
                indent,
                tokens,
                line: line_no,
            });
        }
        Ok(lines)
    }
}

fn scan_line(raw: &str, line_no: usize) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = raw.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => {
                i += 1;
            }
            '#' => break,
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<i64>()
                    .map_err(|_| Error::syntax(line_no, format!("integer '{text}' too large")))?;
                tokens.push(Token::new(TokenKind::Int(value), line_no));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(Token::new(keyword_or_ident(&word), line_no));
            }
            '+' => push_simple(&mut tokens, TokenKind::Plus, line_no, &mut i),
            '-' => push_simple(&mut tokens, TokenKind::Minus, line_no, &mut i),
            '*' => push_simple(&mut tokens, TokenKind::Star, line_no, &mut i),
            '/' => push_simple(&mut tokens, TokenKind::Slash, line_no, &mut i),
            '%' => push_simple(&mut tokens, TokenKind::Percent, line_no, &mut i),
            '&' => push_simple(&mut tokens, TokenKind::Amp, line_no, &mut i),
            '|' => push_simple(&mut tokens, TokenKind::Pipe, line_no, &mut i),
            '^' => push_simple(&mut tokens, TokenKind::Caret, line_no, &mut i),
            '~' => push_simple(&mut tokens, TokenKind::Tilde, line_no, &mut i),
            '(' => push_simple(&mut tokens, TokenKind::LParen, line_no, &mut i),
            ')' => push_simple(&mut tokens, TokenKind::RParen, line_no, &mut i),
            ':' => push_simple(&mut tokens, TokenKind::Colon, line_no, &mut i),
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::new(TokenKind::Le, line_no));
                    i += 2;
                } else {
                    tokens.push(Token::new(TokenKind::Lt, line_no));
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::new(TokenKind::Ge, line_no));
                    i += 2;
                } else {
                    tokens.push(Token::new(TokenKind::Gt, line_no));
                    i += 1;
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::new(TokenKind::EqEq, line_no));
                    i += 2;
                } else {
                    tokens.push(Token::new(TokenKind::Assign, line_no));
                    i += 1;
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::new(TokenKind::Ne, line_no));
                    i += 2;
                } else {
                    return Err(Error::syntax(line_no, "'!' is only valid in '!='"));
                }
            }
            other => {
                return Err(Error::syntax(
                    line_no,
                    format!("unexpected character '{other}'"),
                ));
            }
        }
    }

    Ok(tokens)
}

fn keyword_or_ident(word: &str) -> TokenKind {
    match word {
        "if" => TokenKind::If,
        "elif" => TokenKind::Elif,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "print" => TokenKind::Print,
        "input" => TokenKind::Input,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        _ => TokenKind::Ident(word.to_string()),
    }
}

fn push_simple(tokens: &mut Vec<Token>, kind: TokenKind, line_no: usize, i: &mut usize) {
    tokens.push(Token::new(kind, line_no));
    *i += 1;
}
