//! Lexical analysis for the line-oriented source language

pub mod scanner;
pub mod token;

pub use scanner::Scanner;
pub use token::{SourceLine, Token, TokenKind, RESERVED_WORDS};
