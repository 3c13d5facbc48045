//! Error types for the simproc toolchain

use thiserror::Error;

/// Toolchain errors, covering every stage from scanning to binary emission.
///
/// Runtime execution never raises: the executor only halts or blocks on
/// input, and a malformed word decodes to `halt`. Everything here is a
/// compile-time failure surfaced to the driver with a source line number
/// where one is available.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Parse errors
    /// Malformed line syntax
    ///
    /// **Triggered by:** unbalanced parentheses, illegal token adjacency,
    /// a missing `:` after a block header, and similar line-level faults.
    #[error("Syntax error at line {line}: {message}")]
    SyntaxError {
        /// Source line where the error occurred (1-based)
        line: usize,
        /// Error description
        message: String,
    },

    /// Dedent to an indentation level never opened, or an unexpected indent
    #[error("Indentation error at line {line}: {message}")]
    IndentationError {
        /// Source line where the error occurred (1-based)
        line: usize,
        /// Error description
        message: String,
    },

    /// Reserved word used as a variable name
    #[error("Reserved word used as identifier at line {line}: {name}")]
    ReservedIdentifier {
        /// Source line where the error occurred (1-based)
        line: usize,
        /// The offending identifier
        name: String,
    },

    /// `elif`/`else` without a preceding `if` or `elif`
    #[error("Orphan '{keyword}' at line {line}")]
    OrphanBranch {
        /// Source line where the error occurred (1-based)
        line: usize,
        /// The orphan keyword (`elif` or `else`)
        keyword: String,
    },

    // Expression errors
    /// Arithmetic operator applied to a boolean operand or vice versa
    #[error("Type error: expected {expected} expression, got {got}")]
    TypeError {
        /// Expected expression kind
        expected: String,
        /// Actual expression kind
        got: String,
    },

    /// Malformed token stream (insufficient operands or operators)
    #[error("Expression error: {0}")]
    ExpressionError(String),

    // Compilation errors
    /// Literal too large for its target instruction field
    #[error("Literal {value} does not fit in {bits} bits")]
    LiteralTooWide {
        /// The literal value
        value: i64,
        /// Field width in bits
        bits: u8,
    },

    /// Resolved address exceeds the engine's address field width
    #[error("Address {address} out of range for {bits}-bit address fields")]
    AddressOutOfRange {
        /// The resolved absolute address
        address: usize,
        /// Address field width in bits
        bits: u8,
    },

    /// The processor model has no encoding for a required operation
    #[error("Processor model '{engine}' has no encoding for '{operation}'")]
    UnsupportedOperation {
        /// Engine name
        engine: String,
        /// Operation that could not be encoded
        operation: String,
    },

    /// A comparison has no adjustable equivalent in the supported set
    #[error("Comparison '{op}' has no supported equivalent on this processor")]
    UnsupportedComparison {
        /// The comparison operator symbol
        op: String,
    },

    /// Malformed processor model description
    #[error("Processor model error: {0}")]
    ModelError(String),

    /// Internal invariant violation (register accounting went wrong)
    ///
    /// Unreachable when expression costs are computed correctly.
    #[error("Internal compiler error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a syntax error with a message
    pub fn syntax(line: usize, msg: impl Into<String>) -> Self {
        Error::SyntaxError {
            line,
            message: msg.into(),
        }
    }

    /// Create an indentation error with a message
    pub fn indentation(line: usize, msg: impl Into<String>) -> Self {
        Error::IndentationError {
            line,
            message: msg.into(),
        }
    }

    /// Create an expression error with a message
    pub fn expression(msg: impl Into<String>) -> Self {
        Error::ExpressionError(msg.into())
    }

    /// Create a processor model error with a message
    pub fn model(msg: impl Into<String>) -> Self {
        Error::ModelError(msg.into())
    }

    /// Create an internal invariant error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}

/// Result type for simproc operations
pub type Result<T> = std::result::Result<T, Error>;
