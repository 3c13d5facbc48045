//! Syntactic analysis: expression AST and statement structures

pub mod ast;
pub mod program;

pub use ast::{ExprKind, ExprNode};
pub use program::{parse_program, StructureNode};
