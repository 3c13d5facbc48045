//! Compilation pipeline
//!
//! Source text goes through four passes: parsing ([`crate::parser`]),
//! structure-to-linear lowering ([`linearize`]), expression lowering and
//! register allocation ([`lowering`], [`regalloc`]), and binary emission
//! ([`codegen`]). [`compile`] chains them for one engine.

pub mod codegen;
pub mod linearize;
pub mod lowering;
pub mod regalloc;

pub use codegen::{generate, CompiledProgram};
pub use linearize::{linearize, LinearKind, LinearProgram, NodeId};
pub use lowering::{expr_cost, lower_condition, lower_expr};
pub use regalloc::ExpressionCompiler;

use crate::error::Result;
use crate::parser::parse_program;
use crate::processor::ProcessorEngine;
use tracing::info;

/// Compile a source program for one processor engine.
pub fn compile(source: &str, engine: &ProcessorEngine) -> Result<CompiledProgram> {
    let program = parse_program(source)?;
    let linear = linearize(&program, engine)?;
    let compiled = generate(&linear, engine)?;
    info!(
        engine = engine.name(),
        words = compiled.as_integers().len(),
        "compiled program"
    );
    Ok(compiled)
}
