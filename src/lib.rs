//! # simproc
//!
//! A teaching compiler and simulator for small-word CPUs. Programs in a
//! minimal imperative language (assignments, `if`/`elif`/`else`, `while`,
//! `print`, `input`) compile to real binary machine code for a
//! configurable processor model, and run on a micro-step executor that
//! exposes every cycle of the datapath.
//!
//! Two reference engines ship built in: [`ProcessorEngine::standard16`],
//! a 16-bit machine with eight registers and inline ALU literals, and
//! [`ProcessorEngine::reduced12`], a 12-bit machine with four registers
//! whose ALU output is pinned to `r0`. Custom variants load from JSON via
//! [`ProcessorEngine::from_json`].
//!
//! ## Example
//!
//! ```
//! use simproc::{compile_source, Executor, ProcessorEngine};
//!
//! let engine = ProcessorEngine::standard16();
//! let program = compile_source("x = 0\nwhile x < 10:\n    x = x + 1\nprint(x)\n", &engine)?;
//!
//! let mut machine = Executor::new(engine, &program.as_integers());
//! machine.non_stop_run();
//! assert_eq!(machine.screen(), ["10"]);
//! # Ok::<(), simproc::Error>(())
//! ```

pub mod compiler;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod processor;
pub mod runtime;

pub use compiler::{compile, CompiledProgram};
pub use error::{Error, Result};
pub use processor::{EngineDef, ProcessorEngine};
pub use runtime::{ExecState, Executor};

use tracing::instrument;

/// Compile a source program for one processor engine.
///
/// Convenience alias for [`compiler::compile`] at the crate root.
#[instrument(skip(source, engine), fields(engine = engine.name()))]
pub fn compile_source(source: &str, engine: &ProcessorEngine) -> Result<CompiledProgram> {
    compiler::compile(source, engine)
}
