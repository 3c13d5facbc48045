//! Machine simulation: datapath components and the micro-step executor

pub mod components;
pub mod executor;

pub use components::{to_signed, to_unsigned, word_mask, Memory, RegisterBank};
pub use executor::{ExecState, Executor};
