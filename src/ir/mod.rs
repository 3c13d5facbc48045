//! Intermediate representations shared by the compilation passes

pub mod fifo;
pub mod microop;
pub mod types;

pub use fifo::{ActionsFifo, FifoItem};
pub use microop::{MemCell, MicroOp};
pub use types::{Label, LabelAllocator, Literal, Operator, OperatorDomain, Register, Variable};
