//! Abstract micro-operations
//!
//! Output of the register allocator and input of the assembler. Each
//! micro-op is target-neutral: registers are concrete but memory cells and
//! jump targets are still symbolic, resolved during binary emission.

use super::types::{Label, Literal, Operator, Register, Variable};
use std::fmt;

/// Symbolic memory cell referenced by a load or store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemCell {
    /// Named variable or constant cell
    Var(Variable),
    /// Temporary spill slot, numbered per program
    Temp(u8),
}

impl fmt::Display for MemCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemCell::Var(v) => write!(f, "{v}"),
            MemCell::Temp(n) => write!(f, "_m{n}"),
        }
    }
}

/// One abstract machine operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MicroOp {
    /// Position marker for a jump target; emits no instruction word
    Label(Label),
    /// Register-to-register copy
    Move {
        /// Destination register
        dst: Register,
        /// Source register
        src: Register,
    },
    /// Inline literal into a register
    MoveLit {
        /// Destination register
        dst: Register,
        /// Literal value
        lit: Literal,
    },
    /// Memory cell into a register
    Load {
        /// Destination register
        dst: Register,
        /// Source cell
        src: MemCell,
    },
    /// Register into a memory cell
    Store {
        /// Destination cell
        dst: MemCell,
        /// Source register
        src: Register,
    },
    /// ALU operation
    Alu {
        /// Operator (arithmetic domain, unary or binary)
        op: Operator,
        /// Destination register (register 0 on fixed-output engines)
        dst: Register,
        /// First operand
        a: Register,
        /// Second operand for binary operators without inline literal
        b: Option<Register>,
        /// Inline right operand, exclusive with `b`
        lit: Option<Literal>,
    },
    /// Unconditional jump
    Jump {
        /// Target label
        target: Label,
    },
    /// Compare-then-branch compound: one logical action, two physical
    /// instruction words (`cmp` then the conditional goto)
    JumpIf {
        /// Comparison operator, already adjusted to the engine
        cond: Operator,
        /// Left compared register
        left: Register,
        /// Right compared register
        right: Register,
        /// Target label
        target: Label,
    },
    /// Write a register to the output device
    Print {
        /// Source register
        src: Register,
    },
    /// Read one buffered input value into a memory cell
    Input {
        /// Destination cell
        dst: MemCell,
    },
    /// Stop the processor
    Halt,
}

impl MicroOp {
    /// Number of physical instruction words this micro-op occupies.
    ///
    /// Labels occupy none; the compare-then-branch compound occupies two.
    /// The address-resolution pass and both emitters must agree on this.
    pub fn word_count(&self) -> usize {
        match self {
            MicroOp::Label(_) => 0,
            MicroOp::JumpIf { .. } => 2,
            _ => 1,
        }
    }
}
