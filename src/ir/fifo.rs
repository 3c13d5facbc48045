//! Flattened expression action queue
//!
//! The lowering pass serializes an expression tree into a reverse-Polish
//! sequence ordered for minimal register pressure; the register allocator
//! consumes it item by item.

use super::types::{Literal, Operator, Variable};
use std::collections::VecDeque;
use std::fmt;

/// One element of the action queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FifoItem {
    /// Push a literal onto the operand stack
    Literal(Literal),
    /// Push a variable load onto the operand stack
    Variable(Variable),
    /// Apply a binary operator to the top two stack entries
    BinaryOp(Operator),
    /// Apply a unary operator to the top stack entry
    UnaryOp(Operator),
    /// Apply a binary operator whose right operand rides inline
    BinaryOpWithLiteral(Operator, Literal),
    /// The next binary operator's operands were evaluated in reverse
    /// source order and must be exchanged
    Swap,
    /// Compare the top two stack entries (condition context only)
    Comparison(Operator),
}

impl fmt::Display for FifoItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FifoItem::Literal(l) => write!(f, "{l}"),
            FifoItem::Variable(v) => write!(f, "{v}"),
            FifoItem::BinaryOp(op) | FifoItem::Comparison(op) => write!(f, "{op}"),
            FifoItem::UnaryOp(op) => write!(f, "u{op}"),
            FifoItem::BinaryOpWithLiteral(op, l) => write!(f, "{op}#{l}"),
            FifoItem::Swap => write!(f, "swap"),
        }
    }
}

/// FIFO of expression actions
#[derive(Debug, Clone, Default)]
pub struct ActionsFifo {
    items: VecDeque<FifoItem>,
}

impl ActionsFifo {
    /// An empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one action
    pub fn push(&mut self, item: FifoItem) {
        self.items.push_back(item);
    }

    /// Append every action of another queue, consuming it
    pub fn append(&mut self, mut other: ActionsFifo) {
        self.items.append(&mut other.items);
    }

    /// Remove and return the oldest action
    pub fn pop(&mut self) -> Option<FifoItem> {
        self.items.pop_front()
    }

    /// Number of queued actions
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate without consuming
    pub fn iter(&self) -> impl Iterator<Item = &FifoItem> {
        self.items.iter()
    }
}

impl fmt::Display for ActionsFifo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.items.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join(" "))
    }
}

impl FromIterator<FifoItem> for ActionsFifo {
    fn from_iter<T: IntoIterator<Item = FifoItem>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
