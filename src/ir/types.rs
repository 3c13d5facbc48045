//! Primitive value and identity types shared across the pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Expression domain an operator belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorDomain {
    /// Integer-valued operators (`+ - * / % & | ^ ~`, unary `-`)
    Arithmetic,
    /// Integer-to-boolean operators (`< <= > >= == !=`)
    Comparison,
    /// Boolean-to-boolean operators (`and or not`)
    Logic,
}

/// Operator descriptor used by the parser, the lowering pass and the
/// processor model alike.
///
/// Modeled as an exhaustive enum so every `match` over operators is checked
/// at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Addition `+`
    Add,
    /// Subtraction `-`
    Sub,
    /// Multiplication `*`
    Mul,
    /// Truncating signed division `/`
    Div,
    /// Truncating signed modulo `%`
    Mod,
    /// Bitwise and `&`
    BitAnd,
    /// Bitwise or `|`
    BitOr,
    /// Bitwise xor `^`
    BitXor,
    /// Unary arithmetic negation `-`
    Neg,
    /// Bitwise complement `~`
    BitNot,
    /// Equality `==`
    Eq,
    /// Inequality `!=`
    Ne,
    /// Strictly less `<`
    Lt,
    /// Less or equal `<=`
    Le,
    /// Strictly greater `>`
    Gt,
    /// Greater or equal `>=`
    Ge,
    /// Logical conjunction `and`
    And,
    /// Logical disjunction `or`
    Or,
    /// Logical negation `not`
    Not,
}

impl Operator {
    /// Number of operands the operator consumes (1 or 2)
    pub fn arity(self) -> u8 {
        match self {
            Operator::Neg | Operator::BitNot | Operator::Not => 1,
            _ => 2,
        }
    }

    /// True when operand order does not matter
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            Operator::Add
                | Operator::Mul
                | Operator::BitAnd
                | Operator::BitOr
                | Operator::BitXor
                | Operator::Eq
                | Operator::Ne
                | Operator::And
                | Operator::Or
        )
    }

    /// Source-text spelling
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::BitAnd => "&",
            Operator::BitOr => "|",
            Operator::BitXor => "^",
            Operator::Neg => "-",
            Operator::BitNot => "~",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "not",
        }
    }

    /// Binding strength for the precedence-climbing parser (higher binds
    /// tighter); unary operators are handled as prefixes and report the
    /// tightest level.
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Or => 1,
            Operator::And => 2,
            Operator::Not => 3,
            Operator::Eq | Operator::Ne | Operator::Lt | Operator::Le | Operator::Gt
            | Operator::Ge => 4,
            Operator::BitOr => 5,
            Operator::BitXor => 6,
            Operator::BitAnd => 7,
            Operator::Add | Operator::Sub => 8,
            Operator::Mul | Operator::Div | Operator::Mod => 9,
            Operator::Neg | Operator::BitNot => 10,
        }
    }

    /// Domain of the operator
    pub fn domain(self) -> OperatorDomain {
        match self {
            Operator::Eq | Operator::Ne | Operator::Lt | Operator::Le | Operator::Gt
            | Operator::Ge => OperatorDomain::Comparison,
            Operator::And | Operator::Or | Operator::Not => OperatorDomain::Logic,
            _ => OperatorDomain::Arithmetic,
        }
    }

    /// Logical negation of a comparison (`<` becomes `>=`, ...).
    ///
    /// Returns `None` for non-comparison operators.
    pub fn logic_negated(self) -> Option<Operator> {
        match self {
            Operator::Eq => Some(Operator::Ne),
            Operator::Ne => Some(Operator::Eq),
            Operator::Lt => Some(Operator::Ge),
            Operator::Ge => Some(Operator::Lt),
            Operator::Gt => Some(Operator::Le),
            Operator::Le => Some(Operator::Gt),
            _ => None,
        }
    }

    /// Operand-mirrored form of a comparison (`a < b` equals `b > a`).
    ///
    /// Returns `None` for non-comparison operators.
    pub fn mirrored(self) -> Option<Operator> {
        match self {
            Operator::Eq => Some(Operator::Eq),
            Operator::Ne => Some(Operator::Ne),
            Operator::Lt => Some(Operator::Gt),
            Operator::Gt => Some(Operator::Lt),
            Operator::Le => Some(Operator::Ge),
            Operator::Ge => Some(Operator::Le),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Immutable signed integer constant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Literal {
    value: i64,
}

impl Literal {
    /// Wrap a constant value
    pub fn new(value: i64) -> Self {
        Self { value }
    }

    /// The constant value
    pub fn value(self) -> i64 {
        self.value
    }

    /// Negated clone
    pub fn negated(self) -> Self {
        Self { value: -self.value }
    }

    /// Minimum number of bits needed to hold the value as an unsigned
    /// field (non-negative values only; negative values never encode
    /// inline and report the width of their absolute two's-complement form).
    pub fn min_bit_width(self) -> u8 {
        if self.value >= 0 {
            (64 - self.value.leading_zeros()).max(1) as u8
        } else {
            (65 - (!self.value).leading_zeros()) as u8
        }
    }

    /// True when the value lies inside `[min, max]`
    pub fn fits(self, min: i64, max: i64) -> bool {
        self.value >= min && self.value <= max
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Named memory cell.
///
/// User variables start at 0; constant cells produced by
/// [`Variable::from_int`] carry the spilled literal as their initial value.
/// Equality and hashing go by name only, so a constant cell for a given
/// value is shared across the program.
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    init: i64,
}

impl Variable {
    /// A user variable, initialized to zero
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            init: 0,
        }
    }

    /// An auto-named cell holding a constant that could not be encoded
    /// inline (name `#v` for value `v`).
    pub fn from_int(value: i64) -> Self {
        Self {
            name: format!("#{value}"),
            init: value,
        }
    }

    /// Cell name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Initial memory value
    pub fn init_value(&self) -> i64 {
        self.init
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Variable {}

impl std::hash::Hash for Variable {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)
    }
}

/// Machine register (`rN`) or temporary-memory pseudo-register (`_mN`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
    rank: u8,
    is_temp: bool,
}

impl Register {
    /// A real machine register
    pub fn real(rank: u8) -> Self {
        Self {
            rank,
            is_temp: false,
        }
    }

    /// A temporary-memory spill slot
    pub fn temp(rank: u8) -> Self {
        Self {
            rank,
            is_temp: true,
        }
    }

    /// Rank within its bank (register number or spill-slot index)
    pub fn rank(self) -> u8 {
        self.rank
    }

    /// True for spill slots
    pub fn is_temp(self) -> bool {
        self.is_temp
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_temp {
            write!(f, "_m{}", self.rank)
        } else {
            write!(f, "r{}", self.rank)
        }
    }
}

/// Unique jump-target identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

impl Label {
    /// Numeric identity
    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l{}", self.0)
    }
}

/// Monotonic label source owned by one compilation session.
///
/// Constructing a fresh allocator is the reset; there is no global counter
/// to contaminate a later compilation.
#[derive(Debug, Default)]
pub struct LabelAllocator {
    next: u32,
}

impl LabelAllocator {
    /// A fresh allocator starting at `l1`
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Hand out the next label
    pub fn fresh(&mut self) -> Label {
        let label = Label(self.next);
        self.next += 1;
        label
    }
}
