//! Expression AST
//!
//! Immutable expression trees. Every transformation returns a clone and
//! leaves the receiver untouched; subtrees may be shared between
//! linearization passes, so in-place mutation is never allowed.

use crate::error::{Error, Result};
use crate::ir::{Literal, Operator, OperatorDomain, Variable};
use std::fmt;

/// Kind of value an expression evaluates to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprKind {
    /// Signed integer
    Arithmetic,
    /// Truth value (only legal as an `if`/`while` condition)
    Boolean,
}

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprKind::Arithmetic => write!(f, "arithmetic"),
            ExprKind::Boolean => write!(f, "boolean"),
        }
    }
}

/// Expression tree node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprNode {
    /// Integer constant
    Literal(Literal),
    /// Variable read
    Variable(Variable),
    /// Unary arithmetic (`-`, `~`)
    Unary {
        /// `Neg` or `BitNot`
        op: Operator,
        /// Operand subtree
        operand: Box<ExprNode>,
    },
    /// Binary arithmetic (`+ - * / % & | ^`)
    Binary {
        /// Arithmetic binary operator
        op: Operator,
        /// Left operand subtree
        left: Box<ExprNode>,
        /// Right operand subtree
        right: Box<ExprNode>,
    },
    /// Comparison producing a truth value
    Comparison {
        /// Comparison operator
        op: Operator,
        /// Left operand subtree
        left: Box<ExprNode>,
        /// Right operand subtree
        right: Box<ExprNode>,
        /// Logical NOT applied without structural change
        inversed: bool,
    },
    /// `and` / `or` over two boolean subtrees
    Logic {
        /// `And` or `Or`
        op: Operator,
        /// Left condition
        left: Box<ExprNode>,
        /// Right condition
        right: Box<ExprNode>,
    },
    /// `not` over a boolean subtree
    Not {
        /// Negated condition
        operand: Box<ExprNode>,
    },
}

impl ExprNode {
    /// Literal leaf
    pub fn literal(value: i64) -> Self {
        ExprNode::Literal(Literal::new(value))
    }

    /// Variable leaf
    pub fn variable(name: impl Into<String>) -> Self {
        ExprNode::Variable(Variable::new(name))
    }

    /// Build a unary node, folding literal operands immediately.
    ///
    /// `-5` never becomes a runtime negation: it collapses to the literal
    /// `-5` at construction time, and `~` folds the same way.
    pub fn unary(op: Operator, operand: ExprNode) -> Result<Self> {
        match op {
            Operator::Neg | Operator::BitNot => {
                operand.expect_kind(ExprKind::Arithmetic)?;
                if let ExprNode::Literal(lit) = &operand {
                    let folded = match op {
                        Operator::Neg => lit.negated(),
                        _ => Literal::new(!lit.value()),
                    };
                    return Ok(ExprNode::Literal(folded));
                }
                Ok(ExprNode::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            Operator::Not => Self::logic_not(operand),
            _ => Err(Error::expression(format!(
                "'{op}' is not a unary operator"
            ))),
        }
    }

    /// Build an arithmetic binary node, applying the construction-time
    /// normalizations: a commutative operator moves a non-negative literal
    /// to the right (the smaller of two non-negative literals stays there),
    /// and an add/sub with a negative right literal is rewritten to its
    /// sub/add dual so the literal becomes encodable inline.
    pub fn binary(op: Operator, left: ExprNode, right: ExprNode) -> Result<Self> {
        if op.domain() != OperatorDomain::Arithmetic || op.arity() != 2 {
            return Err(Error::expression(format!(
                "'{op}' is not an arithmetic binary operator"
            )));
        }
        left.expect_kind(ExprKind::Arithmetic)?;
        right.expect_kind(ExprKind::Arithmetic)?;

        let (left, right) = if op.is_commutative() {
            Self::normalize_commutative(left, right)
        } else {
            (left, right)
        };

        let node = ExprNode::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        Ok(node.neg_to_sub_clone())
    }

    /// Build a comparison node
    pub fn comparison(op: Operator, left: ExprNode, right: ExprNode) -> Result<Self> {
        if op.domain() != OperatorDomain::Comparison {
            return Err(Error::expression(format!("'{op}' is not a comparison")));
        }
        left.expect_kind(ExprKind::Arithmetic)?;
        right.expect_kind(ExprKind::Arithmetic)?;
        Ok(ExprNode::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
            inversed: false,
        })
    }

    /// Build an `and`/`or` node
    pub fn logic(op: Operator, left: ExprNode, right: ExprNode) -> Result<Self> {
        if !matches!(op, Operator::And | Operator::Or) {
            return Err(Error::expression(format!(
                "'{op}' is not a logic connective"
            )));
        }
        left.expect_kind(ExprKind::Boolean)?;
        right.expect_kind(ExprKind::Boolean)?;
        Ok(ExprNode::Logic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Build a `not` node.
    ///
    /// Applied to a comparison this only toggles the `inversed` flag.
    pub fn logic_not(operand: ExprNode) -> Result<Self> {
        operand.expect_kind(ExprKind::Boolean)?;
        match operand {
            ExprNode::Comparison {
                op,
                left,
                right,
                inversed,
            } => Ok(ExprNode::Comparison {
                op,
                left,
                right,
                inversed: !inversed,
            }),
            ExprNode::Not { operand } => Ok(*operand),
            other => Ok(ExprNode::Not {
                operand: Box::new(other),
            }),
        }
    }

    fn normalize_commutative(left: ExprNode, right: ExprNode) -> (ExprNode, ExprNode) {
        let left_lit = left.non_negative_literal();
        let right_lit = right.non_negative_literal();
        match (left_lit, right_lit) {
            // Smaller of two non-negative literals stays on the right.
            (Some(a), Some(b)) if a < b => (right, left),
            (Some(_), None) => (right, left),
            _ => (left, right),
        }
    }

    fn non_negative_literal(&self) -> Option<i64> {
        match self {
            ExprNode::Literal(lit) if lit.value() >= 0 => Some(lit.value()),
            _ => None,
        }
    }

    /// Value kind of the expression
    pub fn kind(&self) -> ExprKind {
        match self {
            ExprNode::Literal(_)
            | ExprNode::Variable(_)
            | ExprNode::Unary { .. }
            | ExprNode::Binary { .. } => ExprKind::Arithmetic,
            _ => ExprKind::Boolean,
        }
    }

    fn expect_kind(&self, expected: ExprKind) -> Result<()> {
        let got = self.kind();
        if got != expected {
            return Err(Error::TypeError {
                expected: expected.to_string(),
                got: got.to_string(),
            });
        }
        Ok(())
    }

    /// Clone with the whole condition logically negated.
    ///
    /// Comparisons toggle their `inversed` flag; `and`/`or` go through
    /// De Morgan; `not` unwraps. Fails on arithmetic expressions.
    pub fn logic_negate_clone(&self) -> Result<ExprNode> {
        match self {
            ExprNode::Comparison {
                op,
                left,
                right,
                inversed,
            } => Ok(ExprNode::Comparison {
                op: *op,
                left: left.clone(),
                right: right.clone(),
                inversed: !inversed,
            }),
            ExprNode::Logic { op, left, right } => {
                let dual = if *op == Operator::And {
                    Operator::Or
                } else {
                    Operator::And
                };
                Ok(ExprNode::Logic {
                    op: dual,
                    left: Box::new(left.logic_negate_clone()?),
                    right: Box::new(right.logic_negate_clone()?),
                })
            }
            ExprNode::Not { operand } => Ok((**operand).clone()),
            _ => Err(Error::TypeError {
                expected: ExprKind::Boolean.to_string(),
                got: ExprKind::Arithmetic.to_string(),
            }),
        }
    }

    /// Clone of a comparison rewritten to use only operators the target
    /// processor supports.
    ///
    /// Priority order: as-is, logically negated, operand-mirrored,
    /// negated-mirrored. A clone whose `inversed` flag is set means the
    /// emitted branch tests the negation and its targets must be swapped.
    pub fn adjust_condition_clone(&self, supported: &[Operator]) -> Result<ExprNode> {
        let ExprNode::Comparison {
            op,
            left,
            right,
            inversed,
        } = self
        else {
            return Err(Error::expression(
                "condition adjustment applies to comparisons only",
            ));
        };

        // Fold the inversed flag into the operator first so the candidate
        // scan starts from the actual condition being branched on.
        let effective = if *inversed {
            op.logic_negated()
                .ok_or_else(|| Error::internal("comparison without a negation"))?
        } else {
            *op
        };

        let negated = effective
            .logic_negated()
            .ok_or_else(|| Error::internal("comparison without a negation"))?;
        let mirrored = effective
            .mirrored()
            .ok_or_else(|| Error::internal("comparison without a mirror"))?;
        let negated_mirrored = mirrored
            .logic_negated()
            .ok_or_else(|| Error::internal("comparison without a negation"))?;

        let build = |op: Operator, swap: bool, inversed: bool| {
            let (l, r) = if swap {
                (right.clone(), left.clone())
            } else {
                (left.clone(), right.clone())
            };
            ExprNode::Comparison {
                op,
                left: l,
                right: r,
                inversed,
            }
        };

        if supported.contains(&effective) {
            Ok(build(effective, false, false))
        } else if supported.contains(&negated) {
            Ok(build(negated, false, true))
        } else if supported.contains(&mirrored) {
            Ok(build(mirrored, true, false))
        } else if supported.contains(&negated_mirrored) {
            Ok(build(negated_mirrored, true, true))
        } else {
            Err(Error::UnsupportedComparison {
                op: effective.symbol().to_string(),
            })
        }
    }

    /// Clone with a negative right literal of an add/sub folded into the
    /// dual operator (`x + (-5)` becomes `x - 5`). Identity clone when the
    /// rewrite does not apply.
    pub fn neg_to_sub_clone(&self) -> ExprNode {
        if let ExprNode::Binary { op, left, right } = self {
            if let ExprNode::Literal(lit) = &**right {
                if lit.value() < 0 && matches!(op, Operator::Add | Operator::Sub) {
                    let dual = if *op == Operator::Add {
                        Operator::Sub
                    } else {
                        Operator::Add
                    };
                    return ExprNode::Binary {
                        op: dual,
                        left: left.clone(),
                        right: Box::new(ExprNode::Literal(lit.negated())),
                    };
                }
            }
        }
        self.clone()
    }
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprNode::Literal(lit) => write!(f, "{lit}"),
            ExprNode::Variable(var) => write!(f, "{}", var.name()),
            ExprNode::Unary { op, operand } => write!(f, "{}{operand}", op.symbol()),
            ExprNode::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
            ExprNode::Comparison {
                op,
                left,
                right,
                inversed,
            } => {
                if *inversed {
                    write!(f, "not ({left} {op} {right})")
                } else {
                    write!(f, "({left} {op} {right})")
                }
            }
            ExprNode::Logic { op, left, right } => write!(f, "({left} {op} {right})"),
            ExprNode::Not { operand } => write!(f, "not {operand}"),
        }
    }
}
