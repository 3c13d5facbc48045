//! Expression-to-FIFO lowering
//!
//! Serializes an expression tree into an [`ActionsFifo`] ordered for
//! minimal register pressure (Sethi-Ullman numbering): the costlier
//! subtree is always evaluated first, and literals that can ride inline in
//! an instruction cost no register at all.

use crate::error::{Error, Result};
use crate::ir::{ActionsFifo, FifoItem, Operator};
use crate::parser::ExprNode;
use crate::processor::ProcessorEngine;

/// Number of registers needed to evaluate `expr` on `engine`.
pub fn expr_cost(expr: &ExprNode, engine: &ProcessorEngine) -> u8 {
    match expr {
        ExprNode::Literal(_) | ExprNode::Variable(_) => 1,
        ExprNode::Unary { operand, .. } => expr_cost(operand, engine).max(1),
        ExprNode::Binary { left, right, .. } => {
            if inline_literal(expr, engine).is_some() {
                return expr_cost(left, engine);
            }
            binary_cost(left, right, engine)
        }
        ExprNode::Comparison { left, right, .. } => binary_cost(left, right, engine),
        // Logic connectives are decomposed into jump chains before any
        // expression reaches this pass.
        ExprNode::Logic { .. } | ExprNode::Not { .. } => 0,
    }
}

fn binary_cost(left: &ExprNode, right: &ExprNode, engine: &ProcessorEngine) -> u8 {
    let cl = expr_cost(left, engine);
    let cr = expr_cost(right, engine);
    if cl == cr {
        cl + 1
    } else {
        cl.max(cr)
    }
}

/// The right operand as an inline-eligible literal, if the engine has a
/// literal form for this operator and the value fits its field.
fn inline_literal(expr: &ExprNode, engine: &ProcessorEngine) -> Option<i64> {
    let ExprNode::Binary { op, right, .. } = expr else {
        return None;
    };
    let ExprNode::Literal(lit) = &**right else {
        return None;
    };
    engine
        .literal_operator_available(*op, lit.value())
        .then_some(lit.value())
}

/// Lower an arithmetic expression into an action queue.
pub fn lower_expr(expr: &ExprNode, engine: &ProcessorEngine) -> Result<ActionsFifo> {
    let mut fifo = ActionsFifo::new();
    lower_into(expr, engine, &mut fifo)?;
    Ok(fifo)
}

/// Lower an adjusted comparison into an action queue ending with a
/// [`FifoItem::Comparison`]. The caller is responsible for having adjusted
/// the operator to the engine's supported set beforehand.
pub fn lower_condition(expr: &ExprNode, engine: &ProcessorEngine) -> Result<ActionsFifo> {
    let ExprNode::Comparison {
        op, left, right, ..
    } = expr
    else {
        return Err(Error::internal(
            "condition lowering expects an elementary comparison",
        ));
    };
    let mut fifo = ActionsFifo::new();
    lower_operands(left, right, *op, engine, &mut fifo)?;
    fifo.push(FifoItem::Comparison(*op));
    Ok(fifo)
}

fn lower_into(expr: &ExprNode, engine: &ProcessorEngine, fifo: &mut ActionsFifo) -> Result<()> {
    match expr {
        ExprNode::Literal(lit) => {
            fifo.push(FifoItem::Literal(*lit));
            Ok(())
        }
        ExprNode::Variable(var) => {
            fifo.push(FifoItem::Variable(var.clone()));
            Ok(())
        }
        ExprNode::Unary { op, operand } => {
            lower_into(operand, engine, fifo)?;
            fifo.push(FifoItem::UnaryOp(*op));
            Ok(())
        }
        ExprNode::Binary { op, left, right } => {
            if let Some(value) = inline_literal(expr, engine) {
                lower_into(left, engine, fifo)?;
                fifo.push(FifoItem::BinaryOpWithLiteral(
                    *op,
                    crate::ir::Literal::new(value),
                ));
                return Ok(());
            }
            lower_operands(left, right, *op, engine, fifo)?;
            fifo.push(FifoItem::BinaryOp(*op));
            Ok(())
        }
        _ => Err(Error::internal(
            "boolean expression reached arithmetic lowering",
        )),
    }
}

/// Emit both operands, costlier subtree first; when that reverses the
/// source order of a non-commutative operator, an explicit `Swap` restores
/// it for the allocator.
fn lower_operands(
    left: &ExprNode,
    right: &ExprNode,
    op: Operator,
    engine: &ProcessorEngine,
    fifo: &mut ActionsFifo,
) -> Result<()> {
    let cl = expr_cost(left, engine);
    let cr = expr_cost(right, engine);
    if cr > cl {
        lower_into(right, engine, fifo)?;
        lower_into(left, engine, fifo)?;
        if !op.is_commutative() {
            fifo.push(FifoItem::Swap);
        }
    } else {
        lower_into(left, engine, fifo)?;
        lower_into(right, engine, fifo)?;
    }
    Ok(())
}
