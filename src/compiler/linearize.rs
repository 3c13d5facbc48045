//! Structure-to-linear lowering
//!
//! Flattens the statement tree into a linear sequence of nodes connected
//! by explicit jumps. Nodes live in an arena and are chained through a
//! circular doubly-linked list, so jump targets stay valid while the
//! peephole pass deletes and relinks nodes around them.
//!
//! Boolean conditions never reach the register allocator: `and`, `or` and
//! `not` are decomposed here into chains of compare-and-branch nodes, each
//! comparison adjusted to one the target engine supports.

use crate::error::{Error, Result};
use crate::parser::{ExprNode, StructureNode};
use crate::processor::ProcessorEngine;
use crate::ir::{Operator, Variable};
use tracing::{debug, trace};

/// Arena index of a linear node
pub type NodeId = usize;

const HEAD: NodeId = 0;

/// One node of the linear program
#[derive(Debug, Clone, PartialEq)]
pub enum LinearKind {
    /// Evaluate an expression and store it into a variable
    Assign {
        /// Destination variable
        var: Variable,
        /// Right-hand side
        expr: ExprNode,
    },
    /// Evaluate an expression and write it to the output device
    Print {
        /// Printed expression
        expr: ExprNode,
    },
    /// Read one input value into a variable
    Input {
        /// Destination variable
        var: Variable,
    },
    /// Unconditional jump
    Jump {
        /// Target node
        target: NodeId,
    },
    /// Branch when an elementary comparison holds
    JumpIf {
        /// Adjusted comparison (always supported by the engine)
        cmp: ExprNode,
        /// Target node
        target: NodeId,
    },
    /// Placeholder jump target; removed by the peephole pass
    Dummy,
    /// End of program
    Halt,
}

struct Node {
    kind: LinearKind,
    prev: NodeId,
    next: NodeId,
    in_list: bool,
}

/// Linearized program: an ordered node sequence with resolved jump targets
pub struct LinearProgram {
    arena: Vec<Node>,
}

impl LinearProgram {
    /// Node ids in program order
    pub fn ids(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.arena[HEAD].next;
        while cur != HEAD {
            out.push(cur);
            cur = self.arena[cur].next;
        }
        out
    }

    /// Kind of a node
    pub fn kind(&self, id: NodeId) -> &LinearKind {
        &self.arena[id].kind
    }
}

/// Lower a parsed program into a linear node sequence for `engine`.
pub fn linearize(program: &[StructureNode], engine: &ProcessorEngine) -> Result<LinearProgram> {
    let mut linearizer = Linearizer {
        arena: vec![Node {
            kind: LinearKind::Dummy,
            prev: HEAD,
            next: HEAD,
            in_list: true,
        }],
        supported: engine.supported_comparisons(),
    };
    linearizer.lower_block(program)?;
    let halt = linearizer.new_node(LinearKind::Halt);
    linearizer.append(halt);
    linearizer.peephole();
    let linear = LinearProgram {
        arena: linearizer.arena,
    };
    debug!(nodes = linear.ids().len(), "linearized program");
    Ok(linear)
}

struct Linearizer {
    arena: Vec<Node>,
    supported: Vec<Operator>,
}

impl Linearizer {
    /// Allocate a node outside the list; it becomes part of the program
    /// only once appended, but can already serve as a jump target.
    fn new_node(&mut self, kind: LinearKind) -> NodeId {
        let id = self.arena.len();
        self.arena.push(Node {
            kind,
            prev: id,
            next: id,
            in_list: false,
        });
        id
    }

    fn append(&mut self, id: NodeId) {
        let tail = self.arena[HEAD].prev;
        self.arena[id].prev = tail;
        self.arena[id].next = HEAD;
        self.arena[id].in_list = true;
        self.arena[tail].next = id;
        self.arena[HEAD].prev = id;
    }

    fn remove(&mut self, id: NodeId) {
        let (prev, next) = (self.arena[id].prev, self.arena[id].next);
        self.arena[prev].next = next;
        self.arena[next].prev = prev;
        self.arena[id].in_list = false;
    }

    fn lower_block(&mut self, statements: &[StructureNode]) -> Result<()> {
        for statement in statements {
            self.lower_statement(statement)?;
        }
        Ok(())
    }

    fn lower_statement(&mut self, statement: &StructureNode) -> Result<()> {
        match statement {
            StructureNode::Assign { var, expr, .. } => {
                let node = self.new_node(LinearKind::Assign {
                    var: var.clone(),
                    expr: expr.clone(),
                });
                self.append(node);
                Ok(())
            }
            StructureNode::Print { expr, .. } => {
                let node = self.new_node(LinearKind::Print { expr: expr.clone() });
                self.append(node);
                Ok(())
            }
            StructureNode::Input { var, .. } => {
                let node = self.new_node(LinearKind::Input { var: var.clone() });
                self.append(node);
                Ok(())
            }
            StructureNode::If {
                cond,
                body,
                else_body,
                ..
            } => self.lower_if(cond, body, else_body),
            StructureNode::While { cond, body, .. } => self.lower_while(cond, body),
        }
    }

    fn lower_if(
        &mut self,
        cond: &ExprNode,
        body: &[StructureNode],
        else_body: &[StructureNode],
    ) -> Result<()> {
        let then_entry = self.new_node(LinearKind::Dummy);
        let after = self.new_node(LinearKind::Dummy);
        if else_body.is_empty() {
            self.decompose(cond, then_entry, after)?;
            self.append(then_entry);
            self.lower_block(body)?;
        } else {
            let else_entry = self.new_node(LinearKind::Dummy);
            self.decompose(cond, then_entry, else_entry)?;
            self.append(then_entry);
            self.lower_block(body)?;
            let skip = self.new_node(LinearKind::Jump { target: after });
            self.append(skip);
            self.append(else_entry);
            self.lower_block(else_body)?;
        }
        self.append(after);
        Ok(())
    }

    fn lower_while(&mut self, cond: &ExprNode, body: &[StructureNode]) -> Result<()> {
        let entry = self.new_node(LinearKind::Dummy);
        let body_entry = self.new_node(LinearKind::Dummy);
        let after = self.new_node(LinearKind::Dummy);
        self.append(entry);
        self.decompose(cond, body_entry, after)?;
        self.append(body_entry);
        self.lower_block(body)?;
        let back = self.new_node(LinearKind::Jump { target: entry });
        self.append(back);
        self.append(after);
        Ok(())
    }

    /// Append the jump chain of a boolean condition: control reaches
    /// `on_true` when the condition holds and `on_false` otherwise.
    ///
    /// Connectives lower by continuation: the right operand of `and`/`or`
    /// becomes one of the left operand's branch targets, and `not` swaps
    /// the targets of its operand.
    fn decompose(&mut self, cond: &ExprNode, on_true: NodeId, on_false: NodeId) -> Result<()> {
        match cond {
            ExprNode::Comparison { .. } => {
                let adjusted = cond.adjust_condition_clone(&self.supported)?;
                let ExprNode::Comparison {
                    op,
                    left,
                    right,
                    inversed,
                } = adjusted
                else {
                    return Err(Error::internal("condition adjustment changed node shape"));
                };
                let cmp = ExprNode::Comparison {
                    op,
                    left,
                    right,
                    inversed: false,
                };
                let (taken, fallthrough) = if inversed {
                    (on_false, on_true)
                } else {
                    (on_true, on_false)
                };
                let branch = self.new_node(LinearKind::JumpIf {
                    cmp,
                    target: taken,
                });
                self.append(branch);
                let jump = self.new_node(LinearKind::Jump {
                    target: fallthrough,
                });
                self.append(jump);
                Ok(())
            }
            ExprNode::Not { operand } => self.decompose(operand, on_false, on_true),
            ExprNode::Logic { op, left, right } => {
                let rhs_entry = self.new_node(LinearKind::Dummy);
                match op {
                    Operator::And => self.decompose(left, rhs_entry, on_false)?,
                    Operator::Or => self.decompose(left, on_true, rhs_entry)?,
                    _ => {
                        return Err(Error::internal("non-connective operator in logic node"));
                    }
                }
                self.append(rhs_entry);
                self.decompose(right, on_true, on_false)
            }
            _ => Err(Error::internal(
                "arithmetic expression used as branch condition",
            )),
        }
    }

    /// Rewrite every jump targeting `from` to target `to` instead.
    fn redirect(&mut self, from: NodeId, to: NodeId) {
        for node in &mut self.arena {
            match &mut node.kind {
                LinearKind::Jump { target } | LinearKind::JumpIf { target, .. }
                    if *target == from =>
                {
                    *target = to;
                }
                _ => {}
            }
        }
    }

    fn in_list_ids(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.arena[HEAD].next;
        while cur != HEAD {
            out.push(cur);
            cur = self.arena[cur].next;
        }
        out
    }

    /// Run both simplifications to a fixed point: dummy nodes dissolve
    /// into their successor, and an unconditional jump to the immediately
    /// following node disappears.
    fn peephole(&mut self) {
        loop {
            let mut changed = false;
            for id in self.in_list_ids() {
                if !self.arena[id].in_list {
                    continue;
                }
                match self.arena[id].kind {
                    LinearKind::Dummy => {
                        let successor = self.arena[id].next;
                        if successor == HEAD {
                            continue;
                        }
                        trace!(id, successor, "dissolving placeholder node");
                        self.redirect(id, successor);
                        self.remove(id);
                        changed = true;
                    }
                    LinearKind::Jump { target } if target == self.arena[id].next => {
                        let successor = self.arena[id].next;
                        trace!(id, "dropping jump to next node");
                        self.redirect(id, successor);
                        self.remove(id);
                        changed = true;
                    }
                    _ => {}
                }
            }
            if !changed {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    fn linearize_source(source: &str, engine: &ProcessorEngine) -> LinearProgram {
        let program = parse_program(source).unwrap();
        linearize(&program, engine).unwrap()
    }

    fn count_kinds(linear: &LinearProgram) -> (usize, usize, usize) {
        let mut conditional = 0;
        let mut unconditional = 0;
        let mut dummies = 0;
        for id in linear.ids() {
            match linear.kind(id) {
                LinearKind::JumpIf { .. } => conditional += 1,
                LinearKind::Jump { .. } => unconditional += 1,
                LinearKind::Dummy => dummies += 1,
                _ => {}
            }
        }
        (conditional, unconditional, dummies)
    }

    #[test]
    fn straight_line_program_has_no_jumps() {
        let engine = ProcessorEngine::standard16();
        let linear = linearize_source("x = 1\ny = x + 2\nprint(y)\n", &engine);
        let kinds: Vec<_> = linear.ids().iter().map(|&id| linear.kind(id).clone()).collect();
        assert_eq!(kinds.len(), 4);
        assert!(matches!(kinds[0], LinearKind::Assign { .. }));
        assert!(matches!(kinds[1], LinearKind::Assign { .. }));
        assert!(matches!(kinds[2], LinearKind::Print { .. }));
        assert_eq!(kinds[3], LinearKind::Halt);
    }

    #[test]
    fn no_dummy_survives_peephole() {
        let engine = ProcessorEngine::standard16();
        let source = "x = 0\n\
                      while x < 5:\n\
                      \x20   if x % 2 == 0:\n\
                      \x20       print(x)\n\
                      \x20   x = x + 1\n";
        let linear = linearize_source(source, &engine);
        let (_, _, dummies) = count_kinds(&linear);
        assert_eq!(dummies, 0);
    }

    #[test]
    fn no_jump_to_next_survives_peephole() {
        let engine = ProcessorEngine::standard16();
        let source = "if x < 3:\n    y = 1\nelse:\n    y = 2\nprint(y)\n";
        let linear = linearize_source(source, &engine);
        let ids = linear.ids();
        for (pos, &id) in ids.iter().enumerate() {
            if let LinearKind::Jump { target } = linear.kind(id) {
                assert_ne!(Some(target), ids.get(pos + 1));
            }
        }
    }

    #[test]
    fn peephole_pass_is_idempotent() {
        let engine = ProcessorEngine::standard16();
        let source = "x = 0\n\
                      while x < 5:\n\
                      \x20   if x % 2 == 0:\n\
                      \x20       print(x)\n\
                      \x20   x = x + 1\n\
                      print(x)\n";
        let program = parse_program(source).unwrap();
        let mut linearizer = Linearizer {
            arena: vec![Node {
                kind: LinearKind::Dummy,
                prev: HEAD,
                next: HEAD,
                in_list: true,
            }],
            supported: engine.supported_comparisons(),
        };
        linearizer.lower_block(&program).unwrap();
        let halt = linearizer.new_node(LinearKind::Halt);
        linearizer.append(halt);
        linearizer.peephole();
        let snapshot: Vec<_> = linearizer
            .in_list_ids()
            .into_iter()
            .map(|id| (id, linearizer.arena[id].kind.clone()))
            .collect();
        linearizer.peephole();
        let again: Vec<_> = linearizer
            .in_list_ids()
            .into_iter()
            .map(|id| (id, linearizer.arena[id].kind.clone()))
            .collect();
        assert_eq!(snapshot, again);
    }

    #[test]
    fn disjunction_decomposes_into_two_branches_and_one_jump() {
        let engine = ProcessorEngine::standard16();
        let source = "if x < 10 or y < 100:\n    z = 1\n";
        let linear = linearize_source(source, &engine);
        let (conditional, unconditional, dummies) = count_kinds(&linear);
        assert_eq!(conditional, 2);
        assert_eq!(unconditional, 1);
        assert_eq!(dummies, 0);

        // Both branches short-circuit to the body head.
        let ids = linear.ids();
        let body = ids
            .iter()
            .position(|&id| matches!(linear.kind(id), LinearKind::Assign { .. }))
            .unwrap();
        for &id in &ids {
            if let LinearKind::JumpIf { target, .. } = linear.kind(id) {
                assert_eq!(*target, ids[body]);
            }
        }
    }

    #[test]
    fn conjunction_falls_through_between_tests() {
        let engine = ProcessorEngine::standard16();
        let source = "if x < 10 and y < 100:\n    z = 1\n";
        let linear = linearize_source(source, &engine);
        let (conditional, unconditional, _) = count_kinds(&linear);
        // Each test branches to the exit on failure; the second test falls
        // through into the body, so its trailing jump dissolved.
        assert_eq!(conditional, 2);
        assert!(unconditional <= 2);
    }

    #[test]
    fn unsupported_comparison_swaps_branch_targets() {
        let engine = ProcessorEngine::reduced12();
        // `>=` is not in the reduced set; its negation `<` is, with the
        // branch targets swapped, and the swapped fallthrough jump then
        // lands on the next node and disappears.
        let linear = linearize_source("if x >= 5:\n    y = 1\n", &engine);
        let ids = linear.ids();
        let (conditional, unconditional, _) = count_kinds(&linear);
        assert_eq!(conditional, 1);
        assert_eq!(unconditional, 0);
        let branch = ids
            .iter()
            .find(|&&id| matches!(linear.kind(id), LinearKind::JumpIf { .. }))
            .unwrap();
        let LinearKind::JumpIf { cmp, target } = linear.kind(*branch) else {
            unreachable!();
        };
        let ExprNode::Comparison { op, inversed, .. } = cmp else {
            panic!("expected comparison payload");
        };
        assert_eq!(*op, Operator::Lt);
        assert!(!inversed);
        // The branch skips the body: it targets the halt node.
        assert_eq!(*target, *ids.last().unwrap());
    }

    #[test]
    fn mirrored_comparison_swaps_operands_not_branches() {
        let engine = ProcessorEngine::reduced12();
        // `x > 5` becomes `5 < x` on an engine without `>`.
        let linear = linearize_source("if x > 5:\n    y = 1\n", &engine);
        let branch = linear
            .ids()
            .into_iter()
            .find(|&id| matches!(linear.kind(id), LinearKind::JumpIf { .. }))
            .unwrap();
        let LinearKind::JumpIf { cmp, .. } = linear.kind(branch) else {
            unreachable!();
        };
        let ExprNode::Comparison { op, left, right, .. } = cmp else {
            panic!("expected comparison payload");
        };
        assert_eq!(*op, Operator::Lt);
        assert!(matches!(&**left, ExprNode::Literal(l) if l.value() == 5));
        assert!(matches!(&**right, ExprNode::Variable(v) if v.name() == "x"));
    }

    #[test]
    fn while_loop_branches_back_to_condition() {
        let engine = ProcessorEngine::standard16();
        let linear = linearize_source("while x < 3:\n    x = x + 1\n", &engine);
        let ids = linear.ids();
        // JumpIf(body), Jump(halt), Assign, Jump(cond), Halt
        assert_eq!(ids.len(), 5);
        assert!(matches!(linear.kind(ids[0]), LinearKind::JumpIf { .. }));
        let LinearKind::Jump { target: exit } = linear.kind(ids[1]) else {
            panic!("expected exit jump");
        };
        assert_eq!(*exit, ids[4]);
        let LinearKind::Jump { target: back } = linear.kind(ids[3]) else {
            panic!("expected back jump");
        };
        assert_eq!(*back, ids[0]);
        assert_eq!(*linear.kind(ids[4]), LinearKind::Halt);
    }

    #[test]
    fn negated_condition_uses_de_morgan_targets() {
        let engine = ProcessorEngine::standard16();
        // `not (a < 1 and b < 2)` holds when either test fails.
        let linear = linearize_source("if not (a < 1 and b < 2):\n    y = 1\n", &engine);
        let ids = linear.ids();
        let body = ids
            .iter()
            .position(|&id| matches!(linear.kind(id), LinearKind::Assign { .. }))
            .unwrap();
        // Failing the first test enters the body at once; passing both
        // tests skips it entirely.
        let LinearKind::Jump { target } = linear.kind(ids[1]) else {
            panic!("expected fallthrough jump after the first test");
        };
        assert_eq!(*target, ids[body]);
        let last_branch = ids
            .iter()
            .rev()
            .find(|&&id| matches!(linear.kind(id), LinearKind::JumpIf { .. }))
            .unwrap();
        let LinearKind::JumpIf { target, .. } = linear.kind(*last_branch) else {
            unreachable!();
        };
        assert_eq!(*target, *ids.last().unwrap());
    }
}
