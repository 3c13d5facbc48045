//! Binary and assembly emission
//!
//! Turns a linear program into micro-operations, resolves labels and
//! memory cells to absolute addresses, and renders both the assembly
//! listing and the binary memory image.
//!
//! Memory layout: instruction words first, then data cells in first-use
//! order, then the spill slots. Data cells carry their initial values in
//! the image, so loading it is the whole program setup.

use crate::compiler::linearize::{LinearKind, LinearProgram};
use crate::compiler::lowering::{lower_condition, lower_expr};
use crate::compiler::regalloc::ExpressionCompiler;
use crate::error::{Error, Result};
use crate::ir::{Label, LabelAllocator, MemCell, MicroOp, Operator};
use crate::parser::ExprNode;
use crate::processor::{OpKey, ProcessorEngine};
use std::collections::HashMap;
use tracing::debug;

/// One addressed data cell of the final image
struct DataCell {
    /// Listing spelling (`@x`, `@#300`, `_m0`)
    display: String,
    init: i64,
}

/// Fully resolved program: listing, words and the data-cell map
pub struct CompiledProgram {
    word_bits: u8,
    code: Vec<u64>,
    data: Vec<DataCell>,
    addresses: HashMap<String, usize>,
    asm: Vec<String>,
}

impl CompiledProgram {
    /// Word width of the target engine
    pub fn word_bits(&self) -> u8 {
        self.word_bits
    }

    /// Number of instruction words
    pub fn code_len(&self) -> usize {
        self.code.len()
    }

    /// Absolute address of a data cell, by name (`x`, `#300`, `_m0`)
    pub fn address_of(&self, name: &str) -> Option<usize> {
        self.addresses.get(name).copied()
    }

    /// Assembly listing; `with_decls` appends one `name<TAB>value` line
    /// per data cell.
    pub fn asm_text(&self, with_decls: bool) -> String {
        let mut out = self.asm.join("\n");
        if with_decls {
            for cell in &self.data {
                out.push('\n');
                out.push_str(&format!("{}\t{}", cell.display, cell.init));
            }
        }
        out.push('\n');
        out
    }

    /// Complete memory image: instruction words followed by initialized
    /// data cells, every value masked to the word width.
    pub fn as_integers(&self) -> Vec<u64> {
        let mask = word_mask(self.word_bits);
        let mut image = self.code.clone();
        image.extend(self.data.iter().map(|c| (c.init as u64) & mask));
        image
    }

    /// Memory image rendered as fixed-width bit strings
    pub fn binary_words(&self) -> Vec<String> {
        let width = self.word_bits as usize;
        self.as_integers()
            .iter()
            .map(|w| format!("{w:0width$b}"))
            .collect()
    }
}

fn word_mask(bits: u8) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Emit the final program for a linearized statement sequence.
pub fn generate(linear: &LinearProgram, engine: &ProcessorEngine) -> Result<CompiledProgram> {
    let ops = emit_micro_ops(linear, engine)?;
    assemble(&ops, engine)
}

/// Lower each linear node to micro-operations, with a label in front of
/// every jump target.
///
/// Labels are handed out in the order jumps are encountered, so the
/// listing numbers them by first reference, not by position.
fn emit_micro_ops(linear: &LinearProgram, engine: &ProcessorEngine) -> Result<Vec<MicroOp>> {
    let mut labels: HashMap<usize, Label> = HashMap::new();
    let mut allocator = LabelAllocator::new();
    for id in linear.ids() {
        match linear.kind(id) {
            LinearKind::Jump { target } | LinearKind::JumpIf { target, .. } => {
                labels
                    .entry(*target)
                    .or_insert_with(|| allocator.fresh());
            }
            _ => {}
        }
    }

    let mut ops = Vec::new();
    for id in linear.ids() {
        if let Some(&label) = labels.get(&id) {
            ops.push(MicroOp::Label(label));
        }
        match linear.kind(id) {
            LinearKind::Assign { var, expr } => {
                let fifo = lower_expr(expr, engine)?;
                let mut compiler = ExpressionCompiler::new(engine);
                let result = compiler.compile_expression(fifo)?;
                ops.extend(compiler.into_ops());
                ops.push(MicroOp::Store {
                    dst: MemCell::Var(var.clone()),
                    src: result,
                });
            }
            LinearKind::Print { expr } => {
                let fifo = lower_expr(expr, engine)?;
                let mut compiler = ExpressionCompiler::new(engine);
                let result = compiler.compile_expression(fifo)?;
                ops.extend(compiler.into_ops());
                ops.push(MicroOp::Print { src: result });
            }
            LinearKind::Input { var } => {
                ops.push(MicroOp::Input {
                    dst: MemCell::Var(var.clone()),
                });
            }
            LinearKind::Jump { target } => {
                ops.push(MicroOp::Jump {
                    target: labels[target],
                });
            }
            LinearKind::JumpIf { cmp, target } => {
                let ExprNode::Comparison { op, .. } = cmp else {
                    return Err(Error::internal("branch without a comparison payload"));
                };
                let fifo = lower_condition(cmp, engine)?;
                let mut compiler = ExpressionCompiler::new(engine);
                let (left, right) = compiler.compile_condition(fifo)?;
                ops.extend(compiler.into_ops());
                ops.push(MicroOp::JumpIf {
                    cond: *op,
                    left,
                    right,
                    target: labels[target],
                });
            }
            LinearKind::Halt => ops.push(MicroOp::Halt),
            LinearKind::Dummy => {
                return Err(Error::internal("placeholder node survived simplification"));
            }
        }
    }
    Ok(ops)
}

/// Resolve addresses and render words and listing lines.
fn assemble(ops: &[MicroOp], engine: &ProcessorEngine) -> Result<CompiledProgram> {
    let code_len: usize = ops.iter().map(MicroOp::word_count).sum();

    // Data cells in first-use order, spill slots after every named cell.
    let mut data: Vec<DataCell> = Vec::new();
    let mut addresses: HashMap<String, usize> = HashMap::new();
    let mut temp_count = 0u8;
    for op in ops {
        let cell = match op {
            MicroOp::Load { src, .. } => Some(src),
            MicroOp::Store { dst, .. } => Some(dst),
            MicroOp::Input { dst, .. } => Some(dst),
            _ => None,
        };
        match cell {
            Some(MemCell::Var(var)) => {
                if !addresses.contains_key(var.name()) {
                    addresses.insert(var.name().to_string(), code_len + data.len());
                    data.push(DataCell {
                        display: var.to_string(),
                        init: var.init_value(),
                    });
                }
            }
            Some(MemCell::Temp(slot)) => temp_count = temp_count.max(slot + 1),
            None => {}
        }
    }
    for slot in 0..temp_count {
        let key = format!("_m{slot}");
        addresses.insert(key.clone(), code_len + data.len());
        data.push(DataCell {
            display: key,
            init: 0,
        });
    }

    let mut label_addresses: HashMap<Label, usize> = HashMap::new();
    let mut offset = 0;
    for op in ops {
        if let MicroOp::Label(label) = op {
            label_addresses.insert(*label, offset);
        }
        offset += op.word_count();
    }

    let mut emitter = Emitter {
        engine,
        addresses: &addresses,
        label_addresses: &label_addresses,
        code: Vec::with_capacity(code_len),
        asm: Vec::new(),
        pending_label: None,
    };
    for op in ops {
        emitter.emit(op)?;
    }

    debug!(
        code_words = code_len,
        data_cells = data.len(),
        "assembled program"
    );
    let (code, asm) = (emitter.code, emitter.asm);
    Ok(CompiledProgram {
        word_bits: engine.word_bits(),
        code,
        data,
        addresses,
        asm,
    })
}

struct Emitter<'a> {
    engine: &'a ProcessorEngine,
    addresses: &'a HashMap<String, usize>,
    label_addresses: &'a HashMap<Label, usize>,
    code: Vec<u64>,
    asm: Vec<String>,
    pending_label: Option<Label>,
}

impl Emitter<'_> {
    fn emit(&mut self, op: &MicroOp) -> Result<()> {
        match op {
            MicroOp::Label(label) => {
                self.pending_label = Some(*label);
                Ok(())
            }
            MicroOp::Move { dst, src } => {
                let word = self
                    .engine
                    .encode(OpKey::Move, &[dst.rank(), src.rank()], None)?;
                self.push(word, OpKey::Move, &format!("{dst}, {src}"))
            }
            MicroOp::MoveLit { dst, lit } => {
                let word =
                    self.engine
                        .encode(OpKey::MoveLit, &[dst.rank()], Some(lit.value() as u64))?;
                self.push(word, OpKey::MoveLit, &format!("{dst}, #{lit}"))
            }
            MicroOp::Load { dst, src } => {
                let addr = self.cell_address(src)?;
                let word = self.engine.encode(OpKey::Load, &[dst.rank()], Some(addr))?;
                self.push(word, OpKey::Load, &format!("{dst}, {src}"))
            }
            MicroOp::Store { dst, src } => {
                let addr = self.cell_address(dst)?;
                let word = self.engine.encode(OpKey::Store, &[src.rank()], Some(addr))?;
                self.push(word, OpKey::Store, &format!("{src}, {dst}"))
            }
            MicroOp::Alu { op, dst, a, b, lit } => self.emit_alu(*op, *dst, *a, *b, *lit),
            MicroOp::Jump { target } => {
                let addr = self.label_address(*target)?;
                let word = self.engine.encode(OpKey::Goto, &[], Some(addr))?;
                self.push(word, OpKey::Goto, &target.to_string())
            }
            MicroOp::JumpIf {
                cond,
                left,
                right,
                target,
            } => {
                let cmp = self
                    .engine
                    .encode(OpKey::Cmp, &[left.rank(), right.rank()], None)?;
                self.push(cmp, OpKey::Cmp, &format!("{left}, {right}"))?;
                let addr = self.label_address(*target)?;
                let key = OpKey::GotoIf(*cond);
                let word = self.engine.encode(key, &[], Some(addr))?;
                self.push(word, key, &target.to_string())
            }
            MicroOp::Print { src } => {
                let word = self.engine.encode(OpKey::Print, &[src.rank()], None)?;
                self.push(word, OpKey::Print, &src.to_string())
            }
            MicroOp::Input { dst } => {
                let addr = self.cell_address(dst)?;
                let word = self.engine.encode(OpKey::Input, &[], Some(addr))?;
                self.push(word, OpKey::Input, &dst.to_string())
            }
            MicroOp::Halt => {
                let word = self.engine.encode(OpKey::Halt, &[], None)?;
                self.push(word, OpKey::Halt, "")
            }
        }
    }

    /// Register operand order differs by engine family: a free-output
    /// engine names the destination explicitly, a pinned one leaves it out.
    fn emit_alu(
        &mut self,
        op: Operator,
        dst: crate::ir::Register,
        a: crate::ir::Register,
        b: Option<crate::ir::Register>,
        lit: Option<crate::ir::Literal>,
    ) -> Result<()> {
        let key = if lit.is_some() {
            OpKey::AluLit(op)
        } else {
            OpKey::Alu(op)
        };
        let mut regs = Vec::with_capacity(3);
        let mut text = String::new();
        if self.engine.ual_output_is_free() {
            regs.push(dst.rank());
            text.push_str(&dst.to_string());
            text.push_str(", ");
        }
        regs.push(a.rank());
        text.push_str(&a.to_string());
        if let Some(b) = b {
            regs.push(b.rank());
            text.push_str(&format!(", {b}"));
        }
        let special = lit.map(|l| {
            text.push_str(&format!(", #{l}"));
            l.value() as u64
        });
        let word = self.engine.encode(key, &regs, special)?;
        self.push(word, key, &text)
    }

    fn cell_address(&self, cell: &MemCell) -> Result<u64> {
        let key = match cell {
            MemCell::Var(var) => var.name().to_string(),
            MemCell::Temp(slot) => format!("_m{slot}"),
        };
        self.addresses
            .get(&key)
            .map(|&a| a as u64)
            .ok_or_else(|| Error::internal(format!("cell '{key}' was never assigned an address")))
    }

    fn label_address(&self, label: Label) -> Result<u64> {
        self.label_addresses
            .get(&label)
            .map(|&a| a as u64)
            .ok_or_else(|| Error::internal(format!("label '{label}' has no address")))
    }

    fn push(&mut self, word: u64, key: OpKey, operands: &str) -> Result<()> {
        let mnemonic = self.engine.mnemonic(key)?;
        let label = self
            .pending_label
            .take()
            .map(|l| l.to_string())
            .unwrap_or_default();
        if operands.is_empty() {
            self.asm.push(format!("{label}\t{mnemonic}"));
        } else {
            self.asm.push(format!("{label}\t{mnemonic} {operands}"));
        }
        self.code.push(word);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::linearize::linearize;
    use crate::parser::parse_program;

    fn compile(source: &str, engine: &ProcessorEngine) -> CompiledProgram {
        let program = parse_program(source).unwrap();
        let linear = linearize(&program, engine).unwrap();
        generate(&linear, engine).unwrap()
    }

    #[test]
    fn straight_line_listing() {
        let engine = ProcessorEngine::standard16();
        let prog = compile("x = 1\nprint(x)\n", &engine);
        assert_eq!(
            prog.asm_text(true),
            "\tMOVE r7, #1\n\
             \tSTORE r7, @x\n\
             \tLOAD r7, @x\n\
             \tPRINT r7\n\
             \tHALT\n\
             @x\t0\n"
        );
        assert_eq!(prog.code_len(), 5);
        assert_eq!(prog.address_of("x"), Some(5));
    }

    #[test]
    fn move_literal_word_encoding() {
        let engine = ProcessorEngine::standard16();
        let prog = compile("x = 1\n", &engine);
        // MOVE r7, #1 -> 01100 111 00000001
        assert_eq!(prog.binary_words()[0], "0110011100000001");
    }

    #[test]
    fn while_loop_labels_and_addresses() {
        let engine = ProcessorEngine::standard16();
        let prog = compile("while x < 3:\n    x = x + 1\n", &engine);
        let asm = prog.asm_text(false);
        // Condition head is labeled by the back jump; body head by the
        // conditional branch; halt by the exit jump.
        assert!(asm.contains("JMPL l1"));
        assert!(asm.contains("l1\tLOAD r7, @x"));
        assert!(asm.contains("JMP l3"));
        assert!(asm.contains("l3\tLOAD r7, @x") || asm.contains("l3\t"));
        // Code: LOAD, MOVE, CMP, JMPL, JMP, LOAD, ADD, STORE, JMP, HALT
        assert_eq!(prog.code_len(), 10);
        assert_eq!(prog.address_of("x"), Some(10));
    }

    #[test]
    fn compound_branch_occupies_two_words() {
        let engine = ProcessorEngine::standard16();
        let prog = compile("if x == 1:\n    y = 2\n", &engine);
        let asm = prog.asm_text(false);
        let cmp_line = asm.lines().position(|l| l.contains("CMP")).unwrap();
        assert!(asm.lines().nth(cmp_line + 1).unwrap().contains("JMPE"));
    }

    #[test]
    fn oversized_constant_becomes_a_data_cell() {
        let engine = ProcessorEngine::standard16();
        let prog = compile("x = 300\ny = x\n", &engine);
        // First-use order: the constant cell is referenced before y.
        let c = prog.address_of("#300").unwrap();
        let x = prog.address_of("x").unwrap();
        let y = prog.address_of("y").unwrap();
        assert!(c < x && x < y);
        assert_eq!(prog.as_integers()[c], 300);
        assert!(prog.asm_text(true).contains("@#300\t300"));
    }

    #[test]
    fn spill_slots_follow_named_cells() {
        let engine = ProcessorEngine::reduced12();
        let source = "r = ((a + b) * (c + d)) * ((e + f) * (g + h)) \
                      + ((a + b) * (c + d)) * ((e + f) * (g + h))\n";
        let prog = compile(source, &engine);
        let slot = prog.address_of("_m0").unwrap();
        for name in ["a", "b", "c", "d", "e", "f", "g", "h", "r"] {
            assert!(prog.address_of(name).unwrap() < slot);
        }
    }

    #[test]
    fn address_space_overflow_is_rejected() {
        let engine = ProcessorEngine::reduced12();
        // 40 two-word statements push the data segment past 6 bits.
        let mut source = String::new();
        for i in 0..40 {
            source.push_str(&format!("v{i} = 1\n"));
        }
        let program = parse_program(&source).unwrap();
        let linear = linearize(&program, &engine).unwrap();
        assert!(matches!(
            generate(&linear, &engine),
            Err(Error::AddressOutOfRange { .. })
        ));
    }

    #[test]
    fn image_is_code_then_data() {
        let engine = ProcessorEngine::standard16();
        let prog = compile("x = 7\n", &engine);
        let image = prog.as_integers();
        assert_eq!(image.len(), prog.code_len() + 1);
        assert_eq!(image[prog.address_of("x").unwrap()], 0);
    }

    #[test]
    fn negative_initial_values_are_masked() {
        let engine = ProcessorEngine::standard16();
        // -300 cannot ride inline, so it lives in a constant cell whose
        // image value is the two's-complement word.
        let prog = compile("x = y * -300\n", &engine);
        let c = prog.address_of("#-300").unwrap();
        assert_eq!(prog.as_integers()[c], 0x10000 - 300);
    }
}
