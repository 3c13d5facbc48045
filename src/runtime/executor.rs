//! Cycle-accurate executor
//!
//! Runs a binary memory image on a [`ProcessorEngine`] as a micro-step
//! state machine: fetch, read, decode, then one or two operation-specific
//! micro-states before the next fetch. Each [`step`](Executor::step) call
//! advances exactly one micro-state, so a front end can animate the
//! datapath or single-step whole instructions.
//!
//! Comparison flags are latched: `cmp` computes a difference, records
//! whether it was zero and whether its sign bit was clear, and discards
//! the value. Conditional jumps test only those two flags.

use super::components::{to_signed, to_unsigned, Memory, RegisterBank};
use crate::ir::Operator;
use crate::processor::{DecodedInstr, OpKey, ProcessorEngine};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Micro-state of the executor.
///
/// The numeric codes are part of the observable interface (front ends
/// key display updates on them): 0 through 8 for the active states, -1
/// once halted, -2 while starved for input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    /// Program counter on the address bus
    Fetch,
    /// Instruction word read, program counter incremented
    ReadInstr,
    /// Word decoded and dispatched
    Decode,
    /// Comparison difference computed, flags latched
    CmpExec,
    /// ALU result computed, flags latched
    Compute,
    /// Result written to its destination register
    Writeback,
    /// Register written to memory
    StoreBack,
    /// Memory cell written to a register
    LoadBack,
    /// Buffered input value consumed
    AwaitInput,
    /// Processor stopped
    Halted,
    /// Input requested but the buffer is empty
    WaitInput,
}

impl ExecState {
    /// Numeric state code
    pub fn code(self) -> i8 {
        match self {
            ExecState::Fetch => 0,
            ExecState::ReadInstr => 1,
            ExecState::Decode => 2,
            ExecState::CmpExec => 3,
            ExecState::Compute => 4,
            ExecState::Writeback => 5,
            ExecState::StoreBack => 6,
            ExecState::LoadBack => 7,
            ExecState::AwaitInput => 8,
            ExecState::Halted => -1,
            ExecState::WaitInput => -2,
        }
    }
}

/// One simulated machine running one loaded program
pub struct Executor {
    engine: ProcessorEngine,
    memory: Memory,
    registers: RegisterBank,
    pc: usize,
    state: ExecState,
    word: u64,
    instr: Option<DecodedInstr>,
    stash: u64,
    dst_latch: u8,
    is_zero: bool,
    is_pos: bool,
    input: VecDeque<u64>,
    screen: Vec<String>,
    cycles: u64,
}

impl Executor {
    /// A machine with `image` loaded at address zero; memory is padded
    /// with zeros to the engine's full address space.
    pub fn new(engine: ProcessorEngine, image: &[u64]) -> Self {
        let memory = Memory::with_image(image, engine.word_bits(), engine.max_address() + 1);
        let registers = RegisterBank::new(engine.register_count(), engine.word_bits());
        Self {
            memory,
            registers,
            pc: 0,
            state: ExecState::Fetch,
            word: 0,
            instr: None,
            stash: 0,
            dst_latch: 0,
            is_zero: false,
            is_pos: false,
            input: VecDeque::new(),
            screen: Vec::new(),
            cycles: 0,
            engine,
        }
    }

    /// Current micro-state
    pub fn state(&self) -> ExecState {
        self.state
    }

    /// Program counter
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Micro-steps executed so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Word held in register `n`
    pub fn register(&self, n: u8) -> u64 {
        self.registers.read(n)
    }

    /// Word held at memory address `addr`
    pub fn memory_word(&self, addr: usize) -> u64 {
        self.memory.read(addr)
    }

    /// Signed interpretation of the word at `addr`
    pub fn signed_memory(&self, addr: usize) -> i64 {
        to_signed(self.memory.read(addr), self.engine.word_bits())
    }

    /// Lines printed so far
    pub fn screen(&self) -> &[String] {
        &self.screen
    }

    /// Latched zero flag from the last compare or ALU result
    pub fn is_zero(&self) -> bool {
        self.is_zero
    }

    /// Latched sign flag; zero counts as positive.
    pub fn is_pos(&self) -> bool {
        self.is_pos
    }

    /// Queue one input value for the next `input` instruction.
    pub fn bufferize(&mut self, value: i64) {
        self.input
            .push_back(to_unsigned(value, self.engine.word_bits()));
    }

    /// Advance one micro-step.
    pub fn step(&mut self) {
        if self.state == ExecState::Halted {
            return;
        }
        self.cycles += 1;
        trace!(state = self.state.code(), pc = self.pc, "micro-step");
        match self.state {
            ExecState::Fetch => {
                // Address bus carries the program counter; nothing is
                // observable until the read completes.
                self.state = ExecState::ReadInstr;
            }
            ExecState::ReadInstr => {
                self.word = self.memory.read(self.pc);
                self.pc += 1;
                self.state = ExecState::Decode;
            }
            ExecState::Decode => self.dispatch(),
            ExecState::CmpExec => self.cmp_exec(),
            ExecState::Compute => self.compute(),
            ExecState::Writeback => {
                self.registers.write(self.dst_latch, self.stash);
                self.state = ExecState::Fetch;
            }
            ExecState::StoreBack => self.store_back(),
            ExecState::LoadBack => self.load_back(),
            ExecState::AwaitInput | ExecState::WaitInput => self.consume_input(),
            ExecState::Halted => {}
        }
    }

    /// Run micro-steps until the next instruction boundary: back at fetch,
    /// halted, or starved for input.
    pub fn instruction_step(&mut self) {
        loop {
            self.step();
            if matches!(
                self.state,
                ExecState::Fetch | ExecState::Halted | ExecState::WaitInput
            ) {
                return;
            }
        }
    }

    /// Run until the machine halts or starves for input.
    pub fn non_stop_run(&mut self) {
        loop {
            match self.state {
                ExecState::Halted => return,
                ExecState::WaitInput if self.input.is_empty() => return,
                _ => self.step(),
            }
        }
    }

    fn dispatch(&mut self) {
        let instr = self.engine.decode(self.word);
        let reg0 = instr.regs.first().copied().unwrap_or(0);
        let special = instr.special.unwrap_or(0);
        match instr.key {
            OpKey::Halt => {
                debug!(cycles = self.cycles, "halted");
                self.state = ExecState::Halted;
            }
            OpKey::Goto => {
                self.pc = special as usize;
                self.state = ExecState::Fetch;
            }
            OpKey::GotoIf(op) => {
                if self.flags_satisfy(op) {
                    self.pc = special as usize;
                }
                self.state = ExecState::Fetch;
            }
            OpKey::Cmp => {
                self.instr = Some(instr);
                self.state = ExecState::CmpExec;
            }
            OpKey::Print => {
                let value = to_signed(self.registers.read(reg0), self.engine.word_bits());
                debug!(value, "print");
                self.screen.push(value.to_string());
                self.state = ExecState::Fetch;
            }
            OpKey::Input => {
                self.instr = Some(instr);
                self.state = ExecState::AwaitInput;
            }
            OpKey::Load => {
                self.instr = Some(instr);
                self.state = ExecState::LoadBack;
            }
            OpKey::Store => {
                self.instr = Some(instr);
                self.state = ExecState::StoreBack;
            }
            OpKey::Move => {
                self.dst_latch = reg0;
                self.stash = self.registers.read(instr.regs.get(1).copied().unwrap_or(0));
                self.state = ExecState::Writeback;
            }
            OpKey::MoveLit => {
                self.dst_latch = reg0;
                self.stash = special;
                self.state = ExecState::Writeback;
            }
            OpKey::Alu(_) | OpKey::AluLit(_) => {
                self.instr = Some(instr);
                self.state = ExecState::Compute;
            }
        }
    }

    fn cmp_exec(&mut self) {
        let Some(instr) = self.instr.take() else {
            self.state = ExecState::Halted;
            return;
        };
        let bits = self.engine.word_bits();
        let a = to_signed(self.registers.read(instr.regs.first().copied().unwrap_or(0)), bits);
        let b = to_signed(self.registers.read(instr.regs.get(1).copied().unwrap_or(0)), bits);
        let diff = to_unsigned(a.wrapping_sub(b), bits);
        self.latch_flags(diff);
        self.state = ExecState::Fetch;
    }

    fn compute(&mut self) {
        let Some(instr) = self.instr.take() else {
            self.state = ExecState::Halted;
            return;
        };
        let (OpKey::Alu(op) | OpKey::AluLit(op)) = instr.key else {
            self.state = ExecState::Halted;
            return;
        };
        // A free-output engine names the destination register first; a
        // pinned one leaves it implicit.
        let (dst, base) = if self.engine.ual_output_is_free() {
            (instr.regs.first().copied().unwrap_or(0), 1)
        } else {
            (0, 0)
        };
        let a = self.registers.read(instr.regs.get(base).copied().unwrap_or(0));
        let b = match instr.key {
            OpKey::AluLit(_) => instr.special.unwrap_or(0),
            _ => self
                .registers
                .read(instr.regs.get(base + 1).copied().unwrap_or(0)),
        };
        let result = self.alu(op, a, b);
        self.latch_flags(result);
        self.stash = result;
        self.dst_latch = dst;
        self.state = ExecState::Writeback;
    }

    fn store_back(&mut self) {
        let Some(instr) = self.instr.take() else {
            self.state = ExecState::Halted;
            return;
        };
        let value = self.registers.read(instr.regs.first().copied().unwrap_or(0));
        self.memory.write(instr.special.unwrap_or(0) as usize, value);
        self.state = ExecState::Fetch;
    }

    fn load_back(&mut self) {
        let Some(instr) = self.instr.take() else {
            self.state = ExecState::Halted;
            return;
        };
        let value = self.memory.read(instr.special.unwrap_or(0) as usize);
        self.registers
            .write(instr.regs.first().copied().unwrap_or(0), value);
        self.state = ExecState::Fetch;
    }

    /// Shared by the 8 and -2 states: consume one buffered value or park
    /// in the wait state until one arrives.
    fn consume_input(&mut self) {
        let Some(value) = self.input.pop_front() else {
            self.state = ExecState::WaitInput;
            return;
        };
        let addr = self
            .instr
            .take()
            .and_then(|i| i.special)
            .unwrap_or(0) as usize;
        self.memory.write(addr, value);
        self.state = ExecState::Fetch;
    }

    fn latch_flags(&mut self, word: u64) {
        let bits = self.engine.word_bits();
        self.is_zero = word == 0;
        self.is_pos = to_signed(word, bits) >= 0;
    }

    fn flags_satisfy(&self, op: Operator) -> bool {
        match op {
            Operator::Eq => self.is_zero,
            Operator::Ne => !self.is_zero,
            Operator::Lt => !self.is_pos,
            Operator::Le => !self.is_pos || self.is_zero,
            Operator::Gt => self.is_pos && !self.is_zero,
            Operator::Ge => self.is_pos,
            _ => false,
        }
    }

    fn alu(&self, op: Operator, a: u64, b: u64) -> u64 {
        let bits = self.engine.word_bits();
        let sa = to_signed(a, bits);
        let sb = to_signed(b, bits);
        match op {
            Operator::Add => to_unsigned(sa.wrapping_add(sb), bits),
            Operator::Sub => to_unsigned(sa.wrapping_sub(sb), bits),
            Operator::Mul => to_unsigned(sa.wrapping_mul(sb), bits),
            // Division and modulo by zero yield zero rather than fault.
            Operator::Div => {
                if sb == 0 {
                    0
                } else {
                    to_unsigned(sa.wrapping_div(sb), bits)
                }
            }
            Operator::Mod => {
                if sb == 0 {
                    0
                } else {
                    to_unsigned(sa.wrapping_rem(sb), bits)
                }
            }
            Operator::BitAnd => a & b,
            Operator::BitOr => a | b,
            Operator::BitXor => a ^ b,
            Operator::Neg => to_unsigned(sa.wrapping_neg(), bits),
            Operator::BitNot => to_unsigned(!(a as i64), bits),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Operator;

    fn standard16() -> ProcessorEngine {
        ProcessorEngine::standard16()
    }

    fn word(engine: &ProcessorEngine, key: OpKey, regs: &[u8], special: Option<u64>) -> u64 {
        engine.encode(key, regs, special).unwrap()
    }

    #[test]
    fn move_literal_takes_four_micro_steps() {
        let engine = standard16();
        let image = [
            word(&engine, OpKey::MoveLit, &[1], Some(5)),
            word(&engine, OpKey::Halt, &[], None),
        ];
        let mut exec = Executor::new(engine, &image);
        assert_eq!(exec.state().code(), 0);
        exec.step();
        assert_eq!(exec.state().code(), 1);
        exec.step();
        assert_eq!(exec.state().code(), 2);
        exec.step();
        assert_eq!(exec.state().code(), 5);
        exec.step();
        assert_eq!(exec.state().code(), 0);
        assert_eq!(exec.register(1), 5);
        assert_eq!(exec.cycles(), 4);
    }

    #[test]
    fn equal_comparison_takes_the_branch() {
        let engine = standard16();
        let image = [
            word(&engine, OpKey::MoveLit, &[0], Some(3)),
            word(&engine, OpKey::MoveLit, &[1], Some(3)),
            word(&engine, OpKey::Cmp, &[0, 1], None),
            word(&engine, OpKey::GotoIf(Operator::Eq), &[], Some(5)),
            word(&engine, OpKey::Halt, &[], None),
            word(&engine, OpKey::MoveLit, &[2], Some(9)),
            word(&engine, OpKey::Halt, &[], None),
        ];
        let mut exec = Executor::new(engine, &image);
        exec.non_stop_run();
        assert_eq!(exec.register(2), 9);
        assert_eq!(exec.state(), ExecState::Halted);
    }

    #[test]
    fn unequal_comparison_falls_through() {
        let engine = standard16();
        let image = [
            word(&engine, OpKey::MoveLit, &[0], Some(3)),
            word(&engine, OpKey::MoveLit, &[1], Some(4)),
            word(&engine, OpKey::Cmp, &[0, 1], None),
            word(&engine, OpKey::GotoIf(Operator::Eq), &[], Some(5)),
            word(&engine, OpKey::Halt, &[], None),
            word(&engine, OpKey::MoveLit, &[2], Some(9)),
        ];
        let mut exec = Executor::new(engine, &image);
        exec.non_stop_run();
        assert_eq!(exec.register(2), 0);
    }

    #[test]
    fn negative_difference_sets_lt_not_gt() {
        let engine = standard16();
        // 2 < 7: JMPG must fall through, JMPL must jump.
        let image = [
            word(&engine, OpKey::MoveLit, &[0], Some(2)),
            word(&engine, OpKey::MoveLit, &[1], Some(7)),
            word(&engine, OpKey::Cmp, &[0, 1], None),
            word(&engine, OpKey::GotoIf(Operator::Gt), &[], Some(7)),
            word(&engine, OpKey::GotoIf(Operator::Lt), &[], Some(6)),
            word(&engine, OpKey::Halt, &[], None),
            word(&engine, OpKey::MoveLit, &[2], Some(1)),
            word(&engine, OpKey::Halt, &[], None),
        ];
        let mut exec = Executor::new(engine, &image);
        exec.non_stop_run();
        assert_eq!(exec.register(2), 1);
    }

    #[test]
    fn latched_flags_are_readable_after_a_compare() {
        let engine = standard16();
        // 2 - 7 is negative: neither zero nor positive.
        let image = [
            word(&engine, OpKey::MoveLit, &[0], Some(2)),
            word(&engine, OpKey::MoveLit, &[1], Some(7)),
            word(&engine, OpKey::Cmp, &[0, 1], None),
            word(&engine, OpKey::Halt, &[], None),
        ];
        let mut exec = Executor::new(engine.clone(), &image);
        exec.non_stop_run();
        assert!(!exec.is_zero());
        assert!(!exec.is_pos());

        // Equal operands: zero difference counts as positive.
        let image = [
            word(&engine, OpKey::MoveLit, &[0], Some(5)),
            word(&engine, OpKey::MoveLit, &[1], Some(5)),
            word(&engine, OpKey::Cmp, &[0, 1], None),
            word(&engine, OpKey::Halt, &[], None),
        ];
        let mut exec = Executor::new(engine, &image);
        exec.non_stop_run();
        assert!(exec.is_zero());
        assert!(exec.is_pos());
    }

    #[test]
    fn move_does_not_disturb_latched_flags() {
        let engine = standard16();
        // Flags latched by the compare survive the interleaved moves.
        let image = [
            word(&engine, OpKey::MoveLit, &[0], Some(3)),
            word(&engine, OpKey::MoveLit, &[1], Some(3)),
            word(&engine, OpKey::Cmp, &[0, 1], None),
            word(&engine, OpKey::MoveLit, &[3], Some(1)),
            word(&engine, OpKey::Move, &[4, 3], None),
            word(&engine, OpKey::GotoIf(Operator::Eq), &[], Some(7)),
            word(&engine, OpKey::Halt, &[], None),
            word(&engine, OpKey::MoveLit, &[2], Some(9)),
            word(&engine, OpKey::Halt, &[], None),
        ];
        let mut exec = Executor::new(engine, &image);
        exec.non_stop_run();
        assert_eq!(exec.register(2), 9);
    }

    #[test]
    fn unmatched_word_halts_the_machine() {
        let engine = standard16();
        let mut exec = Executor::new(engine, &[0b0111_1000_0000_0000]);
        exec.non_stop_run();
        assert_eq!(exec.state(), ExecState::Halted);
    }

    #[test]
    fn division_by_zero_yields_zero() {
        let engine = standard16();
        let image = [
            word(&engine, OpKey::MoveLit, &[1], Some(8)),
            word(&engine, OpKey::MoveLit, &[2], Some(0)),
            word(&engine, OpKey::Alu(Operator::Div), &[0, 1, 2], None),
            word(&engine, OpKey::Print, &[0], None),
            word(&engine, OpKey::Alu(Operator::Mod), &[0, 1, 2], None),
            word(&engine, OpKey::Print, &[0], None),
            word(&engine, OpKey::Halt, &[], None),
        ];
        let mut exec = Executor::new(engine, &image);
        exec.non_stop_run();
        assert_eq!(exec.screen(), ["0", "0"]);
    }

    #[test]
    fn print_shows_signed_values() {
        let engine = standard16();
        let image = [
            word(&engine, OpKey::MoveLit, &[1], Some(0)),
            word(&engine, OpKey::AluLit(Operator::Sub), &[0, 1], Some(3)),
            word(&engine, OpKey::Print, &[0], None),
            word(&engine, OpKey::Halt, &[], None),
        ];
        let mut exec = Executor::new(engine, &image);
        exec.non_stop_run();
        assert_eq!(exec.screen(), ["-3"]);
    }

    #[test]
    fn input_starves_then_resumes() {
        let engine = standard16();
        let image = [
            word(&engine, OpKey::Input, &[], Some(3)),
            word(&engine, OpKey::Halt, &[], None),
        ];
        let mut exec = Executor::new(engine, &image);
        exec.non_stop_run();
        assert_eq!(exec.state().code(), -2);

        exec.bufferize(42);
        exec.step();
        assert_eq!(exec.state().code(), 0);
        assert_eq!(exec.memory_word(3), 42);
        exec.non_stop_run();
        assert_eq!(exec.state(), ExecState::Halted);
    }

    #[test]
    fn buffered_input_consumed_without_waiting() {
        let engine = standard16();
        let image = [
            word(&engine, OpKey::Input, &[], Some(2)),
            word(&engine, OpKey::Halt, &[], None),
        ];
        let mut exec = Executor::new(engine, &image);
        exec.bufferize(7);
        exec.non_stop_run();
        assert_eq!(exec.state(), ExecState::Halted);
        assert_eq!(exec.memory_word(2), 7);
    }

    #[test]
    fn fixed_output_engine_computes_into_r0() {
        let engine = ProcessorEngine::reduced12();
        let image = [
            word(&engine, OpKey::MoveLit, &[1], Some(5)),
            word(&engine, OpKey::MoveLit, &[2], Some(3)),
            word(&engine, OpKey::Alu(Operator::Sub), &[1, 2], None),
            word(&engine, OpKey::Halt, &[], None),
        ];
        let mut exec = Executor::new(engine, &image);
        exec.non_stop_run();
        assert_eq!(exec.register(0), 2);
        assert_eq!(exec.register(1), 5);
    }

    #[test]
    fn halted_machine_ignores_further_steps() {
        let engine = standard16();
        let mut exec = Executor::new(engine, &[word(&standard16(), OpKey::Halt, &[], None)]);
        exec.non_stop_run();
        let cycles = exec.cycles();
        exec.step();
        exec.instruction_step();
        assert_eq!(exec.cycles(), cycles);
        assert_eq!(exec.state(), ExecState::Halted);
    }
}
