//! # Processor engine models
//!
//! A [`ProcessorEngine`] is a declarative description of one target CPU:
//! register count, word size, instruction table, and encoding layouts. The
//! compiler asks it what is encodable, the assembler asks it for words and
//! mnemonics, and the executor asks it to decode fetched words.
//!
//! Instruction layouts are described as data (opcode bit strings plus
//! operand field kinds) and parsed once at construction into typed field
//! descriptors; nothing re-parses strings on the encode or decode path.

use crate::error::{Error, Result};
use crate::ir::Operator;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Operand field kind inside an instruction word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Register number, `register_address_bits` wide
    Reg,
    /// Absolute memory address, `address_bits` wide
    Addr,
    /// Inline literal, as wide as the bits left over in the word
    Lit,
}

/// Instruction selection key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKey {
    /// Stop the processor
    Halt,
    /// Unconditional jump
    Goto,
    /// Conditional jump on the latched flags of the last comparison
    GotoIf(Operator),
    /// Compare two registers, latching flags and discarding the result
    Cmp,
    /// Write a register to the output device
    Print,
    /// Read one buffered input value into memory
    Input,
    /// Memory cell into register
    Load,
    /// Register into memory cell
    Store,
    /// Register-to-register copy
    Move,
    /// Inline literal into register
    MoveLit,
    /// ALU operation over registers
    Alu(Operator),
    /// ALU operation with an inline right literal
    AluLit(Operator),
}

impl OpKey {
    fn describe(self) -> String {
        match self {
            OpKey::Halt => "halt".into(),
            OpKey::Goto => "goto".into(),
            OpKey::GotoIf(op) => format!("goto-if {}", op.symbol()),
            OpKey::Cmp => "cmp".into(),
            OpKey::Print => "print".into(),
            OpKey::Input => "input".into(),
            OpKey::Load => "load".into(),
            OpKey::Store => "store".into(),
            OpKey::Move => "move".into(),
            OpKey::MoveLit => "move-literal".into(),
            OpKey::Alu(op) => format!("alu {}", op.symbol()),
            OpKey::AluLit(op) => format!("alu-literal {}", op.symbol()),
        }
    }
}

/// One declarative instruction table entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrDef {
    /// Selection key
    pub key: OpKey,
    /// Assembly mnemonic
    pub mnemonic: String,
    /// Literal opcode bits, MSB-first
    pub opcode: String,
    /// Operand field kinds, in assembly operand order
    pub operands: Vec<FieldKind>,
}

/// Declarative description of a whole CPU variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineDef {
    /// Engine name (for diagnostics)
    pub name: String,
    /// Instruction and data word width in bits
    pub word_bits: u8,
    /// Register address width; register count is `2^register_address_bits`
    pub register_address_bits: u8,
    /// Memory address field width
    pub address_bits: u8,
    /// True when ALU results can land in any register; false pins them to r0
    pub ual_output_is_free: bool,
    /// Instruction table
    pub instructions: Vec<InstrDef>,
}

/// Typed operand field: kind, width and LSB position within the word
#[derive(Debug, Clone, Copy)]
struct Field {
    kind: FieldKind,
    width: u8,
    shift: u8,
}

/// Parsed instruction layout
#[derive(Debug, Clone)]
struct InstrLayout {
    key: OpKey,
    mnemonic: String,
    opcode_len: u8,
    opcode_mask: u64,
    opcode_value: u64,
    fields: Vec<Field>,
}

/// Decoded instruction word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstr {
    /// Selection key of the matched table entry
    pub key: OpKey,
    /// Register operands, in field order
    pub regs: Vec<u8>,
    /// Address or literal operand, when the layout carries one
    pub special: Option<u64>,
    /// Width of the special field in bits (0 when absent)
    pub special_bits: u8,
}

/// A concrete CPU variant, ready for encoding, decoding and resource queries
#[derive(Debug, Clone)]
pub struct ProcessorEngine {
    name: String,
    word_bits: u8,
    register_address_bits: u8,
    address_bits: u8,
    ual_output_is_free: bool,
    layouts: Vec<InstrLayout>,
    by_key: HashMap<OpKey, usize>,
    decode_order: Vec<usize>,
}

impl ProcessorEngine {
    /// Build an engine from its declarative description.
    ///
    /// Parses every opcode template into a typed field layout and validates
    /// the minimal instruction set the compiler relies on.
    pub fn from_def(def: EngineDef) -> Result<Self> {
        if def.word_bits == 0 || def.word_bits > 64 {
            return Err(Error::model("word width must be between 1 and 64 bits"));
        }
        let mut layouts = Vec::with_capacity(def.instructions.len());
        let mut by_key = HashMap::new();
        for instr in &def.instructions {
            let layout = parse_layout(&def, instr)?;
            if by_key.insert(instr.key, layouts.len()).is_some() {
                return Err(Error::model(format!(
                    "duplicate instruction entry for '{}'",
                    instr.key.describe()
                )));
            }
            layouts.push(layout);
        }

        for required in [OpKey::Halt, OpKey::Goto, OpKey::Cmp, OpKey::Load, OpKey::Store,
            OpKey::Move, OpKey::MoveLit]
        {
            if !by_key.contains_key(&required) {
                return Err(Error::model(format!(
                    "engine '{}' is missing the '{}' instruction",
                    def.name,
                    required.describe()
                )));
            }
        }
        if !by_key.keys().any(|k| matches!(k, OpKey::GotoIf(_))) {
            return Err(Error::model(format!(
                "engine '{}' has no conditional jump",
                def.name
            )));
        }

        // Longest opcode first so a subop family never shadows its prefix.
        let mut decode_order: Vec<usize> = (0..layouts.len()).collect();
        decode_order.sort_by_key(|&i| std::cmp::Reverse(layouts[i].opcode_len));

        Ok(Self {
            name: def.name,
            word_bits: def.word_bits,
            register_address_bits: def.register_address_bits,
            address_bits: def.address_bits,
            ual_output_is_free: def.ual_output_is_free,
            layouts,
            by_key,
            decode_order,
        })
    }

    /// Build an engine from a JSON description
    pub fn from_json(json: &str) -> Result<Self> {
        let def: EngineDef =
            serde_json::from_str(json).map_err(|e| Error::model(e.to_string()))?;
        Self::from_def(def)
    }

    /// The 16-bit reference engine: 8 registers, 8-bit addresses, freely
    /// selectable ALU output, inline ALU literals for `+ - * / %`.
    pub fn standard16() -> Self {
        Self::from_def(standard16_def()).expect("built-in engine definition is valid")
    }

    /// The 12-bit reference engine: 4 registers, 6-bit addresses, ALU
    /// output pinned to r0, no inline ALU literals, comparisons limited to
    /// `==` and `<`.
    pub fn reduced12() -> Self {
        Self::from_def(reduced12_def()).expect("built-in engine definition is valid")
    }

    /// Engine name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Word width in bits
    pub fn word_bits(&self) -> u8 {
        self.word_bits
    }

    /// Number of machine registers
    pub fn register_count(&self) -> u8 {
        1 << self.register_address_bits
    }

    /// Address field width in bits
    pub fn address_bits(&self) -> u8 {
        self.address_bits
    }

    /// Largest encodable absolute address
    pub fn max_address(&self) -> usize {
        (1usize << self.address_bits) - 1
    }

    /// True when ALU results can land in any register
    pub fn ual_output_is_free(&self) -> bool {
        self.ual_output_is_free
    }

    /// Inline-literal domain of the ALU forms, `None` when the engine has
    /// no ALU-with-literal instruction at all.
    pub fn literal_domain(&self) -> Option<(i64, i64)> {
        self.layouts
            .iter()
            .filter(|l| matches!(l.key, OpKey::AluLit(_)))
            .filter_map(|l| l.fields.iter().find(|f| f.kind == FieldKind::Lit))
            .map(|f| (0i64, (1i64 << f.width) - 1))
            .reduce(|(_, a), (_, b)| (0, a.min(b)))
    }

    /// Comparison operators with a conditional-jump encoding
    pub fn supported_comparisons(&self) -> Vec<Operator> {
        self.layouts
            .iter()
            .filter_map(|l| match l.key {
                OpKey::GotoIf(op) => Some(op),
                _ => None,
            })
            .collect()
    }

    /// True when `op` has an inline-literal form and `lit` fits the bits
    /// left over in that instruction's word.
    pub fn literal_operator_available(&self, op: Operator, lit: i64) -> bool {
        let Some(&idx) = self.by_key.get(&OpKey::AluLit(op)) else {
            return false;
        };
        let Some(field) = self.layouts[idx]
            .fields
            .iter()
            .find(|f| f.kind == FieldKind::Lit)
        else {
            return false;
        };
        lit >= 0 && lit < (1i64 << field.width)
    }

    /// True when `lit` fits the move-literal instruction's field
    pub fn can_move_literal(&self, lit: i64) -> bool {
        let Some(&idx) = self.by_key.get(&OpKey::MoveLit) else {
            return false;
        };
        let Some(field) = self.layouts[idx]
            .fields
            .iter()
            .find(|f| f.kind == FieldKind::Lit)
        else {
            return false;
        };
        lit >= 0 && lit < (1i64 << field.width)
    }

    /// Assembly mnemonic for an operation
    pub fn mnemonic(&self, key: OpKey) -> Result<&str> {
        self.by_key
            .get(&key)
            .map(|&i| self.layouts[i].mnemonic.as_str())
            .ok_or_else(|| Error::UnsupportedOperation {
                engine: self.name.clone(),
                operation: key.describe(),
            })
    }

    /// True when the engine defines an encoding for `key`
    pub fn supports(&self, key: OpKey) -> bool {
        self.by_key.contains_key(&key)
    }

    /// Encode one instruction word.
    ///
    /// `regs` fill the register fields in order; `special` fills the single
    /// address or literal field when the layout has one. Values that do not
    /// fit their field are hard errors, never truncated.
    pub fn encode(&self, key: OpKey, regs: &[u8], special: Option<u64>) -> Result<u64> {
        let &idx = self
            .by_key
            .get(&key)
            .ok_or_else(|| Error::UnsupportedOperation {
                engine: self.name.clone(),
                operation: key.describe(),
            })?;
        let layout = &self.layouts[idx];

        let mut word = layout.opcode_value;
        let mut reg_iter = regs.iter();
        let mut special = special;
        for field in &layout.fields {
            let value = match field.kind {
                FieldKind::Reg => *reg_iter.next().ok_or_else(|| {
                    Error::internal(format!(
                        "missing register operand encoding '{}'",
                        key.describe()
                    ))
                })? as u64,
                FieldKind::Addr => {
                    let addr = special.take().ok_or_else(|| {
                        Error::internal(format!(
                            "missing address operand encoding '{}'",
                            key.describe()
                        ))
                    })?;
                    if addr >= (1u64 << field.width) {
                        return Err(Error::AddressOutOfRange {
                            address: addr as usize,
                            bits: field.width,
                        });
                    }
                    addr
                }
                FieldKind::Lit => {
                    let lit = special.take().ok_or_else(|| {
                        Error::internal(format!(
                            "missing literal operand encoding '{}'",
                            key.describe()
                        ))
                    })?;
                    if lit >= (1u64 << field.width) {
                        return Err(Error::LiteralTooWide {
                            value: lit as i64,
                            bits: field.width,
                        });
                    }
                    lit
                }
            };
            if field.kind == FieldKind::Reg && value >= u64::from(self.register_count()) {
                return Err(Error::internal(format!("register r{value} does not exist")));
            }
            word |= value << field.shift;
        }
        Ok(word)
    }

    /// Decode one instruction word.
    ///
    /// A word matching no table entry decodes to `halt`; runtime execution
    /// never raises on malformed binaries.
    pub fn decode(&self, word: u64) -> DecodedInstr {
        for &idx in &self.decode_order {
            let layout = &self.layouts[idx];
            if word & layout.opcode_mask != layout.opcode_value {
                continue;
            }
            let mut regs = Vec::new();
            let mut special = None;
            let mut special_bits = 0;
            for field in &layout.fields {
                let value = (word >> field.shift) & ((1u64 << field.width) - 1);
                match field.kind {
                    FieldKind::Reg => regs.push(value as u8),
                    FieldKind::Addr | FieldKind::Lit => {
                        special = Some(value);
                        special_bits = field.width;
                    }
                }
            }
            return DecodedInstr {
                key: layout.key,
                regs,
                special,
                special_bits,
            };
        }
        DecodedInstr {
            key: OpKey::Halt,
            regs: Vec::new(),
            special: None,
            special_bits: 0,
        }
    }

    /// Render a word as a fixed-width MSB-first bit string
    pub fn format_word(&self, word: u64) -> String {
        format!("{:0width$b}", word, width = self.word_bits as usize)
    }
}

/// Parse one table entry into a typed layout.
///
/// The opcode occupies the most significant bits; operand fields pack
/// toward bit 0 in declaration order; whatever lies between is don't-care
/// padding (emitted as zero). A `Lit` field absorbs every leftover bit,
/// which is exactly the literal-eligibility rule.
fn parse_layout(def: &EngineDef, instr: &InstrDef) -> Result<InstrLayout> {
    let word = def.word_bits;
    let opcode_len = instr.opcode.len() as u8;
    if opcode_len == 0 || opcode_len > word {
        return Err(Error::model(format!(
            "opcode '{}' does not fit a {word}-bit word",
            instr.opcode
        )));
    }
    let mut opcode_value = 0u64;
    for c in instr.opcode.chars() {
        opcode_value <<= 1;
        match c {
            '0' => {}
            '1' => opcode_value |= 1,
            _ => {
                return Err(Error::model(format!(
                    "opcode '{}' may only contain 0 and 1",
                    instr.opcode
                )));
            }
        }
    }
    opcode_value <<= word - opcode_len;
    let opcode_mask = (((1u64 << opcode_len) - 1) << (word - opcode_len)) as u64;

    let mut fixed: u8 = 0;
    let mut lit_count = 0;
    for kind in &instr.operands {
        match kind {
            FieldKind::Reg => fixed += def.register_address_bits,
            FieldKind::Addr => fixed += def.address_bits,
            FieldKind::Lit => lit_count += 1,
        }
    }
    if lit_count > 1 {
        return Err(Error::model(format!(
            "instruction '{}' declares more than one literal field",
            instr.mnemonic
        )));
    }
    let available = word - opcode_len;
    if fixed > available {
        return Err(Error::model(format!(
            "operand fields of '{}' overflow the instruction word",
            instr.mnemonic
        )));
    }
    let lit_width = available - fixed;
    if lit_count == 1 && lit_width == 0 {
        return Err(Error::model(format!(
            "no bits left for the literal field of '{}'",
            instr.mnemonic
        )));
    }

    // Fields pack toward bit 0; remaining don't-care bits sit just after
    // the opcode.
    let mut fields = Vec::with_capacity(instr.operands.len());
    let mut remaining: u8 = instr
        .operands
        .iter()
        .map(|k| match k {
            FieldKind::Reg => def.register_address_bits,
            FieldKind::Addr => def.address_bits,
            FieldKind::Lit => lit_width,
        })
        .sum();
    for kind in &instr.operands {
        let width = match kind {
            FieldKind::Reg => def.register_address_bits,
            FieldKind::Addr => def.address_bits,
            FieldKind::Lit => lit_width,
        };
        remaining -= width;
        fields.push(Field {
            kind: *kind,
            width,
            shift: remaining,
        });
    }

    Ok(InstrLayout {
        key: instr.key,
        mnemonic: instr.mnemonic.clone(),
        opcode_len,
        opcode_mask,
        opcode_value,
        fields,
    })
}

fn entry(key: OpKey, mnemonic: &str, opcode: &str, operands: &[FieldKind]) -> InstrDef {
    InstrDef {
        key,
        mnemonic: mnemonic.to_string(),
        opcode: opcode.to_string(),
        operands: operands.to_vec(),
    }
}

/// Declarative table of the 16-bit reference engine
pub fn standard16_def() -> EngineDef {
    use FieldKind::{Addr, Lit, Reg};
    use OpKey::*;
    EngineDef {
        name: "standard16".into(),
        word_bits: 16,
        register_address_bits: 3,
        address_bits: 8,
        ual_output_is_free: true,
        instructions: vec![
            entry(Halt, "HALT", "00000", &[]),
            entry(Goto, "JMP", "00001", &[Addr]),
            entry(GotoIf(Operator::Eq), "JMPE", "00010", &[Addr]),
            entry(GotoIf(Operator::Lt), "JMPL", "00011", &[Addr]),
            entry(GotoIf(Operator::Gt), "JMPG", "00100", &[Addr]),
            entry(GotoIf(Operator::Ne), "JMPN", "00101", &[Addr]),
            entry(Cmp, "CMP", "00110", &[Reg, Reg]),
            entry(Print, "PRINT", "00111", &[Reg]),
            entry(Input, "INPUT", "01000", &[Addr]),
            entry(Load, "LOAD", "01001", &[Reg, Addr]),
            entry(Store, "STORE", "01010", &[Reg, Addr]),
            entry(Move, "MOVE", "01011", &[Reg, Reg]),
            entry(MoveLit, "MOVE", "01100", &[Reg, Lit]),
            entry(Alu(Operator::Add), "ADD", "10000", &[Reg, Reg, Reg]),
            entry(Alu(Operator::Sub), "SUB", "10001", &[Reg, Reg, Reg]),
            entry(Alu(Operator::Mul), "MULT", "10010", &[Reg, Reg, Reg]),
            entry(Alu(Operator::Div), "DIV", "10011", &[Reg, Reg, Reg]),
            entry(Alu(Operator::Mod), "MOD", "10100", &[Reg, Reg, Reg]),
            entry(Alu(Operator::BitAnd), "AND", "10101", &[Reg, Reg, Reg]),
            entry(Alu(Operator::BitOr), "OR", "10110", &[Reg, Reg, Reg]),
            entry(Alu(Operator::BitXor), "XOR", "10111", &[Reg, Reg, Reg]),
            entry(Alu(Operator::Neg), "NEG", "11000", &[Reg, Reg]),
            entry(Alu(Operator::BitNot), "INV", "11001", &[Reg, Reg]),
            entry(AluLit(Operator::Add), "ADD", "11010", &[Reg, Reg, Lit]),
            entry(AluLit(Operator::Sub), "SUB", "11011", &[Reg, Reg, Lit]),
            entry(AluLit(Operator::Mul), "MULT", "11100", &[Reg, Reg, Lit]),
            entry(AluLit(Operator::Div), "DIV", "11101", &[Reg, Reg, Lit]),
            entry(AluLit(Operator::Mod), "MOD", "11110", &[Reg, Reg, Lit]),
        ],
    }
}

/// Declarative table of the 12-bit reference engine
pub fn reduced12_def() -> EngineDef {
    use FieldKind::{Addr, Lit, Reg};
    use OpKey::*;
    EngineDef {
        name: "reduced12".into(),
        word_bits: 12,
        register_address_bits: 2,
        address_bits: 6,
        ual_output_is_free: false,
        instructions: vec![
            entry(Halt, "HALT", "0000", &[]),
            entry(Goto, "JMP", "0001", &[Addr]),
            entry(GotoIf(Operator::Eq), "JMPE", "0010", &[Addr]),
            entry(GotoIf(Operator::Lt), "JMPL", "0011", &[Addr]),
            entry(Cmp, "CMP", "0100", &[Reg, Reg]),
            entry(Print, "PRINT", "0101", &[Reg]),
            entry(Input, "INPUT", "0110", &[Addr]),
            entry(Load, "LOAD", "0111", &[Reg, Addr]),
            entry(Store, "STORE", "1000", &[Reg, Addr]),
            entry(Move, "MOVE", "1001", &[Reg, Reg]),
            entry(MoveLit, "MOVE", "1010", &[Reg, Lit]),
            entry(Alu(Operator::Neg), "NEG", "1011", &[Reg]),
            entry(Alu(Operator::Add), "ADD", "1100", &[Reg, Reg]),
            entry(Alu(Operator::Sub), "SUB", "1101", &[Reg, Reg]),
            entry(Alu(Operator::Mul), "MULT", "1110", &[Reg, Reg]),
            entry(Alu(Operator::Div), "DIV", "11110000", &[Reg, Reg]),
            entry(Alu(Operator::Mod), "MOD", "11110001", &[Reg, Reg]),
            entry(Alu(Operator::BitAnd), "AND", "11110010", &[Reg, Reg]),
            entry(Alu(Operator::BitOr), "OR", "11110011", &[Reg, Reg]),
            entry(Alu(Operator::BitXor), "XOR", "11110100", &[Reg, Reg]),
            entry(Alu(Operator::BitNot), "INV", "11110101", &[Reg]),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_engines_construct() {
        let e16 = ProcessorEngine::standard16();
        assert_eq!(e16.register_count(), 8);
        assert_eq!(e16.word_bits(), 16);
        assert!(e16.ual_output_is_free());
        assert_eq!(e16.literal_domain(), Some((0, 31)));

        let e12 = ProcessorEngine::reduced12();
        assert_eq!(e12.register_count(), 4);
        assert!(!e12.ual_output_is_free());
        assert_eq!(e12.literal_domain(), None);
        assert_eq!(
            e12.supported_comparisons(),
            vec![Operator::Eq, Operator::Lt]
        );
    }

    #[test]
    fn encode_known_words() {
        let e = ProcessorEngine::standard16();
        // LOAD r7, 0x12 -> 01001 111 00010010
        let word = e.encode(OpKey::Load, &[7], Some(0x12)).unwrap();
        assert_eq!(e.format_word(word), "0100111100010010");
        // ADD r2, r7, r6 -> 10000 XX 010 111 110 (padding after opcode)
        let word = e.encode(OpKey::Alu(Operator::Add), &[2, 7, 6], None).unwrap();
        assert_eq!(e.format_word(word), "1000000010111110");
    }

    /// Every instruction of both engines round-trips through encode/decode.
    #[test]
    fn round_trip_all_instructions() {
        for engine in [ProcessorEngine::standard16(), ProcessorEngine::reduced12()] {
            let defs = if engine.name() == "standard16" {
                standard16_def()
            } else {
                reduced12_def()
            };
            for instr in &defs.instructions {
                let mut regs = Vec::new();
                let mut special = None;
                for (i, kind) in instr.operands.iter().enumerate() {
                    match kind {
                        FieldKind::Reg => {
                            regs.push(((i as u8) + 1) % engine.register_count())
                        }
                        FieldKind::Addr => special = Some(5),
                        FieldKind::Lit => special = Some(3),
                    }
                }
                let word = engine.encode(instr.key, &regs, special).unwrap();
                let decoded = engine.decode(word);
                assert_eq!(decoded.key, instr.key, "{}", instr.mnemonic);
                assert_eq!(decoded.regs, regs, "{}", instr.mnemonic);
                assert_eq!(decoded.special, special, "{}", instr.mnemonic);
            }
        }
    }

    #[test]
    fn unmatched_word_decodes_to_halt() {
        let e = ProcessorEngine::standard16();
        // 01111... matches no opcode.
        let decoded = e.decode(0b0111100000000000);
        assert_eq!(decoded.key, OpKey::Halt);
    }

    #[test]
    fn literal_eligibility_follows_leftover_bits() {
        let e16 = ProcessorEngine::standard16();
        assert!(e16.literal_operator_available(Operator::Add, 31));
        assert!(!e16.literal_operator_available(Operator::Add, 32));
        assert!(!e16.literal_operator_available(Operator::Add, -1));
        assert!(!e16.literal_operator_available(Operator::BitAnd, 1));

        let e12 = ProcessorEngine::reduced12();
        assert!(!e12.literal_operator_available(Operator::Add, 1));
    }

    #[test]
    fn move_literal_range() {
        let e16 = ProcessorEngine::standard16();
        assert!(e16.can_move_literal(255));
        assert!(!e16.can_move_literal(256));
        assert!(!e16.can_move_literal(-1));

        let e12 = ProcessorEngine::reduced12();
        assert!(e12.can_move_literal(63));
        assert!(!e12.can_move_literal(64));
    }

    #[test]
    fn oversized_operands_are_rejected() {
        let e = ProcessorEngine::standard16();
        assert!(matches!(
            e.encode(OpKey::Goto, &[], Some(256)),
            Err(Error::AddressOutOfRange { .. })
        ));
        assert!(matches!(
            e.encode(OpKey::AluLit(Operator::Add), &[0, 1], Some(32)),
            Err(Error::LiteralTooWide { .. })
        ));
    }

    #[test]
    fn engine_from_json() {
        let json = serde_json::to_string(&standard16_def()).unwrap();
        let engine = ProcessorEngine::from_json(&json).unwrap();
        assert_eq!(engine.name(), "standard16");
        assert_eq!(engine.register_count(), 8);
    }

    #[test]
    fn missing_required_instruction_is_a_model_error() {
        let mut def = standard16_def();
        def.instructions.retain(|i| i.key != OpKey::Cmp);
        assert!(matches!(
            ProcessorEngine::from_def(def),
            Err(Error::ModelError(_))
        ));
    }
}
