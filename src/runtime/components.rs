//! Datapath components
//!
//! Word-width arithmetic helpers plus the two storage blocks of the
//! simulated machine. Every value held in memory or a register is a raw
//! word; signedness is an interpretation applied at the ALU and on the
//! output device.

/// All-ones mask for a word of `bits` width
pub fn word_mask(bits: u8) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Two's-complement interpretation of a word
pub fn to_signed(word: u64, bits: u8) -> i64 {
    if bits >= 64 {
        return word as i64;
    }
    let word = word & word_mask(bits);
    if word & (1u64 << (bits - 1)) != 0 {
        word as i64 - (1i64 << bits)
    } else {
        word as i64
    }
}

/// Wrap a signed value into a word
pub fn to_unsigned(value: i64, bits: u8) -> u64 {
    (value as u64) & word_mask(bits)
}

/// Word-addressed memory block.
///
/// Out-of-range reads return zero and out-of-range writes are dropped;
/// execution of a malformed binary never panics.
pub struct Memory {
    cells: Vec<u64>,
    mask: u64,
}

impl Memory {
    /// Memory preloaded with `image`, padded with zeros to `min_cells`.
    pub fn with_image(image: &[u64], word_bits: u8, min_cells: usize) -> Self {
        let mask = word_mask(word_bits);
        let mut cells: Vec<u64> = image.iter().map(|&w| w & mask).collect();
        if cells.len() < min_cells {
            cells.resize(min_cells, 0);
        }
        Self { cells, mask }
    }

    /// Word at `addr`
    pub fn read(&self, addr: usize) -> u64 {
        self.cells.get(addr).copied().unwrap_or(0)
    }

    /// Write a word to `addr`
    pub fn write(&mut self, addr: usize, value: u64) {
        if let Some(cell) = self.cells.get_mut(addr) {
            *cell = value & self.mask;
        }
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when the memory holds no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Register bank
pub struct RegisterBank {
    regs: Vec<u64>,
    mask: u64,
}

impl RegisterBank {
    /// `count` registers cleared to zero
    pub fn new(count: u8, word_bits: u8) -> Self {
        Self {
            regs: vec![0; count as usize],
            mask: word_mask(word_bits),
        }
    }

    /// Word in register `n`
    pub fn read(&self, n: u8) -> u64 {
        self.regs.get(n as usize).copied().unwrap_or(0)
    }

    /// Write a word to register `n`
    pub fn write(&mut self, n: u8, value: u64) {
        if let Some(reg) = self.regs.get_mut(n as usize) {
            *reg = value & self.mask;
        }
    }
}
