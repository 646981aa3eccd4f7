//! The memory window and register file of the simulator.

use super::SimErr;
use crate::ast::Reg;

/// The simulator's word-addressed memory window.
///
/// The window covers `len` 32-bit words starting at a physical base address.
/// Accesses are validated eagerly: the address must be word-aligned and fall
/// inside the window, otherwise the access raises a [`SimErr`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mem {
    base: u32,
    words: Box<[u32]>,
}

impl Mem {
    /// Creates a zero-filled memory window of `len` words starting at `base`.
    pub fn new(base: u32, len: usize) -> Self {
        Self {
            base,
            words: vec![0; len].into_boxed_slice(),
        }
    }

    /// The physical address of the first word of the window.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// The number of words in the window.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the window holds no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Converts a physical address into an index into the window,
    /// raising an error if the address is misaligned or outside the window.
    fn index(&self, addr: u32) -> Result<usize, SimErr> {
        if addr % 4 != 0 {
            return Err(SimErr::MisalignedAccess(addr));
        }
        let index = addr
            .checked_sub(self.base)
            .map(|off| (off / 4) as usize)
            .filter(|&i| i < self.words.len());

        index.ok_or(SimErr::AccessOutOfBounds(addr))
    }

    /// Reads the word at the given physical address.
    pub fn read(&self, addr: u32) -> Result<u32, SimErr> {
        Ok(self.words[self.index(addr)?])
    }

    /// Writes a word to the given physical address.
    pub fn write(&mut self, addr: u32, value: u32) -> Result<(), SimErr> {
        let index = self.index(addr)?;
        self.words[index] = value;
        Ok(())
    }

    /// Zeroes the entire window.
    pub fn reset(&mut self) {
        self.words.fill(0);
    }

    /// The window contents, indexed by word.
    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

/// The simulator's sixteen general-purpose registers.
///
/// Values are stored already truncated to 32 bits. Register numbers are only
/// range-checked here, at access time, so a decoded reference to `R20` fails
/// with [`SimErr::NoSuchRegister`] when it is first touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegFile {
    gpr: [u32; 16],
}

impl RegFile {
    /// Reads the value of the given register.
    pub fn get(&self, reg: Reg) -> Result<u32, SimErr> {
        self.gpr
            .get(usize::from(reg.number()))
            .copied()
            .ok_or(SimErr::NoSuchRegister(reg))
    }

    /// Writes a value to the given register.
    pub fn set(&mut self, reg: Reg, value: u32) -> Result<(), SimErr> {
        let slot = self.gpr
            .get_mut(usize::from(reg.number()))
            .ok_or(SimErr::NoSuchRegister(reg))?;
        *slot = value;
        Ok(())
    }

    /// Zeroes every register.
    pub fn reset(&mut self) {
        self.gpr = [0; 16];
    }

    /// The register values, indexed by register number.
    pub fn snapshot(&self) -> [u32; 16] {
        self.gpr
    }
}
