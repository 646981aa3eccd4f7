//! Executing a decoded program.
//!
//! This module is used to execute [`Program`]s produced by the
//! [assembler](crate::asm).
//!
//! The simulator module notably consists of:
//! - [`Simulator`]: the struct that holds the state of the simulator and
//!   executes programs operation by operation
//! - [`Cpsr`]: the status register, which holds the N/Z/C/V condition flags
//! - [`SimConfig`]: the sizing of the simulator's memory window
//! - [`SimErr`]: the errors that can occur during execution

pub mod mem;

use std::borrow::Cow;

use crate::asm::Program;
use crate::ast::{CondCode, Dst, FlagMode, Instr, Opcode, Operand, Reg, Shape, ShiftKind};
use mem::{Mem, RegFile};

/// Errors that can occur during simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimErr {
    /// A register reference named a register outside of `R0`-`R15`.
    NoSuchRegister(Reg),
    /// A memory access used an address that is not a multiple of 4.
    MisalignedAccess(u32),
    /// A memory access used an address outside of the memory window.
    AccessOutOfBounds(u32),
    /// A taken branch named a label that is not declared in the program.
    UndefinedLabel(String),
    /// An instruction's operand list is shorter than its mnemonic requires.
    ///
    /// The parser never produces such an instruction; this guards
    /// [`execute`](Simulator::execute) against hand-built [`Instr`] values.
    MissingOperand(Opcode),
}
impl std::fmt::Display for SimErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimErr::NoSuchRegister(reg) => write!(f, "no such register: {reg}"),
            SimErr::MisalignedAccess(addr) => write!(f, "misaligned memory access at {addr:#010X}"),
            SimErr::AccessOutOfBounds(addr) => write!(f, "memory access out of bounds at {addr:#010X}"),
            SimErr::UndefinedLabel(label) => write!(f, "undefined label: {label}"),
            SimErr::MissingOperand(opcode) => write!(f, "missing operand for {opcode}"),
        }
    }
}
impl std::error::Error for SimErr {}
impl crate::err::Error for SimErr {
    fn help(&self) -> Option<Cow<str>> {
        match self {
            SimErr::NoSuchRegister(_) => Some(Cow::Borrowed("registers are R0 through R15")),
            SimErr::MisalignedAccess(_) => Some(Cow::Borrowed("addresses must be aligned to a 4-byte boundary")),
            SimErr::AccessOutOfBounds(_) => Some(Cow::Borrowed("addresses must fall within the configured memory window")),
            SimErr::UndefinedLabel(_) => Some(Cow::Borrowed("branch targets must be declared as labels in the program")),
            SimErr::MissingOperand(_) => Some(Cow::Borrowed("the operand list is shorter than the mnemonic requires")),
        }
    }
}

/// The status register, holding the N/Z/C/V condition flags
/// in the top four bits of a 32-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cpsr(u32);

impl Cpsr {
    const N: u32 = 1 << 31;
    const Z: u32 = 1 << 30;
    const C: u32 = 1 << 29;
    const V: u32 = 1 << 28;

    /// Creates a status register from its raw bits.
    pub fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw bits of the status register.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// The negative flag.
    pub fn n(self) -> bool {
        self.0 & Self::N != 0
    }
    /// The zero flag.
    pub fn z(self) -> bool {
        self.0 & Self::Z != 0
    }
    /// The carry flag.
    pub fn c(self) -> bool {
        self.0 & Self::C != 0
    }
    /// The overflow flag.
    pub fn v(self) -> bool {
        self.0 & Self::V != 0
    }

    /// Whether the given condition code holds under the current flags.
    pub fn satisfies(self, cond: CondCode) -> bool {
        match cond {
            CondCode::Eq => self.z(),
            CondCode::Ne => !self.z(),
            CondCode::Cs => self.c(),
            CondCode::Cc => !self.c(),
            CondCode::Mi => self.n(),
            CondCode::Pl => !self.n(),
            CondCode::Vs => self.v(),
            CondCode::Vc => !self.v(),
            CondCode::Hi => self.c() && !self.z(),
            CondCode::Ls => !self.c() || self.z(),
            CondCode::Ge => self.n() == self.v(),
            CondCode::Lt => self.n() != self.v(),
            CondCode::Gt => !self.z() && self.n() == self.v(),
            CondCode::Le => self.z() || self.n() != self.v(),
            CondCode::Al => true,
            CondCode::Nv => false,
        }
    }

    /// Recomputes all four flags from a widened arithmetic result.
    ///
    /// N and Z are taken from the result truncated to 32 bits. C and V are
    /// taken from the widened result: C is a carry-out for add modes and a
    /// non-borrow for subtract modes, and V is set when the widened result
    /// does not fit a signed 32-bit integer. Shift and "other" modes always
    /// clear C and V.
    pub fn update(&mut self, mode: FlagMode, wide: i64) {
        let result = wide as u32;
        self.0 &= !(Self::N | Self::Z | Self::C | Self::V);

        if (result as i32) < 0 {
            self.0 |= Self::N;
        }
        if result == 0 {
            self.0 |= Self::Z;
        }
        let carry = match mode {
            FlagMode::Add => wide > u32::MAX as i64,
            FlagMode::Sub => wide >= 0,
            FlagMode::Shift | FlagMode::Other => false,
        };
        if carry {
            self.0 |= Self::C;
        }
        let overflow = match mode {
            FlagMode::Add | FlagMode::Sub => wide > i32::MAX as i64 || wide < i32::MIN as i64,
            FlagMode::Shift | FlagMode::Other => false,
        };
        if overflow {
            self.0 |= Self::V;
        }
    }
}
impl std::fmt::Display for Cpsr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "N={} Z={} C={} V={}",
            self.n() as u8, self.z() as u8, self.c() as u8, self.v() as u8
        )
    }
}

/// The sizing of the simulator's memory window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    /// The number of 32-bit words in the memory window.
    pub mem_words: usize,
    /// The physical address of the first word of the window.
    pub mem_base: u32,
}
impl Default for SimConfig {
    fn default() -> Self {
        Self {
            mem_words: 256,
            mem_base: 0x2000_0000,
        }
    }
}

/// The result of [stepping](Simulator::step) the simulator once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// An operation was executed (or skipped by its condition code).
    Continued,
    /// The cursor was past the end of the program, so nothing executed.
    Halted,
}

/// Where the cursor goes after an operation executes.
enum Flow {
    Advance,
    Jump(usize),
}

/// Executes a decoded [`Program`].
#[derive(Debug, Clone, PartialEq)]
pub struct Simulator {
    program: Program,
    reg_file: RegFile,
    cpsr: Cpsr,
    mem: Mem,
    cursor: usize,
    instructions_run: u64,
}

impl Simulator {
    /// Creates a simulator for the given program with the default memory window.
    pub fn new(program: Program) -> Self {
        Self::with_config(program, SimConfig::default())
    }

    /// Creates a simulator for the given program with an explicit memory window.
    pub fn with_config(program: Program, config: SimConfig) -> Self {
        Self {
            program,
            reg_file: RegFile::default(),
            cpsr: Cpsr::default(),
            mem: Mem::new(config.mem_base, config.mem_words),
            cursor: 0,
            instructions_run: 0,
        }
    }

    /// The loaded program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Replaces the loaded program. The machine state is left untouched.
    pub fn load_program(&mut self, program: Program) {
        self.program = program;
        self.cursor = 0;
    }

    /// The register file.
    pub fn reg_file(&self) -> &RegFile {
        &self.reg_file
    }

    /// A mutable reference to the register file.
    pub fn reg_file_mut(&mut self) -> &mut RegFile {
        &mut self.reg_file
    }

    /// The status register.
    pub fn cpsr(&self) -> Cpsr {
        self.cpsr
    }

    /// Overwrites the status register.
    pub fn set_cpsr(&mut self, cpsr: Cpsr) {
        self.cpsr = cpsr;
    }

    /// The memory window.
    pub fn mem(&self) -> &Mem {
        &self.mem
    }

    /// A mutable reference to the memory window.
    pub fn mem_mut(&mut self) -> &mut Mem {
        &mut self.mem
    }

    /// The number of operations executed since the last reset
    /// (skipped conditional operations included).
    pub fn instructions_run(&self) -> u64 {
        self.instructions_run
    }

    /// The register values keyed by name (`R0`..`R15` plus `cpsr`).
    pub fn snapshot_registers(&self) -> std::collections::BTreeMap<String, u32> {
        let mut map: std::collections::BTreeMap<_, _> = self.reg_file
            .snapshot()
            .into_iter()
            .enumerate()
            .map(|(n, value)| (Reg::new(n as u8).to_string(), value))
            .collect();
        map.insert("cpsr".to_string(), self.cpsr.bits());
        map
    }

    /// The memory window contents, indexed by word.
    pub fn memory_words(&self) -> &[u32] {
        self.mem.words()
    }

    /// The index of the next operation to execute.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Moves the cursor to the given operation index.
    pub fn set_cursor(&mut self, index: usize) {
        self.cursor = index;
    }

    /// Zeroes the registers, flags, and memory, and rewinds the cursor.
    pub fn reset(&mut self) {
        self.reg_file.reset();
        self.cpsr = Cpsr::default();
        self.mem.reset();
        self.cursor = 0;
        self.instructions_run = 0;
    }

    /// Runs the program from the top until the cursor falls off the end.
    pub fn run(&mut self) -> Result<(), SimErr> {
        self.cursor = 0;
        while self.step()? == StepResult::Continued {}
        Ok(())
    }

    /// Executes the operation under the cursor and moves the cursor.
    ///
    /// If the cursor is already past the end of the program,
    /// this does nothing and reports [`StepResult::Halted`].
    pub fn step(&mut self) -> Result<StepResult, SimErr> {
        let Some(op) = self.program.ops().get(self.cursor) else {
            return Ok(StepResult::Halted);
        };
        let instr = op.instr.clone();
        tracing::trace!(cursor = self.cursor, line = op.line_no, op = %instr.opcode, "executing");

        match self.exec_instr(&instr)? {
            Flow::Advance => self.cursor += 1,
            Flow::Jump(index) => self.cursor = index,
        }
        self.instructions_run += 1;
        Ok(StepResult::Continued)
    }

    /// Executes a single decoded instruction against the current state,
    /// leaving the cursor where it was (even across a branch).
    pub fn execute(&mut self, instr: &Instr) -> Result<(), SimErr> {
        self.exec_instr(instr).map(|_flow| ())
    }

    fn exec_instr(&mut self, instr: &Instr) -> Result<Flow, SimErr> {
        if let Some(cond) = instr.cond {
            if !self.cpsr.satisfies(cond) {
                return Ok(Flow::Advance);
            }
        }

        match instr.opcode.shape() {
            Shape::RegWrite => {
                let wide = match instr.opcode {
                    Opcode::LDR => {
                        let addr = self.resolve(source(instr, 0)?)? as u32;
                        self.mem.read(addr)? as i32 as i64
                    }
                    _ => self.compute(instr)?,
                };
                match instr.target {
                    Some(Dst::Reg(reg)) => self.reg_file.set(reg, wide as u32)?,
                    Some(Dst::Cpsr) => self.cpsr = Cpsr::new(wide as u32),
                    None => {}
                }
                if let Some(mode) = instr.flag_mode {
                    self.cpsr.update(mode, wide);
                }
            }
            // Compares discard their result and update the flags
            // whether or not the S suffix was written.
            Shape::Compare => {
                let wide = self.compute(instr)?;
                self.cpsr.update(instr.opcode.flag_mode(), wide);
            }
            Shape::Store => {
                let value = self.resolve(source(instr, 0)?)? as u32;
                let addr = self.resolve(source(instr, 1)?)? as u32;
                self.mem.write(addr, value)?;
            }
            Shape::Branch => {
                let label = match source(instr, 0)? {
                    Operand::Label(label) => label,
                    op => return Err(SimErr::UndefinedLabel(op.to_string())),
                };
                let index = self.program
                    .get_label(label)
                    .ok_or_else(|| SimErr::UndefinedLabel(label.clone()))?;
                tracing::trace!(label = %label, index, "branch taken");
                return Ok(Flow::Jump(index));
            }
        }
        Ok(Flow::Advance)
    }

    /// Evaluates an ALU instruction to its widened result.
    fn compute(&self, instr: &Instr) -> Result<i64, SimErr> {
        let carry = self.cpsr.c();
        let a = self.resolve(source(instr, 0)?)?;

        if let Some(kind) = ShiftKind::from_opcode(instr.opcode) {
            let amount = match instr.sources.get(1) {
                Some(op) => self.resolve(op)? as u32,
                // RRX always rotates by one and takes no amount
                None if instr.opcode.source_arity() < 2 => 0,
                None => return Err(SimErr::MissingOperand(instr.opcode)),
            };
            return Ok(apply_shift(kind, a as u32, amount, carry));
        }

        let b = match instr.sources.get(1) {
            Some(op) => self.resolve(op)?,
            // single-source mnemonics (MOV, MVN) never read this slot
            None if instr.opcode.source_arity() < 2 => 0,
            None => return Err(SimErr::MissingOperand(instr.opcode)),
        };
        let c = carry as i64;
        let wide = match instr.opcode {
            Opcode::ADD | Opcode::CMN => a + b,
            Opcode::ADC => a + b + c,
            Opcode::SUB | Opcode::CMP => a - b,
            Opcode::SBC => a - b + c - 1,
            Opcode::RSB => b - a,
            Opcode::RSC => b - a + c - 1,
            Opcode::AND | Opcode::TST => a & b,
            Opcode::EOR | Opcode::TEQ => a ^ b,
            Opcode::ORR => a | b,
            Opcode::BIC => a & !b,
            Opcode::MOV => a,
            Opcode::MVN => !a,
            // shifts are handled above; loads, stores, and branches
            // never reach the ALU
            _ => 0,
        };
        Ok(wide)
    }

    /// Resolves an operand to its widened value against the current state.
    ///
    /// Register and memory-indirect operands resolve through a signed 32-bit
    /// view of the register value. A memory-indirect operand resolves to the
    /// register value itself; it is the load/store instructions that treat
    /// that value as an effective address.
    fn resolve(&self, operand: &Operand) -> Result<i64, SimErr> {
        match operand {
            Operand::Reg(reg) | Operand::Deref(reg) => {
                Ok(self.reg_file.get(*reg)? as i32 as i64)
            }
            Operand::Cpsr => Ok(self.cpsr.bits() as i32 as i64),
            Operand::Imm(value) => Ok(*value),
            Operand::Shifted(shift) => {
                let value = self.resolve(&shift.rm)? as u32;
                let amount = match &shift.amount {
                    Some(op) => self.resolve(op)? as u32,
                    None => 0,
                };
                Ok(apply_shift(shift.kind, value, amount, self.cpsr.c()))
            }
            Operand::Label(label) => Err(SimErr::UndefinedLabel(label.clone())),
        }
    }
}

/// Gets a source operand by position, failing if the operand list is
/// shorter than the mnemonic's arity.
fn source(instr: &Instr, index: usize) -> Result<&Operand, SimErr> {
    instr.sources.get(index).ok_or(SimErr::MissingOperand(instr.opcode))
}

/// Applies a shift function to a 32-bit value. Shift amounts are taken mod 32.
fn apply_shift(kind: ShiftKind, value: u32, amount: u32, carry: bool) -> i64 {
    let n = amount % 32;
    match kind {
        ShiftKind::Lsl => ((value << n) as i32) as i64,
        ShiftKind::Lsr => (value >> n) as i64,
        ShiftKind::Asr => ((value as i32) >> n) as i64,
        ShiftKind::Ror => (value.rotate_right(n) as i32) as i64,
        ShiftKind::Rrx => (((value >> 1) | ((carry as u32) << 31)) as i32) as i64,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::asm::assemble;

    fn run(src: &str) -> Simulator {
        let mut sim = Simulator::new(assemble(src).unwrap());
        sim.run().unwrap();
        sim
    }

    fn reg(sim: &Simulator, n: u8) -> u32 {
        sim.reg_file().get(Reg::new(n)).unwrap()
    }

    #[test]
    fn moves_and_arithmetic() {
        let sim = run("
            MOV R0, #5
            MOV R1, #3
            ADD R2, R0, R1
            SUB R3, R0, R1
            RSB R4, R0, R1
            MVN R5, R0
            BIC R6, R0, R1
        ");
        assert_eq!(reg(&sim, 2), 8);
        assert_eq!(reg(&sim, 3), 2);
        assert_eq!(reg(&sim, 4), (-2i32) as u32);
        assert_eq!(reg(&sim, 5), !5u32);
        assert_eq!(reg(&sim, 6), 4);
    }

    #[test]
    fn logical_ops() {
        let sim = run("
            MOV R0, #0xF0
            MOV R1, #0x3C
            AND R2, R0, R1
            ORR R3, R0, R1
            EOR R4, R0, R1
        ");
        assert_eq!(reg(&sim, 2), 0x30);
        assert_eq!(reg(&sim, 3), 0xFC);
        assert_eq!(reg(&sim, 4), 0xCC);
    }

    #[test]
    fn negative_values_wrap_to_32_bits() {
        let sim = run("MOV R0, #-1");
        assert_eq!(reg(&sim, 0), 0xFFFF_FFFF);
    }

    #[test]
    fn signed_overflow_sets_n_and_v() {
        let sim = run("
            MOV R0, #0x7FFFFFFF
            ADDS R0, R0, #1
        ");
        assert_eq!(reg(&sim, 0), 0x8000_0000);
        let cpsr = sim.cpsr();
        assert!(cpsr.n());
        assert!(!cpsr.z());
        assert!(!cpsr.c());
        assert!(cpsr.v());
    }

    #[test]
    fn borrow_clears_c() {
        let sim = run("
            MOV R0, #0
            SUBS R0, R0, #1
        ");
        assert_eq!(reg(&sim, 0), 0xFFFF_FFFF);
        let cpsr = sim.cpsr();
        assert!(cpsr.n());
        assert!(!cpsr.c());
        assert!(!cpsr.v());
    }

    #[test]
    fn compare_updates_flags_without_s() {
        let sim = run("
            MOV R0, #7
            MOV R1, #7
            CMP R0, R1
        ");
        let cpsr = sim.cpsr();
        assert!(cpsr.z());
        assert!(cpsr.c());
        assert!(!cpsr.n());
    }

    #[test]
    fn flags_untouched_without_s() {
        let sim = run("
            MOV R0, #0
            MOV R1, #0
            ADD R2, R0, R1
        ");
        // Z stays clear: ADD without S must not write the flags
        assert!(!sim.cpsr().z());
    }

    #[test]
    fn logical_s_clears_carry() {
        let sim = run("
            MOV R0, #1
            CMP R0, R0
            ANDS R1, R0, R0
        ");
        // CMP set C; the shift-mode update then cleared it
        assert!(!sim.cpsr().c());
        assert!(!sim.cpsr().z());
    }

    #[test]
    fn carry_feeds_adc_and_sbc() {
        let sim = run("
            MOV R0, #1
            CMP R0, R0      ; C := 1
            ADC R1, R0, #1  ; 1 + 1 + 1
            SBC R2, R0, #1  ; 1 - 1 + 1 - 1
        ");
        assert_eq!(reg(&sim, 1), 3);
        assert_eq!(reg(&sim, 2), 0);
    }

    #[test]
    fn conditional_execution() {
        let sim = run("
            MOV R0, #1
            CMP R0, #1
            MOVEQ R1, #10
            MOVNE R2, #20
        ");
        assert_eq!(reg(&sim, 1), 10);
        assert_eq!(reg(&sim, 2), 0);
    }

    #[test]
    fn unsigned_and_signed_conditions() {
        let sim = run("
            MOV R0, #2
            CMP R0, #1
            MOVHI R1, #1    ; 2 > 1 unsigned
            MOVLS R2, #1
            CMP R0, #-1
            MOVGT R3, #1    ; 2 > -1 signed
            MOVLO R4, #1    ; no borrow: the immediate resolves signed
        ");
        assert_eq!(reg(&sim, 1), 1);
        assert_eq!(reg(&sim, 2), 0);
        assert_eq!(reg(&sim, 3), 1);
        assert_eq!(reg(&sim, 4), 0);
    }

    #[test]
    fn nv_never_executes() {
        let sim = run("MOVNV R0, #1");
        assert_eq!(reg(&sim, 0), 0);
    }

    #[test]
    fn branch_loop() {
        let sim = run("
            MOV R0, #0
            loop: ADD R0, R0, #1
            CMP R0, #3
            BNE loop
        ");
        assert_eq!(reg(&sim, 0), 3);
    }

    #[test]
    fn untaken_branch_to_dangling_label_is_fine() {
        let sim = run("
            MOV R0, #1
            CMP R0, #1
            BNE nowhere
        ");
        assert_eq!(reg(&sim, 0), 1);
    }

    #[test]
    fn taken_branch_to_dangling_label_errors() {
        let mut sim = Simulator::new(assemble("B nowhere").unwrap());
        assert_eq!(sim.run(), Err(SimErr::UndefinedLabel("nowhere".to_string())));
    }

    #[test]
    fn standalone_shifts() {
        let sim = run("
            MOV R0, #1
            LSL R1, R0, #4
            MOV R2, #0x80
            LSR R3, R2, #3
            MOV R4, #-8
            ASR R5, R4, #1
            MOV R6, #1
            ROR R7, R6, #1
        ");
        assert_eq!(reg(&sim, 1), 0x10);
        assert_eq!(reg(&sim, 3), 0x10);
        assert_eq!(reg(&sim, 5), (-4i32) as u32);
        assert_eq!(reg(&sim, 7), 0x8000_0000);
    }

    #[test]
    fn rrx_rotates_through_carry() {
        let sim = run("
            MOV R0, #2
            RRX R1, R0      ; C = 0, so plain shift right
            CMP R0, R0      ; C := 1
            RRX R2, R0
        ");
        assert_eq!(reg(&sim, 1), 1);
        assert_eq!(reg(&sim, 2), 0x8000_0001);
    }

    #[test]
    fn embedded_shift_scales_operand() {
        let sim = run("
            MOV R0, #3
            MOV R1, #100
            ADD R2, R1, R0, LSL #2
        ");
        assert_eq!(reg(&sim, 2), 112);
        // the shifted register itself is untouched
        assert_eq!(reg(&sim, 0), 3);
    }

    #[test]
    fn shift_amount_from_register() {
        let sim = run("
            MOV R0, #1
            MOV R1, #4
            MOV R2, R0, LSL R1
        ");
        assert_eq!(reg(&sim, 2), 0x10);
    }

    #[test]
    fn load_store_round_trip() {
        let sim = run("
            MOV R1, #0x20000000
            MOV R0, #42
            STR R0, [R1]
            ADD R1, R1, #4
            MOV R2, #7
            STR R2, [R1]
            LDR R3, [R1]
            SUB R1, R1, #4
            LDR R4, [R1]
        ");
        assert_eq!(reg(&sim, 3), 7);
        assert_eq!(reg(&sim, 4), 42);
        assert_eq!(sim.mem().words()[0], 42);
        assert_eq!(sim.mem().words()[1], 7);
    }

    #[test]
    fn store_past_window_end_errors() {
        // default window is 256 words, so base + 4*256 is one past the end
        let mut sim = Simulator::new(assemble("
            MOV R1, #0x20000400
            STR R1, [R1]
        ").unwrap());
        assert_eq!(sim.run(), Err(SimErr::AccessOutOfBounds(0x2000_0400)));
    }

    #[test]
    fn misaligned_load_errors() {
        let mut sim = Simulator::new(assemble("
            MOV R1, #0x20000002
            LDR R0, [R1]
        ").unwrap());
        assert_eq!(sim.run(), Err(SimErr::MisalignedAccess(0x2000_0002)));
    }

    #[test]
    fn out_of_range_register_errors_at_execution() {
        let mut sim = Simulator::new(assemble("MOV R20, #1").unwrap());
        assert_eq!(sim.run(), Err(SimErr::NoSuchRegister(Reg::new(20))));
    }

    #[test]
    fn pc_is_a_plain_register() {
        let sim = run("
            MOV PC, #12
            ADD R0, PC, #1
        ");
        assert_eq!(reg(&sim, 15), 12);
        assert_eq!(reg(&sim, 0), 13);
    }

    #[test]
    fn cpsr_readable_and_writable() {
        let sim = run("
            MOV CPSR, #0x40000000
            MOVEQ R0, #1    ; Z was just forced on
            MOV R1, CPSR
        ");
        assert_eq!(reg(&sim, 0), 1);
        assert_eq!(reg(&sim, 1), 0x4000_0000);
    }

    #[test]
    fn execute_preserves_cursor() {
        let program = assemble("
            MOV R0, #1
            ADD R0, R0, #1
        ").unwrap();
        let instr = program.ops()[0].instr.clone();
        let mut sim = Simulator::new(program);
        sim.set_cursor(1);
        sim.execute(&instr).unwrap();
        assert_eq!(sim.cursor(), 1);
        assert_eq!(reg(&sim, 0), 1);
    }

    #[test]
    fn step_past_end_halts() {
        let mut sim = Simulator::new(assemble("MOV R0, #1").unwrap());
        assert_eq!(sim.step().unwrap(), StepResult::Continued);
        assert_eq!(sim.step().unwrap(), StepResult::Halted);
        assert_eq!(sim.cursor(), 1);
    }

    #[test]
    fn reset_clears_state() {
        let mut sim = run("
            MOV R1, #0x20000000
            MOV R0, #-1
            STR R0, [R1]
            CMP R0, R0
        ");
        sim.reset();
        assert_eq!(sim.reg_file().snapshot(), [0; 16]);
        assert_eq!(sim.cpsr(), Cpsr::default());
        assert_eq!(sim.cursor(), 0);
        assert!(sim.mem().words().iter().all(|&w| w == 0));

        // resetting again changes nothing
        let once = sim.clone();
        sim.reset();
        assert_eq!(sim, once);
    }

    #[test]
    fn custom_memory_window() {
        let config = SimConfig { mem_words: 2, mem_base: 0x1000 };
        let mut sim = Simulator::with_config(assemble("
            MOV R1, #0x1004
            STR R1, [R1]
        ").unwrap(), config);
        sim.run().unwrap();
        assert_eq!(sim.mem().words(), &[0, 0x1004]);
    }

    #[test]
    fn hex_immediates() {
        let sim = run("MOV R0, #0xFFFFFFFF");
        assert_eq!(reg(&sim, 0), 0xFFFF_FFFF);
    }

    #[test]
    fn self_branch_loops_forever() {
        let mut sim = Simulator::new(assemble("loop B loop").unwrap());
        for _ in 0..10 {
            assert_eq!(sim.step().unwrap(), StepResult::Continued);
            assert_eq!(sim.cursor(), 0);
        }
        assert_eq!(sim.instructions_run(), 10);
    }

    #[test]
    fn clean_add_leaves_flags_clear() {
        let sim = run("
            MOV R0, #5
            MOV R1, #3
            ADDS R2, R0, R1
        ");
        assert_eq!(reg(&sim, 2), 8);
        let cpsr = sim.cpsr();
        assert!(!cpsr.n() && !cpsr.z() && !cpsr.c() && !cpsr.v());
    }

    #[test]
    fn register_snapshot_by_name() {
        let sim = run("MOV R3, #9");
        let snap = sim.snapshot_registers();
        assert_eq!(snap["R3"], 9);
        assert_eq!(snap["R0"], 0);
        assert_eq!(snap["cpsr"], 0);
        assert_eq!(snap.len(), 17);
    }

    #[test]
    fn hand_built_instr_missing_operands_errors() {
        let mut sim = Simulator::new(Program::default());

        let instr = Instr {
            opcode: Opcode::STR,
            cond: None,
            flag_mode: None,
            target: None,
            sources: vec![],
        };
        assert_eq!(sim.execute(&instr), Err(SimErr::MissingOperand(Opcode::STR)));

        let instr = Instr {
            opcode: Opcode::ADD,
            cond: None,
            flag_mode: None,
            target: Some(Dst::Reg(Reg::new(0))),
            sources: vec![Operand::Reg(Reg::new(1))],
        };
        // one source short of ADD's two; the missing slot must not
        // silently default to zero
        assert_eq!(sim.execute(&instr), Err(SimErr::MissingOperand(Opcode::ADD)));
    }

    #[test]
    fn cpsr_satisfies_table() {
        let clear = Cpsr::default();
        let n = Cpsr::new(1 << 31);
        let z = Cpsr::new(1 << 30);
        let c = Cpsr::new(1 << 29);
        let v = Cpsr::new(1 << 28);

        // every code against each single-flag state
        let table = [
            (CondCode::Eq, [false, false, true,  false, false]),
            (CondCode::Ne, [true,  true,  false, true,  true ]),
            (CondCode::Cs, [false, false, false, true,  false]),
            (CondCode::Cc, [true,  true,  true,  false, true ]),
            (CondCode::Mi, [false, true,  false, false, false]),
            (CondCode::Pl, [true,  false, true,  true,  true ]),
            (CondCode::Vs, [false, false, false, false, true ]),
            (CondCode::Vc, [true,  true,  true,  true,  false]),
            (CondCode::Hi, [false, false, false, true,  false]),
            (CondCode::Ls, [true,  true,  true,  false, true ]),
            (CondCode::Ge, [true,  false, true,  true,  false]),
            (CondCode::Lt, [false, true,  false, false, true ]),
            (CondCode::Gt, [true,  false, false, true,  false]),
            (CondCode::Le, [false, true,  true,  false, true ]),
            (CondCode::Al, [true,  true,  true,  true,  true ]),
            (CondCode::Nv, [false, false, false, false, false]),
        ];
        for (cond, [on_clear, on_n, on_z, on_c, on_v]) in table {
            assert_eq!(clear.satisfies(cond), on_clear, "{cond} with no flags");
            assert_eq!(n.satisfies(cond), on_n, "{cond} with N");
            assert_eq!(z.satisfies(cond), on_z, "{cond} with Z");
            assert_eq!(c.satisfies(cond), on_c, "{cond} with C");
            assert_eq!(v.satisfies(cond), on_v, "{cond} with V");
        }

        // combined-flag interactions
        let zc = Cpsr::new((1 << 30) | (1 << 29));
        assert!(!zc.satisfies(CondCode::Hi));
        assert!(zc.satisfies(CondCode::Ls));
        assert!(zc.satisfies(CondCode::Le));
        let nv = Cpsr::new((1 << 31) | (1 << 28));
        assert!(nv.satisfies(CondCode::Ge));
        assert!(nv.satisfies(CondCode::Gt));
        assert!(!nv.satisfies(CondCode::Lt));
    }
}
