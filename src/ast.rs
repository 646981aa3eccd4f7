//! The data model for decoded ARM assembly instructions.
//!
//! This module holds the types produced by the parser and consumed by the
//! program builder and the simulator:
//! - [`Opcode`]: the closed set of supported mnemonics, with a static
//!   shape/arity table per variant
//! - [`CondCode`]: the 16 ARM condition codes
//! - [`Operand`]: a source value reference (register, immediate, shift
//!   expression, memory-indirect reference, or branch label)
//! - [`Stmt`]/[`Instr`]: one fully decoded source line

use std::fmt::Write as _;

/// A general-purpose register reference.
///
/// The register number is kept as written in the source and is only
/// range-checked when the register file is actually accessed, so a program
/// naming `R20` decodes fine and fails at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg(pub(crate) u8);
impl Reg {
    /// The program counter alias (`PC` is `R15`).
    pub const PC: Reg = Reg(15);

    /// Creates a register reference from its number.
    pub fn new(n: u8) -> Self {
        Reg(n)
    }

    /// The register number.
    pub fn number(self) -> u8 {
        self.0
    }
}
impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// A condition code suffix, selecting whether an instruction executes based
/// on the current CPSR flags.
///
/// `HS` and `LO` are accepted in source as aliases of `CS` and `CC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum CondCode {
    Eq, Ne, Cs, Cc, Mi, Pl, Vs, Vc, Hi, Ls, Ge, Lt, Gt, Le, Al, Nv,
}
impl CondCode {
    /// All 16 condition codes, in encoding order.
    pub const ALL: [CondCode; 16] = [
        CondCode::Eq, CondCode::Ne, CondCode::Cs, CondCode::Cc,
        CondCode::Mi, CondCode::Pl, CondCode::Vs, CondCode::Vc,
        CondCode::Hi, CondCode::Ls, CondCode::Ge, CondCode::Lt,
        CondCode::Gt, CondCode::Le, CondCode::Al, CondCode::Nv,
    ];

    /// Parses a two-letter condition suffix (case-insensitive),
    /// resolving the `HS`/`LO` aliases.
    pub fn from_suffix(s: &str) -> Option<Self> {
        let m = match &*s.to_uppercase() {
            "EQ" => CondCode::Eq,
            "NE" => CondCode::Ne,
            "CS" | "HS" => CondCode::Cs,
            "CC" | "LO" => CondCode::Cc,
            "MI" => CondCode::Mi,
            "PL" => CondCode::Pl,
            "VS" => CondCode::Vs,
            "VC" => CondCode::Vc,
            "HI" => CondCode::Hi,
            "LS" => CondCode::Ls,
            "GE" => CondCode::Ge,
            "LT" => CondCode::Lt,
            "GT" => CondCode::Gt,
            "LE" => CondCode::Le,
            "AL" => CondCode::Al,
            "NV" => CondCode::Nv,
            _ => return None,
        };
        Some(m)
    }
}
impl std::fmt::Display for CondCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CondCode::Eq => "EQ", CondCode::Ne => "NE",
            CondCode::Cs => "CS", CondCode::Cc => "CC",
            CondCode::Mi => "MI", CondCode::Pl => "PL",
            CondCode::Vs => "VS", CondCode::Vc => "VC",
            CondCode::Hi => "HI", CondCode::Ls => "LS",
            CondCode::Ge => "GE", CondCode::Lt => "LT",
            CondCode::Gt => "GT", CondCode::Le => "LE",
            CondCode::Al => "AL", CondCode::Nv => "NV",
        };
        f.write_str(s)
    }
}

/// The CPSR update policy implied by a mnemonic when the `S` suffix is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagMode {
    /// Addition carry/overflow rules (`ADD`, `ADC`, `CMN`).
    Add,
    /// Subtraction carry/overflow rules (`SUB`, `SBC`, `RSB`, `RSC`, `CMP`).
    Sub,
    /// Logical/move rules; the carry-out is a documented stub (always 0).
    Shift,
    /// Everything else: N and Z only.
    Other,
}

/// The execution behavior bound to a mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Compute a value and write it to the target register.
    RegWrite,
    /// Compute a value, discard it, and always update the CPSR.
    Compare,
    /// Write the first source's value to memory at the second source.
    Store,
    /// Request a jump to a label.
    Branch,
}

macro_rules! opcode_enum {
    ($($instr:ident),+ $(,)?) => {
        /// A mnemonic from the supported ARM subset.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $(
                #[allow(missing_docs)]
                $instr
            ),+
        }
        impl Opcode {
            /// Every supported mnemonic.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$instr),+];

            fn mnemonic(self) -> &'static str {
                match self {
                    $(Self::$instr => stringify!($instr)),+
                }
            }
        }
        impl std::fmt::Display for Opcode {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.mnemonic())
            }
        }
    };
}
opcode_enum! {
    ADD, ADC, SUB, SBC, RSB, RSC,
    AND, EOR, ORR, BIC,
    MOV, MVN,
    LSL, LSR, ASR, ROR, RRX,
    CMP, CMN, TST, TEQ,
    LDR, STR,
    B,
}

impl Opcode {
    /// The execution shape bound to this mnemonic.
    pub fn shape(self) -> Shape {
        match self {
            Opcode::CMP | Opcode::CMN | Opcode::TST | Opcode::TEQ => Shape::Compare,
            Opcode::STR => Shape::Store,
            Opcode::B => Shape::Branch,
            _ => Shape::RegWrite,
        }
    }

    /// How many source operands this mnemonic takes, counted after shift
    /// folding. For compare/store shapes this includes the "target" slot,
    /// which is read as a source.
    pub fn source_arity(self) -> usize {
        match self {
            Opcode::MOV | Opcode::MVN | Opcode::LDR | Opcode::RRX | Opcode::B => 1,
            _ => 2,
        }
    }

    /// The CPSR update mode implied by this mnemonic.
    pub fn flag_mode(self) -> FlagMode {
        match self {
            Opcode::ADD | Opcode::ADC | Opcode::CMN => FlagMode::Add,
            Opcode::SUB | Opcode::SBC | Opcode::RSB | Opcode::RSC | Opcode::CMP => FlagMode::Sub,
            Opcode::AND | Opcode::ORR | Opcode::EOR | Opcode::BIC
            | Opcode::MOV | Opcode::MVN => FlagMode::Shift,
            _ => FlagMode::Other,
        }
    }
}

/// An opcode identifier as written in source: a mnemonic, an optional
/// two-letter condition code, and an optional `S` flag-update suffix,
/// all in one word (e.g. `ADDEQS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpIdent {
    /// The mnemonic.
    pub opcode: Opcode,
    /// The condition code suffix, if present.
    pub cond: Option<CondCode>,
    /// Whether the `S` suffix was given.
    pub sets_flags: bool,
}
impl OpIdent {
    /// Splits an identifier into mnemonic, condition code, and `S` suffix.
    ///
    /// Mnemonics are matched longest-first so that, say, `BICS` decodes as
    /// `BIC` + `S` rather than a malformed conditional branch. Returns `None`
    /// when no decomposition works, in which case the identifier is a label.
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.to_uppercase();

        let mut candidates: Vec<Opcode> = Opcode::ALL
            .iter()
            .copied()
            .filter(|op| upper.starts_with(op.mnemonic()))
            .collect();
        candidates.sort_by_key(|op| std::cmp::Reverse(op.mnemonic().len()));

        for opcode in candidates {
            let rest = &upper[opcode.mnemonic().len()..];
            let (rest, sets_flags) = match rest.strip_suffix('S') {
                // A bare two-letter rest could itself be a condition code
                // ending in S (CS, VS, LS); prefer that reading.
                Some(prefix) if CondCode::from_suffix(rest).is_none() => (prefix, true),
                _ => (rest, false),
            };
            let cond = match rest {
                "" => None,
                _ => match CondCode::from_suffix(rest) {
                    Some(cc) => Some(cc),
                    None => continue,
                },
            };
            return Some(OpIdent { opcode, cond, sets_flags });
        }
        None
    }
}

/// A shift kind usable in a deferred shift expression (and, apart from the
/// embedded form, as a standalone register-write instruction).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ShiftKind {
    Lsl, Lsr, Asr, Ror, Rrx,
}
impl ShiftKind {
    /// Maps a shift mnemonic to its shift kind.
    pub fn from_opcode(op: Opcode) -> Option<Self> {
        match op {
            Opcode::LSL => Some(ShiftKind::Lsl),
            Opcode::LSR => Some(ShiftKind::Lsr),
            Opcode::ASR => Some(ShiftKind::Asr),
            Opcode::ROR => Some(ShiftKind::Ror),
            Opcode::RRX => Some(ShiftKind::Rrx),
            _ => None,
        }
    }
}
impl std::fmt::Display for ShiftKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ShiftKind::Lsl => "LSL",
            ShiftKind::Lsr => "LSR",
            ShiftKind::Asr => "ASR",
            ShiftKind::Ror => "ROR",
            ShiftKind::Rrx => "RRX",
        };
        f.write_str(s)
    }
}

/// A deferred shift expression embedded in an operand list
/// (e.g. the `R2, LSL #2` in `ADD R0, R1, R2, LSL #2`).
///
/// It is resolved lazily against VM state and never mutates the shifted
/// register. `RRX` rotates by one through the carry and takes no amount.
#[derive(Debug, Clone, PartialEq)]
pub struct Shift {
    /// The shift function to apply.
    pub kind: ShiftKind,
    /// The operand being shifted.
    pub rm: Box<Operand>,
    /// The shift amount; `None` only for `RRX`.
    pub amount: Option<Box<Operand>>,
}

/// A source operand, resolved to a 32-bit value at execution time.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A general-purpose register (`R0`..`R15`, or `PC` for `R15`).
    Reg(Reg),
    /// The CPSR status register.
    Cpsr,
    /// An immediate literal (`#10`, `#-1`, `#0x20000000`).
    Imm(i64),
    /// A memory-indirect reference `[Rn]`.
    ///
    /// This resolves to the register value itself; the load/store
    /// instructions treat that value as the effective address.
    Deref(Reg),
    /// A deferred shift expression.
    Shifted(Shift),
    /// A branch target label; only ever produced for `B`.
    Label(String),
}
impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Reg(r) => r.fmt(f),
            Operand::Cpsr => f.write_str("CPSR"),
            Operand::Imm(v) => {
                f.write_char('#')?;
                v.fmt(f)
            }
            Operand::Deref(r) => write!(f, "[{r}]"),
            Operand::Shifted(sh) => match &sh.amount {
                Some(amount) => write!(f, "{}, {} {}", sh.rm, sh.kind, amount),
                None => write!(f, "{}, {}", sh.rm, sh.kind),
            },
            Operand::Label(l) => f.write_str(l),
        }
    }
}

/// A destination register reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dst {
    /// A general-purpose register (`PC` maps to `R15`).
    Reg(Reg),
    /// The CPSR status register.
    Cpsr,
}
impl std::fmt::Display for Dst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dst::Reg(r) => r.fmt(f),
            Dst::Cpsr => f.write_str("CPSR"),
        }
    }
}

/// One fully decoded instruction, without its program-order context.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    /// The mnemonic.
    pub opcode: Opcode,
    /// The condition code suffix; absent means "always execute".
    pub cond: Option<CondCode>,
    /// The CPSR update policy; present only if the `S` suffix was given.
    pub flag_mode: Option<FlagMode>,
    /// The destination register; absent for compare, store, and branch shapes.
    pub target: Option<Dst>,
    /// The source operands, in order.
    pub sources: Vec<Operand>,
}

/// One decoded source line: an optional label declaration plus an instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// The label declared on this line, if any.
    pub label: Option<String>,
    /// The instruction on this line.
    pub instr: Instr,
}
