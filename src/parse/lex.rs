//! Tokenizing ARM assembly lines.
//!
//! This module holds the tokens that characterize the supported ARM assembly
//! subset ([`Token`]). It is used by the parser to facilitate the conversion
//! of one line of source code into a decoded statement.

use std::num::IntErrorKind;

use logos::{Lexer, Logos};

use crate::ast::OpIdent;

/// A unit of information in a line of ARM source code.
#[derive(Debug, Logos, PartialEq)]
#[logos(skip r"[ \t]+", error = LexErr)]
pub enum Token {
    /// An immediate literal (e.g. `#10`, `#-1`, `#0x1F`).
    ///
    /// The regex spans over tokens that are technically invalid (e.g. `#12ab`);
    /// this is intended. It collects one discernable unit and validates it
    /// in the callback.
    #[regex(r"#-?\w*", lex_imm)]
    Imm(i64),

    /// A register (e.g. `R0`, `r13`).
    ///
    /// The register number is not range-checked here; naming a register the
    /// register file does not have is an execution-time error.
    #[regex(r"[Rr]\d+", lex_reg)]
    Reg(u8),

    /// An identifier.
    ///
    /// This can refer to either:
    /// - an opcode with its optional condition/`S` suffixes (e.g. `ADD`, `BNE`, `SUBS`)
    /// - a label (e.g. `loop`, `done`), including the `PC` and `CPSR` aliases
    ///
    /// This token type is case-insensitive.
    #[regex(r"[A-Za-z_]\w*", |lx| lx.slice().parse::<Ident>().expect("should be infallible"))]
    Ident(Ident),

    /// A comma, which delineates operands of an instruction.
    #[token(",")]
    Comma,

    /// A colon, which can optionally appear after labels.
    #[token(":")]
    Colon,

    /// An opening bracket, starting a memory-indirect operand `[Rn]`.
    #[token("[")]
    LBracket,

    /// A closing bracket, ending a memory-indirect operand.
    #[token("]")]
    RBracket,
}

/// An identifier.
///
/// This is either an opcode identifier (mnemonic plus optional condition
/// code and `S` suffix, all in one word) or a label.
#[derive(Debug, PartialEq, Clone)]
pub enum Ident {
    /// An opcode identifier (e.g. `ADD`, `BNE`, `ADDEQS`).
    Op(OpIdent),
    /// A label (or a register alias such as `PC`, resolved by the parser).
    Label(String),
}
impl std::str::FromStr for Ident {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match OpIdent::parse(s) {
            Some(op) => Ok(Ident::Op(op)),
            None => Ok(Ident::Label(s.to_string())),
        }
    }
}
impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ident::Op(op) => {
                op.opcode.fmt(f)?;
                if let Some(cond) = op.cond {
                    cond.fmt(f)?;
                }
                if op.sets_flags {
                    f.write_str("S")?;
                }
                Ok(())
            }
            Ident::Label(id) => f.write_str(id),
        }
    }
}

/// Any errors raised in attempting to tokenize an input stream.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum LexErr {
    /// Numeric literal cannot fit within 32 bits (signed or unsigned).
    DoesNotFit32Bits,
    /// Hex literal (`#0x`) has invalid hex digits.
    InvalidHex,
    /// Hex literal (`#0x`) doesn't have digits after it.
    InvalidHexEmpty,
    /// Immediate could not be parsed as a decimal literal because it has invalid digits.
    InvalidNumeric,
    /// Immediate has no digits in it (it's just `#` or `#-`).
    InvalidDecEmpty,
    /// Int parsing failed but the reason why is unknown.
    UnknownIntErr,
    /// Token had the format `R\d+`, but the number is out of any plausible range.
    InvalidReg,
    /// A symbol was used which is not allowed in ARM assembly files.
    #[default]
    InvalidSymbol,
}
impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::DoesNotFit32Bits => f.write_str("numeric token does not fit 32-bit integer"),
            LexErr::InvalidHex       => f.write_str("invalid hex literal"),
            LexErr::InvalidHexEmpty  => f.write_str("invalid hex literal"),
            LexErr::InvalidNumeric   => f.write_str("invalid decimal literal"),
            LexErr::InvalidDecEmpty  => f.write_str("invalid decimal literal"),
            LexErr::UnknownIntErr    => f.write_str("could not parse integer"),
            LexErr::InvalidReg       => f.write_str("invalid register"),
            LexErr::InvalidSymbol    => f.write_str("unrecognized symbol"),
        }
    }
}
impl std::error::Error for LexErr {}
impl crate::err::Error for LexErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            LexErr::DoesNotFit32Bits => Some(format!("the accepted range is [{}, {}]", i32::MIN, u32::MAX).into()),
            LexErr::InvalidHex       => Some("a hex immediate starts with #0x and consists of 0-9, A-F".into()),
            LexErr::InvalidHexEmpty  => Some("there should be hex digits (0-9, A-F) here".into()),
            LexErr::InvalidNumeric   => Some("a decimal immediate only consists of digits 0-9".into()),
            LexErr::InvalidDecEmpty  => Some("there should be digits (0-9) here".into()),
            LexErr::UnknownIntErr    => None,
            LexErr::InvalidReg       => Some("registers are R0-R15".into()),
            LexErr::InvalidSymbol    => Some("this char does not occur in any token of the supported assembly".into()),
        }
    }
}

/// Helper that converts an int error kind to its corresponding LexErr, based on the provided inputs.
fn convert_int_error(e: &IntErrorKind, invalid_digits_err: LexErr, empty_err: LexErr) -> LexErr {
    match e {
        IntErrorKind::Empty        => empty_err,
        IntErrorKind::InvalidDigit => invalid_digits_err,
        IntErrorKind::PosOverflow  => LexErr::DoesNotFit32Bits,
        IntErrorKind::NegOverflow  => LexErr::DoesNotFit32Bits,
        _ => LexErr::UnknownIntErr,
    }
}

fn lex_imm(lx: &Lexer<'_, Token>) -> Result<i64, LexErr> {
    let Some(body) = lx.slice().strip_prefix('#') else {
        unreachable!("lexer slice should have started with #");
    };
    let (neg, digits) = match body.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, body),
    };

    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16)
            .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidHex, LexErr::InvalidHexEmpty))?,
        None => digits.parse::<i64>()
            .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidNumeric, LexErr::InvalidDecEmpty))?,
    };
    let value = if neg { -magnitude } else { magnitude };

    // must fit in 32 bits, signed or unsigned; wraparound happens on use
    match (i64::from(i32::MIN)..=i64::from(u32::MAX)).contains(&value) {
        true => Ok(value),
        false => Err(LexErr::DoesNotFit32Bits),
    }
}

fn lex_reg(lx: &Lexer<'_, Token>) -> Result<u8, LexErr> {
    lx.slice()[1..].parse::<u8>().map_err(|_| LexErr::InvalidReg)
}
