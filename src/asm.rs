//! Assembling assembly source text into an executable program.
//!
//! This module is used to convert a full, multi-line source string into a
//! [`Program`]: the ordered list of decoded operations plus the label table
//! built from label declarations.
//!
//! The assembler module notably consists of:
//! - [`assemble`]: the function which strips comments, parses every
//!   non-empty line, and collects label declarations
//! - [`Program`]: a struct holding the decoded operations, which can be
//!   loaded into the simulator and executed

use std::borrow::Cow;
use std::collections::HashMap;
use std::ops::Range;

use crate::ast::Instr;
use crate::err::Error as _;
use crate::parse::{self, ParseErr};

/// Error from assembling given assembly code.
///
/// This wraps the line's [`ParseErr`] with its position in the full source
/// text, so the error can be reported against the whole input string.
#[derive(Debug)]
pub struct AsmErr {
    /// The parse failure on the offending line.
    inner: ParseErr,
    /// The 1-indexed source line the failure occurred on.
    line_no: usize,
    /// The span of the failure within the full source text.
    span: Range<usize>,
}
impl AsmErr {
    /// The 1-indexed source line the failure occurred on.
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}
impl std::fmt::Display for AsmErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line_no, self.inner)
    }
}
impl std::error::Error for AsmErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.inner)
    }
}
impl crate::err::Error for AsmErr {
    fn span(&self) -> Option<Range<usize>> {
        Some(self.span.clone())
    }

    fn help(&self) -> Option<Cow<str>> {
        self.inner.help()
    }
}

/// One decoded operation, tagged with the source line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// The decoded instruction.
    pub instr: Instr,
    /// The 1-indexed source line this instruction was written on.
    pub line_no: usize,
}

/// A fully decoded program: the operation list in source order,
/// plus the label table mapping labels to operation indices.
///
/// Branch targets are *not* resolved here; the simulator looks labels up
/// when a branch actually executes, so a program with a dangling branch
/// label loads fine and only fails if that branch is taken.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    ops: Vec<Operation>,
    labels: HashMap<String, usize>,
}
impl Program {
    /// The operations of this program, in source order.
    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    /// Gets the operation index a given label points at (if the label exists).
    pub fn get_label(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    /// The number of operations in this program.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether this program has no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Assembles a source string into a [`Program`].
///
/// Each line is stripped of its `;` comment and surrounding whitespace;
/// blank lines are skipped. Redeclaring a label keeps the newest position.
pub fn assemble(src: &str) -> Result<Program, AsmErr> {
    let mut ops: Vec<Operation> = vec![];
    let mut labels = HashMap::new();
    let mut line_start = 0;

    for (i, raw) in src.split('\n').enumerate() {
        let next_start = line_start + raw.len() + 1;
        let line_no = i + 1;

        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let code = match raw.split_once(';') {
            Some((code, _comment)) => code,
            None => raw,
        };
        let trimmed = code.trim();
        if trimmed.is_empty() {
            line_start = next_start;
            continue;
        }
        let indent = code.len() - code.trim_start().len();

        let stmt = parse::parse_line(trimmed).map_err(|inner| {
            let base = line_start + indent;
            let span = match inner.span() {
                Some(s) => (base + s.start)..(base + s.end),
                None => base..(base + trimmed.len()),
            };
            AsmErr { inner, line_no, span }
        })?;

        if let Some(label) = stmt.label {
            labels.insert(label, ops.len());
        }
        ops.push(Operation { instr: stmt.instr, line_no });

        line_start = next_start;
    }

    tracing::debug!(ops = ops.len(), labels = labels.len(), "assembled program");
    Ok(Program { ops, labels })
}
