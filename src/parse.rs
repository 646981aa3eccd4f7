//! Parsing one line of assembly source code into a decoded statement.
//!
//! This module is used to convert a comment-stripped, trimmed source line
//! into a [`Stmt`]: an optional label declaration plus a fully decoded
//! instruction (mnemonic, condition code, flag-update policy, target, and
//! source operands, with embedded shift expressions folded into a single
//! deferred operand).
//!
//! The parser module consists of:
//! - [`lex`]: the implementation of the lexer/tokenizer
//! - [`Parser`]: the main logic for the parser
//! - [`Parse`]: the implementation to "parse" a statement component

pub mod lex;

use std::borrow::Cow;

use logos::{Logos, Span};

use crate::ast::{Dst, Instr, OpIdent, Operand, Reg, Shape, Shift, ShiftKind, Stmt};
use lex::{Ident, LexErr, Token};
use simple::*;

/// Parses a single comment-free, non-empty source line into a statement.
///
/// This is a shortcut from using the [`Parser`] directly.
pub fn parse_line(s: &str) -> Result<Stmt, ParseErr> {
    let mut parser = Parser::new(s)?;
    parser.parse::<Stmt>()
}

enum ParseErrKind {
    Lex(LexErr),
    Parse(Cow<'static, str>),
}
impl From<LexErr> for ParseErrKind {
    fn from(value: LexErr) -> Self {
        Self::Lex(value)
    }
}

/// Any error that occurs during parsing tokens.
pub struct ParseErr {
    /// The brief cause of this error.
    kind: ParseErrKind,
    /// Some kind of help (if it exists)
    help: Cow<'static, str>,
    /// The location of this error.
    span: Span,
}
impl ParseErr {
    fn new<S: Into<Cow<'static, str>>>(msg: S, span: Span) -> Self {
        Self { kind: ParseErrKind::Parse(msg.into()), help: Cow::Borrowed(""), span }
    }

    fn wrap<E: Into<ParseErrKind>>(err: E, span: Span) -> Self {
        Self { kind: err.into(), help: Cow::Borrowed(""), span }
    }

    fn with_help<S: Into<Cow<'static, str>>>(mut self, help: S) -> Self {
        self.help = help.into();
        self
    }
}
impl std::fmt::Debug for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let brief: &dyn std::fmt::Debug = match &self.kind {
            ParseErrKind::Lex(s) => s,
            ParseErrKind::Parse(s) => s,
        };
        f.debug_struct("ParseErr")
            .field("brief", brief)
            .field("span", &self.span)
            .finish()
    }
}
impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ParseErrKind::Lex(e) => e.fmt(f),
            ParseErrKind::Parse(s) => s.fmt(f),
        }
    }
}
impl std::error::Error for ParseErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ParseErrKind::Lex(e) => Some(e),
            ParseErrKind::Parse(_) => None,
        }
    }
}
impl crate::err::Error for ParseErr {
    fn span(&self) -> Option<std::ops::Range<usize>> {
        Some(self.span.clone())
    }

    fn help(&self) -> Option<Cow<str>> {
        match &self.kind {
            ParseErrKind::Lex(e) => crate::err::Error::help(e),
            ParseErrKind::Parse(_) if self.help.is_empty() => None,
            ParseErrKind::Parse(_) => Some(Cow::Borrowed(&self.help)),
        }
    }
}

/// Components that can be constructed from a sequence of tokens.
pub trait Parse: Sized {
    /// Attempt to convert the next sequence of tokens
    /// in the parser's state into a component.
    ///
    /// If parsing fails, there are no guarantees about what happens to the input,
    /// and the parser likely should not be used after an error is raised during parsing.
    fn parse(parser: &mut Parser) -> Result<Self, ParseErr>;
}

/// The main parser struct, which holds the main logic for the parser.
pub struct Parser {
    tokens: Vec<(Token, Span)>,
    index: usize,
}
impl Parser {
    /// Creates a new parser from a single line of source.
    ///
    /// In the instantiation process,
    /// this function will attempt to tokenize the string into tokens,
    /// raising an error if it fails.
    pub fn new(line: &str) -> Result<Self, ParseErr> {
        let tokens = Token::lexer(line).spanned()
            .map(|(m_token, span)| match m_token {
                Ok(token) => Ok((token, span)),
                Err(err) => Err(ParseErr::wrap(err, span)),
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { tokens, index: 0 })
    }

    /// Peeks at the next token to read.
    pub fn peek(&self) -> Option<&(Token, Span)> {
        self.tokens[self.index..].first()
    }

    /// Advances the parser ahead by one token.
    pub fn advance(&mut self) {
        self.index += 1;
        self.index = self.index.min(self.tokens.len());
    }

    /// Gets the range of the next token to read (or an end-of-line range if there are no more tokens to read).
    pub fn cursor(&self) -> Span {
        match self.peek().or_else(|| self.tokens.last()) {
            Some((_, span)) => span.clone(),
            None => 0..0,
        }
    }

    /// Parses the current token stream into a component, erroring if not possible.
    pub fn parse<P: Parse>(&mut self) -> Result<P, ParseErr> {
        P::parse(self)
    }

    /// Check if the next token matches the given component and consume it if so.
    ///
    /// This function can error if the next token *does* match the given component,
    /// but an error occurs in trying to convert it to that component.
    pub fn match_<P: TokenParse>(&mut self) -> Result<Option<P>, ParseErr> {
        let span = self.cursor();
        match self.advance_if(P::match_) {
            Ok(t) => P::convert(t, span).map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Applies the provided predicate to the next token in the input.
    ///
    /// If an error is raised from the predicate, the parser does not advance its input.
    pub fn advance_if<T>(&mut self, pred: impl FnOnce(Option<&Token>, Span) -> Result<T, ParseErr>) -> Result<T, ParseErr> {
        let result = if let Some((tok, span)) = self.peek() {
            pred(Some(tok), span.clone())
        } else {
            pred(None, self.cursor())
        };
        if result.is_ok() {
            self.advance();
        }
        result
    }

    /// Checks whether the input for the parser is empty.
    pub fn is_empty(&self) -> bool {
        self.tokens[self.index..].is_empty()
    }
}

/// Simple to parse components.
///
/// This module holds components that are very simple to parse
/// (defined as only requiring a single token and no additional state from the parser).
///
/// The key type of this module is the [`TokenParse`] trait which defines
/// how to "simply parse" a component.
pub mod simple {
    use logos::Span;

    use crate::ast::{Dst, Reg};

    use super::lex::{Ident, Token};
    use super::{Parse, ParseErr, Parser};

    /// Components that can be constructed with a single token
    /// and require no additional parser state.
    ///
    /// This has an advantage over [`Parse`] in that if parsing fails,
    /// the parser is known to not advance its input.
    /// This can be taken advantage of with [`Parser::match_`],
    /// which only advances if parsing passes.
    ///
    /// [`Parser::match_`]: super::Parser::match_
    pub trait TokenParse: Sized {
        /// An intermediate to hold the match before it is converted to the actual component.
        type Intermediate;

        /// Tries to match the next token to the given component, if possible.
        ///
        /// If successful, this returns some value and the parser advances.
        /// If unsuccessful, this returns an error and the parser does not advance.
        fn match_(m_token: Option<&Token>, span: Span) -> Result<Self::Intermediate, ParseErr>;

        /// Parses the intermediate into the given component, raising an error if conversion fails.
        fn convert(imed: Self::Intermediate, span: Span) -> Result<Self, ParseErr>;
    }
    impl<S: TokenParse> Parse for S {
        fn parse(parser: &mut Parser) -> Result<Self, ParseErr> {
            let span = parser.cursor();
            let imed = parser.advance_if(S::match_)?;
            S::convert(imed, span)
        }
    }

    /// Comma.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
    pub struct Comma;
    impl TokenParse for Comma {
        type Intermediate = Self;

        fn match_(m_token: Option<&Token>, span: Span) -> Result<Self::Intermediate, ParseErr> {
            match m_token {
                Some(Token::Comma) => Ok(Comma),
                _ => Err(ParseErr::new("expected comma", span)),
            }
        }

        fn convert(imed: Self::Intermediate, _span: Span) -> Result<Self, ParseErr> {
            Ok(imed)
        }
    }

    /// Colon.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
    pub struct Colon;
    impl TokenParse for Colon {
        type Intermediate = Self;

        fn match_(m_token: Option<&Token>, span: Span) -> Result<Self, ParseErr> {
            match m_token {
                Some(Token::Colon) => Ok(Colon),
                _ => Err(ParseErr::new("expected colon", span)),
            }
        }

        fn convert(imed: Self::Intermediate, _span: Span) -> Result<Self, ParseErr> {
            Ok(imed)
        }
    }

    /// The end of the line.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
    pub struct End;
    impl TokenParse for End {
        type Intermediate = Self;

        fn match_(m_token: Option<&Token>, span: Span) -> Result<Self, ParseErr> {
            match m_token {
                None => Ok(End),
                _ => Err(ParseErr::new("expected end of line", span)),
            }
        }

        fn convert(imed: Self::Intermediate, _span: Span) -> Result<Self, ParseErr> {
            Ok(imed)
        }
    }

    impl TokenParse for Dst {
        type Intermediate = Self;

        fn match_(m_token: Option<&Token>, span: Span) -> Result<Self, ParseErr> {
            match m_token {
                Some(&Token::Reg(r)) => Ok(Dst::Reg(Reg::new(r))),
                Some(Token::Ident(Ident::Label(s))) if s.eq_ignore_ascii_case("PC") => Ok(Dst::Reg(Reg::PC)),
                Some(Token::Ident(Ident::Label(s))) if s.eq_ignore_ascii_case("CPSR") => Ok(Dst::Cpsr),
                _ => Err(ParseErr::new("expected destination register", span)),
            }
        }

        fn convert(imed: Self::Intermediate, _span: Span) -> Result<Self, ParseErr> {
            Ok(imed)
        }
    }
}

impl Parse for Operand {
    fn parse(parser: &mut Parser) -> Result<Self, ParseErr> {
        // Memory-indirect operands span multiple tokens, so handle them first.
        if let Some((Token::LBracket, _)) = parser.peek() {
            parser.advance();
            let reg = parser.advance_if(|mt, span| match mt {
                Some(&Token::Reg(r)) => Ok(Reg::new(r)),
                Some(Token::Ident(Ident::Label(s))) if s.eq_ignore_ascii_case("PC") => Ok(Reg::PC),
                _ => Err(ParseErr::new("expected register inside brackets", span)),
            })?;
            parser.advance_if(|mt, span| match mt {
                Some(Token::RBracket) => Ok(()),
                _ => Err(ParseErr::new("expected closing bracket", span)),
            })?;
            return Ok(Operand::Deref(reg));
        }

        parser.advance_if(|mt, span| match mt {
            Some(&Token::Imm(value)) => Ok(Operand::Imm(value)),
            Some(&Token::Reg(r)) => Ok(Operand::Reg(Reg::new(r))),
            Some(Token::Ident(Ident::Label(s))) if s.eq_ignore_ascii_case("PC") => Ok(Operand::Reg(Reg::PC)),
            Some(Token::Ident(Ident::Label(s))) if s.eq_ignore_ascii_case("CPSR") => Ok(Operand::Cpsr),
            _ => Err(ParseErr::new("expected register, immediate, or memory reference", span)),
        })
    }
}

/// One item of a source operand list, before shift folding.
enum RawItem {
    Value(Operand),
    Shift(ShiftKind),
}
impl Parse for RawItem {
    fn parse(parser: &mut Parser) -> Result<Self, ParseErr> {
        // A bare shift mnemonic in operand position marks a deferred shift
        // expression (e.g. the LSL in `ADD R0, R1, R2, LSL #2`).
        let m_shift = parser.advance_if(|mt, span| match mt {
            Some(Token::Ident(Ident::Op(OpIdent { opcode, cond: None, sets_flags: false }))) => {
                ShiftKind::from_opcode(*opcode)
                    .ok_or_else(|| ParseErr::new("expected shift", span))
            }
            _ => Err(ParseErr::new("expected shift", span)),
        });

        match m_shift {
            Ok(kind) => Ok(RawItem::Shift(kind)),
            Err(_) => Ok(RawItem::Value(parser.parse()?)),
        }
    }
}

/// Parses the remaining comma/space-separated operand list, folding any
/// embedded shift expression into a single [`Operand::Shifted`].
fn parse_sources(parser: &mut Parser) -> Result<Vec<Operand>, ParseErr> {
    let mut items = vec![(parser.cursor(), parser.parse::<RawItem>()?)];
    while !parser.is_empty() {
        parser.match_::<Comma>()?;
        if parser.is_empty() {
            break;
        }
        items.push((parser.cursor(), parser.parse::<RawItem>()?));
    }
    fold_shifts(items)
}

/// Replaces each `register-before, shift-kind, amount-after` triple with one
/// deferred shift operand. The shifted register is read, never written.
fn fold_shifts(items: Vec<(Span, RawItem)>) -> Result<Vec<Operand>, ParseErr> {
    let mut out = Vec::with_capacity(items.len());
    let mut prev: Option<Operand> = None;
    let mut iter = items.into_iter();

    while let Some((span, item)) = iter.next() {
        match item {
            RawItem::Value(op) => {
                if let Some(p) = prev.replace(op) {
                    out.push(p);
                }
            }
            RawItem::Shift(kind) => {
                let Some(rm) = prev.take() else {
                    return Err(ParseErr::new("shift must follow the operand it applies to", span));
                };
                let amount = match kind {
                    ShiftKind::Rrx => None,
                    _ => match iter.next() {
                        Some((_, RawItem::Value(op))) => Some(Box::new(op)),
                        Some((s, RawItem::Shift(_))) => return Err(ParseErr::new("expected shift amount", s)),
                        None => return Err(ParseErr::new("expected shift amount", span)),
                    },
                };
                prev = Some(Operand::Shifted(Shift { kind, rm: Box::new(rm), amount }));
            }
        }
    }
    out.extend(prev);
    Ok(out)
}

impl Parse for Instr {
    fn parse(parser: &mut Parser) -> Result<Self, ParseErr> {
        let op_span = parser.cursor();
        let OpIdent { opcode, cond, sets_flags } = parser.advance_if(|mt, span| match mt {
            Some(Token::Ident(Ident::Op(op))) => Ok(*op),
            _ => Err(ParseErr::new("expected instruction", span)),
        })?;

        let (target, sources) = match opcode.shape() {
            Shape::RegWrite => {
                let dst: Dst = parser.parse()?;
                parser.match_::<Comma>()?;
                (Some(dst), parse_sources(parser)?)
            }
            // Compare and store read their "target" slot as a source.
            Shape::Compare | Shape::Store => (None, parse_sources(parser)?),
            Shape::Branch => {
                let label = parser.advance_if(|mt, span| match mt {
                    Some(Token::Ident(Ident::Label(s))) => Ok(s.clone()),
                    _ => Err(ParseErr::new("expected branch label", span)),
                })?;
                (None, vec![Operand::Label(label)])
            }
        };

        if sources.len() != opcode.source_arity() {
            return Err(ParseErr::new(
                format!("{opcode} expects {} source operand(s), found {}", opcode.source_arity(), sources.len()),
                op_span,
            ).with_help("an embedded shift expression counts as part of the operand it shifts"));
        }

        Ok(Instr {
            opcode,
            cond,
            flag_mode: sets_flags.then(|| opcode.flag_mode()),
            target,
            sources,
        })
    }
}

impl Parse for Stmt {
    fn parse(parser: &mut Parser) -> Result<Self, ParseErr> {
        // A line is `[label [:]] instruction operands...`; the leading
        // identifier is a label exactly when it does not decode as an opcode.
        let label = parser.advance_if(|mt, span| match mt {
            Some(Token::Ident(Ident::Label(s))) => Ok(s.clone()),
            _ => Err(ParseErr::new("expected label", span)),
        }).ok();
        if label.is_some() {
            parser.match_::<Colon>()?;
        }

        let instr = parser.parse()?;

        // assert end of line at end of statement
        parser.parse::<End>()?;

        Ok(Self { label, instr })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::{CondCode, FlagMode, Opcode};

    fn instr(line: &str) -> Instr {
        parse_line(line).unwrap().instr
    }

    #[test]
    fn decodes_every_mnemonic() {
        let r = |n| Operand::Reg(Reg::new(n));
        let cases: &[(&str, Opcode, Option<Dst>, Vec<Operand>)] = &[
            ("ADD R0, R1, R2", Opcode::ADD, Some(Dst::Reg(Reg::new(0))), vec![r(1), r(2)]),
            ("ADC R0, R1, #1", Opcode::ADC, Some(Dst::Reg(Reg::new(0))), vec![r(1), Operand::Imm(1)]),
            ("SUB R3, R3, #4", Opcode::SUB, Some(Dst::Reg(Reg::new(3))), vec![r(3), Operand::Imm(4)]),
            ("SBC R0, R1, R2", Opcode::SBC, Some(Dst::Reg(Reg::new(0))), vec![r(1), r(2)]),
            ("RSB R0, R1, R2", Opcode::RSB, Some(Dst::Reg(Reg::new(0))), vec![r(1), r(2)]),
            ("RSC R0, R1, R2", Opcode::RSC, Some(Dst::Reg(Reg::new(0))), vec![r(1), r(2)]),
            ("AND R0, R1, R2", Opcode::AND, Some(Dst::Reg(Reg::new(0))), vec![r(1), r(2)]),
            ("EOR R0, R1, R2", Opcode::EOR, Some(Dst::Reg(Reg::new(0))), vec![r(1), r(2)]),
            ("ORR R0, R1, R2", Opcode::ORR, Some(Dst::Reg(Reg::new(0))), vec![r(1), r(2)]),
            ("BIC R0, R1, R2", Opcode::BIC, Some(Dst::Reg(Reg::new(0))), vec![r(1), r(2)]),
            ("MOV R0, #5", Opcode::MOV, Some(Dst::Reg(Reg::new(0))), vec![Operand::Imm(5)]),
            ("MVN R0, R1", Opcode::MVN, Some(Dst::Reg(Reg::new(0))), vec![r(1)]),
            ("LSL R0, R1, #2", Opcode::LSL, Some(Dst::Reg(Reg::new(0))), vec![r(1), Operand::Imm(2)]),
            ("LSR R0, R1, #2", Opcode::LSR, Some(Dst::Reg(Reg::new(0))), vec![r(1), Operand::Imm(2)]),
            ("ASR R0, R1, #2", Opcode::ASR, Some(Dst::Reg(Reg::new(0))), vec![r(1), Operand::Imm(2)]),
            ("ROR R0, R1, #2", Opcode::ROR, Some(Dst::Reg(Reg::new(0))), vec![r(1), Operand::Imm(2)]),
            ("RRX R0, R1", Opcode::RRX, Some(Dst::Reg(Reg::new(0))), vec![r(1)]),
            ("CMP R0, R1", Opcode::CMP, None, vec![r(0), r(1)]),
            ("CMN R0, #1", Opcode::CMN, None, vec![r(0), Operand::Imm(1)]),
            ("TST R0, R1", Opcode::TST, None, vec![r(0), r(1)]),
            ("TEQ R0, R1", Opcode::TEQ, None, vec![r(0), r(1)]),
            ("LDR R0, [R1]", Opcode::LDR, Some(Dst::Reg(Reg::new(0))), vec![Operand::Deref(Reg::new(1))]),
            ("STR R0, [R1]", Opcode::STR, None, vec![r(0), Operand::Deref(Reg::new(1))]),
            ("B loop", Opcode::B, None, vec![Operand::Label("loop".to_string())]),
        ];

        for (line, opcode, target, sources) in cases {
            let i = instr(line);
            assert_eq!(i.opcode, *opcode, "opcode for {line:?}");
            assert_eq!(i.target, *target, "target for {line:?}");
            assert_eq!(&i.sources, sources, "sources for {line:?}");
            assert_eq!(i.cond, None, "cond for {line:?}");
            assert_eq!(i.flag_mode, None, "flag mode for {line:?}");
        }
    }

    #[test]
    fn decodes_condition_and_flag_suffixes() {
        let i = instr("ADDEQS R0, R1, R2");
        assert_eq!(i.cond, Some(CondCode::Eq));
        assert_eq!(i.flag_mode, Some(FlagMode::Add));

        let i = instr("SUBS R0, R1, R2");
        assert_eq!(i.cond, None);
        assert_eq!(i.flag_mode, Some(FlagMode::Sub));

        let i = instr("MOVS R0, #1");
        assert_eq!(i.flag_mode, Some(FlagMode::Shift));

        let i = instr("BNE top");
        assert_eq!(i.opcode, Opcode::B);
        assert_eq!(i.cond, Some(CondCode::Ne));
    }

    #[test]
    fn decodes_labels() {
        let stmt = parse_line("loop ADD R0, R0, #1").unwrap();
        assert_eq!(stmt.label.as_deref(), Some("loop"));

        let stmt = parse_line("loop: ADD R0, R0, #1").unwrap();
        assert_eq!(stmt.label.as_deref(), Some("loop"));

        let stmt = parse_line("MOV R0, #1").unwrap();
        assert_eq!(stmt.label, None);
    }

    #[test]
    fn folds_embedded_shifts() {
        let i = instr("ADD R0, R1, R2, LSL #2");
        assert_eq!(i.sources.len(), 2);
        assert_eq!(i.sources[0], Operand::Reg(Reg::new(1)));
        let Operand::Shifted(sh) = &i.sources[1] else {
            panic!("expected shifted operand, found {:?}", i.sources[1]);
        };
        assert_eq!(sh.kind, ShiftKind::Lsl);
        assert_eq!(*sh.rm, Operand::Reg(Reg::new(2)));
        assert_eq!(sh.amount.as_deref(), Some(&Operand::Imm(2)));

        // RRX takes no amount
        let i = instr("MOV R0, R1, RRX");
        let Operand::Shifted(sh) = &i.sources[0] else {
            panic!("expected shifted operand");
        };
        assert_eq!(sh.kind, ShiftKind::Rrx);
        assert_eq!(sh.amount, None);
    }

    #[test]
    fn resolves_pc_and_cpsr_aliases() {
        let i = instr("MOV PC, #0");
        assert_eq!(i.target, Some(Dst::Reg(Reg::PC)));

        let i = instr("MOV R0, PC");
        assert_eq!(i.sources[0], Operand::Reg(Reg::new(15)));

        let i = instr("MOV R0, CPSR");
        assert_eq!(i.sources[0], Operand::Cpsr);
    }

    #[test]
    fn accepts_space_separated_operands() {
        let i = instr("ADD R0, R1 R2");
        assert_eq!(i.sources, vec![Operand::Reg(Reg::new(1)), Operand::Reg(Reg::new(2))]);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_line("FROB R0, R1").is_err());
        assert!(parse_line("ADD R0, R1").is_err());
        assert!(parse_line("ADD R0, R1, R2, R3").is_err());
        assert!(parse_line("MOV #5, R0").is_err());
        assert!(parse_line("LDR R0, [R1").is_err());
        assert!(parse_line("MOV R0, #zz").is_err());
        assert!(parse_line("B").is_err());
        assert!(parse_line("loop").is_err());
        assert!(parse_line("ADD R0, R1, R2 junk").is_err());
    }
}
