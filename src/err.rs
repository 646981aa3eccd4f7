//! The crate-wide error interface.

use std::borrow::Cow;
use std::ops::Range;

pub use crate::asm::AsmErr;
pub use crate::parse::lex::LexErr;
pub use crate::parse::ParseErr;
pub use crate::sim::SimErr;

/// Common surface over every error this crate raises.
///
/// The [`Display`] impl carries the short description of what went wrong.
/// [`Error::span`] and [`Error::help`] carry the optional extras a reporter
/// can use to point at the offending source text and suggest a fix.
///
/// [`Display`]: std::fmt::Display
pub trait Error: std::error::Error {
    /// Where in the source text the error occurred, if that is known.
    fn span(&self) -> Option<Range<usize>> {
        None
    }

    /// A suggestion for resolving the error, if there is one to give.
    fn help(&self) -> Option<Cow<str>>;
}
