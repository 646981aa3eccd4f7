//! An ARM-subset assembly parser and instruction set simulator.

#![warn(missing_docs)]

pub mod parse;
pub mod ast;
pub mod asm;
pub mod err;
pub mod sim;
