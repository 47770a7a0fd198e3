//! The compile-and-evaluate core.
//!
//! This module contains the instruction form, the AST-to-K-code compiler,
//! and the abstract machine that reduces K-code to a literal by
//! call-by-need evaluation.
//!
//! # Module structure
//!
//! - `code` - instruction node and address definitions
//! - `compiler` - AST to K-code translation and name resolution
//! - `machine` - the machine state and step loop

pub use code::{KAddr, KCode, LocalAddr};
pub use compiler::CompileError;
pub use machine::{Machine, MachineError};

mod code;
mod compiler;
mod machine;
