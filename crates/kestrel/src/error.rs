//! Public error sum for the embedding API.

use std::fmt;

use crate::{
    kcode::{CompileError, MachineError},
    parse::ParseError,
};

/// Any failure the driver can surface: lexical/grammatical, name
/// resolution or arity, or a runtime type/invariant error. All are fatal
/// to the current evaluation.
#[derive(Debug, Clone)]
pub enum Error {
    Parse(ParseError),
    Compile(CompileError),
    Machine(MachineError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "{err}"),
            Self::Compile(err) => write!(f, "{err}"),
            Self::Machine(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Compile(err) => Some(err),
            Self::Machine(err) => Some(err),
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        Self::Compile(err)
    }
}

impl From<MachineError> for Error {
    fn from(err: MachineError) -> Self {
        Self::Machine(err)
    }
}
