#![doc = include_str!("../../../README.md")]

mod ast;
mod builtins;
mod error;
mod kcode;
mod lex;
mod parse;
mod repl;
mod run;
mod symbol;
mod tracer;
mod value;

pub use crate::{
    ast::Ast,
    builtins::BuiltinOp,
    error::Error,
    kcode::{CompileError, KAddr, KCode, LocalAddr, Machine, MachineError},
    lex::SourcePos,
    parse::{ParseError, parse},
    repl::ReplSession,
    run::{Program, eval, eval_with},
    symbol::Symbol,
    tracer::{MachineTracer, NoopTracer, RecordingTracer, StderrTracer},
    value::Literal,
};
