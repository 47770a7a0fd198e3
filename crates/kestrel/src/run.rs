//! Public interface for running kestrel code.

use crate::{
    ast::Ast,
    error::Error,
    kcode::Machine,
    parse::{ParseError, parse},
    value::Literal,
};

/// Evaluates a whole program on a fresh machine.
///
/// Each top-level form is compiled and run in order; the result is the
/// value of the final non-install form, or `nil` when the program is all
/// installs.
///
/// # Example
/// ```
/// let value = kestrel::eval("x = 10; x+11", "example.ks").unwrap();
/// assert_eq!(value.to_string(), "21");
/// ```
pub fn eval(source: &str, file_name: &str) -> Result<Literal, Error> {
    let mut machine = Machine::new();
    eval_with(&mut machine, source, file_name)
}

/// Evaluates a program against an existing machine, so installs from
/// earlier evaluations stay visible.
pub fn eval_with(machine: &mut Machine, source: &str, file_name: &str) -> Result<Literal, Error> {
    eval_forms(machine, &parse(source, file_name)?)
}

fn eval_forms(machine: &mut Machine, forms: &[Ast]) -> Result<Literal, Error> {
    let mut last = Literal::Nil;
    for form in forms {
        let code = machine.compile(form)?;
        let value = machine.run(code)?;
        if !matches!(form, Ast::Assign { .. }) {
            last = value;
        }
    }
    Ok(last)
}

/// A parsed program, cached for repeated or deferred evaluation.
///
/// Programs serialize to a compact binary form; symbols travel as their
/// names and re-intern on load, so a dump made by one process evaluates
/// identically in another.
///
/// # Example
/// ```
/// use kestrel::{Machine, Program};
///
/// let program = Program::parse("letrec x = 10 in x*x", "example.ks").unwrap();
/// let bytes = program.dump().unwrap();
/// let restored = Program::load(&bytes).unwrap();
/// let value = restored.eval(&mut Machine::new()).unwrap();
/// assert_eq!(value.to_string(), "100");
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Program {
    forms: Vec<Ast>,
}

impl Program {
    /// Parses a whole program without evaluating it.
    pub fn parse(source: &str, file_name: &str) -> Result<Self, ParseError> {
        Ok(Self {
            forms: parse(source, file_name)?,
        })
    }

    /// The top-level forms, in source order.
    #[must_use]
    pub fn forms(&self) -> &[Ast] {
        &self.forms
    }

    /// Evaluates the program against `machine`, returning the value of
    /// the final non-install form.
    pub fn eval(&self, machine: &mut Machine) -> Result<Literal, Error> {
        eval_forms(machine, &self.forms)
    }

    /// Serializes the program to a binary format for caching.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Deserializes a program produced by [`Program::dump`].
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
