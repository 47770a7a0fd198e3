//! Persistent interactive session support.
//!
//! `ReplSession` keeps one machine alive across `execute()` calls so
//! interactive submissions share global installs and their memoised
//! values.

use crate::{error::Error, kcode::Machine, parse::parse, symbol::Symbol, value::Literal};

/// An interactive evaluation session with persistent machine state.
///
/// # Example
/// ```
/// use kestrel::ReplSession;
///
/// let mut session = ReplSession::new();
/// session.execute("x = 10").unwrap();
/// let value = session.execute("x+x").unwrap();
/// assert_eq!(value.to_string(), "20");
/// ```
#[derive(Debug, Default)]
pub struct ReplSession {
    machine: Machine,
    /// Count of submissions, used to name each one in error positions.
    submissions: u32,
}

impl ReplSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses, compiles, and runs one submission (one or more
    /// `;`-separated forms), returning the value of the last form.
    ///
    /// Installs return `nil`; their bindings stay visible to later
    /// submissions.
    pub fn execute(&mut self, source: &str) -> Result<Literal, Error> {
        self.submissions += 1;
        let file_name = format!("<repl:{}>", self.submissions);
        let mut last = Literal::Nil;
        for form in parse(source, &file_name)? {
            let code = self.machine.compile(&form)?;
            last = self.machine.run(code)?;
        }
        Ok(last)
    }

    /// Forces and returns the current value of a global installed by an
    /// earlier submission.
    pub fn global(&mut self, name: &str) -> Result<Literal, Error> {
        Ok(self.machine.force_global(Symbol::intern(name))?)
    }

    /// The underlying machine, for embedders that mix API levels.
    pub fn machine(&mut self) -> &mut Machine {
        &mut self.machine
    }
}
