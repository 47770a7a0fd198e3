//! AST to K-code translation.
//!
//! The compiler resolves every identifier to an address: a scan of the
//! local frame stack innermost-first, falling back to the machine's global
//! table. Local frames are pushed for lambda arguments and letrec binding
//! groups and popped when their scope ends; shadowing is by scope depth,
//! not by name. Compilation is pure except for the growing global table.

use std::{fmt, rc::Rc};

use crate::{
    ast::Ast,
    builtins::BuiltinOp,
    kcode::{
        code::{KAddr, KCode, LocalAddr},
        machine::GlobalTable,
    },
    lex::SourcePos,
    symbol::Symbol,
};

/// A name-resolution or arity failure, positioned at the offending node.
#[derive(Debug, Clone)]
pub enum CompileError {
    /// An identifier that matches no local frame and no global slot.
    Unresolved { sym: Symbol, pos: SourcePos },
    /// A binding form whose name resolves into an enclosing local frame.
    AssignToLocal { sym: Symbol, pos: SourcePos },
    /// A binding form anywhere other than the top level.
    AssignNested { sym: Symbol, pos: SourcePos },
    /// A primitive applied with an unsupported number of arguments.
    BuiltinArity {
        op: BuiltinOp,
        expected: usize,
        found: usize,
        pos: SourcePos,
    },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved { sym, pos } => write!(f, "{pos}: unresolved identifier '{sym}'"),
            Self::AssignToLocal { sym, pos } => write!(f, "{pos}: assign of '{sym}' resolved to a local slot"),
            Self::AssignNested { sym, pos } => write!(f, "{pos}: assign of '{sym}' is only legal at the top level"),
            Self::BuiltinArity {
                op,
                expected,
                found,
                pos,
            } => {
                write!(f, "{pos}: builtin '{op}' expects {expected} arguments, got {found}")
            }
        }
    }
}

impl std::error::Error for CompileError {}

pub(crate) struct Compiler<'m> {
    /// Stack of local frames; the last entry is the innermost scope.
    locals: Vec<Vec<Symbol>>,
    globals: &'m mut GlobalTable,
}

impl<'m> Compiler<'m> {
    pub(crate) fn new(globals: &'m mut GlobalTable) -> Self {
        Self {
            locals: Vec::new(),
            globals,
        }
    }

    /// Compiles one top-level form. `Assign` is only legal here: it
    /// declares (or re-uses) the global slot before compiling its
    /// right-hand side, so self-references resolve into the slot being
    /// installed.
    pub(crate) fn compile_toplevel(&mut self, ast: &Ast) -> Result<Rc<KCode>, CompileError> {
        if let Ast::Assign { sym, expr, .. } = ast {
            let slot = self.declare_global(*sym);
            let expr = self.compile(expr)?;
            return Ok(Rc::new(KCode::Assign { slot, expr }));
        }
        self.compile(ast)
    }

    fn compile(&mut self, ast: &Ast) -> Result<Rc<KCode>, CompileError> {
        match ast {
            Ast::Const { value, .. } => Ok(Rc::new(KCode::Const(*value))),
            Ast::Var { pos, sym } => match self.lookup(*sym) {
                Some(KAddr::Local(addr)) => Ok(Rc::new(KCode::LocalVar(addr))),
                Some(KAddr::Global { slot }) => Ok(Rc::new(KCode::GlobalVar { slot })),
                None => Err(CompileError::Unresolved { sym: *sym, pos: *pos }),
            },
            Ast::Lambda { arg, body, .. } => {
                self.locals.push(vec![*arg]);
                let body = self.compile(body);
                self.locals.pop();
                Ok(Rc::new(KCode::Lambda { arg: *arg, body: body? }))
            }
            Ast::Apply { head, tail, .. } => Ok(Rc::new(KCode::Apply {
                head: self.compile(head)?,
                tail: self.compile(tail)?,
            })),
            Ast::Letrec { bindings, body, .. } => {
                // The frame is pushed before any binding is compiled, so
                // every binding and the body resolve into it.
                self.locals.push(bindings.iter().map(|(sym, _)| *sym).collect());
                let compiled = self.compile_letrec(bindings, body);
                self.locals.pop();
                compiled
            }
            Ast::If { cond, then, els, .. } => Ok(Rc::new(KCode::If {
                cond: self.compile(cond)?,
                then: self.compile(then)?,
                els: self.compile(els)?,
            })),
            Ast::ApplyBuiltin { pos, op, args } => self.compile_builtin(*op, args, *pos),
            Ast::Assign { pos, sym, .. } => {
                if self.locals.is_empty() {
                    Err(CompileError::AssignNested { sym: *sym, pos: *pos })
                } else {
                    Err(CompileError::AssignToLocal { sym: *sym, pos: *pos })
                }
            }
        }
    }

    fn compile_letrec(&mut self, bindings: &[(Symbol, Ast)], body: &Ast) -> Result<Rc<KCode>, CompileError> {
        let bindings = bindings
            .iter()
            .map(|(sym, expr)| Ok((*sym, self.compile(expr)?)))
            .collect::<Result<Vec<_>, CompileError>>()?;
        Ok(Rc::new(KCode::Letrec {
            bindings,
            body: self.compile(body)?,
        }))
    }

    /// Saturated primitive application. An arity-1 opcode compiles to its
    /// forced operand chained into the opcode; an arity-2 opcode threads a
    /// stack swap between the operands so both arrive forced, in source
    /// order, under the opcode.
    fn compile_builtin(&mut self, op: BuiltinOp, args: &[Ast], pos: SourcePos) -> Result<Rc<KCode>, CompileError> {
        if args.len() != op.arity() {
            return Err(CompileError::BuiltinArity {
                op,
                expected: op.arity(),
                found: args.len(),
                pos,
            });
        }
        match args {
            [arg] => Ok(Rc::new(KCode::Apply {
                head: self.compile(arg)?,
                tail: Rc::new(KCode::BuiltinOp(op)),
            })),
            [arg0, arg1] => {
                let forced0 = Rc::new(KCode::Apply {
                    head: self.compile(arg0)?,
                    tail: Rc::new(KCode::SwapStack(1)),
                });
                let operands = Rc::new(KCode::Apply {
                    head: forced0,
                    tail: self.compile(arg1)?,
                });
                Ok(Rc::new(KCode::Apply {
                    head: operands,
                    tail: Rc::new(KCode::BuiltinOp(op)),
                }))
            }
            _ => Err(CompileError::BuiltinArity {
                op,
                expected: op.arity(),
                found: args.len(),
                pos,
            }),
        }
    }

    /// Innermost-first scan of the local frames, then the global table.
    fn lookup(&self, sym: Symbol) -> Option<KAddr> {
        for (depth, frame) in self.locals.iter().rev().enumerate() {
            if let Some(slot) = frame.iter().position(|&name| name == sym) {
                return Some(KAddr::Local(LocalAddr {
                    frame: u16::try_from(depth).expect("local frame depth overflow"),
                    slot: u16::try_from(slot).expect("local slot index overflow"),
                }));
            }
        }
        let slot = self.globals.get_index_of(&sym)?;
        Some(KAddr::Global {
            slot: u32::try_from(slot).expect("global table overflow"),
        })
    }

    /// Returns the slot for `sym`, creating an empty one on first use.
    /// Re-assignment reuses the index (so previously compiled references
    /// observe the new binding) and leaves the currently installed value
    /// untouched until the assign actually runs.
    fn declare_global(&mut self, sym: Symbol) -> u32 {
        let entry = self.globals.entry(sym);
        let slot = entry.index();
        entry.or_insert(None);
        u32::try_from(slot).expect("global table overflow")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{kcode::Machine, parse::parse, value::Literal};

    fn compile_one(machine: &mut Machine, source: &str) -> Rc<KCode> {
        let forms = parse(source, "test.ks").unwrap();
        assert_eq!(forms.len(), 1);
        machine.compile(&forms[0]).unwrap()
    }

    #[test]
    fn lambda_argument_resolves_to_the_innermost_frame() {
        let mut machine = Machine::new();
        let code = compile_one(&mut machine, r"\x -> \y -> x");
        let KCode::Lambda { body, .. } = &*code else {
            panic!("expected lambda");
        };
        let KCode::Lambda { body, .. } = &**body else {
            panic!("expected nested lambda");
        };
        assert_eq!(**body, KCode::LocalVar(LocalAddr { frame: 1, slot: 0 }));
    }

    #[test]
    fn shadowing_is_by_scope_depth() {
        let mut machine = Machine::new();
        let code = compile_one(&mut machine, r"\x -> \x -> x");
        let KCode::Lambda { body, .. } = &*code else {
            panic!("expected lambda");
        };
        let KCode::Lambda { body, .. } = &**body else {
            panic!("expected nested lambda");
        };
        assert_eq!(**body, KCode::LocalVar(LocalAddr { frame: 0, slot: 0 }));
    }

    #[test]
    fn letrec_bindings_resolve_each_other() {
        let mut machine = Machine::new();
        let code = compile_one(&mut machine, "letrec x = y; y = 1 in x");
        let KCode::Letrec { bindings, body } = &*code else {
            panic!("expected letrec");
        };
        // x's right-hand side sees y in the same frame.
        assert_eq!(*bindings[0].1, KCode::LocalVar(LocalAddr { frame: 0, slot: 1 }));
        assert_eq!(**body, KCode::LocalVar(LocalAddr { frame: 0, slot: 0 }));
    }

    #[test]
    fn unresolved_identifier_fails_with_position() {
        let mut machine = Machine::new();
        let forms = parse("missing+1", "test.ks").unwrap();
        let err = machine.compile(&forms[0]).unwrap_err();
        assert!(err.to_string().contains("unresolved identifier 'missing'"), "{err}");
        assert!(err.to_string().contains("test.ks:1:1"), "{err}");
    }

    #[test]
    fn binary_builtin_desugars_through_a_stack_swap() {
        let mut machine = Machine::new();
        let code = compile_one(&mut machine, "10+11");
        let KCode::Apply { head, tail } = &*code else {
            panic!("expected application");
        };
        assert_eq!(**tail, KCode::BuiltinOp(BuiltinOp::Add));
        let KCode::Apply { head, tail } = &**head else {
            panic!("expected operand chain");
        };
        assert_eq!(**tail, KCode::Const(Literal::Int(11)));
        let KCode::Apply { head, tail } = &**head else {
            panic!("expected swap chain");
        };
        assert_eq!(**head, KCode::Const(Literal::Int(10)));
        assert_eq!(**tail, KCode::SwapStack(1));
    }

    #[test]
    fn assign_reuses_the_existing_slot() {
        let mut machine = Machine::new();
        let first = compile_one(&mut machine, "x = 10");
        let second = compile_one(&mut machine, "x = 20");
        let (KCode::Assign { slot: a, .. }, KCode::Assign { slot: b, .. }) = (&*first, &*second) else {
            panic!("expected assigns");
        };
        assert_eq!(a, b);
    }

    #[test]
    fn assign_under_a_lambda_is_rejected() {
        let mut machine = Machine::new();
        let forms = parse("x = 1", "test.ks").unwrap();
        let Ast::Assign { pos, sym, expr } = forms[0].clone() else {
            panic!("expected assign");
        };
        let nested = Ast::Lambda {
            pos,
            arg: Symbol::intern("y"),
            body: Box::new(Ast::Assign { pos, sym, expr }),
        };
        let err = machine.compile(&nested).unwrap_err();
        assert!(err.to_string().contains("resolved to a local slot"), "{err}");
    }

    #[test]
    fn unsaturated_builtin_is_rejected() {
        let mut machine = Machine::new();
        let forms = parse("10", "test.ks").unwrap();
        let unsaturated = Ast::ApplyBuiltin {
            pos: forms[0].pos(),
            op: BuiltinOp::Add,
            args: vec![forms[0].clone()],
        };
        let err = machine.compile(&unsaturated).unwrap_err();
        assert!(err.to_string().contains("expects 2 arguments, got 1"), "{err}");
    }
}
