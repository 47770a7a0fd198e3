//! Source-level expression tree.
//!
//! Every node carries the position of the token that introduced it, for
//! error reporting from the compiler and the machine. Multi-argument
//! lambdas are desugared by the parser, so `Lambda` always binds exactly
//! one argument, and `ApplyBuiltin` is always saturated.

use std::fmt;

use crate::{builtins::BuiltinOp, lex::SourcePos, symbol::Symbol, value::Literal};

/// A source expression or top-level form.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Ast {
    /// A literal expression.
    Const { pos: SourcePos, value: Literal },
    /// An identifier reference.
    Var { pos: SourcePos, sym: Symbol },
    /// A single-argument abstraction.
    Lambda {
        pos: SourcePos,
        arg: Symbol,
        body: Box<Ast>,
    },
    /// An application `head tail`.
    Apply {
        pos: SourcePos,
        head: Box<Ast>,
        tail: Box<Ast>,
    },
    /// A top-level binding `sym = expr`.
    Assign {
        pos: SourcePos,
        sym: Symbol,
        expr: Box<Ast>,
    },
    /// Mutually recursive local bindings, all visible to each other and to
    /// the body.
    Letrec {
        pos: SourcePos,
        bindings: Vec<(Symbol, Ast)>,
        body: Box<Ast>,
    },
    /// A three-armed conditional.
    If {
        pos: SourcePos,
        cond: Box<Ast>,
        then: Box<Ast>,
        els: Box<Ast>,
    },
    /// A saturated primitive application; `args.len()` always equals the
    /// arity of `op`.
    ApplyBuiltin {
        pos: SourcePos,
        op: BuiltinOp,
        args: Vec<Ast>,
    },
}

impl Ast {
    /// The source location of this node.
    #[must_use]
    pub fn pos(&self) -> SourcePos {
        match self {
            Self::Const { pos, .. }
            | Self::Var { pos, .. }
            | Self::Lambda { pos, .. }
            | Self::Apply { pos, .. }
            | Self::Assign { pos, .. }
            | Self::Letrec { pos, .. }
            | Self::If { pos, .. }
            | Self::ApplyBuiltin { pos, .. } => *pos,
        }
    }
}

/// Renders the node back to surface syntax. Compound subterms are always
/// parenthesised, so the output re-parses to the same tree.
impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const { value, .. } => write!(f, "{value}"),
            Self::Var { sym, .. } => write!(f, "{sym}"),
            Self::Lambda { arg, body, .. } => write!(f, "\\{arg} -> {body}"),
            Self::Apply { head, tail, .. } => {
                write_operand(f, head)?;
                f.write_str(" ")?;
                write_operand(f, tail)
            }
            Self::Assign { sym, expr, .. } => write!(f, "{sym} = {expr}"),
            Self::Letrec { bindings, body, .. } => {
                f.write_str("letrec ")?;
                for (i, (sym, expr)) in bindings.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{sym} = {expr}")?;
                }
                write!(f, " in {body}")
            }
            Self::If { cond, then, els, .. } => {
                f.write_str("if ")?;
                write_operand(f, cond)?;
                f.write_str(" ")?;
                write_operand(f, then)?;
                f.write_str(" ")?;
                write_operand(f, els)
            }
            Self::ApplyBuiltin { op, args, .. } => match args.as_slice() {
                [lhs, rhs] => {
                    write_operand(f, lhs)?;
                    write!(f, " {op} ")?;
                    write_operand(f, rhs)
                }
                args => {
                    write!(f, "{op}")?;
                    for arg in args {
                        f.write_str(" ")?;
                        write_operand(f, arg)?;
                    }
                    Ok(())
                }
            },
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, node: &Ast) -> fmt::Result {
    if matches!(node, Ast::Const { .. } | Ast::Var { .. }) {
        write!(f, "{node}")
    } else {
        write!(f, "({node})")
    }
}
