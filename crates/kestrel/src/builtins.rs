//! Built-in primitive operators.
//!
//! Opcodes carry their arity in the low two bits of the discriminant, so
//! the machine can pop the right number of forced operands without a side
//! table. All core operators are binary over integers: arithmetic wraps,
//! relational operators produce booleans.

use strum::{Display, EnumString, FromRepr, IntoStaticStr};

use crate::{kcode::MachineError, value::Literal};

/// A primitive operator opcode.
///
/// Discriminants are laid out as `(index << 2) | arity`; [`BuiltinOp::arity`]
/// masks the low bits.
#[repr(u8)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, FromRepr, IntoStaticStr, serde::Serialize,
    serde::Deserialize,
)]
pub enum BuiltinOp {
    #[strum(serialize = "+")]
    Add = 0x02,
    #[strum(serialize = "-")]
    Sub = 0x06,
    #[strum(serialize = "*")]
    Mul = 0x0a,
    #[strum(serialize = "==")]
    Eq = 0x0e,
    #[strum(serialize = "!=")]
    Ne = 0x12,
    #[strum(serialize = "<")]
    Lt = 0x16,
    #[strum(serialize = "<=")]
    Le = 0x1a,
    #[strum(serialize = ">")]
    Gt = 0x1e,
    #[strum(serialize = ">=")]
    Ge = 0x22,
}

impl BuiltinOp {
    /// The number of operands this opcode consumes.
    #[must_use]
    pub fn arity(self) -> usize {
        (self as u8 & 0b11) as usize
    }

    /// Applies the operator to fully forced operands.
    ///
    /// The machine guarantees `args.len() == self.arity()`; operands that
    /// have no integer reading (`nil`) are a type error.
    pub(crate) fn apply(self, args: &[Literal]) -> Result<Literal, MachineError> {
        debug_assert_eq!(args.len(), self.arity());
        let int = |lit: Literal| lit.as_int().ok_or(MachineError::OperandType { op: self, found: lit });
        let lhs = int(args[0])?;
        let rhs = int(args[1])?;
        Ok(match self {
            Self::Add => Literal::Int(lhs.wrapping_add(rhs)),
            Self::Sub => Literal::Int(lhs.wrapping_sub(rhs)),
            Self::Mul => Literal::Int(lhs.wrapping_mul(rhs)),
            Self::Eq => Literal::Bool(lhs == rhs),
            Self::Ne => Literal::Bool(lhs != rhs),
            Self::Lt => Literal::Bool(lhs < rhs),
            Self::Le => Literal::Bool(lhs <= rhs),
            Self::Gt => Literal::Bool(lhs > rhs),
            Self::Ge => Literal::Bool(lhs >= rhs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BuiltinOp; 9] = [
        BuiltinOp::Add,
        BuiltinOp::Sub,
        BuiltinOp::Mul,
        BuiltinOp::Eq,
        BuiltinOp::Ne,
        BuiltinOp::Lt,
        BuiltinOp::Le,
        BuiltinOp::Gt,
        BuiltinOp::Ge,
    ];

    #[test]
    fn core_set_is_binary() {
        for op in ALL {
            assert_eq!(op.arity(), 2, "{op}");
        }
    }

    #[test]
    fn discriminants_are_unique() {
        for op in ALL {
            assert_eq!(BuiltinOp::from_repr(op as u8), Some(op));
        }
    }

    #[test]
    fn display_uses_operator_spelling() {
        assert_eq!(BuiltinOp::Add.to_string(), "+");
        assert_eq!(BuiltinOp::Ne.to_string(), "!=");
        assert_eq!("<=".parse::<BuiltinOp>().unwrap(), BuiltinOp::Le);
    }

    #[test]
    fn arithmetic_wraps() {
        let out = BuiltinOp::Add.apply(&[Literal::Int(i64::MAX), Literal::Int(1)]).unwrap();
        assert_eq!(out, Literal::Int(i64::MIN));
        let out = BuiltinOp::Mul.apply(&[Literal::Int(i64::MIN), Literal::Int(-1)]).unwrap();
        assert_eq!(out, Literal::Int(i64::MIN));
    }

    #[test]
    fn comparisons_produce_booleans() {
        let out = BuiltinOp::Le.apply(&[Literal::Int(10), Literal::Int(10)]).unwrap();
        assert_eq!(out, Literal::Bool(true));
        let out = BuiltinOp::Gt.apply(&[Literal::Int(10), Literal::Int(11)]).unwrap();
        assert_eq!(out, Literal::Bool(false));
    }

    #[test]
    fn booleans_coerce_as_operands() {
        let out = BuiltinOp::Add.apply(&[Literal::Bool(true), Literal::Int(10)]).unwrap();
        assert_eq!(out, Literal::Int(11));
    }

    #[test]
    fn nil_operand_is_a_type_error() {
        let err = BuiltinOp::Add.apply(&[Literal::Nil, Literal::Int(1)]).unwrap_err();
        assert!(err.to_string().contains("nil"), "{err}");
    }
}
