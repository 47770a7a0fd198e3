//! Runtime literal values.

use std::fmt;

/// A ground value produced by reduction.
///
/// The language has exactly three kinds of value: signed 64-bit integers,
/// booleans (produced by the relational operators), and `nil` (produced by
/// a top-level install). Booleans coerce to `0`/`1` when used as integer
/// operands; `nil` never coerces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Nil,
}

impl Literal {
    /// Returns the integer view of this literal, coercing booleans to 0/1.
    ///
    /// `None` for `nil`, which has no integer reading.
    #[must_use]
    pub fn as_int(self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(v),
            Self::Bool(b) => Some(i64::from(b)),
            Self::Nil => None,
        }
    }

    /// Integer truthiness for conditionals: any non-zero integer is true.
    ///
    /// `None` for `nil`.
    #[must_use]
    pub fn truthy(self) -> Option<bool> {
        match self {
            Self::Int(v) => Some(v != 0),
            Self::Bool(b) => Some(b),
            Self::Nil => None,
        }
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Nil => f.write_str("nil"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(Literal::Int(21).to_string(), "21");
        assert_eq!(Literal::Bool(true).to_string(), "true");
        assert_eq!(Literal::Bool(false).to_string(), "false");
        assert_eq!(Literal::Nil.to_string(), "nil");
    }

    #[test]
    fn bool_coerces_to_int() {
        assert_eq!(Literal::Bool(true).as_int(), Some(1));
        assert_eq!(Literal::Bool(false).as_int(), Some(0));
        assert_eq!(Literal::Nil.as_int(), None);
    }

    #[test]
    fn truthiness_is_nonzero() {
        assert_eq!(Literal::Int(0).truthy(), Some(false));
        assert_eq!(Literal::Int(-3).truthy(), Some(true));
        assert_eq!(Literal::Nil.truthy(), None);
    }
}
