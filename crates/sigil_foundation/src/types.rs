//! Runtime type tags.
//!
//! Each tag carries the numeric code used as the operand of the `Cast`
//! instruction. The codes double as the juggling precedence: when two
//! values of different types meet in a comparison, both are converted to
//! the type with the larger code.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Type tag of a runtime value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u32)]
pub enum Type {
    /// The null type (only value: null).
    Null = 1,
    /// 64-bit signed integer.
    Int = 2,
    /// 64-bit floating point.
    Float = 4,
    /// String type.
    String = 8,
    /// Ordered associative array.
    Array = 16,
    /// Object handle.
    Object = 32,
    /// Boolean type.
    Bool = 64,
}

impl Type {
    /// All type tags, in code order.
    pub const ALL: [Self; 7] = [
        Self::Null,
        Self::Int,
        Self::Float,
        Self::String,
        Self::Array,
        Self::Object,
        Self::Bool,
    ];

    /// Returns the numeric code of this type.
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Looks a type up by its numeric code.
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Returns the type both operands are converted to before a loose
    /// comparison.
    #[must_use]
    pub fn juggle(self, other: Self) -> Self {
        if self.code() >= other.code() {
            self
        } else {
            other
        }
    }

    /// Parses a type name as written in casts and parameter declarations.
    ///
    /// Names are case-insensitive and accept the long aliases
    /// (`integer`, `double`, `boolean`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "null" | "unset" => Some(Self::Null),
            "int" | "integer" => Some(Self::Int),
            "float" | "double" => Some(Self::Float),
            "string" => Some(Self::String),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            "bool" | "boolean" => Some(Self::Bool),
            _ => None,
        }
    }

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
            Self::Bool => "bool",
        }
    }

    /// Returns the name reported by `gettype()`.
    #[must_use]
    pub const fn gettype_name(self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Int => "integer",
            Self::Float => "double",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
            Self::Bool => "boolean",
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_bits() {
        let mut seen = 0;
        for ty in Type::ALL {
            assert_eq!(ty.code().count_ones(), 1);
            assert_eq!(seen & ty.code(), 0);
            seen |= ty.code();
            assert_eq!(Type::from_code(ty.code()), Some(ty));
        }
        assert_eq!(Type::from_code(3), None);
    }

    #[test]
    fn juggle_prefers_higher_code() {
        assert_eq!(Type::Int.juggle(Type::Float), Type::Float);
        assert_eq!(Type::String.juggle(Type::Int), Type::String);
        assert_eq!(Type::Null.juggle(Type::Array), Type::Array);
        assert_eq!(Type::Array.juggle(Type::Bool), Type::Bool);
        assert_eq!(Type::Null.juggle(Type::Null), Type::Null);
    }

    #[test]
    fn names_round_trip() {
        for ty in Type::ALL {
            assert_eq!(Type::from_name(ty.name()), Some(ty));
        }
        assert_eq!(Type::from_name("INTEGER"), Some(Type::Int));
        assert_eq!(Type::from_name("double"), Some(Type::Float));
        assert_eq!(Type::from_name("callable"), None);
    }
}
