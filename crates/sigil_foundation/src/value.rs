//! Core value type for all Sigil data.

use std::fmt;
use std::sync::Arc;

use crate::array::Array;
use crate::numeric::format_float;
use crate::object::Object;
use crate::reference::Reference;
use crate::types::Type;

/// Core value type for all Sigil data.
///
/// Scalars and strings are immutable. Arrays have value semantics backed
/// by persistent structures, so cloning is cheap and writes never leak
/// into other copies. References and objects are shared handles.
#[derive(Clone, Default)]
pub enum Value {
    /// The null value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// String value.
    String(Arc<str>),
    /// Ordered associative array.
    Array(Array),
    /// Shared mutable cell (by-reference binding).
    Reference(Reference),
    /// Object handle.
    Object(Object),
}

impl Value {
    /// Returns the type of this value, looking through references.
    #[must_use]
    pub fn value_type(&self) -> Type {
        match self {
            Self::Null => Type::Null,
            Self::Bool(_) => Type::Bool,
            Self::Int(_) => Type::Int,
            Self::Float(_) => Type::Float,
            Self::String(_) => Type::String,
            Self::Array(_) => Type::Array,
            Self::Reference(r) => r.borrow().value_type(),
            Self::Object(_) => Type::Object,
        }
    }

    /// Returns true if this value is null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true if this value is a reference cell.
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }

    /// Returns the value itself, or a copy of the referenced value.
    #[must_use]
    pub fn deref_value(&self) -> Self {
        match self {
            Self::Reference(r) => r.get(),
            other => other.clone(),
        }
    }

    /// Consumes the value, replacing a reference by a copy of its target.
    #[must_use]
    pub fn into_deref(self) -> Self {
        match self {
            Self::Reference(r) => r.get(),
            other => other,
        }
    }

    /// Returns true if this value is, or may contain, a reference.
    #[must_use]
    pub fn may_alias(&self) -> bool {
        match self {
            Self::Reference(_) => true,
            Self::Array(array) => array.may_alias(),
            _ => false,
        }
    }

    /// Copies the value for storage in a new location, dropping
    /// references that nothing else shares.
    #[must_use]
    pub fn separate(&self) -> Self {
        match self {
            Self::Reference(r) if r.alias_count() == 1 => r.get().separate(),
            Self::Array(array) => Self::Array(array.separate()),
            other => other.clone(),
        }
    }

    /// Like [`separate`](Self::separate), but detaches `target`: the value
    /// about to be stored into that cell.
    ///
    /// An element bound to `target` is replaced by the cell's current
    /// value, or dropped when `created` says the element did not exist
    /// before the write began. The copy never contains the cell it is
    /// written to.
    #[must_use]
    pub fn separate_from(&self, target: &Reference, created: bool) -> Self {
        match self {
            Self::Reference(r) if r.ptr_eq(target) => {
                if created {
                    Self::Null
                } else {
                    r.get().separate_from(target, created)
                }
            }
            Self::Reference(r) if r.alias_count() == 1 => r.get().separate_from(target, created),
            Self::Array(array) => Self::Array(array.separate_from(target, created)),
            other => other.clone(),
        }
    }

    /// Attempts to extract a boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to extract an integer value.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to extract a float value.
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Attempts to extract a string slice.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to borrow an array.
    #[must_use]
    pub const fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Attempts to extract an object handle.
    #[must_use]
    pub const fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Returns true for values that are falsy: null, false, 0, 0.0, `""`,
    /// `"0"` and the empty array.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !(s.is_empty() || &**s == "0"),
            Self::Array(a) => !a.is_empty(),
            Self::Reference(r) => r.borrow().is_truthy(),
            Self::Object(_) => true,
        }
    }
}

impl PartialEq for Value {
    /// Structural equality: same type and same value, arrays compared in
    /// order, references by target, objects by handle.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            #[allow(clippy::float_cmp)]
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Reference(a), Self::Reference(b)) => a.ptr_eq(b) || a.get() == b.get(),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{}", format_float(*x)),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Array(a) => write!(f, "{a:?}"),
            Self::Reference(r) => write!(f, "{r:?}"),
            Self::Object(o) => write!(f, "{o:?}"),
        }
    }
}

impl fmt::Display for Value {
    /// Renders the string conversion of the value without raising
    /// diagnostics (arrays render as `Array`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null | Self::Bool(false) => Ok(()),
            Self::Bool(true) => write!(f, "1"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{}", format_float(*x)),
            Self::String(s) => write!(f, "{s}"),
            Self::Array(_) => write!(f, "Array"),
            Self::Reference(r) => write!(f, "{}", *r.borrow()),
            Self::Object(o) => write!(f, "Object({})", o.class_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Self::String(s)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Self::Array(a)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}
