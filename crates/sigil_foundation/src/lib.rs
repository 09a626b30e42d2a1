//! Core value model, ordered arrays, and coercion rules for Sigil.
//!
//! This crate provides:
//! - [`Value`] - The tagged runtime value (scalars, arrays, references, objects)
//! - [`Array`] - Insertion-ordered hash table with a dense list mode
//! - [`Reference`] - Shared mutable cell backing by-reference aliasing
//! - [`Type`] - Type tags with their cast codes and juggling precedence
//! - [`Diagnostics`] - Leveled, non-fatal runtime diagnostics
//! - [`Error`] - Rich error types with context
//!
//! The [`ops`] module implements the language's type juggling: loose and
//! strict comparison, arithmetic promotion, bitwise operators and casts.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod array;
pub mod diagnostic;
pub mod dump;
pub mod error;
pub mod iterator;
pub mod numeric;
pub mod object;
pub mod ops;
pub mod reference;
#[cfg(feature = "serde")]
mod serde_impl;
pub mod types;
pub mod value;

pub use array::{Array, Key};
pub use diagnostic::{Diagnostic, Diagnostics, ErrorLevel};
pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use iterator::ArrayIterator;
pub use object::{Object, ObjectKind};
pub use reference::{Reference, WeakReference};
pub use types::Type;
pub use value::Value;
