//! Type juggling: coercions, casts, comparison, and arithmetic.
//!
//! Every operation takes the [`Diagnostics`](crate::Diagnostics) sink of the
//! running context. Recoverable conditions are reported there and yield a
//! sentinel; conditions with no sensible result return an
//! [`Error`](crate::Error).

mod arith;
mod cast;
mod compare;

pub use arith::{
    add, bit_and, bit_not, bit_or, bit_xor, concat, decrement, div, increment, modulo, mul, pow,
    shift_left, shift_right, sub,
};
pub use cast::{cast, to_array, to_bool, to_float, to_int, to_key, to_number, to_object, to_string};
pub use compare::{compare, identical, loose_equal};
