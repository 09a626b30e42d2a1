//! Arithmetic, bitwise, and string operators.
//!
//! Integer results that overflow 64 bits are promoted to floats.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::diagnostic::Diagnostics;
use crate::error::{Error, ErrorKind, Result};
use crate::numeric::{Number, Numeric, classify};
use crate::value::Value;

use super::cast::{to_int, to_number, to_string};

fn numeric_operands(
    op: &'static str,
    a: &Value,
    b: &Value,
    diag: &mut Diagnostics,
) -> Result<(Number, Number)> {
    let (a, b) = (a.deref_value(), b.deref_value());
    if matches!(a, Value::Array(_)) || matches!(b, Value::Array(_)) {
        return Err(Error::unsupported_operands(op, a.value_type(), b.value_type()));
    }
    Ok((to_number(&a, diag), to_number(&b, diag)))
}

fn number_value(n: Number) -> Value {
    match n {
        Number::Int(i) => Value::Int(i),
        Number::Float(f) => Value::Float(f),
    }
}

fn int_op(
    a: Number,
    b: Number,
    checked: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Value {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            checked(x, y).map_or_else(|| Value::Float(float(x as f64, y as f64)), Value::Int)
        }
        _ => Value::Float(float(a.as_f64(), b.as_f64())),
    }
}

/// Addition. Two arrays produce their left-biased union.
///
/// # Errors
///
/// Returns an error when exactly one operand is an array.
pub fn add(a: &Value, b: &Value, diag: &mut Diagnostics) -> Result<Value> {
    if let (Value::Array(x), Value::Array(y)) = (a.deref_value(), b.deref_value()) {
        return Ok(Value::Array(x.union(&y)));
    }
    let (x, y) = numeric_operands("+", a, b, diag)?;
    Ok(int_op(x, y, i64::checked_add, |p, q| p + q))
}

/// Subtraction.
///
/// # Errors
///
/// Returns an error when an operand is an array.
pub fn sub(a: &Value, b: &Value, diag: &mut Diagnostics) -> Result<Value> {
    let (x, y) = numeric_operands("-", a, b, diag)?;
    Ok(int_op(x, y, i64::checked_sub, |p, q| p - q))
}

/// Multiplication.
///
/// # Errors
///
/// Returns an error when an operand is an array.
pub fn mul(a: &Value, b: &Value, diag: &mut Diagnostics) -> Result<Value> {
    let (x, y) = numeric_operands("*", a, b, diag)?;
    Ok(int_op(x, y, i64::checked_mul, |p, q| p * q))
}

/// Division. Integer operands that divide evenly stay integers.
///
/// # Errors
///
/// Returns an error on division by zero or array operands.
pub fn div(a: &Value, b: &Value, diag: &mut Diagnostics) -> Result<Value> {
    let (x, y) = numeric_operands("/", a, b, diag)?;
    if y.as_f64() == 0.0 {
        return Err(Error::new(ErrorKind::DivisionByZero));
    }
    if let (Number::Int(p), Number::Int(q)) = (x, y) {
        if p.checked_rem(q) == Some(0) {
            if let Some(quotient) = p.checked_div(q) {
                return Ok(Value::Int(quotient));
            }
        }
    }
    Ok(Value::Float(x.as_f64() / y.as_f64()))
}

/// Integer remainder; the sign follows the dividend.
///
/// # Errors
///
/// Returns an error on modulo by zero or array operands.
pub fn modulo(a: &Value, b: &Value, diag: &mut Diagnostics) -> Result<Value> {
    let (x, y) = int_operands("%", a, b, diag)?;
    if y == 0 {
        return Err(Error::new(ErrorKind::ModuloByZero));
    }
    Ok(Value::Int(x.wrapping_rem(y)))
}

/// Exponentiation.
///
/// # Errors
///
/// Returns an error when an operand is an array.
pub fn pow(a: &Value, b: &Value, diag: &mut Diagnostics) -> Result<Value> {
    let (x, y) = numeric_operands("**", a, b, diag)?;
    if let (Number::Int(base), Number::Int(exp)) = (x, y) {
        if let Ok(exp) = u32::try_from(exp) {
            if let Some(result) = base.checked_pow(exp) {
                return Ok(Value::Int(result));
            }
        }
    }
    Ok(Value::Float(x.as_f64().powf(y.as_f64())))
}

fn int_operands(
    op: &'static str,
    a: &Value,
    b: &Value,
    diag: &mut Diagnostics,
) -> Result<(i64, i64)> {
    let (a, b) = (a.deref_value(), b.deref_value());
    if matches!(a, Value::Array(_) | Value::Object(_))
        || matches!(b, Value::Array(_) | Value::Object(_))
    {
        return Err(Error::unsupported_operands(op, a.value_type(), b.value_type()));
    }
    Ok((to_int(&a, diag), to_int(&b, diag)))
}

/// Bitwise and.
///
/// # Errors
///
/// Returns an error for array or object operands.
pub fn bit_and(a: &Value, b: &Value, diag: &mut Diagnostics) -> Result<Value> {
    let (x, y) = int_operands("&", a, b, diag)?;
    Ok(Value::Int(x & y))
}

/// Bitwise or.
///
/// # Errors
///
/// Returns an error for array or object operands.
pub fn bit_or(a: &Value, b: &Value, diag: &mut Diagnostics) -> Result<Value> {
    let (x, y) = int_operands("|", a, b, diag)?;
    Ok(Value::Int(x | y))
}

/// Bitwise exclusive or.
///
/// # Errors
///
/// Returns an error for array or object operands.
pub fn bit_xor(a: &Value, b: &Value, diag: &mut Diagnostics) -> Result<Value> {
    let (x, y) = int_operands("^", a, b, diag)?;
    Ok(Value::Int(x ^ y))
}

/// Bitwise complement.
///
/// # Errors
///
/// Returns an error for operands other than numbers and strings.
pub fn bit_not(a: &Value, diag: &mut Diagnostics) -> Result<Value> {
    match a.deref_value() {
        v @ (Value::Int(_) | Value::Float(_) | Value::String(_)) => Ok(Value::Int(!to_int(&v, diag))),
        other => Err(Error::new(ErrorKind::TypeMismatch {
            expected: crate::Type::Int,
            actual: other.value_type(),
        })),
    }
}

/// Left shift.
///
/// # Errors
///
/// Returns an error for negative shift amounts or array operands.
pub fn shift_left(a: &Value, b: &Value, diag: &mut Diagnostics) -> Result<Value> {
    let (x, y) = int_operands("<<", a, b, diag)?;
    match y {
        i64::MIN..0 => Err(Error::new(ErrorKind::NegativeShift)),
        0..64 => Ok(Value::Int(x.wrapping_shl(y as u32))),
        _ => Ok(Value::Int(0)),
    }
}

/// Arithmetic right shift.
///
/// # Errors
///
/// Returns an error for negative shift amounts or array operands.
pub fn shift_right(a: &Value, b: &Value, diag: &mut Diagnostics) -> Result<Value> {
    let (x, y) = int_operands(">>", a, b, diag)?;
    match y {
        i64::MIN..0 => Err(Error::new(ErrorKind::NegativeShift)),
        0..64 => Ok(Value::Int(x >> y)),
        _ => Ok(Value::Int(if x < 0 { -1 } else { 0 })),
    }
}

/// String concatenation.
///
/// # Errors
///
/// Returns an error for objects.
pub fn concat(a: &Value, b: &Value, diag: &mut Diagnostics) -> Result<Value> {
    let left = to_string(a, diag)?;
    let right = to_string(b, diag)?;
    let mut joined = String::with_capacity(left.len() + right.len());
    joined.push_str(&left);
    joined.push_str(&right);
    Ok(Value::from(joined))
}

fn step(value: &Value, delta: i64, diag: &mut Diagnostics) -> Value {
    let number = match value.deref_value() {
        Value::Float(f) => Number::Float(f),
        Value::Int(n) => Number::Int(n),
        Value::String(s) => match classify(&s) {
            Numeric::Whole(n) => n,
            _ => Number::Int(to_int(&Value::String(s), diag)),
        },
        other => Number::Int(to_int(&other, diag)),
    };
    match number {
        Number::Int(n) => n
            .checked_add(delta)
            .map_or_else(|| Value::Float(n as f64 + delta as f64), Value::Int),
        Number::Float(f) => number_value(Number::Float(f + delta as f64)),
    }
}

/// `++`: floats stay floats, everything else steps as an integer.
pub fn increment(value: &Value, diag: &mut Diagnostics) -> Value {
    step(value, 1, diag)
}

/// `--`: floats stay floats, everything else steps as an integer.
pub fn decrement(value: &Value, diag: &mut Diagnostics) -> Value {
    step(value, -1, diag)
}
