//! Conversions between value types.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use std::sync::Arc;

use crate::array::{Array, Key};
use crate::diagnostic::{Diagnostics, ErrorLevel};
use crate::error::{Error, ErrorKind, Result};
use crate::numeric::{Number, Numeric, classify, format_float};
use crate::object::Object;
use crate::types::Type;
use crate::value::Value;

/// Converts a string to a number, reporting strings that are not (or not
/// entirely) numeric.
fn string_to_number(s: &str, diag: &mut Diagnostics) -> Number {
    match classify(s) {
        Numeric::Whole(n) => n,
        Numeric::Leading(n) => {
            diag.notice("A non well formed numeric value encountered");
            n
        }
        Numeric::NonNumeric => {
            diag.warning("A non-numeric value encountered");
            Number::Int(0)
        }
    }
}

fn float_to_int(f: f64) -> i64 {
    if f.is_finite() { f as i64 } else { 0 }
}

/// Converts a value to a number for arithmetic.
pub fn to_number(value: &Value, diag: &mut Diagnostics) -> Number {
    match value {
        Value::Null => Number::Int(0),
        Value::Bool(b) => Number::Int(i64::from(*b)),
        Value::Int(n) => Number::Int(*n),
        Value::Float(f) => Number::Float(*f),
        Value::String(s) => string_to_number(s, diag),
        Value::Array(a) => Number::Int(i64::from(!a.is_empty())),
        Value::Reference(r) => to_number(&r.borrow(), diag),
        Value::Object(o) => {
            diag.warning(format!(
                "Object of class {} could not be converted to number",
                o.class_name()
            ));
            Number::Int(1)
        }
    }
}

/// Converts a value to an integer.
pub fn to_int(value: &Value, diag: &mut Diagnostics) -> i64 {
    match to_number(value, diag) {
        Number::Int(n) => n,
        Number::Float(f) => float_to_int(f),
    }
}

/// Converts a value to a float.
pub fn to_float(value: &Value, diag: &mut Diagnostics) -> f64 {
    to_number(value, diag).as_f64()
}

/// Converts a value to a boolean.
#[must_use]
pub fn to_bool(value: &Value) -> bool {
    value.is_truthy()
}

/// Converts a value to a string.
///
/// # Errors
///
/// Returns an error for objects, which have no string conversion.
pub fn to_string(value: &Value, diag: &mut Diagnostics) -> Result<Arc<str>> {
    Ok(match value {
        Value::Null | Value::Bool(false) => Arc::from(""),
        Value::Bool(true) => Arc::from("1"),
        Value::Int(n) => Arc::from(n.to_string()),
        Value::Float(f) => Arc::from(format_float(*f)),
        Value::String(s) => s.clone(),
        Value::Array(_) => {
            diag.warning("Array to string conversion");
            Arc::from("Array")
        }
        Value::Reference(r) => return to_string(&r.borrow(), diag),
        Value::Object(_) => {
            return Err(Error::new(ErrorKind::InvalidCast {
                from: Type::Object,
                to: Type::String,
            }));
        }
    })
}

/// Converts a value to an array.
///
/// Null becomes the empty array, scalars become `[0 => value]`, and
/// `stdClass` objects expose their properties.
///
/// # Errors
///
/// Returns an error for objects without properties.
pub fn to_array(value: &Value) -> Result<Array> {
    match value {
        Value::Null => Ok(Array::new()),
        Value::Array(a) => Ok(a.clone()),
        Value::Reference(r) => to_array(&r.borrow()),
        Value::Object(o) => o.properties().ok_or_else(|| {
            Error::new(ErrorKind::InvalidCast {
                from: Type::Object,
                to: Type::Array,
            })
        }),
        scalar => Ok(Array::from_values([scalar.clone()])),
    }
}

/// Converts a value to an object.
///
/// Arrays become `stdClass` objects with one property per entry; other
/// scalars are wrapped in a `scalar` property.
#[must_use]
pub fn to_object(value: &Value) -> Object {
    match value {
        Value::Object(o) => o.clone(),
        Value::Null => Object::std_class(Array::new()),
        Value::Array(a) => Object::std_class(a.clone()),
        Value::Reference(r) => to_object(&r.borrow()),
        scalar => {
            let mut props = Array::new();
            props.insert(Key::from("scalar"), scalar.clone());
            Object::std_class(props)
        }
    }
}

/// Converts a value to an array key.
///
/// Returns `None` (after a warning) for arrays and objects.
pub fn to_key(value: &Value, diag: &mut Diagnostics) -> Option<Key> {
    match value {
        Value::Null => Some(Key::Str(Arc::from(""))),
        Value::Bool(b) => Some(Key::Int(i64::from(*b))),
        Value::Int(n) => Some(Key::Int(*n)),
        Value::Float(f) => {
            if f.fract() != 0.0 {
                diag.throw(
                    ErrorLevel::DEPRECATED,
                    format!(
                        "Implicit conversion from float {} to int loses precision",
                        format_float(*f)
                    ),
                );
            }
            Some(Key::Int(float_to_int(*f)))
        }
        Value::String(s) => Some(Key::from_string(s)),
        Value::Reference(r) => to_key(&r.borrow(), diag),
        Value::Array(_) | Value::Object(_) => {
            diag.warning("Illegal offset type");
            None
        }
    }
}

/// Converts a value to the given type.
///
/// # Errors
///
/// Returns an error when the conversion has no defined path
/// (objects to strings, non-`stdClass` objects to arrays).
pub fn cast(value: &Value, to: Type, diag: &mut Diagnostics) -> Result<Value> {
    let value = value.deref_value();
    Ok(match to {
        Type::Null => Value::Null,
        Type::Bool => Value::Bool(to_bool(&value)),
        Type::Int => match &value {
            Value::Int(_) => value,
            _ => Value::Int(to_int(&value, diag)),
        },
        Type::Float => Value::Float(to_float(&value, diag)),
        Type::String => Value::String(to_string(&value, diag)?),
        Type::Array => Value::Array(to_array(&value)?),
        Type::Object => Value::Object(to_object(&value)),
    })
}
