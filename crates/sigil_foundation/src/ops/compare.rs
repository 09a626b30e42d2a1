//! Strict identity, loose equality, and ordering.
//!
//! Loose comparison converts both operands to the juggled type (see
//! [`Type::juggle`]) and compares there. Comparisons against null outside
//! the string and array rules compare truthiness.

use std::cmp::Ordering;

use crate::array::Array;
use crate::diagnostic::Diagnostics;
use crate::error::{Error, ErrorKind, Result};
use crate::numeric::{Number, parse_numeric};
use crate::types::Type;
use crate::value::Value;

use super::cast::{to_number, to_string};

/// Strict equality (`===`): same type and same value. Arrays must hold
/// identical pairs in the same order; objects must be the same handle.
#[must_use]
pub fn identical(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Reference(r), other) | (other, Value::Reference(r)) => {
            identical(&r.get(), other)
        }
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        #[allow(clippy::float_cmp)]
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => arrays_identical(x, y),
        (Value::Object(x), Value::Object(y)) => x.ptr_eq(y),
        _ => false,
    }
}

fn arrays_identical(a: &Array, b: &Array) -> bool {
    if a.len() != b.len() {
        return false;
    }
    if a.is_list() && b.is_list() {
        return a.values().zip(b.values()).all(|(x, y)| identical(x, y));
    }
    a.iter()
        .zip(b.iter())
        .all(|((ka, va), (kb, vb))| ka == kb && identical(va, vb))
}

/// Returns both operands as numbers if each is a number or a numeric
/// string.
fn numeric_pair(a: &Value, b: &Value) -> Option<(Number, Number)> {
    let as_number = |v: &Value| match v {
        Value::Int(n) => Some(Number::Int(*n)),
        Value::Float(f) => Some(Number::Float(*f)),
        Value::String(s) => parse_numeric(s),
        _ => None,
    };
    Some((as_number(a)?, as_number(b)?))
}

fn compare_numbers(a: Number, b: Number) -> Option<Ordering> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
        _ => a.as_f64().partial_cmp(&b.as_f64()),
    }
}

fn sign(ordering: Ordering) -> i64 {
    match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Loose equality (`==`).
///
/// # Errors
///
/// Returns an error when two distinct objects are compared, or an object
/// is compared with a scalar.
pub fn loose_equal(a: &Value, b: &Value, diag: &mut Diagnostics) -> Result<bool> {
    let (a, b) = (a.deref_value(), b.deref_value());
    match a.value_type().juggle(b.value_type()) {
        Type::Bool => Ok(a.is_truthy() == b.is_truthy()),
        Type::Object => match (&a, &b) {
            (Value::Object(x), Value::Object(y)) if x.ptr_eq(y) => Ok(true),
            (Value::Object(_), Value::Null) | (Value::Null, Value::Object(_)) => Ok(false),
            _ => Err(Error::new(ErrorKind::UncomparableValue(Type::Object))),
        },
        Type::Array => match (&a, &b) {
            (Value::Array(x), Value::Array(y)) => arrays_equal(x, y, diag),
            (Value::Array(x), Value::Null) | (Value::Null, Value::Array(x)) => Ok(x.is_empty()),
            _ => Ok(false),
        },
        Type::String => Ok(compare_strings(&a, &b, diag)? == Some(Ordering::Equal)),
        Type::Float | Type::Int if a.is_null() || b.is_null() => {
            Ok(a.is_truthy() == b.is_truthy())
        }
        Type::Float | Type::Int => {
            let (x, y) = (to_number(&a, diag), to_number(&b, diag));
            Ok(compare_numbers(x, y) == Some(Ordering::Equal))
        }
        Type::Null => Ok(true),
    }
}

fn arrays_equal(a: &Array, b: &Array, diag: &mut Diagnostics) -> Result<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for (key, value) in a.iter() {
        match b.get(&key) {
            Some(other) if loose_equal(value, other, diag)? => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

/// Compares under the string rule: numerically if both sides are numeric,
/// otherwise byte-wise on their string forms. `None` means unordered (NaN).
fn compare_strings(a: &Value, b: &Value, diag: &mut Diagnostics) -> Result<Option<Ordering>> {
    if let Some((x, y)) = numeric_pair(a, b) {
        return Ok(compare_numbers(x, y));
    }
    let (x, y) = (to_string(a, diag)?, to_string(b, diag)?);
    Ok(Some(x.as_bytes().cmp(y.as_bytes())))
}

/// Three-way comparison (`<=>`), returning -1, 0 or 1.
///
/// Unordered operands (NaN, arrays with disjoint keys) compare as 1.
///
/// # Errors
///
/// Returns an error when objects other than the same handle are compared.
pub fn compare(a: &Value, b: &Value, diag: &mut Diagnostics) -> Result<i64> {
    let (a, b) = (a.deref_value(), b.deref_value());
    let ordering = match a.value_type().juggle(b.value_type()) {
        Type::Bool => Some(a.is_truthy().cmp(&b.is_truthy())),
        Type::Object => match (&a, &b) {
            (Value::Object(x), Value::Object(y)) if x.ptr_eq(y) => Some(Ordering::Equal),
            _ => return Err(Error::new(ErrorKind::UncomparableValue(Type::Object))),
        },
        Type::Array => match (&a, &b) {
            (Value::Array(x), Value::Array(y)) => return compare_arrays(x, y, diag),
            (Value::Array(x), Value::Null) => Some(x.len().cmp(&0)),
            (Value::Null, Value::Array(y)) => Some(0.cmp(&y.len())),
            (Value::Array(_), _) => Some(Ordering::Greater),
            _ => Some(Ordering::Less),
        },
        Type::String => compare_strings(&a, &b, diag)?,
        Type::Float | Type::Int if a.is_null() || b.is_null() => {
            Some(a.is_truthy().cmp(&b.is_truthy()))
        }
        Type::Float | Type::Int => compare_numbers(to_number(&a, diag), to_number(&b, diag)),
        Type::Null => Some(Ordering::Equal),
    };
    Ok(ordering.map_or(1, sign))
}

fn compare_arrays(a: &Array, b: &Array, diag: &mut Diagnostics) -> Result<i64> {
    if a.len() != b.len() {
        return Ok(sign(a.len().cmp(&b.len())));
    }
    for (key, value) in a.iter() {
        let Some(other) = b.get(&key) else {
            return Ok(1);
        };
        let result = compare(value, other, diag)?;
        if result != 0 {
            return Ok(result);
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Key;
    use crate::object::Object;

    fn eq(a: &Value, b: &Value) -> bool {
        loose_equal(a, b, &mut Diagnostics::new()).unwrap()
    }

    fn cmp(a: &Value, b: &Value) -> i64 {
        compare(a, b, &mut Diagnostics::new()).unwrap()
    }

    #[test]
    fn headline_equalities() {
        assert!(eq(&Value::Bool(true), &Value::from("php")));
        assert!(!eq(&Value::Int(0), &Value::from("php")));
        assert!(eq(&Value::Null, &Value::Array(Array::new())));
        assert!(eq(&Value::Null, &Value::from("")));
        assert!(eq(&Value::from("1"), &Value::from("01")));
        assert!(eq(&Value::from("10"), &Value::from("1e1")));
        assert!(!eq(&Value::from("abc"), &Value::from("ABC")));
        assert!(eq(&Value::Int(1), &Value::Float(1.0)));
        assert!(!eq(&Value::Float(f64::NAN), &Value::Float(f64::NAN)));
    }

    #[test]
    fn array_equality_ignores_order() {
        let a: Array = [(Key::from("x"), Value::Int(1)), (Key::from("y"), Value::Int(2))]
            .into_iter()
            .collect();
        let b: Array = [(Key::from("y"), Value::from("2")), (Key::from("x"), Value::Int(1))]
            .into_iter()
            .collect();
        assert!(eq(&Value::Array(a.clone()), &Value::Array(b.clone())));
        assert!(!identical(&Value::Array(a.clone()), &Value::Array(b)));
        assert!(identical(&Value::Array(a.clone()), &Value::Array(a)));
    }

    #[test]
    fn identical_requires_same_type() {
        assert!(identical(&Value::Int(1), &Value::Int(1)));
        assert!(!identical(&Value::Int(1), &Value::Float(1.0)));
        assert!(!identical(&Value::from("1"), &Value::Int(1)));
        assert!(identical(&Value::Null, &Value::Null));
    }

    #[test]
    fn ordering() {
        assert_eq!(cmp(&Value::Int(1), &Value::Int(2)), -1);
        assert_eq!(cmp(&Value::from("b"), &Value::from("a")), 1);
        assert_eq!(cmp(&Value::from("10"), &Value::from("9")), 1);
        assert_eq!(cmp(&Value::from("abc"), &Value::Int(0)), 1);
        assert_eq!(cmp(&Value::Null, &Value::Int(-1)), -1);
        assert_eq!(cmp(&Value::Float(f64::NAN), &Value::Int(0)), 1);
    }

    #[test]
    fn arrays_compare_by_count_then_values() {
        let short = Value::Array(Array::from_values([Value::Int(9)]));
        let long = Value::Array(Array::from_values([Value::Int(1), Value::Int(2)]));
        assert_eq!(cmp(&short, &long), -1);
        assert_eq!(cmp(&long, &Value::Int(100)), 1);
        assert_eq!(cmp(&Value::from("x"), &long), -1);
    }

    #[test]
    fn objects_compare_by_handle() {
        let a = Object::std_class(Array::new());
        let b = Object::std_class(Array::new());
        let mut diag = Diagnostics::new();
        let va = Value::Object(a.clone());
        assert!(loose_equal(&va, &Value::Object(a), &mut diag).unwrap());
        assert!(loose_equal(&va, &Value::Object(b), &mut diag).is_err());
        assert!(loose_equal(&va, &Value::Bool(true), &mut diag).unwrap());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn scalar() -> impl Strategy<Value = Value> {
            prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::Bool),
                (-5i64..5).prop_map(Value::Int),
                (-5.0f64..5.0).prop_map(Value::Float),
                prop_oneof![
                    Just(""),
                    Just("0"),
                    Just("1"),
                    Just("-1"),
                    Just("php"),
                    Just("1.5"),
                    Just(" 2")
                ]
                .prop_map(Value::from),
            ]
        }

        proptest! {
            #[test]
            fn loose_equality_is_symmetric(a in scalar(), b in scalar()) {
                prop_assert_eq!(eq(&a, &b), eq(&b, &a));
            }

            #[test]
            fn compare_is_antisymmetric(a in scalar(), b in scalar()) {
                prop_assert_eq!(cmp(&a, &b), -cmp(&b, &a));
            }

            #[test]
            fn compare_zero_iff_equal(a in scalar(), b in scalar()) {
                prop_assert_eq!(cmp(&a, &b) == 0, eq(&a, &b));
            }

            #[test]
            fn identical_implies_equal(a in scalar()) {
                prop_assert!(identical(&a, &a.clone()));
                prop_assert!(eq(&a, &a.clone()));
            }
        }
    }
}
