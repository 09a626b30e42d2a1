//! Arithmetic promotion and string conversion.

use sigil_foundation::ops::{add, concat, div, modulo, mul, pow, sub, to_string};
use sigil_foundation::{Diagnostics, ErrorKind, ErrorLevel, Value};

fn s(text: &str) -> Value {
    Value::from(text)
}

type BinaryOp = fn(&Value, &Value, &mut Diagnostics) -> sigil_foundation::Result<Value>;

fn run(op: BinaryOp, a: Value, b: Value) -> Value {
    op(&a, &b, &mut Diagnostics::new()).unwrap()
}

// =============================================================================
// Promotion
// =============================================================================

#[test]
fn integers_stay_integers() {
    assert_eq!(run(add, Value::Int(2), Value::Int(3)), Value::Int(5));
    assert_eq!(run(sub, Value::Int(2), Value::Int(3)), Value::Int(-1));
    assert_eq!(run(mul, Value::Int(4), Value::Int(3)), Value::Int(12));
    assert_eq!(run(div, Value::Int(6), Value::Int(3)), Value::Int(2));
    assert_eq!(run(pow, Value::Int(2), Value::Int(10)), Value::Int(1024));
}

#[test]
fn overflow_promotes_to_float() {
    assert_eq!(
        run(add, Value::Int(i64::MAX), Value::Int(1)),
        Value::Float(9_223_372_036_854_775_808.0)
    );
    assert!(matches!(run(mul, Value::Int(i64::MAX), Value::Int(2)), Value::Float(_)));
    assert!(matches!(run(pow, Value::Int(2), Value::Int(64)), Value::Float(_)));
}

#[test]
fn inexact_division_is_float() {
    assert_eq!(run(div, Value::Int(7), Value::Int(2)), Value::Float(3.5));
    assert_eq!(run(add, Value::Int(1), Value::Float(0.5)), Value::Float(1.5));
}

#[test]
fn numeric_strings_take_part() {
    assert_eq!(run(add, s("5"), s("5")), Value::Int(10));
    assert_eq!(run(add, s("1.5"), Value::Int(1)), Value::Float(2.5));
    assert_eq!(run(mul, s("1e2"), Value::Int(2)), Value::Float(200.0));
}

#[test]
fn non_numeric_strings_warn() {
    let mut diag = Diagnostics::new();
    let value = add(&s("abc"), &Value::Int(1), &mut diag).unwrap();
    assert_eq!(value, Value::Int(1));
    assert_eq!(diag.entries()[0].level, ErrorLevel::WARNING);
    assert_eq!(diag.entries()[0].message, "A non-numeric value encountered");

    let mut diag = Diagnostics::new();
    let value = add(&s("5 apples"), &Value::Int(1), &mut diag).unwrap();
    assert_eq!(value, Value::Int(6));
    assert_eq!(diag.entries()[0].level, ErrorLevel::NOTICE);
}

#[test]
fn zero_divisors_fail() {
    let mut diag = Diagnostics::new();
    let err = div(&Value::Int(1), &Value::Int(0), &mut diag).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::DivisionByZero));
    let err = modulo(&Value::Int(1), &Value::Int(0), &mut diag).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ModuloByZero));
}

#[test]
fn modulo_follows_the_dividend() {
    assert_eq!(run(modulo, Value::Int(-7), Value::Int(3)), Value::Int(-1));
    assert_eq!(run(modulo, Value::Int(7), Value::Int(-3)), Value::Int(1));
    assert_eq!(run(modulo, Value::Float(7.9), Value::Int(2)), Value::Int(1));
}

#[test]
fn arrays_in_arithmetic_fail() {
    let array = Value::Array(sigil_foundation::Array::new());
    let err = sub(&array, &Value::Int(1), &mut Diagnostics::new()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnsupportedOperands { .. }));
}

// =============================================================================
// Strings
// =============================================================================

#[test]
fn string_forms() {
    let mut diag = Diagnostics::new();
    let cases = [
        (Value::Null, ""),
        (Value::Bool(true), "1"),
        (Value::Bool(false), ""),
        (Value::Int(-42), "-42"),
        (Value::Float(1.0), "1"),
        (Value::Float(0.1 + 0.2), "0.30000000000000004"),
        (Value::Float(1e100), "1.0E+100"),
    ];
    for (value, expected) in cases {
        assert_eq!(&*to_string(&value, &mut diag).unwrap(), expected);
    }
    assert!(diag.is_empty());
}

#[test]
fn concat_converts_both_sides() {
    assert_eq!(run(concat, Value::Int(1), Value::Float(2.5)), s("12.5"));
    assert_eq!(run(concat, s("a"), Value::Null), s("a"));
}
