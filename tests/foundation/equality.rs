//! Loose and strict comparison across value types.

use sigil_foundation::ops::{compare, identical, loose_equal};
use sigil_foundation::{Array, Diagnostics, Value};

fn s(text: &str) -> Value {
    Value::from(text)
}

fn eq(a: &Value, b: &Value) -> bool {
    loose_equal(a, b, &mut Diagnostics::new()).unwrap()
}

fn cmp(a: &Value, b: &Value) -> i64 {
    compare(a, b, &mut Diagnostics::new()).unwrap()
}

// =============================================================================
// Loose Equality
// =============================================================================

#[test]
fn loose_equality_table() {
    let empty = Value::Array(Array::new());
    let cases = [
        (Value::Null, Value::Bool(false), true),
        (Value::Null, Value::Int(0), true),
        (Value::Null, s(""), true),
        (Value::Null, empty.clone(), true),
        (Value::Null, s("0"), false),
        (Value::Bool(true), s("php"), true),
        (Value::Bool(false), s("0"), true),
        (Value::Bool(false), empty.clone(), true),
        (Value::Int(0), s("php"), false),
        (Value::Int(0), s(""), false),
        (Value::Int(0), s("0"), true),
        (Value::Int(1), s("01"), true),
        (Value::Int(10), s("1e1"), true),
        (Value::Int(100), s("1e2"), true),
        (Value::Int(1), Value::Float(1.0), true),
        (s("1"), s("01"), true),
        (s("10"), s("1e1"), true),
        (s("abc"), s("ABC"), false),
        (s("1"), s(" 1"), true),
        (Value::Float(f64::NAN), Value::Float(f64::NAN), false),
    ];

    for (a, b, expected) in cases {
        assert_eq!(eq(&a, &b), expected, "{a:?} == {b:?}");
        assert_eq!(eq(&b, &a), expected, "{b:?} == {a:?}");
    }
}

#[test]
fn loose_equality_full_matrix() {
    let values = [
        Value::Bool(true),
        Value::Bool(false),
        Value::Int(1),
        Value::Int(0),
        Value::Int(-1),
        s("1"),
        s("0"),
        s("-1"),
        Value::Null,
        Value::Array(Array::new()),
        s("php"),
        s(""),
    ];
    // Rows and columns follow `values`.
    let matrix = [
        "T F T F T T F T F F T F",
        "F T F T F F T F T T F T",
        "T F T F F T F F F F F F",
        "F T F T F F T F T F F F",
        "T F F F T F F T F F F F",
        "T F T F F T F F F F F F",
        "F T F T F F T F F F F F",
        "T F F F T F F T F F F F",
        "F T F T F F F F T T F T",
        "F T F F F F F F T T F F",
        "T F F F F F F F F F T F",
        "F T F F F F F F T F F T",
    ];

    for (a, row) in values.iter().zip(matrix) {
        let expected: Vec<bool> = row.split(' ').map(|cell| cell == "T").collect();
        assert_eq!(expected.len(), values.len());
        for (b, expected) in values.iter().zip(expected) {
            assert_eq!(eq(a, b), expected, "{a:?} == {b:?}");
        }
    }
}

#[test]
fn arrays_compare_by_pairs() {
    let a: Array = [Value::Int(1), s("2")].into_iter().collect();
    let b: Array = [Value::from("1"), Value::Int(2)].into_iter().collect();
    let c: Array = [Value::Int(2), Value::Int(1)].into_iter().collect();
    assert!(eq(&Value::Array(a.clone()), &Value::Array(b)));
    assert!(!eq(&Value::Array(a), &Value::Array(c)));
}

// =============================================================================
// Identity
// =============================================================================

#[test]
fn identity_checks_types() {
    assert!(identical(&Value::Int(1), &Value::Int(1)));
    assert!(!identical(&Value::Int(1), &Value::Float(1.0)));
    assert!(!identical(&Value::Int(1), &s("1")));
    assert!(!identical(&Value::Null, &Value::Bool(false)));
    assert!(identical(&s("a"), &s("a")));
}

// =============================================================================
// Three-way Comparison
// =============================================================================

#[test]
fn spaceship() {
    assert_eq!(cmp(&Value::Int(1), &Value::Int(2)), -1);
    assert_eq!(cmp(&Value::Float(2.5), &Value::Int(2)), 1);
    assert_eq!(cmp(&s("abc"), &s("abd")), -1);
    assert_eq!(cmp(&s("10"), &s("9")), 1);
    assert_eq!(cmp(&s("10"), &s("9a")), -1);
    assert_eq!(cmp(&Value::Null, &Value::Bool(false)), 0);
}

#[test]
fn shorter_arrays_sort_first() {
    let one = Value::Array(Array::from_values([Value::Int(9)]));
    let two = Value::Array(Array::from_values([Value::Int(1), Value::Int(1)]));
    assert_eq!(cmp(&one, &two), -1);
    assert_eq!(cmp(&two, &one), 1);
}
