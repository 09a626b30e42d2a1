//! Ordered arrays: insertion order, key folding, and value semantics.

use sigil_foundation::ops::to_key;
use sigil_foundation::{Array, Diagnostics, ErrorLevel, Key, Value};

fn keys(array: &Array) -> Vec<Key> {
    array.keys().collect()
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn insertion_order_is_kept() {
    let mut array = Array::new();
    array.insert(Key::from("z"), Value::Int(1));
    array.insert(Key::Int(5), Value::Int(2));
    array.insert(Key::from("a"), Value::Int(3));
    assert_eq!(keys(&array), vec![Key::from("z"), Key::Int(5), Key::from("a")]);

    // Overwriting keeps the original position.
    array.insert(Key::from("z"), Value::Int(9));
    assert_eq!(keys(&array)[0], Key::from("z"));
    assert_eq!(array.get(&Key::from("z")), Some(&Value::Int(9)));
}

#[test]
fn push_uses_the_next_integer_key() {
    let mut array = Array::new();
    array.insert(Key::Int(7), Value::Null);
    assert_eq!(array.push(Value::Int(1)), Key::Int(8));
    array.insert(Key::Int(-3), Value::Null);
    assert_eq!(array.push(Value::Int(2)), Key::Int(9));
}

#[test]
fn removal_does_not_reuse_keys() {
    let mut array = Array::from_values([Value::Int(1), Value::Int(2), Value::Int(3)]);
    assert_eq!(array.remove(&Key::Int(2)), Some(Value::Int(3)));
    assert_eq!(array.push(Value::Int(4)), Key::Int(3));

    array.remove(&Key::Int(0));
    assert_eq!(keys(&array), vec![Key::Int(1), Key::Int(3)]);
    assert!(!array.contains_key(&Key::Int(0)));
}

#[test]
fn many_removals_keep_order() {
    let mut array: Array = (0..200).map(Value::Int).collect();
    for i in (0..200).filter(|i| i % 3 != 0) {
        array.remove(&Key::Int(i));
    }
    let expected: Vec<Key> = (0..200).filter(|i| i % 3 == 0).map(Key::Int).collect();
    assert_eq!(keys(&array), expected);
    assert_eq!(array.len(), expected.len());
}

// =============================================================================
// Key Folding
// =============================================================================

#[test]
fn canonical_integer_strings_fold() {
    assert_eq!(Key::from("8"), Key::Int(8));
    assert_eq!(Key::from("-3"), Key::Int(-3));
    assert_eq!(Key::from("08"), Key::Str("08".into()));
    assert_eq!(Key::from("+1"), Key::Str("+1".into()));
    assert_eq!(Key::from("1.5"), Key::Str("1.5".into()));
}

#[test]
fn scalars_become_keys() {
    let mut diag = Diagnostics::new();
    assert_eq!(to_key(&Value::Bool(true), &mut diag), Some(Key::Int(1)));
    assert_eq!(to_key(&Value::Null, &mut diag), Some(Key::from("")));
    assert_eq!(to_key(&Value::from("42"), &mut diag), Some(Key::Int(42)));
    assert!(diag.is_empty());

    assert_eq!(to_key(&Value::Float(1.7), &mut diag), Some(Key::Int(1)));
    assert_eq!(diag.entries()[0].level, ErrorLevel::DEPRECATED);

    assert_eq!(to_key(&Value::Array(Array::new()), &mut diag), None);
    assert_eq!(diag.entries()[1].message, "Illegal offset type");
}

// =============================================================================
// Value Semantics
// =============================================================================

#[test]
fn clones_are_independent() {
    let original = Array::from_values([Value::Int(1), Value::Int(2)]);
    let mut copy = original.clone();
    copy.push(Value::Int(3));
    copy.insert(Key::Int(0), Value::from("changed"));

    assert_eq!(original.len(), 2);
    assert_eq!(original.get(&Key::Int(0)), Some(&Value::Int(1)));
    assert_eq!(copy.len(), 3);
}

#[test]
fn union_is_left_biased() {
    let left: Array = [(Key::from("a"), Value::Int(1))].into_iter().collect();
    let right: Array = [(Key::from("a"), Value::Int(2)), (Key::from("b"), Value::Int(3))]
        .into_iter()
        .collect();
    let union = left.union(&right);
    assert_eq!(union.get(&Key::from("a")), Some(&Value::Int(1)));
    assert_eq!(union.get(&Key::from("b")), Some(&Value::Int(3)));
}
