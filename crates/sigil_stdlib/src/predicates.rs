//! Type predicates.

use sigil_foundation::numeric;
use sigil_foundation::{Result, Value};
use sigil_language::Args;

fn test(args: &Args<'_>, f: impl FnOnce(&Value) -> bool) -> Result<Value> {
    Ok(Value::Bool(f(&args.value(0)?)))
}

/// `is_int(mixed $value): bool`
pub fn is_int(args: &mut Args<'_>) -> Result<Value> {
    test(args, |v| matches!(v, Value::Int(_)))
}

/// `is_float(mixed $value): bool`
pub fn is_float(args: &mut Args<'_>) -> Result<Value> {
    test(args, |v| matches!(v, Value::Float(_)))
}

/// `is_string(mixed $value): bool`
pub fn is_string(args: &mut Args<'_>) -> Result<Value> {
    test(args, |v| matches!(v, Value::String(_)))
}

/// `is_bool(mixed $value): bool`
pub fn is_bool(args: &mut Args<'_>) -> Result<Value> {
    test(args, |v| matches!(v, Value::Bool(_)))
}

/// `is_array(mixed $value): bool`
pub fn is_array(args: &mut Args<'_>) -> Result<Value> {
    test(args, |v| matches!(v, Value::Array(_)))
}

/// `is_null(mixed $value): bool`
pub fn is_null(args: &mut Args<'_>) -> Result<Value> {
    test(args, Value::is_null)
}

/// `is_numeric(mixed $value): bool`: numbers, and strings that are
/// entirely numeric (surrounding whitespace allowed).
pub fn is_numeric(args: &mut Args<'_>) -> Result<Value> {
    test(args, |v| match v {
        Value::Int(_) | Value::Float(_) => true,
        Value::String(s) => numeric::is_numeric(s),
        _ => false,
    })
}
