//! Array functions.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use sigil_foundation::numeric::Number;
use sigil_foundation::{Array, Error, Key, Result, Value, ops};
use sigil_language::Args;

use crate::argument_error;

/// Upper bound on the number of elements `range` will produce.
const RANGE_LIMIT: u64 = 1 << 24;

/// `array_keys(array $array): array`
pub fn array_keys(args: &mut Args<'_>) -> Result<Value> {
    let array = args.array(0)?;
    Ok(Value::Array(array.keys().map(|k| k.to_value()).collect()))
}

/// `array_values(array $array): array`
pub fn array_values(args: &mut Args<'_>) -> Result<Value> {
    let array = args.array(0)?;
    Ok(Value::Array(array.values().map(Value::deref_value).collect()))
}

/// `in_array(mixed $needle, array $haystack, bool $strict = false): bool`
pub fn in_array(args: &mut Args<'_>) -> Result<Value> {
    let needle = args.value(0)?;
    let haystack = args.array(1)?;
    let strict = args.optional_bool(2, false);
    for value in haystack.values() {
        let value = value.deref_value();
        let found = if strict {
            ops::identical(&needle, &value)
        } else {
            ops::loose_equal(&needle, &value, args.diagnostics())?
        };
        if found {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

/// `array_key_exists(string|int $key, array $array): bool`
pub fn array_key_exists(args: &mut Args<'_>) -> Result<Value> {
    let key = args.value(0)?;
    let array = args.array(1)?;
    let Some(key) = ops::to_key(&key, args.diagnostics()) else {
        return Ok(Value::Bool(false));
    };
    Ok(Value::Bool(array.contains_key(&key)))
}

/// `array_push(array &$array, mixed ...$values): int`
pub fn array_push(args: &mut Args<'_>) -> Result<Value> {
    let target = args.reference(0)?;
    let values = args.rest(1);
    let given = target.get().value_type();
    let mut slot = target.borrow_mut();
    match &mut *slot {
        Value::Array(array) => {
            for value in values {
                array.push(value);
            }
            Ok(Value::Int(array.len() as i64))
        }
        _ => Err(argument_error(
            args,
            1,
            "array",
            &format!("must be of type array, {given} given"),
        )),
    }
}

/// `array_merge(array ...$arrays): array`
///
/// Integer keys are renumbered from zero; later string keys overwrite
/// earlier ones.
pub fn array_merge(args: &mut Args<'_>) -> Result<Value> {
    let mut merged = Array::new();
    for i in 0..args.len() {
        let array = match args.value(i)? {
            Value::Array(array) => array,
            other => {
                return Err(argument_error(
                    args,
                    i + 1,
                    "arrays",
                    &format!("must be of type array, {} given", other.value_type()),
                ));
            }
        };
        for (key, value) in array.iter() {
            match key {
                Key::Int(_) => {
                    merged.push(value.clone());
                }
                Key::Str(_) => merged.insert(key, value.clone()),
            }
        }
    }
    Ok(Value::Array(merged))
}

/// One end of a `range` call.
enum Bound {
    Int(i64),
    Float(f64),
    Char(u8),
}

fn bound(value: &Value, args: &mut Args<'_>) -> Bound {
    if let Value::String(s) = value {
        if s.len() == 1 && !s.as_bytes()[0].is_ascii_digit() {
            return Bound::Char(s.as_bytes()[0]);
        }
    }
    match ops::to_number(value, args.diagnostics()) {
        Number::Int(i) => Bound::Int(i),
        Number::Float(f) => Bound::Float(f),
    }
}

/// `range(string|int|float $start, string|int|float $end, int|float $step = 1): array`
pub fn range(args: &mut Args<'_>) -> Result<Value> {
    let start = args.value(0)?;
    let end = args.value(1)?;
    let step = match args.optional(2) {
        None => 1.0,
        Some(_) => args.float(2)?.abs(),
    };
    if step == 0.0 {
        return Err(argument_error(args, 3, "step", "cannot be 0"));
    }
    let integral_step = step.fract() == 0.0;

    let values = match (bound(&start, args), bound(&end, args)) {
        (Bound::Char(a), Bound::Char(b)) if integral_step => {
            let step = step as usize;
            if step > usize::from(a.abs_diff(b)) && a != b {
                return Err(exceeds(args));
            }
            let chars: Vec<u8> = if a <= b {
                (a..=b).step_by(step).collect()
            } else {
                (b..=a).rev().step_by(step).collect()
            };
            chars
                .into_iter()
                .map(|c| Value::from(char::from(c).to_string()))
                .collect()
        }
        (Bound::Int(a), Bound::Int(b)) if integral_step => {
            let step = step as u64;
            let span = a.abs_diff(b);
            if step > span && span != 0 {
                return Err(exceeds(args));
            }
            if span / step >= RANGE_LIMIT {
                return Err(too_many(args));
            }
            let count = span / step + 1;
            (0..count)
                .map(|i| {
                    let offset = (i * step) as i64;
                    Value::Int(if a <= b { a + offset } else { a - offset })
                })
                .collect()
        }
        (a, b) => {
            let (a, b) = (as_float(a), as_float(b));
            let span = (a - b).abs();
            if step > span && span != 0.0 {
                return Err(exceeds(args));
            }
            let count = (span / step).floor();
            if count >= RANGE_LIMIT as f64 {
                return Err(too_many(args));
            }
            (0..=count as u64)
                .map(|i| {
                    let offset = i as f64 * step;
                    Value::Float(if a <= b { a + offset } else { a - offset })
                })
                .collect()
        }
    };
    Ok(Value::Array(values))
}

fn as_float(bound: Bound) -> f64 {
    match bound {
        Bound::Int(i) => i as f64,
        Bound::Float(f) => f,
        Bound::Char(c) => f64::from(c),
    }
}

fn exceeds(args: &Args<'_>) -> Error {
    argument_error(args, 3, "step", "must not exceed the specified range")
}

fn too_many(args: &Args<'_>) -> Error {
    Error::fatal(format!(
        "{}(): The supplied range exceeds the maximum array size",
        args.function_name()
    ))
}
