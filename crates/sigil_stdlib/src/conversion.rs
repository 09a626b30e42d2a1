//! Scalar conversion functions.

use sigil_foundation::{Result, Value, ops};
use sigil_language::Args;

use crate::argument_error;

/// `intval(mixed $value, int $base = 10): int`
///
/// A base other than 10 only applies to strings. Base 0 picks the base from
/// a `0x`, `0b` or `0` prefix.
pub fn intval(args: &mut Args<'_>) -> Result<Value> {
    let base = args.optional_int(1)?.unwrap_or(10);
    if base == 10 {
        return Ok(Value::Int(args.int(0)?));
    }
    if base != 0 && !(2..=36).contains(&base) {
        return Err(argument_error(args, 2, "base", "must be between 2 and 36 (inclusive)"));
    }
    match args.value(0)? {
        Value::String(s) => Ok(Value::Int(parse_radix(&s, base))),
        other => Ok(Value::Int(ops::to_int(&other, args.diagnostics()))),
    }
}

/// Parses the longest valid prefix of `s` in `base`, like `strtol`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_radix(s: &str, base: i64) -> i64 {
    let s = s.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let lower = s.to_ascii_lowercase();
    let (base, digits) = match base {
        16 => (16, lower.strip_prefix("0x").unwrap_or(&lower)),
        8 => (8, lower.strip_prefix("0o").unwrap_or(&lower)),
        2 => (2, lower.strip_prefix("0b").unwrap_or(&lower)),
        0 => {
            if let Some(rest) = lower.strip_prefix("0x") {
                (16, rest)
            } else if let Some(rest) = lower.strip_prefix("0b") {
                (2, rest)
            } else if let Some(rest) = lower.strip_prefix("0o") {
                (8, rest)
            } else if lower.starts_with('0') {
                (8, lower.as_str())
            } else {
                (10, lower.as_str())
            }
        }
        other => (other as u32, lower.as_str()),
    };
    let mut value: i64 = 0;
    for c in digits.chars() {
        let Some(digit) = c.to_digit(base) else {
            break;
        };
        value = match value
            .checked_mul(i64::from(base))
            .and_then(|v| v.checked_add(i64::from(digit)))
        {
            Some(v) => v,
            None => return if negative { i64::MIN } else { i64::MAX },
        };
    }
    if negative { -value } else { value }
}

/// `floatval(mixed $value): float`
pub fn floatval(args: &mut Args<'_>) -> Result<Value> {
    Ok(Value::Float(args.float(0)?))
}

/// `strval(mixed $value): string`
pub fn strval(args: &mut Args<'_>) -> Result<Value> {
    Ok(Value::String(args.string(0)?))
}

/// `boolval(mixed $value): bool`
pub fn boolval(args: &mut Args<'_>) -> Result<Value> {
    Ok(Value::Bool(args.bool(0)?))
}
