//! Math functions.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

use sigil_foundation::numeric::Number;
use sigil_foundation::{Result, Value, ops};
use sigil_language::Args;

use crate::argument_error;

/// Picks the extreme of the arguments, or of the single array argument.
/// `keep(c)` says whether a candidate comparing `c` against the current
/// pick replaces it.
fn extreme(args: &mut Args<'_>, keep: fn(i64) -> bool) -> Result<Value> {
    let candidates: Vec<Value> = if args.len() == 1 {
        match args.value(0)? {
            Value::Array(array) => array.values().map(Value::deref_value).collect(),
            other => {
                return Err(argument_error(
                    args,
                    1,
                    "value",
                    &format!("must be of type array, {} given", other.value_type()),
                ));
            }
        }
    } else {
        args.rest(0)
    };

    let mut candidates = candidates.into_iter();
    let Some(mut best) = candidates.next() else {
        return Err(argument_error(
            args,
            1,
            "value",
            "must contain at least one element",
        ));
    };
    for candidate in candidates {
        if keep(ops::compare(&candidate, &best, args.diagnostics())?) {
            best = candidate;
        }
    }
    Ok(best)
}

/// `max(mixed $value, mixed ...$values): mixed`
pub fn max(args: &mut Args<'_>) -> Result<Value> {
    extreme(args, |c| c > 0)
}

/// `min(mixed $value, mixed ...$values): mixed`
pub fn min(args: &mut Args<'_>) -> Result<Value> {
    extreme(args, |c| c < 0)
}

fn number(args: &mut Args<'_>, index: usize) -> Result<Number> {
    let value = args.value(index)?;
    Ok(ops::to_number(&value, args.diagnostics()))
}

/// `abs(int|float $num): int|float`
pub fn abs(args: &mut Args<'_>) -> Result<Value> {
    Ok(match number(args, 0)? {
        Number::Int(i) => i
            .checked_abs()
            .map_or_else(|| Value::Float(-(i as f64)), Value::Int),
        Number::Float(f) => Value::Float(f.abs()),
    })
}

/// `floor(int|float $num): float`
pub fn floor(args: &mut Args<'_>) -> Result<Value> {
    Ok(Value::Float(number(args, 0)?.as_f64().floor()))
}

/// `ceil(int|float $num): float`
pub fn ceil(args: &mut Args<'_>) -> Result<Value> {
    Ok(Value::Float(number(args, 0)?.as_f64().ceil()))
}

/// `round(int|float $num, int $precision = 0): float`, rounding halves away
/// from zero.
pub fn round(args: &mut Args<'_>) -> Result<Value> {
    let num = number(args, 0)?.as_f64();
    let precision = args.optional_int(1)?.unwrap_or(0);
    Ok(Value::Float(round_to(num, precision)))
}

fn round_to(num: f64, precision: i64) -> f64 {
    if !num.is_finite() {
        return num;
    }
    let places = precision.clamp(-308, 308) as i32;
    let factor = 10f64.powi(places.abs());
    let scaled = if places >= 0 { num * factor } else { num / factor };
    if !scaled.is_finite() {
        return num;
    }
    // Snap values a hair below a half caused by binary representation.
    let snapped = format!("{scaled:.15e}").parse::<f64>().unwrap_or(scaled);
    let rounded = snapped.round();
    if places >= 0 {
        rounded / factor
    } else {
        rounded * factor
    }
}

/// `sqrt(float $num): float`
pub fn sqrt(args: &mut Args<'_>) -> Result<Value> {
    Ok(Value::Float(args.float(0)?.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::round_to;
    use sigil_foundation::{ErrorKind, Value};

    use crate::testing::{eval, fails};

    #[test]
    fn extremes() {
        assert_eq!(eval("max(1, 5, 3)"), Value::Int(5));
        assert_eq!(eval("min([4, 2, 8])"), Value::Int(2));
        assert_eq!(eval("max('10', 9)"), Value::from("10"));
        assert_eq!(eval("max(1, 1.0)"), Value::Int(1));
        assert!(matches!(
            fails("max([]);"),
            ErrorKind::Fatal(ref m) if m == "max(): Argument #1 ($value) must contain at least one element"
        ));
        assert!(matches!(fails("min(3);"), ErrorKind::Fatal(_)));
    }

    #[test]
    fn absolute_values() {
        assert_eq!(eval("abs(-5)"), Value::Int(5));
        assert_eq!(eval("abs(-2.5)"), Value::Float(2.5));
        assert_eq!(eval("abs('-3')"), Value::Int(3));
        assert_eq!(eval("abs(PHP_INT_MIN)"), Value::Float(9.223_372_036_854_776e18));
    }

    #[test]
    fn rounding() {
        assert_eq!(eval("floor(2.7)"), Value::Float(2.0));
        assert_eq!(eval("ceil(2.1)"), Value::Float(3.0));
        assert_eq!(eval("ceil(4)"), Value::Float(4.0));
        assert_eq!(eval("round(2.5)"), Value::Float(3.0));
        assert_eq!(eval("round(-2.5)"), Value::Float(-3.0));
        assert_eq!(eval("round(1.95583, 2)"), Value::Float(1.96));
        assert_eq!(eval("round(1234, -2)"), Value::Float(1200.0));
        assert_eq!(eval("sqrt(16)"), Value::Float(4.0));
    }

    #[test]
    fn round_handles_representation_error() {
        assert!((round_to(1.005, 2) - 1.01).abs() < f64::EPSILON);
        assert!(round_to(f64::NAN, 2).is_nan());
    }
}
