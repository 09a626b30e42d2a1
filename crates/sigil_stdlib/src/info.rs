//! Introspection, debug output and error reporting.

#![allow(clippy::cast_possible_wrap)]

use sigil_foundation::{Array, ErrorLevel, Result, Value, dump};
use sigil_language::Args;

use crate::argument_error;

/// `strlen(string $string): int`, in bytes.
pub fn strlen(args: &mut Args<'_>) -> Result<Value> {
    let s = args.string(0)?;
    Ok(Value::Int(s.len() as i64))
}

/// `count(array $value, int $mode = COUNT_NORMAL): int`
pub fn count(args: &mut Args<'_>) -> Result<Value> {
    let array = match args.value(0)? {
        Value::Array(array) => array,
        other => {
            return Err(argument_error(
                args,
                1,
                "value",
                &format!("must be of type Countable|array, {} given", other.value_type()),
            ));
        }
    };
    let recursive = args.optional_int(1)?.unwrap_or(0) == 1;
    let n = if recursive {
        count_recursive(&array)
    } else {
        array.len()
    };
    Ok(Value::Int(n as i64))
}

fn count_recursive(array: &Array) -> usize {
    array
        .values()
        .map(|v| match v.deref_value() {
            Value::Array(inner) => 1 + count_recursive(&inner),
            _ => 1,
        })
        .sum()
}

/// `gettype(mixed $value): string`
pub fn gettype(args: &mut Args<'_>) -> Result<Value> {
    let ty = args.value(0)?.value_type();
    Ok(Value::from(ty.gettype_name()))
}

/// `var_dump(mixed $value, mixed ...$values): void`
pub fn var_dump(args: &mut Args<'_>) -> Result<Value> {
    for value in args.rest(0) {
        args.write(&dump::var_dump(&value))?;
    }
    Ok(Value::Null)
}

/// `print_r(mixed $value, bool $return = false): string|bool`
pub fn print_r(args: &mut Args<'_>) -> Result<Value> {
    let text = dump::print_r(&args.value(0)?);
    if args.optional_bool(1, false) {
        return Ok(Value::from(text));
    }
    args.write(&text)?;
    Ok(Value::Bool(true))
}

/// `function_exists(string $function): bool`
pub fn function_exists(args: &mut Args<'_>) -> Result<Value> {
    let name = args.string(0)?;
    Ok(Value::Bool(args.module().function_index(&name).is_some()))
}

/// `trigger_error(string $message, int $level = E_USER_NOTICE): bool`
///
/// `E_USER_ERROR` stops the script once the call returns.
pub fn trigger_error(args: &mut Args<'_>) -> Result<Value> {
    let message = args.string(0)?;
    let bits = args
        .optional_int(1)?
        .unwrap_or_else(|| i64::from(ErrorLevel::USER_NOTICE.bits()));
    let level = u32::try_from(bits)
        .ok()
        .map(ErrorLevel::from_bits)
        .filter(|level| {
            [
                ErrorLevel::USER_ERROR,
                ErrorLevel::USER_WARNING,
                ErrorLevel::USER_NOTICE,
                ErrorLevel::USER_DEPRECATED,
            ]
            .contains(level)
        })
        .ok_or_else(|| {
            argument_error(
                args,
                2,
                "error_level",
                "must be one of E_USER_ERROR, E_USER_WARNING, E_USER_NOTICE, or E_USER_DEPRECATED",
            )
        })?;
    args.diagnostics().throw(level, message.to_string());
    Ok(Value::Bool(true))
}

/// `error_reporting(?int $error_level = null): int`, returning the old mask.
pub fn error_reporting(args: &mut Args<'_>) -> Result<Value> {
    let new = match args.optional(0) {
        None | Some(Value::Null) => None,
        Some(_) => Some(args.int(0)?),
    };
    let old = args.diagnostics().reporting();
    if let Some(bits) = new {
        let bits = u32::try_from(bits & i64::from(ErrorLevel::ALL.bits())).unwrap_or(0);
        args.diagnostics().set_reporting(ErrorLevel::from_bits(bits));
    }
    Ok(Value::Int(i64::from(old.bits())))
}
