//! String functions.
//!
//! Offsets and lengths count bytes. Results that cut through a multi-byte
//! character are repaired with the replacement character.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use std::fmt::Write;

use sigil_foundation::{Array, Result, Value, ops};
use sigil_language::Args;

use crate::{argument_error, position_or_false};

/// Characters stripped by `trim` without a mask.
const DEFAULT_TRIM: &[u8] = b" \n\r\t\x0b\0";

fn bytes_to_value(bytes: &[u8]) -> Value {
    Value::from(String::from_utf8_lossy(bytes).into_owned())
}

/// Finds `needle` in `haystack` at or after `from`.
fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    if needle.is_empty() {
        return Some(from);
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Resolves a possibly negative offset against `len`.
fn resolve_offset(offset: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if offset < 0 { len + offset } else { offset };
    (0..=len).contains(&resolved).then_some(resolved as usize)
}

/// `strtoupper(string $string): string`, ASCII only.
pub fn strtoupper(args: &mut Args<'_>) -> Result<Value> {
    Ok(Value::from(args.string(0)?.to_ascii_uppercase()))
}

/// `strtolower(string $string): string`, ASCII only.
pub fn strtolower(args: &mut Args<'_>) -> Result<Value> {
    Ok(Value::from(args.string(0)?.to_ascii_lowercase()))
}

/// `strrev(string $string): string`
pub fn strrev(args: &mut Args<'_>) -> Result<Value> {
    Ok(Value::from(args.string(0)?.chars().rev().collect::<String>()))
}

fn search(args: &mut Args<'_>, fold: bool) -> Result<Value> {
    let mut haystack = args.string(0)?.to_string();
    let mut needle = args.string(1)?.to_string();
    if fold {
        haystack.make_ascii_lowercase();
        needle.make_ascii_lowercase();
    }
    let offset = args.optional_int(2)?.unwrap_or(0);
    let Some(from) = resolve_offset(offset, haystack.len()) else {
        return Err(argument_error(
            args,
            3,
            "offset",
            "must be contained in argument #1 ($haystack)",
        ));
    };
    Ok(position_or_false(find_bytes(
        haystack.as_bytes(),
        needle.as_bytes(),
        from,
    )))
}

/// `strpos(string $haystack, string $needle, int $offset = 0): int|false`
pub fn strpos(args: &mut Args<'_>) -> Result<Value> {
    search(args, false)
}

/// `stripos(string $haystack, string $needle, int $offset = 0): int|false`
pub fn stripos(args: &mut Args<'_>) -> Result<Value> {
    search(args, true)
}

/// `strrpos(string $haystack, string $needle, int $offset = 0): int|false`
///
/// A negative offset limits matches to those starting at or before that
/// many bytes from the end.
pub fn strrpos(args: &mut Args<'_>) -> Result<Value> {
    let haystack = args.string(0)?;
    let needle = args.string(1)?;
    let offset = args.optional_int(2)?.unwrap_or(0);
    let (h, n) = (haystack.as_bytes(), needle.as_bytes());
    if resolve_offset(offset, h.len()).is_none() {
        return Err(argument_error(
            args,
            3,
            "offset",
            "must be contained in argument #1 ($haystack)",
        ));
    }
    let (first, last) = if offset >= 0 {
        (offset as usize, h.len())
    } else {
        (0, (h.len() as i64 + offset) as usize)
    };
    let found = (first..=h.len().saturating_sub(n.len()))
        .rev()
        .filter(|&p| p <= last)
        .find(|&p| h.get(p..p + n.len()) == Some(n));
    Ok(position_or_false(found))
}

/// `str_repeat(string $string, int $times): string`
pub fn str_repeat(args: &mut Args<'_>) -> Result<Value> {
    let s = args.string(0)?;
    let times = args.int(1)?;
    let Ok(times) = usize::try_from(times) else {
        return Err(argument_error(
            args,
            2,
            "times",
            "must be greater than or equal to 0",
        ));
    };
    Ok(Value::from(s.repeat(times)))
}

/// `substr(string $string, int $offset, ?int $length = null): string`
pub fn substr(args: &mut Args<'_>) -> Result<Value> {
    let s = args.string(0)?;
    let bytes = s.as_bytes();
    let len = bytes.len() as i64;
    let offset = args.int(1)?;
    let length = match args.optional(2) {
        None | Some(Value::Null) => None,
        Some(_) => Some(args.int(2)?),
    };

    let start = if offset < 0 {
        (len + offset).max(0)
    } else {
        offset.min(len)
    };
    let end = match length {
        None => len,
        Some(n) if n < 0 => len + n,
        Some(n) => start.saturating_add(n).min(len),
    };
    if end <= start {
        return Ok(Value::from(""));
    }
    Ok(bytes_to_value(&bytes[start as usize..end as usize]))
}

/// Expands a trim mask, including `a..z` ranges.
fn trim_mask(mask: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < mask.len() {
        if i + 3 < mask.len() && &mask[i + 1..i + 3] == b".." && mask[i] <= mask[i + 3] {
            out.extend(mask[i]..=mask[i + 3]);
            i += 4;
        } else {
            out.push(mask[i]);
            i += 1;
        }
    }
    out
}

fn trim_with(args: &mut Args<'_>, left: bool, right: bool) -> Result<Value> {
    let s = args.string(0)?;
    let mask = match args.optional_string(1)? {
        Some(m) => trim_mask(m.as_bytes()),
        None => DEFAULT_TRIM.to_vec(),
    };
    let mut bytes = s.as_bytes();
    if left {
        while let Some((first, rest)) = bytes.split_first() {
            if !mask.contains(first) {
                break;
            }
            bytes = rest;
        }
    }
    if right {
        while let Some((last, rest)) = bytes.split_last() {
            if !mask.contains(last) {
                break;
            }
            bytes = rest;
        }
    }
    Ok(bytes_to_value(bytes))
}

/// `trim(string $string, string $characters = " \n\r\t\v\0"): string`
pub fn trim(args: &mut Args<'_>) -> Result<Value> {
    trim_with(args, true, true)
}

/// `ltrim(string $string, string $characters = " \n\r\t\v\0"): string`
pub fn ltrim(args: &mut Args<'_>) -> Result<Value> {
    trim_with(args, true, false)
}

/// `rtrim(string $string, string $characters = " \n\r\t\v\0"): string`
pub fn rtrim(args: &mut Args<'_>) -> Result<Value> {
    trim_with(args, false, true)
}

/// `implode(string $separator, array $array): string`, also accepting
/// `implode(array $array)` and the legacy `implode(array, string)` order.
pub fn implode(args: &mut Args<'_>) -> Result<Value> {
    let (separator, array) = match (args.value(0)?, args.optional(1)) {
        (Value::Array(array), None) => (String::new(), array),
        (Value::Array(array), Some(sep)) => (
            ops::to_string(&sep, args.diagnostics())?.to_string(),
            array,
        ),
        (_, Some(Value::Array(array))) => (args.string(0)?.to_string(), array),
        (_, Some(other)) => {
            return Err(argument_error(
                args,
                2,
                "array",
                &format!("must be of type ?array, {} given", other.value_type()),
            ));
        }
        (other, None) => {
            return Err(argument_error(
                args,
                1,
                "array",
                &format!("must be of type array, {} given", other.value_type()),
            ));
        }
    };
    let mut out = String::new();
    for (i, value) in array.values().enumerate() {
        if i > 0 {
            out.push_str(&separator);
        }
        out.push_str(&ops::to_string(value, args.diagnostics())?);
    }
    Ok(Value::from(out))
}

/// `explode(string $separator, string $string, int $limit = PHP_INT_MAX): array`
pub fn explode(args: &mut Args<'_>) -> Result<Value> {
    let separator = args.string(0)?;
    let s = args.string(1)?;
    let limit = args.optional_int(2)?.unwrap_or(i64::MAX);
    if separator.is_empty() {
        return Err(argument_error(args, 1, "separator", "cannot be empty"));
    }
    let parts: Vec<&str> = s.split(&*separator).collect();
    let parts: Vec<Value> = match limit {
        l if l > 0 && (l as usize) < parts.len() => {
            let l = l as usize;
            let mut head: Vec<Value> = parts[..l - 1].iter().map(|p| Value::from(*p)).collect();
            let rest = parts[l - 1..].join(&*separator);
            head.push(Value::from(rest));
            head
        }
        0 => vec![Value::from(parts.join(&*separator))],
        l if l < 0 => {
            let keep = parts.len().saturating_sub(l.unsigned_abs() as usize);
            parts[..keep].iter().map(|p| Value::from(*p)).collect()
        }
        _ => parts.iter().map(|p| Value::from(*p)).collect(),
    };
    Ok(Value::Array(Array::from_values(parts)))
}

/// `nl2br(string $string): string`
pub fn nl2br(args: &mut Args<'_>) -> Result<Value> {
    let s = args.string(0)?;
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\n' || c == '\r' {
            out.push_str("<br />");
            out.push(c);
            let pair = if c == '\n' { '\r' } else { '\n' };
            if chars.peek() == Some(&pair) {
                out.push(pair);
                chars.next();
            }
        } else {
            out.push(c);
        }
    }
    Ok(Value::from(out))
}

/// `stripslashes(string $string): string`
pub fn stripslashes(args: &mut Args<'_>) -> Result<Value> {
    let s = args.string(0)?;
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('0') => out.push('\0'),
                Some(next) => out.push(next),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    Ok(Value::from(out))
}

fn substring_search(args: &mut Args<'_>, fold: bool) -> Result<Value> {
    let haystack = args.string(0)?;
    let needle = args.string(1)?;
    let before = args.optional_bool(2, false);
    let position = if fold {
        find_bytes(
            haystack.to_ascii_lowercase().as_bytes(),
            needle.to_ascii_lowercase().as_bytes(),
            0,
        )
    } else {
        find_bytes(haystack.as_bytes(), needle.as_bytes(), 0)
    };
    let Some(position) = position else {
        return Ok(Value::Bool(false));
    };
    let bytes = haystack.as_bytes();
    Ok(if before {
        bytes_to_value(&bytes[..position])
    } else {
        bytes_to_value(&bytes[position..])
    })
}

/// `strstr(string $haystack, string $needle, bool $before_needle = false): string|false`
pub fn strstr(args: &mut Args<'_>) -> Result<Value> {
    substring_search(args, false)
}

/// `stristr(string $haystack, string $needle, bool $before_needle = false): string|false`
pub fn stristr(args: &mut Args<'_>) -> Result<Value> {
    substring_search(args, true)
}

/// `bin2hex(string $string): string`
pub fn bin2hex(args: &mut Args<'_>) -> Result<Value> {
    let s = args.string(0)?;
    let mut out = String::with_capacity(s.len() * 2);
    for byte in s.bytes() {
        let _ = write!(out, "{byte:02x}");
    }
    Ok(Value::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{eval, fails, output};
    use sigil_foundation::ErrorKind;

    #[test]
    fn case_conversion() {
        assert_eq!(eval("strtoupper('abc-é')"), Value::from("ABC-é"));
        assert_eq!(eval("strtolower('ABC')"), Value::from("abc"));
        assert_eq!(eval("strrev('abc')"), Value::from("cba"));
    }

    #[test]
    fn forward_search() {
        assert_eq!(eval("strpos('hello', 'l')"), Value::Int(2));
        assert_eq!(eval("strpos('hello', 'l', 3)"), Value::Int(3));
        assert_eq!(eval("strpos('hello', 'l', -2)"), Value::Int(3));
        assert_eq!(eval("strpos('hello', 'z')"), Value::Bool(false));
        assert_eq!(eval("stripos('HeLLo', 'll')"), Value::Int(2));
        assert!(matches!(
            fails("strpos('abc', 'a', 10);"),
            ErrorKind::Fatal(ref m) if m.starts_with("strpos(): Argument #3 ($offset)")
        ));
    }

    #[test]
    fn reverse_search() {
        assert_eq!(eval("strrpos('hello', 'l')"), Value::Int(3));
        assert_eq!(eval("strrpos('hello', 'l', -3)"), Value::Int(2));
        assert_eq!(eval("strrpos('hello', 'h', 1)"), Value::Bool(false));
    }

    #[test]
    fn repeat_and_substr() {
        assert_eq!(eval("str_repeat('ab', 3)"), Value::from("ababab"));
        assert!(matches!(fails("str_repeat('a', -1);"), ErrorKind::Fatal(_)));
        assert_eq!(eval("substr('abcdef', 1, 3)"), Value::from("bcd"));
        assert_eq!(eval("substr('abcdef', -2)"), Value::from("ef"));
        assert_eq!(eval("substr('abcdef', 1, -1)"), Value::from("bcde"));
        assert_eq!(eval("substr('abc', 5)"), Value::from(""));
        assert_eq!(eval("substr('abc', 0, null)"), Value::from("abc"));
    }

    #[test]
    fn trimming() {
        assert_eq!(eval("trim(\"  x \\n\")"), Value::from("x"));
        assert_eq!(eval("ltrim('xxay', 'x')"), Value::from("ay"));
        assert_eq!(eval("rtrim('abc123', '0..9')"), Value::from("abc"));
    }

    #[test]
    fn implode_and_explode() {
        assert_eq!(eval("implode(',', [1, 2, 3])"), Value::from("1,2,3"));
        assert_eq!(eval("implode([1, 2])"), Value::from("12"));
        assert_eq!(eval("implode(['a', 'b'], '-')"), Value::from("a-b"));
        assert_eq!(
            output("echo implode('|', explode(',', 'a,b,c', 2));"),
            "a|b,c"
        );
        assert_eq!(output("echo implode('|', explode(',', 'a,b,c', -1));"), "a|b");
        assert!(matches!(fails("explode('', 'abc');"), ErrorKind::Fatal(_)));
    }

    #[test]
    fn html_and_escapes() {
        assert_eq!(eval("nl2br(\"a\\nb\")"), Value::from("a<br />\nb"));
        assert_eq!(eval("nl2br(\"a\\r\\nb\")"), Value::from("a<br />\r\nb"));
        assert_eq!(eval("stripslashes('a\\\\\\'b')"), Value::from("a'b"));
        assert_eq!(eval("bin2hex('abc')"), Value::from("616263"));
    }

    #[test]
    fn substring_from_match() {
        assert_eq!(eval("strstr('user@example.com', '@')"), Value::from("@example.com"));
        assert_eq!(eval("strstr('user@example.com', '@', true)"), Value::from("user"));
        assert_eq!(eval("stristr('HAYSTACK', 'st')"), Value::from("STACK"));
        assert_eq!(eval("strstr('abc', 'z')"), Value::Bool(false));
    }

    #[test]
    fn find_bytes_edges() {
        assert_eq!(find_bytes(b"abc", b"", 1), Some(1));
        assert_eq!(find_bytes(b"abc", b"c", 4), None);
        assert_eq!(resolve_offset(-1, 3), Some(2));
        assert_eq!(resolve_offset(-4, 3), None);
    }

    mod properties {
        use proptest::prelude::*;

        use super::super::{find_bytes, trim_mask};

        proptest! {
            #[test]
            fn found_positions_hold_the_needle(hay in "[ab]{0,16}", needle in "[ab]{1,3}") {
                if let Some(p) = find_bytes(hay.as_bytes(), needle.as_bytes(), 0) {
                    prop_assert_eq!(&hay.as_bytes()[p..p + needle.len()], needle.as_bytes());
                } else {
                    prop_assert!(!hay.contains(&needle));
                }
            }

            #[test]
            fn masks_without_ranges_are_kept(mask in "[a-z]{0,8}") {
                prop_assert_eq!(trim_mask(mask.as_bytes()), mask.into_bytes());
            }
        }
    }
}
