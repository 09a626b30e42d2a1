//! Path manipulation on `/`-separated strings. Nothing here touches the
//! filesystem.

use sigil_foundation::{Array, Key, Result, Value};
use sigil_language::Args;

use crate::argument_error;

/// `PATHINFO_DIRNAME`
pub const PATHINFO_DIRNAME: i64 = 1;
/// `PATHINFO_BASENAME`
pub const PATHINFO_BASENAME: i64 = 2;
/// `PATHINFO_EXTENSION`
pub const PATHINFO_EXTENSION: i64 = 4;
/// `PATHINFO_FILENAME`
pub const PATHINFO_FILENAME: i64 = 8;
/// `PATHINFO_ALL`
pub const PATHINFO_ALL: i64 = 15;

fn base_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

fn parent_of(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    match trimmed.rfind('/') {
        None => ".".to_string(),
        Some(i) => {
            let parent = trimmed[..i].trim_end_matches('/');
            if parent.is_empty() {
                "/".to_string()
            } else {
                parent.to_string()
            }
        }
    }
}

/// `basename(string $path, string $suffix = ""): string`
pub fn basename(args: &mut Args<'_>) -> Result<Value> {
    let path = args.string(0)?;
    let suffix = args.optional_string(1)?.unwrap_or_default();
    let base = base_of(&path);
    let base = match base.strip_suffix(&*suffix) {
        Some(stem) if !suffix.is_empty() && !stem.is_empty() => stem,
        _ => base,
    };
    Ok(Value::from(base))
}

/// `dirname(string $path, int $levels = 1): string`
pub fn dirname(args: &mut Args<'_>) -> Result<Value> {
    let path = args.string(0)?;
    let levels = args.optional_int(1)?.unwrap_or(1);
    if levels < 1 {
        return Err(argument_error(args, 2, "levels", "must be greater than or equal to 1"));
    }
    let mut dir = path.to_string();
    for _ in 0..levels {
        let parent = parent_of(&dir);
        if parent == dir {
            break;
        }
        dir = parent;
    }
    Ok(Value::from(dir))
}

/// `pathinfo(string $path, int $flags = PATHINFO_ALL): array|string`
///
/// With a single flag the matching element is returned as a string, or `""`
/// when the path has no such part.
pub fn pathinfo(args: &mut Args<'_>) -> Result<Value> {
    let path = args.string(0)?;
    let flags = args.optional_int(1)?.unwrap_or(PATHINFO_ALL);

    let base = base_of(&path);
    let (filename, extension) = match base.rfind('.') {
        Some(i) => (&base[..i], Some(&base[i + 1..])),
        None => (base, None),
    };

    let mut info = Array::new();
    if flags & PATHINFO_DIRNAME != 0 && !path.is_empty() {
        info.insert(Key::from("dirname"), Value::from(parent_of(&path)));
    }
    if flags & PATHINFO_BASENAME != 0 {
        info.insert(Key::from("basename"), Value::from(base));
    }
    if let Some(extension) = extension.filter(|_| flags & PATHINFO_EXTENSION != 0) {
        info.insert(Key::from("extension"), Value::from(extension));
    }
    if flags & PATHINFO_FILENAME != 0 {
        info.insert(Key::from("filename"), Value::from(filename));
    }

    if flags == PATHINFO_ALL {
        return Ok(Value::Array(info));
    }
    Ok(info.values().next().cloned().unwrap_or_else(|| Value::from("")))
}
