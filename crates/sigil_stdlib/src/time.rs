//! Clock and sleep functions.

use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sigil_foundation::{Result, Value};
use sigil_language::Args;
use tracing::trace;

use crate::argument_error;

/// `microtime(bool $as_float = false): string|float`
///
/// Without `$as_float` the result is `"msec sec"`, the fractional seconds
/// followed by the whole seconds since the Unix epoch.
pub fn microtime(args: &mut Args<'_>) -> Result<Value> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    if args.optional_bool(0, false) {
        return Ok(Value::Float(now.as_secs_f64()));
    }
    let micros = now.subsec_micros();
    Ok(Value::from(format!("0.{micros:06}00 {}", now.as_secs())))
}

/// `usleep(int $microseconds): void`
pub fn usleep(args: &mut Args<'_>) -> Result<Value> {
    let micros = args.int(0)?;
    let Ok(micros) = u64::try_from(micros) else {
        return Err(argument_error(
            args,
            1,
            "microseconds",
            "must be greater than or equal to 0",
        ));
    };
    trace!(micros, "sleeping");
    thread::sleep(Duration::from_micros(micros));
    Ok(Value::Null)
}
