//! Bundled extensions for Sigil.
//!
//! This crate provides the two extensions installed by default:
//! - [`core_extension`] - type inspection, conversions, debug output and
//!   error reporting, plus the `PHP_*` and `E_*` constants
//! - [`std_extension`] - string, path, array, math, time and pseudo-random
//!   functions
//!
//! Built-ins follow the language's coercion rules through
//! [`Args`](sigil_language::Args): scalar parameters are converted like a
//! cast and report the same diagnostics.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collection;
pub mod conversion;
pub mod info;
pub mod math;
pub mod path;
pub mod predicates;
pub mod random;
pub mod string;
pub mod time;

use sigil_foundation::{Error, ErrorLevel, Value};
use sigil_language::{Args, Arity, Extension};

pub use random::RandomState;

/// Version reported by `PHP_VERSION`.
pub const LANGUAGE_VERSION: &str = "8.0.0";

/// Builds the `core` extension.
#[must_use]
pub fn core_extension() -> Extension {
    let mut ext = Extension::new("core", LANGUAGE_VERSION)
        // Introspection and output
        .function("strlen", Arity::exact(1), info::strlen)
        .function("count", Arity::range(1, 2), info::count)
        .function("gettype", Arity::exact(1), info::gettype)
        .function("var_dump", Arity::at_least(1), info::var_dump)
        .function("print_r", Arity::range(1, 2), info::print_r)
        .function("function_exists", Arity::exact(1), info::function_exists)
        .function("trigger_error", Arity::range(1, 2), info::trigger_error)
        .function("error_reporting", Arity::range(0, 1), info::error_reporting)
        // Predicates
        .function("is_int", Arity::exact(1), predicates::is_int)
        .function("is_integer", Arity::exact(1), predicates::is_int)
        .function("is_float", Arity::exact(1), predicates::is_float)
        .function("is_string", Arity::exact(1), predicates::is_string)
        .function("is_bool", Arity::exact(1), predicates::is_bool)
        .function("is_array", Arity::exact(1), predicates::is_array)
        .function("is_null", Arity::exact(1), predicates::is_null)
        .function("is_numeric", Arity::exact(1), predicates::is_numeric)
        // Conversions
        .function("intval", Arity::range(1, 2), conversion::intval)
        .function("floatval", Arity::exact(1), conversion::floatval)
        .function("strval", Arity::exact(1), conversion::strval)
        .function("boolval", Arity::exact(1), conversion::boolval)
        // Constants
        .constant("PHP_INT_MAX", i64::MAX)
        .constant("PHP_INT_MIN", i64::MIN)
        .constant("PHP_INT_SIZE", 8_i64)
        .constant("PHP_FLOAT_EPSILON", f64::EPSILON)
        .constant("PHP_EOL", "\n")
        .constant("PHP_VERSION", LANGUAGE_VERSION)
        .constant("M_PI", std::f64::consts::PI)
        .constant("M_E", std::f64::consts::E)
        .constant("NAN", f64::NAN)
        .constant("INF", f64::INFINITY)
        .constant("COUNT_NORMAL", 0_i64)
        .constant("COUNT_RECURSIVE", 1_i64);
    for (name, level) in ErrorLevel::NAMED {
        ext = ext.constant(name, i64::from(level.bits()));
    }
    ext
}

/// Builds the `std` extension.
#[must_use]
pub fn std_extension() -> Extension {
    Extension::new("std", "7.0.0")
        // Strings
        .function("strtoupper", Arity::exact(1), string::strtoupper)
        .function("strtolower", Arity::exact(1), string::strtolower)
        .function("strrev", Arity::exact(1), string::strrev)
        .function("strpos", Arity::range(2, 3), string::strpos)
        .function("stripos", Arity::range(2, 3), string::stripos)
        .function("strrpos", Arity::range(2, 3), string::strrpos)
        .function("str_repeat", Arity::exact(2), string::str_repeat)
        .function("substr", Arity::range(2, 3), string::substr)
        .function("trim", Arity::range(1, 2), string::trim)
        .function("ltrim", Arity::range(1, 2), string::ltrim)
        .function("rtrim", Arity::range(1, 2), string::rtrim)
        .function("implode", Arity::range(1, 2), string::implode)
        .function("join", Arity::range(1, 2), string::implode)
        .function("explode", Arity::range(2, 3), string::explode)
        .function("nl2br", Arity::exact(1), string::nl2br)
        .function("stripslashes", Arity::exact(1), string::stripslashes)
        .function("strstr", Arity::range(2, 3), string::strstr)
        .function("stristr", Arity::range(2, 3), string::stristr)
        .function("bin2hex", Arity::exact(1), string::bin2hex)
        // Paths
        .function("basename", Arity::range(1, 2), path::basename)
        .function("dirname", Arity::range(1, 2), path::dirname)
        .function("pathinfo", Arity::range(1, 2), path::pathinfo)
        // Arrays
        .function("array_keys", Arity::exact(1), collection::array_keys)
        .function("array_values", Arity::exact(1), collection::array_values)
        .function("in_array", Arity::range(2, 3), collection::in_array)
        .function("array_key_exists", Arity::exact(2), collection::array_key_exists)
        .function_by_ref("array_push", Arity::at_least(1), &[0], collection::array_push)
        .function("array_merge", Arity::at_least(0), collection::array_merge)
        .function("range", Arity::range(2, 3), collection::range)
        // Math
        .function("max", Arity::at_least(1), math::max)
        .function("min", Arity::at_least(1), math::min)
        .function("abs", Arity::exact(1), math::abs)
        .function("floor", Arity::exact(1), math::floor)
        .function("ceil", Arity::exact(1), math::ceil)
        .function("round", Arity::range(1, 2), math::round)
        .function("sqrt", Arity::exact(1), math::sqrt)
        // Time
        .function("microtime", Arity::range(0, 1), time::microtime)
        .function("usleep", Arity::exact(1), time::usleep)
        // Pseudo-random numbers
        .function("rand", Arity::range(0, 2), random::rand)
        .function("mt_rand", Arity::range(0, 2), random::mt_rand)
        .function("mt_srand", Arity::range(0, 1), random::mt_srand)
        .function("mt_getrandmax", Arity::exact(0), random::getrandmax)
        .function("getrandmax", Arity::exact(0), random::getrandmax)
        .function("random_int", Arity::exact(2), random::random_int)
        // Constants
        .constant("PATHINFO_DIRNAME", path::PATHINFO_DIRNAME)
        .constant("PATHINFO_BASENAME", path::PATHINFO_BASENAME)
        .constant("PATHINFO_EXTENSION", path::PATHINFO_EXTENSION)
        .constant("PATHINFO_FILENAME", path::PATHINFO_FILENAME)
        .constant("PATHINFO_ALL", path::PATHINFO_ALL)
        .constant("MT_RAND_MAX", random::RAND_MAX)
}

/// Returns the extensions installed by default, in installation order.
#[must_use]
pub fn default_extensions() -> Vec<Extension> {
    vec![core_extension(), std_extension()]
}

/// Builds the fatal error for an invalid argument:
/// `name(): Argument #n ($param) message`.
pub(crate) fn argument_error(args: &Args<'_>, position: usize, param: &str, message: &str) -> Error {
    Error::fatal(format!(
        "{}(): Argument #{position} (${param}) {message}",
        args.function_name()
    ))
}

/// Wraps an optional position as `int|false`.
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn position_or_false(position: Option<usize>) -> Value {
    position.map_or(Value::Bool(false), |p| Value::Int(p as i64))
}
