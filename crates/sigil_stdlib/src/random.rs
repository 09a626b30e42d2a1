//! Pseudo-random numbers.
//!
//! Every generator call draws from a [`RandomState`] stored in the VM's
//! extension state, so runs seeded through `mt_srand` or the runtime
//! configuration are reproducible.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sigil_foundation::{Error, Result, Value};
use sigil_language::Args;
use tracing::debug;

use crate::argument_error;

/// Largest value returned by `rand()` and `mt_rand()` without bounds.
pub const RAND_MAX: i64 = 2_147_483_647;

/// Generator state shared by the random built-ins of one VM.
#[derive(Debug, Clone)]
pub struct RandomState {
    rng: ChaCha8Rng,
}

impl RandomState {
    /// Creates a generator with a fixed seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Creates a generator seeded from the operating system.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Returns a value in `min..=max`.
    pub fn between(&mut self, min: i64, max: i64) -> i64 {
        self.rng.gen_range(min..=max)
    }
}

impl Default for RandomState {
    fn default() -> Self {
        Self::from_entropy()
    }
}

fn draw(args: &mut Args<'_>, min: i64, max: i64) -> Result<Value> {
    let state = args.state().get_or_default::<RandomState>()?;
    Ok(Value::Int(state.between(min, max)))
}

/// `rand(): int` or `rand(int $min, int $max): int`
///
/// Unlike `mt_rand`, reversed bounds are accepted.
pub fn rand(args: &mut Args<'_>) -> Result<Value> {
    match args.len() {
        0 => draw(args, 0, RAND_MAX),
        2 => {
            let (a, b) = (args.int(0)?, args.int(1)?);
            draw(args, a.min(b), a.max(b))
        }
        n => Err(argument_count(args, n)),
    }
}

/// `mt_rand(): int` or `mt_rand(int $min, int $max): int`
pub fn mt_rand(args: &mut Args<'_>) -> Result<Value> {
    match args.len() {
        0 => draw(args, 0, RAND_MAX),
        2 => {
            let (min, max) = (args.int(0)?, args.int(1)?);
            if max < min {
                return Err(argument_error(
                    args,
                    2,
                    "max",
                    "must be greater than or equal to argument #1 ($min)",
                ));
            }
            draw(args, min, max)
        }
        n => Err(argument_count(args, n)),
    }
}

fn argument_count(args: &Args<'_>, given: usize) -> Error {
    Error::arity_mismatch(format!("{}() with 0 or 2 arguments", args.function_name()), given)
}

/// `mt_srand(int $seed = 0): void`; without a seed the generator is
/// reseeded from the operating system.
pub fn mt_srand(args: &mut Args<'_>) -> Result<Value> {
    let state = match args.optional_int(0)? {
        #[allow(clippy::cast_sign_loss)]
        Some(seed) => {
            debug!(seed, "reseeding generator");
            RandomState::seeded(seed as u64)
        }
        None => RandomState::from_entropy(),
    };
    args.state().insert(state);
    Ok(Value::Null)
}

/// `getrandmax(): int`, also registered as `mt_getrandmax`.
pub fn getrandmax(_args: &mut Args<'_>) -> Result<Value> {
    Ok(Value::Int(RAND_MAX))
}

/// `random_int(int $min, int $max): int`
pub fn random_int(args: &mut Args<'_>) -> Result<Value> {
    let (min, max) = (args.int(0)?, args.int(1)?);
    if min > max {
        return Err(argument_error(
            args,
            1,
            "min",
            "must be less than or equal to argument #2 ($max)",
        ));
    }
    draw(args, min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{eval, fails, run};
    use sigil_foundation::ErrorKind;

    #[test]
    fn seeded_state_is_deterministic() {
        let mut a = RandomState::seeded(42);
        let mut b = RandomState::seeded(42);
        let xs: Vec<i64> = (0..8).map(|_| a.between(0, 1000)).collect();
        let ys: Vec<i64> = (0..8).map(|_| b.between(0, 1000)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn bounded_draws_stay_in_range() {
        let (value, _) = run(
            "$ok = true; for ($i = 0; $i < 200; $i++) { $n = mt_rand(3, 7); if ($n < 3 || $n > 7) { $ok = false; } } return $ok;",
        )
        .unwrap();
        assert_eq!(value, Value::Bool(true));
        assert_eq!(eval("random_int(5, 5)"), Value::Int(5));
        assert_eq!(eval("rand(9, 9)"), Value::Int(9));
    }

    #[test]
    fn reseeding_repeats_the_sequence() {
        let (value, _) = run(
            "mt_srand(11); $a = mt_rand(); $b = mt_rand(); mt_srand(11); return $a === mt_rand() && $b === mt_rand();",
        )
        .unwrap();
        assert_eq!(value, Value::Bool(true));
    }

    #[test]
    fn limits_and_errors() {
        assert_eq!(eval("mt_getrandmax()"), Value::Int(RAND_MAX));
        assert_eq!(eval("getrandmax() === MT_RAND_MAX"), Value::Bool(true));
        assert!(matches!(eval("rand(10, 1)"), Value::Int(n) if (1..=10).contains(&n)));
        assert!(matches!(fails("mt_rand(10, 1);"), ErrorKind::Fatal(_)));
        assert!(matches!(
            fails("random_int(2, 1);"),
            ErrorKind::Fatal(ref m) if m == "random_int(): Argument #1 ($min) must be less than or equal to argument #2 ($max)"
        ));
        assert!(matches!(fails("mt_rand(1);"), ErrorKind::ArityMismatch { .. }));
    }
}
