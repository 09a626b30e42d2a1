//! Extension contract: named, versioned bundles of built-in functions and
//! constants.
//!
//! An [`Extension`] is installed into a [`Module`] before user code is
//! compiled. Built-ins receive their arguments through [`Args`], which
//! coerces like a cast and gives access to the running VM's output,
//! diagnostics and per-run extension [`State`].

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use sigil_foundation::{ops, Array, Diagnostics, Error, ErrorKind, Reference, Result, Type, Value};

use crate::module::Module;

/// Signature of a native implementation.
pub type NativeFn = fn(&mut Args<'_>) -> Result<Value>;

// =============================================================================
// Arity
// =============================================================================

/// Accepted argument counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Arity {
    /// Fewest arguments accepted.
    pub min: usize,
    /// Most arguments accepted; `None` for variadic functions.
    pub max: Option<usize>,
}

impl Arity {
    /// Exactly `n` arguments.
    #[must_use]
    pub const fn exact(n: usize) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    /// Between `min` and `max` arguments.
    #[must_use]
    pub const fn range(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    /// `min` or more arguments.
    #[must_use]
    pub const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    /// Returns true if `count` arguments are accepted.
    #[must_use]
    pub fn accepts(self, count: usize) -> bool {
        count >= self.min && self.max.is_none_or(|max| count <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "exactly {max}"),
            Some(max) => write!(f, "between {} and {max}", self.min),
            None => write!(f, "at least {}", self.min),
        }
    }
}

// =============================================================================
// Built-in functions
// =============================================================================

/// A native function exposed to scripts.
#[derive(Clone)]
pub struct BuiltinFunction {
    /// Name as called from scripts.
    pub name: Arc<str>,
    /// Accepted argument counts.
    pub arity: Arity,
    /// Parameter positions passed by reference.
    pub by_ref: Vec<usize>,
    /// The implementation.
    pub handler: NativeFn,
}

impl BuiltinFunction {
    /// Returns true if the parameter at `index` is passed by reference.
    #[must_use]
    pub fn takes_reference(&self, index: usize) -> bool {
        self.by_ref.contains(&index)
    }
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("by_ref", &self.by_ref)
            .finish_non_exhaustive()
    }
}

/// A named, versioned bundle of built-ins and constants.
#[derive(Clone, Debug)]
pub struct Extension {
    /// Extension name.
    pub name: String,
    /// Extension version.
    pub version: String,
    /// Built-in functions.
    pub functions: Vec<BuiltinFunction>,
    /// Named constants.
    pub constants: Vec<(String, Value)>,
}

impl Extension {
    /// Creates an empty extension.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            functions: Vec::new(),
            constants: Vec::new(),
        }
    }

    /// Adds a function taking its arguments by value.
    #[must_use]
    pub fn function(self, name: &str, arity: Arity, handler: NativeFn) -> Self {
        self.function_by_ref(name, arity, &[], handler)
    }

    /// Adds a function with by-reference parameters at `by_ref`.
    #[must_use]
    pub fn function_by_ref(
        mut self,
        name: &str,
        arity: Arity,
        by_ref: &[usize],
        handler: NativeFn,
    ) -> Self {
        self.functions.push(BuiltinFunction {
            name: Arc::from(name),
            arity,
            by_ref: by_ref.to_vec(),
            handler,
        });
        self
    }

    /// Adds a named constant.
    #[must_use]
    pub fn constant(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.constants.push((name.to_string(), value.into()));
        self
    }
}

// =============================================================================
// Extension state
// =============================================================================

/// Per-run storage for extensions, keyed by type.
#[derive(Default)]
pub struct State {
    slots: HashMap<TypeId, Box<dyn Any>>,
}

impl State {
    /// Creates empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, replacing any previous value of the same type.
    pub fn insert<T: Any>(&mut self, value: T) {
        self.slots.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Borrows the value of type `T`, if present.
    #[must_use]
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.slots
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.downcast_ref())
    }

    /// Borrows the value of type `T`, creating it with `Default` first.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the slot holds another type.
    pub fn get_or_default<T: Any + Default>(&mut self) -> Result<&mut T> {
        self.slots
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()))
            .downcast_mut()
            .ok_or_else(|| Error::internal("extension state holds a foreign type"))
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("entries", &self.slots.len())
            .finish()
    }
}

// =============================================================================
// Arguments
// =============================================================================

/// Host services available to a built-in while it runs.
pub struct Host<'a> {
    /// Script output.
    pub output: &'a mut dyn Write,
    /// Diagnostics sink of the run.
    pub diagnostics: &'a mut Diagnostics,
    /// The module being executed.
    pub module: &'a Module,
    /// Extension state of the run.
    pub state: &'a mut State,
}

/// The argument list of a built-in call.
///
/// Scalar accessors coerce like the corresponding cast and report the
/// same diagnostics. Missing arguments are an arity error.
pub struct Args<'a> {
    name: Arc<str>,
    values: Vec<Value>,
    host: Host<'a>,
}

impl<'a> Args<'a> {
    /// Wraps the values passed to `name`.
    #[must_use]
    pub fn new(name: Arc<str>, values: Vec<Value>, host: Host<'a>) -> Self {
        Self { name, values, host }
    }

    /// Returns the called function's name.
    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.name
    }

    /// Returns the number of arguments passed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no arguments were passed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn raw(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or_else(|| {
            Error::arity_mismatch(
                format!("{}() argument #{}", self.name, index + 1),
                self.values.len(),
            )
        })
    }

    /// Returns a copy of argument `index`, looking through references.
    ///
    /// # Errors
    ///
    /// Returns an arity error if the argument is missing.
    pub fn value(&self, index: usize) -> Result<Value> {
        self.raw(index).map(Value::deref_value)
    }

    /// Returns argument `index` as an integer.
    ///
    /// # Errors
    ///
    /// Returns an arity error if the argument is missing.
    pub fn int(&mut self, index: usize) -> Result<i64> {
        let value = self.value(index)?;
        Ok(ops::to_int(&value, &mut *self.host.diagnostics))
    }

    /// Returns argument `index` as a float.
    ///
    /// # Errors
    ///
    /// Returns an arity error if the argument is missing.
    pub fn float(&mut self, index: usize) -> Result<f64> {
        let value = self.value(index)?;
        Ok(ops::to_float(&value, &mut *self.host.diagnostics))
    }

    /// Returns argument `index` as a string.
    ///
    /// # Errors
    ///
    /// Returns an arity error if the argument is missing, or the
    /// conversion error for values without a string form.
    pub fn string(&mut self, index: usize) -> Result<Arc<str>> {
        let value = self.value(index)?;
        ops::to_string(&value, &mut *self.host.diagnostics)
    }

    /// Returns argument `index` as a boolean.
    ///
    /// # Errors
    ///
    /// Returns an arity error if the argument is missing.
    pub fn bool(&self, index: usize) -> Result<bool> {
        self.raw(index).map(ops::to_bool)
    }

    /// Returns argument `index`, which must be an array.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch for non-array arguments.
    pub fn array(&self, index: usize) -> Result<Array> {
        match self.value(index)? {
            Value::Array(array) => Ok(array),
            other => Err(Error::new(ErrorKind::TypeMismatch {
                expected: Type::Array,
                actual: other.value_type(),
            })),
        }
    }

    /// Returns the reference passed for a by-reference parameter.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the argument was passed by value.
    pub fn reference(&self, index: usize) -> Result<Reference> {
        match self.raw(index)? {
            Value::Reference(r) => Ok(r.clone()),
            _ => Err(Error::internal(format!(
                "{}() argument #{} was not passed by reference",
                self.name,
                index + 1
            ))),
        }
    }

    /// Returns argument `index` if present.
    #[must_use]
    pub fn optional(&self, index: usize) -> Option<Value> {
        self.values.get(index).map(Value::deref_value)
    }

    /// Returns argument `index` as an integer if present.
    ///
    /// # Errors
    ///
    /// Never fails for missing arguments.
    pub fn optional_int(&mut self, index: usize) -> Result<Option<i64>> {
        if index < self.values.len() {
            self.int(index).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Returns argument `index` as a string if present.
    ///
    /// # Errors
    ///
    /// Returns the conversion error for values without a string form.
    pub fn optional_string(&mut self, index: usize) -> Result<Option<Arc<str>>> {
        if index < self.values.len() {
            self.string(index).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Returns argument `index` as a boolean, or `default` if absent.
    #[must_use]
    pub fn optional_bool(&self, index: usize, default: bool) -> bool {
        self.values.get(index).map_or(default, ops::to_bool)
    }

    /// Returns copies of the arguments from `from` on.
    #[must_use]
    pub fn rest(&self, from: usize) -> Vec<Value> {
        self.values
            .iter()
            .skip(from)
            .map(Value::deref_value)
            .collect()
    }

    /// Returns the script output.
    pub fn output(&mut self) -> &mut dyn Write {
        &mut *self.host.output
    }

    /// Returns the diagnostics sink.
    pub fn diagnostics(&mut self) -> &mut Diagnostics {
        &mut *self.host.diagnostics
    }

    /// Returns the running module.
    #[must_use]
    pub fn module(&self) -> &Module {
        self.host.module
    }

    /// Returns the extension state.
    pub fn state(&mut self) -> &mut State {
        &mut *self.host.state
    }

    /// Writes text to the script output.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the output sink fails.
    pub fn write(&mut self, text: &str) -> Result<()> {
        self.host.output.write_all(text.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_args<R>(values: Vec<Value>, f: impl FnOnce(&mut Args<'_>) -> R) -> (R, Vec<u8>) {
        let mut out = Vec::new();
        let mut diagnostics = Diagnostics::new();
        let module = Module::new();
        let mut state = State::new();
        let result = {
            let host = Host {
                output: &mut out,
                diagnostics: &mut diagnostics,
                module: &module,
                state: &mut state,
            };
            let mut args = Args::new(Arc::from("test"), values, host);
            f(&mut args)
        };
        (result, out)
    }

    #[test]
    fn arity_bounds() {
        assert!(Arity::exact(1).accepts(1));
        assert!(!Arity::exact(1).accepts(2));
        assert!(Arity::range(1, 3).accepts(3));
        assert!(!Arity::range(1, 3).accepts(0));
        assert!(Arity::at_least(1).accepts(10));
        assert_eq!(Arity::exact(2).to_string(), "exactly 2");
        assert_eq!(Arity::range(1, 2).to_string(), "between 1 and 2");
        assert_eq!(Arity::at_least(0).to_string(), "at least 0");
    }

    #[test]
    fn scalar_accessors_coerce() {
        let values = vec![Value::from("42"), Value::Int(3), Value::Null];
        let (result, _) = with_args(values, |args| {
            (
                args.int(0).unwrap(),
                args.string(1).unwrap(),
                args.bool(2).unwrap(),
                args.float(1).unwrap(),
            )
        });
        assert_eq!(result.0, 42);
        assert_eq!(&*result.1, "3");
        assert!(!result.2);
        assert!((result.3 - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn array_accessor_is_strict() {
        let (result, _) = with_args(vec![Value::Int(1)], |args| args.array(0));
        assert!(matches!(
            result.unwrap_err().kind,
            ErrorKind::TypeMismatch { .. }
        ));
    }

    #[test]
    fn missing_argument_is_arity_error() {
        let (result, _) = with_args(vec![], |args| args.value(0));
        assert!(matches!(
            result.unwrap_err().kind,
            ErrorKind::ArityMismatch { .. }
        ));
    }

    #[test]
    fn optional_accessors() {
        let (result, _) = with_args(vec![Value::Int(5)], |args| {
            (args.optional_int(0).unwrap(), args.optional_int(1).unwrap())
        });
        assert_eq!(result, (Some(5), None));
    }

    #[test]
    fn writes_reach_output() {
        let (_, out) = with_args(vec![], |args| args.write("hi"));
        assert_eq!(out, b"hi");
    }

    #[derive(Default)]
    struct Counter(u32);

    #[test]
    fn state_is_typed() {
        let mut state = State::new();
        state.get_or_default::<Counter>().unwrap().0 += 2;
        state.get_or_default::<Counter>().unwrap().0 += 1;
        assert_eq!(state.get::<Counter>().map(|c| c.0), Some(3));
        assert!(state.get::<String>().is_none());
    }

    #[test]
    fn extension_builder() {
        fn noop(_: &mut Args<'_>) -> Result<Value> {
            Ok(Value::Null)
        }
        let ext = Extension::new("demo", "1.0.0")
            .function("a", Arity::exact(0), noop)
            .function_by_ref("b", Arity::exact(1), &[0], noop)
            .constant("DEMO", 1_i64);
        assert_eq!(ext.functions.len(), 2);
        assert!(ext.functions[1].takes_reference(0));
        assert!(!ext.functions[0].takes_reference(0));
        assert_eq!(ext.constants[0].1, Value::Int(1));
    }
}
