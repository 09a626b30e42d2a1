//! The module: constant pool, named constants and function table shared by
//! every unit compiled against it.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use sigil_foundation::{Error, ErrorKind, Result, Value};
use tracing::debug;

use crate::compiler::CompiledFunction;
use crate::extension::{BuiltinFunction, Extension};

/// Pool indices of the literals every module is seeded with.
pub const TRUE_INDEX: u32 = 0;
/// Pool index of `false`.
pub const FALSE_INDEX: u32 = 1;
/// Pool index of `null`.
pub const NULL_INDEX: u32 = 2;

/// An entry of the function table.
#[derive(Clone, Debug)]
pub enum Function {
    /// A function compiled from source.
    Compiled(Rc<CompiledFunction>),
    /// A native function from an extension.
    Builtin(BuiltinFunction),
}

impl Function {
    /// Returns the declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Compiled(f) => &f.name,
            Self::Builtin(b) => &b.name,
        }
    }

    /// Returns true if argument `index` is passed by reference.
    #[must_use]
    pub fn takes_reference(&self, index: usize) -> bool {
        match self {
            Self::Compiled(f) => f.takes_reference(index),
            Self::Builtin(b) => b.takes_reference(index),
        }
    }
}

/// Name and version of an installed extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionInfo {
    /// Extension name.
    pub name: String,
    /// Extension version.
    pub version: String,
}

/// Key for constant deduplication.
/// Floats are keyed by their bits so `NaN` and `-0.0` stay distinct.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum PoolKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    String(String),
}

impl PoolKey {
    fn from_value(v: &Value) -> Option<Self> {
        match v {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Int(n) => Some(Self::Int(*n)),
            Value::Float(f) => Some(Self::Float(f.to_bits())),
            Value::String(s) => Some(Self::String(s.to_string())),
            // Arrays are pooled without deduplication.
            _ => None,
        }
    }
}

/// Constant pool, named constants and function table.
///
/// The module outlives individual compilations: the REPL compiles every
/// entry against the same module so functions and constants persist.
#[derive(Clone)]
pub struct Module {
    constants: Vec<Value>,
    constant_map: HashMap<PoolKey, u32>,
    /// Case-sensitive constant names.
    named: HashMap<String, u32>,
    functions: Vec<Function>,
    /// Lowercased function name -> table index.
    function_map: HashMap<String, u32>,
    extensions: Vec<ExtensionInfo>,
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl Module {
    /// Creates a module whose pool holds `true`, `false` and `null`.
    #[must_use]
    pub fn new() -> Self {
        let mut module = Self {
            constants: Vec::new(),
            constant_map: HashMap::new(),
            named: HashMap::new(),
            functions: Vec::new(),
            function_map: HashMap::new(),
            extensions: Vec::new(),
        };
        for value in [Value::Bool(true), Value::Bool(false), Value::Null] {
            module.push_constant(value);
        }
        module
    }

    /// Creates a module with the given extensions installed.
    ///
    /// # Errors
    ///
    /// Returns an error if two extensions declare the same name.
    pub fn with_extensions<'a>(extensions: impl IntoIterator<Item = &'a Extension>) -> Result<Self> {
        let mut module = Self::new();
        for extension in extensions {
            module.install(extension)?;
        }
        Ok(module)
    }

    fn push_constant(&mut self, value: Value) -> u32 {
        let idx = self.constants.len() as u32;
        if let Some(key) = PoolKey::from_value(&value) {
            self.constant_map.insert(key, idx);
        }
        self.constants.push(value);
        idx
    }

    /// Adds a value to the pool, returning the index of an equal
    /// scalar already pooled if there is one.
    pub fn add_constant(&mut self, value: Value) -> u32 {
        let value = value.into_deref();
        if let Some(&idx) = PoolKey::from_value(&value).and_then(|k| self.constant_map.get(&k)) {
            return idx;
        }
        self.push_constant(value)
    }

    /// Returns the pool entry at `idx`.
    #[must_use]
    pub fn constant(&self, idx: u32) -> Option<&Value> {
        self.constants.get(idx as usize)
    }

    /// Returns the whole pool.
    #[must_use]
    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    /// Binds a constant name to a value.
    ///
    /// # Errors
    ///
    /// Returns a fatal error if the name is already defined.
    pub fn define(&mut self, name: &str, value: Value) -> Result<u32> {
        if self.lookup_constant(name).is_some() {
            return Err(Error::fatal(format!("Constant {name} already defined")));
        }
        let idx = self.add_constant(value);
        self.named.insert(name.to_string(), idx);
        Ok(idx)
    }

    /// Resolves a constant name to its pool index. `true`, `false` and
    /// `null` match in any case.
    #[must_use]
    pub fn lookup_constant(&self, name: &str) -> Option<u32> {
        match name.to_ascii_lowercase().as_str() {
            "true" => Some(TRUE_INDEX),
            "false" => Some(FALSE_INDEX),
            "null" => Some(NULL_INDEX),
            _ => self.named.get(name).copied(),
        }
    }

    /// Returns the defined constant names with their pool indices.
    pub fn named_constants(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.named.iter().map(|(name, &idx)| (name.as_str(), idx))
    }

    /// Adds a function to the table.
    ///
    /// # Errors
    ///
    /// Returns a fatal error if a function of that name exists.
    pub fn declare_function(&mut self, function: Function) -> Result<u32> {
        let key = function.name().to_ascii_lowercase();
        if self.function_map.contains_key(&key) {
            return Err(Error::fatal(format!(
                "Cannot redeclare function {}()",
                function.name()
            )));
        }
        let idx = self.functions.len() as u32;
        debug!(name = function.name(), idx, "declared function");
        self.function_map.insert(key, idx);
        self.functions.push(function);
        Ok(idx)
    }

    /// Replaces the table entry at `idx`, keeping its name binding.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `idx` is out of range.
    pub fn replace_function(&mut self, idx: u32, function: Function) -> Result<()> {
        let slot = self
            .functions
            .get_mut(idx as usize)
            .ok_or_else(|| Error::internal(format!("function index {idx} out of bounds")))?;
        *slot = function;
        Ok(())
    }

    /// Resolves a function name (case-insensitive) to its table index.
    #[must_use]
    pub fn function_index(&self, name: &str) -> Option<u32> {
        self.function_map.get(&name.to_ascii_lowercase()).copied()
    }

    /// Returns the table entry at `idx`.
    #[must_use]
    pub fn function(&self, idx: u32) -> Option<&Function> {
        self.functions.get(idx as usize)
    }

    /// Looks a function up by name.
    #[must_use]
    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.function_index(name).and_then(|idx| self.function(idx))
    }

    /// Returns the whole function table.
    #[must_use]
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Installs an extension's functions and constants.
    ///
    /// # Errors
    ///
    /// Returns a fatal error if a name is already taken.
    pub fn install(&mut self, extension: &Extension) -> Result<()> {
        for function in &extension.functions {
            self.declare_function(Function::Builtin(function.clone()))?;
        }
        for (name, value) in &extension.constants {
            self.define(name, value.clone())?;
        }
        debug!(
            name = %extension.name,
            version = %extension.version,
            functions = extension.functions.len(),
            "installed extension"
        );
        self.extensions.push(ExtensionInfo {
            name: extension.name.clone(),
            version: extension.version.clone(),
        });
        Ok(())
    }

    /// Returns the installed extensions.
    #[must_use]
    pub fn extensions(&self) -> &[ExtensionInfo] {
        &self.extensions
    }

    /// Returns true if an extension of that name is installed.
    #[must_use]
    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|e| e.name.eq_ignore_ascii_case(name))
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("constants", &self.constants.len())
            .field("functions", &self.functions.len())
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Module {
    /// Dumps the pool and the disassembly of every compiled function.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "constants:")?;
        for (i, value) in self.constants.iter().enumerate() {
            writeln!(f, "  {i:>4}: {value:?}")?;
        }
        for function in &self.functions {
            if let Function::Compiled(compiled) = function {
                write!(f, "\n{compiled}")?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Images
// =============================================================================

/// Table entry as stored in an image: built-ins are kept by name.
#[cfg(feature = "serde")]
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum FunctionImage {
    /// A compiled function.
    Compiled(CompiledFunction),
    /// A built-in to relink on load.
    Builtin(String),
}

/// The serializable part of a module.
#[cfg(feature = "serde")]
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ModuleImage {
    /// Constant pool.
    pub constants: Vec<Value>,
    /// Constant names and their pool indices.
    pub named: Vec<(String, u32)>,
    /// Function table in index order.
    pub functions: Vec<FunctionImage>,
    /// Extension names the image was compiled against.
    pub extensions: Vec<String>,
}

#[cfg(feature = "serde")]
impl Module {
    /// Captures the module as an image.
    #[must_use]
    pub fn to_image(&self) -> ModuleImage {
        let mut named: Vec<(String, u32)> = self
            .named
            .iter()
            .map(|(name, &idx)| (name.clone(), idx))
            .collect();
        named.sort_by_key(|(_, idx)| *idx);
        ModuleImage {
            constants: self.constants.clone(),
            named,
            functions: self
                .functions
                .iter()
                .map(|f| match f {
                    Function::Compiled(c) => FunctionImage::Compiled(c.as_ref().clone()),
                    Function::Builtin(b) => FunctionImage::Builtin(b.name.to_string()),
                })
                .collect(),
            extensions: self.extensions.iter().map(|e| e.name.clone()).collect(),
        }
    }

    /// Rebuilds a module from an image, relinking built-ins by name
    /// against `extensions`.
    ///
    /// # Errors
    ///
    /// Returns `UndefinedSymbol` for a built-in no extension provides.
    pub fn from_image<'a>(
        image: ModuleImage,
        extensions: impl IntoIterator<Item = &'a Extension>,
    ) -> Result<Self> {
        let extensions: Vec<&Extension> = extensions.into_iter().collect();
        let mut module = Self::new();
        module.constants.clear();
        module.constant_map.clear();
        for value in image.constants {
            module.push_constant(value);
        }
        for (name, idx) in image.named {
            module.named.insert(name, idx);
        }
        for entry in image.functions {
            let function = match entry {
                FunctionImage::Compiled(c) => Function::Compiled(Rc::new(c)),
                FunctionImage::Builtin(name) => extensions
                    .iter()
                    .flat_map(|e| e.functions.iter())
                    .find(|b| b.name.eq_ignore_ascii_case(&name))
                    .cloned()
                    .map(Function::Builtin)
                    .ok_or_else(|| Error::new(ErrorKind::UndefinedSymbol(name)))?,
            };
            module.declare_function(function)?;
        }
        for extension in extensions {
            module.extensions.push(ExtensionInfo {
                name: extension.name.clone(),
                version: extension.version.clone(),
            });
        }
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::{Args, Arity};

    fn answer(_: &mut Args<'_>) -> Result<Value> {
        Ok(Value::Int(42))
    }

    #[test]
    fn pool_is_seeded() {
        let module = Module::new();
        assert_eq!(
            module.constants(),
            &[Value::Bool(true), Value::Bool(false), Value::Null]
        );
    }

    #[test]
    fn constants_are_deduplicated() {
        let mut module = Module::new();
        let a = module.add_constant(Value::Int(1));
        let b = module.add_constant(Value::from("x"));
        assert_eq!(module.add_constant(Value::Int(1)), a);
        assert_eq!(module.add_constant(Value::from("x")), b);
        assert_eq!(module.add_constant(Value::Null), NULL_INDEX);
        // 1 and 1.0 are different literals.
        assert_ne!(module.add_constant(Value::Float(1.0)), a);
    }

    #[test]
    fn named_constants() {
        let mut module = Module::new();
        let idx = module.define("ANSWER", Value::Int(42)).unwrap();
        assert_eq!(module.lookup_constant("ANSWER"), Some(idx));
        assert_eq!(module.lookup_constant("answer"), None);
        assert_eq!(module.lookup_constant("TRUE"), Some(TRUE_INDEX));
        assert_eq!(module.lookup_constant("Null"), Some(NULL_INDEX));
        assert!(module.define("ANSWER", Value::Int(1)).is_err());
    }

    #[test]
    fn functions_resolve_case_insensitively() {
        let ext = Extension::new("demo", "1.0").function("Answer", Arity::exact(0), answer);
        let module = Module::with_extensions([&ext]).unwrap();
        assert_eq!(module.function_index("answer"), Some(0));
        assert_eq!(module.function_by_name("ANSWER").map(Function::name), Some("Answer"));
        assert!(module.has_extension("DEMO"));
    }

    #[test]
    fn redeclaration_is_fatal() {
        let ext = Extension::new("demo", "1.0").function("f", Arity::exact(0), answer);
        let mut module = Module::with_extensions([&ext]).unwrap();
        let err = module.install(&ext).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Fatal(ref m) if m.contains("redeclare")));
    }
}
