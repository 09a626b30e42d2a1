//! Compiling and running scripts under a [`RuntimeConfig`].
//!
//! Every run gets a fresh [`Module`] and [`Vm`]; nothing leaks from one run
//! into the next. The REPL is the exception and keeps its own VM alive.

use std::time::{Duration, Instant};

use sigil_foundation::{Diagnostic, Result, Value};
use sigil_language::{CancelToken, CompiledFunction, Module, Output, Vm, compile_with};
use sigil_stdlib::RandomState;
use tracing::{debug, info};

use crate::config::RuntimeConfig;

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Everything the script printed. Empty when output was streamed.
    pub output: String,
    /// The top-level return value.
    pub value: Value,
    /// Diagnostics raised during the run, reported or not displayed.
    pub diagnostics: Vec<Diagnostic>,
    /// Wall-clock time spent executing.
    pub elapsed: Duration,
}

/// Runs scripts with one configuration.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: RuntimeConfig,
}

impl Engine {
    /// Creates an engine.
    #[must_use]
    pub const fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Creates a module with the configured extensions installed.
    ///
    /// # Errors
    ///
    /// Returns an error if two extensions define the same function or
    /// constant.
    pub fn module(&self) -> Result<Module> {
        Module::with_extensions(&self.config.extensions)
    }

    /// Compiles `source` into a fresh module.
    ///
    /// # Errors
    ///
    /// Returns the first parse or compile error.
    pub fn compile(
        &self,
        source: &str,
        source_name: Option<&str>,
    ) -> Result<(Module, CompiledFunction)> {
        let mut module = self.module()?;
        let options = self.config.compiler_options(source_name);
        let unit = compile_with(source, &mut module, &options)?;
        debug!(
            functions = module.functions().len(),
            constants = module.constants().len(),
            instructions = unit.code.len(),
            "compiled"
        );
        Ok((module, unit))
    }

    /// Creates a VM over `module` honouring the configured limits, reporting
    /// mask and seed.
    #[must_use]
    pub fn vm(&self, module: Module) -> Vm {
        let mut vm = Vm::with_options(module, self.config.vm_options());
        vm.diagnostics_mut()
            .set_reporting(self.config.error_reporting);
        let random = self
            .config
            .seed
            .map_or_else(RandomState::from_entropy, RandomState::seeded);
        vm.state_mut().insert(random);
        vm
    }

    /// Arms the VM's cancellation token for one run.
    pub fn arm(&self, vm: &mut Vm) -> CancelToken {
        let mut token = CancelToken::new();
        if let Some(limit) = self.config.max_execution_time {
            token = token.with_timeout(limit);
        }
        vm.set_cancel_token(token.clone());
        token
    }

    /// Compiles and runs `source`, collecting its output.
    ///
    /// # Errors
    ///
    /// Returns a compile error, or the fatal error that stopped the run.
    pub fn run_source(&self, source: &str) -> Result<RunOutcome> {
        let (module, unit) = self.compile(source, None)?;
        self.run_compiled(module, &unit)
    }

    /// Runs an already compiled unit, collecting its output.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that stopped the run.
    pub fn run_compiled(&self, module: Module, unit: &CompiledFunction) -> Result<RunOutcome> {
        self.run_with_output(module, unit, Output::buffer())
    }

    /// Runs a compiled unit writing to `output`.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that stopped the run.
    pub fn run_with_output(
        &self,
        module: Module,
        unit: &CompiledFunction,
        output: Output,
    ) -> Result<RunOutcome> {
        let mut vm = self.vm(module);
        vm.set_output(output);
        self.arm(&mut vm);

        info!(unit = %unit.name, "run started");
        let start = Instant::now();
        let result = vm.run(unit);
        let elapsed = start.elapsed();
        info!(?elapsed, ok = result.is_ok(), "run finished");

        let value = result?;
        Ok(RunOutcome {
            output: vm.take_output(),
            value,
            diagnostics: vm.diagnostics_mut().take(),
            elapsed,
        })
    }
}
