//! Runtime configuration.
//!
//! A [`RuntimeConfig`] is built once at start-up and passed by reference to
//! the [`Engine`](crate::Engine) and the [`Repl`](crate::Repl). There is no
//! global state: two engines with different configurations can run side by
//! side.

use std::time::Duration;

use sigil_foundation::ErrorLevel;
use sigil_language::{CompilerOptions, Extension, VmOptions};
use sigil_stdlib::default_extensions;

/// Settings for compiling and running scripts.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Maximum operand-stack depth.
    pub stack_capacity: usize,
    /// Maximum call depth.
    pub frame_capacity: usize,
    /// Diagnostic levels that are reported.
    pub error_reporting: ErrorLevel,
    /// Render diagnostics into the script output.
    pub display_errors: bool,
    /// Wall-clock limit for one run.
    pub max_execution_time: Option<Duration>,
    /// Log every dispatched instruction.
    pub trace_vm: bool,
    /// Fuse adjacent pops when compiling.
    pub fuse_pops: bool,
    /// Seed for the pseudo-random built-ins; `None` draws from the OS.
    pub seed: Option<u64>,
    /// Extensions installed into every module, in order.
    pub extensions: Vec<Extension>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let vm = VmOptions::default();
        Self {
            stack_capacity: vm.stack_capacity,
            frame_capacity: vm.frame_capacity,
            error_reporting: ErrorLevel::ALL,
            display_errors: vm.display_errors,
            max_execution_time: None,
            trace_vm: false,
            fuse_pops: CompilerOptions::default().fuse_pops,
            seed: None,
            extensions: default_extensions(),
        }
    }
}

impl RuntimeConfig {
    /// The default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration for working on scripts: a fixed seed, a 30 second
    /// time limit and unfused pops so disassembly mirrors the source.
    #[must_use]
    pub fn development() -> Self {
        Self::default()
            .with_seed(0)
            .with_max_execution_time(Duration::from_secs(30))
            .with_fuse_pops(false)
    }

    /// Sets the operand-stack capacity.
    #[must_use]
    pub const fn with_stack_capacity(mut self, capacity: usize) -> Self {
        self.stack_capacity = capacity;
        self
    }

    /// Sets the call-depth limit.
    #[must_use]
    pub const fn with_frame_capacity(mut self, capacity: usize) -> Self {
        self.frame_capacity = capacity;
        self
    }

    /// Sets the reporting mask.
    #[must_use]
    pub const fn with_error_reporting(mut self, level: ErrorLevel) -> Self {
        self.error_reporting = level;
        self
    }

    /// Turns rendering of diagnostics into the output on or off.
    #[must_use]
    pub const fn with_display_errors(mut self, display: bool) -> Self {
        self.display_errors = display;
        self
    }

    /// Limits the wall-clock time of a run.
    #[must_use]
    pub const fn with_max_execution_time(mut self, limit: Duration) -> Self {
        self.max_execution_time = Some(limit);
        self
    }

    /// Turns per-instruction tracing on or off.
    #[must_use]
    pub const fn with_trace_vm(mut self, trace: bool) -> Self {
        self.trace_vm = trace;
        self
    }

    /// Turns the pop-fusing pass on or off.
    #[must_use]
    pub const fn with_fuse_pops(mut self, fuse: bool) -> Self {
        self.fuse_pops = fuse;
        self
    }

    /// Seeds the pseudo-random built-ins.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Appends an extension.
    #[must_use]
    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Replaces the extension list.
    #[must_use]
    pub fn with_extensions(mut self, extensions: Vec<Extension>) -> Self {
        self.extensions = extensions;
        self
    }

    /// VM options derived from this configuration.
    #[must_use]
    pub fn vm_options(&self) -> VmOptions {
        VmOptions {
            stack_capacity: self.stack_capacity,
            frame_capacity: self.frame_capacity,
            display_errors: self.display_errors,
            trace: self.trace_vm,
        }
    }

    /// Compiler options derived from this configuration.
    #[must_use]
    pub fn compiler_options(&self, source_name: Option<&str>) -> CompilerOptions {
        CompilerOptions {
            fuse_pops: self.fuse_pops,
            source_name: source_name.map(str::to_string),
        }
    }
}
