//! Engine, REPL, CLI, and compiled images for Sigil.
//!
//! This crate provides:
//! - [`RuntimeConfig`] - Limits, reporting mask and extensions for a run
//! - [`Engine`] - Compile and run scripts with a configuration
//! - [`Repl`] - Interactive read-eval-print loop
//! - [`serialize`] - Compiled images on disk
//! - [`cli`] - Argument parsing for the `sigil` binary

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cli;
pub mod config;
pub mod editor;
pub mod engine;
pub mod highlight;
pub mod repl;
pub mod serialize;

pub use cli::{CliError, CliOptions, Input};
pub use config::RuntimeConfig;
pub use editor::{LineEditor, Read, RustylineEditor, ScriptedEditor};
pub use engine::{Engine, RunOutcome};
pub use highlight::SigilHighlighter;
pub use repl::Repl;

use tracing_subscriber::EnvFilter;

/// Installs a stderr log subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Calling this twice is harmless.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
