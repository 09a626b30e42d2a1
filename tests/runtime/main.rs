//! Integration tests for Layer 3: Runtime
//!
//! Tests for the engine, REPL, and compiled images working together with
//! the bundled extensions.

mod engine;
mod repl;
