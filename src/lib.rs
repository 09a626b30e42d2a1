//! Sigil - bytecode compiler and stack VM for a PHP-flavoured scripting language
//!
//! This crate re-exports all layers of the Sigil system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: sigil_runtime     - Configuration, engine, REPL, CLI
//! Layer 2: sigil_stdlib      - Bundled `core` and `std` extensions
//! Layer 1: sigil_language    - Lexer, parser, compiler, bytecode VM
//! Layer 0: sigil_foundation  - Values, arrays, coercions, errors, diagnostics
//! ```

pub use sigil_foundation as foundation;
pub use sigil_language as language;
pub use sigil_runtime as runtime;
pub use sigil_stdlib as stdlib;
