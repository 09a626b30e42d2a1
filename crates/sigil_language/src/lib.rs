//! Lexer, parser, compiler, and bytecode VM for Sigil.
//!
//! This crate provides:
//! - [`Lexer`] - Tokenization of Sigil source and templates
//! - [`Parser`] - Parsing tokens into an AST
//! - [`Compiler`] - Compiling the AST to bytecode in a shared [`Module`]
//! - [`Vm`] - Stack-based bytecode interpreter
//!
//! Built-in functions are supplied by [`Extension`]s installed into the
//! module before any user code is compiled.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ast;
pub mod compiler;
pub mod extension;
pub mod lexer;
pub mod module;
pub mod opcode;
pub mod optimizer;
pub mod parser;
pub mod span;
pub mod token;
pub mod vm;

pub use ast::{Expr, ExprKind, Program, Stmt, StmtKind};
pub use compiler::{
    Arg, CompiledFunction, Compiler, CompilerOptions, MAIN, compile, compile_program, compile_with,
};
pub use extension::{Args, Arity, BuiltinFunction, Extension, Host, NativeFn, State};
pub use lexer::Lexer;
pub use module::{ExtensionInfo, FALSE_INDEX, Function, Module, NULL_INDEX, TRUE_INDEX};
pub use opcode::{Bytecode, Instruction, Opcode};
pub use parser::{Parser, parse, parse_expression};
pub use span::Span;
pub use token::{Token, TokenKind};
pub use vm::{CancelToken, Output, Vm, VmOptions, eval};
