//! Integration tests for Layer 1: Language
//!
//! Tests for the lexer, parser, compiler, and VM.

mod compiler;
mod lexer;
mod vm;
