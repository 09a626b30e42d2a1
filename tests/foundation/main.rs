//! Integration tests for Layer 0: Foundation
//!
//! Tests for values, coercions, comparisons, arrays, and diagnostics.

mod arithmetic;
mod arrays;
mod diagnostics;
mod equality;
