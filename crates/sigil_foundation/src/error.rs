//! Fatal errors.
//!
//! An [`Error`] aborts compilation or stops the running script. Non-fatal runtime conditions are
//! [`Diagnostic`](crate::Diagnostic)s instead.

use std::fmt;

use thiserror::Error;

use crate::types::Type;

/// A fatal failure, optionally located in source and on the call stack.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Where it went wrong, when known.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Wraps `kind` with no location.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Attaches a location.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// `expected` was required but `actual` was found.
    #[must_use]
    pub fn type_mismatch(expected: Type, actual: Type) -> Self {
        Self::new(ErrorKind::TypeMismatch { expected, actual })
    }

    /// Unknown function or constant.
    #[must_use]
    pub fn undefined_symbol(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UndefinedSymbol(name.into()))
    }

    /// Wrong argument count; `expected` is human-readable (`"2"`, `"1 to 3"`).
    #[must_use]
    pub fn arity_mismatch(expected: String, actual: usize) -> Self {
        Self::new(ErrorKind::ArityMismatch { expected, actual })
    }

    /// `left op right` has no rule for these types.
    #[must_use]
    pub fn unsupported_operands(op: &'static str, left: Type, right: Type) -> Self {
        Self::new(ErrorKind::UnsupportedOperands { op, left, right })
    }

    /// A script-visible fatal error.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal(message.into()))
    }

    /// A broken invariant inside the compiler or VM.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// True for deadline and cancellation stops.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io(err))
    }
}

/// Every way compilation or execution can fail.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A value had the wrong type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Required type.
        expected: Type,
        /// Type found.
        actual: Type,
    },

    /// Operator applied to operand types it has no rule for.
    #[error("unsupported operand types: {left} {op} {right}")]
    UnsupportedOperands {
        /// The operator symbol.
        op: &'static str,
        /// Left operand type.
        left: Type,
        /// Right operand type.
        right: Type,
    },

    /// Function or constant was not defined.
    #[error("undefined symbol: {0}")]
    UndefinedSymbol(String),

    /// Variable could not be resolved to a slot.
    #[error("undefined variable: ${0}")]
    UndefinedVariable(String),

    /// A call passed too few or too many arguments.
    #[error("arity mismatch: expected {expected}, got {actual}")]
    ArityMismatch {
        /// Accepted counts, for the message.
        expected: String,
        /// Arguments passed.
        actual: usize,
    },

    /// `/` with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,

    /// `%` with a zero divisor.
    #[error("modulo by zero")]
    ModuloByZero,

    /// Shift by a negative amount.
    #[error("bit shift by negative number")]
    NegativeShift,

    /// The source text is not valid syntax.
    #[error("parse error at {line}:{column}: {message}")]
    ParseError {
        /// What the parser expected.
        message: String,
        /// 1-based line.
        line: u32,
        /// 1-based column.
        column: u32,
        /// Text of the offending line.
        context: String,
    },

    /// Syntax the compiler does not translate.
    #[error("unsupported construct: {0}")]
    Unsupported(String),

    /// A literal that cannot be represented.
    #[error("malformed literal: {0}")]
    MalformedLiteral(String),

    /// Call of a value that is not a function.
    #[error("value of type {0} is not callable")]
    NotCallable(Type),

    /// `foreach` over a value without an iterator.
    #[error("value of type {0} is not iterable")]
    NotIterable(Type),

    /// Comparison involving a value without comparison support.
    #[error("cannot compare value of type {0}")]
    UncomparableValue(Type),

    /// Cast with no defined conversion path.
    #[error("cannot cast {from} to {to}")]
    InvalidCast {
        /// Source type.
        from: Type,
        /// Target type.
        to: Type,
    },

    /// Operand stack capacity exceeded.
    #[error("stack overflow (capacity {capacity})")]
    StackOverflow {
        /// Configured operand stack capacity.
        capacity: usize,
    },

    /// Call depth exceeded.
    #[error("maximum call depth of {depth} frames reached")]
    FrameOverflow {
        /// Configured frame capacity.
        depth: usize,
    },

    /// Fatal error raised by script code or a built-in.
    #[error("{0}")]
    Fatal(String),

    /// Execution was cancelled or ran past its deadline.
    #[error("execution cancelled")]
    Cancelled,

    /// Failure writing output or reading source.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Compiled image could not be encoded or decoded.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// A broken invariant.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Location of a failure: source name, position and call stack.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Script path or `-` for inline code.
    pub source: Option<String>,
    /// 1-based line.
    pub line: Option<usize>,
    /// 1-based column.
    pub column: Option<usize>,
    /// Call stack at the failure point, innermost first.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// An empty location.
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: None,
            line: None,
            column: None,
            stack: Vec::new(),
        }
    }

    /// Names the script.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the position.
    #[must_use]
    pub fn with_position(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Appends the next outer function.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = self.source.as_deref().unwrap_or("-");
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "{source} on line {line}, column {column}")?,
            (Some(line), None) => write!(f, "{source} on line {line}")?,
            _ => f.write_str(source)?,
        }
        self.stack
            .iter()
            .enumerate()
            .try_for_each(|(depth, frame)| write!(f, "\n#{depth} {frame}()"))
    }
}

/// `Result` with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_render_their_operands() {
        let mismatch = Error::type_mismatch(Type::Int, Type::String);
        assert_eq!(mismatch.to_string(), "type mismatch: expected int, got string");

        let operands = Error::unsupported_operands("+", Type::Array, Type::Int);
        assert_eq!(operands.to_string(), "unsupported operand types: array + int");

        let arity = Error::arity_mismatch("1 to 2".into(), 3);
        assert_eq!(arity.to_string(), "arity mismatch: expected 1 to 2, got 3");
    }

    #[test]
    fn location_lists_frames_innermost_first() {
        let err = Error::undefined_symbol("missing").with_context(
            ErrorContext::new()
                .with_source("fib.php")
                .with_position(4, 12)
                .with_frame("fib")
                .with_frame("main"),
        );
        let Some(location) = &err.context else {
            panic!("context was dropped");
        };
        assert_eq!(location.stack, ["fib", "main"]);
        assert_eq!(location.to_string(), "fib.php on line 4, column 12\n#0 fib()\n#1 main()");
    }

    #[test]
    fn bare_location_falls_back_to_dash() {
        assert_eq!(ErrorContext::default().to_string(), "-");
        assert_eq!(ErrorContext::new().with_frame("f").to_string(), "-\n#0 f()");
    }

    #[test]
    fn io_errors_convert() {
        let err: Error = std::io::Error::other("pipe closed").into();
        assert!(matches!(err.kind, ErrorKind::Io(_)));
        assert!(!err.is_cancelled());
        assert!(Error::new(ErrorKind::Cancelled).is_cancelled());
    }
}
