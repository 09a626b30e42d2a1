//! Leveled, non-fatal runtime diagnostics.
//!
//! Operations that hit a recoverable condition (array to string
//! conversion, non-numeric operands) report a [`Diagnostic`] through the
//! [`Diagnostics`] sink and carry on with a sentinel result. Diagnostics
//! never unwind the stack; fatal conditions are [`Error`](crate::Error)s.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Severity bit-mask, mirroring the classic `E_*` constants.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ErrorLevel(u32);

impl ErrorLevel {
    /// Fatal run-time error.
    pub const ERROR: Self = Self(1);
    /// Run-time warning.
    pub const WARNING: Self = Self(1 << 1);
    /// Compile-time parse error.
    pub const PARSE: Self = Self(1 << 2);
    /// Run-time notice.
    pub const NOTICE: Self = Self(1 << 3);
    /// Fatal error during start-up.
    pub const CORE_ERROR: Self = Self(1 << 4);
    /// Warning during start-up.
    pub const CORE_WARNING: Self = Self(1 << 5);
    /// Fatal compile-time error.
    pub const COMPILE_ERROR: Self = Self(1 << 6);
    /// Compile-time warning.
    pub const COMPILE_WARNING: Self = Self(1 << 7);
    /// User-generated error.
    pub const USER_ERROR: Self = Self(1 << 8);
    /// User-generated warning.
    pub const USER_WARNING: Self = Self(1 << 9);
    /// User-generated notice.
    pub const USER_NOTICE: Self = Self(1 << 10);
    /// Code-style suggestion.
    pub const STRICT: Self = Self(1 << 11);
    /// Catchable fatal error.
    pub const RECOVERABLE_ERROR: Self = Self(1 << 12);
    /// Deprecation notice.
    pub const DEPRECATED: Self = Self(1 << 13);
    /// User-generated deprecation notice.
    pub const USER_DEPRECATED: Self = Self(1 << 14);
    /// Every level.
    pub const ALL: Self = Self((1 << 15) - 1);
    /// No level.
    pub const NONE: Self = Self(0);

    /// Named levels, as exposed to scripts.
    pub const NAMED: [(&'static str, Self); 16] = [
        ("E_ERROR", Self::ERROR),
        ("E_WARNING", Self::WARNING),
        ("E_PARSE", Self::PARSE),
        ("E_NOTICE", Self::NOTICE),
        ("E_CORE_ERROR", Self::CORE_ERROR),
        ("E_CORE_WARNING", Self::CORE_WARNING),
        ("E_COMPILE_ERROR", Self::COMPILE_ERROR),
        ("E_COMPILE_WARNING", Self::COMPILE_WARNING),
        ("E_USER_ERROR", Self::USER_ERROR),
        ("E_USER_WARNING", Self::USER_WARNING),
        ("E_USER_NOTICE", Self::USER_NOTICE),
        ("E_STRICT", Self::STRICT),
        ("E_RECOVERABLE_ERROR", Self::RECOVERABLE_ERROR),
        ("E_DEPRECATED", Self::DEPRECATED),
        ("E_USER_DEPRECATED", Self::USER_DEPRECATED),
        ("E_ALL", Self::ALL),
    ];

    /// Builds a level from raw bits, discarding unknown bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if any bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns true for the error family (fatal severities).
    #[must_use]
    pub const fn is_error(self) -> bool {
        self.contains(Self(
            Self::ERROR.0
                | Self::PARSE.0
                | Self::CORE_ERROR.0
                | Self::COMPILE_ERROR.0
                | Self::USER_ERROR.0
                | Self::RECOVERABLE_ERROR.0,
        ))
    }

    /// Returns the constant name of a single level (`E_WARNING`).
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(_, level)| *level == self)
            .map(|(name, _)| *name)
    }

    /// Returns the human-readable label used when displaying a diagnostic.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self.0 {
            1 | 16 | 64 | 256 => "Fatal error",
            4 => "Parse error",
            2 | 32 | 128 | 512 => "Warning",
            8 | 1024 => "Notice",
            2048 => "Strict Standards",
            4096 => "Recoverable fatal error",
            8192 | 16384 => "Deprecated",
            _ => "Unknown error",
        }
    }
}

impl BitOr for ErrorLevel {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for ErrorLevel {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for ErrorLevel {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0 & Self::ALL.0)
    }
}

impl fmt::Debug for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "ErrorLevel({:#x})", self.0),
        }
    }
}

/// A single diagnostic: severity plus message.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diagnostic {
    /// Severity.
    pub level: ErrorLevel,
    /// Message text.
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic.
    #[must_use]
    pub fn new(level: ErrorLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level.label(), self.message)
    }
}

/// Collects diagnostics raised during one execution.
///
/// Only diagnostics whose level is in the reporting mask are kept. Each
/// kept diagnostic is also emitted as a `tracing` event.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    reporting: ErrorLevel,
    entries: Vec<Diagnostic>,
    /// Index of the first entry not yet handed out by [`Self::drain_new`].
    unread: usize,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Creates a sink reporting every level.
    #[must_use]
    pub fn new() -> Self {
        Self::with_reporting(ErrorLevel::ALL)
    }

    /// Creates a sink with the given reporting mask.
    #[must_use]
    pub fn with_reporting(reporting: ErrorLevel) -> Self {
        Self {
            reporting,
            entries: Vec::new(),
            unread: 0,
        }
    }

    /// Returns the current reporting mask.
    #[must_use]
    pub const fn reporting(&self) -> ErrorLevel {
        self.reporting
    }

    /// Replaces the reporting mask, returning the previous one.
    pub fn set_reporting(&mut self, reporting: ErrorLevel) -> ErrorLevel {
        std::mem::replace(&mut self.reporting, reporting)
    }

    /// Reports a diagnostic.
    pub fn throw(&mut self, level: ErrorLevel, message: impl Into<String>) {
        if !self.reporting.contains(level) {
            return;
        }
        let diagnostic = Diagnostic::new(level, message);
        if level.is_error() {
            tracing::error!(level = ?level, "{}", diagnostic.message);
        } else if level.contains(ErrorLevel::WARNING | ErrorLevel::USER_WARNING) {
            tracing::warn!(level = ?level, "{}", diagnostic.message);
        } else {
            tracing::info!(level = ?level, "{}", diagnostic.message);
        }
        self.entries.push(diagnostic);
    }

    /// Reports a warning.
    pub fn warning(&mut self, message: impl Into<String>) {
        self.throw(ErrorLevel::WARNING, message);
    }

    /// Reports a notice.
    pub fn notice(&mut self, message: impl Into<String>) {
        self.throw(ErrorLevel::NOTICE, message);
    }

    /// Returns every diagnostic reported so far.
    #[must_use]
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Returns the number of diagnostics reported.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if diagnostics were reported since the last drain.
    #[must_use]
    pub fn has_new(&self) -> bool {
        self.unread < self.entries.len()
    }

    /// Returns the diagnostics reported since the previous call.
    pub fn drain_new(&mut self) -> &[Diagnostic] {
        let start = self.unread;
        self.unread = self.entries.len();
        &self.entries[start..]
    }

    /// Removes and returns every diagnostic.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        self.unread = 0;
        std::mem::take(&mut self.entries)
    }
}
