//! Terminal input for the REPL.
//!
//! [`Repl`](crate::Repl) only sees the [`LineEditor`] trait. The terminal
//! uses [`RustylineEditor`]; tests and piped sessions use [`ScriptedEditor`].

use std::borrow::Cow;
use std::collections::VecDeque;

use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::HistoryHinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Completer, Config, Context, Editor, Helper, Hinter, Validator as RLValidator};
use sigil_foundation::{Error, Result};

use crate::highlight::SigilHighlighter;
use crate::repl::brace_depth;

const HISTORY_SIZE: usize = 1000;

/// What one prompt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Read {
    /// A complete entry (possibly several physical lines).
    Line(String),
    /// Ctrl+C: discard the current entry.
    Interrupt,
    /// Ctrl+D or end of the input stream.
    EndOfInput,
}

/// Source of REPL entries.
pub trait LineEditor {
    /// Shows `prompt` and reads one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be read.
    fn read(&mut self, prompt: &str) -> Result<Read>;

    /// Records an entry in the session history.
    fn remember(&mut self, entry: &str);

    /// Replaces the words offered by tab completion.
    fn set_completions(&mut self, words: Vec<String>);
}

// =============================================================================
// rustyline
// =============================================================================

#[derive(Helper, Completer, Hinter, RLValidator)]
struct SigilHelper {
    #[rustyline(Completer)]
    words: WordCompleter,
    #[rustyline(Hinter)]
    hints: HistoryHinter,
    #[rustyline(Validator)]
    braces: OpenBraces,
    colors: SigilHighlighter,
}

impl Highlighter for SigilHelper {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        self.colors.highlight(line, pos)
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        default: bool,
    ) -> Cow<'b, str> {
        if default {
            Cow::Owned(format!("\x1b[1;35m{prompt}\x1b[0m"))
        } else {
            Cow::Borrowed(prompt)
        }
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[2m{hint}\x1b[0m"))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

/// Completes the identifier under the cursor. Variables are left alone.
#[derive(Default)]
struct WordCompleter {
    words: Vec<String>,
}

impl WordCompleter {
    fn candidates(&self, line: &str, pos: usize) -> (usize, Vec<Pair>) {
        let head = &line[..pos];
        let start = head
            .char_indices()
            .rev()
            .take_while(|&(_, c)| c.is_alphanumeric() || c == '_')
            .last()
            .map_or(pos, |(i, _)| i);
        let prefix = head[start..].to_ascii_lowercase();
        if prefix.is_empty() || head[..start].ends_with('$') {
            return (start, Vec::new());
        }
        let matches = self
            .words
            .iter()
            .filter(|word| word.to_ascii_lowercase().starts_with(&prefix))
            .map(|word| Pair {
                display: word.clone(),
                replacement: word.clone(),
            })
            .collect();
        (start, matches)
    }
}

impl Completer for WordCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(self.candidates(line, pos))
    }
}

/// Asks for another line while `{`, `[` or `(` are unbalanced.
struct OpenBraces;

impl Validator for OpenBraces {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        Ok(if brace_depth(ctx.input()) > 0 {
            ValidationResult::Incomplete
        } else {
            ValidationResult::Valid(None)
        })
    }
}

/// Interactive editor with history, hints, completion and highlighting.
pub struct RustylineEditor {
    inner: Editor<SigilHelper, DefaultHistory>,
}

impl RustylineEditor {
    /// Opens the terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be configured.
    pub fn new() -> Result<Self> {
        let config = Config::builder()
            .auto_add_history(false)
            .max_history_size(HISTORY_SIZE)
            .map_err(editor_error)?
            .build();
        let mut inner = Editor::with_config(config).map_err(editor_error)?;
        inner.set_helper(Some(SigilHelper {
            words: WordCompleter::default(),
            hints: HistoryHinter::new(),
            braces: OpenBraces,
            colors: SigilHighlighter::new(),
        }));
        Ok(Self { inner })
    }
}

fn editor_error(err: ReadlineError) -> Error {
    Error::internal(format!("line editor: {err}"))
}

impl LineEditor for RustylineEditor {
    fn read(&mut self, prompt: &str) -> Result<Read> {
        match self.inner.readline(prompt) {
            Ok(line) => Ok(Read::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(Read::Interrupt),
            Err(ReadlineError::Eof) => Ok(Read::EndOfInput),
            Err(err) => Err(editor_error(err)),
        }
    }

    fn remember(&mut self, entry: &str) {
        // A full or rejecting history is not worth failing the session over.
        let _ = self.inner.add_history_entry(entry);
    }

    fn set_completions(&mut self, words: Vec<String>) {
        if let Some(helper) = self.inner.helper_mut() {
            helper.words.words = words;
        }
    }
}

// =============================================================================
// Scripted input
// =============================================================================

/// Replays a fixed list of entries, then reports end of input.
#[derive(Debug, Default)]
pub struct ScriptedEditor {
    pending: VecDeque<String>,
    history: Vec<String>,
    prompts: Vec<String>,
}

impl ScriptedEditor {
    /// Creates an editor that hands out `entries` in order.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pending: entries.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Entries the REPL chose to remember.
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Every prompt shown so far.
    #[must_use]
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

impl LineEditor for ScriptedEditor {
    fn read(&mut self, prompt: &str) -> Result<Read> {
        self.prompts.push(prompt.to_string());
        Ok(self.pending.pop_front().map_or(Read::EndOfInput, Read::Line))
    }

    fn remember(&mut self, entry: &str) {
        self.history.push(entry.to_string());
    }

    fn set_completions(&mut self, _words: Vec<String>) {}
}
