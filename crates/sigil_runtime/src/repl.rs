//! The interactive read-eval-print loop.
//!
//! One [`Vm`] lives for the whole session, so functions, constants and
//! top-level variables defined by one entry are visible to the next.

use std::io::{self, Write};

use sigil_foundation::dump::var_dump;
use sigil_foundation::{Error, Result, Value};
use sigil_language::{CompiledFunction, Vm, compile_with, parse_expression};
use tracing::debug;

use crate::config::RuntimeConfig;
use crate::editor::{LineEditor, Read, RustylineEditor};
use crate::engine::Engine;

const KEYWORDS: &[&str] = &[
    "echo", "print", "if", "else", "elseif", "while", "do", "for", "foreach", "as", "function",
    "return", "unset", "isset", "empty", "const", "array", "break", "continue", "true", "false",
    "null",
];

/// What a REPL entry asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Help,
    Quit,
    Dump,
    Globals,
    Reset,
    Unknown(String),
}

impl Command {
    fn parse(input: &str) -> Option<Self> {
        let name = input.strip_prefix(':')?.trim();
        Some(match name {
            "help" | "h" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            "dump" => Self::Dump,
            "globals" => Self::Globals,
            "reset" => Self::Reset,
            other => Self::Unknown(other.to_string()),
        })
    }
}

/// The interactive REPL.
pub struct Repl<E: LineEditor = RustylineEditor> {
    /// The line editor for input.
    editor: E,

    engine: Engine,

    /// The VM shared by every entry.
    vm: Vm,

    /// The most recently compiled entry, for `:dump`.
    last: Option<CompiledFunction>,

    show_banner: bool,
    prompt: String,
    continuation_prompt: String,
}

impl Repl<RustylineEditor> {
    /// Creates a new REPL with the default rustyline editor.
    ///
    /// # Errors
    ///
    /// Returns an error if the editor fails to initialize or the configured
    /// extensions conflict.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let editor = RustylineEditor::new()?;
        Self::with_editor(editor, config)
    }
}

impl<E: LineEditor> Repl<E> {
    /// Creates a new REPL with the given editor.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured extensions conflict.
    pub fn with_editor(mut editor: E, config: RuntimeConfig) -> Result<Self> {
        let engine = Engine::new(config);
        let vm = engine.vm(engine.module()?);
        editor.set_completions(completion_words(&vm));
        Ok(Self {
            editor,
            engine,
            vm,
            last: None,
            show_banner: true,
            prompt: "sigil> ".to_string(),
            continuation_prompt: "  ...> ".to_string(),
        })
    }

    /// Disables the welcome banner.
    #[must_use]
    pub fn without_banner(mut self) -> Self {
        self.show_banner = false;
        self
    }

    /// Sets the primary prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Returns the session VM.
    #[must_use]
    pub const fn vm(&self) -> &Vm {
        &self.vm
    }

    /// Returns the line editor.
    #[must_use]
    pub const fn editor(&self) -> &E {
        &self.editor
    }

    /// Runs the REPL loop until EOF or `:quit`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading input fails.
    pub fn run(&mut self) -> Result<()> {
        if self.show_banner {
            print_banner();
        }

        while self.read_eval_print()? {}

        println!("\nGoodbye!");
        Ok(())
    }

    /// Executes one read-eval-print iteration.
    ///
    /// Returns `Ok(true)` to continue, `Ok(false)` to exit.
    fn read_eval_print(&mut self) -> Result<bool> {
        let Some(input) = self.read_input()? else {
            return Ok(false);
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(true);
        }
        self.editor.remember(&input);

        if let Some(command) = Command::parse(trimmed) {
            return Ok(self.command(&command));
        }

        let result = self.eval(trimmed);
        let output = self.vm.take_output();
        print!("{output}");
        if !output.is_empty() && !output.ends_with('\n') {
            println!();
        }
        match result {
            Ok(value) if !value.is_null() => print!("{}", var_dump(&value)),
            Ok(_) => {}
            Err(e) => print_error(&e),
        }
        let _ = io::stdout().flush();

        Ok(true)
    }

    /// Runs a REPL command. Returns false to exit.
    fn command(&mut self, command: &Command) -> bool {
        match command {
            Command::Help => print_help(),
            Command::Quit => return false,
            Command::Dump => match &self.last {
                Some(unit) => print!("{}", unit.code),
                None => println!("Nothing compiled yet."),
            },
            Command::Globals => {
                let mut names: Vec<_> = self.vm.globals().iter().collect();
                names.sort_by(|a, b| a.0.cmp(b.0));
                for (name, value) in names {
                    print!("${name} = {}", var_dump(value));
                }
            }
            Command::Reset => {
                self.vm.clear_globals();
                println!("Variables cleared.");
            }
            Command::Unknown(name) => {
                eprintln!("\x1b[31mUnknown command :{name}\x1b[0m (try :help)");
            }
        }
        true
    }

    /// Reads a potentially multi-line input.
    fn read_input(&mut self) -> Result<Option<String>> {
        let mut input = String::new();
        let mut first_line = true;

        loop {
            let prompt = if first_line {
                &self.prompt
            } else {
                &self.continuation_prompt
            };

            match self.editor.read(prompt)? {
                Read::Line(line) => {
                    if !first_line {
                        input.push('\n');
                    }
                    input.push_str(&line);

                    if is_complete(&input) {
                        return Ok(Some(input));
                    }
                    first_line = false;
                }
                Read::Interrupt => {
                    if !first_line {
                        println!("\nInput cancelled.");
                    }
                    return Ok(Some(String::new()));
                }
                Read::EndOfInput => {
                    if first_line {
                        return Ok(None);
                    }
                    return Err(Error::internal("unexpected EOF in multi-line input"));
                }
            }
        }
    }

    /// Compiles and runs one entry against the session VM.
    ///
    /// A lone expression evaluates to its value; statements evaluate to
    /// `null` unless they `return`. Script output accumulates until
    /// [`Self::take_output`].
    ///
    /// # Errors
    ///
    /// Returns a compile error or the fatal error that stopped the entry.
    pub fn eval(&mut self, input: &str) -> Result<Value> {
        let source = entry_source(input);
        let options = self.engine.config().compiler_options(Some("repl"));
        let unit = compile_with(&source, self.vm.module_mut(), &options)?;
        debug!(instructions = unit.code.len(), "entry compiled");

        self.engine.arm(&mut self.vm);
        self.last = Some(unit.clone());
        let value = self.vm.run(&unit);

        let words = completion_words(&self.vm);
        self.editor.set_completions(words);
        value
    }

    /// Returns and clears what entries printed so far.
    pub fn take_output(&mut self) -> String {
        self.vm.take_output()
    }
}

/// Turns a bare expression into a `return` so its value is shown.
fn entry_source(input: &str) -> String {
    let trimmed = input.trim();
    if !trimmed.starts_with('<') && parse_expression(trimmed).is_ok() {
        let expr = trimmed.trim_end_matches(';');
        return format!("return {expr};");
    }
    if trimmed.ends_with(';') || trimmed.ends_with('}') || trimmed.ends_with('>') {
        trimmed.to_string()
    } else {
        format!("{trimmed};")
    }
}

/// Keywords, function names and constant names known to the VM.
fn completion_words(vm: &Vm) -> Vec<String> {
    let module = vm.module();
    let mut words: Vec<String> = KEYWORDS.iter().map(|k| (*k).to_string()).collect();
    words.extend(module.functions().iter().map(|f| f.name().to_string()));
    words.extend(module.named_constants().map(|(name, _)| name.to_string()));
    words.sort();
    words.dedup();
    words
}

/// Returns the bracket nesting depth of `input`, skipping strings and
/// comments. An unterminated string or block comment counts as one open
/// level.
pub(crate) fn brace_depth(input: &str) -> i64 {
    let mut depth = 0i64;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                let mut closed = false;
                while let Some(next) = chars.next() {
                    if next == '\\' {
                        chars.next();
                    } else if next == c {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return depth + 1;
                }
            }
            '#' => {
                chars.by_ref().take_while(|&n| n != '\n').for_each(drop);
            }
            '/' if chars.peek() == Some(&'/') => {
                chars.by_ref().take_while(|&n| n != '\n').for_each(drop);
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                let mut closed = false;
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        closed = true;
                        break;
                    }
                    prev = next;
                }
                if !closed {
                    return depth + 1;
                }
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }

    depth
}

/// Checks if input is syntactically complete (balanced brackets).
fn is_complete(input: &str) -> bool {
    brace_depth(input) <= 0
}

fn print_error(error: &Error) {
    eprintln!("\x1b[31mError: {error}\x1b[0m");
}

fn print_banner() {
    println!("\x1b[1;35mSigil\x1b[0m {}", env!("CARGO_PKG_VERSION"));
    println!("Type statements or expressions. :help lists commands, Ctrl+D exits.\n");
}

fn print_help() {
    println!(
        "\x1b[1mREPL COMMANDS:\x1b[0m
    :help        Show this message
    :dump        Disassemble the last entry
    :globals     List top-level variables
    :reset       Forget top-level variables
    :quit        Exit (also Ctrl+D)"
    );
}
