//! Command-line argument parsing for the `sigil` binary.

use std::path::PathBuf;
use std::time::Duration;

use sigil_foundation::ErrorLevel;
use thiserror::Error;

use crate::config::RuntimeConfig;

/// An invalid command line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    /// An option that takes a value was last on the line.
    #[error("{0} requires a value")]
    MissingValue(String),

    /// An option value could not be parsed.
    #[error("invalid {option} value: {value}")]
    InvalidValue {
        /// The option.
        option: String,
        /// What was given.
        value: String,
    },

    /// An option nobody recognises.
    #[error("unknown option: {0}")]
    UnknownOption(String),

    /// More than one script was named.
    #[error("only one script may be given (got {0:?} after {1:?})")]
    ExtraArgument(String, String),

    /// Both `-r` and a script were given.
    #[error("-r cannot be combined with a script file")]
    CodeAndFile,

    /// `--compile-only` without a script or code.
    #[error("--compile-only needs a script or -r code")]
    NothingToCompile,
}

/// Where the program comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A script or compiled image on disk.
    File(PathBuf),
    /// Code given with `-r`.
    Code(String),
    /// Interactive session.
    Repl,
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct CliOptions {
    /// The program to run.
    pub input: Input,
    /// Print the disassembly instead of running.
    pub dump: bool,
    /// Write a compiled image here instead of running.
    pub compile_only: Option<PathBuf>,
    /// Number of `-v` flags.
    pub verbosity: u8,
    /// `--max-time`.
    pub max_time: Option<Duration>,
    /// `--no-errors`: keep diagnostics out of the output.
    pub quiet_errors: bool,
    /// `--error-level`.
    pub error_level: Option<ErrorLevel>,
    /// `--seed`.
    pub seed: Option<u64>,
    /// `--trace-vm`.
    pub trace_vm: bool,
    /// `--no-banner`.
    pub no_banner: bool,
    /// `-h`.
    pub show_help: bool,
    /// `-V`.
    pub show_version: bool,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            input: Input::Repl,
            dump: false,
            compile_only: None,
            verbosity: 0,
            max_time: None,
            quiet_errors: false,
            error_level: None,
            seed: None,
            trace_vm: false,
            no_banner: false,
            show_help: false,
            show_version: false,
        }
    }
}

impl CliOptions {
    /// Parses arguments, not including the program name.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown options, missing or malformed values,
    /// and conflicting inputs.
    pub fn parse<I, S>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut options = Self::default();
        let mut code = None;
        let mut file: Option<String> = None;
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            let mut value = |name: &str| {
                args.next()
                    .ok_or_else(|| CliError::MissingValue(name.to_string()))
            };
            match arg.as_str() {
                "-h" | "--help" => options.show_help = true,
                "-V" | "--version" => options.show_version = true,
                "-d" | "--dump" => options.dump = true,
                "--trace-vm" => options.trace_vm = true,
                "--no-errors" => options.quiet_errors = true,
                "--no-banner" => options.no_banner = true,
                "-r" | "--run" => code = Some(value(&arg)?),
                "-c" | "--compile-only" => {
                    options.compile_only = Some(PathBuf::from(value(&arg)?));
                }
                "--max-time" => {
                    let raw = value(&arg)?;
                    let secs: f64 = parse_value(&arg, &raw)?;
                    if !secs.is_finite() || secs <= 0.0 {
                        return Err(invalid(&arg, &raw));
                    }
                    options.max_time = Some(Duration::from_secs_f64(secs));
                }
                "--seed" => {
                    let raw = value(&arg)?;
                    options.seed = Some(parse_value(&arg, &raw)?);
                }
                "--error-level" => {
                    let raw = value(&arg)?;
                    let bits = parse_value(&arg, &raw)?;
                    options.error_level = Some(ErrorLevel::from_bits(bits));
                }
                flag if flag.starts_with("-v") && flag[1..].chars().all(|c| c == 'v') => {
                    let count = u8::try_from(flag.len() - 1).unwrap_or(u8::MAX);
                    options.verbosity = options.verbosity.saturating_add(count);
                }
                "--verbose" => options.verbosity = options.verbosity.saturating_add(1),
                flag if flag.starts_with('-') && flag != "-" => {
                    return Err(CliError::UnknownOption(flag.to_string()));
                }
                path => {
                    if let Some(first) = &file {
                        return Err(CliError::ExtraArgument(path.to_string(), first.clone()));
                    }
                    file = Some(path.to_string());
                }
            }
        }

        options.input = match (code, file) {
            (Some(_), Some(_)) => return Err(CliError::CodeAndFile),
            (Some(code), None) => Input::Code(code),
            (None, Some(path)) => Input::File(PathBuf::from(path)),
            (None, None) => Input::Repl,
        };
        if options.compile_only.is_some() && options.input == Input::Repl {
            return Err(CliError::NothingToCompile);
        }
        Ok(options)
    }

    /// Applies the options on top of `config`.
    #[must_use]
    pub fn apply(&self, mut config: RuntimeConfig) -> RuntimeConfig {
        if let Some(limit) = self.max_time {
            config = config.with_max_execution_time(limit);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(level) = self.error_level {
            config = config.with_error_reporting(level);
        }
        let display_errors = config.display_errors && !self.quiet_errors;
        let trace_vm = config.trace_vm || self.trace_vm;
        config
            .with_display_errors(display_errors)
            .with_trace_vm(trace_vm)
    }

    /// The default log filter for the chosen verbosity.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}

fn invalid(option: &str, value: &str) -> CliError {
    CliError::InvalidValue {
        option: option.to_string(),
        value: value.to_string(),
    }
}

fn parse_value<T: std::str::FromStr>(option: &str, raw: &str) -> Result<T, CliError> {
    raw.parse().map_err(|_| invalid(option, raw))
}

/// Usage text.
pub const HELP: &str = "\x1b[1mSigil\x1b[0m - bytecode compiler and VM for a PHP-like scripting language

\x1b[1mUSAGE:\x1b[0m
    sigil [OPTIONS] [FILE]

\x1b[1mARGUMENTS:\x1b[0m
    [FILE]    Script or compiled image to run; starts the REPL when omitted

\x1b[1mOPTIONS:\x1b[0m
    -h, --help               Print help information
    -V, --version            Print version information
    -r, --run CODE           Run CODE instead of a file
    -d, --dump               Print the disassembly instead of running
    -c, --compile-only OUT   Write a compiled image to OUT instead of running
    --max-time SECS          Stop scripts that run longer than SECS
    --seed N                 Seed the random number built-ins
    --error-level MASK       Only report diagnostics in MASK (e.g. 0 or 32767)
    --no-errors              Keep diagnostics out of the script output
    --no-banner              Start the REPL without the banner

\x1b[1mDEBUG OPTIONS:\x1b[0m
    -v, -vv                  Log debug or trace output to stderr
    --trace-vm               Log every executed instruction (with -vv)

\x1b[1mEXAMPLES:\x1b[0m
    sigil                          Start interactive REPL
    sigil hello.php                Run hello.php
    sigil -r 'echo 1 + 2;'         Run a one-liner
    sigil -c hello.sgl hello.php   Compile hello.php to an image
    sigil hello.sgl                Run a compiled image
    sigil --dump hello.php         Show the bytecode

Environment variable RUST_LOG overrides the -v log filter.";

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions, CliError> {
        CliOptions::parse(args.iter().copied())
    }

    #[test]
    fn no_arguments_starts_the_repl() {
        assert_eq!(parse(&[]).unwrap(), CliOptions::default());
    }

    #[test]
    fn file_and_flags() {
        let options =
            parse(&["-vv", "--dump", "--seed", "9", "--max-time", "1.5", "a.php"]).unwrap();
        assert_eq!(options.input, Input::File(PathBuf::from("a.php")));
        assert!(options.dump);
        assert_eq!(options.verbosity, 2);
        assert_eq!(options.seed, Some(9));
        assert_eq!(options.max_time, Some(Duration::from_millis(1500)));
        assert_eq!(options.log_level(), "trace");
    }

    #[test]
    fn run_code() {
        let options = parse(&["-r", "echo 1;"]).unwrap();
        assert_eq!(options.input, Input::Code("echo 1;".into()));
    }

    #[test]
    fn errors() {
        assert_eq!(parse(&["--seed"]), Err(CliError::MissingValue("--seed".into())));
        assert_eq!(
            parse(&["--seed", "x"]),
            Err(CliError::InvalidValue {
                option: "--seed".into(),
                value: "x".into()
            })
        );
        assert!(matches!(parse(&["--max-time", "-1"]), Err(CliError::InvalidValue { .. })));
        assert_eq!(parse(&["--bogus"]), Err(CliError::UnknownOption("--bogus".into())));
        assert_eq!(parse(&["-r", "1;", "a.php"]), Err(CliError::CodeAndFile));
        assert!(matches!(parse(&["a.php", "b.php"]), Err(CliError::ExtraArgument(..))));
        assert_eq!(parse(&["-c", "out.sgl"]), Err(CliError::NothingToCompile));
    }

    #[test]
    fn apply_overrides_config() {
        let options =
            parse(&["--no-errors", "--error-level", "0", "--seed", "3", "x.php"]).unwrap();
        let config = options.apply(RuntimeConfig::default());
        assert!(!config.display_errors);
        assert_eq!(config.error_reporting, ErrorLevel::NONE);
        assert_eq!(config.seed, Some(3));
    }
}
