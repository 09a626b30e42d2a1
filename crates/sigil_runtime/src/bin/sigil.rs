//! Sigil CLI entry point.

use std::env;
use std::fs;
use std::path::Path;
use std::process::ExitCode;

use sigil_foundation::{Error, ErrorKind};
use sigil_language::{CompiledFunction, Module, Output};
use sigil_runtime::cli::HELP;
use sigil_runtime::serialize::{from_bytes, is_image, save_image};
use sigil_runtime::{CliOptions, Engine, Input, Repl, RuntimeConfig, init_logging};

/// Exit status for a script stopped by a fatal error.
const FATAL_EXIT: u8 = 255;

fn main() -> ExitCode {
    let options = match CliOptions::parse(env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("\x1b[31mError: {e}\x1b[0m");
            eprintln!("Run 'sigil --help' for usage.");
            return ExitCode::from(2);
        }
    };

    match run(&options) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("\x1b[31mError: {e}\x1b[0m");
            ExitCode::FAILURE
        }
    }
}

fn run(options: &CliOptions) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if options.show_help {
        println!("{HELP}");
        return Ok(ExitCode::SUCCESS);
    }
    if options.show_version {
        println!("sigil {}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }

    init_logging(options.log_level());
    let engine = Engine::new(options.apply(RuntimeConfig::default()));

    let (module, unit) = match &options.input {
        Input::Repl => {
            let mut repl = Repl::new(engine.config().clone())?;
            if options.no_banner {
                repl = repl.without_banner();
            }
            repl.run()?;
            return Ok(ExitCode::SUCCESS);
        }
        Input::Code(code) => match engine.compile(code, Some("Command line code")) {
            Ok(program) => program,
            Err(e) => return Ok(fatal(&engine, &e)),
        },
        Input::File(path) => match load(&engine, path) {
            Ok(program) => program,
            Err(e) if matches!(e.kind, ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => return Ok(fatal(&engine, &e)),
        },
    };

    if let Some(out) = &options.compile_only {
        save_image(out, &module, &unit)?;
        eprintln!("Compiled to {}", out.display());
        return Ok(ExitCode::SUCCESS);
    }
    if options.dump {
        print!("{module}");
        println!("\n{}:", unit.name);
        print!("{}", unit.code);
        return Ok(ExitCode::SUCCESS);
    }

    Ok(execute(&engine, module, &unit))
}

/// Compiles a script, or decodes it if it is a compiled image.
fn load(engine: &Engine, path: &Path) -> Result<(Module, CompiledFunction), Error> {
    let bytes = fs::read(path)?;
    if is_image(&bytes) {
        return from_bytes(&bytes, &engine.config().extensions);
    }
    let source = String::from_utf8_lossy(&bytes);
    engine.compile(&source, Some(&path.display().to_string()))
}

fn execute(engine: &Engine, module: Module, unit: &CompiledFunction) -> ExitCode {
    match engine.run_with_output(module, unit, Output::stdout()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => fatal(engine, &e),
    }
}

/// Reports an error that stopped compilation or execution.
fn fatal(engine: &Engine, error: &Error) -> ExitCode {
    let location = error
        .context
        .as_ref()
        .map(|context| format!(" in {context}"))
        .unwrap_or_default();
    if engine.config().display_errors {
        println!("\nFatal error: {error}{location}");
    } else {
        eprintln!("\x1b[31mError: {error}{location}\x1b[0m");
    }
    ExitCode::from(FATAL_EXIT)
}
