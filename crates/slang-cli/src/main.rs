//! protoslang - command-line driver.
//!
//! With no arguments, starts the REPL: one line per interpret cycle
//! against a single persistent VM, so globals accumulate across
//! lines. With a path, reads and interprets the file once.
//!
//! Exit codes: 0 success, 64 usage, 65 compile error, 70 runtime
//! error, 74 file I/O error.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use slang_vm::{InterpretError, Vm};

const EX_USAGE: u8 = 64;
const EX_DATAERR: u8 = 65;
const EX_SOFTWARE: u8 = 70;
const EX_IOERR: u8 = 74;

/// The protoslang interpreter
#[derive(Parser, Debug)]
#[command(name = "protoslang")]
#[command(version)]
#[command(about = "Interpreter for the protoslang scripting language", long_about = None)]
struct Cli {
    /// Script to interpret; starts the REPL when omitted
    path: Option<PathBuf>,
}

fn main() -> ExitCode {
    // Diagnostics from the interpreter internals (bytecode dumps,
    // execution traces) are opt-in via SLANG_LOG, e.g.
    // SLANG_LOG=slang_vm=trace.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_env("SLANG_LOG"))
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            eprintln!("Usage: protoslang [path]");
            return ExitCode::from(EX_USAGE);
        }
        Err(e) => {
            // --help / --version.
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    match cli.path {
        Some(path) => run_file(&path),
        None => repl(),
    }
}

/// Reads and interprets one script file.
fn run_file(path: &Path) -> ExitCode {
    let source = match read_source(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::from(EX_IOERR);
        }
    };

    let mut vm = Vm::new();
    match vm.interpret(&source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(InterpretError::Compile) => ExitCode::from(EX_DATAERR),
        Err(InterpretError::Runtime(_)) => ExitCode::from(EX_SOFTWARE),
    }
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Could not open file \"{}\"", path.display()))
}

/// One line, one interpret cycle. EOF (ctrl-D) exits.
fn repl() -> ExitCode {
    let mut vm = Vm::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("protoslang> ");
        let _ = io::stdout().flush();

        match lines.next() {
            Some(Ok(line)) => {
                // Errors were already reported; the REPL keeps going.
                let _ = vm.interpret(&line);
            }
            Some(Err(e)) => {
                eprintln!("{e}");
                return ExitCode::from(EX_IOERR);
            }
            None => {
                println!();
                return ExitCode::SUCCESS;
            }
        }
    }
}
