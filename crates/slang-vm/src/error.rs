//! Interpreter error types.

use thiserror::Error;

/// Why an interpret cycle failed.
///
/// Compile diagnostics and runtime stack traces have already been
/// written to stderr by the time one of these is returned; the
/// variants exist so the driver can pick the right exit code and so
/// tests can assert on the runtime message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpretError {
    /// One or more compile errors were reported; nothing was run.
    #[error("compile error")]
    Compile,

    /// Execution halted on a runtime error.
    #[error("{0}")]
    Runtime(String),
}
