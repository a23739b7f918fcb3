//! Diagnostic module - compile-error reporting infrastructure.
//!
//! Compile diagnostics are reported in the classic one-line format:
//!
//! ```text
//! [line 4] Error at 'foo': Expected ';' after expression.
//! [line 9] Error at end: Expected expression.
//! ```
//!
//! The parser decides *when* to report (it suppresses cascades while
//! in panic mode); the [`Handler`] decides *how*: it formats each
//! diagnostic, writes it to stderr, and remembers that compilation
//! has failed.

use std::cell::RefCell;
use std::fmt;

/// Diagnostic severity level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    /// An error that prevents execution.
    Error,
    /// A warning that doesn't prevent execution.
    Warning,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "Error"),
            Level::Warning => write!(f, "Warning"),
        }
    }
}

/// Where in the token stream a diagnostic points.
///
/// Error tokens carry their message as their lexeme, so they render
/// with no location suffix at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Locus {
    /// At a concrete token; the lexeme is quoted in the output.
    Token(String),
    /// At end of input.
    End,
    /// No token context (diagnostics triggered by error tokens).
    None,
}

/// A single compile diagnostic: severity, source line, token context,
/// and message.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub level: Level,
    pub line: u32,
    pub locus: Locus,
    pub message: String,
}

impl Diagnostic {
    pub fn new(level: Level, line: u32, locus: Locus, message: impl Into<String>) -> Self {
        Self {
            level,
            line,
            locus,
            message: message.into(),
        }
    }

    /// Shorthand for an error-level diagnostic.
    pub fn error(line: u32, locus: Locus, message: impl Into<String>) -> Self {
        Self::new(Level::Error, line, locus, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] {}", self.line, self.level)?;
        match &self.locus {
            Locus::Token(lexeme) => write!(f, " at '{lexeme}'")?,
            Locus::End => write!(f, " at end")?,
            Locus::None => {}
        }
        write!(f, ": {}", self.message)
    }
}

/// Collects diagnostics for one compilation.
///
/// Reporting is an `&self` operation (the parser holds the handler by
/// shared reference while borrowing tokens mutably elsewhere), hence
/// the interior mutability.
#[derive(Debug, Default)]
pub struct Handler {
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl Handler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Formats the diagnostic to stderr and records it.
    pub fn report(&self, diagnostic: Diagnostic) {
        eprintln!("{diagnostic}");
        self.diagnostics.borrow_mut().push(diagnostic);
    }

    /// True if any error-level diagnostic has been reported.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .borrow()
            .iter()
            .any(|d| d.level == Level::Error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.level == Level::Error)
            .count()
    }

    /// Snapshot of everything reported so far, in order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }
}
