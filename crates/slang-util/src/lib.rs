//! slang-util - Shared infrastructure for the protoslang interpreter.
//!
//! Currently this crate hosts the diagnostic types used by the
//! compiler front end. Runtime errors live in `slang-vm`; they have a
//! different reporting shape (stack traces) and their own types.

pub mod diagnostic;

pub use diagnostic::{Diagnostic, Handler, Level, Locus};
