//! slang-compiler - Single-pass bytecode compiler for protoslang.
//!
//! There is no AST. The compiler pulls tokens from the lexer and
//! emits bytecode as it parses: expressions through a Pratt
//! (precedence-climbing) rule table keyed on token kind, statements
//! through plain recursive descent. Lexical scope is resolved during
//! the same pass with a stack of local-variable records; forward
//! jumps are emitted with placeholder operands and back-patched once
//! their target is known.
//!
//! Every statement compiles to code with zero net stack effect, which
//! is what lets the VM run statement after statement against one
//! value stack without drift.
//!
//! Errors are reported through [`slang_util::Handler`] as they are
//! found; the parser then enters panic mode and skips to the next
//! statement boundary so one mistake does not cascade. Compilation
//! always consumes the whole token stream and returns
//! [`CompileError`] at the end if anything was reported.

mod compiler;
mod expr;
mod stmt;

pub use compiler::Compiler;

use slang_core::{Heap, ObjRef};
use slang_util::Handler;
use thiserror::Error;

/// Compilation failed; the details were reported through the
/// [`Handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("compilation failed")]
pub struct CompileError;

/// Compiles `source` into a script function (arity 0, no name) whose
/// module holds the emitted bytecode. String constants are interned
/// into `heap` during compilation.
pub fn compile(source: &str, heap: &mut Heap, handler: &Handler) -> Result<ObjRef, CompileError> {
    let mut compiler = Compiler::new(source, heap, handler);
    compiler.advance();
    while !compiler.match_token(slang_lex::TokenKind::Eof) {
        compiler.declaration();
    }
    compiler.finish()
}
