//! slang-lex - Lexical analyzer for protoslang.
//!
//! Transforms source text into a stream of [`Token`]s on demand. The
//! compiler pulls one token at a time; nothing is buffered, and every
//! lexeme is a borrowed slice of the source, so tokens are `Copy` and
//! never outlive the text they came from.
//!
//! Lexical rules:
//!
//! - Whitespace (space, tab, CR) is skipped; LF advances the line
//!   counter. `//` starts a comment running to the end of the line.
//! - Identifiers match `[A-Za-z_][A-Za-z0-9_]*` and are checked
//!   against the keyword set afterwards.
//! - Numbers match `[0-9]+(\.[0-9]+)?`. The lexeme is kept as text;
//!   conversion to a double happens in the compiler.
//! - Strings are double-quoted and may span lines. An unterminated
//!   string produces an error token.
//! - `..` is the range operator; a lone `.` is its own token.
//!
//! Malformed input is reported in-band: the lexer never fails,
//! it yields [`TokenKind::Error`] tokens whose lexeme is the
//! diagnostic text, and the parser turns those into compile errors.

pub mod cursor;
pub mod lexer;
pub mod token;

pub use cursor::Cursor;
pub use lexer::Lexer;
pub use token::{keyword_from_ident, Token, TokenKind};
