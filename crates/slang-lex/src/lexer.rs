//! Main lexer implementation.
//!
//! [`Lexer::next_token`] skips whitespace and comments, records the
//! token start, then dispatches on the first character. Multi-char
//! operators (`!=`, `==`, `<=`, `>=`, `..`) are resolved with a
//! single character of lookahead.

use crate::cursor::Cursor;
use crate::token::{keyword_from_ident, Token, TokenKind};

/// The protoslang lexer.
///
/// # Example
///
/// ```
/// use slang_lex::{Lexer, TokenKind};
///
/// let mut lexer = Lexer::new("let x = 42;");
/// assert_eq!(lexer.next_token().kind, TokenKind::Let);
/// assert_eq!(lexer.next_token().kind, TokenKind::Identifier);
/// ```
pub struct Lexer<'a> {
    cursor: Cursor<'a>,

    /// Byte offset where the current token started.
    token_start: usize,

    /// Line where the current token started.
    token_line: u32,

    /// Set once Eof has been yielded through the iterator.
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source),
            token_start: 0,
            token_line: 1,
            finished: false,
        }
    }

    /// Returns the next token, or [`TokenKind::Eof`] at end of input.
    pub fn next_token(&mut self) -> Token<'a> {
        self.skip_whitespace_and_comments();

        self.token_start = self.cursor.position();
        self.token_line = self.cursor.line();

        if self.cursor.is_at_end() {
            return Token::new(TokenKind::Eof, "", self.token_line);
        }

        let c = self.cursor.advance();

        if is_ident_start(c) {
            return self.lex_identifier();
        }
        if c.is_ascii_digit() {
            return self.lex_number();
        }

        match c {
            '(' => self.make_token(TokenKind::LParen),
            ')' => self.make_token(TokenKind::RParen),
            '{' => self.make_token(TokenKind::LBrace),
            '}' => self.make_token(TokenKind::RBrace),
            '[' => self.make_token(TokenKind::LBracket),
            ']' => self.make_token(TokenKind::RBracket),
            ';' => self.make_token(TokenKind::Semicolon),
            ',' => self.make_token(TokenKind::Comma),
            '-' => self.make_token(TokenKind::Minus),
            '+' => self.make_token(TokenKind::Plus),
            '/' => self.make_token(TokenKind::Slash),
            '*' => self.make_token(TokenKind::Star),
            '.' => {
                if self.cursor.match_char('.') {
                    self.make_token(TokenKind::Range)
                } else {
                    self.make_token(TokenKind::Dot)
                }
            }
            '!' => {
                if self.cursor.match_char('=') {
                    self.make_token(TokenKind::BangEqual)
                } else {
                    self.make_token(TokenKind::Bang)
                }
            }
            '=' => {
                if self.cursor.match_char('=') {
                    self.make_token(TokenKind::EqualEqual)
                } else {
                    self.make_token(TokenKind::Equal)
                }
            }
            '<' => {
                if self.cursor.match_char('=') {
                    self.make_token(TokenKind::LessEqual)
                } else {
                    self.make_token(TokenKind::Less)
                }
            }
            '>' => {
                if self.cursor.match_char('=') {
                    self.make_token(TokenKind::GreaterEqual)
                } else {
                    self.make_token(TokenKind::Greater)
                }
            }
            '"' => self.lex_string(),
            _ => self.error_token("Unexpected character."),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.cursor.peek() {
                ' ' | '\r' | '\t' | '\n' => {
                    self.cursor.advance();
                }
                '/' => {
                    if self.cursor.peek_next() == '/' {
                        // A comment runs to the end of the line.
                        while self.cursor.peek() != '\n' && !self.cursor.is_at_end() {
                            self.cursor.advance();
                        }
                    } else {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn lex_identifier(&mut self) -> Token<'a> {
        while is_ident_continue(self.cursor.peek()) {
            self.cursor.advance();
        }

        let text = self.cursor.slice_from(self.token_start);
        let kind = keyword_from_ident(text).unwrap_or(TokenKind::Identifier);
        Token::new(kind, text, self.token_line)
    }

    fn lex_number(&mut self) -> Token<'a> {
        while self.cursor.peek().is_ascii_digit() {
            self.cursor.advance();
        }

        // A fractional part needs a digit after the dot, so `1..3`
        // stops here and leaves `..` for the next token.
        if self.cursor.peek() == '.' && self.cursor.peek_next().is_ascii_digit() {
            self.cursor.advance();
            while self.cursor.peek().is_ascii_digit() {
                self.cursor.advance();
            }
        }

        self.make_token(TokenKind::Number)
    }

    fn lex_string(&mut self) -> Token<'a> {
        while self.cursor.peek() != '"' && !self.cursor.is_at_end() {
            self.cursor.advance();
        }

        if self.cursor.is_at_end() {
            return self.error_token("Unterminated string.");
        }

        // Consume the closing quote.
        self.cursor.advance();
        self.make_token(TokenKind::String)
    }

    fn make_token(&self, kind: TokenKind) -> Token<'a> {
        Token::new(kind, self.cursor.slice_from(self.token_start), self.token_line)
    }

    fn error_token(&self, message: &'static str) -> Token<'a> {
        Token::new(TokenKind::Error, message, self.cursor.line())
    }
}

/// Tokens come out until (and including) `Eof`, then the iterator is
/// exhausted.
impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            self.finished = true;
        }
        Some(token)
    }
}

#[inline]
fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

#[inline]
fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token();
            let kind = token.kind;
            out.push(kind);
            if kind == TokenKind::Eof {
                return out;
            }
        }
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_let_statement() {
        assert_eq!(
            kinds("let answer = 42;"),
            vec![
                TokenKind::Let,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("+ - * / ! != == < <= > >= = ."),
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Bang,
                TokenKind::BangEqual,
                TokenKind::EqualEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Equal,
                TokenKind::Dot,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_range_after_integer() {
        // `1..3` must not swallow the first dot into the number.
        let mut lexer = Lexer::new("1..3");
        let a = lexer.next_token();
        assert_eq!((a.kind, a.lexeme), (TokenKind::Number, "1"));
        let op = lexer.next_token();
        assert_eq!((op.kind, op.lexeme), (TokenKind::Range, ".."));
        let b = lexer.next_token();
        assert_eq!((b.kind, b.lexeme), (TokenKind::Number, "3"));
    }

    #[test]
    fn test_fractional_number() {
        let mut lexer = Lexer::new("3.25");
        let token = lexer.next_token();
        assert_eq!((token.kind, token.lexeme), (TokenKind::Number, "3.25"));
    }

    #[test]
    fn test_string_literal_keeps_quotes_in_lexeme() {
        let mut lexer = Lexer::new("\"hello\"");
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::String);
        assert_eq!(token.lexeme, "\"hello\"");
    }

    #[test]
    fn test_multiline_string_counts_lines() {
        let mut lexer = Lexer::new("\"a\nb\" x");
        let s = lexer.next_token();
        assert_eq!(s.kind, TokenKind::String);
        assert_eq!(s.line, 1);
        let x = lexer.next_token();
        assert_eq!(x.kind, TokenKind::Identifier);
        assert_eq!(x.line, 2);
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("\"oops");
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Error);
        assert_eq!(token.lexeme, "Unterminated string.");
    }

    #[test]
    fn test_unexpected_character() {
        let mut lexer = Lexer::new("#");
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Error);
        assert_eq!(token.lexeme, "Unexpected character.");
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn test_comment_runs_to_line_end() {
        assert_eq!(
            kinds("1 // the answer\n2"),
            vec![TokenKind::Number, TokenKind::Number, TokenKind::Eof]
        );
    }

    #[test]
    fn test_comment_at_eof() {
        assert_eq!(kinds("// nothing here"), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_slash_alone_is_divide() {
        assert_eq!(
            kinds("1 / 2"),
            vec![
                TokenKind::Number,
                TokenKind::Slash,
                TokenKind::Number,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_line_numbers() {
        let mut lexer = Lexer::new("a\nb\n\nc");
        assert_eq!(lexer.next_token().line, 1);
        assert_eq!(lexer.next_token().line, 2);
        assert_eq!(lexer.next_token().line, 4);
    }

    #[test]
    fn test_keywords_versus_identifiers() {
        assert_eq!(
            kinds("while whilex null nullish"),
            vec![
                TokenKind::While,
                TokenKind::Identifier,
                TokenKind::Nil,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_brackets_and_subscript() {
        assert_eq!(
            kinds("xs[0] = 1;"),
            vec![
                TokenKind::Identifier,
                TokenKind::LBracket,
                TokenKind::Number,
                TokenKind::RBracket,
                TokenKind::Equal,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_iterator_yields_eof_once() {
        let lexer = Lexer::new("1 + 2");
        let tokens: Vec<_> = lexer.collect();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// The lexer terminates and ends with Eof on any input.
            #[test]
            fn lexing_always_terminates(source in ".{0,200}") {
                let all = kinds(&source);
                prop_assert_eq!(all.last(), Some(&TokenKind::Eof));
                // One token per source char plus Eof is a hard bound.
                prop_assert!(all.len() <= source.chars().count() + 1);
            }

            /// Token lines never decrease.
            #[test]
            fn lines_are_monotonic(source in "[a-z0-9+\\-*/ \n\"(){};=!<>.]{0,200}") {
                let mut lexer = Lexer::new(&source);
                let mut last = 1;
                loop {
                    let token = lexer.next_token();
                    prop_assert!(token.line >= last);
                    last = token.line;
                    if token.kind == TokenKind::Eof {
                        break;
                    }
                }
            }

            /// Identifier-shaped input lexes to a single token.
            #[test]
            fn identifiers_roundtrip(text in "[a-zA-Z_][a-zA-Z0-9_]{0,20}") {
                let mut lexer = Lexer::new(&text);
                let token = lexer.next_token();
                prop_assert_eq!(token.lexeme, text.as_str());
                prop_assert_eq!(lexer.next_token().kind, TokenKind::Eof);
            }
        }
    }
}
