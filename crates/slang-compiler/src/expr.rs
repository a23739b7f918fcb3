//! Expression parsing: Pratt rules and the precedence climb.
//!
//! Each token kind maps to an optional prefix rule, an optional infix
//! rule, and the precedence its infix form binds at. Precedence
//! levels, lowest to highest:
//!
//! | Level      | Operators            |
//! |------------|----------------------|
//! | Assignment | `=`                  |
//! | Or         | `or`                 |
//! | And        | `and`                |
//! | Equality   | `==` `!=`            |
//! | Comparison | `<` `<=` `>` `>=`    |
//! | Term       | `+` `-`              |
//! | Factor     | `*` `/`              |
//! | Unary      | `!` `-` (prefix)     |
//! | Subscript  | `[` `]`              |
//! | Range      | `..`                 |
//! | Call       | `(` `)`              |

use slang_core::{OpCode, Value};
use slang_lex::TokenKind;

use crate::compiler::Compiler;

/// Operator binding strength, ordered weakest to tightest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Subscript,
    Range,
    Call,
    Primary,
}

impl Precedence {
    /// The next-tighter level; used for left-associative infix
    /// operators, whose right operand must bind strictly tighter.
    fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Subscript,
            Precedence::Subscript => Precedence::Range,
            Precedence::Range => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

/// A parse function; `can_assign` is true when the expression sits in
/// a position where `=` would be a valid continuation.
type ParseFn<'src, 'ctx> = fn(&mut Compiler<'src, 'ctx>, bool);

pub(crate) struct ParseRule<'src, 'ctx> {
    prefix: Option<ParseFn<'src, 'ctx>>,
    infix: Option<ParseFn<'src, 'ctx>>,
    precedence: Precedence,
}

impl<'src, 'ctx> ParseRule<'src, 'ctx> {
    const fn new(
        prefix: Option<ParseFn<'src, 'ctx>>,
        infix: Option<ParseFn<'src, 'ctx>>,
        precedence: Precedence,
    ) -> Self {
        Self {
            prefix,
            infix,
            precedence,
        }
    }
}

impl<'src, 'ctx> Compiler<'src, 'ctx> {
    /// The dispatch table. Tokens not listed parse as nothing at all,
    /// which makes them expression terminators.
    fn rule(kind: TokenKind) -> ParseRule<'src, 'ctx> {
        use Precedence as P;
        use TokenKind as T;

        match kind {
            T::LParen => ParseRule::new(Some(Self::grouping), None, P::None),
            T::LBracket => ParseRule::new(Some(Self::list), Some(Self::subscript), P::Subscript),
            T::Minus => ParseRule::new(Some(Self::unary), Some(Self::binary), P::Term),
            T::Plus => ParseRule::new(None, Some(Self::binary), P::Term),
            T::Slash => ParseRule::new(None, Some(Self::binary), P::Factor),
            T::Star => ParseRule::new(None, Some(Self::binary), P::Factor),
            T::Bang => ParseRule::new(Some(Self::unary), None, P::None),
            T::BangEqual => ParseRule::new(None, Some(Self::binary), P::Equality),
            T::EqualEqual => ParseRule::new(None, Some(Self::binary), P::Equality),
            T::Greater => ParseRule::new(None, Some(Self::binary), P::Comparison),
            T::GreaterEqual => ParseRule::new(None, Some(Self::binary), P::Comparison),
            T::Less => ParseRule::new(None, Some(Self::binary), P::Comparison),
            T::LessEqual => ParseRule::new(None, Some(Self::binary), P::Comparison),
            T::Range => ParseRule::new(None, Some(Self::binary), P::Range),
            T::Identifier => ParseRule::new(Some(Self::variable), None, P::None),
            T::String => ParseRule::new(Some(Self::string), None, P::None),
            T::Number => ParseRule::new(Some(Self::number), None, P::None),
            T::And => ParseRule::new(None, Some(Self::and_), P::And),
            T::Or => ParseRule::new(None, Some(Self::or_), P::Or),
            T::True => ParseRule::new(Some(Self::literal), None, P::None),
            T::False => ParseRule::new(Some(Self::literal), None, P::None),
            T::Nil => ParseRule::new(Some(Self::literal), None, P::None),
            _ => ParseRule::new(None, None, P::None),
        }
    }

    pub(crate) fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    /// The Pratt core: parse a prefix expression, then fold in every
    /// infix operator that binds at least as tightly as `precedence`.
    pub(crate) fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();

        let Some(prefix) = Self::rule(self.previous.kind).prefix else {
            self.error("Expected expression.");
            return;
        };

        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign);

        while precedence <= Self::rule(self.current.kind).precedence {
            self.advance();
            if let Some(infix) = Self::rule(self.previous.kind).infix {
                infix(self, can_assign);
            }
        }

        // A leftover `=` here means the left-hand side was not
        // something assignable.
        if can_assign && self.match_token(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    // ------------------------------------------------------------------
    // Prefix rules
    // ------------------------------------------------------------------

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RParen, "Expected ')' after expression.");
    }

    fn number(&mut self, _can_assign: bool) {
        let value: f64 = self
            .previous
            .lexeme
            .parse()
            .expect("numeric lexemes always parse");
        self.emit_constant(Value::Number(value));
    }

    fn string(&mut self, _can_assign: bool) {
        // Strip the surrounding quotes from the lexeme.
        let lexeme = self.previous.lexeme;
        let text = &lexeme[1..lexeme.len() - 1];
        let string = self.heap.intern(text);
        self.emit_constant(Value::Obj(string));
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::True => self.emit_op(OpCode::True),
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            _ => unreachable!("literal rule on non-literal token"),
        }
    }

    fn unary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;

        self.parse_precedence(Precedence::Unary);

        match operator {
            TokenKind::Bang => self.emit_op(OpCode::Not),
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            _ => unreachable!("unary rule on non-unary token"),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        self.named_variable(can_assign);
    }

    fn named_variable(&mut self, can_assign: bool) {
        let name = self.previous.lexeme;

        let (get_op, set_op, arg) = match self.resolve_local(name) {
            Some(slot) => (OpCode::GetLocal, OpCode::SetLocal, slot),
            None => {
                let index = self.identifier_constant(name);
                (OpCode::GetGlobal, OpCode::SetGlobal, index)
            }
        };

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_op_byte(set_op, arg);
        } else {
            self.emit_op_byte(get_op, arg);
        }
    }

    /// `[a, b, c]` — elements parse just above assignment so a bare
    /// `=` cannot appear inside a literal. A trailing comma is
    /// allowed.
    fn list(&mut self, _can_assign: bool) {
        let mut item_count: usize = 0;

        if !self.check(TokenKind::RBracket) {
            loop {
                if self.check(TokenKind::RBracket) {
                    break;
                }

                self.parse_precedence(Precedence::Or);

                item_count += 1;
                if item_count > 255 {
                    self.error("Cannot have more than 255 items in a list.");
                }

                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenKind::RBracket, "Expected ']' after list.");

        self.emit_op(OpCode::BuildList);
        self.emit_byte(item_count as u8);
    }

    // ------------------------------------------------------------------
    // Infix rules
    // ------------------------------------------------------------------

    fn binary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;
        let rule = Self::rule(operator);
        self.parse_precedence(rule.precedence.next());

        match operator {
            TokenKind::BangEqual => self.emit_ops(OpCode::Equal, OpCode::Not),
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal),
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::GreaterEqual => self.emit_ops(OpCode::Less, OpCode::Not),
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::LessEqual => self.emit_ops(OpCode::Greater, OpCode::Not),
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            TokenKind::Range => self.emit_op(OpCode::BuildRange),
            _ => unreachable!("binary rule on non-binary token"),
        }
    }

    /// `xs[i]` reads; `xs[i] = v` stores and leaves `v` on the stack.
    fn subscript(&mut self, can_assign: bool) {
        self.parse_precedence(Precedence::Or);
        self.consume(TokenKind::RBracket, "Expected ']' after subscript.");

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_op(OpCode::StoreList);
        } else {
            self.emit_op(OpCode::IndexList);
        }
    }

    /// Short-circuit `and`: if the left side is falsey, skip the
    /// right side and leave the left value as the result.
    fn and_(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);

        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::And);

        self.patch_jump(end_jump);
    }

    /// Short-circuit `or`: if the left side is truthy it is the
    /// result; otherwise evaluate the right side.
    fn or_(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end_jump = self.emit_jump(OpCode::Jump);

        self.patch_jump(else_jump);
        self.emit_op(OpCode::Pop);

        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }
}
