//! Compiler state: token plumbing, code emission, scopes and locals.

use rustc_hash::FxHashMap;
use slang_core::{disassemble_module, FunctionObj, Heap, Module, ObjRef, OpCode, Value};
use slang_lex::{Lexer, Token, TokenKind};
use slang_util::{Diagnostic, Handler, Locus};

use crate::CompileError;

/// Local slot count limit; slots are one-byte operands.
pub(crate) const MAX_LOCALS: usize = 256;

/// A local variable: the token text it was declared with and the
/// scope depth it belongs to. Depth -1 marks a variable that is
/// declared but still compiling its initializer, so reads of it can
/// be rejected.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Local<'src> {
    pub name: &'src str,
    pub depth: i32,
}

/// The single-pass compiler.
///
/// Owns the lexer, the two-token parse window, the module being
/// emitted into and the local-variable scope stack. Constants for
/// string literals and identifiers are interned straight into the
/// VM heap, which is borrowed for the duration of the compile.
pub struct Compiler<'src, 'ctx> {
    lexer: Lexer<'src>,
    pub(crate) current: Token<'src>,
    pub(crate) previous: Token<'src>,
    had_error: bool,
    pub(crate) panic_mode: bool,

    handler: &'ctx Handler,
    pub(crate) heap: &'ctx mut Heap,
    pub(crate) module: Module,

    pub(crate) locals: Vec<Local<'src>>,
    pub(crate) scope_depth: i32,

    /// Lexeme -> constant-pool index for identifier names, so a
    /// global referenced many times costs one pool slot.
    ident_constants: FxHashMap<&'src str, u8>,
}

impl<'src, 'ctx> Compiler<'src, 'ctx> {
    pub(crate) fn new(source: &'src str, heap: &'ctx mut Heap, handler: &'ctx Handler) -> Self {
        let placeholder = Token::new(TokenKind::Eof, "", 1);
        let mut locals = Vec::with_capacity(MAX_LOCALS);
        // Slot zero belongs to the function being executed; no user
        // variable may resolve to it.
        locals.push(Local { name: "", depth: 0 });

        Self {
            lexer: Lexer::new(source),
            current: placeholder,
            previous: placeholder,
            had_error: false,
            panic_mode: false,
            handler,
            heap,
            module: Module::new(),
            locals,
            scope_depth: 0,
            ident_constants: FxHashMap::default(),
        }
    }

    /// Emits the implicit return, wraps the module in a script
    /// function and hands it to the heap.
    pub(crate) fn finish(self) -> Result<ObjRef, CompileError> {
        let mut compiler = self;
        compiler.emit_return();

        if compiler.had_error {
            return Err(CompileError);
        }

        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                "\n{}",
                disassemble_module(&compiler.module, "code", compiler.heap)
            );
        }

        Ok(compiler
            .heap
            .alloc_function(FunctionObj::script(compiler.module)))
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    pub(crate) fn advance(&mut self) {
        self.previous = self.current;

        loop {
            self.current = self.lexer.next_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            // Error tokens carry their diagnostic as the lexeme.
            let message = self.current.lexeme;
            self.error_at_current(message);
        }
    }

    pub(crate) fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    pub(crate) fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    // ------------------------------------------------------------------
    // Error reporting
    // ------------------------------------------------------------------

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;

        let locus = match token.kind {
            TokenKind::Eof => Locus::End,
            // The token itself is the diagnostic; no lexeme to quote.
            TokenKind::Error => Locus::None,
            _ => Locus::Token(token.lexeme.to_string()),
        };
        self.handler
            .report(Diagnostic::error(token.line, locus, message));
    }

    pub(crate) fn error(&mut self, message: &str) {
        self.error_at(self.previous, message);
    }

    pub(crate) fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current, message);
    }

    // ------------------------------------------------------------------
    // Code emission
    // ------------------------------------------------------------------

    pub(crate) fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.module.write(byte, line);
    }

    pub(crate) fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op as u8);
    }

    pub(crate) fn emit_ops(&mut self, first: OpCode, second: OpCode) {
        self.emit_op(first);
        self.emit_op(second);
    }

    pub(crate) fn emit_op_byte(&mut self, op: OpCode, operand: u8) {
        self.emit_op(op);
        self.emit_byte(operand);
    }

    fn emit_return(&mut self) {
        self.emit_op(OpCode::Nil);
        self.emit_op(OpCode::Return);
    }

    pub(crate) fn make_constant(&mut self, value: Value) -> u8 {
        let index = self.module.add_constant(value);
        // One-byte operands and a reserved ceiling of 255 entries.
        if index >= u8::MAX as usize {
            self.error("Too many constants in one module.");
            return 0;
        }
        index as u8
    }

    pub(crate) fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_op_byte(OpCode::Constant, index);
    }

    /// Constant-pool index of an interned identifier name.
    pub(crate) fn identifier_constant(&mut self, name: &'src str) -> u8 {
        if let Some(&index) = self.ident_constants.get(name) {
            return index;
        }
        let string = self.heap.intern(name);
        let index = self.make_constant(Value::Obj(string));
        self.ident_constants.insert(name, index);
        index
    }

    // ------------------------------------------------------------------
    // Jumps
    // ------------------------------------------------------------------

    /// Emits a jump with a two-byte placeholder operand and returns
    /// the operand's offset for later patching.
    pub(crate) fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        self.module.code.len() - 2
    }

    /// Patches a forward jump to land on the next instruction to be
    /// emitted. The operand counts bytes from just past itself.
    pub(crate) fn patch_jump(&mut self, offset: usize) {
        let jump = self.module.code.len() - offset - 2;
        if jump > u16::MAX as usize {
            self.error("Too much code to jump over.");
        }
        self.module.code[offset] = ((jump >> 8) & 0xff) as u8;
        self.module.code[offset + 1] = (jump & 0xff) as u8;
    }

    /// Emits a backward jump to `loop_start`.
    pub(crate) fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(OpCode::Loop);

        // +2 skips the operand itself.
        let offset = self.module.code.len() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.error("Loop body too large.");
        }

        self.emit_byte(((offset >> 8) & 0xff) as u8);
        self.emit_byte((offset & 0xff) as u8);
    }

    // ------------------------------------------------------------------
    // Scopes and locals
    // ------------------------------------------------------------------

    pub(crate) fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    /// Leaves a scope, popping every local that belonged to it in
    /// reverse declaration order.
    pub(crate) fn end_scope(&mut self) {
        self.scope_depth -= 1;

        while self
            .locals
            .last()
            .is_some_and(|local| local.depth > self.scope_depth)
        {
            self.emit_op(OpCode::Pop);
            self.locals.pop();
        }
    }

    pub(crate) fn add_local(&mut self, name: &'src str) {
        if self.locals.len() == MAX_LOCALS {
            self.error("Maximum number of local variables reached.");
            return;
        }
        self.locals.push(Local { name, depth: -1 });
    }

    /// Declares the variable named by the previous token in the
    /// current scope. Globals are late-bound and need no declaration.
    pub(crate) fn declare_variable(&mut self) {
        if self.scope_depth == 0 {
            return;
        }

        let name = self.previous.lexeme;
        let mut redeclared = false;
        for local in self.locals.iter().rev() {
            if local.depth != -1 && local.depth < self.scope_depth {
                break;
            }
            if local.name == name {
                redeclared = true;
                break;
            }
        }
        if redeclared {
            self.error("Variable with this name already declared in this scope.");
        }

        self.add_local(name);
    }

    pub(crate) fn mark_initialized(&mut self) {
        if let Some(local) = self.locals.last_mut() {
            local.depth = self.scope_depth;
        }
    }

    /// Resolves a name against the local scope stack, innermost
    /// first. `None` means the name is (presumed) global.
    pub(crate) fn resolve_local(&mut self, name: &str) -> Option<u8> {
        let found = self
            .locals
            .iter()
            .enumerate()
            .rev()
            .find(|(_, local)| local.name == name)
            .map(|(slot, local)| (slot, local.depth));

        let (slot, depth) = found?;
        if depth == -1 {
            self.error("Cannot read local variable in its own initializer.");
        }
        Some(slot as u8)
    }
}
