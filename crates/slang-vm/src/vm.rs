//! The dispatch loop and VM state.

use std::io::{self, Write};

use slang_compiler::compile;
use slang_core::{
    disassemble_instruction, values_equal, Heap, ListObj, Obj, ObjRef, OpCode, Table, Value,
};
use slang_util::Handler;

use crate::error::InterpretError;

/// Maximum depth of the call-frame stack.
pub const FRAMES_MAX: usize = 64;
/// Value-stack capacity reserved up front.
pub const STACK_MAX: usize = FRAMES_MAX * 256;

/// One function activation: the function being executed, the
/// instruction pointer into its module, and the stack slot the callee
/// itself occupies (locals live at `base + slot`).
#[derive(Debug)]
struct CallFrame {
    function: ObjRef,
    ip: usize,
    base: usize,
}

/// The protoslang virtual machine.
pub struct Vm {
    frames: Vec<CallFrame>,
    stack: Vec<Value>,
    globals: Table,
    heap: Heap,
    /// Scratch register used by `GET_REGISTER` / `SET_REGISTER`.
    reg0: Value,
    out: Box<dyn Write>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// A VM printing to stdout.
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }

    /// A VM printing `println` output into `out`. Runtime-error stack
    /// traces always go to stderr.
    pub fn with_output(out: impl Write + 'static) -> Self {
        Self {
            frames: Vec::with_capacity(FRAMES_MAX),
            stack: Vec::with_capacity(STACK_MAX),
            globals: Table::new(),
            heap: Heap::new(),
            reg0: Value::Nil,
            out: Box::new(out),
        }
    }

    /// Compiles and runs one program. Globals, interned strings and
    /// heap objects persist across calls, so a REPL can feed lines to
    /// one VM and accumulate state.
    pub fn interpret(&mut self, source: &str) -> Result<(), InterpretError> {
        let handler = Handler::new();
        let function =
            compile(source, &mut self.heap, &handler).map_err(|_| InterpretError::Compile)?;

        self.stack.push(Value::Obj(function));
        self.call_value(Value::Obj(function), 0)?;
        self.run()
    }

    /// The VM's heap, for rendering values held elsewhere.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Reads a global by name, if it has been defined.
    pub fn global(&self, name: &str) -> Option<Value> {
        let key = self.heap.find_interned(name)?;
        self.globals.get(self.heap.objects(), key)
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    fn run(&mut self) -> Result<(), InterpretError> {
        loop {
            if tracing::enabled!(tracing::Level::TRACE) {
                self.trace_instruction();
            }

            let byte = self.read_byte();
            let Some(op) = OpCode::from_byte(byte) else {
                return Err(self.runtime_error(format!("Unknown opcode {byte}.")));
            };

            match op {
                OpCode::Constant => {
                    let constant = self.read_constant();
                    self.push(constant);
                }
                OpCode::Nil => self.push(Value::Nil),
                OpCode::True => self.push(Value::Bool(true)),
                OpCode::False => self.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop();
                }

                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frame().base;
                    let value = self.stack[base + slot];
                    self.push(value);
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frame().base;
                    self.stack[base + slot] = self.peek(0);
                }

                OpCode::GetGlobal => {
                    let name = self.read_string();
                    match self.globals.get(self.heap.objects(), name) {
                        Some(value) => self.push(value),
                        None => {
                            let message =
                                format!("Undefined variable '{}'.", self.heap.string(name).as_str());
                            return Err(self.runtime_error(message));
                        }
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string();
                    let value = self.peek(0);
                    self.globals.set(self.heap.objects(), name, value);
                    self.pop();
                }
                OpCode::SetGlobal => {
                    let name = self.read_string();
                    let value = self.peek(0);
                    // `set` answers whether the key was new; assigning
                    // an undefined global must not create it.
                    if self.globals.set(self.heap.objects(), name, value) {
                        self.globals.delete(self.heap.objects(), name);
                        let message =
                            format!("Undefined variable '{}'.", self.heap.string(name).as_str());
                        return Err(self.runtime_error(message));
                    }
                }

                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(values_equal(a, b, &self.heap)));
                }
                OpCode::Greater
                | OpCode::Less
                | OpCode::LessEqual
                | OpCode::Subtract
                | OpCode::Multiply
                | OpCode::Divide => self.binary_number_op(op)?,

                OpCode::Add => {
                    let b = self.peek(0);
                    let a = self.peek(1);
                    match (a, b) {
                        (Value::Obj(x), Value::Obj(y))
                            if self.heap.is_string(x) && self.heap.is_string(y) =>
                        {
                            self.concatenate(x, y);
                        }
                        (Value::Number(x), Value::Number(y)) => {
                            self.pop();
                            self.pop();
                            self.push(Value::Number(x + y));
                        }
                        _ => {
                            return Err(self.runtime_error(
                                "Operands must be two numbers or two strings.".to_string(),
                            ))
                        }
                    }
                }

                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(value.is_falsey()));
                }
                OpCode::Negate => {
                    let Some(n) = self.peek(0).as_number() else {
                        return Err(self.runtime_error("Operand must be a number.".to_string()));
                    };
                    self.pop();
                    self.push(Value::Number(-n));
                }

                OpCode::Println => {
                    let value = self.pop();
                    let _ = writeln!(self.out, "{}", value.display(&self.heap));
                }

                OpCode::Jump => {
                    let offset = self.read_u16() as usize;
                    self.frame_mut().ip += offset;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16() as usize;
                    if self.peek(0).is_falsey() {
                        self.frame_mut().ip += offset;
                    }
                }
                OpCode::JumpIfTrue => {
                    let offset = self.read_u16() as usize;
                    if !self.peek(0).is_falsey() {
                        self.frame_mut().ip += offset;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16() as usize;
                    self.frame_mut().ip -= offset;
                }

                OpCode::BuildList => {
                    let count = self.read_byte() as usize;
                    let start = self.stack.len() - count;
                    let mut list = ListObj::new();
                    for &item in &self.stack[start..] {
                        list.append(item);
                    }
                    let reference = self.heap.alloc_list(list);
                    self.stack.truncate(start);
                    self.push(Value::Obj(reference));
                }
                OpCode::IndexList => {
                    let index_value = self.pop();
                    let list_value = self.pop();

                    let Some(Obj::List(list)) =
                        list_value.as_obj().map(|r| self.heap.get(r))
                    else {
                        return Err(self.runtime_error(
                            "Index operator must be used with a list.".to_string(),
                        ));
                    };
                    let Some(index) = index_value.as_number() else {
                        return Err(self.runtime_error("Index must be a number.".to_string()));
                    };
                    if !list.is_valid_index(index) {
                        return Err(self.runtime_error("Index out of bounds.".to_string()));
                    }

                    let value = list.read(index as i64 as usize);
                    self.push(value);
                }
                OpCode::StoreList => {
                    let item = self.pop();
                    let index_value = self.pop();
                    let list_value = self.pop();

                    let Some(list_ref) = list_value
                        .as_obj()
                        .filter(|&r| matches!(self.heap.get(r), Obj::List(_)))
                    else {
                        return Err(self.runtime_error(
                            "Cannot store value in a non-list.".to_string(),
                        ));
                    };
                    let Some(index) = index_value.as_number() else {
                        return Err(
                            self.runtime_error("List index is not a number.".to_string())
                        );
                    };

                    let Obj::List(list) = self.heap.get_mut(list_ref) else {
                        unreachable!("checked above");
                    };
                    if !list.is_valid_index(index) {
                        return Err(self.runtime_error("Invalid list index.".to_string()));
                    }
                    list.store(index as i64 as usize, item);
                    self.push(item);
                }
                OpCode::BuildRange => {
                    let end_value = self.pop();
                    let start_value = self.pop();
                    let (Some(start), Some(end)) =
                        (start_value.as_number(), end_value.as_number())
                    else {
                        return Err(self.runtime_error(
                            "Range boundaries must be numbers.".to_string(),
                        ));
                    };
                    let reference = self.heap.alloc_range(start, end);
                    self.push(Value::Obj(reference));
                }

                OpCode::GetListLength => {
                    let list_value = self.pop();
                    let Some(Obj::List(list)) =
                        list_value.as_obj().map(|r| self.heap.get(r))
                    else {
                        return Err(self.runtime_error(
                            "Cannot get length of a non-list.".to_string(),
                        ));
                    };
                    let length = list.len() as f64;
                    self.push(Value::Number(length));
                }
                OpCode::Increment => {
                    let Some(n) = self.peek(0).as_number() else {
                        return Err(self.runtime_error("Operand must be a number.".to_string()));
                    };
                    self.pop();
                    self.push(Value::Number(n + 1.0));
                }
                OpCode::RangeStart => {
                    let Some(range) = self.peek_range(0) else {
                        return Err(self.runtime_error("Operand must be a range.".to_string()));
                    };
                    self.push(Value::Number(range.start));
                }
                OpCode::RangeEnd => {
                    let Some(range) = self.peek_range(0) else {
                        return Err(self.runtime_error("Operand must be a range.".to_string()));
                    };
                    self.push(Value::Number(range.end));
                }
                OpCode::IncrementRange => {
                    let value = self.pop();
                    let Some(range) = self.peek_range(0) else {
                        return Err(self.runtime_error("Operand must be a range.".to_string()));
                    };
                    let Some(n) = value.as_number() else {
                        return Err(self.runtime_error(
                            "Range increment value must be a number.".to_string(),
                        ));
                    };
                    if n < range.start || n > range.end {
                        return Err(
                            self.runtime_error("Increment value is out of range.".to_string())
                        );
                    }
                    self.push(Value::Number(n + 1.0));
                }

                OpCode::GetRegister => {
                    let value = self.reg0;
                    self.push(value);
                }
                OpCode::SetRegister => {
                    self.reg0 = self.pop();
                }
                OpCode::Duplicate => {
                    let top = self.peek(0);
                    self.push(top);
                }

                OpCode::Call => {
                    let arg_count = self.read_byte() as usize;
                    let callee = self.peek(arg_count);
                    self.call_value(callee, arg_count)?;
                }
                OpCode::Return => {
                    let result = self.pop();
                    let frame = self.frames.pop().expect("return without a frame");
                    if self.frames.is_empty() {
                        // Pop the script function itself.
                        self.pop();
                        return Ok(());
                    }
                    self.stack.truncate(frame.base);
                    self.push(result);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    fn call_value(&mut self, callee: Value, arg_count: usize) -> Result<(), InterpretError> {
        if let Value::Obj(reference) = callee {
            if let Obj::Function(function) = self.heap.get(reference) {
                let arity = function.arity as usize;
                if arg_count != arity {
                    let message = format!("Expected {arity} arguments but got {arg_count}.");
                    return Err(self.runtime_error(message));
                }
                if self.frames.len() == FRAMES_MAX {
                    return Err(self.runtime_error("Stack overflow.".to_string()));
                }

                self.frames.push(CallFrame {
                    function: reference,
                    ip: 0,
                    base: self.stack.len() - arg_count - 1,
                });
                return Ok(());
            }
        }

        Err(self.runtime_error("Can only call functions and classes.".to_string()))
    }

    // ------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------

    /// Replaces the two strings on top of the stack (`a` below `b`)
    /// with `a + b`. The result goes through the intern set, so a
    /// byte-equal string that already exists is reused and the fresh
    /// buffer dropped.
    fn concatenate(&mut self, a: ObjRef, b: ObjRef) {
        let mut text =
            String::with_capacity(self.heap.string(a).len() + self.heap.string(b).len());
        text.push_str(self.heap.string(a).as_str());
        text.push_str(self.heap.string(b).as_str());

        let result = self.heap.intern_owned(text);
        self.pop();
        self.pop();
        self.push(Value::Obj(result));
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    /// Prints the message and a stack trace (deepest frame first) to
    /// stderr, resets the machine, and returns the error value.
    fn runtime_error(&mut self, message: String) -> InterpretError {
        eprintln!("{message}");

        for frame in self.frames.iter().rev() {
            let Obj::Function(function) = self.heap.get(frame.function) else {
                continue;
            };
            // The ip already moved past the faulting instruction.
            let instruction = frame.ip.saturating_sub(1);
            let line = function.module.lines[instruction.min(function.module.lines.len() - 1)];
            match function.name {
                None => eprintln!("[line {line}] in script"),
                Some(name) => eprintln!("[line {line}] in {}()", self.heap.string(name).as_str()),
            }
        }

        self.stack.clear();
        self.frames.clear();
        InterpretError::Runtime(message)
    }

    // ------------------------------------------------------------------
    // Stack and decoding helpers
    // ------------------------------------------------------------------

    #[inline]
    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    #[inline]
    fn pop(&mut self) -> Value {
        self.stack.pop().expect("value stack underflow")
    }

    #[inline]
    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    fn peek_range(&self, distance: usize) -> Option<slang_core::RangeObj> {
        match self.peek(distance) {
            Value::Obj(r) => match self.heap.get(r) {
                Obj::Range(range) => Some(*range),
                _ => None,
            },
            _ => None,
        }
    }

    #[inline]
    fn frame(&self) -> &CallFrame {
        self.frames.last().expect("no active call frame")
    }

    #[inline]
    fn frame_mut(&mut self) -> &mut CallFrame {
        self.frames.last_mut().expect("no active call frame")
    }

    #[inline]
    fn read_byte(&mut self) -> u8 {
        let frame = self.frames.last_mut().expect("no active call frame");
        let Obj::Function(function) = self.heap.get(frame.function) else {
            unreachable!("frames only hold functions");
        };
        let byte = function.module.code[frame.ip];
        frame.ip += 1;
        byte
    }

    #[inline]
    fn read_u16(&mut self) -> u16 {
        let hi = self.read_byte();
        let lo = self.read_byte();
        ((hi as u16) << 8) | lo as u16
    }

    #[inline]
    fn read_constant(&mut self) -> Value {
        let index = self.read_byte() as usize;
        let frame = self.frames.last().expect("no active call frame");
        let Obj::Function(function) = self.heap.get(frame.function) else {
            unreachable!("frames only hold functions");
        };
        function.module.constants[index]
    }

    /// Reads a constant known to be an interned name.
    #[inline]
    fn read_string(&mut self) -> ObjRef {
        match self.read_constant() {
            Value::Obj(reference) => reference,
            other => unreachable!("name constant must be a string, got {other:?}"),
        }
    }

    fn binary_number_op(&mut self, op: OpCode) -> Result<(), InterpretError> {
        let (Some(b), Some(a)) = (self.peek(0).as_number(), self.peek(1).as_number()) else {
            return Err(self.runtime_error("Invalid operands.".to_string()));
        };
        self.pop();
        self.pop();

        let result = match op {
            OpCode::Greater => Value::Bool(a > b),
            OpCode::Less => Value::Bool(a < b),
            OpCode::LessEqual => Value::Bool(a <= b),
            OpCode::Subtract => Value::Number(a - b),
            OpCode::Multiply => Value::Number(a * b),
            OpCode::Divide => Value::Number(a / b),
            _ => unreachable!("not a binary numeric op: {op:?}"),
        };
        self.push(result);
        Ok(())
    }

    /// Renders the value stack and the instruction about to execute.
    fn trace_instruction(&self) {
        use std::fmt::Write as _;

        let mut stack_line = String::from("          ");
        for value in &self.stack {
            let _ = write!(stack_line, "[ {} ]", value.display(&self.heap));
        }

        let Some(frame) = self.frames.last() else {
            return;
        };
        let Obj::Function(function) = self.heap.get(frame.function) else {
            return;
        };
        let (instruction, _) = disassemble_instruction(&function.module, frame.ip, &self.heap);
        tracing::trace!("{stack_line}");
        tracing::trace!("{instruction}");
    }
}
