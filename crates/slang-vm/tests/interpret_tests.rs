//! End-to-end interpreter tests: source in, printed output (or
//! runtime error) out.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use slang_vm::{InterpretError, Vm};

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn run(source: &str) -> String {
    let buf = SharedBuf::default();
    let mut vm = Vm::with_output(buf.clone());
    vm.interpret(source).expect("program should run cleanly");
    buf.contents()
}

fn run_err(source: &str) -> InterpretError {
    let buf = SharedBuf::default();
    let mut vm = Vm::with_output(buf.clone());
    vm.interpret(source).expect_err("program should fail")
}

// ---------------------------------------------------------------------
// Expressions and printing
// ---------------------------------------------------------------------

#[test]
fn arithmetic_precedence() {
    assert_eq!(run("println(1 + 2 * 3);"), "7\n");
}

#[test]
fn division_produces_fractions() {
    assert_eq!(run("println(10 / 4);"), "2.5\n");
}

#[test]
fn unary_minus_and_not() {
    assert_eq!(run("println(-(1 + 2));"), "-3\n");
    assert_eq!(run("println(!true);"), "false\n");
    assert_eq!(run("println(!null);"), "true\n");
    assert_eq!(run("println(!0);"), "false\n");
}

#[test]
fn null_prints_as_nil() {
    assert_eq!(run("println(null);"), "nil\n");
}

#[test]
fn booleans_print_bare() {
    assert_eq!(run("println(true);"), "true\n");
    assert_eq!(run("println(false);"), "false\n");
}

#[test]
fn string_concatenation() {
    assert_eq!(run("let a = \"foo\"; let b = \"bar\"; println(a + b);"), "foobar\n");
}

#[test]
fn concatenated_strings_intern_to_existing_objects() {
    assert_eq!(run("println(\"foo\" + \"bar\" == \"foobar\");"), "true\n");
}

#[test]
fn equality_rules() {
    assert_eq!(run("println(1 == 1);"), "true\n");
    assert_eq!(run("println(1 == 2);"), "false\n");
    assert_eq!(run("println(1 == true);"), "false\n");
    assert_eq!(run("println(null == null);"), "true\n");
    assert_eq!(run("println(\"a\" == \"a\");"), "true\n");
    assert_eq!(run("println(\"a\" != \"b\");"), "true\n");
}

#[test]
fn comparisons() {
    assert_eq!(run("println(1 < 2);"), "true\n");
    assert_eq!(run("println(2 <= 2);"), "true\n");
    assert_eq!(run("println(3 > 4);"), "false\n");
    assert_eq!(run("println(4 >= 5);"), "false\n");
}

#[test]
fn and_or_return_operand_values() {
    assert_eq!(run("println(false and 1);"), "false\n");
    assert_eq!(run("println(1 and 2);"), "2\n");
    assert_eq!(run("println(null or \"x\");"), "x\n");
    assert_eq!(run("println(1 or 2);"), "1\n");
}

#[test]
fn ranges_build_and_print() {
    assert_eq!(run("println(0..2);"), "0..2\n");
    assert_eq!(run("println(1.5..4);"), "1.5..4\n");
}

// ---------------------------------------------------------------------
// Statements, globals, scopes
// ---------------------------------------------------------------------

#[test]
fn globals_define_assign_read() {
    assert_eq!(run("let a = 1; a = a + 2; println(a);"), "3\n");
}

#[test]
fn global_without_initializer_is_nil() {
    assert_eq!(run("let a; println(a);"), "nil\n");
}

#[test]
fn locals_shadow_globals() {
    assert_eq!(
        run("let a = \"outer\"; { let a = \"inner\"; println(a); } println(a);"),
        "inner\nouter\n"
    );
}

#[test]
fn assignment_is_an_expression() {
    assert_eq!(run("let a = 1; println(a = 5);"), "5\n");
}

#[test]
fn if_else_branches() {
    assert_eq!(
        run("if 1 == 1 { println(\"t\"); } else { println(\"f\"); }"),
        "t\n"
    );
    assert_eq!(
        run("if 1 == 2 { println(\"t\"); } else { println(\"f\"); }"),
        "f\n"
    );
}

#[test]
fn if_without_else() {
    assert_eq!(run("if false { println(\"no\"); } println(\"after\");"), "after\n");
}

#[test]
fn while_loop_counts() {
    assert_eq!(
        run("let i = 0; while i < 3 { println(i); i = i + 1; }"),
        "0\n1\n2\n"
    );
}

#[test]
fn while_loop_with_local_state() {
    assert_eq!(
        run("{ let total = 0; let i = 1; while i <= 4 { total = total + i; i = i + 1; } println(total); }"),
        "10\n"
    );
}

#[test]
fn nested_blocks_release_locals() {
    assert_eq!(
        run("{ let a = 1; { let b = 2; { let c = 3; println(a + b + c); } } }"),
        "6\n"
    );
}

// ---------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------

#[test]
fn list_read_and_write() {
    assert_eq!(
        run("let xs = [10, 20, 30]; println(xs[1]); xs[1] = 99; println(xs[1]);"),
        "20\n99\n"
    );
}

#[test]
fn lists_print_with_brackets() {
    assert_eq!(run("println([1, \"two\", null, [3]]);"), "[1, two, nil, [3]]\n");
    assert_eq!(run("println([]);"), "[]\n");
}

#[test]
fn list_store_is_an_expression() {
    assert_eq!(run("let xs = [1]; println(xs[0] = 7);"), "7\n");
}

#[test]
fn fractional_indices_truncate() {
    assert_eq!(run("let xs = [10, 20]; println(xs[1.5]);"), "20\n");
}

#[test]
fn lists_hold_mixed_values_and_nest() {
    assert_eq!(
        run("let xs = [[1, 2], [3, 4]]; println(xs[1][0]);"),
        "3\n"
    );
}

// ---------------------------------------------------------------------
// Runtime errors
// ---------------------------------------------------------------------

#[test]
fn negating_a_boolean_is_an_error() {
    assert_eq!(
        run_err("println(-true);"),
        InterpretError::Runtime("Operand must be a number.".to_string())
    );
}

#[test]
fn adding_mixed_types_is_an_error() {
    assert_eq!(
        run_err("println(\"a\" + 1);"),
        InterpretError::Runtime("Operands must be two numbers or two strings.".to_string())
    );
}

#[test]
fn comparing_non_numbers_is_an_error() {
    assert_eq!(
        run_err("println(1 < \"a\");"),
        InterpretError::Runtime("Invalid operands.".to_string())
    );
}

#[test]
fn reading_an_undefined_global_is_an_error() {
    assert_eq!(
        run_err("println(missing);"),
        InterpretError::Runtime("Undefined variable 'missing'.".to_string())
    );
}

#[test]
fn assigning_an_undefined_global_is_an_error_and_defines_nothing() {
    let buf = SharedBuf::default();
    let mut vm = Vm::with_output(buf.clone());
    let err = vm.interpret("ghost = 1;").unwrap_err();
    assert_eq!(
        err,
        InterpretError::Runtime("Undefined variable 'ghost'.".to_string())
    );
    // The failed assignment must not have created the key.
    assert_eq!(vm.global("ghost"), None);
}

#[test]
fn indexing_a_non_list_is_an_error() {
    assert_eq!(
        run_err("println(5[0]);"),
        InterpretError::Runtime("Index operator must be used with a list.".to_string())
    );
}

#[test]
fn non_numeric_index_is_an_error() {
    assert_eq!(
        run_err("let xs = [1]; println(xs[true]);"),
        InterpretError::Runtime("Index must be a number.".to_string())
    );
}

#[test]
fn out_of_bounds_index_is_an_error() {
    assert_eq!(
        run_err("let xs = [1, 2]; println(xs[2]);"),
        InterpretError::Runtime("Index out of bounds.".to_string())
    );
    assert_eq!(
        run_err("let xs = [1, 2]; println(xs[-1]);"),
        InterpretError::Runtime("Index out of bounds.".to_string())
    );
}

#[test]
fn storing_into_a_non_list_is_an_error() {
    assert_eq!(
        run_err("let x = 1; x[0] = 2;"),
        InterpretError::Runtime("Cannot store value in a non-list.".to_string())
    );
}

#[test]
fn storing_out_of_bounds_is_an_error() {
    assert_eq!(
        run_err("let xs = [1]; xs[5] = 2;"),
        InterpretError::Runtime("Invalid list index.".to_string())
    );
}

#[test]
fn range_bounds_must_be_numbers() {
    assert_eq!(
        run_err("let r = true..3;"),
        InterpretError::Runtime("Range boundaries must be numbers.".to_string())
    );
}

// ---------------------------------------------------------------------
// Compile errors through interpret
// ---------------------------------------------------------------------

#[test]
fn compile_errors_do_not_execute() {
    let buf = SharedBuf::default();
    let mut vm = Vm::with_output(buf.clone());
    assert_eq!(vm.interpret("println(1;"), Err(InterpretError::Compile));
    assert_eq!(buf.contents(), "", "nothing may run on a compile error");
}

// ---------------------------------------------------------------------
// VM reuse (REPL behavior)
// ---------------------------------------------------------------------

#[test]
fn globals_persist_across_interpret_calls() {
    let buf = SharedBuf::default();
    let mut vm = Vm::with_output(buf.clone());
    vm.interpret("let total = 40;").unwrap();
    vm.interpret("total = total + 2;").unwrap();
    vm.interpret("println(total);").unwrap();
    assert_eq!(buf.contents(), "42\n");
}

#[test]
fn vm_recovers_after_a_runtime_error() {
    let buf = SharedBuf::default();
    let mut vm = Vm::with_output(buf.clone());
    vm.interpret("println(-true);").unwrap_err();
    vm.interpret("println(\"still alive\");").unwrap();
    assert_eq!(buf.contents(), "still alive\n");
}

#[test]
fn vm_recovers_after_a_compile_error() {
    let buf = SharedBuf::default();
    let mut vm = Vm::with_output(buf.clone());
    vm.interpret("let = ;").unwrap_err();
    vm.interpret("println(1);").unwrap();
    assert_eq!(buf.contents(), "1\n");
}

// ---------------------------------------------------------------------
// Stress
// ---------------------------------------------------------------------

#[test]
fn long_loop_with_string_building() {
    let out = run(
        "let s = \"\"; let i = 0; while i < 50 { s = s + \"x\"; i = i + 1; } println(s == \"\" + s);",
    );
    assert_eq!(out, "true\n");
}

#[test]
fn deeply_nested_blocks() {
    let mut source = String::new();
    for _ in 0..50 {
        source.push('{');
    }
    source.push_str("println(\"deep\");");
    for _ in 0..50 {
        source.push('}');
    }
    assert_eq!(run(&source), "deep\n");
}
