//! Tests for the VM.

use std::time::Duration;

use super::*;
use crate::extension::{Arity, Extension};

fn eval_test(source: &str) -> Value {
    eval(source).expect("eval failed")
}

fn eval_err(source: &str) -> ErrorKind {
    eval(source).expect_err("eval succeeded").kind
}

/// Runs `source` on a fresh VM and returns the result and the output.
fn run(source: &str) -> (Result<Value>, String) {
    let mut module = Module::new();
    let unit = compile(source, &mut module).expect("compile failed");
    let mut vm = Vm::new(module);
    let result = vm.run(&unit);
    (result, vm.take_output())
}

fn output(source: &str) -> String {
    let (result, out) = run(source);
    result.expect("run failed");
    out
}

fn double(args: &mut Args<'_>) -> Result<Value> {
    Ok(Value::Int(args.int(0)? * 2))
}

fn bump(args: &mut Args<'_>) -> Result<Value> {
    let cell = args.reference(0)?;
    let current = ops::to_int(&cell.get(), args.diagnostics());
    cell.set(Value::Int(current + 1));
    Ok(Value::Null)
}

fn test_extension() -> Extension {
    Extension::new("test", "1.0.0")
        .function("double", Arity::exact(1), double)
        .function_by_ref("bump", Arity::exact(1), &[0], bump)
}

fn run_with_extension(source: &str) -> Result<Value> {
    let mut module = Module::with_extensions([&test_extension()]).expect("install failed");
    let unit = compile(source, &mut module).expect("compile failed");
    Vm::new(module).run(&unit)
}

// =============================================================================
// Expressions
// =============================================================================

#[test]
fn eval_arithmetic() {
    assert_eq!(eval_test("return 1 + 2 * 3;"), Value::Int(7));
    assert_eq!(eval_test("return (1 + 2) * 3;"), Value::Int(9));
    assert_eq!(eval_test("return 7 % 3;"), Value::Int(1));
    assert_eq!(eval_test("return 2 ** 10;"), Value::Int(1024));
    assert_eq!(eval_test("return 7 / 2;"), Value::Float(3.5));
}

#[test]
fn eval_without_return_is_null() {
    assert_eq!(eval_test("$x = 1;"), Value::Null);
}

#[test]
fn eval_division_by_zero() {
    assert!(matches!(eval_err("return 1 / 0;"), ErrorKind::DivisionByZero));
    assert!(matches!(eval_err("return 1 % 0;"), ErrorKind::ModuloByZero));
}

#[test]
fn eval_spaceship() {
    assert_eq!(
        eval_test("return (1 <=> 2) . (2 <=> 2) . (3 <=> 2);"),
        Value::from("-101")
    );
}

#[test]
fn eval_short_circuit_skips_right_side() {
    let source = "function boom() { return 1 / 0; } return false && boom();";
    assert_eq!(eval_test(source), Value::Bool(false));
    let source = "function boom() { return 1 / 0; } return true || boom();";
    assert_eq!(eval_test(source), Value::Bool(true));
}

#[test]
fn eval_coalesce_is_quiet() {
    let (result, out) = run("$a = []; return $a['k'] ?? 'd';");
    assert_eq!(result.unwrap(), Value::from("d"));
    assert_eq!(out, "");
}

#[test]
fn coalesce_operands_are_evaluated_once() {
    let pair = |a: Value, b: i64| Value::Array(Array::from_values([a, Value::Int(b)]));

    let source = "$i = 0; $a = [5, 6, 7]; $x = $a[$i++] ?? 0; return [$x, $i];";
    assert_eq!(eval_test(source), pair(Value::Int(5), 1));

    let source = "$i = 0; $a = []; $a[$i++] ??= 9; return [$a, $i];";
    let filled = Value::Array(Array::from_values([Value::Int(9)]));
    assert_eq!(eval_test(source), pair(filled, 1));

    let source = "$i = 0; $a = [1]; $a[$i++] ??= 9; return [$a, $i];";
    let kept = Value::Array(Array::from_values([Value::Int(1)]));
    assert_eq!(eval_test(source), pair(kept, 1));

    let source = "$i = 0; $x = ++$i ?: 0; return [$x, $i];";
    assert_eq!(eval_test(source), pair(Value::Int(1), 1));
}

#[test]
fn short_ternary_falls_back() {
    assert_eq!(eval_test("return 0 ?: 'd';"), Value::from("d"));
    assert_eq!(eval_test("return 'x' ?: 'd';"), Value::from("x"));
}

#[test]
fn eval_string_offsets() {
    assert_eq!(output("$s = 'abc'; echo $s[0], $s[-1];"), "ac");
}

// =============================================================================
// Output
// =============================================================================

#[test]
fn hello_world() {
    assert_eq!(output("echo 'Hello, World!';"), "Hello, World!");
    assert_eq!(output("echo \"Hello World\";"), "Hello World");
}

#[test]
fn returned_arrays_are_plain_values() {
    let expected = Value::Array(Array::from_values([Value::Int(1), Value::Int(2)]));
    assert_eq!(eval_test("return [1, 2];"), expected);
    assert_eq!(eval_test("function f() { return [1, 2]; } return f();"), expected);
    assert_eq!(eval_test("$a = [1]; $a[] = 2; return $a;"), expected);
}

#[test]
fn inline_html_passes_through() {
    assert_eq!(output("<p><?php echo 1 + 1; ?></p>"), "<p>2</p>");
}

#[test]
fn warnings_are_rendered_into_output() {
    assert_eq!(
        output("$a = []; echo $a['x'];"),
        "\nWarning: Undefined array key \"x\"\n"
    );
}

#[test]
fn warnings_hidden_without_display_errors() {
    let mut module = Module::new();
    let unit = compile("$a = []; echo $a[3], 'ok';", &mut module).unwrap();
    let options = VmOptions {
        display_errors: false,
        ..VmOptions::default()
    };
    let mut vm = Vm::with_options(module, options);
    vm.run(&unit).unwrap();
    assert_eq!(vm.take_output(), "ok");
    assert_eq!(vm.diagnostics().len(), 1);
    assert_eq!(vm.diagnostics().entries()[0].message, "Undefined array key 3");
}

#[test]
fn foreach_over_scalar_warns() {
    let out = output("foreach (5 as $v) { echo $v; }");
    assert!(out.contains("foreach() argument must be of type array|object, int given"));
}

// =============================================================================
// Variables, references and arrays
// =============================================================================

#[test]
fn reference_aliasing() {
    assert_eq!(output("$a = 1; $b = &$a; $b = 2; echo $a;"), "2");
}

#[test]
fn arrays_copy_on_assignment() {
    assert_eq!(
        output("$a = [1, 2]; $b = $a; $b[] = 3; echo $a[1], isset($a[2]) ? 'y' : 'n', $b[2];"),
        "2n3"
    );
}

#[test]
fn nested_writes_autovivify() {
    let source = "$a['x'][] = 1; $a['x'][] = 2; return $a['x'][1];";
    assert_eq!(eval_test(source), Value::Int(2));
}

#[test]
fn array_assigned_into_itself_is_copied() {
    let source = "$a = [1]; $a[] = $a; return isset($a[1][1]);";
    assert_eq!(eval_test(source), Value::Bool(false));
    let source = "$a = [1]; $a[] = $a; return $a;";
    let inner = Value::Array(Array::from_values([Value::Int(1)]));
    assert_eq!(
        eval_test(source),
        Value::Array(Array::from_values([Value::Int(1), inner.clone()]))
    );

    let source = "$a = [1]; $a[0] = $a; return isset($a[0][0][0]);";
    assert_eq!(eval_test(source), Value::Bool(false));
    let source = "$a = [1]; $a[0] = $a; return $a;";
    assert_eq!(eval_test(source), Value::Array(Array::from_values([inner])));

    let source = "$a = ['k' => 1]; $a['k'] = $a; $a['n'] = $a; return $a['n']['k']['k'];";
    assert_eq!(eval_test(source), Value::Int(1));
    let source = "$a = ['k' => 1]; $a['n'] = $a; return isset($a['n']['n']);";
    assert_eq!(eval_test(source), Value::Bool(false));
}

#[test]
fn compound_assignment_on_elements() {
    let source = "$a = [1]; $a[0] += 5; $a[0]++; return $a[0];";
    assert_eq!(eval_test(source), Value::Int(7));
}

#[test]
fn scalar_used_as_array_is_fatal() {
    assert!(matches!(
        eval_err("$a = 1; $a[0] = 2;"),
        ErrorKind::Fatal(ref m) if m == "Cannot use a scalar value as an array"
    ));
}

#[test]
fn unset_removes_elements() {
    let source = "$a = [1, 2, 3]; unset($a[1]); return isset($a[1]);";
    assert_eq!(eval_test(source), Value::Bool(false));
}

// =============================================================================
// Control flow
// =============================================================================

#[test]
fn foreach_by_value_with_keys() {
    let source = "$t = 0; foreach ([1, 2, 3] as $k => $v) { $t += $k * $v; } return $t;";
    assert_eq!(eval_test(source), Value::Int(8));
}

#[test]
fn foreach_by_reference_updates_array() {
    let source = "$a = [1, 2, 3];
        foreach ($a as &$v) { $v *= 2; }
        unset($v);
        return $a[0] + $a[1] + $a[2];";
    assert_eq!(eval_test(source), Value::Int(12));
}

#[test]
fn break_and_continue() {
    let source = "$s = '';
        for ($i = 0; $i < 10; $i++) {
            if ($i == 2) { continue; }
            if ($i == 5) { break; }
            $s .= $i;
        }
        return $s;";
    assert_eq!(eval_test(source), Value::from("0134"));
}

#[test]
fn break_out_of_nested_foreach() {
    let source = "$n = 0;
        foreach ([1, 2] as $x) {
            foreach ([1, 2] as $y) { $n++; break 2; }
        }
        return $n;";
    assert_eq!(eval_test(source), Value::Int(1));
}

// =============================================================================
// Functions
// =============================================================================

#[test]
fn recursive_fibonacci() {
    let source = "function fib($n) { return $n < 2 ? $n : fib($n - 1) + fib($n - 2); }
        return fib(10);";
    assert_eq!(eval_test(source), Value::Int(55));
}

#[test]
fn default_arguments() {
    let source = "function greet($name = 'World') { return \"Hello $name\"; }
        echo greet(), ' ', greet('Sigil');";
    assert_eq!(output(source), "Hello World Hello Sigil");
}

#[test]
fn by_reference_parameters() {
    let source = "function inc(&$n) { $n++; } $x = 1; inc($x); inc($x); return $x;";
    assert_eq!(eval_test(source), Value::Int(3));
}

#[test]
fn variadic_parameters() {
    let source = "function sum(...$xs) { $t = 0; foreach ($xs as $x) { $t += $x; } return $t; }
        return sum(1, 2, 3);";
    assert_eq!(eval_test(source), Value::Int(6));
}

#[test]
fn typed_parameters_and_returns_coerce() {
    assert_eq!(
        eval_test("function f(int $a) { return $a; } return f('5');"),
        Value::Int(5)
    );
    assert_eq!(
        eval_test("function f(): int { return '7'; } return f();"),
        Value::Int(7)
    );
}

#[test]
fn missing_argument_is_an_arity_error() {
    assert!(matches!(
        eval_err("function f($a) {} f();"),
        ErrorKind::ArityMismatch { actual: 0, .. }
    ));
}

#[test]
fn string_callees() {
    assert_eq!(
        eval_test("function two() { return 2; } $f = 'two'; return $f();"),
        Value::Int(2)
    );
    assert!(matches!(
        eval_err("$f = 'nope'; $f();"),
        ErrorKind::UndefinedSymbol(_)
    ));
    assert!(matches!(
        eval_err("$f = 1; $f();"),
        ErrorKind::NotCallable(Type::Int)
    ));
}

#[test]
fn builtins_receive_values_and_references() {
    assert_eq!(
        run_with_extension("$x = 1; bump($x); return double($x);").unwrap(),
        Value::Int(4)
    );
}

#[test]
fn builtin_arity_is_checked() {
    let err = run_with_extension("double();").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ArityMismatch { actual: 0, .. }));
}

#[test]
fn error_context_lists_the_call_stack() {
    let source = "function inner() { return 1 % 0; }
        function outer() { return inner(); }
        outer();";
    let err = eval(source).unwrap_err();
    let context = err.context.expect("missing context");
    assert_eq!(context.stack, vec!["inner", "outer", "{main}"]);
}

// =============================================================================
// VM state and limits
// =============================================================================

#[test]
fn stack_is_empty_after_run() {
    let mut module = Module::new();
    let unit = compile("function f($a) { return $a + 1; } echo f(1);", &mut module).unwrap();
    let mut vm = Vm::new(module);
    vm.run(&unit).unwrap();
    assert_eq!(vm.stack_depth(), 0);
    assert_eq!(vm.take_output(), "2");
}

#[test]
fn globals_persist_between_runs() {
    let mut vm = Vm::new(Module::new());
    let first = compile("$x = 41;", vm.module_mut()).unwrap();
    vm.run(&first).unwrap();
    let second = compile("return $x + 1;", vm.module_mut()).unwrap();
    assert_eq!(vm.run(&second).unwrap(), Value::Int(42));

    vm.clear_globals();
    let third = compile("return $x;", vm.module_mut()).unwrap();
    assert_eq!(vm.run(&third).unwrap(), Value::Null);
}

#[test]
fn globals_survive_a_failed_run() {
    let mut vm = Vm::new(Module::new());
    let unit = compile("$x = 5; $y = 1 / 0;", vm.module_mut()).unwrap();
    assert!(vm.run(&unit).is_err());
    assert_eq!(vm.globals().get("x"), Some(&Value::Int(5)));
    assert_eq!(vm.stack_depth(), 0);
}

#[test]
fn frame_overflow() {
    assert!(matches!(
        eval_err("function r($n) { return r($n + 1); } r(0);"),
        ErrorKind::FrameOverflow { depth: 128 }
    ));
}

#[test]
fn stack_overflow() {
    let mut module = Module::new();
    let unit = compile(
        "$a = 1 + (2 + (3 + (4 + (5 + (6 + (7 + (8 + 9)))))));",
        &mut module,
    )
    .unwrap();
    let options = VmOptions {
        stack_capacity: 8,
        ..VmOptions::default()
    };
    let err = Vm::with_options(module, options).run(&unit).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::StackOverflow { capacity: 8 }));
}

#[test]
fn cancellation_stops_infinite_loops() {
    let mut module = Module::new();
    let unit = compile("while (true) {}", &mut module).unwrap();
    let mut vm = Vm::new(module);
    let token = vm.cancel_token();
    token.cancel();
    let err = vm.run(&unit).unwrap_err();
    assert!(err.is_cancelled());
}

#[test]
fn timeout_cancels() {
    let mut module = Module::new();
    let unit = compile("$i = 0; while (true) { $i++; }", &mut module).unwrap();
    let mut vm = Vm::new(module);
    vm.set_cancel_token(CancelToken::new().with_timeout(Duration::from_millis(20)));
    assert!(vm.run(&unit).unwrap_err().is_cancelled());
}
