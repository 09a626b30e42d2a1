//! Integration tests for the VM
//!
//! Tests evaluation of compiled Sigil programs.

use proptest::prelude::*;
use sigil_foundation::ops::{add, compare, mul, sub};
use sigil_foundation::{Diagnostics, ErrorKind, Value};
use sigil_language::{Module, Vm, compile, eval};

fn output(source: &str) -> String {
    let mut module = Module::new();
    let unit = compile(source, &mut module).unwrap();
    let mut vm = Vm::new(module);
    vm.run(&unit).unwrap();
    assert_eq!(vm.stack_depth(), 0, "stack not empty after: {source}");
    vm.take_output()
}

// =============================================================================
// Programs
// =============================================================================

#[test]
fn hello_world() {
    assert_eq!(output("<?php echo 'Hello, World!';"), "Hello, World!");
    assert_eq!(output("echo \"Hello World\";"), "Hello World");
}

#[test]
fn fibonacci() {
    let source = "function fib($n) { if ($n < 2) { return $n; } return fib($n - 1) + fib($n - 2); }
        return fib(10);";
    assert_eq!(eval(source).unwrap(), Value::Int(55));
}

#[test]
fn default_parameters() {
    let source = "function tag($name, $open = '<', $close = '>') { return $open . $name . $close; }
        echo tag('b'), tag('i', '['), tag('u', '{', '}');";
    assert_eq!(output(source), "<b>[i>{u}");
}

#[test]
fn by_reference_parameters() {
    let source = "function swap(&$a, &$b) { $t = $a; $a = $b; $b = $t; }
        $x = 'left'; $y = 'right'; swap($x, $y); echo $x, ' ', $y;";
    assert_eq!(output(source), "right left");
}

#[test]
fn foreach_by_value_leaves_the_array() {
    let source = "$a = [1, 2, 3]; foreach ($a as $v) { $v *= 10; } echo $a[0], $a[1], $a[2], $v;";
    assert_eq!(output(source), "12330");
}

#[test]
fn foreach_by_reference_writes_through() {
    let source = "$a = ['x' => 1, 'y' => 2];
        foreach ($a as $k => &$v) { $v = $k . $v; }
        unset($v);
        echo $a['x'], $a['y'];";
    assert_eq!(output(source), "x1y2");
}

#[test]
fn references_alias_array_elements() {
    let source = "$a = [1, 2]; $r = &$a[1]; $r = 20; echo $a[1]; $a[1] = 30; echo ' ', $r;";
    assert_eq!(output(source), "20 30");
}

#[test]
fn reference_to_loop_counter_writes_through() {
    let source = "for ($i = 0; $i < 10; $i++) { $x = &$i; } $x = 42; echo $i; $i = 7; echo ' ', $x;";
    assert_eq!(output(source), "42 7");
}

#[test]
fn array_appended_to_itself_is_a_snapshot() {
    let source = "$a = [1]; $a[] = $a; echo $a[0], $a[1][0], isset($a[1][1]) ? 'y' : 'n';";
    assert_eq!(output(source), "11n");
    let source = "$a = [1]; $a[0] = $a; echo $a[0][0], isset($a[0][0][0]) ? 'y' : 'n';";
    assert_eq!(output(source), "1n");
}

#[test]
fn array_literals_keep_order() {
    let source = "$a = [3 => 'c', 'k' => 'v', 'd', '1' => 'e']; foreach ($a as $k => $v) { echo $k, '=', $v, ';'; }";
    assert_eq!(output(source), "3=c;k=v;4=d;1=e;");
}

#[test]
fn stack_is_balanced_after_discarded_expressions() {
    output("1 + 2; $a = [1, 2]; $a[0]; 'x' . 'y'; $a[] = 3; $i = 0; $i++; ++$i;");
    output("for ($i = 0; $i < 3; $i++) { foreach ([1, 2] as $v) { if ($v == 2) { continue 2; } } }");
}

#[test]
fn fatal_errors_stop_execution() {
    let mut module = Module::new();
    let unit = compile("echo 'a'; $x = 1 % 0; echo 'b';", &mut module).unwrap();
    let mut vm = Vm::new(module);
    let err = vm.run(&unit).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ModuloByZero));
    assert_eq!(vm.take_output(), "a");
}

// =============================================================================
// Properties
// =============================================================================

fn fold(op: &str, a: i64, b: i64) -> Value {
    let mut diag = Diagnostics::new();
    let (a, b) = (Value::Int(a), Value::Int(b));
    match op {
        "+" => add(&a, &b, &mut diag).unwrap(),
        "-" => sub(&a, &b, &mut diag).unwrap(),
        "*" => mul(&a, &b, &mut diag).unwrap(),
        _ => Value::Int(compare(&a, &b, &mut diag).unwrap()),
    }
}

proptest! {
    #[test]
    fn vm_arithmetic_matches_the_operators(
        a in any::<i64>(),
        b in any::<i64>(),
        op in prop::sample::select(vec!["+", "-", "*", "<=>"]),
    ) {
        // Literal i64::MIN is parsed as a float negation; skip it.
        prop_assume!(a != i64::MIN && b != i64::MIN);
        let source = format!("$a = {a}; $b = {b}; return $a {op} $b;");
        prop_assert_eq!(eval(&source).unwrap(), fold(op, a, b));
    }

    #[test]
    fn string_round_trip_through_variables(s in "[a-zA-Z0-9 ]{0,24}") {
        let source = format!("$s = '{s}'; $t = $s; return $t . '';");
        prop_assert_eq!(eval(&source).unwrap(), Value::from(s.as_str()));
    }
}
