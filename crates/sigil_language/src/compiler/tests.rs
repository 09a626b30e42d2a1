use super::*;

use Opcode::*;

fn compile_ok(source: &str) -> (CompiledFunction, Module) {
    let mut module = Module::new();
    let unit = compile(source, &mut module).expect("compile failed");
    (unit, module)
}

fn ops(source: &str) -> Vec<(Opcode, u32)> {
    compile_ok(source).0.code.iter().collect()
}

fn compile_err(source: &str) -> ErrorKind {
    let mut module = Module::new();
    compile(source, &mut module).expect_err("compile succeeded").kind
}

#[test]
fn assignment_sequence_and_pool() {
    let (unit, module) = compile_ok("$x = 1");
    assert_eq!(
        unit.code.iter().collect::<Vec<_>>(),
        vec![(Const, 3), (Assign, 0), (Pop, 0), (Return, 0)]
    );
    assert_eq!(
        module.constants(),
        &[Value::Bool(true), Value::Bool(false), Value::Null, Value::Int(1)]
    );
    assert_eq!(unit.name, MAIN);
    assert_eq!(unit.variables, vec!["x".to_string()]);
}

#[test]
fn disassembly() {
    let (unit, _) = compile_ok("$x = 1;");
    assert_eq!(
        unit.code.to_string(),
        "00000: CONST         3\n00001: ASSIGN        0\n00002: POP\n00003: RETURN\n"
    );
}

#[test]
fn while_loop_jumps() {
    assert_eq!(
        ops("while ($i < 3) { $i++; }"),
        vec![
            (Load, 0),
            (Const, 3),
            (Less, 0),
            (JumpFalse, 7),
            (PostIncrement, 0),
            (Pop, 0),
            (Jump, 0),
            (Return, 0),
        ]
    );
}

#[test]
fn if_else_jumps() {
    assert_eq!(
        ops("if ($a) { echo 1; } else { echo 2; }"),
        vec![
            (Load, 0),
            (JumpFalse, 5),
            (Const, 3),
            (Echo, 1),
            (Jump, 7),
            (Const, 4),
            (Echo, 1),
            (Return, 0),
        ]
    );
}

#[test]
fn short_circuit_and() {
    let bool_code = Type::Bool.code();
    assert_eq!(
        ops("$r = $a && $b;"),
        vec![
            (Load, 0),
            (JumpFalse, 5),
            (Load, 1),
            (Cast, bool_code),
            (Jump, 6),
            (Const, FALSE_INDEX),
            (Assign, 2),
            (Pop, 0),
            (Return, 0),
        ]
    );
}

#[test]
fn coalesce_keeps_the_tested_value() {
    assert_eq!(
        ops("$r = $a ?? 1;"),
        vec![
            (Load, 0),
            (Dup, 0),
            (IsSet, 1),
            (JumpTrue, 6),
            (Pop, 0),
            (Const, 3),
            (Assign, 1),
            (Pop, 0),
            (Return, 0),
        ]
    );
}

#[test]
fn short_ternary_keeps_the_condition() {
    assert_eq!(
        ops("$r = $a ?: 1;"),
        vec![
            (Load, 0),
            (Dup, 0),
            (JumpTrue, 5),
            (Pop, 0),
            (Const, 3),
            (Assign, 1),
            (Pop, 0),
            (Return, 0),
        ]
    );
}

#[test]
fn coalesce_assign_on_element_fetches_once() {
    assert_eq!(
        ops("$a['k'] ??= 1;"),
        vec![
            (LoadRef, 0),
            (Const, 3),
            (ArrayAccessPeek, 0),
            (Dup, 0),
            (IsSet, 1),
            (JumpFalse, 8),
            (PopBelow, 2),
            (Jump, 12),
            (Pop, 0),
            (ArrayAccessWrite, 0),
            (Const, 4),
            (AssignRef, 0),
            (Pop, 0),
            (Return, 0),
        ]
    );
}

#[test]
fn coalesce_assign_rejects_empty_index() {
    assert!(matches!(
        compile_err("$a[] ??= 1;"),
        ErrorKind::Fatal(ref m) if m == "Cannot use [] for reading"
    ));
}

#[test]
fn array_literal_uses_write_protocol() {
    assert_eq!(
        ops("$a = [1, 'k' => 2];"),
        vec![
            (ArrayNew, 0),
            (ArrayAccessPush, 0),
            (Const, 3),
            (AssignRef, 0),
            (Pop, 0),
            (Const, 4),
            (ArrayAccessWrite, 0),
            (Const, 5),
            (AssignRef, 0),
            (Pop, 0),
            (Assign, 0),
            (Pop, 0),
            (Return, 0),
        ]
    );
}

#[test]
fn nested_dimension_write() {
    assert_eq!(
        ops("$a['x'][] = 1;"),
        vec![
            (LoadRef, 0),
            (Const, 3),
            (ArrayAccessWrite, 0),
            (ArrayAccessPush, 0),
            (Const, 4),
            (AssignRef, 0),
            (Pop, 0),
            (Return, 0),
        ]
    );
}

#[test]
fn foreach_layout() {
    assert_eq!(
        ops("foreach ($a as $k => $v) { echo $v; }"),
        vec![
            (Load, 0),
            (ForEachInit, 0),
            (ForEachValid, 0),
            (JumpFalse, 10),
            (ForEachValue, 1),
            (ForEachKey, 2),
            (Load, 1),
            (Echo, 1),
            (ForEachNext, 0),
            (Jump, 2),
            (Pop, 0),
            (Return, 0),
        ]
    );
}

#[test]
fn foreach_by_reference_promotes_subject() {
    let code = ops("foreach ($a as &$v) {}");
    assert_eq!(code[0], (LoadRef, 0));
    assert_eq!(code[4], (ForEachValueRef, 1));
}

#[test]
fn break_out_of_nested_foreach_pops_inner_iterator() {
    assert_eq!(
        ops("foreach ($a as $x) { foreach ($a as $y) { break 2; } }"),
        vec![
            (Load, 0),
            (ForEachInit, 0),
            (ForEachValid, 0),
            (JumpFalse, 17),
            (ForEachValue, 1),
            (Load, 0),
            (ForEachInit, 0),
            (ForEachValid, 0),
            (JumpFalse, 14),
            (ForEachValue, 2),
            (Pop, 0),
            (Jump, 17),
            (ForEachNext, 0),
            (Jump, 7),
            (Pop, 0),
            (ForEachNext, 0),
            (Jump, 2),
            (Pop, 0),
            (Return, 0),
        ]
    );
}

#[test]
fn continue_targets_for_step() {
    let code = ops("for ($i = 0; $i < 3; $i++) { continue; }");
    // init: CONST ASSIGN POP, cond: LOAD CONST LT JUMP_FALSE, body: JUMP
    assert_eq!(code[7], (Jump, 8));
    assert_eq!(code[8], (PostIncrement, 0));
}

#[test]
fn break_deeper_than_loops_is_an_error() {
    assert!(matches!(compile_err("while (1) { break 2; }"), ErrorKind::Fatal(ref m) if m == "Cannot 'break' 2 levels"));
    assert!(matches!(compile_err("continue;"), ErrorKind::Fatal(_)));
}

#[test]
fn functions_are_registered() {
    let (unit, module) = compile_ok("function add($a, $b = 2) { return $a + $b; }");
    assert_eq!(unit.code.iter().collect::<Vec<_>>(), vec![(Return, 0)]);
    let Some(Function::Compiled(add)) = module.function_by_name("ADD") else {
        panic!("add not compiled");
    };
    assert_eq!(
        add.code.iter().collect::<Vec<_>>(),
        vec![(Load, 0), (Load, 1), (Add, 0), (ReturnValue, 0)]
    );
    assert_eq!(add.args.len(), 2);
    assert_eq!(add.required_args(), 1);
    let default = add.args[1].default.and_then(|i| module.constant(i));
    assert_eq!(default, Some(&Value::Int(2)));
}

#[test]
fn forward_calls_resolve_through_hoisting() {
    assert_eq!(
        ops("echo f(); function f() { return 1; }"),
        vec![(InitCall, 0), (Call, 0), (Echo, 1), (Return, 0)]
    );
}

#[test]
fn by_reference_parameters_take_references() {
    let code = ops("function inc(&$n) { $n++; } inc($x);");
    assert_eq!(code, vec![(InitCall, 0), (LoadRef, 0), (Call, 1), (Pop, 0), (Return, 0)]);
}

#[test]
fn typed_parameters() {
    let (_, module) = compile_ok("function f(int $a, ?string $b = null, ...$rest): float { return 1; }");
    let Some(Function::Compiled(f)) = module.function_by_name("f") else {
        panic!("f not compiled");
    };
    assert_eq!(f.args[0].ty, Some(Type::Int));
    assert!(f.args[1].nullable);
    assert!(f.args[2].variadic);
    assert_eq!(f.return_type, Some(Type::Float));
}

#[test]
fn failed_compile_leaves_module_untouched() {
    let mut module = Module::new();
    let err = compile("function h() {} g();", &mut module).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UndefinedSymbol(ref m) if m.contains("g()")));
    assert!(err.context.is_some());
    assert_eq!(module.function_index("h"), None);
    assert_eq!(module.constants().len(), 3);
}

#[test]
fn constants_fold_at_compile_time() {
    let (unit, module) = compile_ok("const A = 2 * 3; echo A;");
    assert_eq!(
        unit.code.iter().collect::<Vec<_>>(),
        vec![(Const, 3), (Echo, 1), (Return, 0)]
    );
    assert_eq!(module.constant(3), Some(&Value::Int(6)));
}

#[test]
fn undefined_constant() {
    assert!(matches!(compile_err("echo NOPE;"), ErrorKind::UndefinedSymbol(_)));
}

#[test]
fn unset_forms() {
    assert_eq!(
        ops("unset($a, $b[1]);"),
        vec![
            (Unset, 0),
            (LoadRef, 1),
            (Const, 3),
            (ArrayUnset, 0),
            (Pop, 0),
            (Return, 0),
        ]
    );
}

#[test]
fn unary_operators() {
    assert_eq!(
        ops("$y = -$x;"),
        vec![(Load, 0), (Const, 3), (Mul, 0), (Assign, 1), (Pop, 0), (Return, 0)]
    );
    let (_, module) = compile_ok("$y = -$x;");
    assert_eq!(module.constant(3), Some(&Value::Int(-1)));
}

#[test]
fn print_yields_one() {
    assert_eq!(
        ops("print 'a';"),
        vec![(Const, 3), (Echo, 1), (Const, 4), (Pop, 0), (Return, 0)]
    );
}

#[test]
fn trailing_return_kept_when_jumped_over() {
    let code = ops("if ($a) { return 1; }");
    assert_eq!(code.last(), Some(&(Return, 0)));
    assert_eq!(code[1], (JumpFalse, 4));
}

#[test]
fn unsupported_shapes() {
    assert!(matches!(compile_err("$a = [&$b];"), ErrorKind::Unsupported(_)));
    assert!(matches!(compile_err("$a = &f();"), ErrorKind::Unsupported(_)));
}
