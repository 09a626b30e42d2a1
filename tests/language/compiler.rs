//! Integration tests for the compiler: emitted code and module sharing.

use sigil_language::{CompilerOptions, Module, Opcode, compile, compile_with};

fn ops(source: &str) -> Vec<(Opcode, u32)> {
    let mut module = Module::new();
    compile(source, &mut module).unwrap().code.iter().collect()
}

#[test]
fn echo_of_a_sum() {
    assert_eq!(
        ops("echo $a + 2;"),
        vec![
            (Opcode::Load, 0),
            (Opcode::Const, 3),
            (Opcode::Add, 0),
            (Opcode::Echo, 1),
            (Opcode::Return, 0),
        ]
    );
}

#[test]
fn constants_are_deduplicated() {
    let mut module = Module::new();
    compile("$a = 'x'; $b = 'x'; $c = 1;", &mut module).unwrap();
    let before = module.constants().len();
    compile("$d = 'x'; $e = 1;", &mut module).unwrap();
    assert_eq!(module.constants().len(), before);
}

#[test]
fn jumps_stay_inside_the_unit() {
    let sources = [
        "if ($a) { echo 1; } elseif ($b) { echo 2; } else { echo 3; }",
        "while ($i < 10) { if ($i == 5) { break; } $i++; continue; }",
        "for ($i = 0; $i < 3; $i++) { foreach ([1, 2] as $k => $v) { echo $k ?: $v; } }",
        "do { $i--; } while ($i > 0);",
        "$x = $a && $b || !$c ? 1 : 2; $y = $a ?? $b;",
    ];
    for source in sources {
        let mut module = Module::new();
        let unit = compile(source, &mut module).unwrap();
        let len = unit.code.len();
        for (op, target) in unit.code.iter() {
            if op.is_jump() {
                assert!((target as usize) <= len, "{source}: {op} {target} of {len}");
            }
        }
        assert_eq!(unit.code.iter().last(), Some((Opcode::Return, 0)), "{source}");
    }
}

#[test]
fn functions_are_shared_through_the_module() {
    let mut module = Module::new();
    compile("function twice($n) { return $n * 2; }", &mut module).unwrap();
    let unit = compile("return twice(21);", &mut module).unwrap();
    assert!(module.function_by_name("twice").is_some());
    assert!(unit.code.iter().any(|(op, _)| op == Opcode::Call));
}

#[test]
fn unknown_functions_fail_to_compile() {
    let mut module = Module::new();
    assert!(compile("undefined_thing();", &mut module).is_err());
}

#[test]
fn pop_fusing_is_optional() {
    let source = "$a = 1; $b = 2; $c = 3;";
    let plain = CompilerOptions {
        fuse_pops: false,
        ..CompilerOptions::default()
    };
    let fused = CompilerOptions {
        fuse_pops: true,
        ..CompilerOptions::default()
    };
    let mut module = Module::new();
    let plain = compile_with(source, &mut module, &plain).unwrap();
    let fused = compile_with(source, &mut module, &fused).unwrap();
    assert!(fused.code.len() <= plain.code.len());
}
