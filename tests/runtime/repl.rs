//! Driving the REPL with scripted input.

use sigil::foundation::Value;
use sigil::runtime::{Repl, RuntimeConfig, ScriptedEditor};

fn repl(lines: &[&str]) -> Repl<ScriptedEditor> {
    Repl::with_editor(ScriptedEditor::new(lines.iter().copied()), RuntimeConfig::default())
        .unwrap()
        .without_banner()
}

#[test]
fn session_keeps_definitions() {
    let mut repl = repl(&[
        "const GREETING = 'hi';",
        "function greet($who) {",
        "    return GREETING . ' ' . $who;",
        "}",
        "$name = 'there';",
    ]);
    repl.run().unwrap();
    assert_eq!(repl.editor().history().len(), 3);
    assert_eq!(repl.eval("greet($name)").unwrap(), Value::from("hi there"));
}

#[test]
fn failed_entries_keep_earlier_variables() {
    let mut repl = repl(&[]);
    repl.eval("$kept = 1;").unwrap();
    assert!(repl.eval("$kept = 2; $boom = 1 % 0;").is_err());
    assert_eq!(repl.eval("$kept").unwrap(), Value::Int(2));
}
