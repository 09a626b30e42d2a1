//! Running scripts through the engine with the bundled extensions.

use std::time::Duration;

use sigil::foundation::{ErrorLevel, Value};
use sigil::runtime::serialize::{from_bytes, to_bytes};
use sigil::runtime::{Engine, RuntimeConfig};

fn engine() -> Engine {
    Engine::new(RuntimeConfig::default().with_seed(42))
}

#[test]
fn template_with_builtins() {
    let source = "<h1><?= strtoupper('title') ?></h1>
<?php foreach (explode(',', 'a,b') as $i => $x) { ?>
<p><?= $i ?>:<?= $x ?></p>
<?php } ?>";
    let outcome = engine().run_source(source).unwrap();
    assert_eq!(outcome.output, "<h1>TITLE</h1>\n<p>0:a</p>\n<p>1:b</p>\n");
}

#[test]
fn var_dump_and_print_r() {
    let outcome = engine()
        .run_source("var_dump([1, 'a' => true]); print_r(['x' => [1]]);")
        .unwrap();
    assert_eq!(
        outcome.output,
        "array(2) {\n  [0]=>\n  int(1)\n  [\"a\"]=>\n  bool(true)\n}\n\
         Array\n(\n    [x] => Array\n        (\n            [0] => 1\n        )\n\n)\n"
    );
}

#[test]
fn trigger_error_respects_the_mask() {
    let source = "trigger_error('careful', E_USER_WARNING); echo 'done';";
    let loud = engine().run_source(source).unwrap();
    assert_eq!(loud.output, "\nWarning: careful\ndone");

    let quiet = Engine::new(
        RuntimeConfig::default().with_error_reporting(ErrorLevel::from_bits(
            ErrorLevel::ALL.bits() & !ErrorLevel::USER_WARNING.bits(),
        )),
    );
    assert_eq!(quiet.run_source(source).unwrap().output, "done");
}

#[test]
fn hidden_diagnostics_are_still_collected() {
    let engine = Engine::new(RuntimeConfig::default().with_display_errors(false));
    let outcome = engine.run_source("$a = []; echo $a[1], 'x';").unwrap();
    assert_eq!(outcome.output, "x");
    assert_eq!(outcome.diagnostics.len(), 1);
}

#[test]
fn seeded_runs_match_across_images() {
    let engine = engine();
    let source = "$r = []; for ($i = 0; $i < 5; $i++) { $r[] = mt_rand(1, 100); } return $r;";
    let (module, unit) = engine.compile(source, None).unwrap();
    let bytes = to_bytes(&module, &unit).unwrap();
    let direct = engine.run_compiled(module, &unit).unwrap().value;

    let (module, unit) = from_bytes(&bytes, &engine.config().extensions).unwrap();
    let restored = engine.run_compiled(module, &unit).unwrap().value;
    assert_eq!(direct, restored);
    assert!(matches!(direct, Value::Array(ref a) if a.len() == 5));
}

#[test]
fn long_runs_are_cancelled() {
    let engine = Engine::new(
        RuntimeConfig::default().with_max_execution_time(Duration::from_millis(50)),
    );
    let err = engine
        .run_source("$i = 0; while (true) { $i++; }")
        .unwrap_err();
    assert!(err.is_cancelled());
}
