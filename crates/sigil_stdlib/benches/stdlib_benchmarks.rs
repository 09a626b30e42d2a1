//! Benchmarks for the bundled extensions.
//!
//! Run with: `cargo bench --package sigil_stdlib`

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sigil_language::{CompiledFunction, Module, Vm, compile};
use sigil_stdlib::{RandomState, default_extensions};

const STRINGS: &str = "$s = str_repeat('lorem ipsum dolor ', 50);
$words = explode(' ', trim($s));
$t = 0;
foreach ($words as $w) { $t += strlen(strtoupper($w)) + (strpos($s, $w) ?: 0); }
return implode(',', $words) . $t;";

const ARRAYS: &str = "$a = range(1, 500);
$b = array_merge($a, array_values($a));
$n = 0;
foreach (array_keys($b) as $k) { if (in_array($k, $a)) { $n++; } }
array_push($b, max($a), min($a));
return $n + count($b);";

const MATH: &str = "$t = 0.0;
for ($i = 1; $i < 500; $i++) { $t += round(sqrt($i), 2) + floor($i / 3) + abs(-$i); }
return $t;";

const RANDOM: &str = "$t = 0; for ($i = 0; $i < 500; $i++) { $t += mt_rand(1, 6); } return $t;";

fn prepare() -> Vm {
    let extensions = default_extensions();
    let module = Module::with_extensions(&extensions).unwrap();
    Vm::new(module)
}

fn compiled(vm: &mut Vm, source: &str) -> CompiledFunction {
    compile(source, vm.module_mut()).unwrap()
}

// =============================================================================
// Installation
// =============================================================================

fn bench_install(c: &mut Criterion) {
    c.bench_function("install_default_extensions", |b| {
        b.iter(|| {
            let extensions = default_extensions();
            Module::with_extensions(black_box(&extensions))
        });
    });
}

// =============================================================================
// Built-in calls
// =============================================================================

fn bench_builtins(c: &mut Criterion) {
    let mut group = c.benchmark_group("builtins");

    for (name, source) in [
        ("strings", STRINGS),
        ("arrays", ARRAYS),
        ("math", MATH),
        ("random", RANDOM),
    ] {
        let mut vm = prepare();
        vm.state_mut().insert(RandomState::seeded(1));
        let unit = compiled(&mut vm, source);
        group.bench_with_input(BenchmarkId::from_parameter(name), &unit, |b, unit| {
            b.iter(|| {
                vm.clear_globals();
                vm.run(black_box(unit))
            });
        });
    }

    group.finish();
}

fn bench_var_dump(c: &mut Criterion) {
    let source = "var_dump(range(1, 100), ['a' => [1.5, true, null]]);";
    let mut vm = prepare();
    let unit = compiled(&mut vm, source);
    c.bench_function("var_dump", |b| {
        b.iter(|| {
            vm.run(black_box(&unit)).unwrap();
            vm.take_output()
        });
    });
}

criterion_group!(benches, bench_install, bench_builtins, bench_var_dump);
criterion_main!(benches);
