//! Criterion benchmarks for the refinement matchers.
//!
//! Builds synthetic units with `n` abstract states of `m` constituents each
//! and checks a flow and a global refinement that decompose every state.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flowref_compiler::compiler::checker::RefinementChecker;
use flowref_compiler::{check_package_text, resolve_subprogram, SubprogramText};
use flowref_core::{ItemTable, ObjectKind, Span};

const CONSTITUENTS: usize = 8;

fn build_unit(states: usize) -> (ItemTable, SubprogramText) {
    let mut t = ItemTable::new();
    t.declare_object("Input_Value", ObjectKind::Variable, None, Span::dummy())
        .unwrap();

    let mut refinement = Vec::new();
    let mut abstract_outputs = Vec::new();
    let mut refined_outputs = Vec::new();
    for s in 0..states {
        let state = format!("State_{}", s);
        t.declare_state(&state, None, Span::dummy()).unwrap();
        let mut parts = Vec::new();
        for c in 0..CONSTITUENTS {
            let name = format!("Part_{}_{}", s, c);
            t.declare_object(&name, ObjectKind::Variable, None, Span::dummy())
                .unwrap();
            parts.push(name);
        }
        refinement.push(format!("{} => ({})", state, parts.join(", ")));
        refined_outputs.extend(parts);
        abstract_outputs.push(state);
    }
    let v = check_package_text(&mut t, "Bench", &format!("({})", refinement.join(", "))).unwrap();
    assert!(v.is_accepted());

    let sub = SubprogramText::new("Update")
        .with_depends(format!("(({}) => Input_Value)", abstract_outputs.join(", ")))
        .with_refined_depends(format!("(({}) => Input_Value)", refined_outputs.join(", ")))
        .with_global(format!(
            "(Input => Input_Value, Output => ({}))",
            abstract_outputs.join(", ")
        ))
        .with_refined_global(format!(
            "(Input => Input_Value, Output => ({}))",
            refined_outputs.join(", ")
        ));
    (t, sub)
}

fn bench_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_subprogram");
    for states in [4usize, 16, 64] {
        let (items, sub) = build_unit(states);
        let contracts = resolve_subprogram(&items, &sub).unwrap();
        let checker = RefinementChecker::new(&items);
        group.throughput(Throughput::Elements((states * CONSTITUENTS) as u64));
        group.bench_with_input(
            BenchmarkId::new("constituents", states * CONSTITUENTS),
            &contracts,
            |b, contracts| {
                b.iter(|| {
                    let verdict = checker.check_subprogram(black_box(contracts));
                    assert!(verdict.is_accepted());
                })
            },
        );
    }
    group.finish();
}

fn bench_front_end(c: &mut Criterion) {
    let (items, sub) = build_unit(16);
    c.bench_function("resolve_subprogram/16_states", |b| {
        b.iter(|| resolve_subprogram(black_box(&items), black_box(&sub)).unwrap())
    });
}

criterion_group!(benches, bench_check, bench_front_end);
criterion_main!(benches);
