//! Benchmarks for propagating an edit through chains of nodes.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use strata::{DatumId, Graph, Value};

/// `n0` holds an input; every following node doubles the output of the one before.
fn chain(length: usize) -> (Graph, DatumId) {
    let mut graph = Graph::new();
    let first = graph.add_node("n0").unwrap();
    graph
        .set_script(first, "input('x', float, 1.0)\noutput('y', x)")
        .unwrap();
    for index in 1..length {
        let node = graph.add_node(&format!("n{index}")).unwrap();
        let script = format!("output('y', n{}.y * 2.0)", index - 1);
        graph.set_script(node, &script).unwrap();
    }
    let x = graph.datum_by_path("n0.x").unwrap();
    (graph, x)
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_edit");
    for length in [10, 100, 500] {
        let (mut graph, x) = chain(length);
        let last = format!("n{}.y", length - 1);
        let mut toggle = false;
        group.bench_with_input(BenchmarkId::from_parameter(length), &length, |b, _| {
            b.iter(|| {
                toggle = !toggle;
                graph.set_text(x, if toggle { "2.0" } else { "1.0" }).unwrap();
                black_box(graph.datum_by_path(&last))
            })
        });
    }
    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut graph = Graph::new();
    let source = graph.add_node("source").unwrap();
    graph.set_script(source, "input('x', float, 1.0)").unwrap();
    for index in 0..200 {
        let node = graph.add_node(&format!("reader{index}")).unwrap();
        graph
            .add_datum(node, "d", "source.x + 1", strata::ValueType::Float)
            .unwrap();
    }
    let x = graph.datum_by_path("source.x").unwrap();
    let mut value = 0.0;

    c.bench_function("fan_out_200", |b| {
        b.iter(|| {
            value += 1.0;
            graph.set_text(x, &format!("{value:?}")).unwrap();
            black_box(graph.datum(x).and_then(|datum| datum.value().cloned()))
        })
    });
}

fn bench_script_edit(c: &mut Criterion) {
    let mut graph = Graph::new();
    let node = graph.add_node("n").unwrap();
    let scripts = [
        "input('x', float, 1.0)\ninput('y', float, 2.0)\noutput('z', x + y)",
        "input('x', float, 1.0)\noutput('z', x * 3.0)",
    ];
    let mut index = 0;

    c.bench_function("script_reconcile", |b| {
        b.iter(|| {
            index = (index + 1) % scripts.len();
            graph.set_script(node, scripts[index]).unwrap();
            black_box(
                graph
                    .datum_by_path("n.z")
                    .and_then(|z| graph.datum(z))
                    .and_then(|z| z.value().cloned())
                    .unwrap_or(Value::None),
            )
        })
    });
}

criterion_group!(benches, bench_chain, bench_fan_out, bench_script_edit);
criterion_main!(benches);
