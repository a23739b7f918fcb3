//! Lexer benchmarks.
//!
//! Run with: `cargo bench --package slang-lex`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use slang_lex::Lexer;

fn token_count(source: &str) -> usize {
    Lexer::new(source).count()
}

fn bench_lexer_statements(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");

    let source = "let total = 0; let i = 0; while i < 100 { total = total + i; i = i + 1; }";
    group.throughput(Throughput::Bytes(source.len() as u64));

    group.bench_function("simple_let", |b| {
        b.iter(|| token_count(black_box("let x = 42;")))
    });

    group.bench_function("while_loop", |b| b.iter(|| token_count(black_box(source))));

    group.finish();
}

fn bench_lexer_mixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_mixed");

    // A little of everything: strings, lists, ranges, comments.
    let source = r#"
        // totals per bucket
        let labels = ["low", "mid", "high"];
        let bounds = 0..2;
        let msg = "bucket: " + labels[1];
        if 1 <= 2 and true or !false {
            println(msg);
        }
    "#;
    group.throughput(Throughput::Bytes(source.len() as u64));

    group.bench_function("mixed_source", |b| b.iter(|| token_count(black_box(source))));

    // Scale up to a few kilobytes of repeated statements.
    let big: String = source.repeat(50);
    group.throughput(Throughput::Bytes(big.len() as u64));
    group.bench_function("mixed_source_x50", |b| {
        b.iter(|| token_count(black_box(&big)))
    });

    group.finish();
}

criterion_group!(benches, bench_lexer_statements, bench_lexer_mixed);
criterion_main!(benches);
