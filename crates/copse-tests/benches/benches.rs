use copse::{
    earley::{EarleyConfig, EarleyParser},
    gll::GLLParser,
    grammar::{Grammar, GrammarDef, GrammarDefError},
    lr::{self, LRParser},
    parser::Parser,
};
use copse_tests::grammars;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

criterion_main!(benches);
criterion_group!(benches, bench_table_gen, bench_parsers, bench_right_recursion);

fn bench_table_gen(c: &mut Criterion) {
    bench_lr_gen(c, "g_simple1", grammars::g_simple1);
    bench_lr_gen(c, "g_simple2", grammars::g_simple2);
    bench_lr_gen(c, "g1", grammars::g1);
    bench_lr_gen(c, "g2", grammars::g2);
    bench_lr_gen(c, "g4", grammars::g4);
}

fn bench_lr_gen(
    c: &mut Criterion,
    name: &str,
    f: impl FnOnce(&mut GrammarDef<'_>) -> Result<(), GrammarDefError>,
) {
    let grammar = Grammar::define(f).unwrap();
    let mut group = c.benchmark_group(format!("table/{}", name));
    for (kind, config) in [
        ("lalr1", lr::Config::new().use_lalr1().clone()),
        ("lr1", lr::Config::new().use_lr1().clone()),
    ] {
        group.bench_function(kind, |b| {
            b.iter(|| black_box(config.build(&grammar)));
        });
    }
    group.finish();
}

fn bench_parsers(c: &mut Criterion) {
    let grammar = Grammar::define(grammars::g_simple2).unwrap();
    let input = vec!["(1+2)*3-4/(5+6*7)-8*(9+0)"; 8].join("+");

    let earley = EarleyParser::new(&grammar);
    let gll = GLLParser::new(&grammar);
    let lalr = LRParser::new(&grammar, &lr::Config::new()).unwrap();
    assert!(lalr.recognize(&input));

    let mut group = c.benchmark_group("parse/g_simple2");
    group.bench_function("earley", |b| b.iter(|| black_box(earley.recognize(&input))));
    group.bench_function("gll", |b| b.iter(|| black_box(gll.recognize(&input))));
    group.bench_function("lalr1", |b| b.iter(|| black_box(lalr.recognize(&input))));
    group.finish();
}

fn bench_right_recursion(c: &mut Criterion) {
    let grammar = Grammar::from_str(grammars::RIGHT_RECURSIVE).unwrap();
    let leo = EarleyParser::new(&grammar);
    let plain = EarleyParser::with_config(&grammar, EarleyConfig { leo: false });

    let mut group = c.benchmark_group("earley/right_recursion");
    for n in [64, 256, 1024] {
        let input = "a".repeat(n);
        group.bench_with_input(BenchmarkId::new("leo", n), &input, |b, input| {
            b.iter(|| black_box(leo.recognize(input)))
        });
        group.bench_with_input(BenchmarkId::new("plain", n), &input, |b, input| {
            b.iter(|| black_box(plain.recognize(input)))
        });
    }
    group.finish();
}
