use copse::{
    grammar::{Grammar, GrammarDef, GrammarDefError},
    lr,
};
use copse_tests::grammars;
use tracing_subscriber::EnvFilter;

fn smoketest_grammar(f: impl FnOnce(&mut GrammarDef<'_>) -> Result<(), GrammarDefError>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let grammar = Grammar::define(f).unwrap();
    eprintln!("grammar:\n{}", grammar);
    eprintln!();
    let table = lr::Config::new().use_lalr1().build(&grammar);
    eprintln!("LALR(1) automaton:\n---\n{}", table.automaton().display(&grammar));
    eprintln!("parse table:\n---\n{}", table.display(&grammar));
    for conflict in table.conflicts() {
        eprintln!("conflict: {}", conflict.display(&grammar));
    }
}

#[test]
fn smoketest_g_simple1() {
    smoketest_grammar(grammars::g_simple1);
}

#[test]
fn smoketest_g_simple2() {
    smoketest_grammar(grammars::g_simple2);
}

#[test]
fn smoketest_g1() {
    smoketest_grammar(grammars::g1);
}

#[test]
fn smoketest_g2() {
    smoketest_grammar(grammars::g2);
}

#[test]
fn smoketest_g4() {
    smoketest_grammar(grammars::g4);
}

#[test]
fn smoketest_lookahead_merge() {
    smoketest_grammar(grammars::lookahead_merge);
}
