use copse::{
    earley::EarleyParser,
    fuzzer::LimitFuzzer,
    gll::GLLParser,
    grammar::{Grammar, SymbolID},
    lr::{self, Action, LRParser, TableError},
    lstar::{LStar, PacConfig, PacTeacher},
    parser::{ParseError, Parser},
    rpni,
};
use copse_tests::grammars;
use rand::{rngs::StdRng, SeedableRng};

#[test]
fn epsilon_only_acceptance() {
    let grammar = Grammar::from_str(grammars::EPSILON).unwrap();
    let parser = EarleyParser::new(&grammar);
    assert!(parser.recognize(""));
    let trees: Vec<_> = parser.parse("").unwrap().collect();
    assert_eq!(trees.len(), 1);
    assert_eq!(trees[0].display(&grammar).to_string(), "(<S>, [(<A>, [])])");
}

#[test]
fn left_recursion_with_gll() {
    let grammar = Grammar::from_str(grammars::LEFT_RECURSIVE).unwrap();
    let parser = GLLParser::new(&grammar);
    for input in ["", "a", "aa", "aaa"] {
        assert!(parser.recognize(input), "{:?}", input);
    }
    assert!(!parser.recognize("ab"));
    assert!(matches!(
        parser.parse("ab"),
        Err(ParseError::SyntaxError { .. })
    ));
}

#[test]
fn ambiguity_yields_both_associations() {
    let grammar = Grammar::from_str(grammars::AMBIGUOUS_SUM).unwrap();
    let e = SymbolID::N(grammar.start_symbol);

    let parsers: Vec<Box<dyn Parser + '_>> = vec![
        Box::new(EarleyParser::new(&grammar)),
        Box::new(GLLParser::new(&grammar)),
    ];
    for parser in &parsers {
        let trees: Vec<_> = parser.parse("1+1+1").unwrap().collect();
        assert!(trees.len() >= 2);
        for tree in &trees {
            eprintln!("{}", tree.display(&grammar));
            assert_eq!(tree.yield_string(&grammar), "1+1+1");
            assert!(tree.conforms_to(&grammar));
        }
        // ((1+1)+1) nests on the left, (1+(1+1)) on the right.
        let left = trees.iter().any(|t| t.children[0].children.len() == 3);
        let right = trees.iter().any(|t| t.children[2].children.len() == 3);
        assert!(left && right);
        assert!(trees.iter().all(|t| t.label == e));
    }
}

#[test]
fn lr0_conflict_resolved_by_slr1() {
    let grammar = Grammar::from_str(grammars::LR0_CONFLICT).unwrap();
    let e = grammar.nonterminal_by_name("<E>").unwrap();
    let t = grammar.nonterminal_by_name("<T>").unwrap();
    let plus = grammar.terminal_of('+').unwrap();
    let reduce_e_t = grammar
        .rules_of(e)
        .find(|rule| rule.right() == [SymbolID::N(t)])
        .unwrap()
        .id();

    let table = lr::Config::new().use_lr0().build(&grammar);
    eprintln!("{}", table.display(&grammar));
    let conflict = table
        .conflicts()
        .into_iter()
        .find(|c| c.terminal == plus)
        .expect("a conflict on '+'");
    assert!(conflict.actions.contains(&Action::Reduce(reduce_e_t)));
    assert!(conflict.actions.iter().any(|a| matches!(a, Action::Shift(_))));

    // The conflicting state holds both `E := T .` and `E := T . + E`.
    let items: Vec<_> = table
        .automaton()
        .state(conflict.state)
        .items()
        .map(|(slot, _)| slot)
        .collect();
    assert!(items.iter().any(|s| s.rule == reduce_e_t && s.dot == 1));
    assert!(items
        .iter()
        .any(|s| s.dot == 1 && grammar.rules[&s.rule].right().len() == 3));

    match lr::Config::new().use_lr0().generate(&grammar) {
        Err(TableError::GrammarConflict { .. }) => (),
        other => panic!("expected a conflict, got {:?}", other.map(|t| t.len())),
    }

    let slr = LRParser::new(&grammar, lr::Config::new().use_slr1()).unwrap();
    assert!(slr.recognize("1+1+1"));
    assert!(!slr.recognize("1+"));
}

#[test]
fn lalr1_merges_lookahead_states() {
    let grammar = Grammar::define(grammars::lookahead_merge).unwrap();
    let lalr = LRParser::new(&grammar, lr::Config::new().use_lalr1()).unwrap();
    let lr1 = LRParser::new(&grammar, lr::Config::new().use_lr1()).unwrap();
    eprintln!("LALR(1):\n{}", lalr.table().display(&grammar));
    eprintln!("LR(1):\n{}", lr1.table().display(&grammar));
    assert!(lalr.table().len() < lr1.table().len());

    let a = lalr.parse("11*1").unwrap().next().unwrap();
    let b = lr1.parse("11*1").unwrap().next().unwrap();
    assert_eq!(a, b);
    assert_eq!(a.yield_string(&grammar), "11*1");

    for input in ["111", "*1**11*1", "11"] {
        assert_eq!(lalr.recognize(input), lr1.recognize(input), "{}", input);
    }
}

#[test]
fn lstar_learns_a_star_b() {
    let target = Grammar::from_str(grammars::A_STAR_B).unwrap();
    let mut teacher = PacTeacher::new(
        target,
        PacConfig {
            seed: 42,
            ..PacConfig::default()
        },
    );
    let dfa = LStar::new(['a', 'b']).learn(&mut teacher).unwrap();
    eprintln!("{}", dfa);

    // The start state looping on `a` and the accepting state after `b`.
    assert_eq!(dfa.live().len(), 2);
    assert_eq!(dfa.accepting().count(), 1);

    let learned = dfa.to_grammar().unwrap();
    let re = regex::Regex::new("^a*b$").unwrap();
    let fuzzer = LimitFuzzer::new(&learned);
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..10 {
        let s = fuzzer.fuzz_string(learned.start_symbol, &mut rng).unwrap();
        assert!(re.is_match(&s), "{:?}", s);
    }
}

#[test]
fn lstar_with_membership_predicate() {
    let re = regex::Regex::new("^a*b$").unwrap();
    let mut teacher = PacTeacher::from_fn(['a', 'b'], move |s| re.is_match(s), PacConfig::default());
    let dfa = LStar::new(['a', 'b']).learn(&mut teacher).unwrap();
    for s in ["b", "ab", "aaab"] {
        assert!(dfa.accepts(s), "{}", s);
    }
    for s in ["", "a", "ba", "abb"] {
        assert!(!dfa.accepts(s), "{}", s);
    }
}

#[test]
fn rpni_learns_ends_with_b() {
    let positive = ["b", "ab", "bb", "aab", "abb", "bab"];
    let negative = ["", "a", "aa", "ba", "aba", "bba"];
    let dfa = rpni::infer(positive, negative).unwrap();
    for s in positive {
        assert!(dfa.accepts(s), "{}", s);
    }
    for s in negative {
        assert!(!dfa.accepts(s), "{}", s);
    }
    assert!(dfa.accepts("aab"));
    assert!(dfa.accepts("bbb"));
    assert!(!dfa.accepts("aa"));

    let grammar = dfa.to_grammar().unwrap();
    eprintln!("{}", grammar.literal());
    let parser = EarleyParser::new(&grammar);
    assert!(parser.recognize("abab"));
    assert!(!parser.recognize("abba"));
}
