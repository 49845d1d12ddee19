//! Deterministic finite automata, as produced by grammar inference.

use crate::{
    grammar::{Grammar, GrammarDefError, SymbolID},
    types::Set,
};
use std::{collections::BTreeMap, fmt};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct DfaState {
    accepting: bool,
    transitions: BTreeMap<char, usize>,
}

/// A partial DFA over characters. State `0` is the start; a missing transition rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dfa {
    states: Vec<DfaState>,
}

impl Default for Dfa {
    fn default() -> Self {
        Self::new()
    }
}

impl Dfa {
    /// A DFA with a single, rejecting start state.
    pub fn new() -> Self {
        Self {
            states: vec![DfaState::default()],
        }
    }

    pub const START: usize = 0;

    pub fn add_state(&mut self, accepting: bool) -> usize {
        self.states.push(DfaState {
            accepting,
            transitions: BTreeMap::new(),
        });
        self.states.len() - 1
    }

    pub fn set_accepting(&mut self, state: usize, accepting: bool) {
        self.states[state].accepting = accepting;
    }

    pub fn add_transition(&mut self, from: usize, ch: char, to: usize) {
        self.states[from].transitions.insert(ch, to);
    }

    pub fn transition(&self, from: usize, ch: char) -> Option<usize> {
        self.states.get(from)?.transitions.get(&ch).copied()
    }

    pub fn transitions(&self, from: usize) -> impl Iterator<Item = (char, usize)> + '_ {
        self.states[from].transitions.iter().map(|(ch, to)| (*ch, *to))
    }

    pub fn states(&self) -> std::ops::Range<usize> {
        0..self.states.len()
    }

    pub fn is_accepting(&self, state: usize) -> bool {
        self.states[state].accepting
    }

    pub fn accepting(&self) -> impl Iterator<Item = usize> + '_ {
        self.states().filter(|q| self.states[*q].accepting)
    }

    /// Every character used by some transition, in order.
    pub fn alphabet(&self) -> Vec<char> {
        let mut alphabet: Vec<char> = self
            .states
            .iter()
            .flat_map(|s| s.transitions.keys().copied())
            .collect();
        alphabet.sort_unstable();
        alphabet.dedup();
        alphabet
    }

    pub fn run(&self, input: &str) -> Option<usize> {
        input
            .chars()
            .try_fold(Self::START, |q, ch| self.transition(q, ch))
    }

    pub fn accepts(&self, input: &str) -> bool {
        self.run(input).map_or(false, |q| self.is_accepting(q))
    }

    /// The states reachable from the start.
    pub fn reachable(&self) -> Set<usize> {
        let mut seen = Set::default();
        seen.insert(Self::START);
        let mut i = 0;
        while let Some(q) = seen.get_index(i).copied() {
            seen.extend(self.states[q].transitions.values().copied());
            i += 1;
        }
        seen
    }

    /// The states from which an accepting state is reachable.
    pub fn live(&self) -> Set<usize> {
        let mut predecessors = vec![vec![]; self.states.len()];
        for q in self.states() {
            for to in self.states[q].transitions.values() {
                predecessors[*to].push(q);
            }
        }
        let mut live: Set<usize> = self.accepting().collect();
        let mut i = 0;
        while let Some(q) = live.get_index(i).copied() {
            live.extend(predecessors[q].iter().copied());
            i += 1;
        }
        live
    }

    /// Export as a right-linear grammar over `<q{n}>` nonterminals with start `<q0>`.
    ///
    /// Unreachable and dead states are dropped. `<q0>` has no rules when the
    /// language is empty.
    pub fn to_grammar(&self) -> Result<Grammar, GrammarDefError> {
        let reachable = self.reachable();
        let live = self.live();
        let kept: Vec<usize> = self
            .states()
            .filter(|q| *q == Self::START || (reachable.contains(q) && live.contains(q)))
            .collect();

        Grammar::define(|def| {
            let mut names = BTreeMap::new();
            for q in &kept {
                names.insert(*q, def.nonterminal(&format!("<q{}>", q))?);
            }
            def.start_symbol(names[&Self::START])?;
            if !live.contains(&Self::START) {
                return Ok(());
            }
            for q in &kept {
                let left = names[q];
                for (ch, to) in self.transitions(*q) {
                    if let Some(next) = names.get(&to) {
                        let t = def.terminal(ch)?;
                        def.rule(left, [SymbolID::T(t), SymbolID::N(*next)])?;
                    }
                }
                if self.is_accepting(*q) {
                    def.rule(left, std::iter::empty())?;
                }
            }
            Ok(())
        })
    }
}

impl fmt::Display for Dfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (q, state) in self.states.iter().enumerate() {
            write!(f, "q{}", q)?;
            if state.accepting {
                f.write_str(" (accept)")?;
            }
            writeln!(f)?;
            for (ch, to) in &state.transitions {
                writeln!(f, "  {:?} -> q{}", ch, to)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{earley::EarleyParser, parser::Parser};

    /// `a*b`, with a dead sink state.
    fn a_star_b() -> Dfa {
        let mut dfa = Dfa::new();
        let done = dfa.add_state(true);
        let sink = dfa.add_state(false);
        dfa.add_transition(0, 'a', 0);
        dfa.add_transition(0, 'b', done);
        dfa.add_transition(done, 'a', sink);
        dfa.add_transition(done, 'b', sink);
        dfa.add_transition(sink, 'a', sink);
        dfa.add_transition(sink, 'b', sink);
        dfa
    }

    #[test]
    fn accepts() {
        let dfa = a_star_b();
        eprintln!("{}", dfa);
        assert!(dfa.accepts("b"));
        assert!(dfa.accepts("aaab"));
        assert!(!dfa.accepts(""));
        assert!(!dfa.accepts("ba"));
        assert!(!dfa.accepts("c"));
        assert_eq!(dfa.accepting().collect::<Vec<_>>(), vec![1]);
        assert_eq!(dfa.live().len(), 2);
    }

    #[test]
    fn grammar_export_drops_dead_states() {
        let dfa = a_star_b();
        let grammar = dfa.to_grammar().unwrap();
        eprintln!("{}", grammar);
        assert_eq!(grammar.nonterminals[&grammar.start_symbol].name(), "<q0>");
        assert!(grammar.nonterminal_by_name("<q2>").is_none());

        let parser = EarleyParser::new(&grammar);
        for input in ["b", "ab", "aaab"] {
            assert!(parser.recognize(input));
        }
        for input in ["", "a", "ba", "bb"] {
            assert!(!parser.recognize(input));
        }
    }

    /// `a^n`, as a chain of `n + 1` states.
    fn chain(n: usize) -> Dfa {
        let mut dfa = Dfa::new();
        for q in 0..n {
            let next = dfa.add_state(q + 1 == n);
            dfa.add_transition(q, 'a', next);
        }
        dfa
    }

    #[test]
    fn long_chain_export() {
        let dfa = chain(20_000);
        assert_eq!(dfa.live().len(), 20_001);
        let grammar = dfa.to_grammar().unwrap();
        assert_eq!(grammar.rules_of(grammar.start_symbol).count(), 1);
        assert!(grammar.nonterminal_by_name("<q20000>").is_some());

        let err = chain(70_000).to_grammar().unwrap_err();
        assert!(matches!(err, GrammarDefError::TooMany { kind: "nonterminal" }));
    }

    #[test]
    fn empty_language() {
        let grammar = Dfa::new().to_grammar().unwrap();
        assert_eq!(grammar.rules_of(grammar.start_symbol).count(), 0);
        assert!(!EarleyParser::new(&grammar).recognize(""));
    }
}
