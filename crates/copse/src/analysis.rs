//! Nullable, FIRST and FOLLOW sets.

use crate::{
    grammar::{Grammar, NonterminalID, SymbolID, TerminalID},
    types::{Map, TerminalSet},
};
use bit_vec::BitVec;
use std::borrow::Cow;

/// The set of nonterminals deriving the empty string.
#[derive(Debug, Clone)]
pub struct Nullables {
    bits: BitVec,
}

impl Nullables {
    pub fn contains(&self, n: NonterminalID) -> bool {
        self.bits.get(n.index()).unwrap_or(false)
    }

    /// Tell whether `symbol` derives the empty string. Terminals never do.
    pub fn is_nullable(&self, symbol: &SymbolID) -> bool {
        matches!(symbol, SymbolID::N(n) if self.contains(*n))
    }

    pub fn iter(&self) -> impl Iterator<Item = NonterminalID> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, bit)| *bit)
            .filter_map(|(index, _)| NonterminalID::try_from_index(index))
    }
}

/// Calculate the set of nullable symbols in this grammar.
pub fn nullable(grammar: &Grammar) -> Nullables {
    let size = grammar
        .nonterminals
        .keys()
        .map(|n| n.index() + 1)
        .max()
        .unwrap_or(0);
    let mut bits = BitVec::from_elem(size, false);

    // Seed with the explicit empty rules.
    for rule in grammar.rules.values() {
        if rule.right().is_empty() {
            bits.set(rule.left().index(), true);
        }
    }

    let mut changed = true;
    while changed {
        changed = false;
        for rule in grammar.rules.values() {
            if bits[rule.left().index()] {
                continue;
            }
            let is_rhs_nullable = rule
                .right()
                .iter()
                .all(|symbol| matches!(symbol, SymbolID::N(n) if bits[n.index()]));
            if is_rhs_nullable {
                bits.set(rule.left().index(), true);
                changed = true;
            }
        }
    }

    Nullables { bits }
}

/// The FIRST set of a sentential form.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceFirst {
    pub terminals: TerminalSet,
    /// `true` if ε belongs to the set, i.e. every symbol is nullable.
    pub nullable: bool,
}

#[derive(Debug, Clone)]
pub struct FirstSets {
    nullables: Nullables,
    map: Map<SymbolID, TerminalSet>,
}

impl FirstSets {
    pub fn new(grammar: &Grammar) -> Self {
        Self::with_nullables(grammar, nullable(grammar))
    }

    pub fn with_nullables(grammar: &Grammar, nullables: Nullables) -> Self {
        let mut map: Map<SymbolID, TerminalSet> = Map::default();
        for terminal in grammar.terminals.values() {
            map.insert(
                SymbolID::T(terminal.id()),
                Some(terminal.id()).into_iter().collect(),
            );
        }
        for symbol in grammar.nonterminals.values() {
            map.insert(SymbolID::N(symbol.id()), TerminalSet::new());
        }

        // For X -> Y1 Y2 ... Yn with Y1..Y(k-1) nullable and Yk not,
        // First(X) contains First(Yi) for each i <= k.
        #[derive(Debug)]
        struct Constraint<'g> {
            sup: Cow<'g, SymbolID>,
            sub: &'g SymbolID,
        }
        let mut constraints = vec![];
        for rule in grammar.rules.values() {
            for symbol in rule.right() {
                if !matches!(symbol, SymbolID::N(n) if rule.left() == *n) {
                    constraints.push(Constraint {
                        sup: Cow::Owned(SymbolID::N(rule.left())),
                        sub: symbol,
                    });
                }
                if !nullables.is_nullable(symbol) {
                    break;
                }
            }
        }

        let mut changed = true;
        while changed {
            changed = false;
            for Constraint { sup, sub } in &constraints {
                let subset = map[*sub].clone();
                changed |= map[&**sup].union_with(&subset);
            }
        }

        Self { nullables, map }
    }

    pub fn nullables(&self) -> &Nullables {
        &self.nullables
    }

    /// `First(symbol)`, never containing ε.
    pub fn first(&self, symbol: &SymbolID) -> &TerminalSet {
        &self.map[symbol]
    }

    /// `First(seq)` together with whether ε belongs to it.
    pub fn first_of_sequence(&self, seq: &[SymbolID]) -> SequenceFirst {
        let mut terminals = TerminalSet::new();
        for symbol in seq {
            terminals.union_with(&self.map[symbol]);
            if !self.nullables.is_nullable(symbol) {
                return SequenceFirst {
                    terminals,
                    nullable: false,
                };
            }
        }
        SequenceFirst {
            terminals,
            nullable: true,
        }
    }

    /// `First(prefix x1) ∪ ... ∪ First(prefix xk)` for the lookaheads `{x1, ..., xk}`.
    pub fn lookaheads(&self, prefix: &[SymbolID], lookaheads: &TerminalSet) -> TerminalSet {
        let SequenceFirst {
            mut terminals,
            nullable,
        } = self.first_of_sequence(prefix);
        if nullable {
            terminals.union_with(lookaheads);
        }
        terminals
    }
}

#[derive(Debug, Clone)]
pub struct FollowSets {
    map: Map<NonterminalID, TerminalSet>,
}

impl FollowSets {
    /// Compute FOLLOW sets, seeding `Follow(start)` with the end of input.
    pub fn new(grammar: &Grammar, first_sets: &FirstSets, start: NonterminalID) -> Self {
        let mut map: Map<NonterminalID, TerminalSet> = grammar
            .nonterminals
            .keys()
            .map(|n| (*n, TerminalSet::new()))
            .collect();
        if let Some(follow) = map.get_mut(&start) {
            follow.insert(TerminalID::EOI);
        }

        let mut changed = true;
        while changed {
            changed = false;
            for rule in grammar.rules.values() {
                for (i, symbol) in rule.right().iter().enumerate() {
                    let b = match symbol {
                        SymbolID::N(b) => *b,
                        SymbolID::T(..) => continue,
                    };
                    let beta = first_sets.first_of_sequence(&rule.right()[i + 1..]);
                    changed |= map[&b].union_with(&beta.terminals);
                    if beta.nullable && rule.left() != b {
                        let follow_a = map[&rule.left()].clone();
                        changed |= map[&b].union_with(&follow_a);
                    }
                }
            }
        }

        Self { map }
    }

    pub fn follow(&self, n: NonterminalID) -> &TerminalSet {
        &self.map[&n]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(g: &Grammar, set: &TerminalSet) -> String {
        let mut names: Vec<String> = set.iter().map(|t| g.terminals[&t].to_string()).collect();
        names.sort();
        names.join(" ")
    }

    #[test]
    fn nullable_fixpoint() {
        let g = Grammar::from_str(
            r#"{
                "<S>": [["<A>", "<B>"]],
                "<A>": [["a", "<A>"], []],
                "<B>": [["<A>"], ["b"]],
                "<C>": [["c"]]
            }"#,
        )
        .unwrap();
        let nulls = nullable(&g);
        let n = |name| g.nonterminal_by_name(name).unwrap();
        assert!(nulls.contains(n("<S>")));
        assert!(nulls.contains(n("<A>")));
        assert!(nulls.contains(n("<B>")));
        assert!(!nulls.contains(n("<C>")));
        assert_eq!(nulls.iter().count(), 4); // includes $start
    }

    #[test]
    fn first_and_follow() {
        let g = Grammar::from_str(
            r#"{
                "<E>": [["<T>", "+", "<E>"], ["<T>"]],
                "<T>": [["1"], ["(", "<E>", ")"]]
            }"#,
        )
        .unwrap();
        let first = FirstSets::new(&g);
        let follow = FollowSets::new(&g, &first, g.start_symbol);
        let e = g.nonterminal_by_name("<E>").unwrap();
        let t = g.nonterminal_by_name("<T>").unwrap();

        assert_eq!(names(&g, first.first(&SymbolID::N(e))), "'(' '1'");
        assert_eq!(names(&g, follow.follow(e)), "$ ')'");
        assert_eq!(names(&g, follow.follow(t)), "$ ')' '+'");
    }

    #[test]
    fn first_of_nullable_sequence() {
        let g = Grammar::from_str(
            r#"{
                "<S>": [["<A>", "<B>", "c"]],
                "<A>": [["a"], []],
                "<B>": [["b"], []]
            }"#,
        )
        .unwrap();
        let first = FirstSets::new(&g);
        let a = SymbolID::N(g.nonterminal_by_name("<A>").unwrap());
        let b = SymbolID::N(g.nonterminal_by_name("<B>").unwrap());
        let c = SymbolID::T(g.terminal_of('c').unwrap());

        let seq = first.first_of_sequence(&[a, b]);
        assert!(seq.nullable);
        assert_eq!(names(&g, &seq.terminals), "'a' 'b'");

        let seq = first.first_of_sequence(&[a, b, c]);
        assert!(!seq.nullable);
        assert_eq!(names(&g, &seq.terminals), "'a' 'b' 'c'");

        let eoi: TerminalSet = Some(TerminalID::EOI).into_iter().collect();
        assert_eq!(names(&g, &first.lookaheads(&[a], &eoi)), "$ 'a'");
        assert!(first.first_of_sequence(&[]).nullable);
    }
}
