//! Sentence generation from a grammar.

use crate::{
    grammar::{Grammar, NonterminalID, RuleID, SymbolID},
    tree::ParseTree,
    types::{Map, Set},
};
use rand::Rng;

/// The cost of a nonterminal that cannot derive any finite string.
pub const INFINITE: usize = usize::MAX;

/// Minimum expansion depth of every nonterminal and rule.
#[derive(Debug, Clone)]
pub struct Costs {
    nonterminals: Map<NonterminalID, usize>,
    rules: Map<RuleID, usize>,
}

impl Costs {
    pub fn of_nonterminal(&self, n: NonterminalID) -> usize {
        self.nonterminals.get(&n).copied().unwrap_or(INFINITE)
    }

    pub fn of_rule(&self, rule: RuleID) -> usize {
        self.rules.get(&rule).copied().unwrap_or(INFINITE)
    }
}

/// Compute the expansion costs of `grammar`.
///
/// A rule costs one more than its most expensive nonterminal, and a
/// nonterminal costs as much as its cheapest rule. A nonterminal that is only
/// reachable through itself never gets a finite cost.
pub fn compute_cost(grammar: &Grammar) -> Costs {
    let mut nonterminals: Map<NonterminalID, usize> =
        grammar.nonterminals.keys().map(|n| (*n, INFINITE)).collect();

    let rule_cost = |nonterminals: &Map<NonterminalID, usize>, right: &[SymbolID]| {
        let mut cost = 0;
        for symbol in right {
            if let SymbolID::N(n) = symbol {
                cost = cost.max(nonterminals[n]);
            }
        }
        cost.saturating_add(1)
    };

    let mut changed = true;
    while changed {
        changed = false;
        for rule in grammar.rules.values() {
            let cost = rule_cost(&nonterminals, rule.right());
            let current = &mut nonterminals[&rule.left()];
            if cost < *current {
                *current = cost;
                changed = true;
            }
        }
    }

    let rules = grammar
        .rules
        .values()
        .map(|rule| (rule.id(), rule_cost(&nonterminals, rule.right())))
        .collect();

    Costs {
        nonterminals,
        rules,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FuzzError {
    #[error("{name} derives no finite string")]
    Unproductive { name: String },
}

/// Random expansion that switches to the cheapest rules past a depth limit.
#[derive(Debug, Clone)]
pub struct LimitFuzzer<'g> {
    grammar: &'g Grammar,
    costs: Costs,
    max_depth: usize,
}

enum Task {
    Expand { symbol: SymbolID, depth: usize },
    Close { label: NonterminalID, arity: usize },
}

impl<'g> LimitFuzzer<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            costs: compute_cost(grammar),
            max_depth: 10,
        }
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn costs(&self) -> &Costs {
        &self.costs
    }

    /// Expand `start` into a random derivation and its string.
    pub fn fuzz<R: Rng + ?Sized>(
        &self,
        start: NonterminalID,
        rng: &mut R,
    ) -> Result<(ParseTree, String), FuzzError> {
        let g = self.grammar;
        let mut tasks = vec![Task::Expand {
            symbol: SymbolID::N(start),
            depth: 0,
        }];
        let mut done: Vec<ParseTree> = vec![];

        while let Some(task) = tasks.pop() {
            match task {
                Task::Expand {
                    symbol: SymbolID::T(t),
                    ..
                } => done.push(ParseTree::leaf(SymbolID::T(t))),

                Task::Expand {
                    symbol: SymbolID::N(n),
                    depth,
                } => {
                    let cheapest = self.costs.of_nonterminal(n);
                    let candidates: Vec<_> = g
                        .rules_of(n)
                        .filter(|rule| {
                            let cost = self.costs.of_rule(rule.id());
                            if depth >= self.max_depth {
                                cost == cheapest
                            } else {
                                cost != INFINITE
                            }
                        })
                        .collect();
                    if cheapest == INFINITE || candidates.is_empty() {
                        return Err(FuzzError::Unproductive {
                            name: g.nonterminals[&n].name().to_owned(),
                        });
                    }

                    let rule = candidates[rng.gen_range(0..candidates.len())];
                    tasks.push(Task::Close {
                        label: n,
                        arity: rule.right().len(),
                    });
                    for symbol in rule.right().iter().rev() {
                        tasks.push(Task::Expand {
                            symbol: *symbol,
                            depth: depth + 1,
                        });
                    }
                }

                Task::Close { label, arity } => {
                    let children = done.split_off(done.len() - arity);
                    done.push(ParseTree::new(SymbolID::N(label), children));
                }
            }
        }

        match done.pop() {
            Some(tree) => {
                let s = tree.yield_string(g);
                Ok((tree, s))
            }
            None => unreachable!("the start symbol always closes a tree"),
        }
    }

    pub fn fuzz_string<R: Rng + ?Sized>(
        &self,
        start: NonterminalID,
        rng: &mut R,
    ) -> Result<String, FuzzError> {
        self.fuzz(start, rng).map(|(_, s)| s)
    }
}

/// Uniform sampling among the derivations of a fixed length.
#[derive(Debug)]
pub struct RandomSampler<'g> {
    grammar: &'g Grammar,
    max_length: usize,
    counts: Map<(NonterminalID, usize), u128>,
    suffixes: Map<(RuleID, usize, usize), u128>,
    visiting: Set<(NonterminalID, usize)>,
}

impl<'g> RandomSampler<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            max_length: 10,
            counts: Map::default(),
            suffixes: Map::default(),
            visiting: Set::default(),
        }
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// The number of derivations of `n` yielding exactly `len` terminals.
    ///
    /// A derivation that cycles back to `(n, len)` is not counted.
    pub fn count(&mut self, n: NonterminalID, len: usize) -> u128 {
        if let Some(count) = self.counts.get(&(n, len)) {
            return *count;
        }
        if !self.visiting.insert((n, len)) {
            return 0;
        }
        let g = self.grammar;
        let mut total: u128 = 0;
        for rule in g.rules_of(n) {
            total = total.saturating_add(self.count_suffix(rule.id(), 0, len));
        }
        self.visiting.swap_remove(&(n, len));
        self.counts.insert((n, len), total);
        total
    }

    fn count_suffix(&mut self, rule: RuleID, dot: usize, len: usize) -> u128 {
        if let Some(count) = self.suffixes.get(&(rule, dot, len)) {
            return *count;
        }
        let g = self.grammar;
        let count = match g.rules[&rule].right().get(dot).copied() {
            None => u128::from(len == 0),
            Some(SymbolID::T(_)) if len == 0 => 0,
            Some(SymbolID::T(_)) => self.count_suffix(rule, dot + 1, len - 1),
            Some(SymbolID::N(n)) => {
                let mut total: u128 = 0;
                for k in 0..=len {
                    let head = self.count(n, k);
                    if head == 0 {
                        continue;
                    }
                    let tail = self.count_suffix(rule, dot + 1, len - k);
                    total = total.saturating_add(head.saturating_mul(tail));
                }
                total
            }
        };
        // Memoized even when a cycle was cut, so sampling sees the same counts.
        self.suffixes.insert((rule, dot, len), count);
        count
    }

    /// Draw a derivation of `n` with exactly `len` terminals, or `None` if there is none.
    pub fn sample<R: Rng + ?Sized>(
        &mut self,
        n: NonterminalID,
        len: usize,
        rng: &mut R,
    ) -> Option<ParseTree> {
        let total = self.count(n, len);
        if total == 0 {
            return None;
        }
        let at = rng.gen_range(0..total);
        Some(self.tree_at(n, len, at))
    }

    /// Draw a string of a random length up to the configured maximum.
    pub fn sample_string<R: Rng + ?Sized>(
        &mut self,
        n: NonterminalID,
        rng: &mut R,
    ) -> Option<String> {
        let lengths: Vec<usize> = (0..=self.max_length)
            .filter(|len| self.count(n, *len) > 0)
            .collect();
        if lengths.is_empty() {
            return None;
        }
        let len = lengths[rng.gen_range(0..lengths.len())];
        let tree = self.sample(n, len, rng)?;
        Some(tree.yield_string(self.grammar))
    }

    /// The `at`-th derivation of `n` with `len` terminals.
    fn tree_at(&mut self, n: NonterminalID, len: usize, mut at: u128) -> ParseTree {
        let g = self.grammar;
        for rule in g.rules_of(n) {
            let count = self.count_suffix(rule.id(), 0, len);
            if at < count {
                let children = self.children_at(rule.id(), 0, len, at);
                return ParseTree::new(SymbolID::N(n), children);
            }
            at -= count;
        }
        unreachable!("derivation index out of range")
    }

    fn children_at(&mut self, rule: RuleID, dot: usize, len: usize, mut at: u128) -> Vec<ParseTree> {
        let g = self.grammar;
        match g.rules[&rule].right().get(dot).copied() {
            None => vec![],
            Some(SymbolID::T(t)) => {
                let mut children = vec![ParseTree::leaf(SymbolID::T(t))];
                children.extend(self.children_at(rule, dot + 1, len - 1, at));
                children
            }
            Some(SymbolID::N(n)) => {
                for k in 0..=len {
                    let head = self.count(n, k);
                    if head == 0 {
                        continue;
                    }
                    let tail = self.count_suffix(rule, dot + 1, len - k);
                    let count = head.saturating_mul(tail);
                    if at < count {
                        let mut children = vec![self.tree_at(n, k, at / tail)];
                        children.extend(self.children_at(rule, dot + 1, len - k, at % tail));
                        return children;
                    }
                    at -= count;
                }
                unreachable!("derivation index out of range")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn expr() -> Grammar {
        Grammar::from_str(
            r#"{
                "<E>": [["<T>", "+", "<E>"], ["<T>"]],
                "<T>": [["(", "<E>", ")"], ["1"]],
                "<U>": [["<U>", "x"]]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn costs() {
        let grammar = expr();
        let costs = compute_cost(&grammar);
        let e = grammar.nonterminal_by_name("<E>").unwrap();
        let t = grammar.nonterminal_by_name("<T>").unwrap();
        let u = grammar.nonterminal_by_name("<U>").unwrap();
        assert_eq!(costs.of_nonterminal(t), 1);
        assert_eq!(costs.of_nonterminal(e), 2);
        assert_eq!(costs.of_nonterminal(u), INFINITE);
    }

    #[test]
    fn limit_fuzzer_terminates() {
        let grammar = expr();
        let fuzzer = LimitFuzzer::new(&grammar).max_depth(4);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let (tree, s) = fuzzer.fuzz(grammar.start_symbol, &mut rng).unwrap();
            assert!(tree.conforms_to(&grammar));
            assert_eq!(tree.yield_string(&grammar), s);
            assert!(!s.is_empty());
        }

        let u = grammar.nonterminal_by_name("<U>").unwrap();
        assert!(matches!(
            fuzzer.fuzz(u, &mut rng),
            Err(FuzzError::Unproductive { .. })
        ));
    }

    #[test]
    fn sampler_counts_derivations() {
        let grammar = Grammar::from_str(r#"{"<E>": [["<E>", "+", "<E>"], ["1"]]}"#).unwrap();
        let mut sampler = RandomSampler::new(&grammar);
        let e = grammar.start_symbol;
        // Catalan numbers by operand count.
        assert_eq!(sampler.count(e, 1), 1);
        assert_eq!(sampler.count(e, 2), 0);
        assert_eq!(sampler.count(e, 3), 1);
        assert_eq!(sampler.count(e, 5), 2);
        assert_eq!(sampler.count(e, 7), 5);
        assert_eq!(sampler.count(e, 9), 14);

        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let tree = sampler.sample(e, 7, &mut rng).unwrap();
            assert!(tree.conforms_to(&grammar));
            assert_eq!(tree.yield_string(&grammar), "1+1+1+1");
            seen.insert(tree);
        }
        assert_eq!(seen.len(), 5);
        assert!(sampler.sample(e, 4, &mut rng).is_none());
    }

    #[test]
    fn sampler_cuts_epsilon_cycles() {
        let grammar = Grammar::from_str(
            r#"{
                "<S>": [["<A>", "<S>"], ["a"]],
                "<A>": [[], ["b"]]
            }"#,
        )
        .unwrap();
        let mut sampler = RandomSampler::new(&grammar).max_length(4);
        let s = grammar.start_symbol;
        assert!(sampler.count(s, 1) >= 1);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let string = sampler.sample_string(s, &mut rng).unwrap();
            assert!(string.ends_with('a'));
            assert!(string.len() <= 4);
        }
    }
}
