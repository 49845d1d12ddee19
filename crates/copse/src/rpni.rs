//! Passive learning of regular languages by state merging (RPNI).

use crate::{regular::Dfa, types::Set};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum RpniError {
    #[error("{0:?} is both a positive and a negative sample")]
    Contradictory(String),
}

/// The prefix tree acceptor of the positive samples, states in breadth-first order.
#[derive(Debug)]
struct Pta {
    accepting: Vec<bool>,
    edges: Vec<BTreeMap<char, usize>>,
}

impl Pta {
    fn build(positive: &Set<String>) -> Self {
        let mut prefixes: Vec<Vec<char>> = vec![vec![]];
        for sample in positive {
            let chars: Vec<char> = sample.chars().collect();
            for i in 1..=chars.len() {
                prefixes.push(chars[..i].to_vec());
            }
        }
        // Shorter first, then by character: the breadth-first order of the tree.
        prefixes.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        prefixes.dedup();

        let index: BTreeMap<&[char], usize> = prefixes
            .iter()
            .enumerate()
            .map(|(i, p)| (&p[..], i))
            .collect();
        let mut edges = vec![BTreeMap::new(); prefixes.len()];
        for (i, p) in prefixes.iter().enumerate().skip(1) {
            let parent = index[&p[..p.len() - 1]];
            edges[parent].insert(p[p.len() - 1], i);
        }
        let accepting = prefixes
            .iter()
            .map(|p| positive.contains(&p.iter().collect::<String>()))
            .collect();

        Self { accepting, edges }
    }

    fn len(&self) -> usize {
        self.accepting.len()
    }
}

/// A partition of the tree states into blocks named by their least member.
#[derive(Debug, Clone)]
struct Partition {
    parent: Vec<usize>,
}

impl Partition {
    fn identity(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut q: usize) -> usize {
        while self.parent[q] != q {
            self.parent[q] = self.parent[self.parent[q]];
            q = self.parent[q];
        }
        q
    }

    fn union(&mut self, a: usize, b: usize) -> bool {
        let (a, b) = (self.find(a), self.find(b));
        if a == b {
            return false;
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        self.parent[high] = low;
        true
    }

    /// Merge targets of equally labelled edges until the quotient is deterministic.
    fn fold(&mut self, pta: &Pta) {
        loop {
            let mut targets: BTreeMap<(usize, char), usize> = BTreeMap::new();
            let mut merged = false;
            for q in 0..pta.len() {
                for (ch, to) in &pta.edges[q] {
                    let from = self.find(q);
                    let to = self.find(*to);
                    match targets.get(&(from, *ch)).copied() {
                        Some(other) if other != to => {
                            self.union(other, to);
                            merged = true;
                        }
                        Some(_) => (),
                        None => {
                            targets.insert((from, *ch), to);
                        }
                    }
                }
            }
            if !merged {
                break;
            }
        }
    }

    fn quotient(&mut self, pta: &Pta) -> Dfa {
        let mut blocks: BTreeMap<usize, usize> = BTreeMap::new();
        let mut dfa = Dfa::new();
        for q in 0..pta.len() {
            let block = self.find(q);
            if !blocks.contains_key(&block) {
                let state = if block == 0 { Dfa::START } else { dfa.add_state(false) };
                blocks.insert(block, state);
            }
        }
        for q in 0..pta.len() {
            let from = blocks[&self.find(q)];
            if pta.accepting[q] {
                dfa.set_accepting(from, true);
            }
            for (ch, to) in &pta.edges[q] {
                let to = blocks[&self.find(*to)];
                dfa.add_transition(from, *ch, to);
            }
        }
        dfa
    }
}

/// Infer a DFA accepting every positive and rejecting every negative sample.
///
/// With no positive samples the result accepts nothing.
pub fn infer<P, N>(positive: P, negative: N) -> Result<Dfa, RpniError>
where
    P: IntoIterator,
    P::Item: AsRef<str>,
    N: IntoIterator,
    N::Item: AsRef<str>,
{
    let _span = tracing::trace_span!("rpni::infer").entered();
    let positive: Set<String> = positive.into_iter().map(|s| s.as_ref().to_owned()).collect();
    let negative: Set<String> = negative.into_iter().map(|s| s.as_ref().to_owned()).collect();
    if let Some(s) = positive.iter().find(|s| negative.contains(*s)) {
        return Err(RpniError::Contradictory(s.clone()));
    }

    let pta = Pta::build(&positive);
    tracing::debug!("prefix tree with {} states", pta.len());
    let mut partition = Partition::identity(pta.len());

    for i in 1..pta.len() {
        if partition.find(i) != i {
            continue;
        }
        for j in 0..i {
            if partition.find(j) != j {
                continue;
            }
            let mut candidate = partition.clone();
            candidate.union(i, j);
            candidate.fold(&pta);
            let dfa = candidate.quotient(&pta);
            if negative.iter().all(|s| !dfa.accepts(s)) {
                debug_assert!(positive.iter().all(|s| dfa.accepts(s)));
                tracing::debug!("merged state {} into {}", i, j);
                partition = candidate;
                break;
            }
        }
    }

    Ok(partition.quotient(&pta))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_tree_is_breadth_first() {
        let positive: Set<String> = ["ab", "b"].iter().map(|s| s.to_string()).collect();
        let pta = Pta::build(&positive);
        // ε, a, b, ab
        assert_eq!(pta.len(), 4);
        assert_eq!(pta.edges[0].get(&'a'), Some(&1));
        assert_eq!(pta.edges[0].get(&'b'), Some(&2));
        assert_eq!(pta.edges[1].get(&'b'), Some(&3));
        assert_eq!(pta.accepting, vec![false, false, true, true]);
    }

    #[test]
    fn learns_ends_with_b() {
        let positive = ["b", "ab", "bb", "aab", "abb", "bab"];
        let negative = ["", "a", "aa", "ba", "aba", "bba"];
        let dfa = infer(positive, negative).unwrap();
        eprintln!("{}", dfa);
        assert_eq!(dfa.states().len(), 2);
        for s in positive.iter().chain(&["aab", "bbb", "abab"]) {
            assert!(dfa.accepts(s), "{}", s);
        }
        for s in negative.iter().chain(&["aa", "bba"]) {
            assert!(!dfa.accepts(s), "{}", s);
        }
    }

    #[test]
    fn contradictory_samples() {
        let err = infer(["a", "b"], ["b"]).unwrap_err();
        assert!(matches!(err, RpniError::Contradictory(s) if s == "b"));
    }

    #[test]
    fn degenerate_samples() {
        let empty = infer(Vec::<&str>::new(), ["a"]).unwrap();
        assert!(empty.accepting().next().is_none());

        let universal = infer(["ab", "b"], Vec::<&str>::new()).unwrap();
        assert_eq!(universal.states().len(), 1);
        assert!(universal.accepts(""));
        assert!(universal.accepts("abba"));
    }
}
