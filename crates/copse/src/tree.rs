//! Parse trees and their extraction from a parse forest.

use crate::{
    grammar::{Grammar, SymbolID},
    sppf::{Forest, ForestSymbol, Node, NodeID},
    util::display_fn,
};
use rand::Rng;
use std::{borrow::Borrow, fmt};

/// An ordered derivation tree. Leaves are terminals, inner nodes nonterminals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParseTree {
    pub label: SymbolID,
    pub children: Vec<ParseTree>,
}

impl ParseTree {
    pub fn new(label: SymbolID, children: Vec<ParseTree>) -> Self {
        Self { label, children }
    }

    pub fn leaf(label: SymbolID) -> Self {
        Self::new(label, vec![])
    }

    /// The string of terminals at the leaves, left to right.
    pub fn yield_string(&self, g: &Grammar) -> String {
        let mut out = String::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if let SymbolID::T(t) = node.label {
                out.extend(g.terminals[&t].char());
            }
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Tell whether every inner node expands by a rule of `g` and every terminal is a leaf.
    pub fn conforms_to(&self, g: &Grammar) -> bool {
        match self.label {
            SymbolID::T(_) => self.children.is_empty(),
            SymbolID::N(n) => {
                let labels: Vec<SymbolID> = self.children.iter().map(|c| c.label).collect();
                g.rules_of(n).any(|rule| rule.right() == &labels[..])
                    && self.children.iter().all(|c| c.conforms_to(g))
            }
        }
    }

    /// `(<S>, [(<A>, [('a', [])])])`
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            write!(f, "({}, [", self.label.display(g))?;
            for (i, child) in self.children.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", child.display(g))?;
            }
            f.write_str("])")
        })
    }
}

/// Picks one packed child of an ambiguous node.
pub trait Chooser {
    /// Return the index into `packed` to try first.
    fn choose(&mut self, forest: &Forest, packed: &[NodeID]) -> usize;
}

/// Always tries the first derivation found by the parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstChooser;

impl Chooser for FirstChooser {
    fn choose(&mut self, _: &Forest, _: &[NodeID]) -> usize {
        0
    }
}

/// Picks uniformly among the packed children.
#[derive(Debug)]
pub struct RandomChooser<R> {
    rng: R,
}

impl<R: Rng> RandomChooser<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> Chooser for RandomChooser<R> {
    fn choose(&mut self, _: &Forest, packed: &[NodeID]) -> usize {
        self.rng.gen_range(0..packed.len())
    }
}

/// The order in which packed children are tried.
trait Strategy {
    fn candidates(&mut self, forest: &Forest, packed: &[NodeID]) -> Vec<NodeID>;
}

/// Try the chooser's pick first, then the rest in order.
struct Backtrack<C>(C);

impl<C: Chooser> Strategy for Backtrack<C> {
    fn candidates(&mut self, forest: &Forest, packed: &[NodeID]) -> Vec<NodeID> {
        if packed.is_empty() {
            return vec![];
        }
        let first = self.0.choose(forest, packed) % packed.len();
        packed[first..].iter().chain(&packed[..first]).copied().collect()
    }
}

/// Replay a recorded sequence of choices, extending it with zeros.
struct Odometer<'a> {
    choices: &'a mut Vec<(usize, usize)>,
    cursor: usize,
}

impl Strategy for Odometer<'_> {
    fn candidates(&mut self, _: &Forest, packed: &[NodeID]) -> Vec<NodeID> {
        if packed.is_empty() {
            return vec![];
        }
        if self.cursor == self.choices.len() {
            self.choices.push((0, packed.len()));
        }
        let (chosen, _) = self.choices[self.cursor];
        self.cursor += 1;
        packed.get(chosen).copied().into_iter().collect()
    }
}

/// Flattens binarized derivations into trees, refusing to revisit an ancestor.
struct Builder<'f, S> {
    forest: &'f Forest,
    strategy: S,
    path: Vec<NodeID>,
}

impl<S: Strategy> Builder<'_, S> {
    fn tree(&mut self, id: NodeID) -> Option<ParseTree> {
        let forest = self.forest;
        match forest.node(id) {
            Node::Symbol {
                symbol: ForestSymbol::T(t),
                ..
            } => Some(ParseTree::leaf(SymbolID::T(*t))),

            Node::Symbol {
                symbol: ForestSymbol::N(n),
                packed,
                ..
            } => {
                if self.path.contains(&id) {
                    return None;
                }
                self.path.push(id);
                let mut result = None;
                for p in self.strategy.candidates(forest, packed) {
                    let mut children = vec![];
                    if self.packed(p, &mut children) {
                        result = Some(ParseTree::new(SymbolID::N(*n), children));
                        break;
                    }
                }
                self.path.pop();
                result
            }

            _ => None,
        }
    }

    fn packed(&mut self, id: NodeID, out: &mut Vec<ParseTree>) -> bool {
        match self.forest.node(id) {
            Node::Packed { left, right, .. } => {
                let (left, right) = (*left, *right);
                self.flatten(left, out) && self.flatten(right, out)
            }
            _ => false,
        }
    }

    fn flatten(&mut self, id: NodeID, out: &mut Vec<ParseTree>) -> bool {
        let forest = self.forest;
        match forest.node(id) {
            Node::Dummy
            | Node::Symbol {
                symbol: ForestSymbol::Epsilon,
                ..
            } => true,

            Node::Symbol { .. } => match self.tree(id) {
                Some(tree) => {
                    out.push(tree);
                    true
                }
                None => false,
            },

            Node::Intermediate { packed, .. } => {
                if self.path.contains(&id) {
                    return false;
                }
                self.path.push(id);
                let mark = out.len();
                let mut ok = false;
                for p in self.strategy.candidates(forest, packed) {
                    if self.packed(p, out) {
                        ok = true;
                        break;
                    }
                    out.truncate(mark);
                }
                self.path.pop();
                ok
            }

            Node::Packed { .. } => false,
        }
    }
}

/// Enumerates every acyclic derivation under a root, one per call to `next`.
#[derive(Debug)]
pub struct Trees<F> {
    forest: F,
    root: NodeID,
    choices: Vec<(usize, usize)>,
    done: bool,
}

impl<F: Borrow<Forest>> Trees<F> {
    pub fn new(forest: F, root: NodeID) -> Self {
        Self {
            forest,
            root,
            choices: vec![],
            done: false,
        }
    }

    fn advance(&mut self) {
        while let Some((chosen, total)) = self.choices.last_mut() {
            if *chosen + 1 < *total {
                *chosen += 1;
                return;
            }
            self.choices.pop();
        }
        self.done = true;
    }
}

impl<F: Borrow<Forest>> Iterator for Trees<F> {
    type Item = ParseTree;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let mut builder = Builder {
                forest: self.forest.borrow(),
                strategy: Odometer {
                    choices: &mut self.choices,
                    cursor: 0,
                },
                path: vec![],
            };
            let tree = builder.tree(self.root);
            let consumed = builder.strategy.cursor;
            self.choices.truncate(consumed);
            self.advance();
            if tree.is_some() {
                return tree;
            }
        }
        None
    }
}

/// The forest built by a general parser together with its root `(S, 0, n)`.
#[derive(Debug, Clone)]
pub struct ParseForest {
    forest: Forest,
    root: NodeID,
}

impl ParseForest {
    pub fn new(forest: Forest, root: NodeID) -> Self {
        Self { forest, root }
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn root(&self) -> NodeID {
        self.root
    }

    pub fn trees(&self) -> Trees<&Forest> {
        Trees::new(&self.forest, self.root)
    }

    pub fn into_trees(self) -> Trees<Forest> {
        Trees::new(self.forest, self.root)
    }

    /// Extract one derivation, asking `chooser` at every ambiguous node.
    pub fn tree_with<C: Chooser>(&self, chooser: C) -> Option<ParseTree> {
        Builder {
            forest: &self.forest,
            strategy: Backtrack(chooser),
            path: vec![],
        }
        .tree(self.root)
    }

    pub fn tree(&self) -> Option<ParseTree> {
        self.tree_with(FirstChooser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{grammar::NonterminalID, sppf::Slot};
    use rand::{rngs::StdRng, SeedableRng};

    /// Hand-built forest of `<E> := <E> + <E> | 1` over "1+1+1".
    fn ambiguous_forest() -> (Grammar, ParseForest) {
        let g = Grammar::from_str(r#"{"<E>": [["<E>", "+", "<E>"], ["1"]]}"#).unwrap();
        let e: NonterminalID = g.start_symbol;
        let rules: Vec<_> = g.rules_of(e).map(|r| r.id()).collect();
        let (plus, one) = (g.terminal_of('+').unwrap(), g.terminal_of('1').unwrap());

        let mut forest = Forest::new();
        let atom = |forest: &mut Forest, i| {
            let t = forest.terminal_node(one, i);
            forest.get_node_p(&g, Slot::new(rules[1], 1), NodeID::DUMMY, t)
        };
        let e0 = atom(&mut forest, 0);
        let e2 = atom(&mut forest, 2);
        let e4 = atom(&mut forest, 4);
        let p1 = forest.terminal_node(plus, 1);
        let p3 = forest.terminal_node(plus, 3);

        let binary = |forest: &mut Forest, l, p, r| {
            let w = forest.get_node_p(&g, Slot::new(rules[0], 1), NodeID::DUMMY, l);
            let w = forest.get_node_p(&g, Slot::new(rules[0], 2), w, p);
            forest.get_node_p(&g, Slot::new(rules[0], 3), w, r)
        };
        let e02 = binary(&mut forest, e0, p1, e2);
        let e24 = binary(&mut forest, e2, p3, e4);
        let root = binary(&mut forest, e02, p3, e4);
        let root2 = binary(&mut forest, e0, p1, e24);
        assert_eq!(root, root2);

        (g, ParseForest::new(forest, root))
    }

    #[test]
    fn enumerates_both_associations() {
        let (g, forest) = ambiguous_forest();
        let trees: Vec<_> = forest.trees().collect();
        for tree in &trees {
            eprintln!("{}", tree.display(&g));
            assert_eq!(tree.yield_string(&g), "1+1+1");
            assert!(tree.conforms_to(&g));
        }
        assert_eq!(trees.len(), 2);
        assert_ne!(trees[0], trees[1]);
    }

    #[test]
    fn random_chooser_yields_a_valid_tree() {
        let (g, forest) = ambiguous_forest();
        let chooser = RandomChooser::new(StdRng::seed_from_u64(7));
        let tree = forest.tree_with(chooser).unwrap();
        assert_eq!(tree.yield_string(&g), "1+1+1");
        assert!(forest.tree().unwrap().conforms_to(&g));
    }

    #[test]
    fn cyclic_derivations_are_skipped() {
        // <A> := <A> | a over "a": the forest has a loop on (A, 0, 1)
        let g = Grammar::from_str(r#"{"<A>": [["<A>"], ["a"]]}"#).unwrap();
        let a = g.start_symbol;
        let rules: Vec<_> = g.rules_of(a).map(|r| r.id()).collect();
        let mut forest = Forest::new();
        let t = forest.terminal_node(g.terminal_of('a').unwrap(), 0);
        let node = forest.get_node_p(&g, Slot::new(rules[1], 1), NodeID::DUMMY, t);
        let again = forest.get_node_p(&g, Slot::new(rules[0], 1), NodeID::DUMMY, node);
        assert_eq!(node, again);

        let forest = ParseForest::new(forest, node);
        let trees: Vec<_> = forest.trees().collect();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].display(&g).to_string(), "(<A>, [('a', [])])");
    }
}
