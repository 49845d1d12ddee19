//! Shared packed parse forests.
//!
//! Nodes live in an arena and refer to each other by [`NodeID`], so cyclic
//! forests (grammars with cycles such as `A := A`) are represented without
//! owning pointers. Symbol and intermediate nodes are interned by their label
//! and extents; packed nodes are interned per parent by `(slot, split)`.

use crate::{
    grammar::{Grammar, NonterminalID, RuleID, SymbolID, TerminalID},
    types::Map,
    util::display_fn,
};
use std::fmt;

/// A grammar slot `X := α . β`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot {
    pub rule: RuleID,
    pub dot: usize,
}

impl Slot {
    pub const fn new(rule: RuleID, dot: usize) -> Self {
        Self { rule, dot }
    }

    /// The slot with the dot moved one symbol to the right.
    pub const fn next(self) -> Self {
        Self {
            rule: self.rule,
            dot: self.dot + 1,
        }
    }

    /// The symbol right after the dot, if any.
    pub fn next_symbol(self, g: &Grammar) -> Option<SymbolID> {
        g.rules[&self.rule].right().get(self.dot).copied()
    }

    pub fn is_finished(self, g: &Grammar) -> bool {
        self.dot >= g.rules[&self.rule].right().len()
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            let rule = &g.rules[&self.rule];
            write!(f, "{} :=", g.nonterminals[&rule.left()])?;
            for (i, symbol) in rule.right().iter().enumerate() {
                if i == self.dot {
                    f.write_str(" .")?;
                }
                write!(f, " {}", symbol.display(g))?;
            }
            if self.dot == rule.right().len() {
                f.write_str(" .")?;
            }
            Ok(())
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeID {
    raw: u32,
}

impl NodeID {
    /// The sentinel `$` standing for a missing left child.
    pub const DUMMY: Self = Self { raw: 0 };

    fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.raw)
    }
}

/// The label of a symbol node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ForestSymbol {
    T(TerminalID),
    N(NonterminalID),
    Epsilon,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
enum Label {
    Symbol(ForestSymbol),
    Intermediate(Slot),
}

#[derive(Debug, Clone)]
pub enum Node {
    Dummy,
    /// `(X, start, end)`
    Symbol {
        symbol: ForestSymbol,
        start: usize,
        end: usize,
        packed: Vec<NodeID>,
    },
    /// `(X := α . β, start, end)`
    Intermediate {
        slot: Slot,
        start: usize,
        end: usize,
        packed: Vec<NodeID>,
    },
    /// `(X := α . β, split)` with its left child possibly being the dummy node.
    Packed {
        slot: Slot,
        split: usize,
        left: NodeID,
        right: NodeID,
    },
}

#[derive(Debug, Clone)]
pub struct Forest {
    nodes: Vec<Node>,
    labels: Map<(Label, usize, usize), NodeID>,
    packed: Map<(NodeID, Slot, usize), NodeID>,
}

impl Default for Forest {
    fn default() -> Self {
        Self::new()
    }
}

impl Forest {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::Dummy],
            labels: Map::default(),
            packed: Map::default(),
        }
    }

    pub fn node(&self, id: NodeID) -> &Node {
        &self.nodes[id.index()]
    }

    /// The number of nodes, the dummy included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeID, &Node)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeID { raw: i as u32 }, node))
    }

    /// Look up the symbol node `(symbol, start, end)` if the parser created it.
    pub fn find_symbol(&self, symbol: ForestSymbol, start: usize, end: usize) -> Option<NodeID> {
        self.labels
            .get(&(Label::Symbol(symbol), start, end))
            .copied()
    }

    /// The packed children of a symbol or intermediate node.
    pub fn packed_children(&self, id: NodeID) -> &[NodeID] {
        match self.node(id) {
            Node::Symbol { packed, .. } | Node::Intermediate { packed, .. } => packed,
            _ => &[],
        }
    }

    /// The `(start, end)` extent of a symbol or intermediate node.
    pub fn extent(&self, id: NodeID) -> Option<(usize, usize)> {
        match self.node(id) {
            Node::Symbol { start, end, .. } | Node::Intermediate { start, end, .. } => {
                Some((*start, *end))
            }
            _ => None,
        }
    }

    fn intern(&mut self, label: Label, start: usize, end: usize) -> NodeID {
        if let Some(id) = self.labels.get(&(label, start, end)) {
            return *id;
        }
        let id = NodeID {
            raw: self.nodes.len() as u32,
        };
        self.nodes.push(match label {
            Label::Symbol(symbol) => Node::Symbol {
                symbol,
                start,
                end,
                packed: vec![],
            },
            Label::Intermediate(slot) => Node::Intermediate {
                slot,
                start,
                end,
                packed: vec![],
            },
        });
        self.labels.insert((label, start, end), id);
        id
    }

    /// Obtain the symbol node `(symbol, start, end)`, creating it without children if absent.
    pub fn symbol_node(&mut self, symbol: ForestSymbol, start: usize, end: usize) -> NodeID {
        self.intern(Label::Symbol(symbol), start, end)
    }

    /// `(a, i, i+1)`
    pub fn terminal_node(&mut self, t: TerminalID, i: usize) -> NodeID {
        self.intern(Label::Symbol(ForestSymbol::T(t)), i, i + 1)
    }

    /// `(ε, i, i)`
    pub fn epsilon_node(&mut self, i: usize) -> NodeID {
        self.intern(Label::Symbol(ForestSymbol::Epsilon), i, i)
    }

    /// Combine the node `w` for `α` minus its last symbol with the node `z` for
    /// that last symbol into the node for the slot `X := α . β`.
    pub fn get_node_p(&mut self, g: &Grammar, slot: Slot, w: NodeID, z: NodeID) -> NodeID {
        let rule = &g.rules[&slot.rule];
        let finished = slot.dot == rule.right().len();
        if slot.dot == 1 && !finished {
            return z;
        }

        let (split, end) = match self.extent(z) {
            Some(extent) => extent,
            None => unreachable!("the right child of a packed node must carry an extent"),
        };
        let start = if w == NodeID::DUMMY {
            split
        } else {
            match self.extent(w) {
                Some((start, _)) => start,
                None => unreachable!("the left child of a packed node must carry an extent"),
            }
        };

        let label = if finished {
            Label::Symbol(ForestSymbol::N(rule.left()))
        } else {
            Label::Intermediate(slot)
        };
        let y = self.intern(label, start, end);
        self.add_packed(y, slot, split, w, z);
        y
    }

    fn add_packed(&mut self, parent: NodeID, slot: Slot, split: usize, left: NodeID, right: NodeID) {
        if self.packed.contains_key(&(parent, slot, split)) {
            return;
        }
        let id = NodeID {
            raw: self.nodes.len() as u32,
        };
        self.nodes.push(Node::Packed {
            slot,
            split,
            left,
            right,
        });
        self.packed.insert((parent, slot, split), id);
        match &mut self.nodes[parent.index()] {
            Node::Symbol { packed, .. } | Node::Intermediate { packed, .. } => packed.push(id),
            _ => unreachable!("packed nodes hang off symbol or intermediate nodes only"),
        }
    }

    pub fn display_node<'a>(&'a self, g: &'a Grammar, id: NodeID) -> impl fmt::Display + 'a {
        display_fn(move |f| match self.node(id) {
            Node::Dummy => f.write_str("$"),
            Node::Symbol {
                symbol, start, end, ..
            } => {
                match symbol {
                    ForestSymbol::T(t) => write!(f, "({}", g.terminals[t])?,
                    ForestSymbol::N(n) => write!(f, "({}", g.nonterminals[n])?,
                    ForestSymbol::Epsilon => f.write_str("(ε")?,
                }
                write!(f, ", {}, {})", start, end)
            }
            Node::Intermediate {
                slot, start, end, ..
            } => write!(f, "({}, {}, {})", slot.display(g), start, end),
            Node::Packed { slot, split, .. } => write!(f, "({}, {})", slot.display(g), split),
        })
    }

    /// Dump every node with its packed children.
    pub fn display<'a>(&'a self, g: &'a Grammar) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            for (id, node) in self.nodes() {
                match node {
                    Node::Symbol { packed, .. } | Node::Intermediate { packed, .. } => {
                        writeln!(f, "{} {}", id, self.display_node(g, id))?;
                        for p in packed {
                            if let Node::Packed { left, right, .. } = self.node(*p) {
                                write!(f, "  - {}:", self.display_node(g, *p))?;
                                if *left != NodeID::DUMMY {
                                    write!(f, " {}", left)?;
                                }
                                writeln!(f, " {}", right)?;
                            }
                        }
                    }
                    _ => (),
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_node_p_builds_binarized_nodes() {
        let g = Grammar::from_str(r#"{"<S>": [["a", "b", "c"], ["a"]]}"#).unwrap();
        let s = g.start_symbol;
        let rules: Vec<_> = g.rules_of(s).map(|r| r.id()).collect();
        let (a, b, c) = (
            g.terminal_of('a').unwrap(),
            g.terminal_of('b').unwrap(),
            g.terminal_of('c').unwrap(),
        );

        let mut forest = Forest::new();
        let ta = forest.terminal_node(a, 0);
        let tb = forest.terminal_node(b, 1);
        let tc = forest.terminal_node(c, 2);

        // S := a . b c returns the terminal node itself.
        let w1 = forest.get_node_p(&g, Slot::new(rules[0], 1), NodeID::DUMMY, ta);
        assert_eq!(w1, ta);

        let w2 = forest.get_node_p(&g, Slot::new(rules[0], 2), w1, tb);
        assert!(matches!(forest.node(w2), Node::Intermediate { start: 0, end: 2, .. }));

        let root = forest.get_node_p(&g, Slot::new(rules[0], 3), w2, tc);
        assert_eq!(forest.find_symbol(ForestSymbol::N(s), 0, 3), Some(root));
        assert_eq!(forest.packed_children(root).len(), 1);

        // re-adding the same derivation is a no-op
        let again = forest.get_node_p(&g, Slot::new(rules[0], 3), w2, tc);
        assert_eq!(again, root);
        assert_eq!(forest.packed_children(root).len(), 1);

        // a one-symbol rule wraps its child in a symbol node
        let short = forest.get_node_p(&g, Slot::new(rules[1], 1), NodeID::DUMMY, ta);
        assert_eq!(forest.find_symbol(ForestSymbol::N(s), 0, 1), Some(short));
        eprintln!("{}", forest.display(&g));
    }

    #[test]
    fn epsilon_rule_spans_nothing() {
        let g = Grammar::from_str(r#"{"<A>": [[]]}"#).unwrap();
        let rule = g.rules_of(g.start_symbol).next().unwrap().id();
        let mut forest = Forest::new();
        let eps = forest.epsilon_node(3);
        let y = forest.get_node_p(&g, Slot::new(rule, 0), NodeID::DUMMY, eps);
        assert_eq!(forest.extent(y), Some((3, 3)));
        assert!(matches!(
            forest.node(forest.packed_children(y)[0]),
            Node::Packed { left: NodeID::DUMMY, split: 3, .. }
        ));
    }
}
