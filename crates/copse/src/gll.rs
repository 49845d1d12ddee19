//! GLL parser over a graph-structured stack.
//!
//! The grammar stays as data: a descriptor resumes at a grammar slot, and the
//! slot's next symbol decides whether to match a terminal, call a nonterminal
//! or return.

use crate::{
    grammar::{Grammar, NonterminalID, SymbolID, TerminalID},
    parser::{tokenize, ParseError, Parser, Parses},
    sppf::{Forest, ForestSymbol, NodeID, Slot},
    tree::ParseForest,
    types::{Map, Set},
};
use std::{collections::VecDeque, fmt};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct GssNodeID {
    raw: u32,
}

impl GssNodeID {
    /// The bottom-of-stack sentinel `(L0, 0)`.
    pub const BOTTOM: Self = Self { raw: 0 };

    fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Display for GssNodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.raw)
    }
}

#[derive(Debug)]
pub struct GssNode {
    /// The return slot, `None` for the bottom.
    pub slot: Option<Slot>,
    pub index: usize,
    edges: Vec<(GssNodeID, NodeID)>,
    edge_set: Set<(GssNodeID, NodeID)>,
    /// The forest nodes this GSS node has been popped with.
    popped: Vec<NodeID>,
}

impl GssNode {
    pub fn edges(&self) -> &[(GssNodeID, NodeID)] {
        &self.edges
    }

    pub fn popped(&self) -> &[NodeID] {
        &self.popped
    }
}

#[derive(Debug)]
pub struct Gss {
    nodes: Vec<GssNode>,
    index: Map<(Option<Slot>, usize), GssNodeID>,
}

impl Default for Gss {
    fn default() -> Self {
        Self::new()
    }
}

impl Gss {
    pub fn new() -> Self {
        let mut gss = Self {
            nodes: vec![],
            index: Default::default(),
        };
        gss.intern(None, 0);
        gss
    }

    fn intern(&mut self, slot: Option<Slot>, index: usize) -> GssNodeID {
        if let Some(id) = self.index.get(&(slot, index)) {
            return *id;
        }
        let id = GssNodeID {
            raw: self.nodes.len() as u32,
        };
        self.nodes.push(GssNode {
            slot,
            index,
            edges: vec![],
            edge_set: Set::default(),
            popped: vec![],
        });
        self.index.insert((slot, index), id);
        id
    }

    pub fn node(&self, id: GssNodeID) -> &GssNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// `(L, u, i, w)`: resume at slot `L` with stack top `u` at input index `i`, holding forest node `w`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct Descriptor {
    slot: Slot,
    u: GssNodeID,
    i: usize,
    w: NodeID,
}

#[derive(Debug)]
pub struct GLLParser<'g> {
    grammar: &'g Grammar,
}

impl<'g> GLLParser<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self { grammar }
    }

    /// Parse `input` into its shared packed parse forest.
    pub fn forest_on(&self, input: &str, start: NonterminalID) -> Result<ParseForest, ParseError> {
        let _span = tracing::trace_span!("GLLParser::forest_on").entered();
        if !self.grammar.nonterminals.contains_key(&start) {
            return Err(ParseError::UnknownStart);
        }
        let mut run = Run::new(self.grammar, input);
        run.run(start);
        tracing::debug!(
            "{} descriptors, {} GSS nodes, {} forest nodes",
            run.processed,
            run.gss.len(),
            run.forest.len()
        );

        let m = run.tokens.len();
        match run.forest.find_symbol(ForestSymbol::N(start), 0, m) {
            Some(root) => Ok(ParseForest::new(run.forest, root)),
            None => Err(ParseError::SyntaxError {
                position: run.furthest,
            }),
        }
    }
}

impl Parser for GLLParser<'_> {
    fn grammar(&self) -> &Grammar {
        self.grammar
    }

    fn recognize_on(&self, input: &str, start: NonterminalID) -> bool {
        self.forest_on(input, start).is_ok()
    }

    fn parse_on(&self, input: &str, start: NonterminalID) -> Result<Parses, ParseError> {
        let forest = self.forest_on(input, start)?;
        Ok(Parses::Forest(forest.into_trees()))
    }
}

struct Run<'g> {
    grammar: &'g Grammar,
    tokens: Vec<Option<TerminalID>>,
    /// `U[i]`: the descriptors ever added at index `i`.
    added: Vec<Set<(Slot, GssNodeID, NodeID)>>,
    /// `R`: the pending descriptors.
    pending: VecDeque<Descriptor>,
    gss: Gss,
    forest: Forest,
    furthest: usize,
    processed: usize,
}

impl<'g> Run<'g> {
    fn new(grammar: &'g Grammar, input: &str) -> Self {
        let tokens = tokenize(grammar, input);
        let added = (0..=tokens.len()).map(|_| Set::default()).collect();
        Self {
            grammar,
            tokens,
            added,
            pending: VecDeque::new(),
            gss: Gss::new(),
            forest: Forest::new(),
            furthest: 0,
            processed: 0,
        }
    }

    fn run(&mut self, start: NonterminalID) {
        let g = self.grammar;
        for rule in g.rules_of(start) {
            self.add(Slot::new(rule.id(), 0), GssNodeID::BOTTOM, 0, NodeID::DUMMY);
        }

        // L0: dispatch until R is exhausted.
        while let Some(descriptor) = self.pending.pop_front() {
            self.processed += 1;
            self.resume(descriptor);
        }
    }

    fn resume(&mut self, Descriptor { slot, u, i, w }: Descriptor) {
        let g = self.grammar;
        let (mut slot, mut i, mut w) = (slot, i, w);
        self.furthest = self.furthest.max(i);

        if slot.dot == 0 && slot.is_finished(g) {
            let eps = self.forest.epsilon_node(i);
            w = self.forest.get_node_p(g, slot, NodeID::DUMMY, eps);
        }

        loop {
            match slot.next_symbol(g) {
                Some(SymbolID::T(a)) => {
                    if self.tokens.get(i).copied().flatten() != Some(a) {
                        return;
                    }
                    let z = self.forest.terminal_node(a, i);
                    i += 1;
                    slot = slot.next();
                    w = self.forest.get_node_p(g, slot, w, z);
                    self.furthest = self.furthest.max(i);
                }
                Some(SymbolID::N(b)) => {
                    let v = self.create(slot.next(), u, i, w);
                    for rule in g.rules_of(b) {
                        self.add(Slot::new(rule.id(), 0), v, i, NodeID::DUMMY);
                    }
                    return;
                }
                None => {
                    self.pop(u, i, w);
                    return;
                }
            }
        }
    }

    fn add(&mut self, slot: Slot, u: GssNodeID, i: usize, w: NodeID) {
        if self.added[i].insert((slot, u, w)) {
            tracing::trace!("add ({}, {}, {}, {})", slot.display(self.grammar), u, i, w);
            self.pending.push_back(Descriptor { slot, u, i, w });
        }
    }

    fn create(&mut self, slot: Slot, u: GssNodeID, i: usize, w: NodeID) -> GssNodeID {
        let g = self.grammar;
        let v = self.gss.intern(Some(slot), i);
        let node = &mut self.gss.nodes[v.index()];
        if node.edge_set.insert((u, w)) {
            node.edges.push((u, w));
            let popped = node.popped.clone();
            for z in popped {
                let y = self.forest.get_node_p(g, slot, w, z);
                match self.forest.extent(z) {
                    Some((_, j)) => self.add(slot, u, j, y),
                    None => unreachable!("popped forest nodes carry an extent"),
                }
            }
        }
        v
    }

    fn pop(&mut self, u: GssNodeID, i: usize, z: NodeID) {
        if u == GssNodeID::BOTTOM {
            return;
        }
        let g = self.grammar;
        let node = &mut self.gss.nodes[u.index()];
        if node.popped.contains(&z) {
            return;
        }
        node.popped.push(z);
        let slot = match node.slot {
            Some(slot) => slot,
            None => unreachable!("only the bottom has no return slot"),
        };
        let edges = node.edges.clone();
        for (v, w) in edges {
            let y = self.forest.get_node_p(g, slot, w, z);
            self.add(slot, v, i, y);
        }
    }
}
