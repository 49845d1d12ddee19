//! The canonical collection of LR item sets.

use crate::{
    analysis::FirstSets,
    grammar::{Grammar, RuleID, SymbolID, TerminalID},
    sppf::Slot,
    types::{Map, Set, TerminalSet},
    util::display_fn,
};
use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt,
};

/// How item sets reached through the same LR(0) cores are identified.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum MergeMode {
    /// Items carry no lookaheads; states are identified by their cores alone.
    Core,

    /// Items are compatible in the sense of DeRemer's LALR(1) method, that is,
    /// each item sets have the same LR(0) cores and their lookaheads are merged.
    LALR,

    /// Items are equivalent in the sense of Knuth's canonical LR(1) method,
    /// that is, each item sets have the same LR(0) cores and their lookahead
    /// symbols are also equal.
    Canonical,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StateID {
    raw: u32,
}

impl StateID {
    pub const START: Self = Self::new(0);

    const fn new(raw: u32) -> Self {
        Self { raw }
    }

    pub fn index(self) -> usize {
        self.raw as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self::new(index as u32)
    }
}

impl fmt::Display for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.raw)
    }
}

/// An LR item set: core items paired with their lookaheads.
///
/// Ordered by core so that two sets with the same cores line up item by item.
pub type ItemSet = BTreeMap<Slot, TerminalSet>;
type ItemCores = BTreeSet<Slot>;

#[derive(Debug)]
pub struct State {
    items: ItemSet,
    transitions: Map<SymbolID, StateID>,
}

impl State {
    pub fn items(&self) -> impl Iterator<Item = (Slot, &TerminalSet)> + '_ {
        self.items.iter().map(|(slot, la)| (*slot, la))
    }

    pub fn transitions(&self) -> impl Iterator<Item = (SymbolID, StateID)> + '_ {
        self.transitions.iter().map(|(symbol, to)| (*symbol, *to))
    }

    pub fn goto(&self, symbol: SymbolID) -> Option<StateID> {
        self.transitions.get(&symbol).copied()
    }
}

#[derive(Debug)]
pub struct Automaton {
    states: Map<StateID, State>,
    with_lookaheads: bool,
}

impl Automaton {
    pub(crate) fn generate(grammar: &Grammar, first_sets: &FirstSets, mode: MergeMode) -> Self {
        let _span = tracing::trace_span!("Automaton::generate", ?mode).entered();
        let mut gen = AutomatonGenerator::new(grammar, first_sets, mode);
        gen.populate_states();
        let automaton = gen.finalize();
        tracing::debug!("generated {} states ({:?})", automaton.len(), mode);
        automaton
    }

    pub fn states(&self) -> impl Iterator<Item = (StateID, &State)> + '_ {
        self.states.iter().map(|(id, state)| (*id, state))
    }

    pub fn state(&self, id: StateID) -> &State {
        &self.states[&id]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (i, (id, state)) in self.states().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### State {}", id)?;
                writeln!(f, "## item_sets")?;
                for (slot, lookaheads) in state.items() {
                    write!(f, "- ({})", slot.display(g))?;
                    if self.with_lookaheads {
                        f.write_str("  [")?;
                        for (i, t) in lookaheads.iter().enumerate() {
                            if i > 0 {
                                f.write_str(" ")?;
                            }
                            write!(f, "{}", g.terminals[&t])?;
                        }
                        f.write_str("]")?;
                    }
                    writeln!(f)?;
                }
                writeln!(f, "## transitions")?;
                for (symbol, to) in state.transitions() {
                    writeln!(f, "- {} => {}", symbol.display(g), to)?;
                }
            }
            Ok(())
        })
    }
}

/// Closure and goto over item sets.
#[derive(Debug)]
pub struct ItemSetBuilder<'g> {
    grammar: &'g Grammar,
    first_sets: &'g FirstSets,
    with_lookaheads: bool,
}

impl<'g> ItemSetBuilder<'g> {
    pub fn new(grammar: &'g Grammar, first_sets: &'g FirstSets, with_lookaheads: bool) -> Self {
        Self {
            grammar,
            first_sets,
            with_lookaheads,
        }
    }

    /// The item set `{ $start := . S }`, seeded with `$` when lookaheads are tracked.
    pub fn initial(&self) -> ItemSet {
        let mut items = ItemSet::new();
        let lookaheads = if self.with_lookaheads {
            Some(TerminalID::EOI).into_iter().collect()
        } else {
            TerminalSet::new()
        };
        items.insert(Slot::new(RuleID::ACCEPT, 0), lookaheads);
        self.closure(&mut items);
        items
    }

    /// Expand `items` in place until it is closed.
    pub fn closure(&self, items: &mut ItemSet) {
        let mut changed = true;
        while changed {
            changed = false;

            let mut added: Map<Slot, TerminalSet> = Map::default();
            for (slot, lookaheads) in &*items {
                let rule = &self.grammar.rules[&slot.rule];

                // [X -> ... . Y beta]
                let (y, beta) = match &rule.right()[slot.dot..] {
                    [SymbolID::N(y), beta @ ..] => (*y, beta),
                    _ => continue,
                };

                // First(beta x1) ∪ ... ∪ First(beta xk) for the lookaheads {x1, ..., xk}
                let x = if self.with_lookaheads {
                    self.first_sets.lookaheads(beta, lookaheads)
                } else {
                    TerminalSet::new()
                };
                for rule in self.grammar.rules_of(y) {
                    added
                        .entry(Slot::new(rule.id(), 0))
                        .or_default()
                        .union_with(&x);
                }
            }

            for (slot, lookaheads) in added {
                let current = items.entry(slot).or_insert_with(|| {
                    changed = true;
                    TerminalSet::new()
                });
                changed |= current.union_with(&lookaheads);
            }
        }
    }

    /// The kernels of every goto target, keyed by the transition symbol.
    pub fn transitions(&self, items: &ItemSet) -> Map<SymbolID, ItemSet> {
        let mut kernels: Map<SymbolID, ItemSet> = Map::default();
        for (slot, lookaheads) in items {
            if let Some(symbol) = slot.next_symbol(self.grammar) {
                kernels
                    .entry(symbol)
                    .or_default()
                    .insert(slot.next(), lookaheads.clone());
            }
        }
        kernels
    }

    /// `goto(items, symbol)`: the closure of the items advanced over `symbol`.
    pub fn goto(&self, items: &ItemSet, symbol: SymbolID) -> ItemSet {
        let mut target: ItemSet = items
            .iter()
            .filter(|(slot, _)| slot.next_symbol(self.grammar) == Some(symbol))
            .map(|(slot, lookaheads)| (slot.next(), lookaheads.clone()))
            .collect();
        self.closure(&mut target);
        target
    }
}

#[derive(Debug)]
struct PendingStates {
    next_id: u32,
    queue: VecDeque<(StateID, ItemSet, Option<StateID>)>,
}

impl PendingStates {
    /// Push an item set into the queue, and obtain its provisional ID.
    fn enqueue(&mut self, items: ItemSet, prev: Option<StateID>) -> StateID {
        let id = StateID::new(self.next_id);
        self.next_id += 1;
        self.queue.push_back((id, items, prev));
        id
    }

    fn dequeue(&mut self) -> Option<(StateID, ItemSet, Option<StateID>)> {
        self.queue.pop_front()
    }
}

#[derive(Debug)]
struct AutomatonGenerator<'g> {
    builder: ItemSetBuilder<'g>,
    mode: MergeMode,
    pending: PendingStates,
    states: Map<StateID, (ItemSet, Map<SymbolID, StateID>)>,
    same_cores: Map<ItemCores, Set<StateID>>,
}

impl<'g> AutomatonGenerator<'g> {
    fn new(grammar: &'g Grammar, first_sets: &'g FirstSets, mode: MergeMode) -> Self {
        let builder = ItemSetBuilder::new(grammar, first_sets, mode != MergeMode::Core);
        let mut pending = PendingStates {
            next_id: 0,
            queue: VecDeque::new(),
        };
        pending.enqueue(builder.initial(), None);
        Self {
            builder,
            mode,
            pending,
            states: Map::default(),
            same_cores: Map::default(),
        }
    }

    fn populate_states(&mut self) {
        'dequeue: while let Some((new_id, mut new_items, prev)) = self.pending.dequeue() {
            self.builder.closure(&mut new_items);
            let cores: ItemCores = new_items.keys().copied().collect();

            if let Some(same_cores) = self.same_cores.get(&cores) {
                for &orig_id in same_cores {
                    let orig = &mut self.states[&orig_id];
                    match compare_item_sets(self.mode, &orig.0, &new_items) {
                        ItemSetDiff::Same => (),

                        ItemSetDiff::Compatible => {
                            let mut modified = false;
                            for (slot, lookaheads) in &new_items {
                                if let Some(current) = orig.0.get_mut(slot) {
                                    modified |= current.union_with(lookaheads);
                                }
                            }

                            // Propagate the new lookaheads to the successors.
                            if modified {
                                for (symbol, kernel) in self.builder.transitions(&new_items) {
                                    let id = self.pending.enqueue(kernel, Some(orig_id));
                                    orig.1.insert(symbol, id);
                                }
                            }
                        }

                        ItemSetDiff::Different => continue,
                    }

                    // The provisional ID is already registered as an edge of the previous state.
                    if let Some(prev) = prev {
                        for edge in self.states[&prev].1.values_mut() {
                            if *edge == new_id {
                                *edge = orig_id;
                            }
                        }
                    }

                    continue 'dequeue;
                }
            }

            tracing::trace!("new state {} with {} items", new_id, new_items.len());
            let mut edges = Map::default();
            for (symbol, kernel) in self.builder.transitions(&new_items) {
                let id = self.pending.enqueue(kernel, Some(new_id));
                edges.insert(symbol, id);
            }
            self.states.insert(new_id, (new_items, edges));
            self.same_cores.entry(cores).or_default().insert(new_id);
        }
    }

    fn finalize(self) -> Automaton {
        // Merged states leave holes in the provisional IDs.
        let renumbered: Map<StateID, StateID> = self
            .states
            .keys()
            .enumerate()
            .map(|(i, orig)| (*orig, StateID::new(i as u32)))
            .collect();

        let states = self
            .states
            .into_iter()
            .map(|(orig, (items, edges))| {
                let transitions = edges
                    .into_iter()
                    .map(|(symbol, to)| (symbol, renumbered[&to]))
                    .collect();
                (renumbered[&orig], State { items, transitions })
            })
            .collect();

        Automaton {
            states,
            with_lookaheads: self.mode != MergeMode::Core,
        }
    }
}

enum ItemSetDiff {
    Same,
    Compatible,
    Different,
}

fn compare_item_sets(mode: MergeMode, left: &ItemSet, right: &ItemSet) -> ItemSetDiff {
    // `left` and `right` have the same LR(0) cores.
    match mode {
        MergeMode::Core => ItemSetDiff::Same,
        MergeMode::LALR => {
            let covered = left
                .values()
                .zip(right.values())
                .all(|(l, r)| l.is_superset(r));
            if covered {
                ItemSetDiff::Same
            } else {
                ItemSetDiff::Compatible
            }
        }
        MergeMode::Canonical => {
            if left.values().eq(right.values()) {
                ItemSetDiff::Same
            } else {
                ItemSetDiff::Different
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr_grammar() -> Grammar {
        Grammar::from_str(
            r#"{
                "<E>": [["<E>", "+", "<T>"], ["<T>"]],
                "<T>": [["<T>", "*", "<F>"], ["<F>"]],
                "<F>": [["(", "<E>", ")"], ["1"]]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn smoketest() {
        let grammar = expr_grammar();
        let first_sets = FirstSets::new(&grammar);
        let lr0 = Automaton::generate(&grammar, &first_sets, MergeMode::Core);
        eprintln!("LR(0):\n---\n{}", lr0.display(&grammar));
        // the dragon book's canonical LR(0) collection for this grammar
        assert_eq!(lr0.len(), 12);

        let lalr = Automaton::generate(&grammar, &first_sets, MergeMode::LALR);
        assert_eq!(lalr.len(), 12);

        let lr1 = Automaton::generate(&grammar, &first_sets, MergeMode::Canonical);
        eprintln!("LR(1):\n---\n{}", lr1.display(&grammar));
        assert!(lr1.len() > lalr.len());
    }

    #[test]
    fn closure_propagates_lookaheads() {
        let grammar = Grammar::from_str(
            r#"{
                "<S>": [["<C>", "<C>"]],
                "<C>": [["c", "<C>"], ["d"]]
            }"#,
        )
        .unwrap();
        let first_sets = FirstSets::new(&grammar);
        let builder = ItemSetBuilder::new(&grammar, &first_sets, true);
        let initial = builder.initial();
        // $start := . S, S := . C C, C := . c C, C := . d
        assert_eq!(initial.len(), 4);

        let c = grammar.nonterminal_by_name("<C>").unwrap();
        let d = grammar.terminal_of('d').unwrap();
        for (slot, lookaheads) in &initial {
            if grammar.rules[&slot.rule].left() == c {
                let names: Vec<_> = lookaheads.iter().map(|t| g_name(&grammar, t)).collect();
                assert_eq!(names.len(), 2, "{:?}", names);
                assert!(lookaheads.contains(d));
            }
        }

        let after_c = builder.goto(&initial, SymbolID::N(c));
        for (slot, lookaheads) in &after_c {
            if grammar.rules[&slot.rule].left() == c {
                assert_eq!(lookaheads.iter().collect::<Vec<_>>(), vec![TerminalID::EOI]);
            }
        }
    }

    fn g_name(g: &Grammar, t: TerminalID) -> String {
        g.terminals[&t].to_string()
    }
}
