//! Earley parser with Aycock–Horspool nullable handling and Leo's
//! right-recursion optimization.

use crate::{
    analysis::{nullable, Nullables},
    grammar::{Grammar, NonterminalID, SymbolID, TerminalID},
    parser::{tokenize, ParseError, Parser, Parses},
    sppf::{Forest, ForestSymbol, NodeID, Slot},
    tree::ParseForest,
    types::{Map, Set},
    util::display_fn,
};
use std::fmt;

#[derive(Debug, Clone, Copy)]
pub struct EarleyConfig {
    /// Collapse deterministic reduction paths while recognizing.
    ///
    /// Forest construction always runs plain completion.
    pub leo: bool,
}

impl Default for EarleyConfig {
    fn default() -> Self {
        Self { leo: true }
    }
}

/// A dotted rule together with the column it was predicted in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Item {
    pub slot: Slot,
    pub start: usize,
}

impl Item {
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| write!(f, "({}, {})", self.slot.display(g), self.start))
    }
}

#[derive(Debug, Default)]
pub struct Column {
    entries: Vec<(Item, NodeID)>,
    index: Set<Item>,
    transitives: Map<NonterminalID, Option<Item>>,
}

impl Column {
    fn add(&mut self, item: Item, node: NodeID) -> bool {
        if self.index.insert(item) {
            self.entries.push((item, node));
            true
        } else {
            false
        }
    }

    /// The admitted items in admission order.
    pub fn items(&self) -> impl Iterator<Item = Item> + '_ {
        self.entries.iter().map(|(item, _)| *item)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The topmost items of the deterministic reduction paths memoized in this column.
    pub fn transitives(&self) -> impl Iterator<Item = (NonterminalID, Item)> + '_ {
        self.transitives
            .iter()
            .filter_map(|(n, top)| Some((*n, (*top)?)))
    }
}

#[derive(Debug)]
pub struct Chart {
    pub columns: Vec<Column>,
}

impl Chart {
    /// Tell whether the last column holds `(start := γ ., 0)`.
    pub fn accepts(&self, g: &Grammar, start: NonterminalID) -> bool {
        self.columns.last().map_or(false, |column| {
            column.items().any(|item| {
                item.start == 0
                    && item.slot.is_finished(g)
                    && g.rules[&item.slot.rule].left() == start
            })
        })
    }

    /// The furthest column that admitted an item.
    pub fn furthest(&self) -> usize {
        self.columns
            .iter()
            .rposition(|column| !column.is_empty())
            .unwrap_or(0)
    }
}

#[derive(Debug)]
pub struct EarleyParser<'g> {
    grammar: &'g Grammar,
    nullables: Nullables,
    config: EarleyConfig,
}

impl<'g> EarleyParser<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self::with_config(grammar, EarleyConfig::default())
    }

    pub fn with_config(grammar: &'g Grammar, config: EarleyConfig) -> Self {
        Self {
            grammar,
            nullables: nullable(grammar),
            config,
        }
    }

    /// Fill the chart for `input` without building a forest.
    pub fn chart_on(&self, input: &str, start: NonterminalID) -> Chart {
        let mut run = Run::new(self, input, false, self.config.leo);
        run.fill(start);
        Chart {
            columns: run.columns,
        }
    }

    /// Parse `input` into its shared packed parse forest.
    pub fn forest_on(&self, input: &str, start: NonterminalID) -> Result<ParseForest, ParseError> {
        let _span = tracing::trace_span!("EarleyParser::forest_on").entered();
        if !self.grammar.nonterminals.contains_key(&start) {
            return Err(ParseError::UnknownStart);
        }
        let mut run = Run::new(self, input, true, false);
        run.fill(start);

        let n = run.tokens.len();
        let chart = Chart {
            columns: run.columns,
        };
        let forest = run.forest.unwrap_or_default();
        match forest.find_symbol(ForestSymbol::N(start), 0, n) {
            Some(root) if chart.accepts(self.grammar, start) => {
                tracing::debug!("accepted with {} forest nodes", forest.len());
                Ok(ParseForest::new(forest, root))
            }
            _ => Err(ParseError::SyntaxError {
                position: chart.furthest(),
            }),
        }
    }
}

impl Parser for EarleyParser<'_> {
    fn grammar(&self) -> &Grammar {
        self.grammar
    }

    fn recognize_on(&self, input: &str, start: NonterminalID) -> bool {
        let _span = tracing::trace_span!("EarleyParser::recognize_on").entered();
        self.grammar.nonterminals.contains_key(&start)
            && self.chart_on(input, start).accepts(self.grammar, start)
    }

    fn parse_on(&self, input: &str, start: NonterminalID) -> Result<Parses, ParseError> {
        let forest = self.forest_on(input, start)?;
        Ok(Parses::Forest(forest.into_trees()))
    }
}

/// The state of one parse invocation.
struct Run<'p, 'g> {
    grammar: &'g Grammar,
    nullables: &'p Nullables,
    tokens: Vec<Option<TerminalID>>,
    columns: Vec<Column>,
    forest: Option<Forest>,
    start: NonterminalID,
    leo: bool,
}

impl<'p, 'g> Run<'p, 'g> {
    fn new(parser: &'p EarleyParser<'g>, input: &str, with_forest: bool, leo: bool) -> Self {
        let tokens = tokenize(parser.grammar, input);
        let columns = (0..=tokens.len()).map(|_| Column::default()).collect();
        Self {
            grammar: parser.grammar,
            nullables: &parser.nullables,
            tokens,
            columns,
            forest: with_forest.then(Forest::new),
            start: parser.grammar.start_symbol,
            leo: leo && !with_forest,
        }
    }

    fn fill(&mut self, start: NonterminalID) {
        let g = self.grammar;
        self.start = start;
        for rule in g.rules_of(start) {
            let slot = Slot::new(rule.id(), 0);
            let node = self.predicted_node(slot, 0);
            self.columns[0].add(Item { slot, start: 0 }, node);
        }

        for i in 0..self.columns.len() {
            if i > 0 && self.columns[i].is_empty() {
                break;
            }
            let mut j = 0;
            while let Some(&(item, node)) = self.columns[i].entries.get(j) {
                tracing::trace!("[{}] {}", i, item.display(g));
                match item.slot.next_symbol(g) {
                    Some(SymbolID::N(b)) => self.predict(item, node, b, i),
                    Some(SymbolID::T(a)) => self.scan(item, node, a, i),
                    None => self.complete(item, node, i),
                }
                j += 1;
            }
            tracing::debug!("column {} finished with {} items", i, self.columns[i].len());
        }
    }

    fn predict(&mut self, item: Item, w: NodeID, b: NonterminalID, i: usize) {
        let g = self.grammar;
        for rule in g.rules_of(b) {
            let slot = Slot::new(rule.id(), 0);
            let node = self.predicted_node(slot, i);
            self.columns[i].add(Item { slot, start: i }, node);
        }

        if self.nullables.contains(b) {
            let z = self.symbol_node(ForestSymbol::N(b), i);
            let next = item.slot.next();
            let node = self.node_p(next, w, z);
            self.columns[i].add(
                Item {
                    slot: next,
                    start: item.start,
                },
                node,
            );
        }
    }

    fn scan(&mut self, item: Item, w: NodeID, a: TerminalID, i: usize) {
        if self.tokens.get(i).copied().flatten() != Some(a) {
            return;
        }
        let z = match &mut self.forest {
            Some(forest) => forest.terminal_node(a, i),
            None => NodeID::DUMMY,
        };
        let next = item.slot.next();
        let node = self.node_p(next, w, z);
        self.columns[i + 1].add(
            Item {
                slot: next,
                start: item.start,
            },
            node,
        );
    }

    fn complete(&mut self, item: Item, z: NodeID, i: usize) {
        let g = self.grammar;
        let left = g.rules[&item.slot.rule].left();
        let s = item.start;

        if self.leo && s < i {
            if let Some(top) = self.leo_top(s, left, &mut vec![]) {
                tracing::trace!("[{}] transitive {}", i, top.display(g));
                self.columns[i].add(top, NodeID::DUMMY);
                return;
            }
        }

        let waiting: Vec<(Item, NodeID)> = self.columns[s]
            .entries
            .iter()
            .filter(|(parent, _)| parent.slot.next_symbol(g) == Some(SymbolID::N(left)))
            .copied()
            .collect();
        for (parent, w) in waiting {
            let next = parent.slot.next();
            let node = self.node_p(next, w, z);
            self.columns[i].add(
                Item {
                    slot: next,
                    start: parent.start,
                },
                node,
            );
        }
    }

    /// The top of the deterministic reduction path above a completion of `a` back to column `s`.
    fn leo_top(
        &mut self,
        s: usize,
        a: NonterminalID,
        visiting: &mut Vec<(usize, NonterminalID)>,
    ) -> Option<Item> {
        if let Some(top) = self.columns[s].transitives.get(&a) {
            return *top;
        }
        if visiting.contains(&(s, a)) {
            return None;
        }
        visiting.push((s, a));

        let g = self.grammar;
        let top = match self.unique_postdot(s, a) {
            Some(parent) => {
                let advanced = Item {
                    slot: parent.slot.next(),
                    start: parent.start,
                };
                let b = g.rules[&parent.slot.rule].left();
                // An accepting item must stay visible in the last column.
                if advanced.start == 0 && b == self.start {
                    Some(advanced)
                } else {
                    Some(self.leo_top(advanced.start, b, visiting).unwrap_or(advanced))
                }
            }
            None => None,
        };

        visiting.pop();
        self.columns[s].transitives.insert(a, top);
        top
    }

    /// The single item of column `s` with its dot right before `a`, if it is also penultimate.
    fn unique_postdot(&self, s: usize, a: NonterminalID) -> Option<Item> {
        let g = self.grammar;
        let mut found = None;
        for (item, _) in &self.columns[s].entries {
            if item.slot.next_symbol(g) != Some(SymbolID::N(a)) {
                continue;
            }
            if found.is_some() {
                return None;
            }
            found = Some(*item);
        }
        let item = found?;
        let len = g.rules[&item.slot.rule].right().len();
        (item.slot.dot + 1 == len).then_some(item)
    }

    fn predicted_node(&mut self, slot: Slot, i: usize) -> NodeID {
        let g = self.grammar;
        match &mut self.forest {
            Some(forest) if slot.is_finished(g) => {
                let eps = forest.epsilon_node(i);
                forest.get_node_p(g, slot, NodeID::DUMMY, eps)
            }
            _ => NodeID::DUMMY,
        }
    }

    fn symbol_node(&mut self, symbol: ForestSymbol, i: usize) -> NodeID {
        match &mut self.forest {
            Some(forest) => forest.symbol_node(symbol, i, i),
            None => NodeID::DUMMY,
        }
    }

    fn node_p(&mut self, slot: Slot, w: NodeID, z: NodeID) -> NodeID {
        match &mut self.forest {
            Some(forest) => forest.get_node_p(self.grammar, slot, w, z),
            None => NodeID::DUMMY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsilon_only_acceptance() {
        let grammar = Grammar::from_str(r#"{"<S>": [["<A>"]], "<A>": [["a", "<A>"], []]}"#).unwrap();
        let parser = EarleyParser::new(&grammar);
        assert!(parser.recognize(""));
        let trees: Vec<_> = parser.parse("").unwrap().collect();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].display(&grammar).to_string(), "(<S>, [(<A>, [])])");
        assert!(parser.recognize("aaa"));
        assert!(!parser.recognize("ab"));
    }

    #[test]
    fn nullable_in_the_middle() {
        let grammar = Grammar::from_str(
            r#"{
                "<S>": [["<A>", "<B>", "<A>", "c"]],
                "<A>": [["a"], []],
                "<B>": [["<A>"]]
            }"#,
        )
        .unwrap();
        let parser = EarleyParser::new(&grammar);
        for input in ["c", "ac", "aac", "aaac"] {
            assert!(parser.recognize(input), "{}", input);
            for tree in parser.parse(input).unwrap() {
                assert_eq!(tree.yield_string(&grammar), input);
                assert!(tree.conforms_to(&grammar));
            }
        }
        assert!(!parser.recognize("aaaac"));
    }

    #[test]
    fn ambiguity_yields_every_association() {
        let grammar = Grammar::from_str(r#"{"<E>": [["<E>", "+", "<E>"], ["1"]]}"#).unwrap();
        let parser = EarleyParser::new(&grammar);
        let trees: Vec<_> = parser.parse("1+1+1").unwrap().collect();
        for tree in &trees {
            eprintln!("{}", tree.display(&grammar));
            assert_eq!(tree.yield_string(&grammar), "1+1+1");
        }
        assert_eq!(trees.len(), 2);
        assert_ne!(trees[0], trees[1]);

        // Catalan(3)
        assert_eq!(parser.parse("1+1+1+1").unwrap().count(), 5);
    }

    #[test]
    fn leo_keeps_right_recursion_columns_small() {
        let grammar = Grammar::from_str(r#"{"<A>": [["a", "<A>"], ["a"]]}"#).unwrap();
        let input = "a".repeat(64);
        let start = grammar.start_symbol;

        let leo = EarleyParser::new(&grammar);
        let plain = EarleyParser::with_config(&grammar, EarleyConfig { leo: false });
        let with_leo = leo.chart_on(&input, start);
        let without_leo = plain.chart_on(&input, start);
        assert!(with_leo.accepts(&grammar, start));
        assert!(without_leo.accepts(&grammar, start));

        let last = |chart: &Chart| chart.columns.last().map_or(0, |c| c.len());
        assert!(last(&with_leo) < 8, "{}", last(&with_leo));
        assert!(last(&without_leo) > 64, "{}", last(&without_leo));
        assert!(with_leo.columns.iter().any(|c| c.transitives().next().is_some()));

        assert!(!leo.recognize(&input[..0]));
        assert!(leo.recognize("a"));
    }

    #[test]
    fn syntax_error_reports_furthest_position() {
        let grammar = Grammar::from_str(r#"{"<S>": [["a", "b", "c"]]}"#).unwrap();
        let parser = EarleyParser::new(&grammar);
        assert!(matches!(
            parser.parse("abx"),
            Err(ParseError::SyntaxError { position: 2 })
        ));
        assert!(matches!(
            parser.parse("ab"),
            Err(ParseError::SyntaxError { position: 2 })
        ));
        assert!(matches!(
            parser.parse("b"),
            Err(ParseError::SyntaxError { position: 0 })
        ));
    }

    #[test]
    fn cyclic_grammar_terminates() {
        let grammar = Grammar::from_str(r#"{"<A>": [["<A>"], ["<B>"], ["a"]], "<B>": [["<A>"]]}"#).unwrap();
        let parser = EarleyParser::new(&grammar);
        let trees: Vec<_> = parser.parse("a").unwrap().collect();
        assert!(!trees.is_empty());
        for tree in &trees {
            assert!(tree.conforms_to(&grammar));
        }
    }

    #[test]
    fn unknown_start() {
        let grammar = Grammar::from_str(r#"{"<S>": [["a"]]}"#).unwrap();
        let other = Grammar::from_str(r#"{"<S>": [["a"]], "<T>": [["b"]]}"#).unwrap();
        let t = other.nonterminal_by_name("<T>").unwrap();
        let parser = EarleyParser::new(&grammar);
        assert!(matches!(parser.parse_on("b", t), Err(ParseError::UnknownStart)));
        assert!(!parser.recognize_on("b", t));
    }
}
