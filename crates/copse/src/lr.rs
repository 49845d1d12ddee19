//! The LR family: LR(0), SLR(1), LALR(1) and canonical LR(1).

pub mod automaton;
pub mod driver;
pub mod table;

pub use self::{
    automaton::{Automaton, StateID},
    table::{Action, Conflict, LRKind, ParseTable, TableError},
};

use self::{
    automaton::MergeMode,
    driver::{Driver, DriverError, ParseEvent, ParseItem},
};
use crate::{
    analysis::FirstSets,
    grammar::{Grammar, NonterminalID, SymbolID},
    parser::{tokenize, ParseError, Parser, Parses},
    tree::ParseTree,
};

#[derive(Debug, Clone)]
pub struct Config {
    kind: LRKind,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub const fn new() -> Self {
        Self {
            kind: LRKind::LALR1,
        }
    }

    /// Reduce on every terminal, LR(0) style.
    pub fn use_lr0(&mut self) -> &mut Self {
        self.kind = LRKind::LR0;
        self
    }

    /// Reduce on the FOLLOW set of the rule's left-hand side.
    pub fn use_slr1(&mut self) -> &mut Self {
        self.kind = LRKind::SLR1;
        self
    }

    /// Merge the LR(1) states sharing their LR(0) cores, as DeRemer's LALR(1) method.
    ///
    /// This is the default.
    pub fn use_lalr1(&mut self) -> &mut Self {
        self.kind = LRKind::LALR1;
        self
    }

    /// Keep Knuth's canonical LR(1) states apart.
    pub fn use_lr1(&mut self) -> &mut Self {
        self.kind = LRKind::LR1;
        self
    }

    pub fn kind(&self) -> LRKind {
        self.kind
    }

    /// Build the parse table, keeping conflicting cells.
    pub fn build(&self, grammar: &Grammar) -> ParseTable {
        let _span = tracing::trace_span!("lr::build", kind = %self.kind).entered();
        let first_sets = FirstSets::new(grammar);
        let mode = match self.kind {
            LRKind::LR0 | LRKind::SLR1 => MergeMode::Core,
            LRKind::LALR1 => MergeMode::LALR,
            LRKind::LR1 => MergeMode::Canonical,
        };
        let automaton = Automaton::generate(grammar, &first_sets, mode);
        ParseTable::build(grammar, &first_sets, automaton, self.kind)
    }

    /// Build the parse table, failing on the first conflicting cell.
    pub fn generate(&self, grammar: &Grammar) -> Result<ParseTable, TableError> {
        self.build(grammar).check(grammar)
    }
}

/// A deterministic parser over a conflict-free table.
#[derive(Debug)]
pub struct LRParser<'g> {
    grammar: &'g Grammar,
    table: ParseTable,
}

impl<'g> LRParser<'g> {
    pub fn new(grammar: &'g Grammar, config: &Config) -> Result<Self, TableError> {
        let table = config.generate(grammar)?;
        Ok(Self { grammar, table })
    }

    pub fn table(&self) -> &ParseTable {
        &self.table
    }

    fn run(
        &self,
        input: &str,
        start: NonterminalID,
        build_tree: bool,
    ) -> Result<Option<ParseTree>, ParseError> {
        let _span = tracing::trace_span!("LRParser::run", kind = %self.table.kind()).entered();
        let g = self.grammar;
        if start != self.table.start() {
            return Err(if g.nonterminals.contains_key(&start) {
                ParseError::StartMismatch
            } else {
                ParseError::UnknownStart
            });
        }

        let chars: Vec<char> = input.chars().collect();
        let tokens = tokenize(g, input);
        // Feed the known prefix; an unknown character reads as the end of input.
        let known = tokens.iter().take_while(|t| t.is_some()).count();
        let mut stream = tokens[..known].iter().flatten().copied();

        let mut driver = Driver::new(&self.table);
        let mut args = vec![];
        let mut nodes: Vec<ParseTree> = vec![];
        loop {
            match driver.next_event(&mut stream, &mut args) {
                Ok(ParseEvent::Reduce(rule)) => {
                    let left = g.rules[&rule].left();
                    tracing::trace!("reduce: {}", g.rules[&rule].display(g));
                    if !build_tree {
                        continue;
                    }
                    let arity = args.iter().filter(|a| matches!(a, ParseItem::N(_))).count();
                    let mut subtrees = nodes.split_off(nodes.len().saturating_sub(arity)).into_iter();
                    let mut children = Vec::with_capacity(args.len());
                    for arg in &args {
                        match arg {
                            ParseItem::T(t) => children.push(ParseTree::leaf(SymbolID::T(*t))),
                            ParseItem::N(_) => children.extend(subtrees.next()),
                        }
                    }
                    nodes.push(ParseTree::new(SymbolID::N(left), children));
                }

                Ok(ParseEvent::Accept) => {
                    if known < chars.len() {
                        return Err(ParseError::SyntaxError { position: known });
                    }
                    return Ok(nodes.pop());
                }

                Err(DriverError::Unexpected {
                    state, position, ..
                }) => {
                    return Err(ParseError::Unexpected {
                        state,
                        token: chars.get(position).copied(),
                        position,
                    })
                }

                Err(err) => {
                    tracing::debug!("driver failed: {}", err);
                    return Err(ParseError::SyntaxError {
                        position: driver.position(),
                    });
                }
            }
        }
    }
}

impl Parser for LRParser<'_> {
    fn grammar(&self) -> &Grammar {
        self.grammar
    }

    fn recognize_on(&self, input: &str, start: NonterminalID) -> bool {
        self.run(input, start, false).is_ok()
    }

    fn parse_on(&self, input: &str, start: NonterminalID) -> Result<Parses, ParseError> {
        self.run(input, start, true).map(Parses::Single)
    }
}
