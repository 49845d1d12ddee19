//! The interface shared by the Earley, GLL and LR parsers.

use crate::{
    grammar::{Grammar, NonterminalID, TerminalID},
    lr::StateID,
    sppf::Forest,
    tree::{ParseTree, Trees},
};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The input is not in the language. `position` is the furthest point reached.
    #[error("syntax error at position {position}")]
    SyntaxError { position: usize },

    #[error("unexpected {} in state {state} at position {position}", .token.map_or_else(|| "end of input".to_owned(), |ch| format!("{:?}", ch)))]
    Unexpected {
        state: StateID,
        token: Option<char>,
        position: usize,
    },

    #[error("unknown start symbol")]
    UnknownStart,

    #[error("the parse table was compiled for another start symbol")]
    StartMismatch,
}

impl ParseError {
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::SyntaxError { position } | Self::Unexpected { position, .. } => Some(*position),
            _ => None,
        }
    }
}

pub trait Parser {
    /// The grammar this parser was built for.
    fn grammar(&self) -> &Grammar;

    /// Tell whether `input` is derivable from `start`.
    fn recognize_on(&self, input: &str, start: NonterminalID) -> bool;

    /// Parse `input` from `start`, yielding its parse trees.
    fn parse_on(&self, input: &str, start: NonterminalID) -> Result<Parses, ParseError>;

    fn recognize(&self, input: &str) -> bool {
        self.recognize_on(input, self.grammar().start_symbol)
    }

    fn parse(&self, input: &str) -> Result<Parses, ParseError> {
        self.parse_on(input, self.grammar().start_symbol)
    }
}

/// The trees produced by a successful parse.
#[derive(Debug)]
pub enum Parses {
    /// Every acyclic derivation in a parse forest.
    Forest(Trees<Forest>),
    /// The single tree of a deterministic parse.
    Single(Option<ParseTree>),
}

impl Iterator for Parses {
    type Item = ParseTree;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Parses::Forest(trees) => trees.next(),
            Parses::Single(tree) => tree.take(),
        }
    }
}

/// Map each input character to its terminal, `None` where the grammar has none.
pub(crate) fn tokenize(grammar: &Grammar, input: &str) -> Vec<Option<TerminalID>> {
    input.chars().map(|ch| grammar.terminal_of(ch)).collect()
}
