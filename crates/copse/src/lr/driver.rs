//! The shift-reduce driver over a generated parse table.

use super::{
    automaton::StateID,
    table::{Action, ParseTable},
};
use crate::grammar::{NonterminalID, RuleID, TerminalID};

/// A trait for abstracting token symbols.
pub trait Token {
    fn as_terminal(&self) -> TerminalID;
}

impl Token for TerminalID {
    fn as_terminal(&self) -> TerminalID {
        *self
    }
}

/// The parser driven based on the generated parse table.
#[derive(Debug)]
pub struct Driver<'t, TTok> {
    table: &'t ParseTable,
    state_stack: Vec<StateID>,
    item_stack: Vec<ParseItem<TTok>>,
    parser_state: ParserState,
    peeked_token: Option<TTok>,
    position: usize,
}

#[derive(Debug)]
enum ParserState {
    Reading,
    PendingGoto,
    Accepted,
}

impl<'t, TTok> Driver<'t, TTok>
where
    TTok: Token,
{
    pub fn new(table: &'t ParseTable) -> Self {
        Self {
            table,
            state_stack: vec![StateID::START],
            item_stack: vec![],
            parser_state: ParserState::Reading,
            peeked_token: None,
            position: 0,
        }
    }

    /// The number of tokens shifted so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Consume some tokens and drive the state machine
    /// until it matches a certain production rule.
    ///
    /// On `Reduce`, `args` holds the popped items in rule order.
    /// On `Accept`, it holds the single item derived from the start symbol.
    pub fn next_event<I>(
        &mut self,
        tokens: &mut I,
        args: &mut Vec<ParseItem<TTok>>,
    ) -> Result<ParseEvent, DriverError>
    where
        I: Iterator<Item = TTok>,
    {
        loop {
            let current = *self.state_stack.last().ok_or(DriverError::EmptyStateStack)?;
            let row = self
                .table
                .row(current)
                .ok_or(DriverError::UnknownState { state: current })?;

            if let ParserState::PendingGoto = self.parser_state {
                let left = match self.item_stack.last() {
                    Some(ParseItem::N(n)) => *n,
                    _ => return Err(DriverError::EmptyItemStack),
                };
                let next = row
                    .goto(left)
                    .ok_or(DriverError::MissingGoto { state: current })?;
                tracing::trace!("goto {}", next);
                self.state_stack.push(next);
                self.parser_state = ParserState::Reading;
                continue;
            }

            if let ParserState::Accepted = self.parser_state {
                return Err(DriverError::AlreadyAccepted);
            }

            if self.peeked_token.is_none() {
                self.peeked_token = tokens.next();
            }
            let lookahead = self
                .peeked_token
                .as_ref()
                .map_or(TerminalID::EOI, |t| t.as_terminal());

            match row.actions(lookahead) {
                [Action::Shift(next)] => {
                    let t = self.peeked_token.take().ok_or(DriverError::Unexpected {
                        state: current,
                        token: lookahead,
                        position: self.position,
                    })?;
                    tracing::trace!("shift {}", next);
                    self.item_stack.push(ParseItem::T(t));
                    self.state_stack.push(*next);
                    self.position += 1;
                }

                [Action::Reduce(rule)] => {
                    let (left, n) = self
                        .table
                        .rule_shape(*rule)
                        .ok_or(DriverError::UnknownRule { rule: *rule })?;
                    if self.item_stack.len() < n || self.state_stack.len() <= n {
                        return Err(DriverError::EmptyItemStack);
                    }
                    let split = self.item_stack.len() - n;
                    args.clear();
                    args.extend(self.item_stack.drain(split..));
                    self.state_stack.truncate(self.state_stack.len() - n);

                    self.item_stack.push(ParseItem::N(left));
                    self.parser_state = ParserState::PendingGoto;
                    return Ok(ParseEvent::Reduce(*rule));
                }

                [Action::Accept] => {
                    let arg = self.item_stack.pop().ok_or(DriverError::EmptyItemStack)?;
                    args.clear();
                    args.push(arg);
                    self.parser_state = ParserState::Accepted;
                    return Ok(ParseEvent::Accept);
                }

                [] => {
                    return Err(DriverError::Unexpected {
                        state: current,
                        token: lookahead,
                        position: self.position,
                    })
                }

                _ => return Err(DriverError::Conflict { state: current }),
            }
        }
    }
}

#[derive(Debug)]
pub enum ParseItem<TTok> {
    T(TTok),
    N(NonterminalID),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    Reduce(RuleID),
    Accept,
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("unexpected token {token:?} in state {state} at position {position}")]
    Unexpected {
        state: StateID,
        token: TerminalID,
        position: usize,
    },

    #[error("conflicting actions in state {state}")]
    Conflict { state: StateID },

    #[error("no goto entry in state {state}")]
    MissingGoto { state: StateID },

    #[error("unknown state {state}")]
    UnknownState { state: StateID },

    #[error("unknown rule {rule:?}")]
    UnknownRule { rule: RuleID },

    #[error("the input has already been accepted")]
    AlreadyAccepted,

    #[error("empty state stack")]
    EmptyStateStack,

    #[error("empty item stack")]
    EmptyItemStack,
}
