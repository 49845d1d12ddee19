//! LR parse tables.

use super::automaton::{Automaton, StateID};
use crate::{
    analysis::{FirstSets, FollowSets},
    grammar::{Grammar, NonterminalID, RuleID, SymbolID, TerminalID},
    types::{Map, TerminalSet},
    util::display_fn,
};
use std::fmt;

/// The LR variant a table was generated with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LRKind {
    LR0,
    SLR1,
    LALR1,
    LR1,
}

impl fmt::Display for LRKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LR0 => "LR(0)",
            Self::SLR1 => "SLR(1)",
            Self::LALR1 => "LALR(1)",
            Self::LR1 => "LR(1)",
        })
    }
}

/// The action that the LR automaton in a state performs on a particular
/// lookahead symbol.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// Read a lookahead symbol and transition to the specified state.
    Shift(StateID),

    /// Reduce to the specified production rule.
    Reduce(RuleID),

    Accept,
}

impl Action {
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| match self {
            Action::Shift(to) => write!(f, "shift({})", to),
            Action::Reduce(rule) => write!(f, "reduce({})", g.rules[rule].display(g)),
            Action::Accept => f.write_str("accept"),
        })
    }
}

#[derive(Debug, Default)]
pub struct Row {
    actions: Map<TerminalID, Vec<Action>>,
    gotos: Map<NonterminalID, StateID>,
}

impl Row {
    /// The candidate actions on `t`. More than one means a conflict.
    pub fn actions(&self, t: TerminalID) -> &[Action] {
        self.actions.get(&t).map_or(&[], |actions| &actions[..])
    }

    pub fn goto(&self, n: NonterminalID) -> Option<StateID> {
        self.gotos.get(&n).copied()
    }

    fn add(&mut self, t: TerminalID, action: Action) {
        let cell = self.actions.entry(t).or_default();
        if !cell.contains(&action) {
            cell.push(action);
        }
    }
}

/// A cell that received more than one action.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub state: StateID,
    pub terminal: TerminalID,
    pub actions: Vec<Action>,
}

impl Conflict {
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            write!(f, "state {} on {}:", self.state, g.terminals[&self.terminal])?;
            for action in &self.actions {
                write!(f, " {}", action.display(g))?;
            }
            Ok(())
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("grammar conflict in state {state} on {symbol}: {}", .actions.join(" / "))]
    GrammarConflict {
        state: StateID,
        symbol: String,
        actions: Vec<String>,
    },
}

#[derive(Debug)]
pub struct ParseTable {
    kind: LRKind,
    start: NonterminalID,
    automaton: Automaton,
    rows: Vec<Row>,
    rules: Map<RuleID, (NonterminalID, usize)>,
}

impl ParseTable {
    pub(crate) fn build(grammar: &Grammar, first_sets: &FirstSets, automaton: Automaton, kind: LRKind) -> Self {
        let follow_sets = match kind {
            LRKind::SLR1 => Some(FollowSets::new(grammar, first_sets, NonterminalID::START)),
            _ => None,
        };
        let every_terminal: TerminalSet = grammar.terminals.keys().copied().collect();

        let mut rows = Vec::with_capacity(automaton.len());
        for (id, state) in automaton.states() {
            debug_assert_eq!(id.index(), rows.len());
            let mut row = Row::default();

            for (symbol, to) in state.transitions() {
                match symbol {
                    SymbolID::T(t) => row.add(t, Action::Shift(to)),
                    SymbolID::N(n) => {
                        row.gotos.insert(n, to);
                    }
                }
            }

            for (slot, lookaheads) in state.items() {
                if !slot.is_finished(grammar) {
                    continue;
                }
                if slot.rule == RuleID::ACCEPT {
                    row.add(TerminalID::EOI, Action::Accept);
                    continue;
                }
                let left = grammar.rules[&slot.rule].left();
                let columns = match (kind, &follow_sets) {
                    (LRKind::LR0, _) => &every_terminal,
                    (LRKind::SLR1, Some(follow_sets)) => follow_sets.follow(left),
                    _ => lookaheads,
                };
                for t in columns.iter() {
                    row.add(t, Action::Reduce(slot.rule));
                }
            }

            rows.push(row);
        }

        let rules = grammar
            .rules
            .values()
            .map(|rule| (rule.id(), (rule.left(), rule.right().len())))
            .collect();

        Self {
            kind,
            start: grammar.start_symbol,
            automaton,
            rows,
            rules,
        }
    }

    pub fn kind(&self) -> LRKind {
        self.kind
    }

    /// The start symbol this table was compiled for.
    pub fn start(&self) -> NonterminalID {
        self.start
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, state: StateID) -> Option<&Row> {
        self.rows.get(state.index())
    }

    /// The left-hand side of `rule` and the number of symbols it pops.
    pub fn rule_shape(&self, rule: RuleID) -> Option<(NonterminalID, usize)> {
        self.rules.get(&rule).copied()
    }

    pub fn conflicts(&self) -> Vec<Conflict> {
        let mut conflicts = vec![];
        for (i, row) in self.rows.iter().enumerate() {
            for (t, actions) in &row.actions {
                if actions.len() > 1 {
                    conflicts.push(Conflict {
                        state: StateID::from_index(i),
                        terminal: *t,
                        actions: actions.clone(),
                    });
                }
            }
        }
        conflicts
    }

    pub(crate) fn check(self, grammar: &Grammar) -> Result<Self, TableError> {
        if let Some(conflict) = self.conflicts().into_iter().next() {
            return Err(TableError::GrammarConflict {
                state: conflict.state,
                symbol: grammar.terminals[&conflict.terminal].to_string(),
                actions: conflict
                    .actions
                    .iter()
                    .map(|a| a.display(grammar).to_string())
                    .collect(),
            });
        }
        Ok(self)
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (i, row) in self.rows.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### State {}", StateID::from_index(i))?;
                writeln!(f, "## actions")?;
                for (t, actions) in &row.actions {
                    write!(f, "- {} =>", g.terminals[t])?;
                    for (j, action) in actions.iter().enumerate() {
                        if j > 0 {
                            f.write_str(" |")?;
                        }
                        write!(f, " {}", action.display(g))?;
                    }
                    writeln!(f)?;
                }
                writeln!(f, "## gotos")?;
                for (n, to) in &row.gotos {
                    writeln!(f, "- {} => goto({})", g.nonterminals[n], to)?;
                }
            }
            Ok(())
        })
    }
}
