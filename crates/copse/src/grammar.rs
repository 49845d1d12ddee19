//! Grammar types.

use crate::{
    syntax as s,
    types::{Map, Set},
    util::{display_fn, write_quoted},
};
use std::{fmt, fs, io, marker::PhantomData, path::Path};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TerminalID {
    raw: u16,
}
impl TerminalID {
    /// Reserved symbol used as a terminal symbol that means the end of input.
    pub const EOI: Self = Self::new(0);

    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub fn index(self) -> usize {
        self.raw as usize
    }

    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        Self::new(index as u16)
    }
}

#[derive(Debug, Clone)]
pub struct Terminal {
    id: TerminalID,
    ch: Option<char>,
}
impl Terminal {
    pub fn id(&self) -> TerminalID {
        self.id
    }

    /// The input character matched by this terminal, `None` for the end of input.
    pub fn char(&self) -> Option<char> {
        self.ch
    }
}
impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ch {
            Some(ch) => write!(f, "{:?}", ch),
            None => f.write_str("$"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NonterminalID {
    raw: u16,
}
impl NonterminalID {
    /// The augmented start symbol.
    pub const START: Self = Self::new(0);
    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub fn index(self) -> usize {
        self.raw as usize
    }

    pub(crate) fn try_from_index(index: usize) -> Option<Self> {
        u16::try_from(index).ok().map(Self::new)
    }
}

#[derive(Debug, Clone)]
pub struct Nonterminal {
    id: NonterminalID,
    name: String,
}
impl Nonterminal {
    pub fn id(&self) -> NonterminalID {
        self.id
    }

    /// The tagged name, e.g. `<expr>`.
    pub fn name(&self) -> &str {
        &self.name
    }
}
impl fmt::Display for Nonterminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}
impl SymbolID {
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| match self {
            SymbolID::T(t) => write!(f, "{}", g.terminals[t]),
            SymbolID::N(n) => write!(f, "{}", g.nonterminals[n]),
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RuleID {
    raw: u16,
}

impl RuleID {
    /// The augmented rule `$start := S`, accepted on `$`.
    pub const ACCEPT: Self = Self::new(0);

    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }
}

/// The type that represents a production rule in grammar.
#[derive(Debug, Clone)]
pub struct Rule {
    id: RuleID,
    left: NonterminalID,
    right: Vec<SymbolID>,
}
impl Rule {
    pub fn id(&self) -> RuleID {
        self.id
    }

    /// Return the left-hand side of this production.
    pub fn left(&self) -> NonterminalID {
        self.left
    }

    /// Return the right-hand side of this production.
    pub fn right(&self) -> &[SymbolID] {
        &self.right[..]
    }

    // `"<A> := 'a' <B>"`
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            write!(f, "{} :=", g.nonterminals[&self.left()])?;
            if self.right.is_empty() {
                return f.write_str(" ε");
            }
            for symbol in self.right() {
                write!(f, " {}", symbol.display(g))?;
            }
            Ok(())
        })
    }
}

/// A context-free grammar over single-character terminals.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Grammar {
    pub terminals: Map<TerminalID, Terminal>,
    pub nonterminals: Map<NonterminalID, Nonterminal>,
    pub rules: Map<RuleID, Rule>,
    pub start_symbol: NonterminalID,
    rules_by_left: Map<NonterminalID, Vec<RuleID>>,
    terminals_by_char: Map<char, TerminalID>,
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## terminals:")?;
        for terminal in self.terminals.values() {
            writeln!(f, "{}", terminal)?;
        }

        writeln!(f, "\n## nonterminals:")?;
        for nonterminal in self.nonterminals.values() {
            write!(f, "{}", nonterminal)?;
            if nonterminal.id() == self.start_symbol {
                write!(f, " (start)")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## rules:")?;
        for rule in self.rules.values() {
            writeln!(f, "{}", rule.display(self))?;
        }

        Ok(())
    }
}

impl Grammar {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Grammar, GrammarDefError> {
        let source = fs::read_to_string(path).map_err(GrammarDefError::IO)?;
        Self::from_str(&source)
    }

    /// Read a grammar from its literal form, e.g. `{"<S>": [["a", "<S>"], []]}`.
    ///
    /// The first defined nonterminal becomes the start symbol.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(source: &str) -> Result<Grammar, GrammarDefError> {
        let literal = s::parse(source).map_err(GrammarDefError::Syntax)?;
        Grammar::define(|g| define_grammar_from_literal(g, literal))
    }

    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarDefError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarDefError>,
    {
        let mut def = GrammarDef {
            terminals: Map::default(),
            nonterminals: Map::default(),
            rules: Map::default(),
            start: None,
            terminals_by_char: Map::default(),
            nonterminals_by_name: Map::default(),
            defined_rules: Set::default(),
            next_terminal_id: TerminalID::OFFSET,
            next_nonterminal_id: NonterminalID::OFFSET,
            next_rule_id: RuleID::OFFSET,
            _marker: PhantomData,
        };

        def.terminals.insert(
            TerminalID::EOI,
            Terminal {
                id: TerminalID::EOI,
                ch: None,
            },
        );
        def.nonterminals.insert(
            NonterminalID::START,
            Nonterminal {
                id: NonterminalID::START,
                name: "$start".into(),
            },
        );

        f(&mut def)?;

        def.end()
    }

    /// Return the rules whose left-hand side is `n`, in definition order.
    pub fn rules_of(&self, n: NonterminalID) -> impl Iterator<Item = &Rule> + '_ {
        self.rules_by_left
            .get(&n)
            .map(|rules| &rules[..])
            .unwrap_or(&[])
            .iter()
            .map(move |id| &self.rules[id])
    }

    /// Return the terminal that matches `ch`, if the grammar uses it.
    pub fn terminal_of(&self, ch: char) -> Option<TerminalID> {
        self.terminals_by_char.get(&ch).copied()
    }

    pub fn nonterminal_by_name(&self, name: &str) -> Option<NonterminalID> {
        self.nonterminals
            .values()
            .find(|n| n.name == name)
            .map(|n| n.id)
    }

    /// The term spelling `symbol` in the literal form: its character or its tagged name.
    pub fn symbol_name(&self, symbol: SymbolID) -> String {
        match symbol {
            SymbolID::T(t) => match self.terminals[&t].ch {
                Some(ch) => ch.to_string(),
                None => "$".into(),
            },
            SymbolID::N(n) => self.nonterminals[&n].name.clone(),
        }
    }

    /// Return a copy of this grammar whose augmented rule derives `start`.
    pub fn with_start(&self, start: NonterminalID) -> Grammar {
        let mut g = self.clone();
        g.start_symbol = start;
        if let Some(accept) = g.rules.get_mut(&RuleID::ACCEPT) {
            accept.right = vec![SymbolID::N(start)];
        }
        g
    }

    /// Render the grammar in its literal form, starting with the start symbol.
    pub fn literal(&self) -> impl fmt::Display + '_ {
        display_fn(move |f| {
            let mut order: Vec<NonterminalID> = vec![self.start_symbol];
            order.extend(
                self.nonterminals
                    .keys()
                    .filter(|n| **n != NonterminalID::START && **n != self.start_symbol),
            );

            f.write_str("{")?;
            for (i, n) in order.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                f.write_str("\n  ")?;
                write_quoted(f, &self.nonterminals[n].name)?;
                f.write_str(": [")?;
                for (j, rule) in self.rules_of(*n).enumerate() {
                    if j > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str("[")?;
                    for (k, symbol) in rule.right().iter().enumerate() {
                        if k > 0 {
                            f.write_str(", ")?;
                        }
                        match symbol {
                            SymbolID::T(t) => {
                                let ch = self.terminals[t].ch.unwrap_or('$');
                                write_quoted(f, ch.encode_utf8(&mut [0; 4]))?;
                            }
                            SymbolID::N(n) => write_quoted(f, &self.nonterminals[n].name)?,
                        }
                    }
                    f.write_str("]")?;
                }
                f.write_str("]")?;
            }
            f.write_str("\n}")
        })
    }
}

/// Tell whether a term of the literal form names a nonterminal.
pub fn is_nonterminal_name(term: &str) -> bool {
    term.len() > 1 && term.starts_with('<') && term.ends_with('>')
}

fn define_grammar_from_literal(
    g: &mut GrammarDef<'_>,
    literal: s::ast::GrammarLiteral,
) -> Result<(), GrammarDefError> {
    let mut nonterminals = Map::default();
    for def in &literal.defs {
        if !is_nonterminal_name(&def.name) {
            return Err(format!("definition key `{}' is not a nonterminal", def.name).into());
        }
        if nonterminals.contains_key(&*def.name) {
            return Err(format!("nonterminal `{}' is defined twice", def.name).into());
        }
        let id = g.nonterminal(&def.name)?;
        nonterminals.insert(&*def.name, id);
    }

    for def in &literal.defs {
        let left = nonterminals[&*def.name];
        for rule in &def.rules {
            let mut right = vec![];
            for term in rule {
                let symbol = if is_nonterminal_name(term) {
                    let n = nonterminals.get(&**term).copied().ok_or_else(|| {
                        GrammarDefError::UndefinedNonterminal { name: term.clone() }
                    })?;
                    SymbolID::N(n)
                } else {
                    let mut chars = term.chars();
                    match (chars.next(), chars.next()) {
                        (Some(ch), None) => SymbolID::T(g.terminal(ch)?),
                        _ => {
                            return Err(format!(
                                "terminal `{}' in a rule of {} must be a single character",
                                term, def.name
                            )
                            .into())
                        }
                    }
                };
                right.push(symbol);
            }
            g.rule(left, right)?;
        }
    }

    Ok(())
}

/// The contextural values for building a `Grammar`.
#[derive(Debug)]
pub struct GrammarDef<'def> {
    terminals: Map<TerminalID, Terminal>,
    nonterminals: Map<NonterminalID, Nonterminal>,
    rules: Map<RuleID, Rule>,
    start: Option<NonterminalID>,
    terminals_by_char: Map<char, TerminalID>,
    nonterminals_by_name: Map<String, NonterminalID>,
    defined_rules: Set<(NonterminalID, Vec<SymbolID>)>,
    next_terminal_id: u16,
    next_nonterminal_id: u16,
    next_rule_id: u16,
    _marker: PhantomData<&'def mut ()>,
}

impl<'def> GrammarDef<'def> {
    /// Obtain the terminal symbol matching `ch`, declaring it on first use.
    pub fn terminal(&mut self, ch: char) -> Result<TerminalID, GrammarDefError> {
        if let Some(id) = self.terminals_by_char.get(&ch) {
            return Ok(*id);
        }
        let id = TerminalID::new(next_raw(&mut self.next_terminal_id, "terminal")?);
        self.terminals.insert(id, Terminal { id, ch: Some(ch) });
        self.terminals_by_char.insert(ch, id);
        Ok(id)
    }

    /// Obtain the nonterminal named `name`, declaring it on first use.
    ///
    /// A declared nonterminal is defined even if no rule is ever added for it.
    pub fn nonterminal(&mut self, name: &str) -> Result<NonterminalID, GrammarDefError> {
        if name.is_empty() || name == "$start" {
            return Err(GrammarDefError::Other {
                msg: format!("incorrect nonterminal name: `{}'", name),
            });
        }

        if let Some(id) = self.nonterminals_by_name.get(name) {
            return Ok(*id);
        }

        let id = NonterminalID::new(next_raw(&mut self.next_nonterminal_id, "nonterminal")?);
        self.nonterminals_by_name.insert(name.to_owned(), id);
        self.nonterminals.insert(
            id,
            Nonterminal {
                id,
                name: name.to_owned(),
            },
        );

        Ok(id)
    }

    /// Specify a production rule into this grammer.
    pub fn rule<I>(&mut self, left: NonterminalID, right: I) -> Result<RuleID, GrammarDefError>
    where
        I: IntoIterator<Item = SymbolID>,
    {
        let right_: Vec<SymbolID> = right.into_iter().collect();
        for symbol in std::iter::once(SymbolID::N(left)).chain(right_.iter().copied()) {
            match symbol {
                SymbolID::N(n) if !self.nonterminals.contains_key(&n) => {
                    return Err(GrammarDefError::Other {
                        msg: format!("unknown nonterminal id: {:?}", n),
                    })
                }
                SymbolID::T(TerminalID::EOI) => {
                    return Err("the end-of-input marker cannot appear in rules".into())
                }
                SymbolID::T(t) if !self.terminals.contains_key(&t) => {
                    return Err(GrammarDefError::Other {
                        msg: format!("unknown terminal id: {:?}", t),
                    })
                }
                _ => (),
            }
        }

        if self.defined_rules.contains(&(left, right_.clone())) {
            return Err(GrammarDefError::DuplicateRule {
                left: self.nonterminals[&left].name.clone(),
            });
        }

        let id = RuleID::new(next_raw(&mut self.next_rule_id, "rule")?);
        self.defined_rules.insert((left, right_.clone()));
        self.rules.insert(
            id,
            Rule {
                id,
                left,
                right: right_,
            },
        );

        Ok(id)
    }

    /// Specify the start symbol for this grammar.
    pub fn start_symbol(&mut self, symbol: NonterminalID) -> Result<(), GrammarDefError> {
        if symbol == NonterminalID::START || !self.nonterminals.contains_key(&symbol) {
            return Err("incorrect start symbol".into());
        }
        self.start.replace(symbol);
        Ok(())
    }

    fn end(mut self) -> Result<Grammar, GrammarDefError> {
        // Fall back to the first declared nonterminal.
        let start = match self.start.take() {
            Some(start) => start,
            None => self
                .nonterminals
                .keys()
                .find(|id| **id != NonterminalID::START)
                .copied()
                .ok_or_else(|| GrammarDefError::Other {
                    msg: "empty nonterminal symbols".into(),
                })?,
        };

        self.rules.insert(
            RuleID::ACCEPT,
            Rule {
                id: RuleID::ACCEPT,
                left: NonterminalID::START,
                right: vec![SymbolID::N(start)],
            },
        );
        self.rules.sort_keys();

        let mut rules_by_left: Map<NonterminalID, Vec<RuleID>> = self
            .nonterminals
            .keys()
            .map(|n| (*n, vec![]))
            .collect();
        for rule in self.rules.values() {
            rules_by_left[&rule.left].push(rule.id);
        }

        Ok(Grammar {
            terminals: self.terminals,
            nonterminals: self.nonterminals,
            rules: self.rules,
            start_symbol: start,
            rules_by_left,
            terminals_by_char: self.terminals_by_char,
        })
    }
}

/// Hand out the next raw ID, failing once the `u16` space is used up.
fn next_raw(counter: &mut u16, kind: &'static str) -> Result<u16, GrammarDefError> {
    let raw = *counter;
    *counter = raw
        .checked_add(1)
        .ok_or(GrammarDefError::TooMany { kind })?;
    Ok(raw)
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarDefError {
    #[error("IO error: {}", _0)]
    IO(io::Error),

    #[error("Syntax error: {}", _0)]
    Syntax(anyhow::Error),

    #[error("undefined nonterminal: `{}'", name)]
    UndefinedNonterminal { name: String },

    #[error("duplicate production rule for {}", left)]
    DuplicateRule { left: String },

    #[error("too many {} definitions", kind)]
    TooMany { kind: &'static str },

    #[error("Other error: {}", msg)]
    Other { msg: String },
}
impl From<&str> for GrammarDefError {
    fn from(msg: &str) -> Self {
        Self::Other { msg: msg.into() }
    }
}
impl From<String> for GrammarDefError {
    fn from(msg: String) -> Self {
        Self::Other { msg }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::SymbolID::*;

    #[test]
    fn smoketest_define() {
        let grammar = Grammar::define(|def| {
            let plus = def.terminal('+')?;
            let one = def.terminal('1')?;
            let e = def.nonterminal("<E>")?;
            let t = def.nonterminal("<T>")?;
            def.rule(e, [N(t), T(plus), N(e)])?;
            def.rule(e, [N(t)])?;
            def.rule(t, [T(one)])?;
            Ok(())
        })
        .unwrap();
        eprintln!("{}", grammar);

        let e = grammar.nonterminal_by_name("<E>").unwrap();
        assert_eq!(grammar.start_symbol, e);
        assert_eq!(grammar.rules_of(e).count(), 2);
        assert_eq!(grammar.rules_of(NonterminalID::START).count(), 1);
        assert!(grammar.terminal_of('+').is_some());
        assert!(grammar.terminal_of('-').is_none());
    }

    #[test]
    fn literal_form() {
        let grammar = Grammar::from_str(
            r#"{
                "<S>": [["<A>"]],
                "<A>": [["a", "<A>"], []]
            }"#,
        )
        .unwrap();
        eprintln!("{}", grammar);

        let a = grammar.nonterminal_by_name("<A>").unwrap();
        let rules: Vec<_> = grammar.rules_of(a).collect();
        assert_eq!(rules.len(), 2);
        assert!(rules[1].right().is_empty());
        assert_eq!(
            grammar.nonterminals[&grammar.start_symbol].name(),
            "<S>"
        );

        let reparsed = Grammar::from_str(&grammar.literal().to_string()).unwrap();
        assert_eq!(reparsed.rules.len(), grammar.rules.len());
    }

    #[test]
    fn undefined_nonterminal_is_rejected() {
        let err = Grammar::from_str(r#"{"<S>": [["<B>"]]}"#).unwrap_err();
        assert!(matches!(err, GrammarDefError::UndefinedNonterminal { name } if name == "<B>"));
    }

    #[test]
    fn multi_character_terminal_is_rejected() {
        assert!(Grammar::from_str(r#"{"<S>": [["ab"]]}"#).is_err());
    }

    #[test]
    fn duplicate_rule_is_rejected() {
        let err = Grammar::from_str(r#"{"<S>": [["a"], ["a"]]}"#).unwrap_err();
        assert!(matches!(err, GrammarDefError::DuplicateRule { .. }));
    }

    #[test]
    fn symbol_limit_is_an_error() {
        let err = Grammar::define(|def| {
            for i in 0..=u16::MAX as usize {
                def.nonterminal(&format!("<n{}>", i))?;
            }
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarDefError::TooMany { kind: "nonterminal" }));

        let err = Grammar::define(|def| {
            let s = def.nonterminal("<S>")?;
            let mut symbols = vec![];
            for i in 0..256 {
                symbols.push(SymbolID::N(def.nonterminal(&format!("<m{}>", i))?));
            }
            for x in &symbols {
                for y in &symbols {
                    def.rule(s, [*x, *y])?;
                }
            }
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarDefError::TooMany { kind: "rule" }));
    }

    #[test]
    fn with_start_rewrites_accept_rule() {
        let grammar = Grammar::from_str(r#"{"<S>": [["<A>"]], "<A>": [["a"]]}"#).unwrap();
        let a = grammar.nonterminal_by_name("<A>").unwrap();
        let g2 = grammar.with_start(a);
        assert_eq!(g2.start_symbol, a);
        assert_eq!(g2.rules[&RuleID::ACCEPT].right(), &[SymbolID::N(a)]);
    }
}
