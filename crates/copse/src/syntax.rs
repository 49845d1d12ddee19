//! Reader for the grammar literal form.
//!
//! ```text
//! grammar ::= { nonterminal: [ rule, ... ], ... }
//! rule    ::= [ term, ... ]
//! ```
//!
//! The reader itself is driven by an LALR(1) table built from the grammar
//! below, over single-character token tags (`s` stands for a quoted string).

pub mod ast;
mod lexer;

use self::lexer::{Lexer, Spanned, Token};
use crate::{
    grammar::{Grammar, GrammarDefError, SymbolID, TerminalID},
    lr::{
        self,
        driver::{Driver, DriverError, ParseEvent, ParseItem},
        ParseTable,
    },
    util::unescape,
};
use std::sync::OnceLock;

const LITERAL_GRAMMAR: &[(&str, &[&str])] = &[
    ("<grammar>", &["{", "<defs>", "}"]),
    ("<grammar>", &["{", "<defs>", ",", "}"]),
    ("<grammar>", &["{", "}"]),
    ("<defs>", &["<def>"]),
    ("<defs>", &["<defs>", ",", "<def>"]),
    ("<def>", &["s", ":", "[", "]"]),
    ("<def>", &["s", ":", "[", "<rules>", "]"]),
    ("<def>", &["s", ":", "[", "<rules>", ",", "]"]),
    ("<rules>", &["<rule>"]),
    ("<rules>", &["<rules>", ",", "<rule>"]),
    ("<rule>", &["[", "]"]),
    ("<rule>", &["[", "<terms>", "]"]),
    ("<rule>", &["[", "<terms>", ",", "]"]),
    ("<terms>", &["s"]),
    ("<terms>", &["<terms>", ",", "s"]),
];

/// A lexed token paired with the terminal of the literal grammar it stands for.
#[derive(Debug, Clone, Copy)]
struct Tagged<'input> {
    spanned: Spanned<'input>,
    terminal: TerminalID,
}

impl lr::driver::Token for Tagged<'_> {
    fn as_terminal(&self) -> TerminalID {
        self.terminal
    }
}

#[derive(Debug)]
enum Value {
    Grammar(ast::GrammarLiteral),
    Defs(Vec<ast::Definition>),
    Def(ast::Definition),
    Rules(Vec<Vec<String>>),
    Rule(Vec<String>),
    Terms(Vec<String>),
}

fn literal_grammar() -> Result<Grammar, GrammarDefError> {
    Grammar::define(|g| {
        for (left, right) in LITERAL_GRAMMAR {
            let left = g.nonterminal(left)?;
            let mut symbols = vec![];
            for elem in *right {
                let symbol = if elem.starts_with('<') {
                    SymbolID::N(g.nonterminal(elem)?)
                } else {
                    SymbolID::T(g.terminal(elem.chars().next().unwrap_or('s'))?)
                };
                symbols.push(symbol);
            }
            g.rule(left, symbols)?;
        }
        Ok(())
    })
}

/// The literal grammar together with its LALR(1) table.
struct LiteralReader {
    grammar: Grammar,
    table: ParseTable,
}

fn literal_reader() -> anyhow::Result<&'static LiteralReader> {
    static READER: OnceLock<Result<LiteralReader, String>> = OnceLock::new();
    READER
        .get_or_init(|| {
            let grammar = literal_grammar().map_err(|err| err.to_string())?;
            let table = lr::Config::new()
                .use_lalr1()
                .generate(&grammar)
                .map_err(|err| err.to_string())?;
            Ok(LiteralReader { grammar, table })
        })
        .as_ref()
        .map_err(|msg| anyhow::anyhow!("broken literal grammar: {}", msg))
}

pub fn parse(source: &str) -> anyhow::Result<ast::GrammarLiteral> {
    let _span = tracing::trace_span!("syntax::parse").entered();

    let LiteralReader { grammar, table } = literal_reader()?;

    let mut tokens = vec![];
    for spanned in Lexer::new(source) {
        let spanned = spanned.map_err(|err| anyhow::anyhow!("lexer error: {:?}", err))?;
        let terminal = grammar
            .terminal_of(spanned.1.tag())
            .ok_or_else(|| anyhow::anyhow!("unexpected token: {:?}", spanned.1))?;
        tokens.push(Tagged { spanned, terminal });
    }
    let locations: Vec<_> = tokens.iter().map(|t| t.spanned.0).collect();

    let mut driver = Driver::new(table);
    let mut input = tokens.into_iter();
    let mut args = vec![];
    let mut stack: Vec<Value> = vec![];

    macro_rules! pop_stack {
        ($variant:ident) => {
            match stack.pop() {
                Some(Value::$variant(value)) => value,
                value => anyhow::bail!("unexpected semantic value: {:?}", value),
            }
        };
    }

    macro_rules! peek_stack {
        ($variant:ident) => {
            match stack.last_mut() {
                Some(Value::$variant(value)) => value,
                value => anyhow::bail!("unexpected semantic value: {:?}", value),
            }
        };
    }

    loop {
        let event = driver.next_event(&mut input, &mut args).map_err(|err| match err {
            DriverError::Unexpected { position, .. } => match locations.get(position) {
                Some(loc) => anyhow::anyhow!(
                    "syntax error: unexpected token at line {}, column {}",
                    loc.line + 1,
                    loc.col + 1
                ),
                None => anyhow::anyhow!("syntax error: unexpected end of input"),
            },
            err => anyhow::Error::from(err),
        })?;

        match event {
            ParseEvent::Reduce(rule) => {
                let left = grammar.rules[&rule].left();
                let left = grammar.nonterminals[&left].name();
                tracing::trace!("reduce: {}", grammar.rules[&rule].display(grammar));

                use ParseItem::{N, T};
                match (left, &args[..]) {
                    ("<grammar>", [T(_), N(_), T(_)]) | ("<grammar>", [T(_), N(_), T(_), T(_)]) => {
                        let defs = pop_stack!(Defs);
                        stack.push(Value::Grammar(ast::GrammarLiteral { defs }));
                    }
                    ("<grammar>", [T(_), T(_)]) => {
                        stack.push(Value::Grammar(ast::GrammarLiteral { defs: vec![] }));
                    }

                    ("<defs>", [N(_)]) => {
                        let def = pop_stack!(Def);
                        stack.push(Value::Defs(vec![def]));
                    }
                    ("<defs>", [N(_), T(_), N(_)]) => {
                        let def = pop_stack!(Def);
                        let defs = peek_stack!(Defs);
                        defs.push(def);
                    }

                    ("<def>", [T(name), T(_), T(_), T(_)]) => {
                        stack.push(Value::Def(ast::Definition {
                            name: string_of(name)?,
                            rules: vec![],
                        }));
                    }
                    ("<def>", [T(name), T(_), T(_), N(_), T(_)])
                    | ("<def>", [T(name), T(_), T(_), N(_), T(_), T(_)]) => {
                        let rules = pop_stack!(Rules);
                        stack.push(Value::Def(ast::Definition {
                            name: string_of(name)?,
                            rules,
                        }));
                    }

                    ("<rules>", [N(_)]) => {
                        let rule = pop_stack!(Rule);
                        stack.push(Value::Rules(vec![rule]));
                    }
                    ("<rules>", [N(_), T(_), N(_)]) => {
                        let rule = pop_stack!(Rule);
                        let rules = peek_stack!(Rules);
                        rules.push(rule);
                    }

                    ("<rule>", [T(_), T(_)]) => {
                        stack.push(Value::Rule(vec![]));
                    }
                    ("<rule>", [T(_), N(_), T(_)]) | ("<rule>", [T(_), N(_), T(_), T(_)]) => {
                        let terms = pop_stack!(Terms);
                        stack.push(Value::Rule(terms));
                    }

                    ("<terms>", [T(term)]) => {
                        stack.push(Value::Terms(vec![string_of(term)?]));
                    }
                    ("<terms>", [N(_), T(_), T(term)]) => {
                        let term = string_of(term)?;
                        let terms = peek_stack!(Terms);
                        terms.push(term);
                    }

                    _ => unreachable!(),
                }
            }

            ParseEvent::Accept => {
                tracing::trace!("accepted");
                let literal = pop_stack!(Grammar);
                tracing::trace!(" --> {:?}", literal);
                return Ok(literal);
            }
        }
    }
}

fn string_of(item: &Tagged<'_>) -> anyhow::Result<String> {
    match item.spanned.1 {
        Token::Str(raw) => Ok(unescape(raw)),
        token => anyhow::bail!("expected a string, found {:?}", token),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn smoketest() {
        let _ = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(Level::TRACE)
            .try_init();

        let input = r#"
{
    "<start>": [["<expr>"]],
    "<expr>": [["<expr>", "+", "<expr>"], ['1'],],
    '<empty>': [[]],
    "<none>": []
}
"#;
        let parsed = parse(input).unwrap();
        assert_eq!(parsed.defs.len(), 4);
        assert_eq!(parsed.defs[0].name, "<start>");
        assert_eq!(parsed.defs[1].rules, vec![vec!["<expr>", "+", "<expr>"], vec!["1"]]);
        assert_eq!(parsed.defs[2].rules, vec![Vec::<String>::new()]);
        assert!(parsed.defs[3].rules.is_empty());
    }

    #[test]
    fn escaped_quote_terminal() {
        let parsed = parse(r#"{"<q>": [["\""], ["\\"]]}"#).unwrap();
        assert_eq!(parsed.defs[0].rules, vec![vec!["\""], vec!["\\"]]);
    }

    #[test]
    fn syntax_error_reports_location() {
        let err = parse("{\n  \"<S>\" [[\"a\"]]\n}").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("line 2"), "{}", msg);
    }

    #[test]
    fn reader_table_is_built_once() {
        let first = literal_reader().unwrap();
        let second = literal_reader().unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(parse(r#"{"<S>": [["a"]]}"#).is_ok());
    }

    #[test]
    fn empty_grammar_literal() {
        assert!(parse("{}").unwrap().defs.is_empty());
        assert!(parse("{").is_err());
    }
}
