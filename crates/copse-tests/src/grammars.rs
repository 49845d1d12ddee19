//! Grammar definitions for integration tests.

use copse::grammar::{GrammarDef, GrammarDefError, SymbolID::*};

type Result = std::result::Result<(), GrammarDefError>;

/// `A := E '=' E | x`, `E := E '+' T | T`, `T := 1 | x`
pub fn g_simple1(g: &mut GrammarDef<'_>) -> Result {
    let equal = g.terminal('=')?;
    let plus = g.terminal('+')?;
    let ident = g.terminal('x')?;
    let num = g.terminal('1')?;

    let a = g.nonterminal("<A>")?;
    let e = g.nonterminal("<E>")?;
    let t = g.nonterminal("<T>")?;

    g.start_symbol(a)?;

    g.rule(a, [N(e), T(equal), N(e)])?;
    g.rule(a, [T(ident)])?;
    g.rule(e, [N(e), T(plus), N(t)])?;
    g.rule(e, [N(t)])?;
    g.rule(t, [T(num)])?;
    g.rule(t, [T(ident)])?;
    Ok(())
}

/// Arithmetic with four operators over single digits.
pub fn g_simple2(g: &mut GrammarDef<'_>) -> Result {
    // declare terminal symbols.
    let lparen = g.terminal('(')?;
    let rparen = g.terminal(')')?;
    let plus = g.terminal('+')?;
    let minus = g.terminal('-')?;
    let star = g.terminal('*')?;
    let slash = g.terminal('/')?;

    // declare nonterminal symbols.
    let expr = g.nonterminal("<expr>")?;
    let factor = g.nonterminal("<factor>")?;
    let term = g.nonterminal("<term>")?;
    let digit = g.nonterminal("<digit>")?;

    g.start_symbol(expr)?;

    // declare syntax rules.
    g.rule(expr, [N(expr), T(plus), N(factor)])?; // expr '+' factor
    g.rule(expr, [N(expr), T(minus), N(factor)])?; // expr '-' factor
    g.rule(expr, [N(factor)])?; // factor
    g.rule(factor, [N(factor), T(star), N(term)])?; // factor '*' term
    g.rule(factor, [N(factor), T(slash), N(term)])?; // factor '/' term
    g.rule(factor, [N(term)])?; // term
    g.rule(term, [N(digit)])?; // digit
    g.rule(term, [T(lparen), N(expr), T(rparen)])?; // '(' expr ')'
    for ch in '0'..='9' {
        let d = g.terminal(ch)?;
        g.rule(digit, [T(d)])?;
    }
    Ok(())
}

/// `E := E '+' T | T`, `T := T '*' a | a`
pub fn g1(g: &mut GrammarDef<'_>) -> Result {
    let plus = g.terminal('+')?;
    let star = g.terminal('*')?;
    let a = g.terminal('a')?;

    let e = g.nonterminal("<E>")?;
    let t = g.nonterminal("<T>")?;

    g.start_symbol(e)?;

    g.rule(e, [N(e), T(plus), N(t)])?;
    g.rule(e, [N(t)])?;
    g.rule(t, [N(t), T(star), T(a)])?;
    g.rule(t, [T(a)])?;
    Ok(())
}

/// LR(1) but not LALR(1): merging the states after `x` mixes up the lookaheads
/// of `<type>` and `<name>`.
pub fn g2(g: &mut GrammarDef<'_>) -> Result {
    let comma = g.terminal(',')?;
    let colon = g.terminal(':')?;
    let ident = g.terminal('x')?;

    let def = g.nonterminal("<def>")?;
    let param_spec = g.nonterminal("<param_spec>")?;
    let return_spec = g.nonterminal("<return_spec>")?;
    let type_ = g.nonterminal("<type>")?;
    let name = g.nonterminal("<name>")?;
    let name_list = g.nonterminal("<name_list>")?;

    g.rule(def, [N(param_spec), N(return_spec), T(comma)])?;
    g.rule(param_spec, [N(type_)])?;
    g.rule(param_spec, [N(name_list), T(colon), N(type_)])?;
    g.rule(return_spec, [N(type_)])?;
    g.rule(return_spec, [N(name), T(colon), N(type_)])?;
    g.rule(type_, [T(ident)])?;
    g.rule(name, [T(ident)])?;
    g.rule(name_list, [N(name)])?;
    g.rule(name_list, [N(name), T(comma), N(name_list)])?;
    Ok(())
}

/// `E := E '+' T | T`, `T := '(' E ')' | n`
pub fn g4(g: &mut GrammarDef<'_>) -> Result {
    let plus = g.terminal('+')?;
    let lparen = g.terminal('(')?;
    let rparen = g.terminal(')')?;
    let num = g.terminal('n')?;

    let e = g.nonterminal("<E>")?;
    let t = g.nonterminal("<T>")?;

    g.rule(e, [N(e), T(plus), N(t)])?;
    g.rule(e, [N(t)])?;
    g.rule(t, [T(lparen), N(e), T(rparen)])?;
    g.rule(t, [T(num)])?;
    Ok(())
}

/// `S := C C C`, `C := '*' C | 1`: LR(1) states that differ only in lookaheads.
pub fn lookahead_merge(g: &mut GrammarDef<'_>) -> Result {
    let star = g.terminal('*')?;
    let one = g.terminal('1')?;

    let s = g.nonterminal("<S>")?;
    let c = g.nonterminal("<C>")?;

    g.rule(s, [N(c), N(c), N(c)])?;
    g.rule(c, [T(star), N(c)])?;
    g.rule(c, [T(one)])?;
    Ok(())
}

/// `S := A`, `A := a A | ε`
pub const EPSILON: &str = r#"{"<S>": [["<A>"]], "<A>": [["a", "<A>"], []]}"#;

/// `S := A`, `A := A a | ε`
pub const LEFT_RECURSIVE: &str = r#"{"<S>": [["<A>"]], "<A>": [["<A>", "a"], []]}"#;

/// `E := E '+' E | 1`
pub const AMBIGUOUS_SUM: &str = r#"{"<E>": [["<E>", "+", "<E>"], ["1"]]}"#;

/// `E := T '+' E | T`, `T := 1`
pub const LR0_CONFLICT: &str = r#"{"<E>": [["<T>", "+", "<E>"], ["<T>"]], "<T>": [["1"]]}"#;

/// `A := a A | a`, right recursive.
pub const RIGHT_RECURSIVE: &str = r#"{"<A>": [["a", "<A>"], ["a"]]}"#;

/// Balanced parentheses, `S := ( S ) S | ε`.
pub const BALANCED: &str = r#"{"<S>": [["(", "<S>", ")", "<S>"], []]}"#;

/// `S := a* b` as a right-linear grammar.
pub const A_STAR_B: &str = r#"{"<S>": [["a", "<S>"], ["b"]]}"#;
