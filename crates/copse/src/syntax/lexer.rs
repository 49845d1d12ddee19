//! Lexer implementation.

use lexgen_util::Loc;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Token<'input> {
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Colon,
    Comma,
    /// The raw body of a quoted string, escapes not yet resolved.
    Str(&'input str),
}

impl Token<'_> {
    /// The single-character tag used by the literal grammar.
    pub fn tag(&self) -> char {
        match self {
            Token::LBrace => '{',
            Token::RBrace => '}',
            Token::LBracket => '[',
            Token::RBracket => ']',
            Token::Colon => ':',
            Token::Comma => ',',
            Token::Str(..) => 's',
        }
    }
}

pub type Spanned<'input> = (Loc, Token<'input>, Loc);

fn strip_quotes(quoted: &str, quote: char) -> &str {
    let body = quoted.strip_suffix(quote).unwrap_or(quoted);
    body.strip_prefix(quote).unwrap_or(body)
}

lexgen::lexer! {
    pub Lexer -> Token<'input>;

    let whitespace = [' ' '\t' '\n' '\r'];

    rule Init {
        $whitespace+,
        "{" = Token::LBrace,
        "}" = Token::RBrace,
        "[" = Token::LBracket,
        "]" = Token::RBracket,
        ":" = Token::Colon,
        "," = Token::Comma,
        '"' => |lexer| {
            lexer.switch(LexerRule::DoubleQuoted)
        },
        '\'' => |lexer| {
            lexer.switch(LexerRule::SingleQuoted)
        },
    }

    rule DoubleQuoted {
        '\\' _ => |lexer| lexer.continue_(),
        '"' => |lexer| {
            let token = Token::Str(strip_quotes(lexer.match_(), '"'));
            lexer.switch_and_return(LexerRule::Init, token)
        },
        _ => |lexer| lexer.continue_(),
    }

    rule SingleQuoted {
        '\\' _ => |lexer| lexer.continue_(),
        '\'' => |lexer| {
            let token = Token::Str(strip_quotes(lexer.match_(), '\''));
            lexer.switch_and_return(LexerRule::Init, token)
        },
        _ => |lexer| lexer.continue_(),
    }
}
