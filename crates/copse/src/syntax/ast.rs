/// `{ "<A>": [[...], ...], ... }`
#[derive(Debug)]
pub struct GrammarLiteral {
    pub defs: Vec<Definition>,
}

/// `"<A>": [["a", "<B>"], []]`
#[derive(Debug)]
pub struct Definition {
    pub name: String,
    pub rules: Vec<Vec<String>>,
}
