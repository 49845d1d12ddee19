//! Active learning of regular languages with Angluin's L* algorithm.

use crate::{
    earley::EarleyParser,
    fuzzer::RandomSampler,
    grammar::{Grammar, GrammarDefError},
    parser::Parser,
    regular::Dfa,
    types::{Map, Set},
};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// The answer to an equivalence query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Equivalence {
    Equivalent,
    Counterexample(String),
}

/// Answers the membership and equivalence queries of the learner.
pub trait Teacher {
    fn is_member(&mut self, input: &str) -> bool;

    /// Compare the hypothesis, given as a right-linear grammar, with the target language.
    fn is_equivalent(&mut self, hypothesis: &Grammar) -> Equivalence;
}

#[derive(Debug, thiserror::Error)]
pub enum LStarError {
    #[error("no equivalent hypothesis after {rounds} rounds")]
    RoundLimit { rounds: usize },

    #[error("the counterexample {0:?} adds no new prefix")]
    StaleCounterexample(String),

    #[error("failed to export the hypothesis: {0}")]
    Grammar(#[from] GrammarDefError),
}

/// The rows `P ∪ P·A` and columns `S` of membership answers.
#[derive(Debug, Clone)]
pub struct ObservationTable {
    alphabet: Vec<char>,
    prefixes: Set<String>,
    suffixes: Set<String>,
    cells: Map<String, bool>,
}

impl ObservationTable {
    pub fn new(alphabet: impl IntoIterator<Item = char>) -> Self {
        let mut alphabet: Vec<char> = alphabet.into_iter().collect();
        alphabet.sort_unstable();
        alphabet.dedup();
        Self {
            alphabet,
            prefixes: [String::new()].into_iter().collect(),
            suffixes: [String::new()].into_iter().collect(),
            cells: Map::default(),
        }
    }

    pub fn alphabet(&self) -> &[char] {
        &self.alphabet
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> + '_ {
        self.prefixes.iter().map(|s| &**s)
    }

    pub fn suffixes(&self) -> impl Iterator<Item = &str> + '_ {
        self.suffixes.iter().map(|s| &**s)
    }

    /// Return `true` if `prefix` was not in `P` yet.
    pub fn add_prefix(&mut self, prefix: &str) -> bool {
        self.prefixes.insert(prefix.to_owned())
    }

    /// Return `true` if `suffix` was not in `S` yet.
    pub fn add_suffix(&mut self, suffix: &str) -> bool {
        self.suffixes.insert(suffix.to_owned())
    }

    fn extensions(&self) -> Vec<String> {
        let mut rows: Set<String> = self.prefixes.clone();
        for p in &self.prefixes {
            for a in &self.alphabet {
                rows.insert(format!("{}{}", p, a));
            }
        }
        rows.into_iter().collect()
    }

    /// Ask the teacher for every missing cell of `(P ∪ P·A) × S`.
    pub fn fill<T: Teacher + ?Sized>(&mut self, teacher: &mut T) {
        for row in self.extensions() {
            for suffix in &self.suffixes {
                let query = format!("{}{}", row, suffix);
                if !self.cells.contains_key(&query) {
                    let answer = teacher.is_member(&query);
                    tracing::trace!("member {:?} = {}", query, answer);
                    self.cells.insert(query, answer);
                }
            }
        }
    }

    /// `T[p, s]`, or `None` if it was not filled yet.
    pub fn cell(&self, prefix: &str, suffix: &str) -> Option<bool> {
        self.cells.get(&format!("{}{}", prefix, suffix)).copied()
    }

    pub fn row(&self, prefix: &str) -> Vec<Option<bool>> {
        self.suffixes.iter().map(|s| self.cell(prefix, s)).collect()
    }

    /// Return a row of `P·A` matching no row of `P`, if any.
    pub fn is_closed(&self) -> Option<String> {
        let rows: Set<Vec<Option<bool>>> = self.prefixes.iter().map(|p| self.row(p)).collect();
        for p in &self.prefixes {
            for a in &self.alphabet {
                let t = format!("{}{}", p, a);
                if !rows.contains(&self.row(&t)) {
                    return Some(t);
                }
            }
        }
        None
    }

    /// Return a suffix `a·s` telling apart two equal rows of `P`, if any.
    pub fn is_consistent(&self) -> Option<String> {
        for (i, p1) in self.prefixes.iter().enumerate() {
            for p2 in self.prefixes.iter().skip(i + 1) {
                if self.row(p1) != self.row(p2) {
                    continue;
                }
                for a in &self.alphabet {
                    for s in &self.suffixes {
                        let left = self.cell(&format!("{}{}", p1, a), s);
                        let right = self.cell(&format!("{}{}", p2, a), s);
                        if left != right {
                            return Some(format!("{}{}", a, s));
                        }
                    }
                }
            }
        }
        None
    }

    /// Build the DFA whose states are the distinct rows of `P`.
    ///
    /// Return `None` unless the table is filled and closed.
    pub fn hypothesis(&self) -> Option<Dfa> {
        let mut states: Map<Vec<Option<bool>>, usize> = Map::default();
        let mut dfa = Dfa::new();
        // `P` starts with ε, so the start row becomes state 0.
        for p in &self.prefixes {
            let row = self.row(p);
            if states.contains_key(&row) {
                continue;
            }
            let accepting = self.cell(p, "")?;
            let q = if states.is_empty() {
                dfa.set_accepting(Dfa::START, accepting);
                Dfa::START
            } else {
                dfa.add_state(accepting)
            };
            states.insert(row, q);
        }

        for p in &self.prefixes {
            let from = states[&self.row(p)];
            for a in &self.alphabet {
                let to = *states.get(&self.row(&format!("{}{}", p, a)))?;
                dfa.add_transition(from, *a, to);
            }
        }
        Some(dfa)
    }
}

#[derive(Debug, Clone)]
pub struct LStar {
    alphabet: Vec<char>,
    max_rounds: usize,
}

impl LStar {
    pub fn new(alphabet: impl IntoIterator<Item = char>) -> Self {
        Self {
            alphabet: alphabet.into_iter().collect(),
            max_rounds: 100,
        }
    }

    /// Give up after this many equivalence queries.
    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn learn<T: Teacher + ?Sized>(&self, teacher: &mut T) -> Result<Dfa, LStarError> {
        let _span = tracing::trace_span!("LStar::learn").entered();
        let mut table = ObservationTable::new(self.alphabet.iter().copied());

        for round in 1..=self.max_rounds {
            table.fill(teacher);
            loop {
                if let Some(t) = table.is_closed() {
                    tracing::trace!("not closed: {:?}", t);
                    table.add_prefix(&t);
                } else if let Some(s) = table.is_consistent() {
                    tracing::trace!("not consistent: {:?}", s);
                    table.add_suffix(&s);
                } else {
                    break;
                }
                table.fill(teacher);
            }

            let dfa = match table.hypothesis() {
                Some(dfa) => dfa,
                None => unreachable!("a filled and closed table has a hypothesis"),
            };
            let grammar = dfa.to_grammar()?;
            tracing::debug!(
                "round {}: hypothesis with {} states ({} prefixes, {} suffixes)",
                round,
                dfa.states().len(),
                table.prefixes.len(),
                table.suffixes.len()
            );

            match teacher.is_equivalent(&grammar) {
                Equivalence::Equivalent => return Ok(dfa),
                Equivalence::Counterexample(c) => {
                    tracing::debug!("counterexample: {:?}", c);
                    let mut grew = false;
                    for (i, _) in c.char_indices().skip(1).chain([(c.len(), ' ')]) {
                        grew |= table.add_prefix(&c[..i]);
                    }
                    if !grew {
                        return Err(LStarError::StaleCounterexample(c));
                    }
                }
            }
        }

        Err(LStarError::RoundLimit {
            rounds: self.max_rounds,
        })
    }
}

/// Accuracy and confidence of the sampled equivalence check.
#[derive(Debug, Clone, Copy)]
pub struct PacConfig {
    /// Accuracy: the tolerated probability of a wrong answer on a sampled string.
    pub epsilon: f64,
    /// Confidence: the tolerated probability of exceeding `epsilon`.
    pub delta: f64,
    /// Longest string drawn per query.
    pub max_length: usize,
    pub seed: u64,
}

impl Default for PacConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            delta: 0.1,
            max_length: 10,
            seed: 0,
        }
    }
}

impl PacConfig {
    /// `ceil((1/ε)(ln(1/δ) + k ln 2))` samples for the `k`-th query.
    pub fn samples(&self, k: usize) -> usize {
        let n = (1.0 / self.epsilon) * ((1.0 / self.delta).ln() + k as f64 * 2f64.ln());
        n.ceil() as usize
    }
}

enum Target {
    Grammar(Grammar),
    Predicate {
        alphabet: Vec<char>,
        is_member: Box<dyn FnMut(&str) -> bool>,
    },
}

/// A teacher answering equivalence by random sampling from both languages.
///
/// The `k`-th equivalence query draws `n = config.samples(k)` strings of every
/// length in `0..=max_length` from the target and again from the hypothesis,
/// so up to `2 × n × (max_length + 1)` strings in total, `n × (max_length + 1)`
/// from each side.
pub struct PacTeacher {
    target: Target,
    config: PacConfig,
    rng: StdRng,
    queries: usize,
}

impl std::fmt::Debug for PacTeacher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacTeacher")
            .field("config", &self.config)
            .field("queries", &self.queries)
            .finish_non_exhaustive()
    }
}

impl PacTeacher {
    /// A teacher for the language of `target` from its start symbol.
    pub fn new(target: Grammar, config: PacConfig) -> Self {
        Self {
            target: Target::Grammar(target),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            queries: 0,
        }
    }

    /// A teacher for the strings over `alphabet` accepted by `is_member`.
    ///
    /// Target strings are drawn uniformly over the alphabet.
    pub fn from_fn<F>(alphabet: impl IntoIterator<Item = char>, is_member: F, config: PacConfig) -> Self
    where
        F: FnMut(&str) -> bool + 'static,
    {
        Self {
            target: Target::Predicate {
                alphabet: alphabet.into_iter().collect(),
                is_member: Box::new(is_member),
            },
            rng: StdRng::seed_from_u64(config.seed),
            config,
            queries: 0,
        }
    }

    /// The number of equivalence queries answered so far.
    pub fn queries(&self) -> usize {
        self.queries
    }

    fn draw_target(&mut self, len: usize, n: usize) -> Vec<String> {
        match &self.target {
            Target::Grammar(g) => draw(g, len, n, &mut self.rng),
            Target::Predicate { alphabet, .. } if alphabet.is_empty() => vec![],
            Target::Predicate { alphabet, .. } => (0..n)
                .map(|_| {
                    (0..len)
                        .map(|_| alphabet[self.rng.gen_range(0..alphabet.len())])
                        .collect()
                })
                .collect(),
        }
    }
}

/// Draw up to `n` strings of length `len` from the language of `g`.
fn draw<R: Rng>(g: &Grammar, len: usize, n: usize, rng: &mut R) -> Vec<String> {
    let mut sampler = RandomSampler::new(g);
    let mut strings = vec![];
    for _ in 0..n {
        match sampler.sample(g.start_symbol, len, rng) {
            Some(tree) => strings.push(tree.yield_string(g)),
            None => break,
        }
    }
    strings
}

impl Teacher for PacTeacher {
    fn is_member(&mut self, input: &str) -> bool {
        match &mut self.target {
            Target::Grammar(g) => EarleyParser::new(g).recognize(input),
            Target::Predicate { is_member, .. } => is_member(input),
        }
    }

    fn is_equivalent(&mut self, hypothesis: &Grammar) -> Equivalence {
        self.queries += 1;
        let n = self.config.samples(self.queries);
        let _span = tracing::trace_span!("PacTeacher::is_equivalent", query = self.queries, n).entered();
        let recognizer = EarleyParser::new(hypothesis);

        for len in 0..=self.config.max_length {
            for s in self.draw_target(len, n) {
                if self.is_member(&s) != recognizer.recognize(&s) {
                    return Equivalence::Counterexample(s);
                }
            }
            for s in draw(hypothesis, len, n, &mut self.rng) {
                if !self.is_member(&s) {
                    return Equivalence::Counterexample(s);
                }
            }
        }

        tracing::debug!("no counterexample within {} samples per length", n);
        Equivalence::Equivalent
    }
}
