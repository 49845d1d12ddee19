use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use copse::{
    earley::EarleyParser,
    fuzzer::LimitFuzzer,
    gll::GLLParser,
    grammar::Grammar,
    lr::{self, LRParser},
    parser::Parser as _,
    rpni,
};
use rand::{rngs::StdRng, SeedableRng};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse an input string and print its parse trees.
    Parse {
        #[arg(long, value_enum, default_value_t = Algorithm::Earley)]
        algorithm: Algorithm,
        /// The start nonterminal, e.g. `<expr>`. Defaults to the grammar's start symbol.
        #[arg(long)]
        start: Option<String>,
        /// Print every tree instead of the first one.
        #[arg(long)]
        all: bool,
        /// The path of the grammar definition file.
        grammar: PathBuf,
        input: String,
    },

    /// Print the LR automaton and parse table of a grammar.
    Table {
        #[arg(long, value_enum, default_value_t = LRAlgorithm::Lalr1)]
        algorithm: LRAlgorithm,
        grammar: PathBuf,
    },

    /// Generate random sentences from a grammar.
    Fuzz {
        grammar: PathBuf,
        #[arg(short, default_value_t = 10)]
        n: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value_t = 10)]
        max_depth: usize,
    },

    /// Learn a regular grammar from positive and negative samples, one per line.
    Rpni {
        #[arg(long)]
        positive: PathBuf,
        #[arg(long)]
        negative: PathBuf,
    },
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Algorithm {
    Earley,
    Gll,
    Lr0,
    Slr1,
    Lalr1,
    Lr1,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum LRAlgorithm {
    Lr0,
    Slr1,
    Lalr1,
    Lr1,
}

impl LRAlgorithm {
    fn config(self) -> lr::Config {
        let mut config = lr::Config::new();
        match self {
            LRAlgorithm::Lr0 => config.use_lr0(),
            LRAlgorithm::Slr1 => config.use_slr1(),
            LRAlgorithm::Lalr1 => config.use_lalr1(),
            LRAlgorithm::Lr1 => config.use_lr1(),
        };
        config
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::trace!("CLI args = {:?}", args);

    match args.command {
        Command::Parse {
            algorithm,
            start,
            all,
            grammar,
            input,
        } => parse(algorithm, start.as_deref(), all, &grammar, &input),
        Command::Table { algorithm, grammar } => table(algorithm, &grammar),
        Command::Fuzz {
            grammar,
            n,
            seed,
            max_depth,
        } => fuzz(&grammar, n, seed, max_depth),
        Command::Rpni { positive, negative } => learn(&positive, &negative),
    }
}

fn read_grammar(path: &Path) -> anyhow::Result<Grammar> {
    Grammar::from_file(path)
        .with_context(|| format!("failed to read the grammar from {}", path.display()))
}

fn parse(
    algorithm: Algorithm,
    start: Option<&str>,
    all: bool,
    path: &Path,
    input: &str,
) -> anyhow::Result<()> {
    let mut grammar = read_grammar(path)?;
    if let Some(name) = start {
        let start = grammar
            .nonterminal_by_name(name)
            .with_context(|| format!("no nonterminal named {}", name))?;
        grammar = grammar.with_start(start);
    }

    let started = Instant::now();
    let parses = match algorithm {
        Algorithm::Earley => EarleyParser::new(&grammar).parse(input),
        Algorithm::Gll => GLLParser::new(&grammar).parse(input),
        Algorithm::Lr0 | Algorithm::Slr1 | Algorithm::Lalr1 | Algorithm::Lr1 => {
            let kind = match algorithm {
                Algorithm::Lr0 => LRAlgorithm::Lr0,
                Algorithm::Slr1 => LRAlgorithm::Slr1,
                Algorithm::Lalr1 => LRAlgorithm::Lalr1,
                _ => LRAlgorithm::Lr1,
            };
            let parser = LRParser::new(&grammar, &kind.config())
                .context("failed to build the parse table")?;
            parser.parse(input)
        }
    }
    .with_context(|| format!("failed to parse {:?}", input))?;

    let mut count = 0;
    for tree in parses {
        println!("{}", tree.display(&grammar));
        count += 1;
        if !all {
            break;
        }
    }
    tracing::info!("{} tree(s) in {:?}", count, started.elapsed());

    Ok(())
}

fn table(algorithm: LRAlgorithm, path: &Path) -> anyhow::Result<()> {
    let grammar = read_grammar(path)?;

    let started = Instant::now();
    let table = algorithm.config().build(&grammar);
    tracing::info!("{} states in {:?}", table.len(), started.elapsed());

    println!("{}", table.automaton().display(&grammar));
    println!("{}", table.display(&grammar));

    let conflicts = table.conflicts();
    if !conflicts.is_empty() {
        let suffix = if conflicts.len() == 1 { "" } else { "s" };
        println!("[warning] The table has {} conflicting cell{}:", conflicts.len(), suffix);
        for conflict in &conflicts {
            println!("  {}", conflict.display(&grammar));
        }
    }

    Ok(())
}

fn fuzz(path: &Path, n: usize, seed: u64, max_depth: usize) -> anyhow::Result<()> {
    let grammar = read_grammar(path)?;
    let fuzzer = LimitFuzzer::new(&grammar).max_depth(max_depth);
    let mut rng = StdRng::seed_from_u64(seed);

    let started = Instant::now();
    for _ in 0..n {
        let s = fuzzer.fuzz_string(grammar.start_symbol, &mut rng)?;
        println!("{}", s);
    }
    tracing::info!("{} sentence(s) in {:?}", n, started.elapsed());

    Ok(())
}

fn read_samples(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read samples from {}", path.display()))?;
    Ok(content.lines().map(str::to_owned).collect())
}

fn learn(positive: &Path, negative: &Path) -> anyhow::Result<()> {
    let positive = read_samples(positive)?;
    let negative = read_samples(negative)?;

    let started = Instant::now();
    let dfa = rpni::infer(&positive, &negative)?;
    tracing::info!("{} states in {:?}", dfa.states().len(), started.elapsed());

    let grammar = dfa.to_grammar().context("failed to export the learned grammar")?;
    println!("{}", grammar.literal());

    Ok(())
}
