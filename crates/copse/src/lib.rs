//! General context-free parsing and regular grammar inference.

pub mod analysis;
pub mod earley;
pub mod fuzzer;
pub mod gll;
pub mod grammar;
pub mod lr;
pub mod lstar;
pub mod parser;
pub mod regular;
pub mod rpni;
pub mod sppf;
pub mod syntax;
pub mod tree;
pub mod types;
pub mod util;
