//! Utility types.

use crate::grammar::TerminalID;
use bit_set::BitSet;
use std::fmt;

type BuildHasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;

pub type Map<K, V> = indexmap::IndexMap<K, V, BuildHasher>;
pub type Set<T> = indexmap::IndexSet<T, BuildHasher>;

/// A dense set of terminal symbols.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct TerminalSet {
    bits: BitSet,
}

impl TerminalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `true` if the terminal was not present.
    pub fn insert(&mut self, t: TerminalID) -> bool {
        self.bits.insert(t.index())
    }

    pub fn contains(&self, t: TerminalID) -> bool {
        self.bits.contains(t.index())
    }

    /// Add all elements of `other`, returning `true` if this set grew.
    pub fn union_with(&mut self, other: &TerminalSet) -> bool {
        let before = self.bits.len();
        self.bits.union_with(&other.bits);
        self.bits.len() != before
    }

    pub fn is_superset(&self, other: &TerminalSet) -> bool {
        self.bits.is_superset(&other.bits)
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = TerminalID> + '_ {
        self.bits.iter().map(TerminalID::from_index)
    }
}

impl FromIterator<TerminalID> for TerminalSet {
    fn from_iter<I: IntoIterator<Item = TerminalID>>(iter: I) -> Self {
        let mut set = Self::new();
        for t in iter {
            set.insert(t);
        }
        set
    }
}

impl Extend<TerminalID> for TerminalSet {
    fn extend<I: IntoIterator<Item = TerminalID>>(&mut self, iter: I) {
        for t in iter {
            self.insert(t);
        }
    }
}

impl fmt::Debug for TerminalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_set_union_reports_growth() {
        let a: TerminalSet = [TerminalID::EOI].into_iter().collect();
        let mut b = TerminalSet::new();
        assert!(b.union_with(&a));
        assert!(!b.union_with(&a));
        assert!(b.is_superset(&a));
        assert_eq!(b.iter().collect::<Vec<_>>(), vec![TerminalID::EOI]);
    }
}
