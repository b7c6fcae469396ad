//! String interning.
//!
//! Identifiers, member names, and literal strings are deduplicated into
//! `Atom` handles. Comparing two atoms is an integer compare; resolving an
//! atom back to its text is a table lookup. The interner is append-only and
//! safe to share across threads.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::RwLock;

/// Handle to an interned string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Atom(pub u32);

/// Append-only string interner.
///
/// `intern` deduplicates; `resolve` returns the original text. Atoms are
/// only meaningful relative to the interner that produced them.
pub struct Interner {
    map: DashMap<String, Atom>,
    strings: RwLock<Vec<String>>,
}

impl Interner {
    pub fn new() -> Self {
        Interner {
            map: DashMap::new(),
            strings: RwLock::new(Vec::new()),
        }
    }

    /// Intern a string, returning its atom. Idempotent.
    pub fn intern(&self, text: &str) -> Atom {
        if let Some(existing) = self.map.get(text) {
            return *existing;
        }
        // Entry API keeps concurrent interns of the same string from
        // allocating two different atoms.
        *self
            .map
            .entry(text.to_string())
            .or_insert_with(|| {
                let mut strings = self.strings.write().unwrap_or_else(|e| e.into_inner());
                let atom = Atom(strings.len() as u32);
                strings.push(text.to_string());
                atom
            })
            .value()
    }

    /// Resolve an atom back to its text.
    ///
    /// Panics if the atom did not come from this interner.
    pub fn resolve(&self, atom: Atom) -> String {
        let strings = self.strings.read().unwrap_or_else(|e| e.into_inner());
        strings[atom.0 as usize].clone()
    }

    /// Number of distinct strings interned so far.
    pub fn len(&self) -> usize {
        self.strings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_deduplicates() {
        let interner = Interner::new();
        let a = interner.intern("hello");
        let b = interner.intern("hello");
        let c = interner.intern("world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn resolve_round_trips() {
        let interner = Interner::new();
        let a = interner.intern("solve");
        assert_eq!(interner.resolve(a), "solve");
    }

    #[test]
    fn empty_string_is_internable() {
        let interner = Interner::new();
        let a = interner.intern("");
        assert_eq!(interner.resolve(a), "");
    }
}
