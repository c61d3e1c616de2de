//! String interning.
//!
//! Every name the engine touches (token text, macro names, file names,
//! definition names) is stored once in an [`Interner`] and referred to by
//! a [`Symbol`] handle. Symbols are `Copy` and compare as integers, which
//! makes macro-table probes and scope lookups cheap no matter how long the
//! underlying string is.
//!
//! ```
//! use declmap_base::Interner;
//!
//! let mut interner = Interner::new();
//! let a = interner.intern("wchar_t");
//! let b = interner.intern("wchar_t");
//! assert_eq!(a, b);
//! assert_eq!(interner.resolve(a), "wchar_t");
//! ```

use std::collections::HashMap;

/// A handle to a string stored in an [`Interner`].
///
/// Index 0 is always the empty string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Symbol(u32);

impl Symbol {
    /// The empty string, pre-interned in every interner.
    pub const EMPTY: Symbol = Symbol(0);

    /// The raw index of this symbol, usable for dense side tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Symbol::EMPTY
    }
}

/// Stores each distinct string once and hands out [`Symbol`] handles.
#[derive(Default)]
pub struct Interner {
    map: HashMap<String, Symbol>,
    strings: Vec<String>,
}

impl Interner {
    pub fn new() -> Self {
        let mut out = Interner {
            map: HashMap::new(),
            strings: Vec::new(),
        };
        out.strings.push(String::new());
        out.map.insert(String::new(), Symbol::EMPTY);
        out
    }

    /// Interns `s`, returning the existing handle if it is already present.
    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.map.get(s) {
            return sym;
        }
        self.insert(s.to_owned())
    }

    /// Interns an owned string without copying it when it is new.
    pub fn intern_owned(&mut self, s: String) -> Symbol {
        if let Some(&sym) = self.map.get(s.as_str()) {
            return sym;
        }
        self.insert(s)
    }

    fn insert(&mut self, s: String) -> Symbol {
        let sym = Symbol(self.strings.len() as u32);
        self.map.insert(s.clone(), sym);
        self.strings.push(s);
        sym
    }

    /// Returns the string behind `sym`.
    ///
    /// # Panics
    ///
    /// Panics if `sym` came from a different interner.
    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.strings[sym.0 as usize]
    }

    /// Looks up a string without interning it.
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.map.get(s).copied()
    }

    /// Number of distinct strings, counting the pre-interned empty string.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.len() <= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_string_same_symbol() {
        let mut i = Interner::new();
        assert_eq!(i.intern("foo"), i.intern("foo"));
    }

    #[test]
    fn different_strings_different_symbols() {
        let mut i = Interner::new();
        assert_ne!(i.intern("foo"), i.intern("bar"));
    }

    #[test]
    fn resolve_round_trips() {
        let mut i = Interner::new();
        let sym = i.intern("__VA_ARGS__");
        assert_eq!(i.resolve(sym), "__VA_ARGS__");
    }

    #[test]
    fn empty_symbol_is_reserved() {
        let i = Interner::new();
        assert_eq!(i.resolve(Symbol::EMPTY), "");
        assert_eq!(i.len(), 1);
        assert!(i.is_empty());
    }

    #[test]
    fn intern_owned_reuses_existing() {
        let mut i = Interner::new();
        let a = i.intern("x");
        let b = i.intern_owned("x".to_string());
        assert_eq!(a, b);
        assert_eq!(i.len(), 2);
    }

    #[test]
    fn get_does_not_intern() {
        let mut i = Interner::new();
        assert_eq!(i.get("missing"), None);
        let sym = i.intern("present");
        assert_eq!(i.get("present"), Some(sym));
    }
}
