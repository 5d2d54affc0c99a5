//! Name interning table for fast, case-insensitive lookups.

use std::collections::HashMap;

/// Handle to an interned name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Intern table mapping names to unique symbols.
///
/// Lookup is case-insensitive (`Sensor_State` and `sensor_state` intern to the
/// same symbol); the spelling of the first occurrence is the one kept for
/// display.
#[derive(Debug, Default, Clone)]
pub struct NameTable {
    names: Vec<String>,
    lookup: HashMap<String, Symbol>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        let key = s.to_ascii_lowercase();
        if let Some(&sym) = self.lookup.get(&key) {
            return sym;
        }
        let sym = Symbol(self.names.len() as u32);
        self.names.push(s.to_string());
        self.lookup.insert(key, sym);
        sym
    }

    /// Find an already-interned name without inserting it.
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.lookup.get(&s.to_ascii_lowercase()).copied()
    }

    pub fn resolve(&self, sym: Symbol) -> Option<&str> {
        self.names.get(sym.index()).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
