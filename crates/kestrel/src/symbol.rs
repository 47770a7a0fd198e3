//! Process-wide identifier interning.
//!
//! Identifiers are interned once and referred to by [`Symbol`] handles from
//! then on. Equality and hashing compare the handle, so symbols are free to
//! copy and cheap to compare no matter how long the name is. The table is
//! guarded by a mutex so interning is safe during multi-threaded setup;
//! evaluation itself is single-threaded and only reads.

use std::{
    fmt,
    sync::{LazyLock, Mutex},
};

use ahash::AHashMap;

/// Opaque handle for an interned identifier.
///
/// Obtained from [`Symbol::intern`]. Two calls with equal strings return
/// equal handles; symbols never expire.
///
/// Uses `u32` to keep AST and K-code nodes small; ~4 billion distinct
/// identifiers is more than sufficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u32);

struct SymbolTable {
    /// Maps names to their handles for deduplication.
    map: AHashMap<&'static str, Symbol>,
    /// Name storage, indexed by handle.
    names: Vec<&'static str>,
}

static TABLE: LazyLock<Mutex<SymbolTable>> = LazyLock::new(|| {
    Mutex::new(SymbolTable {
        map: AHashMap::new(),
        names: Vec::new(),
    })
});

impl Symbol {
    /// Interns `name`, returning its stable handle.
    ///
    /// Each unique name is stored once for the lifetime of the process; the
    /// backing string is leaked so [`Symbol::as_str`] can hand out
    /// `&'static str` without holding the table lock. The leak is bounded
    /// by the number of distinct identifiers ever interned.
    pub fn intern(name: &str) -> Self {
        let mut table = TABLE.lock().expect("symbol table poisoned");
        if let Some(&sym) = table.map.get(name) {
            return sym;
        }
        let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
        let sym = Self(u32::try_from(table.names.len()).expect("symbol table overflow"));
        table.names.push(leaked);
        table.map.insert(leaked, sym);
        sym
    }

    /// Returns the name backing this symbol.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        TABLE.lock().expect("symbol table poisoned").names[self.0 as usize]
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Symbols serialize as their name and deserialize by re-interning, so
/// dumped programs are portable across processes.
impl serde::Serialize for Symbol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for Symbol {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::intern(&name))
    }
}
