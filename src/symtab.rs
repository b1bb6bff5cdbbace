//! Symbol tables keyed by name.
//!
//! Some containers only record where a symbol starts. For those the size is
//! inferred from the next higher symbol address, see [`synthesize`].

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Mach-O `n_type` bits that mark a stab (debugging) entry.
pub const STAB_TYPE_MASK: u8 = 0xe0;

/// A named symbol with its address and size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub address: u64,
    pub size: u64,
}

/// A native symbol entry as read from a container that carries no size.
#[derive(Debug, Clone)]
pub struct RawSymbol {
    pub name: String,
    pub address: u64,
    /// Native type byte. Only the stab bits are inspected.
    pub n_type: u8,
}

impl RawSymbol {
    fn is_stab(&self) -> bool {
        self.n_type & STAB_TYPE_MASK != 0
    }
}

/// Name to symbol mapping.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    /// Builds a table from symbols whose sizes are already known.
    ///
    /// Later entries replace earlier ones with the same name.
    pub fn from_sized<I>(symbols: I) -> Self
    where
        I: IntoIterator<Item = Symbol>,
    {
        let mut table = Self::default();
        for symbol in symbols {
            table.symbols.insert(symbol.name.clone(), symbol);
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }
}

/// Builds a sized table from entries that only carry an address.
///
/// Stab entries are dropped. Each remaining symbol extends up to the next
/// strictly greater address; the symbol at the highest address gets size 0.
pub fn synthesize<I>(raw: I) -> SymbolTable
where
    I: IntoIterator<Item = RawSymbol>,
{
    let raw: Vec<RawSymbol> = raw.into_iter().filter(|s| !s.is_stab()).collect();

    let mut addrs: Vec<u64> = raw.iter().map(|s| s.address).collect();
    addrs.sort_unstable();

    SymbolTable::from_sized(raw.into_iter().map(|s| {
        let next = addrs.partition_point(|&a| a <= s.address);
        let size = addrs.get(next).map_or(0, |&a| a - s.address);
        Symbol {
            name: s.name,
            address: s.address,
            size,
        }
    }))
}

/// A symbol table computed at most once per open container.
///
/// The first caller runs the builder; concurrent callers block until it
/// finishes and then observe the same table or the same failure.
#[derive(Debug, Default)]
pub struct SymbolTableOnce {
    cell: OnceLock<std::result::Result<SymbolTable, String>>,
}

impl SymbolTableOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the table, building it with `init` on first use.
    pub fn get_or_init<F>(&self, init: F) -> Result<&SymbolTable>
    where
        F: FnOnce() -> Result<SymbolTable>,
    {
        self.cell
            .get_or_init(|| init().map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|msg| Error::Malformed(format!("symbol table: {msg}")))
    }

    /// Looks up `name`, building the table on first use.
    pub fn lookup<F>(&self, name: &str, init: F) -> Result<(u64, u64)>
    where
        F: FnOnce() -> Result<SymbolTable>,
    {
        let table = self.get_or_init(init)?;
        table
            .get(name)
            .map(|s| (s.address, s.size))
            .ok_or_else(|| Error::SymbolNotFound(name.to_string()))
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}
