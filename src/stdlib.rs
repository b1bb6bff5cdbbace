//! Standard library package knowledge.
//!
//! The package set is generated from the Go source tree (everything under
//! `src/` except `cmd`). Enumerating the packages actually linked into a
//! binary is left to a [`PackageEnumerator`], usually backed by moduledata
//! and pclntab parsing.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::binary::BinaryFile;
use crate::error::Result;

const STD_PACKAGES: &str = include_str!("../resources/stdpkgs.txt");

fn std_packages() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| {
        STD_PACKAGES
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect()
    })
}

/// Whether `path` is a standard library import path.
pub fn is_standard_package(path: &str) -> bool {
    std_packages().contains(path)
}

/// A function recovered from a binary, as file-independent virtual addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub offset: u64,
    pub end: u64,
}

impl Function {
    pub fn size(&self) -> u64 {
        self.end.saturating_sub(self.offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub functions: Vec<Function>,
}

/// Lists the Go packages linked into a binary.
pub trait PackageEnumerator: Send + Sync {
    fn packages(&self, file: &dyn BinaryFile) -> Result<Vec<Package>>;
}

/// Keeps the standard library packages.
pub fn std_library(packages: Vec<Package>) -> Vec<Package> {
    packages
        .into_iter()
        .filter(|p| is_standard_package(&p.name))
        .collect()
}

/// Finds `package.function` among `packages`.
pub fn find_function<'a>(
    packages: &'a [Package],
    package: &str,
    function: &str,
) -> Option<&'a Function> {
    packages
        .iter()
        .filter(|p| p.name == package)
        .flat_map(|p| p.functions.iter())
        .find(|f| f.name == function)
}
