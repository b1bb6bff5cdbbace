//! Go compiler version detection.
//!
//! [`VersionOracle`] runs three strategies in order and stops at the first
//! hit:
//!
//! 1. the `DW_AT_producer` of the DWARF compile units,
//! 2. the version string loaded by `runtime.schedinit` (x86 only),
//! 3. a regex scan of read-only data for `go1.x` strings.
//!
//! Each strategy returns `Ok(None)` when it has nothing to say, so "not
//! found" never travels as an error between stages.

mod gover;
#[cfg(feature = "disasm")]
mod schedinit;
mod table;

use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use regex::bytes::Regex;
use tracing::{debug, trace, warn};

use crate::binary::BinaryFile;
use crate::error::{Error, Result};
use crate::stdlib::PackageEnumerator;

pub use gover::strip_go;
pub use table::VersionTable;

/// The first release whose binaries embed the `goX.Y` string.
pub const DEFAULT_MIN_SCAN_VERSION: &str = "go1.4beta1";

/// A Go release.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GoVersion {
    /// Tag name, e.g. `go1.21.0`.
    pub name: String,
    /// Commit of the release tag.
    pub sha: String,
    /// Commit timestamp of the release tag.
    pub timestamp: String,
}

impl GoVersion {
    /// A version string that is not in the release table.
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sha: String::new(),
            timestamp: String::new(),
        }
    }

    /// Semantic ordering by name.
    pub fn compare(&self, other: &GoVersion) -> Ordering {
        compare_versions(&self.name, &other.name)
    }
}

impl fmt::Display for GoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Compares two version tags (`go` prefix optional).
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    gover::compare(a, b)
}

/// Looks `tag` up in the builtin release table.
pub fn resolve_go_version(tag: &str) -> Option<GoVersion> {
    VersionTable::builtin().resolve(tag).cloned()
}

/// Knobs for [`VersionOracle`].
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Scan hits resolving below this version are treated as false positives.
    pub min_scan_version: String,
    pub use_debug_info: bool,
    pub use_disassembly: bool,
    pub use_string_scan: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            min_scan_version: DEFAULT_MIN_SCAN_VERSION.to_string(),
            use_debug_info: true,
            use_disassembly: true,
            use_string_scan: true,
        }
    }
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"go[0-9+.]*(beta|rc)?[0-9*]").expect("valid Go version regex"))
}

/// Finds the compiler version of a binary.
pub struct VersionOracle<'a> {
    table: &'a VersionTable,
    config: OracleConfig,
    /// Only consulted by the schedinit strategy.
    #[cfg_attr(not(feature = "disasm"), allow(dead_code))]
    packages: Option<&'a dyn PackageEnumerator>,
}

impl<'a> VersionOracle<'a> {
    pub fn new(table: &'a VersionTable) -> Self {
        Self {
            table,
            config: OracleConfig::default(),
            packages: None,
        }
    }

    pub fn with_config(mut self, config: OracleConfig) -> Self {
        self.config = config;
        self
    }

    /// Package listing used to find `runtime.schedinit` when the binary has
    /// no symbol for it.
    pub fn with_packages(mut self, packages: &'a dyn PackageEnumerator) -> Self {
        self.packages = Some(packages);
        self
    }

    /// Runs the strategies in order.
    pub fn detect(&self, file: &dyn BinaryFile) -> Result<GoVersion> {
        if self.config.use_debug_info {
            if let Some(version) = self.from_debug_info(file) {
                debug!(%version, "version from DWARF producer");
                return Ok(version);
            }
        }

        if self.config.use_disassembly {
            if let Some(version) = self.from_schedinit(file)? {
                debug!(%version, "version from runtime.schedinit");
                return Ok(version);
            }
        }

        if self.config.use_string_scan {
            if let Some(version) = self.from_string_scan(file)? {
                debug!(%version, "version from string scan");
                return Ok(version);
            }
        }

        Err(Error::NoVersionFound)
    }

    fn from_debug_info(&self, file: &dyn BinaryFile) -> Option<GoVersion> {
        let info = match file.debug_info() {
            Ok(info) => info,
            Err(Error::NoDebugInfo) => {
                trace!("no DWARF data");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "ignoring unreadable DWARF data");
                return None;
            }
        };
        let tag = info.build_version()?;
        self.table.resolve(tag).cloned()
    }

    #[cfg(feature = "disasm")]
    fn from_schedinit(&self, file: &dyn BinaryFile) -> Result<Option<GoVersion>> {
        Ok(schedinit::detect(file, self.table, self.packages))
    }

    #[cfg(not(feature = "disasm"))]
    fn from_schedinit(&self, _file: &dyn BinaryFile) -> Result<Option<GoVersion>> {
        Ok(None)
    }

    fn from_string_scan(&self, file: &dyn BinaryFile) -> Result<Option<GoVersion>> {
        let data = match file.read_only_data() {
            Ok((_, data)) => data,
            Err(Error::SectionDoesNotExist(_)) => file.code_section()?.1,
            Err(e) => return Err(e),
        };
        Ok(self.scan_bytes(data))
    }

    /// Returns the first plausible version string in `data`.
    pub fn scan_bytes(&self, data: &[u8]) -> Option<GoVersion> {
        let re = version_regex();
        let mut window = data;

        while let Some(m) = re.find(window) {
            let tag = String::from_utf8_lossy(m.as_bytes());
            match self.table.resolve(&tag) {
                Some(version)
                    if compare_versions(&version.name, &self.config.min_scan_version)
                        != Ordering::Less =>
                {
                    return Some(version.clone());
                }
                _ => {
                    trace!(%tag, "rejecting version string candidate");
                    window = &window[m.start() + 2..];
                }
            }
        }
        None
    }
}
