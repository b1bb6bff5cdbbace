//! Known Go releases.
//!
//! The table is generated ahead of time from the Go repository's tags as
//! CSV with the header `version,sha,date`. A copy ships in the crate; a
//! fresher one can be loaded at run time.

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::OnceLock;

use super::GoVersion;
use crate::error::{Error, Result};

const BUILTIN_CSV: &str = include_str!("../../resources/goversions.csv");

/// Version name to release metadata.
#[derive(Debug, Clone, Default)]
pub struct VersionTable {
    versions: HashMap<String, GoVersion>,
}

impl VersionTable {
    /// The table embedded at build time.
    ///
    /// The shipped CSV lists release tags only: `sha` and `timestamp` are
    /// empty for every row. Load a table generated from the Go repository's
    /// tags with [`VersionTable::from_csv`] (`--versions` on the command
    /// line) to get commit and date metadata.
    pub fn builtin() -> &'static VersionTable {
        static TABLE: OnceLock<VersionTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            // The embedded file is covered by tests; a bad row is skipped, not fatal.
            Self::parse_lines(BUILTIN_CSV.lines().map(|l| Ok(l.to_string())), true)
                .unwrap_or_default()
        })
    }

    /// Reads a generated CSV table.
    pub fn from_csv<R: BufRead>(reader: R) -> Result<Self> {
        Self::parse_lines(reader.lines(), false)
    }

    pub fn parse_csv(text: &str) -> Result<Self> {
        Self::parse_lines(text.lines().map(|l| Ok(l.to_string())), false)
    }

    fn parse_lines<I>(lines: I, lenient: bool) -> Result<Self>
    where
        I: IntoIterator<Item = std::io::Result<String>>,
    {
        let mut table = Self::default();
        for (lineno, line) in lines.into_iter().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || (lineno == 0 && line.starts_with("version,")) {
                continue;
            }
            let mut fields = line.splitn(3, ',');
            let (Some(name), Some(sha), Some(timestamp)) =
                (fields.next(), fields.next(), fields.next())
            else {
                if lenient {
                    continue;
                }
                return Err(Error::Malformed(format!(
                    "version table line {}: expected 3 fields",
                    lineno + 1
                )));
            };
            table.insert(GoVersion {
                name: name.to_string(),
                sha: sha.to_string(),
                timestamp: timestamp.to_string(),
            });
        }
        Ok(table)
    }

    pub fn insert(&mut self, version: GoVersion) {
        self.versions.insert(version.name.clone(), version);
    }

    /// Looks up a version by its tag, e.g. `go1.21.0`.
    pub fn resolve(&self, tag: &str) -> Option<&GoVersion> {
        self.versions.get(tag)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// The newest release in the table.
    pub fn latest(&self) -> Option<&GoVersion> {
        self.versions.values().max_by(|a, b| a.compare(b))
    }
}

impl FromIterator<GoVersion> for VersionTable {
    fn from_iter<I: IntoIterator<Item = GoVersion>>(iter: I) -> Self {
        let mut table = Self::default();
        for version in iter {
            table.insert(version);
        }
        table
    }
}
