//! High-level handle on a Go binary.

#[cfg(not(target_family = "wasm"))]
use std::path::Path;
use std::sync::OnceLock;

use tracing::info;

use crate::binary::{self, BinaryFile, FileInfo};
use crate::error::Result;
use crate::stdlib::PackageEnumerator;
use crate::version::{GoVersion, OracleConfig, VersionOracle, VersionTable};

/// An opened Go binary.
pub struct GoFile {
    binary: Box<dyn BinaryFile>,
    version: OnceLock<GoVersion>,
}

impl GoFile {
    /// Memory-maps and opens the binary at `path`.
    #[cfg(not(target_family = "wasm"))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = Self::from_binary(binary::open_file(path)?);
        info!(path = %path.display(), arch = %file.file_info().arch, "opened binary");
        Ok(file)
    }

    /// Opens a binary held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Ok(Self::from_binary(binary::open_bytes(data)?))
    }

    /// Wraps an already opened container.
    pub fn from_binary(binary: Box<dyn BinaryFile>) -> Self {
        Self {
            binary,
            version: OnceLock::new(),
        }
    }

    pub fn file_info(&self) -> &FileInfo {
        self.binary.file_info()
    }

    /// The Go build ID embedded by the linker.
    pub fn build_id(&self) -> Result<String> {
        self.binary.build_id()
    }

    /// Reads `len` bytes at virtual `address`.
    pub fn bytes(&self, address: u64, len: u64) -> Result<&[u8]> {
        self.binary.raw_bytes(address, len)
    }

    /// Compiler version, detected with the builtin table and default config.
    ///
    /// The first successful result is cached; failures are retried.
    pub fn go_version(&self) -> Result<&GoVersion> {
        if let Some(version) = self.version.get() {
            return Ok(version);
        }
        let detected = VersionOracle::new(VersionTable::builtin()).detect(self.binary())?;
        Ok(self.version.get_or_init(|| detected))
    }

    /// Runs detection with an explicit table, config and package listing.
    /// Never cached.
    pub fn go_version_with(
        &self,
        table: &VersionTable,
        config: &OracleConfig,
        packages: Option<&dyn PackageEnumerator>,
    ) -> Result<GoVersion> {
        let mut oracle = VersionOracle::new(table).with_config(config.clone());
        if let Some(packages) = packages {
            oracle = oracle.with_packages(packages);
        }
        oracle.detect(self.binary())
    }

    /// The underlying container adapter.
    pub fn binary(&self) -> &dyn BinaryFile {
        self.binary.as_ref()
    }

    /// Releases the file. Borrowed slices cannot outlive this call.
    pub fn close(self) -> Result<()> {
        self.binary.close()
    }
}
