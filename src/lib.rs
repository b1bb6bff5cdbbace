//! Go binary metadata library.
//!
//! This library opens Go executables in any of the container formats the Go
//! toolchain emits (ELF, Mach-O, PE) and recovers the compiler version and
//! build ID they were produced with.

pub mod binary;
pub mod buildid;
#[cfg(feature = "disasm")]
pub mod disasm;
pub mod dwarf;
pub mod error;
pub mod gofile;
pub mod logging;
pub mod stdlib;
pub mod symtab;
pub mod version;

pub use binary::{Arch, BinaryFile, ByteOrder, FileInfo};
pub use error::{Error, Result};
pub use gofile::GoFile;
pub use version::{GoVersion, OracleConfig, VersionOracle, VersionTable};
