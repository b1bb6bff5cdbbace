//! Error types for gometa.
//!
//! Missing-resource errors (sections, symbols, debug info) are expected on
//! stripped binaries and drive fallbacks. Everything else means the input
//! could not be interpreted.

use thiserror::Error;

/// Main error type for gometa operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested section is absent from the container.
    #[error("section does not exist: {0}")]
    SectionDoesNotExist(String),

    /// The requested symbol is absent from the symbol table.
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    /// The container carries no DWARF data.
    #[error("no debug info")]
    NoDebugInfo,

    /// CPU type without a mapping.
    #[error("unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    #[error("unsupported binary format: {0}")]
    UnsupportedFormat(String),

    /// The whole detection cascade ran without a result.
    #[error("no Go version found")]
    NoVersionFound,

    #[error("build ID not found")]
    BuildIdNotFound,

    /// Container parse failure or inconsistent header data.
    #[error("malformed binary: {0}")]
    Malformed(String),

    /// Undecodable instruction stream.
    #[error("decode error at offset {offset:#x}: {reason}")]
    Decode { offset: usize, reason: String },

    /// A read not covered by the bytes of any section.
    #[error("read of {length:#x} bytes at {address:#x} is out of bounds")]
    OutOfBounds { address: u64, length: u64 },

    #[error("object parse error: {0}")]
    Object(#[from] object::read::Error),

    #[error("DWARF error: {0}")]
    Dwarf(#[from] gimli::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error only reports a missing resource.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::SectionDoesNotExist(_)
                | Error::SymbolNotFound(_)
                | Error::NoDebugInfo
                | Error::BuildIdNotFound
        )
    }
}

/// Result type alias for gometa operations.
pub type Result<T> = std::result::Result<T, Error>;
