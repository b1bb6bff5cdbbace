//! Binary container abstractions.
//!
//! This module provides a unified interface over the container formats Go
//! binaries ship in (ELF, Mach-O, PE). Each format gets its own adapter;
//! everything downstream only talks to [`BinaryFile`].

mod elf;
mod macho;
mod pe;

use std::fmt;
use std::ops::Deref;
#[cfg(not(target_family = "wasm"))]
use std::path::Path;

use object::{FileKind, Object, ObjectSection};
use tracing::debug;

use crate::dwarf::DebugInfo;
use crate::error::{Error, Result};

pub use elf::ElfFile;
pub use macho::MachOFile;
pub use pe::PeFile;

/// CPU architecture of a binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86,
    X86_64,
    Arm,
    Arm64,
    Mips,
    Mips64,
    Ppc64,
    RiscV64,
    S390x,
    Loong64,
}

impl Arch {
    /// Pointer width in bytes.
    pub fn word_size(self) -> usize {
        match self {
            Arch::X86 | Arch::Arm | Arch::Mips => 4,
            Arch::X86_64
            | Arch::Arm64
            | Arch::Mips64
            | Arch::Ppc64
            | Arch::RiscV64
            | Arch::S390x
            | Arch::Loong64 => 8,
        }
    }

    /// Name used by the Go toolchain (`GOARCH`).
    pub fn go_name(self) -> &'static str {
        match self {
            Arch::X86 => "386",
            Arch::X86_64 => "amd64",
            Arch::Arm => "arm",
            Arch::Arm64 => "arm64",
            Arch::Mips => "mips",
            Arch::Mips64 => "mips64",
            Arch::Ppc64 => "ppc64",
            Arch::RiscV64 => "riscv64",
            Arch::S390x => "s390x",
            Arch::Loong64 => "loong64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.go_name())
    }
}

/// Byte order of multi-byte values in the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub fn read_u32(self, bytes: &[u8]) -> Option<u32> {
        let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Little => u32::from_le_bytes(raw),
            ByteOrder::Big => u32::from_be_bytes(raw),
        })
    }

    pub fn read_u64(self, bytes: &[u8]) -> Option<u64> {
        let raw: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Little => u64::from_le_bytes(raw),
            ByteOrder::Big => u64::from_be_bytes(raw),
        })
    }

    /// Reads an unsigned word of `word_size` bytes (4 or 8), widened to u64.
    pub fn read_word(self, bytes: &[u8], word_size: usize) -> Option<u64> {
        match word_size {
            4 => self.read_u32(bytes).map(u64::from),
            8 => self.read_u64(bytes),
            _ => None,
        }
    }
}

impl From<object::Endianness> for ByteOrder {
    fn from(endian: object::Endianness) -> Self {
        match endian {
            object::Endianness::Little => ByteOrder::Little,
            object::Endianness::Big => ByteOrder::Big,
        }
    }
}

/// Immutable facts about an opened binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub arch: Arch,
    pub word_size: usize,
    pub byte_order: ByteOrder,
    pub os: String,
}

impl FileInfo {
    pub fn new(arch: Arch, byte_order: ByteOrder, os: impl Into<String>) -> Self {
        Self {
            arch,
            word_size: arch.word_size(),
            byte_order,
            os: os.into(),
        }
    }
}

/// Owned bytes backing an open container.
pub enum ByteSource {
    #[cfg(not(target_family = "wasm"))]
    Mapped(memmap2::Mmap),
    Owned(Vec<u8>),
}

impl Deref for ByteSource {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            #[cfg(not(target_family = "wasm"))]
            ByteSource::Mapped(mmap) => &mmap[..],
            ByteSource::Owned(buf) => &buf[..],
        }
    }
}

impl From<Vec<u8>> for ByteSource {
    fn from(buf: Vec<u8>) -> Self {
        ByteSource::Owned(buf)
    }
}

/// A section header, detached from the parser.
#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub address: u64,
    pub size: u64,
    /// On-disk `(offset, length)`, `None` for sections without file bytes.
    pub file_range: Option<(u64, u64)>,
}

impl Section {
    fn contains(&self, address: u64) -> bool {
        address >= self.address && address - self.address < self.size
    }
}

/// Section headers in file order.
#[derive(Debug, Clone, Default)]
pub(crate) struct SectionTable {
    sections: Vec<Section>,
}

impl SectionTable {
    pub(crate) fn collect(obj: &object::File<'_>) -> Self {
        let sections = obj
            .sections()
            .filter_map(|s| {
                let name = s.name().ok()?.to_string();
                let file_range = s.file_range().filter(|&(offset, _)| offset != 0);
                Some(Section {
                    name,
                    address: s.address(),
                    size: s.size(),
                    file_range,
                })
            })
            .collect();
        Self { sections }
    }

    pub(crate) fn by_name(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// First on-disk section whose address range contains `address`.
    pub(crate) fn containing(&self, address: u64) -> Option<&Section> {
        self.sections
            .iter()
            .filter(|s| s.file_range.is_some())
            .find(|s| s.contains(address))
    }
}

/// Returns the file bytes of `section`, bounds-checked against `data`.
pub(crate) fn section_bytes<'a>(data: &'a [u8], section: &Section) -> Result<&'a [u8]> {
    let Some((offset, length)) = section.file_range else {
        return Ok(&[]);
    };
    let start = usize::try_from(offset)
        .map_err(|_| Error::Malformed(format!("section {} offset overflows", section.name)))?;
    let end = usize::try_from(length)
        .ok()
        .and_then(|len| start.checked_add(len))
        .ok_or_else(|| Error::Malformed(format!("section {} length overflows", section.name)))?;
    data.get(start..end).ok_or_else(|| {
        Error::Malformed(format!(
            "section {} ({:#x}..{:#x}) exceeds file size {:#x}",
            section.name,
            start,
            end,
            data.len()
        ))
    })
}

/// Slices `length` bytes at virtual `address` out of a section that starts at `base`.
pub(crate) fn slice_at(base: u64, data: &[u8], address: u64, length: u64) -> Result<&[u8]> {
    let out_of_bounds = || Error::OutOfBounds { address, length };
    let start = address
        .checked_sub(base)
        .and_then(|off| usize::try_from(off).ok())
        .ok_or_else(out_of_bounds)?;
    let end = usize::try_from(length)
        .ok()
        .and_then(|len| start.checked_add(len))
        .ok_or_else(out_of_bounds)?;
    data.get(start..end).ok_or_else(out_of_bounds)
}

/// Uniform read-only access to a binary container.
///
/// Every format adapter implements the whole set; callers never need to
/// know which format they are looking at.
pub trait BinaryFile: Send + Sync {
    fn file_info(&self) -> &FileInfo;

    fn has_symbol_table(&self) -> bool;

    /// Returns `(address, size)` of the named symbol.
    fn symbol(&self, name: &str) -> Result<(u64, u64)>;

    /// Returns `(address, bytes)` of the named section.
    fn section_data(&self, name: &str) -> Result<(u64, &[u8])>;

    /// Returns `(section address, bytes)` of the on-disk section containing `address`.
    fn section_data_at(&self, address: u64) -> Result<(u64, &[u8])>;

    /// Read-only data section bytes.
    fn read_only_data(&self) -> Result<(u64, &[u8])>;

    fn code_section(&self) -> Result<(u64, &[u8])>;

    fn pclntab_section(&self) -> Result<(u64, &[u8])>;

    /// Section that holds the runtime's `moduledata`.
    fn moduledata_section_name(&self) -> &'static str;

    fn build_id(&self) -> Result<String>;

    fn debug_info(&self) -> Result<DebugInfo>;

    /// Reads `length` bytes at virtual `address`.
    fn raw_bytes(&self, address: u64, length: u64) -> Result<&[u8]> {
        let (base, data) = self.section_data_at(address)?;
        slice_at(base, data, address, length)
    }

    /// Releases the underlying bytes.
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Opens a container from bytes, picking the adapter from the file magic.
pub fn open_bytes(data: impl Into<ByteSource>) -> Result<Box<dyn BinaryFile>> {
    let data = data.into();
    let kind = FileKind::parse(&*data)?;
    debug!(?kind, len = data.len(), "opening container");

    match kind {
        FileKind::Elf32 | FileKind::Elf64 => Ok(Box::new(ElfFile::new(data)?)),
        FileKind::MachO32 | FileKind::MachO64 => Ok(Box::new(MachOFile::new(data)?)),
        FileKind::Pe32 | FileKind::Pe64 => Ok(Box::new(PeFile::new(data)?)),
        other => Err(Error::UnsupportedFormat(format!("{other:?}"))),
    }
}

/// Memory-maps `path` and opens it.
#[cfg(not(target_family = "wasm"))]
pub fn open_file(path: impl AsRef<Path>) -> Result<Box<dyn BinaryFile>> {
    let file = std::fs::File::open(path)?;
    // SAFETY: the map is read-only and owned by the returned handle.
    let mmap = unsafe { memmap2::Mmap::map(&file)? };
    open_bytes(ByteSource::Mapped(mmap))
}

/// Parses `data` again for operations that need the full parser.
pub(crate) fn reparse(data: &[u8]) -> Result<object::File<'_>> {
    Ok(object::File::parse(data)?)
}

/// Loads DWARF through a freshly parsed view of `data`.
pub(crate) fn load_debug_info(data: &[u8]) -> Result<DebugInfo> {
    let obj = reparse(data)?;
    if obj.section_by_name(".debug_info").is_none() {
        return Err(Error::NoDebugInfo);
    }
    crate::dwarf::load(&obj)
}
