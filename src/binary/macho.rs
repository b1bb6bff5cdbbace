//! Mach-O binary format adapter.

use super::{
    load_debug_info, reparse, section_bytes, Arch, BinaryFile, ByteOrder, ByteSource, FileInfo,
    SectionTable,
};
use crate::buildid;
use crate::dwarf::DebugInfo;
use crate::error::{Error, Result};
use crate::symtab::{self, RawSymbol, SymbolTable, SymbolTableOnce};
use object::macho::{self, MachHeader32, MachHeader64};
use object::read::macho::{MachHeader, Nlist};
use object::{Endianness, FileKind};
use tracing::debug;

/// Mach-O adapter.
///
/// `nlist` entries carry no size, so the symbol table is synthesized on
/// first use from the spacing between symbol addresses.
pub struct MachOFile {
    data: ByteSource,
    info: FileInfo,
    sections: SectionTable,
    has_symtab: bool,
    symtab: SymbolTableOnce,
}

impl MachOFile {
    /// Parses a thin Mach-O image.
    pub fn new(data: ByteSource) -> Result<Self> {
        let (info, has_symtab) = match FileKind::parse(&*data)? {
            FileKind::MachO32 => Self::parse_header::<MachHeader32<Endianness>>(&data)?,
            FileKind::MachO64 => Self::parse_header::<MachHeader64<Endianness>>(&data)?,
            other => return Err(Error::Malformed(format!("not a thin Mach-O file: {other:?}"))),
        };
        let sections = SectionTable::collect(&reparse(&data)?);

        debug!(arch = %info.arch, has_symtab, "parsed Mach-O header");

        Ok(Self {
            data,
            info,
            sections,
            has_symtab,
            symtab: SymbolTableOnce::new(),
        })
    }

    /// Reads `cputype` and checks for an `LC_SYMTAB` command.
    fn parse_header<Mach: MachHeader<Endian = Endianness>>(data: &[u8]) -> Result<(FileInfo, bool)> {
        let header = Mach::parse(data, 0)?;
        let endian = header.endian()?;

        let arch = match header.cputype(endian) {
            macho::CPU_TYPE_X86 => Arch::X86,
            macho::CPU_TYPE_X86_64 => Arch::X86_64,
            macho::CPU_TYPE_ARM64 => Arch::Arm64,
            macho::CPU_TYPE_ARM => Arch::Arm,
            other => {
                return Err(Error::UnsupportedArchitecture(format!(
                    "Mach-O cputype {other:#x}"
                )))
            }
        };

        let mut has_symtab = false;
        let mut commands = header.load_commands(endian, data, 0)?;
        while let Some(command) = commands.next()? {
            if command.symtab()?.is_some() {
                has_symtab = true;
                break;
            }
        }

        Ok((FileInfo::new(arch, ByteOrder::from(endian), "macOS"), has_symtab))
    }

    /// Collects every `nlist` entry of the first `LC_SYMTAB`.
    fn raw_symbols<Mach: MachHeader<Endian = Endianness>>(data: &[u8]) -> Result<Vec<RawSymbol>> {
        let header = Mach::parse(data, 0)?;
        let endian = header.endian()?;
        let mut commands = header.load_commands(endian, data, 0)?;

        while let Some(command) = commands.next()? {
            let Some(symtab) = command.symtab()? else {
                continue;
            };
            let table = symtab.symbols::<Mach, _>(endian, data)?;
            let strings = table.strings();
            let symbols = table
                .iter()
                .filter_map(|nlist| {
                    let name = nlist.name(endian, strings).ok()?;
                    Some(RawSymbol {
                        name: String::from_utf8_lossy(name).into_owned(),
                        address: nlist.n_value(endian).into(),
                        n_type: nlist.n_type(),
                    })
                })
                .collect();
            return Ok(symbols);
        }

        Ok(Vec::new())
    }

    fn build_symtab(&self) -> Result<SymbolTable> {
        if !self.has_symtab {
            return Ok(SymbolTable::default());
        }
        let raw = match FileKind::parse(&*self.data)? {
            FileKind::MachO32 => Self::raw_symbols::<MachHeader32<Endianness>>(&self.data)?,
            _ => Self::raw_symbols::<MachHeader64<Endianness>>(&self.data)?,
        };
        let total = raw.len();
        let table = symtab::synthesize(raw);
        debug!(total, kept = table.len(), "synthesized Mach-O symbol table");
        Ok(table)
    }

    fn section_by_name(&self, name: &str) -> Result<(u64, &[u8])> {
        let section = self
            .sections
            .by_name(name)
            .ok_or_else(|| Error::SectionDoesNotExist(name.to_string()))?;
        Ok((section.address, section_bytes(&self.data, section)?))
    }
}

impl BinaryFile for MachOFile {
    fn file_info(&self) -> &FileInfo {
        &self.info
    }

    fn has_symbol_table(&self) -> bool {
        self.has_symtab
    }

    fn symbol(&self, name: &str) -> Result<(u64, u64)> {
        self.symtab.lookup(name, || self.build_symtab())
    }

    fn section_data(&self, name: &str) -> Result<(u64, &[u8])> {
        self.section_by_name(name)
    }

    fn section_data_at(&self, address: u64) -> Result<(u64, &[u8])> {
        // Zero-fill sections only exist in memory and are never matched.
        let section = self
            .sections
            .containing(address)
            .ok_or_else(|| Error::SectionDoesNotExist(format!("{address:#x}")))?;
        Ok((section.address, section_bytes(&self.data, section)?))
    }

    fn read_only_data(&self) -> Result<(u64, &[u8])> {
        self.section_by_name("__rodata")
    }

    fn code_section(&self) -> Result<(u64, &[u8])> {
        self.section_by_name("__text")
    }

    fn pclntab_section(&self) -> Result<(u64, &[u8])> {
        self.section_by_name("__gopclntab")
    }

    fn moduledata_section_name(&self) -> &'static str {
        "__noptrdata"
    }

    fn build_id(&self) -> Result<String> {
        let (_, text) = self.code_section()?;
        buildid::parse_build_id_from_raw(text)
    }

    fn debug_info(&self) -> Result<DebugInfo> {
        load_debug_info(&self.data)
    }
}
