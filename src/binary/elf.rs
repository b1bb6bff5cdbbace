//! ELF binary format adapter.

use super::{
    load_debug_info, reparse, section_bytes, Arch, BinaryFile, ByteOrder, ByteSource,
    FileInfo, SectionTable,
};
use crate::buildid;
use crate::dwarf::DebugInfo;
use crate::error::{Error, Result};
use crate::symtab::{Symbol, SymbolTable, SymbolTableOnce};
use object::elf::{self, FileHeader32, FileHeader64};
use object::read::elf::FileHeader;
use object::{Endianness, FileKind, Object, ObjectSymbol, ObjectSymbolTable};
use tracing::debug;

const BUILD_ID_NOTE_SECTION: &str = ".note.go.buildid";

/// ELF adapter. Symbol sizes come straight from `st_size`.
pub struct ElfFile {
    data: ByteSource,
    info: FileInfo,
    sections: SectionTable,
    has_symtab: bool,
    symtab: SymbolTableOnce,
}

impl ElfFile {
    /// Parses an ELF image.
    pub fn new(data: ByteSource) -> Result<Self> {
        let info = Self::detect_file_info(&data)?;
        let obj = reparse(&data)?;
        let sections = SectionTable::collect(&obj);
        let has_symtab = obj.symbol_table().is_some();
        drop(obj);

        debug!(arch = %info.arch, os = %info.os, has_symtab, "parsed ELF header");

        Ok(Self {
            data,
            info,
            sections,
            has_symtab,
            symtab: SymbolTableOnce::new(),
        })
    }

    /// Maps `e_machine` and the ELF class to an architecture.
    fn detect_file_info(data: &[u8]) -> Result<FileInfo> {
        let (machine, os_abi, endian, is_64) = match FileKind::parse(data)? {
            FileKind::Elf32 => Self::header_fields::<FileHeader32<Endianness>>(data)?,
            FileKind::Elf64 => Self::header_fields::<FileHeader64<Endianness>>(data)?,
            other => return Err(Error::Malformed(format!("not an ELF file: {other:?}"))),
        };

        let arch = match (machine, is_64) {
            (elf::EM_386, false) => Arch::X86,
            (elf::EM_X86_64, true) => Arch::X86_64,
            (elf::EM_ARM, false) => Arch::Arm,
            (elf::EM_AARCH64, true) => Arch::Arm64,
            (elf::EM_MIPS, false) => Arch::Mips,
            (elf::EM_MIPS, true) => Arch::Mips64,
            (elf::EM_PPC64, true) => Arch::Ppc64,
            (elf::EM_RISCV, true) => Arch::RiscV64,
            (elf::EM_S390, true) => Arch::S390x,
            (elf::EM_LOONGARCH, true) => Arch::Loong64,
            _ => {
                return Err(Error::UnsupportedArchitecture(format!(
                    "ELF e_machine {machine:#x} ({}-bit)",
                    if is_64 { 64 } else { 32 }
                )))
            }
        };

        let os = match os_abi {
            elf::ELFOSABI_FREEBSD => "freebsd",
            elf::ELFOSABI_NETBSD => "netbsd",
            elf::ELFOSABI_OPENBSD => "openbsd",
            elf::ELFOSABI_SOLARIS => "solaris",
            _ => "linux",
        };

        Ok(FileInfo::new(arch, ByteOrder::from(endian), os))
    }

    fn header_fields<Elf: FileHeader<Endian = Endianness>>(
        data: &[u8],
    ) -> Result<(u16, u8, Endianness, bool)> {
        let header = Elf::parse(data)?;
        let endian = header.endian()?;
        Ok((
            header.e_machine(endian),
            header.e_ident().os_abi,
            endian,
            header.is_class_64(),
        ))
    }

    fn build_symtab(&self) -> Result<SymbolTable> {
        let obj = reparse(&self.data)?;
        let Some(table) = obj.symbol_table() else {
            return Ok(SymbolTable::default());
        };
        let symbols = table.symbols().filter_map(|s| {
            let name = s.name().ok()?;
            if name.is_empty() {
                return None;
            }
            Some(Symbol {
                name: name.to_string(),
                address: s.address(),
                size: s.size(),
            })
        });
        let table = SymbolTable::from_sized(symbols);
        debug!(symbols = table.len(), "loaded ELF symbol table");
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

impl BinaryFile for ElfFile {
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
        let section = self
            .sections
            .containing(address)
            .ok_or_else(|| Error::SectionDoesNotExist(format!("{address:#x}")))?;
        Ok((section.address, section_bytes(&self.data, section)?))
    }

    fn read_only_data(&self) -> Result<(u64, &[u8])> {
        self.section_by_name(".rodata")
    }

    fn code_section(&self) -> Result<(u64, &[u8])> {
        self.section_by_name(".text")
    }

    fn pclntab_section(&self) -> Result<(u64, &[u8])> {
        // PIE builds move the table into RELRO.
        self.section_by_name(".gopclntab")
            .or_else(|_| self.section_by_name(".data.rel.ro.gopclntab"))
    }

    fn moduledata_section_name(&self) -> &'static str {
        ".noptrdata"
    }

    fn build_id(&self) -> Result<String> {
        if let Ok((_, note)) = self.section_by_name(BUILD_ID_NOTE_SECTION) {
            if let Ok(id) = buildid::parse_build_id_note(note, self.info.byte_order) {
                return Ok(id);
            }
        }
        let (_, text) = self.code_section()?;
        buildid::parse_build_id_from_raw(text)
    }

    fn debug_info(&self) -> Result<DebugInfo> {
        load_debug_info(&self.data)
    }
}
