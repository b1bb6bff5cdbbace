//! PE (Portable Executable) binary format adapter.

use super::{
    load_debug_info, reparse, section_bytes, slice_at, Arch, BinaryFile, ByteOrder, ByteSource,
    FileInfo, SectionTable,
};
use crate::buildid;
use crate::dwarf::DebugInfo;
use crate::error::{Error, Result};
use crate::symtab::{self, RawSymbol, SymbolTable, SymbolTableOnce};
use object::pe::{self, ImageDosHeader, ImageFileHeader};
use object::{LittleEndian as LE, Object, ObjectSymbol, ObjectSymbolTable, ReadRef};
use tracing::debug;

const PCLNTAB_START: &str = "runtime.pclntab";
const PCLNTAB_END: &str = "runtime.epclntab";

/// PE adapter. COFF symbols have no size and are synthesized like Mach-O.
pub struct PeFile {
    data: ByteSource,
    info: FileInfo,
    sections: SectionTable,
    has_symtab: bool,
    symtab: SymbolTableOnce,
}

impl PeFile {
    /// Parses a PE image.
    pub fn new(data: ByteSource) -> Result<Self> {
        let info = Self::detect_file_info(&data)?;
        let obj = reparse(&data)?;
        let sections = SectionTable::collect(&obj);
        let has_symtab = obj.symbol_table().is_some_and(|t| t.symbols().next().is_some());
        drop(obj);

        debug!(arch = %info.arch, has_symtab, "parsed PE header");

        Ok(Self {
            data,
            info,
            sections,
            has_symtab,
            symtab: SymbolTableOnce::new(),
        })
    }

    /// Reads `Machine` from the COFF file header behind the `PE\0\0` signature.
    fn detect_file_info(data: &[u8]) -> Result<FileInfo> {
        let dos = ImageDosHeader::parse(data)?;
        let offset = u64::from(dos.nt_headers_offset()) + 4;
        let header = data
            .read_at::<ImageFileHeader>(offset)
            .map_err(|_| Error::Malformed("truncated COFF file header".to_string()))?;

        let arch = match header.machine.get(LE) {
            pe::IMAGE_FILE_MACHINE_I386 => Arch::X86,
            pe::IMAGE_FILE_MACHINE_AMD64 => Arch::X86_64,
            pe::IMAGE_FILE_MACHINE_ARM64 => Arch::Arm64,
            pe::IMAGE_FILE_MACHINE_ARMNT => Arch::Arm,
            other => {
                return Err(Error::UnsupportedArchitecture(format!(
                    "PE machine {other:#x}"
                )))
            }
        };

        Ok(FileInfo::new(arch, ByteOrder::Little, "windows"))
    }

    fn build_symtab(&self) -> Result<SymbolTable> {
        let obj = reparse(&self.data)?;
        let Some(table) = obj.symbol_table() else {
            return Ok(SymbolTable::default());
        };
        let raw = table
            .symbols()
            .filter(|s| s.is_definition())
            .filter_map(|s| {
                Some(RawSymbol {
                    name: s.name().ok()?.to_string(),
                    address: s.address(),
                    n_type: 0,
                })
            });
        let table = symtab::synthesize(raw);
        debug!(symbols = table.len(), "synthesized COFF symbol table");
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

impl BinaryFile for PeFile {
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
        self.section_by_name(".rdata")
    }

    fn code_section(&self) -> Result<(u64, &[u8])> {
        self.section_by_name(".text")
    }

    /// PE has no dedicated section; the table is bracketed by two symbols.
    fn pclntab_section(&self) -> Result<(u64, &[u8])> {
        let (start, _) = self
            .symbol(PCLNTAB_START)
            .map_err(|_| Error::SectionDoesNotExist(PCLNTAB_START.to_string()))?;
        let (end, _) = self
            .symbol(PCLNTAB_END)
            .map_err(|_| Error::SectionDoesNotExist(PCLNTAB_END.to_string()))?;
        let length = end
            .checked_sub(start)
            .ok_or_else(|| Error::Malformed(format!("{PCLNTAB_END} precedes {PCLNTAB_START}")))?;
        let (base, data) = self.section_data_at(start)?;
        Ok((start, slice_at(base, data, start, length)?))
    }

    fn moduledata_section_name(&self) -> &'static str {
        ".data"
    }

    fn build_id(&self) -> Result<String> {
        let (_, text) = self.code_section()?;
        buildid::parse_build_id_from_raw(text)
    }

    fn debug_info(&self) -> Result<DebugInfo> {
        load_debug_info(&self.data)
    }
}
