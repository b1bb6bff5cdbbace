//! Minimal ELF, Mach-O and PE image writers for tests.
//!
//! The images carry section headers and a symbol table, nothing else. That
//! is enough for the `object` parsers and the adapters built on them. ELF
//! and Mach-O come in both classes; PE is written as PE32 for i386 and
//! ARMv7 and as PE32+ otherwise.

#![allow(dead_code)]

// ============================================================================
// Constants
// ============================================================================

pub const EM_386: u16 = 3;
pub const EM_X86_64: u16 = 62;
pub const EM_AARCH64: u16 = 183;
pub const EM_SPARCV9: u16 = 43;

pub const ELFOSABI_NONE: u8 = 0;
pub const ELFOSABI_FREEBSD: u8 = 9;

const SHT_PROGBITS: u32 = 1;
const SHT_SYMTAB: u32 = 2;
const SHT_STRTAB: u32 = 3;
const SHT_NOTE: u32 = 7;
const SHF_ALLOC: u64 = 0x2;
const SHF_COMPRESSED: u64 = 0x800;
const SHN_ABS: u16 = 0xfff1;
const STT_FUNC_GLOBAL: u8 = 0x12;

const ELF64_HEADER_SIZE: usize = 64;
const ELF64_SHDR_SIZE: usize = 64;
const ELF64_SYM_SIZE: usize = 24;
const ELF32_HEADER_SIZE: usize = 52;
const ELF32_SHDR_SIZE: usize = 40;
const ELF32_SYM_SIZE: usize = 16;

pub const CPU_TYPE_X86: u32 = 7;
pub const CPU_TYPE_X86_64: u32 = 0x0100_0007;
pub const CPU_TYPE_ARM64: u32 = 0x0100_000c;

const MH_MAGIC: u32 = 0xfeed_face;
const MH_MAGIC_64: u32 = 0xfeed_facf;
const MH_EXECUTE: u32 = 2;
const LC_SEGMENT: u32 = 0x1;
const LC_SEGMENT_64: u32 = 0x19;
const LC_SYMTAB: u32 = 0x2;
const MACH_HEADER_SIZE: usize = 28;
const MACH_HEADER_64_SIZE: usize = 32;
const SEGMENT_CMD_SIZE: usize = 56;
const SEGMENT_64_CMD_SIZE: usize = 72;
const SECTION_SIZE: usize = 68;
const SECTION_64_SIZE: usize = 80;
const SYMTAB_CMD_SIZE: usize = 24;

/// `N_SECT | N_EXT`
pub const N_SECT_EXT: u8 = 0x0f;
/// A stab (`N_FUN`) entry.
pub const N_FUN: u8 = 0x24;

pub const IMAGE_FILE_MACHINE_I386: u16 = 0x14c;
pub const IMAGE_FILE_MACHINE_ARMNT: u16 = 0x1c4;
pub const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;
pub const IMAGE_FILE_MACHINE_ARM64: u16 = 0xaa64;
pub const IMAGE_FILE_MACHINE_IA64: u16 = 0x200;

/// Image base the Go linker uses for Windows executables.
pub const PE_IMAGE_BASE: u64 = 0x40_0000;

const PE_NT_OFFSET: usize = 0x40;
const COFF_HEADER_SIZE: usize = 20;
const PE32_OPTIONAL_SIZE: usize = 224;
const PE32_PLUS_OPTIONAL_SIZE: usize = 240;
const PE_SECTION_HEADER_SIZE: usize = 40;
const PE_FILE_ALIGNMENT: usize = 0x200;
const COFF_SYMBOL_SIZE: usize = 18;
const IMAGE_SYM_CLASS_EXTERNAL: u8 = 2;
const IMAGE_SYM_DTYPE_FUNCTION: u16 = 0x20;

// ============================================================================
// Helpers
// ============================================================================

fn align(out: &mut Vec<u8>, to: usize) {
    while out.len() % to != 0 {
        out.push(0);
    }
}

fn push_name(table: &mut Vec<u8>, name: &str) -> u32 {
    let offset = table.len() as u32;
    table.extend_from_slice(name.as_bytes());
    table.push(0);
    offset
}

/// Writes `value` as a 4- or 8-byte little-endian word.
fn push_word(out: &mut Vec<u8>, value: u64, is_64: bool) {
    if is_64 {
        out.extend_from_slice(&value.to_le_bytes());
    } else {
        out.extend_from_slice(&(value as u32).to_le_bytes());
    }
}

fn fixed_name(name: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..name.len()].copy_from_slice(name.as_bytes());
    out
}

/// A Go build ID note as the linker writes it.
pub fn go_build_id_note(id: &str) -> Vec<u8> {
    let mut note = Vec::new();
    note.extend_from_slice(&4u32.to_le_bytes());
    note.extend_from_slice(&(id.len() as u32).to_le_bytes());
    note.extend_from_slice(&4u32.to_le_bytes());
    note.extend_from_slice(b"Go\0\0");
    note.extend_from_slice(id.as_bytes());
    align(&mut note, 4);
    note
}

/// The quoted build ID the linker places at the start of the text segment.
pub fn raw_build_id(id: &str) -> Vec<u8> {
    let mut out = b"\xff Go build ID: \"".to_vec();
    out.extend_from_slice(id.as_bytes());
    out.extend_from_slice(b"\"\n \xff");
    out
}

// ============================================================================
// ELF
// ============================================================================

struct ElfSection {
    name: String,
    kind: u32,
    flags: u64,
    address: u64,
    data: Vec<u8>,
}

struct ElfSymbol {
    name: String,
    address: u64,
    size: u64,
}

/// Little-endian ELF executable writer.
pub struct ElfBuilder {
    machine: u16,
    is_64: bool,
    os_abi: u8,
    sections: Vec<ElfSection>,
    symbols: Vec<ElfSymbol>,
}

impl ElfBuilder {
    /// An ELFCLASS64 image.
    pub fn new(machine: u16) -> Self {
        Self {
            machine,
            is_64: true,
            os_abi: ELFOSABI_NONE,
            sections: Vec::new(),
            symbols: Vec::new(),
        }
    }

    /// An ELFCLASS32 image. Addresses and sizes must fit in 32 bits.
    pub fn new32(machine: u16) -> Self {
        Self {
            is_64: false,
            ..Self::new(machine)
        }
    }

    pub fn os_abi(mut self, os_abi: u8) -> Self {
        self.os_abi = os_abi;
        self
    }

    pub fn section(mut self, name: &str, address: u64, data: impl Into<Vec<u8>>) -> Self {
        self.sections.push(ElfSection {
            name: name.to_string(),
            kind: SHT_PROGBITS,
            flags: SHF_ALLOC,
            address,
            data: data.into(),
        });
        self
    }

    /// A non-allocated `SHF_COMPRESSED` section. `data` starts with the
    /// compression header.
    pub fn compressed_section(mut self, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.sections.push(ElfSection {
            name: name.to_string(),
            kind: SHT_PROGBITS,
            flags: SHF_COMPRESSED,
            address: 0,
            data: data.into(),
        });
        self
    }

    pub fn note(mut self, name: &str, address: u64, data: impl Into<Vec<u8>>) -> Self {
        self.sections.push(ElfSection {
            name: name.to_string(),
            kind: SHT_NOTE,
            flags: SHF_ALLOC,
            address,
            data: data.into(),
        });
        self
    }

    pub fn symbol(mut self, name: &str, address: u64, size: u64) -> Self {
        self.symbols.push(ElfSymbol {
            name: name.to_string(),
            address,
            size,
        });
        self
    }

    fn section_index(&self, address: u64) -> u16 {
        self.sections
            .iter()
            .position(|s| address >= s.address && address < s.address + s.data.len() as u64)
            .map_or(SHN_ABS, |i| i as u16 + 1)
    }

    pub fn build(self) -> Vec<u8> {
        let is_64 = self.is_64;
        let (header_size, shdr_size, sym_size) = if is_64 {
            (ELF64_HEADER_SIZE, ELF64_SHDR_SIZE, ELF64_SYM_SIZE)
        } else {
            (ELF32_HEADER_SIZE, ELF32_SHDR_SIZE, ELF32_SYM_SIZE)
        };

        let mut out = vec![0u8; header_size];
        let mut shstrtab = vec![0u8];
        // (name, type, flags, addr, offset, size, link, info, align, entsize)
        let mut headers = Vec::new();

        for section in &self.sections {
            align(&mut out, 16);
            let offset = out.len() as u64;
            out.extend_from_slice(&section.data);
            headers.push((
                push_name(&mut shstrtab, &section.name),
                section.kind,
                section.flags,
                section.address,
                offset,
                section.data.len() as u64,
                0u32,
                0u32,
                16u64,
                0u64,
            ));
        }

        if !self.symbols.is_empty() {
            let mut strtab = vec![0u8];
            let mut symtab = vec![0u8; sym_size];
            for sym in &self.symbols {
                let name = push_name(&mut strtab, &sym.name);
                let shndx = self.section_index(sym.address);
                symtab.extend_from_slice(&name.to_le_bytes());
                if is_64 {
                    symtab.push(STT_FUNC_GLOBAL);
                    symtab.push(0);
                    symtab.extend_from_slice(&shndx.to_le_bytes());
                    symtab.extend_from_slice(&sym.address.to_le_bytes());
                    symtab.extend_from_slice(&sym.size.to_le_bytes());
                } else {
                    symtab.extend_from_slice(&(sym.address as u32).to_le_bytes());
                    symtab.extend_from_slice(&(sym.size as u32).to_le_bytes());
                    symtab.push(STT_FUNC_GLOBAL);
                    symtab.push(0);
                    symtab.extend_from_slice(&shndx.to_le_bytes());
                }
            }

            let strtab_index = headers.len() as u32 + 2;
            align(&mut out, 8);
            let offset = out.len() as u64;
            out.extend_from_slice(&symtab);
            headers.push((
                push_name(&mut shstrtab, ".symtab"),
                SHT_SYMTAB,
                0,
                0,
                offset,
                symtab.len() as u64,
                strtab_index,
                1,
                8,
                sym_size as u64,
            ));

            let offset = out.len() as u64;
            out.extend_from_slice(&strtab);
            headers.push((
                push_name(&mut shstrtab, ".strtab"),
                SHT_STRTAB,
                0,
                0,
                offset,
                strtab.len() as u64,
                0,
                0,
                1,
                0,
            ));
        }

        let shstrtab_name = push_name(&mut shstrtab, ".shstrtab");
        let offset = out.len() as u64;
        out.extend_from_slice(&shstrtab);
        headers.push((
            shstrtab_name,
            SHT_STRTAB,
            0,
            0,
            offset,
            shstrtab.len() as u64,
            0,
            0,
            1,
            0,
        ));

        align(&mut out, 8);
        let shoff = out.len() as u64;
        out.extend(std::iter::repeat(0u8).take(shdr_size));
        for (name, kind, flags, addr, offset, size, link, info, addralign, entsize) in &headers {
            out.extend_from_slice(&name.to_le_bytes());
            out.extend_from_slice(&kind.to_le_bytes());
            push_word(&mut out, *flags, is_64);
            push_word(&mut out, *addr, is_64);
            push_word(&mut out, *offset, is_64);
            push_word(&mut out, *size, is_64);
            out.extend_from_slice(&link.to_le_bytes());
            out.extend_from_slice(&info.to_le_bytes());
            push_word(&mut out, *addralign, is_64);
            push_word(&mut out, *entsize, is_64);
        }
        let shnum = headers.len() as u16 + 1;

        let class = if is_64 { 2 } else { 1 };
        let mut header = Vec::with_capacity(header_size);
        header.extend_from_slice(&[0x7f, b'E', b'L', b'F', class, 1, 1, self.os_abi]);
        header.extend_from_slice(&[0u8; 8]);
        header.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        header.extend_from_slice(&self.machine.to_le_bytes());
        header.extend_from_slice(&1u32.to_le_bytes());
        push_word(&mut header, 0, is_64); // e_entry
        push_word(&mut header, 0, is_64); // e_phoff
        push_word(&mut header, shoff, is_64);
        header.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        header.extend_from_slice(&(header_size as u16).to_le_bytes());
        let phentsize: u16 = if is_64 { 56 } else { 32 };
        header.extend_from_slice(&phentsize.to_le_bytes());
        header.extend_from_slice(&0u16.to_le_bytes()); // e_phnum
        header.extend_from_slice(&(shdr_size as u16).to_le_bytes());
        header.extend_from_slice(&shnum.to_le_bytes());
        header.extend_from_slice(&(shnum - 1).to_le_bytes()); // .shstrtab is last
        out[..header_size].copy_from_slice(&header);

        out
    }
}

// ============================================================================
// Mach-O
// ============================================================================

struct MachSection {
    name: String,
    address: u64,
    data: Vec<u8>,
}

struct MachSymbol {
    name: String,
    n_type: u8,
    address: u64,
}

/// Little-endian Mach-O executable writer with a single segment.
pub struct MachOBuilder {
    cputype: u32,
    is_64: bool,
    sections: Vec<MachSection>,
    symbols: Vec<MachSymbol>,
}

impl MachOBuilder {
    /// A 64-bit (`MH_MAGIC_64`) image.
    pub fn new(cputype: u32) -> Self {
        Self {
            cputype,
            is_64: true,
            sections: Vec::new(),
            symbols: Vec::new(),
        }
    }

    /// A 32-bit (`MH_MAGIC`) image.
    pub fn new32(cputype: u32) -> Self {
        Self {
            is_64: false,
            ..Self::new(cputype)
        }
    }

    pub fn section(mut self, name: &str, address: u64, data: impl Into<Vec<u8>>) -> Self {
        self.sections.push(MachSection {
            name: name.to_string(),
            address,
            data: data.into(),
        });
        self
    }

    pub fn symbol(mut self, name: &str, n_type: u8, address: u64) -> Self {
        self.symbols.push(MachSymbol {
            name: name.to_string(),
            n_type,
            address,
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let is_64 = self.is_64;
        let (header_size, segment_cmd_size, section_size) = if is_64 {
            (MACH_HEADER_64_SIZE, SEGMENT_64_CMD_SIZE, SECTION_64_SIZE)
        } else {
            (MACH_HEADER_SIZE, SEGMENT_CMD_SIZE, SECTION_SIZE)
        };

        let nsects = self.sections.len();
        let segment_size = segment_cmd_size + section_size * nsects;
        let has_symtab = !self.symbols.is_empty();
        let sizeofcmds = segment_size + if has_symtab { SYMTAB_CMD_SIZE } else { 0 };
        let ncmds: u32 = if has_symtab { 2 } else { 1 };

        // Section contents after the load commands.
        let mut body = vec![0u8; header_size + sizeofcmds];
        let mut offsets = Vec::with_capacity(nsects);
        for section in &self.sections {
            align(&mut body, 16);
            offsets.push(body.len() as u32);
            body.extend_from_slice(&section.data);
        }
        let data_start = offsets.first().copied().unwrap_or(body.len() as u32) as u64;
        let data_end = body.len() as u64;

        let (symoff, stroff, strsize) = if has_symtab {
            let mut strings = vec![0u8];
            let mut nlists = Vec::new();
            for sym in &self.symbols {
                nlists.extend_from_slice(&push_name(&mut strings, &sym.name).to_le_bytes());
                nlists.push(sym.n_type);
                nlists.push(1); // n_sect
                nlists.extend_from_slice(&0u16.to_le_bytes());
                push_word(&mut nlists, sym.address, is_64);
            }
            align(&mut body, 8);
            let symoff = body.len() as u32;
            body.extend_from_slice(&nlists);
            let stroff = body.len() as u32;
            body.extend_from_slice(&strings);
            (symoff, stroff, strings.len() as u32)
        } else {
            (0, 0, 0)
        };

        let vmaddr = self.sections.iter().map(|s| s.address).min().unwrap_or(0);
        let vmend = self
            .sections
            .iter()
            .map(|s| s.address + s.data.len() as u64)
            .max()
            .unwrap_or(0);

        let mut cmds = Vec::with_capacity(sizeofcmds);
        let segment_cmd = if is_64 { LC_SEGMENT_64 } else { LC_SEGMENT };
        cmds.extend_from_slice(&segment_cmd.to_le_bytes());
        cmds.extend_from_slice(&(segment_size as u32).to_le_bytes());
        cmds.extend_from_slice(&fixed_name("__TEXT"));
        push_word(&mut cmds, vmaddr, is_64);
        push_word(&mut cmds, vmend - vmaddr, is_64);
        push_word(&mut cmds, data_start, is_64);
        push_word(&mut cmds, data_end - data_start, is_64);
        cmds.extend_from_slice(&5u32.to_le_bytes()); // maxprot r-x
        cmds.extend_from_slice(&5u32.to_le_bytes()); // initprot
        cmds.extend_from_slice(&(nsects as u32).to_le_bytes());
        cmds.extend_from_slice(&0u32.to_le_bytes());

        for (section, offset) in self.sections.iter().zip(&offsets) {
            cmds.extend_from_slice(&fixed_name(&section.name));
            cmds.extend_from_slice(&fixed_name("__TEXT"));
            push_word(&mut cmds, section.address, is_64);
            push_word(&mut cmds, section.data.len() as u64, is_64);
            cmds.extend_from_slice(&offset.to_le_bytes());
            cmds.extend_from_slice(&4u32.to_le_bytes()); // align 2^4
            // reloff, nreloc, flags, reserved1, reserved2 (+ reserved3)
            let tail = if is_64 { 6 } else { 5 };
            cmds.extend(std::iter::repeat(0u8).take(4 * tail));
        }

        if has_symtab {
            cmds.extend_from_slice(&LC_SYMTAB.to_le_bytes());
            cmds.extend_from_slice(&(SYMTAB_CMD_SIZE as u32).to_le_bytes());
            cmds.extend_from_slice(&symoff.to_le_bytes());
            cmds.extend_from_slice(&(self.symbols.len() as u32).to_le_bytes());
            cmds.extend_from_slice(&stroff.to_le_bytes());
            cmds.extend_from_slice(&strsize.to_le_bytes());
        }

        let mut header = Vec::with_capacity(header_size);
        let magic = if is_64 { MH_MAGIC_64 } else { MH_MAGIC };
        header.extend_from_slice(&magic.to_le_bytes());
        header.extend_from_slice(&self.cputype.to_le_bytes());
        header.extend_from_slice(&3u32.to_le_bytes()); // cpusubtype
        header.extend_from_slice(&MH_EXECUTE.to_le_bytes());
        header.extend_from_slice(&ncmds.to_le_bytes());
        header.extend_from_slice(&(sizeofcmds as u32).to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes()); // flags
        if is_64 {
            header.extend_from_slice(&0u32.to_le_bytes()); // reserved
        }

        body[..header_size].copy_from_slice(&header);
        body[header_size..header_size + sizeofcmds].copy_from_slice(&cmds);
        body
    }
}

// ============================================================================
// PE
// ============================================================================

struct PeSection {
    name: String,
    address: u64,
    data: Vec<u8>,
    characteristics: u32,
}

struct CoffSymbol {
    name: String,
    address: u64,
}

/// PE executable writer with a COFF symbol table, the way the Go linker
/// emits them. Addresses are absolute (`PE_IMAGE_BASE` + RVA).
pub struct PeBuilder {
    machine: u16,
    sections: Vec<PeSection>,
    symbols: Vec<CoffSymbol>,
}

impl PeBuilder {
    pub fn new(machine: u16) -> Self {
        Self {
            machine,
            sections: Vec::new(),
            symbols: Vec::new(),
        }
    }

    pub fn section(mut self, name: &str, address: u64, data: impl Into<Vec<u8>>) -> Self {
        let characteristics = match name {
            ".text" => 0x6000_0020, // code, r-x
            ".data" => 0xc000_0040, // initialized data, rw-
            _ => 0x4000_0040, // initialized data, r--
        };
        self.sections.push(PeSection {
            name: name.to_string(),
            address,
            data: data.into(),
            characteristics,
        });
        self
    }

    pub fn symbol(mut self, name: &str, address: u64) -> Self {
        self.symbols.push(CoffSymbol {
            name: name.to_string(),
            address,
        });
        self
    }

    fn is_pe32_plus(&self) -> bool {
        !matches!(
            self.machine,
            IMAGE_FILE_MACHINE_I386 | IMAGE_FILE_MACHINE_ARMNT
        )
    }

    /// 1-based section number and section-relative value of `address`.
    fn locate(&self, address: u64) -> (i16, u32) {
        self.sections
            .iter()
            .position(|s| address >= s.address && address < s.address + s.data.len() as u64)
            .map_or((-1, address as u32), |i| {
                (i as i16 + 1, (address - self.sections[i].address) as u32)
            })
    }

    pub fn build(self) -> Vec<u8> {
        let plus = self.is_pe32_plus();
        let optional_size = if plus {
            PE32_PLUS_OPTIONAL_SIZE
        } else {
            PE32_OPTIONAL_SIZE
        };
        let headers_end = PE_NT_OFFSET
            + 4
            + COFF_HEADER_SIZE
            + optional_size
            + PE_SECTION_HEADER_SIZE * self.sections.len();

        let mut out = vec![0u8; headers_end];
        align(&mut out, PE_FILE_ALIGNMENT);
        let size_of_headers = out.len() as u32;

        let mut raw = Vec::with_capacity(self.sections.len());
        for section in &self.sections {
            let offset = out.len() as u32;
            out.extend_from_slice(&section.data);
            align(&mut out, PE_FILE_ALIGNMENT);
            raw.push((offset, out.len() as u32 - offset));
        }

        let (symbol_offset, nsyms) = if self.symbols.is_empty() {
            (0u32, 0u32)
        } else {
            let symbol_offset = out.len() as u32;
            let mut strings = Vec::new();
            for sym in &self.symbols {
                let (section, value) = self.locate(sym.address);
                if sym.name.len() <= 8 {
                    let mut short = [0u8; 8];
                    short[..sym.name.len()].copy_from_slice(sym.name.as_bytes());
                    out.extend_from_slice(&short);
                } else {
                    // Offsets count the 4-byte size field at the table start.
                    let offset = 4 + strings.len() as u32;
                    strings.extend_from_slice(sym.name.as_bytes());
                    strings.push(0);
                    out.extend_from_slice(&0u32.to_le_bytes());
                    out.extend_from_slice(&offset.to_le_bytes());
                }
                out.extend_from_slice(&value.to_le_bytes());
                out.extend_from_slice(&section.to_le_bytes());
                out.extend_from_slice(&IMAGE_SYM_DTYPE_FUNCTION.to_le_bytes());
                out.push(IMAGE_SYM_CLASS_EXTERNAL);
                out.push(0); // aux entries
            }
            out.extend_from_slice(&(4 + strings.len() as u32).to_le_bytes());
            out.extend_from_slice(&strings);
            (symbol_offset, self.symbols.len() as u32)
        };

        let size_of_image = self
            .sections
            .iter()
            .map(|s| s.address + s.data.len() as u64 - PE_IMAGE_BASE)
            .max()
            .unwrap_or(0x1000) as u32;

        let mut nt = Vec::with_capacity(headers_end - PE_NT_OFFSET);
        nt.extend_from_slice(b"PE\0\0");

        nt.extend_from_slice(&self.machine.to_le_bytes());
        nt.extend_from_slice(&(self.sections.len() as u16).to_le_bytes());
        nt.extend_from_slice(&0u32.to_le_bytes()); // TimeDateStamp
        nt.extend_from_slice(&symbol_offset.to_le_bytes());
        nt.extend_from_slice(&nsyms.to_le_bytes());
        nt.extend_from_slice(&(optional_size as u16).to_le_bytes());
        let characteristics: u16 = if plus { 0x0022 } else { 0x0102 };
        nt.extend_from_slice(&characteristics.to_le_bytes());

        let magic: u16 = if plus { 0x20b } else { 0x10b };
        nt.extend_from_slice(&magic.to_le_bytes());
        nt.extend_from_slice(&[3, 0]); // linker version
        nt.extend_from_slice(&[0u8; 4 * 3]); // SizeOfCode, (Un)InitializedData
        nt.extend_from_slice(&0u32.to_le_bytes()); // AddressOfEntryPoint
        nt.extend_from_slice(&0x1000u32.to_le_bytes()); // BaseOfCode
        if !plus {
            nt.extend_from_slice(&0u32.to_le_bytes()); // BaseOfData
        }
        push_word(&mut nt, PE_IMAGE_BASE, plus);
        nt.extend_from_slice(&0x1000u32.to_le_bytes()); // SectionAlignment
        nt.extend_from_slice(&(PE_FILE_ALIGNMENT as u32).to_le_bytes());
        nt.extend_from_slice(&[4, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0]); // OS, image, subsystem versions
        nt.extend_from_slice(&0u32.to_le_bytes()); // Win32VersionValue
        nt.extend_from_slice(&size_of_image.to_le_bytes());
        nt.extend_from_slice(&size_of_headers.to_le_bytes());
        nt.extend_from_slice(&0u32.to_le_bytes()); // CheckSum
        nt.extend_from_slice(&3u16.to_le_bytes()); // IMAGE_SUBSYSTEM_WINDOWS_CUI
        nt.extend_from_slice(&0u16.to_le_bytes()); // DllCharacteristics
        for reserve in [0x20_0000u64, 0x1000, 0x10_0000, 0x1000] {
            push_word(&mut nt, reserve, plus); // stack and heap
        }
        nt.extend_from_slice(&0u32.to_le_bytes()); // LoaderFlags
        nt.extend_from_slice(&16u32.to_le_bytes()); // NumberOfRvaAndSizes
        nt.extend_from_slice(&[0u8; 16 * 8]);

        for (section, (offset, size)) in self.sections.iter().zip(&raw) {
            let mut name = [0u8; 8];
            name[..section.name.len()].copy_from_slice(section.name.as_bytes());
            nt.extend_from_slice(&name);
            nt.extend_from_slice(&(section.data.len() as u32).to_le_bytes());
            nt.extend_from_slice(&((section.address - PE_IMAGE_BASE) as u32).to_le_bytes());
            nt.extend_from_slice(&size.to_le_bytes());
            nt.extend_from_slice(&offset.to_le_bytes());
            nt.extend_from_slice(&[0u8; 12]); // relocations, line numbers
            nt.extend_from_slice(&section.characteristics.to_le_bytes());
        }

        out[..2].copy_from_slice(b"MZ");
        out[0x3c..0x40].copy_from_slice(&(PE_NT_OFFSET as u32).to_le_bytes());
        out[PE_NT_OFFSET..headers_end].copy_from_slice(&nt);
        out
    }
}
