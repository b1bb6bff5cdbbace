//! Version lookup through `runtime.schedinit`.
//!
//! `schedinit` is the only function that loads `runtime.buildVersion`, so
//! the first `lea` in it that points at a `go1.`-prefixed Go string is the
//! compiler version.

use tracing::{debug, trace};

use super::{GoVersion, VersionTable};
use crate::binary::{Arch, BinaryFile};
use crate::disasm::{MemBase, Operand, Scanner};
use crate::stdlib::{self, PackageEnumerator};

const SCHEDINIT_SYMBOL: &str = "runtime.schedinit";
/// Bytes read at a candidate string header.
const STRING_HEADER_READ: u64 = 0x20;
const VERSION_PREFIX: &[u8] = b"go1.";

pub(super) fn detect(
    file: &dyn BinaryFile,
    table: &VersionTable,
    packages: Option<&dyn PackageEnumerator>,
) -> Option<GoVersion> {
    let info = file.file_info();
    if !matches!(info.arch, Arch::X86 | Arch::X86_64) {
        trace!(arch = %info.arch, "skipping schedinit scan");
        return None;
    }

    let (start, size) = locate_schedinit(file, packages)?;
    let code = match file.raw_bytes(start, size) {
        Ok(code) => code,
        Err(e) => {
            debug!(error = %e, start, size, "cannot read schedinit");
            return None;
        }
    };

    let bitness = (info.word_size * 8) as u32;
    let mut scanner = Scanner::new(bitness, code).ok()?;

    loop {
        let instr = match scanner.next_instruction() {
            Ok(Some(instr)) => instr,
            Ok(None) => return None,
            Err(e) => {
                debug!(error = %e, "stopping schedinit scan");
                return None;
            }
        };
        if !instr.is_lea() {
            continue;
        }
        let Some(Operand::Memory(mem)) = instr.operands.get(1) else {
            continue;
        };

        let address = match mem.base {
            MemBase::Sp => continue,
            MemBase::Ip => start
                .wrapping_add(instr.end() as u64)
                .wrapping_add_signed(mem.displacement),
            _ => mem.displacement as u64,
        };
        let address = if info.word_size == 4 {
            address & 0xffff_ffff
        } else {
            address
        };

        let Some(candidate) = read_go_string(file, address) else {
            continue;
        };
        if !candidate.starts_with(VERSION_PREFIX) {
            continue;
        }

        let name = String::from_utf8_lossy(candidate).into_owned();
        return Some(match table.resolve(&name) {
            Some(version) => version.clone(),
            None => {
                debug!(%name, "version string not in release table");
                GoVersion::unknown(name)
            }
        });
    }
}

/// Finds `(address, size)` of `runtime.schedinit`.
fn locate_schedinit(
    file: &dyn BinaryFile,
    packages: Option<&dyn PackageEnumerator>,
) -> Option<(u64, u64)> {
    if file.has_symbol_table() {
        if let Ok(found) = file.symbol(SCHEDINIT_SYMBOL) {
            return Some(found);
        }
    }

    let listed = match packages?.packages(file) {
        Ok(listed) => listed,
        Err(e) => {
            debug!(error = %e, "package enumeration failed");
            return None;
        }
    };
    let std = stdlib::std_library(listed);
    let function = stdlib::find_function(&std, "runtime", "schedinit")?;
    Some((function.offset, function.size()))
}

/// Dereferences a `(pointer, length)` string header at `address`.
fn read_go_string(file: &dyn BinaryFile, address: u64) -> Option<&[u8]> {
    let info = file.file_info();
    let header = file.raw_bytes(address, STRING_HEADER_READ).ok()?;
    let ptr = info.byte_order.read_word(header, info.word_size)?;
    let len = info
        .byte_order
        .read_word(header.get(info.word_size..)?, info.word_size)?;
    file.raw_bytes(ptr, len).ok()
}
