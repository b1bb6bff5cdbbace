//! Go build ID extraction.
//!
//! The linker writes the ID twice: as an ELF note (when the format has
//! notes) and as a quoted string at the start of the text segment.

use memchr::memmem;

use crate::binary::ByteOrder;
use crate::error::{Error, Result};

const RAW_START: &[u8] = b"\xff Go build ID: \"";
const RAW_END: &[u8] = b"\"\n \xff";

const NOTE_NAME: &[u8] = b"Go\x00\x00";
const NOTE_TYPE_BUILD_ID: u32 = 4;

/// Finds the quoted build ID in raw text-segment bytes.
pub fn parse_build_id_from_raw(data: &[u8]) -> Result<String> {
    let start = memmem::find(data, RAW_START).ok_or(Error::BuildIdNotFound)? + RAW_START.len();
    let len = memmem::find(&data[start..], RAW_END).ok_or(Error::BuildIdNotFound)?;
    Ok(String::from_utf8_lossy(&data[start..start + len]).into_owned())
}

/// Decodes the `.note.go.buildid` section.
pub fn parse_build_id_note(note: &[u8], byte_order: ByteOrder) -> Result<String> {
    let truncated = || Error::Malformed("truncated Go build ID note".to_string());

    let namesz = byte_order.read_u32(note).ok_or_else(truncated)? as usize;
    let descsz = byte_order.read_u32(note.get(4..).unwrap_or_default()).ok_or_else(truncated)? as usize;
    let kind = byte_order.read_u32(note.get(8..).unwrap_or_default()).ok_or_else(truncated)?;

    let name_end = 12usize.checked_add(namesz).ok_or_else(truncated)?;
    let name = note.get(12..name_end).ok_or_else(truncated)?;
    if name != NOTE_NAME || kind != NOTE_TYPE_BUILD_ID {
        return Err(Error::BuildIdNotFound);
    }

    let desc_start = 12 + namesz.next_multiple_of(4);
    let desc_end = desc_start.checked_add(descsz).ok_or_else(truncated)?;
    let desc = note.get(desc_start..desc_end).ok_or_else(truncated)?;
    Ok(String::from_utf8_lossy(desc).into_owned())
}
