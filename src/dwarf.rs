//! DWARF access for compiler identification.
//!
//! The Go compiler names itself in every compile unit's `DW_AT_producer`,
//! e.g. `Go cmd/compile go1.21.0; regabi`.

use std::borrow::Cow;

use object::{Object, ObjectSection};

use crate::error::Result;

/// Compile-unit level debug data of a binary.
#[derive(Debug, Clone, Default)]
pub struct DebugInfo {
    producers: Vec<String>,
}

impl DebugInfo {
    pub fn from_producers<I, S>(producers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            producers: producers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn producers(&self) -> &[String] {
        &self.producers
    }

    /// The `goX.Y...` tag of the first Go producer, if any.
    pub fn build_version(&self) -> Option<&str> {
        self.producers.iter().find_map(|p| version_from_producer(p))
    }
}

fn version_from_producer(producer: &str) -> Option<&str> {
    if !producer.starts_with("Go cmd/compile") {
        return None;
    }
    producer
        .split(|c: char| c.is_whitespace() || c == ';')
        .find(|tok| {
            tok.strip_prefix("go")
                .and_then(|rest| rest.chars().next())
                .is_some_and(|c| c.is_ascii_digit())
        })
}

/// Reads the producer string of every compile unit.
pub fn load<'data>(object: &object::File<'data>) -> Result<DebugInfo> {
    let endian = if object.is_little_endian() {
        gimli::RunTimeEndian::Little
    } else {
        gimli::RunTimeEndian::Big
    };

    // A section that is present but cannot be decompressed is an error, not
    // an empty section.
    let load_section = |id: gimli::SectionId| -> Result<Cow<'data, [u8]>> {
        match object.section_by_name(id.name()) {
            Some(section) => Ok(section.uncompressed_data()?),
            None => Ok(Cow::Borrowed(&[][..])),
        }
    };

    let sections = gimli::DwarfSections::load(load_section)?;
    let dwarf = sections.borrow(|section| gimli::EndianSlice::new(section, endian));

    let mut producers = Vec::new();
    let mut units = dwarf.units();
    while let Some(header) = units.next()? {
        let unit = dwarf.unit(header)?;
        let mut entries = unit.entries();
        let Some((_, entry)) = entries.next_dfs()? else {
            continue;
        };
        if let Some(value) = entry.attr_value(gimli::DW_AT_producer)? {
            let producer = dwarf.attr_string(&unit, value)?;
            producers.push(producer.to_string_lossy().into_owned());
        }
    }

    Ok(DebugInfo { producers })
}
