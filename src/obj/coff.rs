//! AMD64 PE/COFF object writer.
//!
//! Layout, concatenated without padding:
//!
//! 1. file header (20 bytes)
//! 2. one `.text` section header (40 bytes)
//! 3. the raw bytecode
//! 4. relocations (10 bytes each)
//! 5. symbol table (18-byte entries): the `.text` section symbol plus its
//!    auxiliary record, then every export and extern symbol in shared-index
//!    order
//! 6. string table: 4-byte total size, then NUL-terminated long names
//!
//! Everything is little-endian and serialized field by field; no packed
//! structs, no unsafe.
//!
//! Invariant: a symbol's recorded `index` must equal its position in the
//! symbol table minus [`BASE_SYMBOLS`]. The writer checks this instead of
//! assuming it.

use bitflags::bitflags;

use crate::bytecode::ByteCode;
use crate::data::{Data, RelocKind};
use crate::error::Error;

/// COFF machine types the writer can stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MachineType {
    /// Applicable to any machine type.
    Unknown = 0x0,
    /// x64.
    Amd64 = 0x8664,
    /// ARM64 little endian.
    Arm64 = 0xAA64,
    /// Intel 386 and compatible.
    I386 = 0x14C,
}

bitflags! {
    /// Section header characteristics.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionCharacteristics: u32 {
        /// The section contains executable code.
        const CNT_CODE = 0x0000_0020;
        /// The section contains initialized data.
        const CNT_INITIALIZED_DATA = 0x0000_0040;
        /// The section contains uninitialized data.
        const CNT_UNINITIALIZED_DATA = 0x0000_0080;
        /// Align data on a 16-byte boundary.
        const ALIGN_16BYTES = 0x0050_0000;
        /// The section can be executed as code.
        const MEM_EXECUTE = 0x2000_0000;
        /// The section can be read.
        const MEM_READ = 0x4000_0000;
        /// The section can be written to.
        const MEM_WRITE = 0x8000_0000;
    }
}

const FILE_HEADER_SIZE: usize = 20;
const SECTION_HEADER_SIZE: usize = 40;
const RELOCATION_SIZE: usize = 10;
const SYMBOL_SIZE: usize = 18;

/// Symbol-table slots taken by the `.text` section symbol and its
/// auxiliary record; every extern/export index is offset by this.
const BASE_SYMBOLS: u32 = 2;

const STORAGE_CLASS_EXTERNAL: u8 = 2;
const STORAGE_CLASS_STATIC: u8 = 3;

/// AMD64 relocation type for a reloc kind.
///
/// PLT-relative collapses to plain PC-relative: Windows has no PLT.
fn relocation_type(kind: RelocKind) -> u16 {
    match kind {
        RelocKind::Abs64 => 0x0001,
        RelocKind::Abs32 => 0x0002,
        RelocKind::Rel32 | RelocKind::Plt32 => 0x0004,
        RelocKind::Rel32_1 => 0x0005,
        RelocKind::Rel32_2 => 0x0006,
        RelocKind::Rel32_3 => 0x0007,
        RelocKind::Rel32_4 => 0x0008,
    }
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn fit_u32(value: usize, what: &str) -> Result<u32, Error> {
    u32::try_from(value).map_err(|_| Error::CoffGeneration(format!("{what} exceeds 32 bits")))
}

/// The 8-byte symbol/section name field: short names inline, long names as
/// a string-table offset.
fn name_field(name: &str, string_table_offset: Option<u32>) -> [u8; 8] {
    let mut field = [0u8; 8];
    match string_table_offset {
        None => field[..name.len()].copy_from_slice(name.as_bytes()),
        Some(offset) => field[4..].copy_from_slice(&offset.to_le_bytes()),
    }
    field
}

fn push_symbol(
    out: &mut Vec<u8>,
    name: [u8; 8],
    value: u32,
    section_number: u16,
    storage_class: u8,
    num_aux: u8,
) {
    out.extend_from_slice(&name);
    push_u32(out, value);
    push_u16(out, section_number);
    push_u16(out, 0); // type
    out.push(storage_class);
    out.push(num_aux);
}

/// Generates the complete object image in memory.
pub fn generate(
    bytecode: &ByteCode,
    data: &Data<'_>,
    machine: MachineType,
) -> Result<Vec<u8>, Error> {
    let code = bytecode.as_slice();
    let symbols = data.object_symbols();

    for (position, symbol) in symbols.iter().enumerate() {
        if symbol.index as usize != position {
            return Err(Error::CoffGeneration(format!(
                "symbol `{}` has index {} but lands at table position {position}",
                symbol.name, symbol.index
            )));
        }
    }

    let num_relocations: usize = symbols.iter().map(|symbol| symbol.refs.len()).sum();
    let num_relocations = u16::try_from(num_relocations)
        .map_err(|_| Error::CoffGeneration("more than 65535 relocations".to_owned()))?;
    let num_symbols = BASE_SYMBOLS as usize + symbols.len();

    // Long names (8 chars and up) go to the string table; the offset
    // includes the table's own 4-byte size field.
    let mut string_table_size = 4u32;
    let mut long_name_offsets = Vec::with_capacity(symbols.len());
    for symbol in &symbols {
        if symbol.name.len() >= 8 {
            long_name_offsets.push(Some(string_table_size));
            string_table_size += fit_u32(symbol.name.len() + 1, "string table")?;
        } else {
            long_name_offsets.push(None);
        }
    }

    let code_offset = FILE_HEADER_SIZE + SECTION_HEADER_SIZE;
    let reloc_offset = code_offset + code.len();
    let symbol_offset = reloc_offset + num_relocations as usize * RELOCATION_SIZE;
    let total_size = symbol_offset + num_symbols * SYMBOL_SIZE + string_table_size as usize;

    let mut out = Vec::with_capacity(total_size);

    // File header.
    push_u16(&mut out, machine as u16);
    push_u16(&mut out, 1); // number of sections
    push_u32(&mut out, 0); // timestamp
    push_u32(&mut out, fit_u32(symbol_offset, "symbol table offset")?);
    push_u32(&mut out, fit_u32(num_symbols, "symbol count")?);
    push_u16(&mut out, 0); // optional header size
    push_u16(&mut out, 0); // characteristics

    // `.text` section header.
    let characteristics = SectionCharacteristics::CNT_CODE
        | SectionCharacteristics::MEM_EXECUTE
        | SectionCharacteristics::MEM_READ
        | SectionCharacteristics::ALIGN_16BYTES;
    out.extend_from_slice(b".text\0\0\0");
    push_u32(&mut out, 0); // virtual size
    push_u32(&mut out, 0); // virtual address
    push_u32(&mut out, fit_u32(code.len(), "section size")?);
    push_u32(&mut out, fit_u32(code_offset, "section offset")?);
    push_u32(
        &mut out,
        if num_relocations > 0 {
            fit_u32(reloc_offset, "relocation offset")?
        } else {
            0
        },
    );
    push_u32(&mut out, 0); // line numbers
    push_u16(&mut out, num_relocations);
    push_u16(&mut out, 0); // line number count
    push_u32(&mut out, characteristics.bits());

    out.extend_from_slice(code);

    // Relocations, grouped per symbol in index order.
    for symbol in &symbols {
        for reference in symbol.refs {
            push_u32(&mut out, fit_u32(reference.offset, "relocation address")?);
            push_u32(&mut out, BASE_SYMBOLS + symbol.index);
            push_u16(&mut out, relocation_type(reference.kind));
        }
    }

    // Symbol table. Entry 0 describes the section itself, followed by its
    // auxiliary record carrying the section size and relocation count.
    push_symbol(
        &mut out,
        name_field(".text", None),
        0,
        1,
        STORAGE_CLASS_STATIC,
        1,
    );
    push_u32(&mut out, fit_u32(code.len(), "section size")?);
    push_u16(&mut out, num_relocations);
    push_u16(&mut out, 0); // line numbers
    push_u32(&mut out, 0); // checksum
    push_u16(&mut out, 0); // section number for COMDAT
    out.push(0); // selection
    out.extend_from_slice(&[0u8; 3]);

    for (symbol, long_name) in symbols.iter().zip(&long_name_offsets) {
        let (value, section_number) = match symbol.defined_at {
            Some(offset) => (fit_u32(offset, "symbol value")?, 1),
            None => (0, 0),
        };
        push_symbol(
            &mut out,
            name_field(symbol.name, *long_name),
            value,
            section_number,
            STORAGE_CLASS_EXTERNAL,
            0,
        );
    }

    // String table.
    push_u32(&mut out, string_table_size);
    for (symbol, long_name) in symbols.iter().zip(&long_name_offsets) {
        if long_name.is_some() {
            out.extend_from_slice(symbol.name.as_bytes());
            out.push(0);
        }
    }

    debug_assert_eq!(out.len(), total_size);
    Ok(out)
}
