//! Dyld bind opcode interpreter.
//!
//! `LC_DYLD_INFO[_ONLY]` stores the bind, weak-bind and lazy-bind tables as
//! compact opcode streams. Each byte carries an opcode in its high nibble and
//! an immediate in its low nibble; some opcodes are followed by LEB128
//! operands or a symbol name. Interpreting a stream yields one
//! [`BindRecord`] per pointer dyld would patch.
//!
//! The interpreter runs until the stream is exhausted. `BIND_OPCODE_DONE`
//! does not stop it, so lazy-bind tables (a DONE after every entry) decode
//! in a single pass.

use std::fmt;

use bitflags::bitflags;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::macho::LibraryOrdinal;
use crate::reader::ByteReader;

/// Mask selecting the opcode nibble.
pub const BIND_OPCODE_MASK: u8 = 0xF0;
/// Mask selecting the immediate nibble.
pub const BIND_IMMEDIATE_MASK: u8 = 0x0F;

/// Size of a bound pointer on 32-bit ARM.
const POINTER_SIZE: u32 = 4;

// =============================================================================
// Opcode Table
// =============================================================================

/// Bind opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)] // Variants mirror the BIND_OPCODE_* names
pub enum BindOpcode {
    Done = 0x00,
    SetDylibOrdinalImm = 0x10,
    SetDylibOrdinalUleb = 0x20,
    SetDylibSpecialImm = 0x30,
    SetSymbolTrailingFlagsImm = 0x40,
    SetTypeImm = 0x50,
    SetAddendSleb = 0x60,
    SetSegmentAndOffsetUleb = 0x70,
    AddAddrUleb = 0x80,
    DoBind = 0x90,
    DoBindAddAddrUleb = 0xA0,
    DoBindAddAddrImmScaled = 0xB0,
    DoBindUlebTimesSkippingUleb = 0xC0,
}

impl BindOpcode {
    /// Looks up the opcode nibble of a stream byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let op = match byte & BIND_OPCODE_MASK {
            0x00 => BindOpcode::Done,
            0x10 => BindOpcode::SetDylibOrdinalImm,
            0x20 => BindOpcode::SetDylibOrdinalUleb,
            0x30 => BindOpcode::SetDylibSpecialImm,
            0x40 => BindOpcode::SetSymbolTrailingFlagsImm,
            0x50 => BindOpcode::SetTypeImm,
            0x60 => BindOpcode::SetAddendSleb,
            0x70 => BindOpcode::SetSegmentAndOffsetUleb,
            0x80 => BindOpcode::AddAddrUleb,
            0x90 => BindOpcode::DoBind,
            0xA0 => BindOpcode::DoBindAddAddrUleb,
            0xB0 => BindOpcode::DoBindAddAddrImmScaled,
            0xC0 => BindOpcode::DoBindUlebTimesSkippingUleb,
            _ => return None,
        };
        Some(op)
    }
}

/// Pointer fix-up kind set by `BIND_OPCODE_SET_TYPE_IMM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindType {
    /// BIND_TYPE_POINTER
    Pointer,
    /// BIND_TYPE_TEXT_ABSOLUTE32
    TextAbsolute32,
    /// BIND_TYPE_TEXT_PCREL32
    TextPcrel32,
    /// Any other immediate, kept raw
    Other(u8),
}

impl BindType {
    /// Decodes a type immediate.
    pub fn from_imm(imm: u8) -> Self {
        match imm {
            1 => BindType::Pointer,
            2 => BindType::TextAbsolute32,
            3 => BindType::TextPcrel32,
            other => BindType::Other(other),
        }
    }
}

bitflags! {
    /// Symbol flags set by `BIND_OPCODE_SET_SYMBOL_TRAILING_FLAGS_IMM`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BindSymbolFlags: u8 {
        /// BIND_SYMBOL_FLAGS_WEAK_IMPORT
        const WEAK_IMPORT = 0x1;
        /// BIND_SYMBOL_FLAGS_NON_WEAK_DEFINITION
        const NON_WEAK_DEFINITION = 0x8;
    }
}

// =============================================================================
// Records
// =============================================================================

/// One pointer binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindRecord {
    /// Library the symbol is looked up in; `None` if the stream never set one
    pub library: Option<LibraryOrdinal>,
    /// Symbol name
    pub symbol: String,
    /// Symbol flags
    pub flags: BindSymbolFlags,
    /// Fix-up kind; `None` if the stream never set one
    pub bind_type: Option<BindType>,
    /// Index of the segment holding the pointer
    pub segment_index: u8,
    /// Offset of the pointer within that segment
    pub offset: u32,
    /// Value added to the symbol address
    pub addend: i64,
}

impl fmt::Display for BindRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seg{}+{:#x} {}", self.segment_index, self.offset, self.symbol)?;
        if let Some(library) = self.library {
            write!(f, " ({:?})", library)?;
        }
        if self.addend != 0 {
            write!(f, " + {}", self.addend)?;
        }
        Ok(())
    }
}

// =============================================================================
// Interpreter
// =============================================================================

/// Interprets one bind opcode stream.
///
/// Error offsets are relative to the start of `data`.
pub fn parse_bind_opcodes(data: &[u8]) -> Result<Vec<BindRecord>> {
    let mut reader = ByteReader::new(data);
    let mut state = BindRecord::default();
    let mut records = Vec::new();

    while !reader.at_end() {
        let offset = reader.position();
        let byte = reader.read_u8()?;
        let imm = byte & BIND_IMMEDIATE_MASK;
        let opcode = BindOpcode::from_byte(byte).ok_or(Error::UnknownBindOpcode {
            opcode: byte & BIND_OPCODE_MASK,
            offset,
        })?;

        trace!("bind {:#06x}: {:?} imm={}", offset, opcode, imm);

        match opcode {
            BindOpcode::Done => {}
            BindOpcode::SetDylibOrdinalImm => {
                state.library = Some(ordinal(imm as i64, offset)?);
            }
            BindOpcode::SetDylibOrdinalUleb => {
                let value = reader.read_uleb128()?;
                let value = i64::try_from(value)
                    .map_err(|_| Error::parse(offset, "dylib ordinal out of range"))?;
                state.library = Some(ordinal(value, offset)?);
            }
            BindOpcode::SetDylibSpecialImm => {
                // The immediate is a sign-extended nibble; zero stays zero.
                let value = if imm == 0 {
                    0
                } else {
                    (imm | BIND_OPCODE_MASK) as i8 as i64
                };
                state.library = Some(ordinal(value, offset)?);
            }
            BindOpcode::SetSymbolTrailingFlagsImm => {
                state.flags = BindSymbolFlags::from_bits_truncate(imm);
                state.symbol = reader.read_cstr()?;
            }
            BindOpcode::SetTypeImm => {
                state.bind_type = Some(BindType::from_imm(imm));
            }
            BindOpcode::SetAddendSleb => {
                state.addend = reader.read_sleb128()?;
            }
            BindOpcode::SetSegmentAndOffsetUleb => {
                state.segment_index = imm;
                state.offset = reader.read_uleb128()? as u32;
            }
            BindOpcode::AddAddrUleb => {
                let delta = reader.read_uleb128()?;
                state.offset = state.offset.wrapping_add(delta as u32);
            }
            BindOpcode::DoBind => {
                records.push(state.clone());
                state.offset = state.offset.wrapping_add(POINTER_SIZE);
            }
            BindOpcode::DoBindAddAddrUleb => {
                records.push(state.clone());
                let delta = reader.read_uleb128()?;
                state.offset = state
                    .offset
                    .wrapping_add(delta as u32)
                    .wrapping_add(POINTER_SIZE);
            }
            BindOpcode::DoBindAddAddrImmScaled => {
                records.push(state.clone());
                state.offset = state
                    .offset
                    .wrapping_add(POINTER_SIZE)
                    .wrapping_add(imm as u32 * POINTER_SIZE);
            }
            BindOpcode::DoBindUlebTimesSkippingUleb => {
                let count = reader.read_uleb128()?;
                let skip = reader.read_uleb128()?;
                // Past 2^32 bytes the wrapped offsets only repeat.
                let span = count.checked_mul(skip.saturating_add(POINTER_SIZE as u64));
                if span.map_or(true, |span| span > 1 << 32) {
                    return Err(Error::parse(
                        offset,
                        "bind repeat count exceeds address space",
                    ));
                }
                let skip = skip as u32;
                for _ in 0..count {
                    records.push(state.clone());
                    state.offset = state.offset.wrapping_add(skip).wrapping_add(POINTER_SIZE);
                }
            }
        }
    }

    debug!(
        "Decoded {} bind records from {} opcode bytes",
        records.len(),
        data.len()
    );
    Ok(records)
}

fn ordinal(value: i64, offset: usize) -> Result<LibraryOrdinal> {
    LibraryOrdinal::from_bind_ordinal(value)
        .ok_or_else(|| Error::parse(offset, format!("unknown dylib ordinal {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::write_uleb128;

    fn set_symbol(out: &mut Vec<u8>, flags: u8, name: &str) {
        out.push(BindOpcode::SetSymbolTrailingFlagsImm as u8 | flags);
        out.extend_from_slice(name.as_bytes());
        out.push(0);
    }

    fn set_segment(out: &mut Vec<u8>, segment: u8, offset: u64) {
        out.push(BindOpcode::SetSegmentAndOffsetUleb as u8 | segment);
        write_uleb128(offset, out);
    }

    #[test]
    fn test_do_bind_advances_by_pointer() {
        let mut data = Vec::new();
        set_segment(&mut data, 1, 0);
        set_symbol(&mut data, 0, "_foo");
        data.push(BindOpcode::DoBind as u8);
        data.push(BindOpcode::DoBind as u8);

        let records = parse_bind_opcodes(&data).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.symbol == "_foo" && r.segment_index == 1));
        assert_eq!(records[0].offset, 0);
        assert_eq!(records[1].offset, 4);
    }

    #[test]
    fn test_uleb_times_skipping() {
        let mut data = Vec::new();
        set_segment(&mut data, 2, 0);
        set_symbol(&mut data, 0, "_bar");
        data.push(BindOpcode::DoBindUlebTimesSkippingUleb as u8);
        write_uleb128(3, &mut data);
        write_uleb128(4, &mut data);

        let records = parse_bind_opcodes(&data).unwrap();
        let offsets: Vec<u32> = records.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, [0, 8, 16]);
    }

    #[test]
    fn test_uleb_times_count_bounded_by_address_space() {
        let mut data = Vec::new();
        set_symbol(&mut data, 0, "_x");
        data.push(BindOpcode::DoBindUlebTimesSkippingUleb as u8);
        write_uleb128(20_000_000, &mut data);
        write_uleb128(1024, &mut data);

        let err = parse_bind_opcodes(&data).unwrap_err();
        match err {
            Error::Parse { offset, reason } => {
                assert_eq!(offset, 4);
                assert!(reason.contains("repeat count"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let mut data = Vec::new();
        data.push(BindOpcode::DoBindUlebTimesSkippingUleb as u8);
        write_uleb128(u64::MAX, &mut data);
        write_uleb128(0, &mut data);
        assert!(matches!(
            parse_bind_opcodes(&data),
            Err(Error::Parse { offset: 0, .. })
        ));
    }

    #[test]
    fn test_add_addr_variants() {
        let mut data = Vec::new();
        set_segment(&mut data, 1, 0x100);
        set_symbol(&mut data, 0, "_a");
        data.push(BindOpcode::AddAddrUleb as u8);
        write_uleb128(0x10, &mut data);
        data.push(BindOpcode::DoBindAddAddrImmScaled as u8 | 2);
        data.push(BindOpcode::DoBindAddAddrUleb as u8);
        write_uleb128(0x20, &mut data);
        data.push(BindOpcode::DoBind as u8);

        let records = parse_bind_opcodes(&data).unwrap();
        let offsets: Vec<u32> = records.iter().map(|r| r.offset).collect();
        // 0x110, then +4+8, then +0x20+4
        assert_eq!(offsets, [0x110, 0x11C, 0x140]);
    }

    #[test]
    fn test_done_does_not_stop_the_stream() {
        let mut data = Vec::new();
        set_segment(&mut data, 1, 0);
        set_symbol(&mut data, 0, "_first");
        data.push(BindOpcode::DoBind as u8);
        data.push(BindOpcode::Done as u8);
        set_segment(&mut data, 1, 0x40);
        set_symbol(&mut data, 0, "_second");
        data.push(BindOpcode::DoBind as u8);
        data.push(BindOpcode::Done as u8);

        let records = parse_bind_opcodes(&data).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].symbol, "_second");
        assert_eq!(records[1].offset, 0x40);
    }

    #[test]
    fn test_library_ordinals_and_flags() {
        let mut data = Vec::new();
        data.push(BindOpcode::SetDylibOrdinalImm as u8 | 2);
        set_symbol(&mut data, 0x9, "_weak");
        data.push(BindOpcode::SetTypeImm as u8 | 1);
        data.push(BindOpcode::DoBind as u8);
        data.push(BindOpcode::SetDylibOrdinalUleb as u8);
        write_uleb128(20, &mut data);
        data.push(BindOpcode::DoBind as u8);
        data.push(BindOpcode::SetDylibSpecialImm as u8 | 0x0E);
        data.push(BindOpcode::SetTypeImm as u8 | 7);
        data.push(BindOpcode::DoBind as u8);
        data.push(BindOpcode::SetDylibSpecialImm as u8 | 0x0F);
        data.push(BindOpcode::DoBind as u8);

        let records = parse_bind_opcodes(&data).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].library, Some(LibraryOrdinal::Index(2)));
        assert_eq!(
            records[0].flags,
            BindSymbolFlags::WEAK_IMPORT | BindSymbolFlags::NON_WEAK_DEFINITION
        );
        assert_eq!(records[0].bind_type, Some(BindType::Pointer));
        assert_eq!(records[1].library, Some(LibraryOrdinal::Index(20)));
        assert_eq!(records[2].library, Some(LibraryOrdinal::DynamicLookup));
        assert_eq!(records[2].bind_type, Some(BindType::Other(7)));
        assert_eq!(records[3].library, Some(LibraryOrdinal::Executable));
    }

    #[test]
    fn test_addend() {
        let mut data = Vec::new();
        set_symbol(&mut data, 0, "_x");
        data.push(BindOpcode::SetAddendSleb as u8);
        data.push(0x7C); // -4
        data.push(BindOpcode::DoBind as u8);

        let records = parse_bind_opcodes(&data).unwrap();
        assert_eq!(records[0].addend, -4);
        assert_eq!(records[0].to_string(), "seg0+0x0 _x + -4");
    }

    #[test]
    fn test_library_unset_until_ordinal_opcode() {
        let mut data = Vec::new();
        set_symbol(&mut data, 0, "_x");
        data.push(BindOpcode::DoBind as u8);
        data.push(BindOpcode::SetDylibSpecialImm as u8);
        data.push(BindOpcode::DoBind as u8);

        let records = parse_bind_opcodes(&data).unwrap();
        assert_eq!(records[0].library, None);
        assert_eq!(records[1].library, Some(LibraryOrdinal::SelfImage));
        assert_eq!(records[1].to_string(), "seg0+0x4 _x (SelfImage)");
    }

    #[test]
    fn test_offset_wraps_to_32_bits() {
        let mut data = Vec::new();
        set_segment(&mut data, 1, 0xFFFF_FFFC);
        set_symbol(&mut data, 0, "_w");
        data.push(BindOpcode::DoBind as u8);
        data.push(BindOpcode::DoBind as u8);

        let records = parse_bind_opcodes(&data).unwrap();
        assert_eq!(records[0].offset, 0xFFFF_FFFC);
        assert_eq!(records[1].offset, 0);
    }

    #[test]
    fn test_unknown_opcode_is_fatal() {
        let data = [BindOpcode::DoBind as u8, 0xD0];
        let err = parse_bind_opcodes(&data).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownBindOpcode {
                opcode: 0xD0,
                offset: 1
            }
        ));
        assert!(err.is_bind_stream_error());
    }

    #[test]
    fn test_truncated_operand() {
        let data = [BindOpcode::AddAddrUleb as u8, 0x80];
        assert!(matches!(
            parse_bind_opcodes(&data),
            Err(Error::InvalidUleb128 { offset: 1 })
        ));
    }

    #[test]
    fn test_empty_stream() {
        assert!(parse_bind_opcodes(&[]).unwrap().is_empty());
    }
}
