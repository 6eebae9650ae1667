//! Utility functions for binary data processing.
//!
//! This module provides the low-level primitives the decoders are built on:
//! - Unaligned little-endian reads (via byteorder)
//! - NUL terminator search (via memchr)
//! - ULEB128 / SLEB128 decoding for dyld opcode streams

use byteorder::{ByteOrder, LittleEndian};

// =============================================================================
// Unaligned Reads
// =============================================================================

/// Reads a little-endian u32 from an unaligned byte slice.
///
/// # Panics
///
/// Panics if `data.len() < 4`.
#[inline(always)]
pub fn read_u32_le(data: &[u8]) -> u32 {
    LittleEndian::read_u32(data)
}

/// Reads a little-endian u16 from an unaligned byte slice.
///
/// # Panics
///
/// Panics if `data.len() < 2`.
#[inline(always)]
pub fn read_u16_le(data: &[u8]) -> u16 {
    LittleEndian::read_u16(data)
}

// =============================================================================
// Byte Search
// =============================================================================

/// Finds the position of the first null byte in a slice.
///
/// Returns `data.len()` when the slice has no terminator.
#[inline(always)]
pub fn memchr_null(data: &[u8]) -> usize {
    memchr::memchr(0, data).unwrap_or(data.len())
}

/// Returns the bytes of a fixed-width, NUL-padded field up to the first NUL.
#[inline]
pub fn trim_nul(field: &[u8]) -> &[u8] {
    &field[..memchr_null(field)]
}

/// Decodes a fixed-width, NUL-padded name field (segment/section names).
pub fn fixed_str(field: &[u8]) -> String {
    String::from_utf8_lossy(trim_nul(field)).into_owned()
}

// =============================================================================
// LEB128
// =============================================================================

/// Reads an unsigned LEB128 value.
///
/// Most values in Mach-O opcode streams are one or two bytes, so those are
/// handled before falling back to the general loop.
///
/// # Returns
///
/// `(value, bytes_consumed)`, or `None` if the data ends before the final
/// byte or the encoding does not fit in 64 bits.
#[inline(always)]
pub fn read_uleb128(data: &[u8]) -> Option<(u64, usize)> {
    let b0 = *data.first()?;
    if b0 < 0x80 {
        return Some((b0 as u64, 1));
    }

    let b1 = *data.get(1)?;
    if b1 < 0x80 {
        let value = ((b0 & 0x7F) as u64) | ((b1 as u64) << 7);
        return Some((value, 2));
    }

    let mut result: u64 = 0;
    let mut shift = 0u32;

    for (i, &byte) in data.iter().enumerate() {
        if shift >= 64 {
            return None;
        }

        result |= ((byte & 0x7F) as u64) << shift;
        shift += 7;

        if byte < 0x80 {
            return Some((result, i + 1));
        }
    }

    None
}

/// Reads a signed LEB128 value.
///
/// # Returns
///
/// `(value, bytes_consumed)`, or `None` if the data ends before the final
/// byte or the encoding does not fit in 64 bits.
#[inline(always)]
pub fn read_sleb128(data: &[u8]) -> Option<(i64, usize)> {
    let b0 = *data.first()?;
    if b0 < 0x80 {
        // Sign extend from 7 bits
        let value = if (b0 & 0x40) != 0 {
            (b0 as i64) | !0x7F_i64
        } else {
            b0 as i64
        };
        return Some((value, 1));
    }

    let mut result: i64 = 0;
    let mut shift = 0u32;

    for (i, &byte) in data.iter().enumerate() {
        if shift >= 64 {
            return None;
        }

        result |= ((byte & 0x7F) as i64) << shift;
        shift += 7;

        if byte < 0x80 {
            if shift < 64 && (byte & 0x40) != 0 {
                result |= !0_i64 << shift;
            }
            return Some((result, i + 1));
        }
    }

    None
}

/// Encodes an unsigned LEB128 value.
#[cfg(test)]
pub fn write_uleb128(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u32_le() {
        let data = [0xCE, 0xFA, 0xED, 0xFE];
        assert_eq!(read_u32_le(&data), 0xFEEDFACE);
    }

    #[test]
    fn test_memchr_null() {
        assert_eq!(memchr_null(b"hello\0world"), 5);
        assert_eq!(memchr_null(b"\0"), 0);
        assert_eq!(memchr_null(b"hello"), 5);
    }

    #[test]
    fn test_fixed_str() {
        let mut field = [0u8; 16];
        field[..6].copy_from_slice(b"__TEXT");
        assert_eq!(fixed_str(&field), "__TEXT");
        assert_eq!(fixed_str(&[0u8; 16]), "");
        assert_eq!(fixed_str(b"0123456789abcdef"), "0123456789abcdef");
    }

    #[test]
    fn test_uleb128() {
        assert_eq!(read_uleb128(&[0x00]), Some((0, 1)));
        assert_eq!(read_uleb128(&[0x7F]), Some((127, 1)));
        assert_eq!(read_uleb128(&[0x80, 0x01]), Some((128, 2)));
        assert_eq!(read_uleb128(&[0xE5, 0x8E, 0x26]), Some((624485, 3)));

        // Trailing bytes are not consumed
        assert_eq!(read_uleb128(&[0x04, 0x90]), Some((4, 1)));

        // Truncated
        assert_eq!(read_uleb128(&[]), None);
        assert_eq!(read_uleb128(&[0x80]), None);
        assert_eq!(read_uleb128(&[0x80, 0x80]), None);
    }

    #[test]
    fn test_uleb128_overlong() {
        let data = [0xFFu8; 11];
        assert_eq!(read_uleb128(&data), None);
    }

    #[test]
    fn test_sleb128() {
        assert_eq!(read_sleb128(&[0x00]), Some((0, 1)));
        assert_eq!(read_sleb128(&[0x3F]), Some((63, 1)));
        assert_eq!(read_sleb128(&[0x7F]), Some((-1, 1)));
        assert_eq!(read_sleb128(&[0x40]), Some((-64, 1)));
        assert_eq!(read_sleb128(&[0x80, 0x7F]), Some((-128, 2)));
        assert_eq!(read_sleb128(&[0x80, 0x01]), Some((128, 2)));
    }

    #[test]
    fn test_write_uleb128() {
        let mut out = Vec::new();
        write_uleb128(624485, &mut out);
        assert_eq!(out, [0xE5, 0x8E, 0x26]);
    }
}
