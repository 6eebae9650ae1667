//! Cursor over an in-memory image.
//!
//! All decoders read through a [`ByteReader`]. Sub-reads that need to jump
//! elsewhere in the file (string tables, symbol arrays, dyld opcode streams,
//! segment contents) take a [`Checkpoint`] first; dropping the checkpoint
//! puts the cursor back where it was, on every exit path.

use std::ops::{Deref, DerefMut};

use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result};
use crate::util::{fixed_str, memchr_null, read_sleb128, read_u16_le, read_u32_le, read_uleb128};

/// A seekable little-endian reader over a byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Total length of the underlying data.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the underlying data is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current cursor position.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes between the cursor and the end of the data.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Returns true once every byte has been consumed.
    #[inline]
    pub fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Moves the cursor to an absolute position.
    ///
    /// Seeking to exactly `len()` is allowed; anything past it is an error.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::buffer_too_small(pos, self.data.len()));
        }
        self.pos = pos;
        Ok(())
    }

    /// Advances the cursor by `count` bytes.
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.read_bytes(count).map(|_| ())
    }

    /// Saves the cursor position; it is restored when the guard drops.
    pub fn checkpoint(&mut self) -> Checkpoint<'_, 'a> {
        let saved = self.pos;
        Checkpoint {
            reader: self,
            saved,
        }
    }

    /// Returns the next `len` bytes without moving the cursor.
    pub fn peek_bytes(&self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or_else(|| Error::buffer_too_small(usize::MAX, self.data.len()))?;
        if end > self.data.len() {
            return Err(Error::buffer_too_small(end, self.data.len()));
        }
        Ok(&self.data[self.pos..end])
    }

    /// Reads exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(len)?;
        self.pos += len;
        Ok(bytes)
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Reads a little-endian u16.
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_bytes(2).map(read_u16_le)
    }

    /// Reads a little-endian u32.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_bytes(4).map(read_u32_le)
    }

    /// Reads `count` consecutive little-endian u32 words.
    pub fn read_u32_array(&mut self, count: usize) -> Result<Vec<u32>> {
        let len = count
            .checked_mul(4)
            .ok_or_else(|| Error::buffer_too_small(usize::MAX, self.data.len()))?;
        let bytes = self.read_bytes(len)?;
        Ok(bytes.chunks_exact(4).map(read_u32_le).collect())
    }

    /// Reads a fixed-width, NUL-padded string field.
    pub fn read_fixed_str(&mut self, len: usize) -> Result<String> {
        self.read_bytes(len).map(fixed_str)
    }

    /// Reads a NUL-terminated string and consumes the terminator.
    pub fn read_cstr(&mut self) -> Result<String> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let end = memchr_null(rest);
        if end == rest.len() {
            return Err(Error::parse(self.pos, "unterminated string"));
        }
        let s = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos += end + 1;
        Ok(s)
    }

    /// Reads an unsigned LEB128 value.
    pub fn read_uleb128(&mut self) -> Result<u64> {
        let offset = self.pos;
        let (value, used) = read_uleb128(&self.data[offset.min(self.data.len())..])
            .ok_or(Error::InvalidUleb128 { offset })?;
        self.pos += used;
        Ok(value)
    }

    /// Reads a signed LEB128 value.
    pub fn read_sleb128(&mut self) -> Result<i64> {
        let offset = self.pos;
        let (value, used) = read_sleb128(&self.data[offset.min(self.data.len())..])
            .ok_or(Error::InvalidSleb128 { offset })?;
        self.pos += used;
        Ok(value)
    }

    /// Reads a fixed-layout on-disk record.
    pub fn read_struct<T>(&mut self) -> Result<T>
    where
        T: FromBytes + KnownLayout + Immutable,
    {
        let size = std::mem::size_of::<T>();
        let offset = self.pos;
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::parse(offset, "failed to decode record"))
    }
}

/// Scoped cursor save point.
///
/// Dereferences to the wrapped [`ByteReader`] so sub-reads go through it;
/// the saved position is written back on drop.
pub struct Checkpoint<'r, 'a> {
    reader: &'r mut ByteReader<'a>,
    saved: usize,
}

impl<'r, 'a> Checkpoint<'r, 'a> {
    /// Position the cursor will be restored to.
    pub fn saved_position(&self) -> usize {
        self.saved
    }
}

impl<'a> Deref for Checkpoint<'_, 'a> {
    type Target = ByteReader<'a>;

    fn deref(&self) -> &Self::Target {
        self.reader
    }
}

impl DerefMut for Checkpoint<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.reader
    }
}

impl Drop for Checkpoint<'_, '_> {
    fn drop(&mut self) {
        self.reader.pos = self.saved;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_reads() {
        let data = [0xCE, 0xFA, 0xED, 0xFE, 0x34, 0x12, 0x7F];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.read_u32().unwrap(), 0xFEEDFACE);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u8().unwrap(), 0x7F);
        assert!(r.at_end());
        assert!(matches!(r.read_u8(), Err(Error::BufferTooSmall { .. })));
    }

    #[test]
    fn test_checkpoint_restores_position() {
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut r = ByteReader::new(&data);
        r.skip(2).unwrap();
        {
            let mut cp = r.checkpoint();
            cp.seek(6).unwrap();
            assert_eq!(cp.read_u8().unwrap(), 7);
            assert_eq!(cp.saved_position(), 2);
        }
        assert_eq!(r.position(), 2);
        assert_eq!(r.read_u8().unwrap(), 3);
    }

    #[test]
    fn test_checkpoint_restores_on_error() {
        let data = [0u8; 4];
        let mut r = ByteReader::new(&data);
        r.skip(1).unwrap();

        fn failing(r: &mut ByteReader<'_>) -> Result<u32> {
            let mut cp = r.checkpoint();
            cp.seek(2)?;
            cp.read_u32()
        }

        assert!(failing(&mut r).is_err());
        assert_eq!(r.position(), 1);
    }

    #[test]
    fn test_strings() {
        let data = b"__text\0\0\0\0\0\0\0\0\0\0_foo\0tail";
        let mut r = ByteReader::new(data);
        assert_eq!(r.read_fixed_str(16).unwrap(), "__text");
        assert_eq!(r.read_cstr().unwrap(), "_foo");
        assert!(r.read_cstr().is_err());
        assert_eq!(r.position(), 21);
    }

    #[test]
    fn test_seek_bounds() {
        let data = [0u8; 4];
        let mut r = ByteReader::new(&data);
        assert!(r.seek(4).is_ok());
        assert!(r.at_end());
        assert!(r.seek(5).is_err());
    }

    #[test]
    fn test_leb_reads() {
        let data = [0xE5, 0x8E, 0x26, 0x7F];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.read_uleb128().unwrap(), 624485);
        assert_eq!(r.read_sleb128().unwrap(), -1);
        assert!(matches!(
            r.read_uleb128(),
            Err(Error::InvalidUleb128 { offset: 4 })
        ));
    }
}
