//! Error types for Mach-O decoding.
//!
//! Every failure in this crate is fatal for the parse that raised it: the
//! input is a fixed byte buffer, so nothing here is transient or retried.
//! The one recoverable condition (an unrecognized load command) is logged
//! and skipped by the command parser and never surfaces as an `Error`.

use std::path::PathBuf;

use thiserror::Error;

use crate::macho::CommandId;

/// The main error type for Mach-O decoding operations.
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open file '{path}': {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to memory map file '{path}': {source}")]
    MemoryMap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ==================== Header Errors ====================
    #[error("not a Mach-O image: {available} bytes is too short for a magic number")]
    TooShortForMagic { available: usize },

    #[error("invalid Mach-O magic: {0:#x}")]
    InvalidMachoMagic(u32),

    #[error("byte-swapped Mach-O image: big-endian images are not supported")]
    ByteSwappedImage,

    #[error("unknown CPU type: {0:#x}")]
    UnknownCpuType(u32),

    #[error("unknown CPU subtype: {0:#x}")]
    UnknownCpuSubtype(u32),

    #[error("unknown Mach-O file type: {0:#x}")]
    UnknownFileType(u32),

    // ==================== Load Command Errors ====================
    #[error("unsupported load command {command:?} at offset {offset:#x}")]
    UnsupportedLoadCommand { command: CommandId, offset: usize },

    #[error("load command at offset {offset:#x} declares length {length}, smaller than its header")]
    LoadCommandTooSmall { offset: usize, length: u32 },

    // ==================== Symbol Errors ====================
    #[error("symbol '{symbol}' references section {index}, but only {count} sections exist")]
    SectionIndexOutOfRange {
        symbol: String,
        index: u8,
        count: usize,
    },

    // ==================== Bind Stream Errors ====================
    #[error("unknown bind opcode {opcode:#04x} at offset {offset:#x}")]
    UnknownBindOpcode { opcode: u8, offset: usize },

    #[error("invalid ULEB128 at offset {offset:#x}")]
    InvalidUleb128 { offset: usize },

    #[error("invalid SLEB128 at offset {offset:#x}")]
    InvalidSleb128 { offset: usize },

    // ==================== Parse Errors ====================
    #[error("parse error at offset {offset:#x}: {reason}")]
    Parse { offset: usize, reason: String },

    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

/// A specialized Result type for Mach-O decoding.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns true if this error came from a malformed bind opcode stream.
    ///
    /// Bind streams are decoded inside the dyld info command; hosts that only
    /// need segments and symbols can retry with bind decoding disabled.
    #[inline]
    pub fn is_bind_stream_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownBindOpcode { .. }
                | Error::InvalidUleb128 { .. }
                | Error::InvalidSleb128 { .. }
        )
    }

    /// Creates a parse error with a formatted message.
    #[inline]
    pub fn parse(offset: usize, reason: impl Into<String>) -> Self {
        Error::Parse {
            offset,
            reason: reason.into(),
        }
    }

    /// Creates a buffer too small error.
    #[inline]
    pub fn buffer_too_small(needed: usize, available: usize) -> Self {
        Error::BufferTooSmall { needed, available }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::UnknownBindOpcode {
            opcode: 0xD0,
            offset: 0x12,
        };
        assert_eq!(err.to_string(), "unknown bind opcode 0xd0 at offset 0x12");

        let err = Error::buffer_too_small(16, 4);
        assert_eq!(err.to_string(), "buffer too small: need 16 bytes, have 4");
    }

    #[test]
    fn test_bind_stream_classification() {
        assert!(Error::InvalidUleb128 { offset: 0 }.is_bind_stream_error());
        assert!(!Error::InvalidMachoMagic(0).is_bind_stream_error());
    }
}
