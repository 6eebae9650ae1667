//! armacho - A decoder for 32-bit ARM Mach-O images.
//!
//! This library reads Mach-O executables, dylibs and object files built for
//! 32-bit ARM and produces a read-only model of the image: header, load
//! commands, segments with their contents, sections, dependent libraries and
//! symbols. Indirect symbol tables are used to resolve stub and pointer
//! addresses back to the symbols they refer to.
//!
//! # Features
//!
//! - Memory-mapped file input
//! - Zero-copy decoding of on-disk structures
//! - Dyld bind, weak-bind and lazy-bind opcode interpretation
//! - Two-level namespace library resolution
//! - Optional build events for hosts that observe the parse
//!
//! # Example
//!
//! ```no_run
//! fn main() -> armacho::Result<()> {
//!     let image = armacho::open("/path/to/binary")?;
//!
//!     for segment in image.segments() {
//!         println!("{} @ {:#x}", segment.name, segment.vmaddr);
//!     }
//!
//!     if let Some(hit) = image.resolve_symbol_at(0x3f48) {
//!         println!("{:#x} -> {}", hit.address, hit.symbol.name);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dyld;
pub mod error;
pub mod macho;
pub mod reader;
pub mod util;

#[cfg(test)]
mod testutil;

// Re-export main types
pub use error::{Error, Result};
pub use macho::{MachHeader, MachOContext, Section, Segment, Symbol};

use std::path::Path;

/// Options controlling how much of an image is decoded.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Interpret the bind opcode streams of `LC_DYLD_INFO[_ONLY]`
    pub decode_bind_info: bool,
    /// Copy segment file contents into the model
    pub load_segment_data: bool,
    /// Fail on symbols whose section index exceeds the section count
    /// instead of dropping the section reference
    pub strict_section_indices: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            decode_bind_info: true,
            load_segment_data: true,
            strict_section_indices: false,
        }
    }
}

impl ParseOptions {
    /// Sets whether bind opcode streams are interpreted.
    pub fn with_bind_info(mut self, enabled: bool) -> Self {
        self.decode_bind_info = enabled;
        self
    }

    /// Sets whether segment contents are loaded.
    pub fn with_segment_data(mut self, enabled: bool) -> Self {
        self.load_segment_data = enabled;
        self
    }

    /// Sets whether out-of-range section indices are fatal.
    pub fn with_strict_section_indices(mut self, enabled: bool) -> Self {
        self.strict_section_indices = enabled;
        self
    }
}

/// Decodes an image from a byte buffer.
///
/// # Returns
///
/// Returns the decoded image, or the first error encountered. Nothing is
/// returned for a partially decoded image.
pub fn parse(data: &[u8]) -> Result<MachOContext> {
    MachOContext::parse(data)
}

/// Decodes an image from a byte buffer with custom options.
pub fn parse_with_options(data: &[u8], options: &ParseOptions) -> Result<MachOContext> {
    MachOContext::parse_with_options(data, options)
}

/// Opens and decodes an image from disk.
pub fn open<P: AsRef<Path>>(path: P) -> Result<MachOContext> {
    MachOContext::open(path, &ParseOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn test_default_options() {
        let options = ParseOptions::default();
        assert!(options.decode_bind_info);
        assert!(options.load_segment_data);
        assert!(!options.strict_section_indices);

        let options = options
            .with_bind_info(false)
            .with_segment_data(false)
            .with_strict_section_indices(true);
        assert!(!options.decode_bind_info);
        assert!(!options.load_segment_data);
        assert!(options.strict_section_indices);
    }

    #[test]
    fn test_parse_minimal_image() {
        let data = ImageBuilder::new().build();
        let image = parse(&data).unwrap();
        assert_eq!(image.header.ncmds, 0);
        assert!(image.segments().is_empty());
        assert!(image.symbols().is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse(&[0x7F, b'E', b'L', b'F', 1, 1, 1, 0]),
            Err(Error::InvalidMachoMagic(_))
        ));
        assert!(matches!(
            parse(&[0xCE, 0xFA]),
            Err(Error::TooShortForMagic { available: 2 })
        ));
    }
}
