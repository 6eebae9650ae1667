//! Symbol table entries.
//!
//! Symbols are built in two phases. The symbol table command decodes every
//! `nlist` entry into a [`RawSymbol`]; once sections and dylibs are known the
//! image builder turns each one into a [`Symbol`] carrying its resolved
//! section index and library name.

use std::fmt;

use tracing::warn;

use super::constants::*;
use super::structs::Nlist32;
use crate::error::Result;
use crate::reader::ByteReader;
use crate::util::memchr_null;

// =============================================================================
// Type Byte
// =============================================================================

/// The `n_type` byte of a symbol table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NType(pub u8);

impl NType {
    /// Returns true if this is a debugging (stab) entry.
    #[inline]
    pub fn is_stab(self) -> bool {
        (self.0 & N_STAB) != 0
    }

    /// Stab kind; `None` for ordinary symbols or unlisted stab values.
    #[inline]
    pub fn stab(self) -> Option<StabType> {
        if self.is_stab() {
            StabType::from_raw(self.0)
        } else {
            None
        }
    }

    /// Symbol kind; `None` for stab entries.
    #[inline]
    pub fn kind(self) -> Option<SymbolKind> {
        if self.is_stab() {
            None
        } else {
            SymbolKind::from_type_byte(self.0)
        }
    }

    /// Returns true if the private external bit is set.
    #[inline]
    pub fn is_private_extern(self) -> bool {
        (self.0 & N_PEXT) == N_PEXT
    }

    /// Returns true if the external bit is set.
    #[inline]
    pub fn is_extern(self) -> bool {
        (self.0 & N_EXT) == N_EXT
    }
}

// =============================================================================
// Description
// =============================================================================

/// The `n_desc` field of a symbol table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Desc(pub u16);

impl Desc {
    /// Reference type from the low nibble.
    #[inline]
    pub fn reference_type(self) -> Option<ReferenceType> {
        ReferenceType::from_desc(self.0)
    }

    /// Additional flag bits.
    #[inline]
    pub fn flags(self) -> DescFlags {
        DescFlags::from_bits_truncate(self.0)
    }

    /// Two-level namespace library ordinal from the high byte.
    #[inline]
    pub fn library_ordinal(self) -> LibraryOrdinal {
        LibraryOrdinal::from_desc(self.0)
    }
}

// =============================================================================
// Raw Symbol
// =============================================================================

/// A symbol table entry as decoded from the file, before cross-references
/// are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSymbol {
    /// Name from the string table (empty when `n_strx` is 0)
    pub name: String,
    /// Type byte
    pub n_type: NType,
    /// 1-based section index, or NO_SECT
    pub n_sect: u8,
    /// Description bitfield
    pub desc: Desc,
    /// Address or offset, depending on the type
    pub value: u32,
}

impl RawSymbol {
    /// Decodes one `nlist` entry at the cursor, taking its name from `strtab`.
    pub fn parse(reader: &mut ByteReader<'_>, strtab: &[u8]) -> Result<Self> {
        let offset = reader.position();
        let nlist: Nlist32 = reader.read_struct()?;
        let strx = nlist.n_strx.get() as usize;

        let name = if strx == 0 {
            String::new()
        } else if let Some(tail) = strtab.get(strx..) {
            String::from_utf8_lossy(&tail[..memchr_null(tail)]).into_owned()
        } else {
            warn!(
                "Symbol at {:#x} has string index {} beyond string table ({} bytes)",
                offset,
                strx,
                strtab.len()
            );
            String::new()
        };

        Ok(Self {
            name,
            n_type: NType(nlist.n_type),
            n_sect: nlist.n_sect,
            desc: Desc(nlist.n_desc.get()),
            value: nlist.n_value.get(),
        })
    }

    /// Returns true if this is a debugging (stab) entry.
    #[inline]
    pub fn is_stab(&self) -> bool {
        self.n_type.is_stab()
    }

    /// Section index to resolve, if the entry names one.
    ///
    /// Stab entries reuse `n_sect` for other purposes and never reference a
    /// section.
    #[inline]
    pub fn section_index(&self) -> Option<u8> {
        if self.is_stab() || self.n_sect == NO_SECT {
            None
        } else {
            Some(self.n_sect)
        }
    }

    /// Finishes the symbol with its resolved cross-references.
    pub fn resolve(self, section: Option<u32>, library: Option<String>) -> Symbol {
        Symbol {
            name: self.name,
            n_type: self.n_type,
            n_sect: self.n_sect,
            desc: self.desc,
            value: self.value,
            section,
            library,
        }
    }
}

// =============================================================================
// Symbol
// =============================================================================

/// A symbol with its section and library references resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Name from the string table
    pub name: String,
    /// Type byte
    pub n_type: NType,
    /// Raw section index byte
    pub n_sect: u8,
    /// Description bitfield
    pub desc: Desc,
    /// Address or offset, depending on the type
    pub value: u32,
    /// Global index of the section the symbol is defined in
    pub section: Option<u32>,
    /// Library the symbol binds to (two-level namespace images only)
    pub library: Option<String>,
}

impl Symbol {
    /// Returns true if this is a debugging (stab) entry.
    #[inline]
    pub fn is_stab(&self) -> bool {
        self.n_type.is_stab()
    }

    /// Symbol kind; `None` for stab entries.
    #[inline]
    pub fn kind(&self) -> Option<SymbolKind> {
        self.n_type.kind()
    }

    /// Returns true if this is an external symbol.
    #[inline]
    pub fn is_extern(&self) -> bool {
        self.n_type.is_extern()
    }

    /// Returns true if this is an undefined symbol.
    #[inline]
    pub fn is_undefined(&self) -> bool {
        self.kind() == Some(SymbolKind::Undefined)
    }

    /// Returns true if the symbol is a Thumb function.
    #[inline]
    pub fn is_thumb(&self) -> bool {
        self.desc.flags().contains(DescFlags::ARM_THUMB_DEF)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x} {}", self.value, self.name)?;
        if let Some(kind) = self.kind() {
            write!(f, " {:?}", kind)?;
        }
        if let Some(sect) = self.section {
            write!(f, " sect {}", sect)?;
        }
        if let Some(lib) = &self.library {
            write!(f, " ({})", lib)?;
        }
        Ok(())
    }
}
