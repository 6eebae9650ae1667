//! Mach-O image model: segments, sections, dylibs and symbols built from the
//! decoded load commands.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, info, warn};

use super::commands::*;
use super::constants::*;
use super::events::{Event, EventSink, NullSink};
use super::header::MachHeader;
use super::symbol::Symbol;
use crate::error::{Error, Result};
use crate::reader::ByteReader;
use crate::ParseOptions;

/// Name given to segments that carry no name of their own.
pub const UNNAMED_SEGMENT: &str = "*NONAME*";

// =============================================================================
// Segments and Sections
// =============================================================================

/// A materialized segment with its file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Display name
    pub name: String,
    /// Virtual memory address
    pub vmaddr: u32,
    /// Virtual memory size
    pub vmsize: u32,
    /// File offset of the contents
    pub fileoff: u32,
    /// Contents read from the file (`filesize` bytes)
    pub data: Vec<u8>,
    /// Sections in file order
    pub sections: Vec<Section>,
}

impl Segment {
    /// Returns true if `addr` lies in `[vmaddr, vmaddr + vmsize)`.
    #[inline]
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.vmaddr && (addr - self.vmaddr) < self.vmsize
    }

    /// Returns a section by name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }
}

/// A materialized section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Global 1-based index, in file order across all segments
    pub index: u32,
    /// Display name of the owning segment
    pub segment: String,
    /// Section name
    pub name: String,
    /// Virtual address
    pub addr: u32,
    /// Size in bytes
    pub size: u32,
    /// File offset
    pub offset: u32,
    /// Alignment (power of 2)
    pub align: u32,
    /// File offset of relocation entries
    pub reloff: u32,
    /// Number of relocation entries
    pub nreloc: u32,
    /// Section type
    pub section_type: Option<SectionType>,
    /// Section attributes
    pub attributes: SectionAttributes,
    /// Indirect symbol table index for pointer and stub sections
    pub reserved1: u32,
    /// Stub size for symbol stub sections
    pub reserved2: u32,
}

impl Section {
    /// Returns true if `addr` lies in `[addr, addr + size)`.
    #[inline]
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.addr && (addr - self.addr) < self.size
    }

    /// Returns the full name (segment,section).
    pub fn full_name(&self) -> String {
        format!("{},{}", self.segment, self.name)
    }

    /// Size of one indirect-table entry in this section.
    ///
    /// `None` for sections not indexed through the indirect symbol table.
    pub fn indirect_stride(&self) -> Option<u32> {
        match self.section_type? {
            SectionType::SymbolStubs => Some(self.reserved2),
            ty if ty.has_indirect_symbols() => Some(4),
            _ => None,
        }
    }

    fn new(index: u32, segment: &str, header: &SectionHeader) -> Self {
        Self {
            index,
            segment: segment.to_string(),
            name: header.sectname.clone(),
            addr: header.addr,
            size: header.size,
            offset: header.offset,
            align: header.align,
            reloff: header.reloff,
            nreloc: header.nreloc,
            section_type: header.section_type,
            attributes: header.attributes,
            reserved1: header.reserved1,
            reserved2: header.reserved2,
        }
    }
}

/// A symbol found at an address through the indirect symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSymbol<'a> {
    /// The queried address
    pub address: u32,
    /// The symbol it refers to
    pub symbol: &'a Symbol,
}

// =============================================================================
// Mach-O Context
// =============================================================================

/// A fully decoded 32-bit ARM Mach-O image.
///
/// Construction runs every pass up front: header, load commands, segments
/// and sections, the dylib table (two-level namespace images only), the
/// symbol table and the indirect symbol table. The result is read-only.
#[derive(Debug, Clone)]
pub struct MachOContext {
    /// The Mach-O header
    pub header: MachHeader,
    /// Decoded load commands, in file order
    pub commands: Vec<LoadCommand>,
    /// Load commands with unknown ids that were skipped
    pub skipped: Vec<SkippedCommand>,
    segments: Vec<Segment>,
    /// Global section index -> (segment, section) position
    section_positions: Vec<(usize, usize)>,
    dylibs: Vec<String>,
    /// Every symbol table entry, in table order
    symbols: Vec<Symbol>,
    /// Exposed name -> index into `symbols`
    named: HashMap<String, usize>,
    indirect_symbols: Vec<u32>,
}

impl MachOContext {
    /// Opens and decodes an image from disk.
    ///
    /// The file is memory-mapped for the duration of the parse; segment
    /// contents are copied out, so the mapping is released on return.
    pub fn open<P: AsRef<Path>>(path: P, options: &ParseOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = File::open(&path).map_err(|e| Error::FileOpen {
            path: path.clone(),
            source: e,
        })?;

        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MemoryMap {
            path: path.clone(),
            source: e,
        })?;

        info!("Parsing {} ({} bytes)", path.display(), mmap.len());
        Self::parse_with_options(&mmap, options)
    }

    /// Decodes an image with default options.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_with_options(data, &ParseOptions::default())
    }

    /// Decodes an image.
    pub fn parse_with_options(data: &[u8], options: &ParseOptions) -> Result<Self> {
        Self::parse_with_sink(data, options, &mut NullSink)
    }

    /// Decodes an image, publishing build events to `sink`.
    pub fn parse_with_sink(
        data: &[u8],
        options: &ParseOptions,
        sink: &mut dyn EventSink,
    ) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let header = MachHeader::parse(&mut reader)?;
        let parsed = parse_load_commands(&mut reader, header.ncmds, options, sink)?;

        let mut ctx = Self {
            header,
            commands: parsed.commands,
            skipped: parsed.skipped,
            segments: Vec::new(),
            section_positions: Vec::new(),
            dylibs: Vec::new(),
            symbols: Vec::new(),
            named: HashMap::new(),
            indirect_symbols: Vec::new(),
        };

        ctx.build_segments(&mut reader, options, sink)?;
        if header.is_two_level() {
            ctx.build_dylibs();
        }
        ctx.build_symbols(options, sink)?;
        ctx.build_indirect_symbols();

        Ok(ctx)
    }

    fn build_segments(
        &mut self,
        reader: &mut ByteReader<'_>,
        options: &ParseOptions,
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        let mut cp = reader.checkpoint();
        let mut next_index = 1u32;

        for cmd in &self.commands {
            let LoadCommand::Segment(seg) = cmd else {
                continue;
            };

            let name = if !seg.segname.is_empty() {
                seg.segname.clone()
            } else {
                match seg.sections.first() {
                    Some(first) if !first.segname.is_empty() => first.segname.clone(),
                    _ => UNNAMED_SEGMENT.to_string(),
                }
            };

            let data = if options.load_segment_data {
                cp.seek(seg.fileoff as usize)?;
                cp.read_bytes(seg.filesize as usize)?.to_vec()
            } else {
                Vec::new()
            };

            let segment_pos = self.segments.len();
            let sections: Vec<Section> = seg
                .sections
                .iter()
                .enumerate()
                .map(|(i, header)| {
                    self.section_positions.push((segment_pos, i));
                    let section = Section::new(next_index, &name, header);
                    next_index += 1;
                    section
                })
                .collect();

            let segment = Segment {
                name,
                vmaddr: seg.vmaddr,
                vmsize: seg.vmsize,
                fileoff: seg.fileoff,
                data,
                sections,
            };

            sink.publish(Event::SegmentMaterialized(&segment));
            for section in &segment.sections {
                sink.publish(Event::SectionMaterialized(section));
            }
            self.segments.push(segment);
        }

        debug!(
            "Materialized {} segments, {} sections",
            self.segments.len(),
            self.section_positions.len()
        );
        Ok(())
    }

    fn build_dylibs(&mut self) {
        self.dylibs = self
            .commands
            .iter()
            .filter(|cmd| cmd.is_dylib_load())
            .filter_map(|cmd| match cmd {
                LoadCommand::Dylib(dylib) => Some(dylib.name.clone()),
                _ => None,
            })
            .collect();

        debug!("Two-level namespace: {} dylibs", self.dylibs.len());
    }

    fn build_symbols(&mut self, options: &ParseOptions, sink: &mut dyn EventSink) -> Result<()> {
        let Some(symtab) = self.commands.iter().find_map(|cmd| match cmd {
            LoadCommand::Symtab(symtab) => Some(symtab),
            _ => None,
        }) else {
            return Ok(());
        };

        let two_level = self.header.is_two_level();
        let section_count = self.section_positions.len();
        let mut symbols = Vec::with_capacity(symtab.symbols.len());

        for raw in &symtab.symbols {
            if raw.is_stab() {
                symbols.push(raw.clone().resolve(None, None));
                continue;
            }

            let section = match raw.section_index() {
                Some(index) if (index as usize) <= section_count => Some(index as u32),
                Some(index) if options.strict_section_indices => {
                    return Err(Error::SectionIndexOutOfRange {
                        symbol: raw.name.clone(),
                        index,
                        count: section_count,
                    });
                }
                Some(index) => {
                    warn!(
                        "Symbol '{}' references section {} of {}, ignoring",
                        raw.name, index, section_count
                    );
                    None
                }
                None => None,
            };

            let library = if two_level {
                raw.desc
                    .library_ordinal()
                    .index()
                    .and_then(|n| self.dylibs.get((n as usize).checked_sub(1)?))
                    .cloned()
            } else {
                None
            };

            symbols.push(raw.clone().resolve(section, library));
        }

        for (i, symbol) in symbols.iter().enumerate() {
            if symbol.is_stab() || symbol.name.is_empty() {
                continue;
            }
            self.named.insert(symbol.name.clone(), i);
            sink.publish(Event::SymbolMaterialized(symbol));
        }

        debug!(
            "Symbol table: {} entries, {} exposed",
            symbols.len(),
            self.named.len()
        );
        self.symbols = symbols;
        Ok(())
    }

    fn build_indirect_symbols(&mut self) {
        if let Some(dysymtab) = self.commands.iter().find_map(|cmd| match cmd {
            LoadCommand::Dysymtab(dysymtab) => Some(dysymtab),
            _ => None,
        }) {
            self.indirect_symbols = dysymtab.indirect_symbols.clone();
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Number of load commands walked (decoded plus skipped).
    ///
    /// Always equals the header's `ncmds` for a successful parse.
    #[inline]
    pub fn command_count(&self) -> usize {
        self.commands.len() + self.skipped.len()
    }

    /// Returns the first decoded command with the given id.
    pub fn find_command(&self, id: CommandId) -> Option<&LoadCommand> {
        self.commands.iter().find(|cmd| cmd.id() == id)
    }

    /// Returns the first `LC_DYLD_INFO[_ONLY]` command.
    pub fn dyld_info(&self) -> Option<&DyldInfoCommand> {
        self.commands.iter().find_map(|cmd| match cmd {
            LoadCommand::DyldInfo(info) => Some(info),
            _ => None,
        })
    }

    /// Returns the entry point from `LC_UNIXTHREAD`, if present.
    pub fn entry_point(&self) -> Option<u32> {
        self.commands.iter().find_map(|cmd| match cmd {
            LoadCommand::UnixThread(thread) => Some(thread.entry_point()),
            _ => None,
        })
    }

    /// Returns all segments, in command order.
    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns a segment by name.
    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.name == name)
    }

    /// Iterates all sections in global index order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.segments.iter().flat_map(|seg| seg.sections.iter())
    }

    /// Returns the section with the given global 1-based index.
    pub fn section(&self, index: u32) -> Option<&Section> {
        let &(seg, sect) = self.section_positions.get((index as usize).checked_sub(1)?)?;
        self.segments.get(seg)?.sections.get(sect)
    }

    /// Dependent library names, in load order. Empty unless the image uses
    /// two-level namespace bindings.
    #[inline]
    pub fn dylibs(&self) -> &[String] {
        &self.dylibs
    }

    /// Every symbol table entry in table order, stabs included.
    #[inline]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Looks up an exposed symbol by name.
    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.named.get(name).map(|&i| &self.symbols[i])
    }

    /// Iterates exposed (named, non-stab) symbols in no particular order.
    pub fn named_symbols(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.named
            .iter()
            .map(|(name, &i)| (name.as_str(), &self.symbols[i]))
    }

    /// Number of exposed symbols.
    #[inline]
    pub fn named_symbol_count(&self) -> usize {
        self.named.len()
    }

    /// The indirect symbol table.
    #[inline]
    pub fn indirect_symbols(&self) -> &[u32] {
        &self.indirect_symbols
    }

    /// Resolves a stub or symbol pointer address to the symbol it refers to.
    pub fn resolve_symbol_at(&self, address: u32) -> Option<ResolvedSymbol<'_>> {
        let segment = self.segments.iter().find(|s| s.contains(address))?;
        let section = segment
            .sections
            .iter()
            .find(|s| s.contains(address) && s.indirect_stride().is_some())?;

        let stride = section.indirect_stride()?;
        if stride == 0 {
            return None;
        }
        let index = section
            .reserved1
            .checked_add((address - section.addr) / stride)? as usize;

        let entry = *self.indirect_symbols.get(index)?;
        if entry & (INDIRECT_SYMBOL_LOCAL | INDIRECT_SYMBOL_ABS) != 0 {
            return None;
        }
        let symbol = self.symbols.get(entry as usize)?;

        Some(ResolvedSymbol { address, symbol })
    }

    /// Like [`resolve_symbol_at`](Self::resolve_symbol_at), publishing an
    /// event on success.
    pub fn resolve_symbol_at_with(
        &self,
        address: u32,
        sink: &mut dyn EventSink,
    ) -> Option<ResolvedSymbol<'_>> {
        let resolved = self.resolve_symbol_at(address)?;
        sink.publish(Event::IndirectSymbolResolved {
            address,
            symbol: resolved.symbol,
        });
        Some(resolved)
    }

    /// Hands the segment list and the exposed symbol map to the caller.
    pub fn into_parts(self) -> (Vec<Segment>, HashMap<String, Symbol>) {
        let mut symbols: Vec<Option<Symbol>> = self.symbols.into_iter().map(Some).collect();
        let named = self
            .named
            .into_iter()
            .filter_map(|(name, i)| Some((name, symbols.get_mut(i)?.take()?)))
            .collect();
        (self.segments, named)
    }
}
