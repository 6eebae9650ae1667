//! Load command registry and decoders.
//!
//! Every load command starts with an `(cmd, cmdsize)` pair. The parser reads
//! that pair, looks the id up with [`decoder_for`], and either decodes the
//! command into a typed [`LoadCommand`], skips it (id unknown), or fails
//! (id known but not decodable). Whatever the decoder consumed, the cursor
//! always continues at the next command boundary.

use std::fmt;

use tracing::{debug, trace, warn};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use super::constants::*;
use super::events::{Event, EventSink};
use super::structs as raw;
use super::symbol::RawSymbol;
use crate::dyld::{parse_bind_opcodes, BindRecord};
use crate::error::{Error, Result};
use crate::reader::ByteReader;
use crate::util::{fixed_str, trim_nul};
use crate::ParseOptions;

// =============================================================================
// Command Header
// =============================================================================

/// Location and identity of one load command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    /// Command id
    pub id: CommandId,
    /// Total size on disk, including the 8-byte `(cmd, cmdsize)` prefix
    pub length: u32,
    /// File offset of the command
    pub offset: usize,
}

impl CommandHeader {
    /// File offset one past the end of the command.
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.length as usize
    }
}

/// A load command whose id this crate does not recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedCommand {
    /// Raw `cmd` value
    pub cmd: u32,
    /// Total size on disk
    pub length: u32,
    /// File offset of the command
    pub offset: usize,
}

// =============================================================================
// Typed Commands
// =============================================================================

/// Section record inside a segment command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    /// Section name
    pub sectname: String,
    /// Segment name recorded in the section
    pub segname: String,
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
    /// Raw type and attribute flags
    pub flags: u32,
    /// Type from the low byte of `flags`; `None` if the value is unlisted
    pub section_type: Option<SectionType>,
    /// Attributes from the high 24 bits of `flags`
    pub attributes: SectionAttributes,
    /// Indirect symbol table index for pointer and stub sections
    pub reserved1: u32,
    /// Stub size for symbol stub sections
    pub reserved2: u32,
}

impl SectionHeader {
    fn from_raw(sect: &raw::Section32) -> Self {
        let flags = sect.flags.get();
        Self {
            sectname: fixed_str(&sect.sectname),
            segname: fixed_str(&sect.segname),
            addr: sect.addr.get(),
            size: sect.size.get(),
            offset: sect.offset.get(),
            align: sect.align.get(),
            reloff: sect.reloff.get(),
            nreloc: sect.nreloc.get(),
            flags,
            section_type: SectionType::from_raw((flags & SECTION_TYPE) as u8),
            attributes: SectionAttributes::from_bits_truncate(flags & SECTION_ATTRIBUTES),
            reserved1: sect.reserved1.get(),
            reserved2: sect.reserved2.get(),
        }
    }
}

/// `LC_SEGMENT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentCommand {
    /// Command location
    pub header: CommandHeader,
    /// Segment name (may be empty in object files)
    pub segname: String,
    /// Virtual memory address
    pub vmaddr: u32,
    /// Virtual memory size
    pub vmsize: u32,
    /// File offset of the segment contents
    pub fileoff: u32,
    /// Number of bytes mapped from the file
    pub filesize: u32,
    /// Maximum VM protection
    pub maxprot: VmProt,
    /// Initial VM protection
    pub initprot: VmProt,
    /// Number of sections
    pub nsects: u32,
    /// Segment flags
    pub flags: u32,
    /// Sections, in file order
    pub sections: Vec<SectionHeader>,
}

impl SegmentCommand {
    /// Returns true if `addr` lies in `[vmaddr, vmaddr + vmsize)`.
    #[inline]
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.vmaddr && (addr - self.vmaddr) < self.vmsize
    }
}

/// `LC_SYMTAB`, with the symbol array decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymtabCommand {
    /// Command location
    pub header: CommandHeader,
    /// File offset of the symbol array
    pub symoff: u32,
    /// Number of symbols
    pub nsyms: u32,
    /// File offset of the string table
    pub stroff: u32,
    /// Size of the string table
    pub strsize: u32,
    /// Symbols in table order, including stab entries
    pub symbols: Vec<RawSymbol>,
}

/// `LC_DYSYMTAB`, with the indirect symbol table read.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)] // Fields mirror dysymtab_command
pub struct DysymtabCommand {
    /// Command location
    pub header: CommandHeader,
    pub ilocalsym: u32,
    pub nlocalsym: u32,
    pub iextdefsym: u32,
    pub nextdefsym: u32,
    pub iundefsym: u32,
    pub nundefsym: u32,
    pub tocoff: u32,
    pub ntoc: u32,
    pub modtaboff: u32,
    pub nmodtab: u32,
    pub extrefsymoff: u32,
    pub nextrefsyms: u32,
    pub indirectsymoff: u32,
    pub nindirectsyms: u32,
    pub extreloff: u32,
    pub nextrel: u32,
    pub locreloff: u32,
    pub nlocrel: u32,
    /// Indirect symbol table: symbol table indices, possibly flagged
    /// `INDIRECT_SYMBOL_LOCAL` / `INDIRECT_SYMBOL_ABS`
    pub indirect_symbols: Vec<u32>,
}

/// Dylib-shaped commands (`LC_LOAD_DYLIB`, `LC_ID_DYLIB`, weak, re-export,
/// lazy and upward variants).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DylibCommand {
    /// Command location
    pub header: CommandHeader,
    /// Install name
    pub name: String,
    /// Build timestamp
    pub timestamp: u32,
    /// Current version, packed xxxx.yy.zz
    pub current_version: u32,
    /// Compatibility version, packed xxxx.yy.zz
    pub compatibility_version: u32,
}

/// Commands whose payload is a single string (`LC_LOAD_DYLINKER`,
/// `LC_ID_DYLINKER`, `LC_DYLD_ENVIRONMENT`, `LC_RPATH`, `LC_SUB_*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCommand {
    /// Command location
    pub header: CommandHeader,
    /// Path or name
    pub name: String,
}

/// `LC_UUID`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UuidCommand {
    /// Command location
    pub header: CommandHeader,
    /// Raw UUID bytes
    pub uuid: [u8; 16],
}

impl fmt::Display for UuidCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.uuid.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

/// ARM general purpose register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArmRegisters {
    /// r0 through r12
    pub r: [u32; 13],
    /// Stack pointer
    pub sp: u32,
    /// Link register
    pub lr: u32,
    /// Program counter
    pub pc: u32,
    /// Current program status register
    pub cpsr: u32,
}

impl ArmRegisters {
    /// Register names in on-disk order.
    pub const NAMES: [&'static str; 17] = [
        "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "sp",
        "lr", "pc", "cpsr",
    ];

    fn from_raw(state: &raw::ArmThreadState) -> Self {
        Self {
            r: state.r.map(|v| v.get()),
            sp: state.sp.get(),
            lr: state.lr.get(),
            pc: state.pc.get(),
            cpsr: state.cpsr.get(),
        }
    }

    /// Looks a register up by name.
    pub fn get(&self, name: &str) -> Option<u32> {
        let index = Self::NAMES.iter().position(|n| *n == name)?;
        self.iter().nth(index).map(|(_, v)| v)
    }

    /// Iterates `(name, value)` pairs in on-disk order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        let tail = [self.sp, self.lr, self.pc, self.cpsr];
        Self::NAMES
            .iter()
            .copied()
            .zip(self.r.iter().copied().chain(tail))
    }
}

/// `LC_UNIXTHREAD` carrying ARM thread state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnixThreadCommand {
    /// Command location
    pub header: CommandHeader,
    /// Thread state flavor
    pub flavor: u32,
    /// Thread state size in 32-bit words
    pub count: u32,
    /// Initial registers
    pub registers: ArmRegisters,
}

impl UnixThreadCommand {
    /// Initial program counter.
    #[inline]
    pub fn entry_point(&self) -> u32 {
        self.registers.pc
    }
}

/// `LC_ENCRYPTION_INFO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionInfoCommand {
    /// Command location
    pub header: CommandHeader,
    /// File offset of the encrypted range
    pub cryptoff: u32,
    /// Size of the encrypted range
    pub cryptsize: u32,
    /// Encryption system; 0 means not encrypted
    pub cryptid: u32,
}

/// Commands pointing at a blob in `__LINKEDIT` (`LC_CODE_SIGNATURE`,
/// `LC_FUNCTION_STARTS`, `LC_DATA_IN_CODE`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkeditDataCommand {
    /// Command location
    pub header: CommandHeader,
    /// File offset of the data
    pub dataoff: u32,
    /// Size of the data
    pub datasize: u32,
}

/// `LC_VERSION_MIN_*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMinCommand {
    /// Command location
    pub header: CommandHeader,
    /// Minimum OS version, packed xxxx.yy.zz
    pub version: u32,
    /// SDK version, packed xxxx.yy.zz
    pub sdk: u32,
}

impl VersionMinCommand {
    /// Minimum OS version as `major.minor.patch`.
    pub fn version_string(&self) -> String {
        packed_version(self.version)
    }

    /// SDK version as `major.minor.patch`.
    pub fn sdk_string(&self) -> String {
        packed_version(self.sdk)
    }
}

/// `LC_DYLD_INFO` / `LC_DYLD_INFO_ONLY`.
///
/// Only the three bind streams are decoded. Each is `None` when its size is
/// zero or bind decoding is disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)] // Offset/size fields mirror dyld_info_command
pub struct DyldInfoCommand {
    /// Command location
    pub header: CommandHeader,
    pub rebase_off: u32,
    pub rebase_size: u32,
    pub bind_off: u32,
    pub bind_size: u32,
    pub weak_bind_off: u32,
    pub weak_bind_size: u32,
    pub lazy_bind_off: u32,
    pub lazy_bind_size: u32,
    pub export_off: u32,
    pub export_size: u32,
    /// Decoded bind stream
    pub bind: Option<Vec<BindRecord>>,
    /// Decoded weak-bind stream
    pub weak_bind: Option<Vec<BindRecord>>,
    /// Decoded lazy-bind stream
    pub lazy_bind: Option<Vec<BindRecord>>,
}

/// `LC_MAIN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPointCommand {
    /// Command location
    pub header: CommandHeader,
    /// File offset of `main`
    pub entryoff: u64,
    /// Initial stack size, if not zero
    pub stacksize: u64,
}

/// `LC_SOURCE_VERSION`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceVersionCommand {
    /// Command location
    pub header: CommandHeader,
    /// Version packed as a24.b10.c10.d10.e10
    pub version: u64,
}

impl SourceVersionCommand {
    /// Version as `a.b.c.d.e`, dropping trailing zero components.
    pub fn version_string(&self) -> String {
        let v = self.version;
        let parts = [
            v >> 40,
            (v >> 30) & 0x3FF,
            (v >> 20) & 0x3FF,
            (v >> 10) & 0x3FF,
            v & 0x3FF,
        ];
        let len = parts
            .iter()
            .rposition(|&p| p != 0)
            .map_or(1, |i| i + 1)
            .max(2);
        parts[..len]
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Tool entry of a build version command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildTool {
    /// Tool identifier
    pub tool: u32,
    /// Tool version, packed xxxx.yy.zz
    pub version: u32,
}

/// `LC_BUILD_VERSION`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildVersionCommand {
    /// Command location
    pub header: CommandHeader,
    /// Platform identifier
    pub platform: u32,
    /// Minimum OS version, packed xxxx.yy.zz
    pub minos: u32,
    /// SDK version, packed xxxx.yy.zz
    pub sdk: u32,
    /// Tools used to build the image
    pub tools: Vec<BuildTool>,
}

/// A decoded load command.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)] // Variant names follow the payload types
pub enum LoadCommand {
    Segment(SegmentCommand),
    Symtab(SymtabCommand),
    Dysymtab(DysymtabCommand),
    Dylib(DylibCommand),
    Path(PathCommand),
    Uuid(UuidCommand),
    UnixThread(UnixThreadCommand),
    EncryptionInfo(EncryptionInfoCommand),
    LinkeditData(LinkeditDataCommand),
    VersionMin(VersionMinCommand),
    DyldInfo(DyldInfoCommand),
    Main(EntryPointCommand),
    SourceVersion(SourceVersionCommand),
    BuildVersion(BuildVersionCommand),
}

impl LoadCommand {
    /// Returns the command's location and id.
    pub fn header(&self) -> &CommandHeader {
        match self {
            LoadCommand::Segment(c) => &c.header,
            LoadCommand::Symtab(c) => &c.header,
            LoadCommand::Dysymtab(c) => &c.header,
            LoadCommand::Dylib(c) => &c.header,
            LoadCommand::Path(c) => &c.header,
            LoadCommand::Uuid(c) => &c.header,
            LoadCommand::UnixThread(c) => &c.header,
            LoadCommand::EncryptionInfo(c) => &c.header,
            LoadCommand::LinkeditData(c) => &c.header,
            LoadCommand::VersionMin(c) => &c.header,
            LoadCommand::DyldInfo(c) => &c.header,
            LoadCommand::Main(c) => &c.header,
            LoadCommand::SourceVersion(c) => &c.header,
            LoadCommand::BuildVersion(c) => &c.header,
        }
    }

    /// Returns the command id.
    #[inline]
    pub fn id(&self) -> CommandId {
        self.header().id
    }

    /// Returns the total on-disk size of the command.
    #[inline]
    pub fn length(&self) -> u32 {
        self.header().length
    }

    /// Returns true for commands naming a dependent library.
    ///
    /// `LC_ID_DYLIB` names the image itself and does not count.
    pub fn is_dylib_load(&self) -> bool {
        matches!(
            self.id(),
            CommandId::LoadDylib
                | CommandId::LoadWeakDylib
                | CommandId::ReexportDylib
                | CommandId::LazyLoadDylib
                | CommandId::LoadUpwardDylib
        )
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Signature of a command decoder.
///
/// The reader is positioned at the start of the command (its `cmd` field).
pub type DecodeFn = fn(&mut ByteReader<'_>, CommandHeader, &ParseOptions) -> Result<LoadCommand>;

/// Looks up the decoder for a known command id.
///
/// Returns `None` for ids that are documented but not supported; parsing an
/// image that contains one fails.
pub fn decoder_for(id: CommandId) -> Option<DecodeFn> {
    let decoder: DecodeFn = match id {
        CommandId::Segment => decode_segment,
        CommandId::Symtab => decode_symtab,
        CommandId::Dysymtab => decode_dysymtab,
        CommandId::LoadDylib
        | CommandId::IdDylib
        | CommandId::LoadWeakDylib
        | CommandId::ReexportDylib
        | CommandId::LazyLoadDylib
        | CommandId::LoadUpwardDylib => decode_dylib,
        CommandId::LoadDylinker
        | CommandId::IdDylinker
        | CommandId::DyldEnvironment
        | CommandId::Rpath
        | CommandId::SubFramework
        | CommandId::SubUmbrella
        | CommandId::SubClient
        | CommandId::SubLibrary => decode_path,
        CommandId::Uuid => decode_uuid,
        CommandId::UnixThread => decode_unix_thread,
        CommandId::EncryptionInfo => decode_encryption_info,
        CommandId::CodeSignature
        | CommandId::SegmentSplitInfo
        | CommandId::FunctionStarts
        | CommandId::DataInCode
        | CommandId::DylibCodeSignDrs
        | CommandId::LinkerOptimizationHint => decode_linkedit_data,
        CommandId::VersionMinMacosx
        | CommandId::VersionMinIphoneos
        | CommandId::VersionMinTvos
        | CommandId::VersionMinWatchos => decode_version_min,
        CommandId::DyldInfo | CommandId::DyldInfoOnly => decode_dyld_info,
        CommandId::Main => decode_main,
        CommandId::SourceVersion => decode_source_version,
        CommandId::BuildVersion => decode_build_version,
        CommandId::Symseg
        | CommandId::Thread
        | CommandId::LoadFvmLib
        | CommandId::IdFvmLib
        | CommandId::Ident
        | CommandId::FvmFile
        | CommandId::Prepage
        | CommandId::PreboundDylib
        | CommandId::Routines
        | CommandId::TwolevelHints
        | CommandId::PrebindCksum
        | CommandId::Segment64
        | CommandId::Routines64 => return None,
    };
    Some(decoder)
}

/// Result of walking the load command area.
#[derive(Debug, Clone, Default)]
pub struct LoadCommands {
    /// Decoded commands, in file order
    pub commands: Vec<LoadCommand>,
    /// Commands with unknown ids, in file order
    pub skipped: Vec<SkippedCommand>,
}

impl LoadCommands {
    /// Number of commands walked, decoded or skipped.
    #[inline]
    pub fn total(&self) -> usize {
        self.commands.len() + self.skipped.len()
    }
}

/// Walks `ncmds` load commands starting at the cursor.
///
/// On success the cursor sits just past the last command.
pub fn parse_load_commands(
    reader: &mut ByteReader<'_>,
    ncmds: u32,
    options: &ParseOptions,
    sink: &mut dyn EventSink,
) -> Result<LoadCommands> {
    let start = reader.position();
    let mut parsed = LoadCommands::default();

    for _ in 0..ncmds {
        let offset = reader.position();
        let prefix: raw::LoadCommandHeader = reader.read_struct()?;
        let cmd = prefix.cmd.get();
        let length = prefix.cmdsize.get();

        if (length as usize) < raw::LoadCommandHeader::SIZE {
            return Err(Error::LoadCommandTooSmall { offset, length });
        }
        let end = offset + length as usize;

        let Some(id) = CommandId::from_raw(cmd) else {
            warn!(
                "Unknown load command {:#x} ({} bytes) at {:#x}, skipping",
                cmd, length, offset
            );
            reader.seek(end)?;
            parsed.skipped.push(SkippedCommand {
                cmd,
                length,
                offset,
            });
            continue;
        };

        let decode =
            decoder_for(id).ok_or(Error::UnsupportedLoadCommand { command: id, offset })?;

        let header = CommandHeader { id, length, offset };
        trace!("{:?} at {:#x} ({} bytes)", id, offset, length);

        reader.seek(offset)?;
        let command = decode(reader, header, options)?;
        reader.seek(end)?;

        sink.publish(Event::CommandDecoded(&command));
        parsed.commands.push(command);
    }

    let consumed = reader.position() - start;
    debug!(
        "Parsed {} load commands ({} skipped, {} bytes)",
        parsed.total(),
        parsed.skipped.len(),
        consumed
    );

    Ok(parsed)
}

// =============================================================================
// Decoders
// =============================================================================

/// Reads a command's fixed record, refusing records longer than the command.
fn read_command<T>(reader: &mut ByteReader<'_>, header: CommandHeader) -> Result<T>
where
    T: FromBytes + KnownLayout + Immutable,
{
    if std::mem::size_of::<T>() > header.length as usize {
        return Err(Error::LoadCommandTooSmall {
            offset: header.offset,
            length: header.length,
        });
    }
    reader.read_struct()
}

/// Reads the string stored at `name_offset` within the command, up to the
/// command end or the first NUL.
fn read_command_string(
    reader: &mut ByteReader<'_>,
    header: CommandHeader,
    name_offset: u32,
) -> Result<String> {
    if name_offset > header.length {
        return Err(Error::parse(
            header.offset,
            format!(
                "string offset {} beyond command length {}",
                name_offset, header.length
            ),
        ));
    }
    reader.seek(header.offset + name_offset as usize)?;
    let bytes = reader.read_bytes((header.length - name_offset) as usize)?;
    Ok(String::from_utf8_lossy(trim_nul(bytes)).into_owned())
}

fn decode_segment(
    reader: &mut ByteReader<'_>,
    header: CommandHeader,
    _options: &ParseOptions,
) -> Result<LoadCommand> {
    let seg: raw::SegmentCommand32 = read_command(reader, header)?;
    let nsects = seg.nsects.get();

    let needed = raw::SegmentCommand32::SIZE as u64 + nsects as u64 * raw::Section32::SIZE as u64;
    if needed > header.length as u64 {
        return Err(Error::parse(
            header.offset,
            format!(
                "segment declares {} sections but command is only {} bytes",
                nsects, header.length
            ),
        ));
    }

    let sections = (0..nsects)
        .map(|_| {
            reader
                .read_struct::<raw::Section32>()
                .map(|s| SectionHeader::from_raw(&s))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LoadCommand::Segment(SegmentCommand {
        header,
        segname: fixed_str(&seg.segname),
        vmaddr: seg.vmaddr.get(),
        vmsize: seg.vmsize.get(),
        fileoff: seg.fileoff.get(),
        filesize: seg.filesize.get(),
        maxprot: VmProt::from_bits_truncate(seg.maxprot.get()),
        initprot: VmProt::from_bits_truncate(seg.initprot.get()),
        nsects,
        flags: seg.flags.get(),
        sections,
    }))
}

fn decode_symtab(
    reader: &mut ByteReader<'_>,
    header: CommandHeader,
    _options: &ParseOptions,
) -> Result<LoadCommand> {
    let cmd: raw::SymtabCommand = read_command(reader, header)?;
    let symoff = cmd.symoff.get();
    let nsyms = cmd.nsyms.get();
    let stroff = cmd.stroff.get();
    let strsize = cmd.strsize.get();

    let symbols = {
        let mut cp = reader.checkpoint();
        cp.seek(stroff as usize)?;
        let strtab = cp.read_bytes(strsize as usize)?;
        cp.seek(symoff as usize)?;
        (0..nsyms)
            .map(|_| RawSymbol::parse(&mut cp, strtab))
            .collect::<Result<Vec<_>>>()?
    };

    trace!("  {} symbols, {} string bytes", symbols.len(), strsize);

    Ok(LoadCommand::Symtab(SymtabCommand {
        header,
        symoff,
        nsyms,
        stroff,
        strsize,
        symbols,
    }))
}

fn decode_dysymtab(
    reader: &mut ByteReader<'_>,
    header: CommandHeader,
    _options: &ParseOptions,
) -> Result<LoadCommand> {
    let cmd: raw::DysymtabCommand = read_command(reader, header)?;
    let indirectsymoff = cmd.indirectsymoff.get();
    let nindirectsyms = cmd.nindirectsyms.get();

    let indirect_symbols = if nindirectsyms > 0 {
        let mut cp = reader.checkpoint();
        cp.seek(indirectsymoff as usize)?;
        cp.read_u32_array(nindirectsyms as usize)?
    } else {
        Vec::new()
    };

    Ok(LoadCommand::Dysymtab(DysymtabCommand {
        header,
        ilocalsym: cmd.ilocalsym.get(),
        nlocalsym: cmd.nlocalsym.get(),
        iextdefsym: cmd.iextdefsym.get(),
        nextdefsym: cmd.nextdefsym.get(),
        iundefsym: cmd.iundefsym.get(),
        nundefsym: cmd.nundefsym.get(),
        tocoff: cmd.tocoff.get(),
        ntoc: cmd.ntoc.get(),
        modtaboff: cmd.modtaboff.get(),
        nmodtab: cmd.nmodtab.get(),
        extrefsymoff: cmd.extrefsymoff.get(),
        nextrefsyms: cmd.nextrefsyms.get(),
        indirectsymoff,
        nindirectsyms,
        extreloff: cmd.extreloff.get(),
        nextrel: cmd.nextrel.get(),
        locreloff: cmd.locreloff.get(),
        nlocrel: cmd.nlocrel.get(),
        indirect_symbols,
    }))
}

fn decode_dylib(
    reader: &mut ByteReader<'_>,
    header: CommandHeader,
    _options: &ParseOptions,
) -> Result<LoadCommand> {
    let cmd: raw::DylibCommand = read_command(reader, header)?;
    let name = read_command_string(reader, header, cmd.name_offset.get())?;

    Ok(LoadCommand::Dylib(DylibCommand {
        header,
        name,
        timestamp: cmd.timestamp.get(),
        current_version: cmd.current_version.get(),
        compatibility_version: cmd.compatibility_version.get(),
    }))
}

fn decode_path(
    reader: &mut ByteReader<'_>,
    header: CommandHeader,
    _options: &ParseOptions,
) -> Result<LoadCommand> {
    let cmd: raw::PathCommand = read_command(reader, header)?;
    let name = read_command_string(reader, header, cmd.path_offset.get())?;
    Ok(LoadCommand::Path(PathCommand { header, name }))
}

fn decode_uuid(
    reader: &mut ByteReader<'_>,
    header: CommandHeader,
    _options: &ParseOptions,
) -> Result<LoadCommand> {
    let cmd: raw::UuidCommand = read_command(reader, header)?;
    Ok(LoadCommand::Uuid(UuidCommand {
        header,
        uuid: cmd.uuid,
    }))
}

fn decode_unix_thread(
    reader: &mut ByteReader<'_>,
    header: CommandHeader,
    _options: &ParseOptions,
) -> Result<LoadCommand> {
    let cmd: raw::ThreadCommand = read_command(reader, header)?;
    if raw::ThreadCommand::SIZE + raw::ArmThreadState::SIZE > header.length as usize {
        return Err(Error::LoadCommandTooSmall {
            offset: header.offset,
            length: header.length,
        });
    }
    let state: raw::ArmThreadState = reader.read_struct()?;

    Ok(LoadCommand::UnixThread(UnixThreadCommand {
        header,
        flavor: cmd.flavor.get(),
        count: cmd.count.get(),
        registers: ArmRegisters::from_raw(&state),
    }))
}

fn decode_encryption_info(
    reader: &mut ByteReader<'_>,
    header: CommandHeader,
    _options: &ParseOptions,
) -> Result<LoadCommand> {
    let cmd: raw::EncryptionInfoCommand = read_command(reader, header)?;
    Ok(LoadCommand::EncryptionInfo(EncryptionInfoCommand {
        header,
        cryptoff: cmd.cryptoff.get(),
        cryptsize: cmd.cryptsize.get(),
        cryptid: cmd.cryptid.get(),
    }))
}

fn decode_linkedit_data(
    reader: &mut ByteReader<'_>,
    header: CommandHeader,
    _options: &ParseOptions,
) -> Result<LoadCommand> {
    let cmd: raw::LinkeditDataCommand = read_command(reader, header)?;
    Ok(LoadCommand::LinkeditData(LinkeditDataCommand {
        header,
        dataoff: cmd.dataoff.get(),
        datasize: cmd.datasize.get(),
    }))
}

fn decode_version_min(
    reader: &mut ByteReader<'_>,
    header: CommandHeader,
    _options: &ParseOptions,
) -> Result<LoadCommand> {
    let cmd: raw::VersionMinCommand = read_command(reader, header)?;
    Ok(LoadCommand::VersionMin(VersionMinCommand {
        header,
        version: cmd.version.get(),
        sdk: cmd.sdk.get(),
    }))
}

fn decode_dyld_info(
    reader: &mut ByteReader<'_>,
    header: CommandHeader,
    options: &ParseOptions,
) -> Result<LoadCommand> {
    let cmd: raw::DyldInfoCommand = read_command(reader, header)?;

    let mut stream = |off: u32, size: u32| -> Result<Option<Vec<BindRecord>>> {
        if size == 0 || !options.decode_bind_info {
            return Ok(None);
        }
        let mut cp = reader.checkpoint();
        cp.seek(off as usize)?;
        let data = cp.read_bytes(size as usize)?;
        parse_bind_opcodes(data)
            .map(Some)
            .map_err(|e| stream_error_at(e, off as usize))
    };

    let bind = stream(cmd.bind_off.get(), cmd.bind_size.get())?;
    let weak_bind = stream(cmd.weak_bind_off.get(), cmd.weak_bind_size.get())?;
    let lazy_bind = stream(cmd.lazy_bind_off.get(), cmd.lazy_bind_size.get())?;

    debug!(
        "Dyld info: {} bind, {} weak bind, {} lazy bind records",
        bind.as_ref().map_or(0, Vec::len),
        weak_bind.as_ref().map_or(0, Vec::len),
        lazy_bind.as_ref().map_or(0, Vec::len)
    );

    Ok(LoadCommand::DyldInfo(DyldInfoCommand {
        header,
        rebase_off: cmd.rebase_off.get(),
        rebase_size: cmd.rebase_size.get(),
        bind_off: cmd.bind_off.get(),
        bind_size: cmd.bind_size.get(),
        weak_bind_off: cmd.weak_bind_off.get(),
        weak_bind_size: cmd.weak_bind_size.get(),
        lazy_bind_off: cmd.lazy_bind_off.get(),
        lazy_bind_size: cmd.lazy_bind_size.get(),
        export_off: cmd.export_off.get(),
        export_size: cmd.export_size.get(),
        bind,
        weak_bind,
        lazy_bind,
    }))
}

/// Converts a stream-relative bind error offset into a file offset.
fn stream_error_at(err: Error, base: usize) -> Error {
    match err {
        Error::UnknownBindOpcode { opcode, offset } => Error::UnknownBindOpcode {
            opcode,
            offset: base + offset,
        },
        Error::InvalidUleb128 { offset } => Error::InvalidUleb128 {
            offset: base + offset,
        },
        Error::InvalidSleb128 { offset } => Error::InvalidSleb128 {
            offset: base + offset,
        },
        Error::Parse { offset, reason } => Error::Parse {
            offset: base + offset,
            reason,
        },
        other => other,
    }
}

fn decode_main(
    reader: &mut ByteReader<'_>,
    header: CommandHeader,
    _options: &ParseOptions,
) -> Result<LoadCommand> {
    let cmd: raw::EntryPointCommand = read_command(reader, header)?;
    Ok(LoadCommand::Main(EntryPointCommand {
        header,
        entryoff: cmd.entryoff.get(),
        stacksize: cmd.stacksize.get(),
    }))
}

fn decode_source_version(
    reader: &mut ByteReader<'_>,
    header: CommandHeader,
    _options: &ParseOptions,
) -> Result<LoadCommand> {
    let cmd: raw::SourceVersionCommand = read_command(reader, header)?;
    Ok(LoadCommand::SourceVersion(SourceVersionCommand {
        header,
        version: cmd.version.get(),
    }))
}

fn decode_build_version(
    reader: &mut ByteReader<'_>,
    header: CommandHeader,
    _options: &ParseOptions,
) -> Result<LoadCommand> {
    let cmd: raw::BuildVersionCommand = read_command(reader, header)?;
    let ntools = cmd.ntools.get() as usize;

    if raw::BuildVersionCommand::SIZE + ntools * 8 > header.length as usize {
        return Err(Error::parse(
            header.offset,
            format!("build version declares {} tools past command end", ntools),
        ));
    }

    let tools = (0..ntools)
        .map(|_| {
            reader
                .read_struct::<raw::BuildToolVersion>()
                .map(|t| BuildTool {
                    tool: t.tool.get(),
                    version: t.version.get(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LoadCommand::BuildVersion(BuildVersionCommand {
        header,
        platform: cmd.platform.get(),
        minos: cmd.minos.get(),
        sdk: cmd.sdk.get(),
        tools,
    }))
}

/// Formats a version packed as xxxx.yy.zz.
pub fn packed_version(v: u32) -> String {
    format!("{}.{}.{}", v >> 16, (v >> 8) & 0xFF, v & 0xFF)
}
