//! Mach-O binary structures.
//!
//! These structures match the on-disk 32-bit little-endian layout. Fields use
//! zerocopy's little-endian integers so decoding does not depend on the host
//! byte order; the typed records in [`commands`](super::commands) hold the
//! converted native values.

use zerocopy::byteorder::little_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

// =============================================================================
// Header Structures
// =============================================================================

/// 32-bit Mach-O header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct MachHeader32 {
    /// Magic number (MH_MAGIC)
    pub magic: U32,
    /// CPU type
    pub cputype: U32,
    /// CPU subtype
    pub cpusubtype: U32,
    /// File type
    pub filetype: U32,
    /// Number of load commands
    pub ncmds: U32,
    /// Size of load commands
    pub sizeofcmds: U32,
    /// Flags
    pub flags: U32,
}

impl MachHeader32 {
    /// Size of the header in bytes.
    pub const SIZE: usize = 28;
}

// =============================================================================
// Load Command Header
// =============================================================================

/// Generic load command header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct LoadCommandHeader {
    /// Type of load command
    pub cmd: U32,
    /// Size of load command, including this header
    pub cmdsize: U32,
}

impl LoadCommandHeader {
    /// Size of the load command header.
    pub const SIZE: usize = 8;
}

// =============================================================================
// Segment Command
// =============================================================================

/// 32-bit segment command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct SegmentCommand32 {
    /// LC_SEGMENT
    pub cmd: U32,
    /// Size of this load command, including sections
    pub cmdsize: U32,
    /// Segment name (16 bytes, null-padded)
    pub segname: [u8; 16],
    /// Virtual memory address
    pub vmaddr: U32,
    /// Virtual memory size
    pub vmsize: U32,
    /// File offset
    pub fileoff: U32,
    /// Amount of file to map
    pub filesize: U32,
    /// Maximum VM protection
    pub maxprot: U32,
    /// Initial VM protection
    pub initprot: U32,
    /// Number of sections
    pub nsects: U32,
    /// Flags
    pub flags: U32,
}

impl SegmentCommand32 {
    /// Size of the segment command (without sections).
    pub const SIZE: usize = 56;
}

// =============================================================================
// Section
// =============================================================================

/// 32-bit section.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct Section32 {
    /// Section name (16 bytes, null-padded)
    pub sectname: [u8; 16],
    /// Segment name (16 bytes, null-padded)
    pub segname: [u8; 16],
    /// Virtual memory address
    pub addr: U32,
    /// Size in bytes
    pub size: U32,
    /// File offset
    pub offset: U32,
    /// Alignment (power of 2)
    pub align: U32,
    /// File offset of relocation entries
    pub reloff: U32,
    /// Number of relocation entries
    pub nreloc: U32,
    /// Type and attributes
    pub flags: U32,
    /// Indirect symbol index for pointer/stub sections
    pub reserved1: U32,
    /// Stub size for symbol stub sections
    pub reserved2: U32,
}

impl Section32 {
    /// Size of a section entry.
    pub const SIZE: usize = 68;
}

// =============================================================================
// Symbol Table Commands
// =============================================================================

/// Symbol table command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct SymtabCommand {
    /// LC_SYMTAB
    pub cmd: U32,
    /// Size of this load command
    pub cmdsize: U32,
    /// Symbol table offset
    pub symoff: U32,
    /// Number of symbol table entries
    pub nsyms: U32,
    /// String table offset
    pub stroff: U32,
    /// String table size in bytes
    pub strsize: U32,
}

impl SymtabCommand {
    /// Size of this command.
    pub const SIZE: usize = 24;
}

/// Dynamic symbol table command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct DysymtabCommand {
    /// LC_DYSYMTAB
    pub cmd: U32,
    /// Size of this load command
    pub cmdsize: U32,
    /// Index of local symbols
    pub ilocalsym: U32,
    /// Number of local symbols
    pub nlocalsym: U32,
    /// Index of externally defined symbols
    pub iextdefsym: U32,
    /// Number of externally defined symbols
    pub nextdefsym: U32,
    /// Index of undefined symbols
    pub iundefsym: U32,
    /// Number of undefined symbols
    pub nundefsym: U32,
    /// File offset to table of contents
    pub tocoff: U32,
    /// Number of entries in table of contents
    pub ntoc: U32,
    /// File offset to module table
    pub modtaboff: U32,
    /// Number of module table entries
    pub nmodtab: U32,
    /// Offset to referenced symbol table
    pub extrefsymoff: U32,
    /// Number of referenced symbol table entries
    pub nextrefsyms: U32,
    /// File offset to the indirect symbol table
    pub indirectsymoff: U32,
    /// Number of indirect symbol table entries
    pub nindirectsyms: U32,
    /// Offset to external relocation entries
    pub extreloff: U32,
    /// Number of external relocation entries
    pub nextrel: U32,
    /// Offset to local relocation entries
    pub locreloff: U32,
    /// Number of local relocation entries
    pub nlocrel: U32,
}

impl DysymtabCommand {
    /// Size of this command.
    pub const SIZE: usize = 80;
}

/// 32-bit symbol table entry.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct Nlist32 {
    /// Index into string table
    pub n_strx: U32,
    /// Type flag
    pub n_type: u8,
    /// Section number or NO_SECT
    pub n_sect: u8,
    /// Flags (see <mach-o/stab.h>)
    pub n_desc: U16,
    /// Value
    pub n_value: U32,
}

impl Nlist32 {
    /// Size of an nlist entry.
    pub const SIZE: usize = 12;
}

// =============================================================================
// Dyld Info Command
// =============================================================================

/// Dyld info command (compressed LINKEDIT information).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct DyldInfoCommand {
    /// LC_DYLD_INFO or LC_DYLD_INFO_ONLY
    pub cmd: U32,
    /// Size of this load command
    pub cmdsize: U32,
    /// File offset to rebase info
    pub rebase_off: U32,
    /// Size of rebase info
    pub rebase_size: U32,
    /// File offset to binding info
    pub bind_off: U32,
    /// Size of binding info
    pub bind_size: U32,
    /// File offset to weak binding info
    pub weak_bind_off: U32,
    /// Size of weak binding info
    pub weak_bind_size: U32,
    /// File offset to lazy binding info
    pub lazy_bind_off: U32,
    /// Size of lazy binding info
    pub lazy_bind_size: U32,
    /// File offset to export info
    pub export_off: U32,
    /// Size of export info
    pub export_size: U32,
}

impl DyldInfoCommand {
    /// Size of this command.
    pub const SIZE: usize = 48;
}

// =============================================================================
// Linkedit Data Command
// =============================================================================

/// Generic linkedit data command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct LinkeditDataCommand {
    /// Command type (LC_CODE_SIGNATURE, LC_FUNCTION_STARTS, etc.)
    pub cmd: U32,
    /// Size of this load command
    pub cmdsize: U32,
    /// File offset
    pub dataoff: U32,
    /// Size
    pub datasize: U32,
}

impl LinkeditDataCommand {
    /// Size of this command.
    pub const SIZE: usize = 16;
}

// =============================================================================
// Dylib Command
// =============================================================================

/// Dylib load command (shared by LC_LOAD_DYLIB, LC_ID_DYLIB, etc.).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct DylibCommand {
    /// LC_LOAD_DYLIB, LC_ID_DYLIB, etc.
    pub cmd: U32,
    /// Total size (includes path string)
    pub cmdsize: U32,
    /// Library's path name offset from the start of the command
    pub name_offset: U32,
    /// Library's build timestamp
    pub timestamp: U32,
    /// Library's current version number
    pub current_version: U32,
    /// Library's compatibility version number
    pub compatibility_version: U32,
}

impl DylibCommand {
    /// Minimum size of this command (without path string).
    pub const SIZE: usize = 24;
}

/// Command whose only payload is a path string (LC_LOAD_DYLINKER, LC_RPATH, ...).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PathCommand {
    /// Command type
    pub cmd: U32,
    /// Total size (includes path string)
    pub cmdsize: U32,
    /// Path offset from the start of the command
    pub path_offset: U32,
}

impl PathCommand {
    /// Minimum size of this command (without path string).
    pub const SIZE: usize = 12;
}

// =============================================================================
// UUID Command
// =============================================================================

/// UUID command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct UuidCommand {
    /// LC_UUID
    pub cmd: U32,
    /// Size of this load command
    pub cmdsize: U32,
    /// UUID
    pub uuid: [u8; 16],
}

impl UuidCommand {
    /// Size of this command.
    pub const SIZE: usize = 24;
}

// =============================================================================
// Thread Command
// =============================================================================

/// Thread command header; the register state follows.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct ThreadCommand {
    /// LC_UNIXTHREAD
    pub cmd: U32,
    /// Size of this load command
    pub cmdsize: U32,
    /// Thread state flavor
    pub flavor: U32,
    /// Count of u32 words in the thread state
    pub count: U32,
}

impl ThreadCommand {
    /// Size of the thread command header.
    pub const SIZE: usize = 16;
}

/// ARM thread state (`arm_thread_state_t`).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct ArmThreadState {
    /// r0 through r12
    pub r: [U32; 13],
    /// Stack pointer (r13)
    pub sp: U32,
    /// Link register (r14)
    pub lr: U32,
    /// Program counter (r15)
    pub pc: U32,
    /// Current program status register
    pub cpsr: U32,
}

impl ArmThreadState {
    /// Size of the ARM register file.
    pub const SIZE: usize = 68;
}

// =============================================================================
// Encryption Info Command
// =============================================================================

/// 32-bit encryption info command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct EncryptionInfoCommand {
    /// LC_ENCRYPTION_INFO
    pub cmd: U32,
    /// Size of this load command
    pub cmdsize: U32,
    /// File offset of encrypted range
    pub cryptoff: U32,
    /// Size of encrypted range
    pub cryptsize: U32,
    /// Encryption system ID (0 = not encrypted yet)
    pub cryptid: U32,
}

impl EncryptionInfoCommand {
    /// Size of this command.
    pub const SIZE: usize = 20;
}

// =============================================================================
// Version Commands
// =============================================================================

/// Minimum OS version command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct VersionMinCommand {
    /// LC_VERSION_MIN_*
    pub cmd: U32,
    /// Size of this load command
    pub cmdsize: U32,
    /// X.Y.Z packed as xxxx.yy.zz
    pub version: U32,
    /// X.Y.Z packed as xxxx.yy.zz
    pub sdk: U32,
}

impl VersionMinCommand {
    /// Size of this command.
    pub const SIZE: usize = 16;
}

/// Build version command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct BuildVersionCommand {
    /// LC_BUILD_VERSION
    pub cmd: U32,
    /// Size of this load command
    pub cmdsize: U32,
    /// Platform
    pub platform: U32,
    /// Minimum OS version (X.Y.Z packed into 32 bits)
    pub minos: U32,
    /// SDK version (X.Y.Z packed into 32 bits)
    pub sdk: U32,
    /// Number of tool entries following
    pub ntools: U32,
}

impl BuildVersionCommand {
    /// Size of this command (without tool entries).
    pub const SIZE: usize = 24;
}

/// Tool entry following a build version command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct BuildToolVersion {
    /// Tool identifier
    pub tool: U32,
    /// Tool version
    pub version: U32,
}

/// Entry point command (LC_MAIN).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct EntryPointCommand {
    /// LC_MAIN
    pub cmd: U32,
    /// Size of this load command
    pub cmdsize: U32,
    /// File offset of main()
    pub entryoff: U64,
    /// Initial stack size, if not zero
    pub stacksize: U64,
}

impl EntryPointCommand {
    /// Size of this command.
    pub const SIZE: usize = 24;
}

/// Source version command.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct SourceVersionCommand {
    /// LC_SOURCE_VERSION
    pub cmd: U32,
    /// Size of this load command
    pub cmdsize: U32,
    /// A.B.C.D.E packed as a24.b10.c10.d10.e10
    pub version: U64,
}

impl SourceVersionCommand {
    /// Size of this command.
    pub const SIZE: usize = 16;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_sizes_match_disk_layout() {
        assert_eq!(std::mem::size_of::<MachHeader32>(), MachHeader32::SIZE);
        assert_eq!(std::mem::size_of::<LoadCommandHeader>(), LoadCommandHeader::SIZE);
        assert_eq!(std::mem::size_of::<SegmentCommand32>(), SegmentCommand32::SIZE);
        assert_eq!(std::mem::size_of::<Section32>(), Section32::SIZE);
        assert_eq!(std::mem::size_of::<SymtabCommand>(), SymtabCommand::SIZE);
        assert_eq!(std::mem::size_of::<DysymtabCommand>(), DysymtabCommand::SIZE);
        assert_eq!(std::mem::size_of::<Nlist32>(), Nlist32::SIZE);
        assert_eq!(std::mem::size_of::<DyldInfoCommand>(), DyldInfoCommand::SIZE);
        assert_eq!(std::mem::size_of::<LinkeditDataCommand>(), LinkeditDataCommand::SIZE);
        assert_eq!(std::mem::size_of::<DylibCommand>(), DylibCommand::SIZE);
        assert_eq!(std::mem::size_of::<PathCommand>(), PathCommand::SIZE);
        assert_eq!(std::mem::size_of::<UuidCommand>(), UuidCommand::SIZE);
        assert_eq!(std::mem::size_of::<ThreadCommand>(), ThreadCommand::SIZE);
        assert_eq!(std::mem::size_of::<ArmThreadState>(), ArmThreadState::SIZE);
        assert_eq!(
            std::mem::size_of::<EncryptionInfoCommand>(),
            EncryptionInfoCommand::SIZE
        );
        assert_eq!(std::mem::size_of::<VersionMinCommand>(), VersionMinCommand::SIZE);
        assert_eq!(
            std::mem::size_of::<BuildVersionCommand>(),
            BuildVersionCommand::SIZE
        );
        assert_eq!(std::mem::size_of::<EntryPointCommand>(), EntryPointCommand::SIZE);
        assert_eq!(
            std::mem::size_of::<SourceVersionCommand>(),
            SourceVersionCommand::SIZE
        );
    }

    #[test]
    fn test_nlist_field_offsets() {
        let bytes = [
            0x04, 0x00, 0x00, 0x00, // n_strx
            0x0F, // n_type
            0x01, // n_sect
            0x08, 0x02, // n_desc
            0x00, 0x10, 0x00, 0x00, // n_value
        ];
        let nlist = Nlist32::read_from_bytes(&bytes[..]).unwrap();
        assert_eq!(nlist.n_strx.get(), 4);
        assert_eq!(nlist.n_type, 0x0F);
        assert_eq!(nlist.n_sect, 1);
        assert_eq!(nlist.n_desc.get(), 0x0208);
        assert_eq!(nlist.n_value.get(), 0x1000);
    }
}
