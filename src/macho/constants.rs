//! Mach-O constants, enum tables, and flags.
//!
//! Raw-to-enum conversions are fallible: `from_raw` returns `None` for a value
//! the table does not know, and the caller decides whether that is fatal.

use bitflags::bitflags;

// =============================================================================
// Magic Numbers
// =============================================================================

/// 32-bit Mach-O magic (little-endian)
pub const MH_MAGIC: u32 = 0xFEEDFACE;

/// 32-bit Mach-O magic (big-endian, needs byte swap)
pub const MH_CIGAM: u32 = 0xCEFAEDFE;

// =============================================================================
// CPU Types
// =============================================================================

/// ARM CPU type value
pub const CPU_TYPE_ARM: u32 = 12;

/// CPU type.
///
/// Only 32-bit ARM images are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpuType {
    /// CPU_TYPE_ARM
    Arm,
}

impl CpuType {
    /// Looks up a raw `cputype` value.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            CPU_TYPE_ARM => Some(CpuType::Arm),
            _ => None,
        }
    }

    /// Returns the raw `cputype` value.
    pub fn raw(self) -> u32 {
        match self {
            CpuType::Arm => CPU_TYPE_ARM,
        }
    }

    /// Architecture name used by the analysis host.
    pub fn architecture(self) -> &'static str {
        match self {
            CpuType::Arm => "arm",
        }
    }
}

// =============================================================================
// CPU Subtypes
// =============================================================================

/// ARM CPU subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpuSubtype {
    /// CPU_SUBTYPE_ARM_ALL
    ArmAll,
    /// CPU_SUBTYPE_ARM_V4T
    ArmV4T,
    /// CPU_SUBTYPE_ARM_V6
    ArmV6,
    /// CPU_SUBTYPE_ARM_V5TEJ
    ArmV5Tej,
    /// CPU_SUBTYPE_ARM_XSCALE
    ArmXscale,
    /// CPU_SUBTYPE_ARM_V7
    ArmV7,
    /// CPU_SUBTYPE_ARM_V7F (Cortex A9)
    ArmV7F,
    /// CPU_SUBTYPE_ARM_V7S (Swift)
    ArmV7S,
    /// CPU_SUBTYPE_ARM_V7K
    ArmV7K,
    /// CPU_SUBTYPE_ARM_V8
    ArmV8,
    /// CPU_SUBTYPE_ARM_V6M
    ArmV6M,
    /// CPU_SUBTYPE_ARM_V7M
    ArmV7M,
    /// CPU_SUBTYPE_ARM_V7EM
    ArmV7Em,
}

impl CpuSubtype {
    /// Looks up a raw `cpusubtype` value within the domain of `cpu`.
    pub fn from_raw(cpu: CpuType, raw: u32) -> Option<Self> {
        match cpu {
            CpuType::Arm => match raw {
                0 => Some(CpuSubtype::ArmAll),
                5 => Some(CpuSubtype::ArmV4T),
                6 => Some(CpuSubtype::ArmV6),
                7 => Some(CpuSubtype::ArmV5Tej),
                8 => Some(CpuSubtype::ArmXscale),
                9 => Some(CpuSubtype::ArmV7),
                10 => Some(CpuSubtype::ArmV7F),
                11 => Some(CpuSubtype::ArmV7S),
                12 => Some(CpuSubtype::ArmV7K),
                13 => Some(CpuSubtype::ArmV8),
                14 => Some(CpuSubtype::ArmV6M),
                15 => Some(CpuSubtype::ArmV7M),
                16 => Some(CpuSubtype::ArmV7Em),
                _ => None,
            },
        }
    }

    /// Returns the raw `cpusubtype` value.
    pub fn raw(self) -> u32 {
        match self {
            CpuSubtype::ArmAll => 0,
            CpuSubtype::ArmV4T => 5,
            CpuSubtype::ArmV6 => 6,
            CpuSubtype::ArmV5Tej => 7,
            CpuSubtype::ArmXscale => 8,
            CpuSubtype::ArmV7 => 9,
            CpuSubtype::ArmV7F => 10,
            CpuSubtype::ArmV7S => 11,
            CpuSubtype::ArmV7K => 12,
            CpuSubtype::ArmV8 => 13,
            CpuSubtype::ArmV6M => 14,
            CpuSubtype::ArmV7M => 15,
            CpuSubtype::ArmV7Em => 16,
        }
    }

    /// Returns the conventional architecture name (e.g. "armv7").
    pub fn arch_name(self) -> &'static str {
        match self {
            CpuSubtype::ArmAll => "arm",
            CpuSubtype::ArmV4T => "armv4t",
            CpuSubtype::ArmV6 => "armv6",
            CpuSubtype::ArmV5Tej => "armv5",
            CpuSubtype::ArmXscale => "xscale",
            CpuSubtype::ArmV7 => "armv7",
            CpuSubtype::ArmV7F => "armv7f",
            CpuSubtype::ArmV7S => "armv7s",
            CpuSubtype::ArmV7K => "armv7k",
            CpuSubtype::ArmV8 => "armv8",
            CpuSubtype::ArmV6M => "armv6m",
            CpuSubtype::ArmV7M => "armv7m",
            CpuSubtype::ArmV7Em => "armv7em",
        }
    }
}

// =============================================================================
// File Types
// =============================================================================

/// Mach-O file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Relocatable object file
    Object,
    /// Demand paged executable
    Execute,
    /// Fixed VM shared library
    FvmLib,
    /// Core dump
    Core,
    /// Preloaded executable
    Preload,
    /// Dynamically bound shared library
    Dylib,
    /// Dynamic link editor
    Dylinker,
    /// Dynamically bound bundle
    Bundle,
    /// Shared library stub for static linking only
    DylibStub,
    /// Companion file with only debug sections
    Dsym,
    /// Kernel extension bundle
    KextBundle,
}

impl FileType {
    /// Looks up a raw `filetype` value.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x1 => Some(FileType::Object),
            0x2 => Some(FileType::Execute),
            0x3 => Some(FileType::FvmLib),
            0x4 => Some(FileType::Core),
            0x5 => Some(FileType::Preload),
            0x6 => Some(FileType::Dylib),
            0x7 => Some(FileType::Dylinker),
            0x8 => Some(FileType::Bundle),
            0x9 => Some(FileType::DylibStub),
            0xA => Some(FileType::Dsym),
            0xB => Some(FileType::KextBundle),
            _ => None,
        }
    }

    /// Returns the raw `filetype` value.
    pub fn raw(self) -> u32 {
        match self {
            FileType::Object => 0x1,
            FileType::Execute => 0x2,
            FileType::FvmLib => 0x3,
            FileType::Core => 0x4,
            FileType::Preload => 0x5,
            FileType::Dylib => 0x6,
            FileType::Dylinker => 0x7,
            FileType::Bundle => 0x8,
            FileType::DylibStub => 0x9,
            FileType::Dsym => 0xA,
            FileType::KextBundle => 0xB,
        }
    }
}

// =============================================================================
// Header Flags
// =============================================================================

bitflags! {
    /// Mach-O header flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MachFlags: u32 {
        /// The object file has no undefined references
        const NOUNDEFS = 0x1;
        /// The object file is the output of an incremental link
        const INCRLINK = 0x2;
        /// The object file is input for the dynamic linker
        const DYLDLINK = 0x4;
        /// The object file's undefined references are bound by the dynamic linker
        const BINDATLOAD = 0x8;
        /// The file has its dynamic undefined references prebound
        const PREBOUND = 0x10;
        /// The file has its read-only and read-write segments split
        const SPLIT_SEGS = 0x20;
        /// The shared library init routine is to be run lazily
        const LAZY_INIT = 0x40;
        /// The image is using two-level name space bindings
        const TWOLEVEL = 0x80;
        /// The executable is forcing all images to use flat name space bindings
        const FORCE_FLAT = 0x100;
        /// This umbrella guarantees no multiple definitions of symbols in its sub-images
        const NOMULTIDEFS = 0x200;
        /// Do not have dyld notify the prebinding agent about this executable
        const NOFIXPREBINDING = 0x400;
        /// The binary is not prebound but can have its prebinding redone
        const PREBINDABLE = 0x800;
        /// The binary binds to all two-level namespace modules of its dependent libraries
        const ALLMODSBOUND = 0x1000;
        /// Safe to divide up the sections into sub-sections via symbols for dead code stripping
        const SUBSECTIONS_VIA_SYMBOLS = 0x2000;
        /// The binary has been canonicalized via the unprebind operation
        const CANONICAL = 0x4000;
        /// The final linked image contains external weak symbols
        const WEAK_DEFINES = 0x8000;
        /// The final linked image uses weak symbols
        const BINDS_TO_WEAK = 0x10000;
        /// All stacks in the task will be given stack execution privilege
        const ALLOW_STACK_EXECUTION = 0x20000;
        /// The binary declares it is safe for use in processes with uid zero
        const ROOT_SAFE = 0x40000;
        /// The binary declares it is safe for use in processes when issetugid() is true
        const SETUID_SAFE = 0x80000;
        /// The static linker does not need to examine dependent dylibs for re-exports
        const NO_REEXPORTED_DYLIBS = 0x100000;
        /// The OS will load the main executable at a random address
        const PIE = 0x200000;
        /// The static linker may omit the load command if no symbols are referenced
        const DEAD_STRIPPABLE_DYLIB = 0x400000;
        /// Contains a section of type S_THREAD_LOCAL_VARIABLES
        const HAS_TLV_DESCRIPTORS = 0x800000;
        /// The OS will run the main executable with a non-executable heap
        const NO_HEAP_EXECUTION = 0x1000000;
    }
}

impl MachFlags {
    /// Names of the set flags, lowest bit first.
    pub fn names(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

// =============================================================================
// Load Commands
// =============================================================================

/// Load command requiring dynamic linker
pub const LC_REQ_DYLD: u32 = 0x8000_0000;

/// Known load command identifiers.
///
/// Knowing an id does not imply this crate can decode it; see
/// [`decoder_for`](super::decoder_for).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)] // Variants mirror the LC_* names
pub enum CommandId {
    Segment,
    Symtab,
    Symseg,
    Thread,
    UnixThread,
    LoadFvmLib,
    IdFvmLib,
    Ident,
    FvmFile,
    Prepage,
    Dysymtab,
    LoadDylib,
    IdDylib,
    LoadDylinker,
    IdDylinker,
    PreboundDylib,
    Routines,
    SubFramework,
    SubUmbrella,
    SubClient,
    SubLibrary,
    TwolevelHints,
    PrebindCksum,
    LoadWeakDylib,
    Segment64,
    Routines64,
    Uuid,
    Rpath,
    CodeSignature,
    SegmentSplitInfo,
    ReexportDylib,
    LazyLoadDylib,
    EncryptionInfo,
    DyldInfo,
    DyldInfoOnly,
    LoadUpwardDylib,
    VersionMinMacosx,
    VersionMinIphoneos,
    FunctionStarts,
    DyldEnvironment,
    Main,
    DataInCode,
    SourceVersion,
    DylibCodeSignDrs,
    LinkerOptimizationHint,
    VersionMinTvos,
    VersionMinWatchos,
    BuildVersion,
}

impl CommandId {
    /// Looks up a raw `cmd` value.
    pub fn from_raw(raw: u32) -> Option<Self> {
        let id = match raw {
            0x1 => CommandId::Segment,
            0x2 => CommandId::Symtab,
            0x3 => CommandId::Symseg,
            0x4 => CommandId::Thread,
            0x5 => CommandId::UnixThread,
            0x6 => CommandId::LoadFvmLib,
            0x7 => CommandId::IdFvmLib,
            0x8 => CommandId::Ident,
            0x9 => CommandId::FvmFile,
            0xA => CommandId::Prepage,
            0xB => CommandId::Dysymtab,
            0xC => CommandId::LoadDylib,
            0xD => CommandId::IdDylib,
            0xE => CommandId::LoadDylinker,
            0xF => CommandId::IdDylinker,
            0x10 => CommandId::PreboundDylib,
            0x11 => CommandId::Routines,
            0x12 => CommandId::SubFramework,
            0x13 => CommandId::SubUmbrella,
            0x14 => CommandId::SubClient,
            0x15 => CommandId::SubLibrary,
            0x16 => CommandId::TwolevelHints,
            0x17 => CommandId::PrebindCksum,
            0x8000_0018 => CommandId::LoadWeakDylib,
            0x19 => CommandId::Segment64,
            0x1A => CommandId::Routines64,
            0x1B => CommandId::Uuid,
            0x8000_001C => CommandId::Rpath,
            0x1D => CommandId::CodeSignature,
            0x1E => CommandId::SegmentSplitInfo,
            0x8000_001F => CommandId::ReexportDylib,
            0x20 => CommandId::LazyLoadDylib,
            0x21 => CommandId::EncryptionInfo,
            0x22 => CommandId::DyldInfo,
            0x8000_0022 => CommandId::DyldInfoOnly,
            0x8000_0023 => CommandId::LoadUpwardDylib,
            0x24 => CommandId::VersionMinMacosx,
            0x25 => CommandId::VersionMinIphoneos,
            0x26 => CommandId::FunctionStarts,
            0x27 => CommandId::DyldEnvironment,
            0x8000_0028 => CommandId::Main,
            0x29 => CommandId::DataInCode,
            0x2A => CommandId::SourceVersion,
            0x2B => CommandId::DylibCodeSignDrs,
            0x2E => CommandId::LinkerOptimizationHint,
            0x2F => CommandId::VersionMinTvos,
            0x30 => CommandId::VersionMinWatchos,
            0x32 => CommandId::BuildVersion,
            _ => return None,
        };
        Some(id)
    }

    /// Returns the raw `cmd` value.
    pub fn raw(self) -> u32 {
        match self {
            CommandId::Segment => 0x1,
            CommandId::Symtab => 0x2,
            CommandId::Symseg => 0x3,
            CommandId::Thread => 0x4,
            CommandId::UnixThread => 0x5,
            CommandId::LoadFvmLib => 0x6,
            CommandId::IdFvmLib => 0x7,
            CommandId::Ident => 0x8,
            CommandId::FvmFile => 0x9,
            CommandId::Prepage => 0xA,
            CommandId::Dysymtab => 0xB,
            CommandId::LoadDylib => 0xC,
            CommandId::IdDylib => 0xD,
            CommandId::LoadDylinker => 0xE,
            CommandId::IdDylinker => 0xF,
            CommandId::PreboundDylib => 0x10,
            CommandId::Routines => 0x11,
            CommandId::SubFramework => 0x12,
            CommandId::SubUmbrella => 0x13,
            CommandId::SubClient => 0x14,
            CommandId::SubLibrary => 0x15,
            CommandId::TwolevelHints => 0x16,
            CommandId::PrebindCksum => 0x17,
            CommandId::LoadWeakDylib => 0x18 | LC_REQ_DYLD,
            CommandId::Segment64 => 0x19,
            CommandId::Routines64 => 0x1A,
            CommandId::Uuid => 0x1B,
            CommandId::Rpath => 0x1C | LC_REQ_DYLD,
            CommandId::CodeSignature => 0x1D,
            CommandId::SegmentSplitInfo => 0x1E,
            CommandId::ReexportDylib => 0x1F | LC_REQ_DYLD,
            CommandId::LazyLoadDylib => 0x20,
            CommandId::EncryptionInfo => 0x21,
            CommandId::DyldInfo => 0x22,
            CommandId::DyldInfoOnly => 0x22 | LC_REQ_DYLD,
            CommandId::LoadUpwardDylib => 0x23 | LC_REQ_DYLD,
            CommandId::VersionMinMacosx => 0x24,
            CommandId::VersionMinIphoneos => 0x25,
            CommandId::FunctionStarts => 0x26,
            CommandId::DyldEnvironment => 0x27,
            CommandId::Main => 0x28 | LC_REQ_DYLD,
            CommandId::DataInCode => 0x29,
            CommandId::SourceVersion => 0x2A,
            CommandId::DylibCodeSignDrs => 0x2B,
            CommandId::LinkerOptimizationHint => 0x2E,
            CommandId::VersionMinTvos => 0x2F,
            CommandId::VersionMinWatchos => 0x30,
            CommandId::BuildVersion => 0x32,
        }
    }
}

// =============================================================================
// VM Protection
// =============================================================================

bitflags! {
    /// Segment memory protection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VmProt: u32 {
        /// Readable
        const READ = 0x1;
        /// Writable
        const WRITE = 0x2;
        /// Executable
        const EXECUTE = 0x4;
    }
}

// =============================================================================
// Section Types
// =============================================================================

/// Section types mask
pub const SECTION_TYPE: u32 = 0x0000_00FF;

/// Section attributes mask
pub const SECTION_ATTRIBUTES: u32 = 0xFFFF_FF00;

/// Section type (low byte of the section flags).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)] // Variants mirror the S_* names
pub enum SectionType {
    Regular,
    Zerofill,
    CstringLiterals,
    FourByteLiterals,
    EightByteLiterals,
    LiteralPointers,
    NonLazySymbolPointers,
    LazySymbolPointers,
    SymbolStubs,
    ModInitFuncPointers,
    ModTermFuncPointers,
    Coalesced,
    GbZerofill,
    Interposing,
    SixteenByteLiterals,
    DtraceDof,
    LazyDylibSymbolPointers,
    ThreadLocalRegular,
    ThreadLocalZerofill,
    ThreadLocalVariables,
    ThreadLocalVariablePointers,
    ThreadLocalInitFunctionPointers,
}

impl SectionType {
    /// Looks up the type byte of a section's flags.
    pub fn from_raw(raw: u8) -> Option<Self> {
        let ty = match raw {
            0x00 => SectionType::Regular,
            0x01 => SectionType::Zerofill,
            0x02 => SectionType::CstringLiterals,
            0x03 => SectionType::FourByteLiterals,
            0x04 => SectionType::EightByteLiterals,
            0x05 => SectionType::LiteralPointers,
            0x06 => SectionType::NonLazySymbolPointers,
            0x07 => SectionType::LazySymbolPointers,
            0x08 => SectionType::SymbolStubs,
            0x09 => SectionType::ModInitFuncPointers,
            0x0A => SectionType::ModTermFuncPointers,
            0x0B => SectionType::Coalesced,
            0x0C => SectionType::GbZerofill,
            0x0D => SectionType::Interposing,
            0x0E => SectionType::SixteenByteLiterals,
            0x0F => SectionType::DtraceDof,
            0x10 => SectionType::LazyDylibSymbolPointers,
            0x11 => SectionType::ThreadLocalRegular,
            0x12 => SectionType::ThreadLocalZerofill,
            0x13 => SectionType::ThreadLocalVariables,
            0x14 => SectionType::ThreadLocalVariablePointers,
            0x15 => SectionType::ThreadLocalInitFunctionPointers,
            _ => return None,
        };
        Some(ty)
    }

    /// Returns true if the section holds entries indexed through the
    /// indirect symbol table.
    #[inline]
    pub fn has_indirect_symbols(self) -> bool {
        matches!(
            self,
            SectionType::NonLazySymbolPointers
                | SectionType::LazySymbolPointers
                | SectionType::LazyDylibSymbolPointers
                | SectionType::ThreadLocalVariablePointers
                | SectionType::SymbolStubs
        )
    }
}

bitflags! {
    /// Section attributes (high 24 bits of the section flags).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SectionAttributes: u32 {
        /// Section contains only true machine instructions
        const PURE_INSTRUCTIONS = 0x8000_0000;
        /// Section contains coalesced symbols that are not to be in a ranlib table of contents
        const NO_TOC = 0x4000_0000;
        /// OK to strip static symbols in this section in files with MH_DYLDLINK
        const STRIP_STATIC_SYMS = 0x2000_0000;
        /// No dead stripping
        const NO_DEAD_STRIP = 0x1000_0000;
        /// Blocks are live if they reference live blocks
        const LIVE_SUPPORT = 0x0800_0000;
        /// Used with i386 code stubs written on by dyld
        const SELF_MODIFYING_CODE = 0x0400_0000;
        /// A debug section
        const DEBUG = 0x0200_0000;
        /// Section contains some machine instructions
        const SOME_INSTRUCTIONS = 0x0000_0400;
        /// Section has external relocation entries
        const EXT_RELOC = 0x0000_0200;
        /// Section has local relocation entries
        const LOC_RELOC = 0x0000_0100;
    }
}

// =============================================================================
// Symbol Types
// =============================================================================

/// If any of these bits set, a symbolic debugging entry
pub const N_STAB: u8 = 0xE0;
/// Private external symbol bit
pub const N_PEXT: u8 = 0x10;
/// Mask for the type bits
pub const N_TYPE: u8 = 0x0E;
/// External symbol bit
pub const N_EXT: u8 = 0x01;

/// Section index meaning "no section"
pub const NO_SECT: u8 = 0;

/// Symbol type (the `N_TYPE` bits of a non-stab entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// N_UNDF: undefined
    Undefined,
    /// N_ABS: absolute
    Absolute,
    /// N_SECT: defined in section `n_sect`
    Section,
    /// N_PBUD: prebound undefined
    Prebound,
    /// N_INDR: indirect
    Indirect,
}

impl SymbolKind {
    /// Looks up the `N_TYPE` bits of a type byte.
    pub fn from_type_byte(n_type: u8) -> Option<Self> {
        match n_type & N_TYPE {
            0x0 => Some(SymbolKind::Undefined),
            0x2 => Some(SymbolKind::Absolute),
            0xE => Some(SymbolKind::Section),
            0xC => Some(SymbolKind::Prebound),
            0xA => Some(SymbolKind::Indirect),
            _ => None,
        }
    }
}

/// Stab (debugging) entry type; the whole type byte selects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)] // Variants mirror the N_* stab names
pub enum StabType {
    Gsym,
    Fname,
    Fun,
    Stsym,
    Lcsym,
    Bnsym,
    Opt,
    Rsym,
    Sline,
    Ensym,
    Ssym,
    So,
    Oso,
    Lsym,
    Bincl,
    Sol,
    Params,
    Version,
    Olevel,
    Psym,
    Eincl,
    Entry,
    Lbrac,
    Excl,
    Rbrac,
    Bcomm,
    Ecomm,
    Ecoml,
    Leng,
}

impl StabType {
    /// Looks up a stab type byte.
    pub fn from_raw(raw: u8) -> Option<Self> {
        let stab = match raw {
            0x20 => StabType::Gsym,
            0x22 => StabType::Fname,
            0x24 => StabType::Fun,
            0x26 => StabType::Stsym,
            0x28 => StabType::Lcsym,
            0x2E => StabType::Bnsym,
            0x3C => StabType::Opt,
            0x40 => StabType::Rsym,
            0x44 => StabType::Sline,
            0x4E => StabType::Ensym,
            0x60 => StabType::Ssym,
            0x64 => StabType::So,
            0x66 => StabType::Oso,
            0x80 => StabType::Lsym,
            0x82 => StabType::Bincl,
            0x84 => StabType::Sol,
            0x86 => StabType::Params,
            0x88 => StabType::Version,
            0x8A => StabType::Olevel,
            0xA0 => StabType::Psym,
            0xA2 => StabType::Eincl,
            0xA4 => StabType::Entry,
            0xC0 => StabType::Lbrac,
            0xC2 => StabType::Excl,
            0xE0 => StabType::Rbrac,
            0xE2 => StabType::Bcomm,
            0xE4 => StabType::Ecomm,
            0xE8 => StabType::Ecoml,
            0xFE => StabType::Leng,
            _ => return None,
        };
        Some(stab)
    }
}

// =============================================================================
// Symbol Description
// =============================================================================

/// Mask for the reference type in `n_desc`
pub const REFERENCE_TYPE: u16 = 0x000F;

/// Reference type (low nibble of `n_desc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)] // Variants mirror the REFERENCE_FLAG_* names
pub enum ReferenceType {
    UndefinedNonLazy,
    UndefinedLazy,
    Defined,
    PrivateDefined,
    PrivateUndefinedNonLazy,
    PrivateUndefinedLazy,
}

impl ReferenceType {
    /// Looks up the reference type nibble of `n_desc`.
    pub fn from_desc(desc: u16) -> Option<Self> {
        match desc & REFERENCE_TYPE {
            0x0 => Some(ReferenceType::UndefinedNonLazy),
            0x1 => Some(ReferenceType::UndefinedLazy),
            0x2 => Some(ReferenceType::Defined),
            0x3 => Some(ReferenceType::PrivateDefined),
            0x4 => Some(ReferenceType::PrivateUndefinedNonLazy),
            0x5 => Some(ReferenceType::PrivateUndefinedLazy),
            _ => None,
        }
    }
}

bitflags! {
    /// Additional `n_desc` flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DescFlags: u16 {
        /// Symbol is a Thumb function
        const ARM_THUMB_DEF = 0x0008;
        /// Symbol is referenced dynamically and must not be stripped
        const REFERENCED_DYNAMICALLY = 0x0010;
        /// N_NO_DEAD_STRIP in object files, N_DESC_DISCARDED in linked images
        const NO_DEAD_STRIP = 0x0020;
        /// Symbol is weak referenced
        const WEAK_REF = 0x0040;
        /// Coalesced symbol is a weak definition
        const WEAK_DEF = 0x0080;
    }
}

/// Library ordinal under two-level namespace binding.
///
/// Shared by the symbol table (`n_desc` high byte) and dyld bind streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibraryOrdinal {
    /// SELF_LIBRARY_ORDINAL: the symbol lives in this image
    SelfImage,
    /// DYNAMIC_LOOKUP_ORDINAL: flat lookup at runtime
    DynamicLookup,
    /// EXECUTABLE_ORDINAL: the main executable
    Executable,
    /// BIND_SPECIAL_DYLIB_WEAK_LOOKUP: weak coalescing lookup (bind streams only)
    WeakLookup,
    /// 1-based index into the dylib load commands
    Index(u32),
}

/// SELF_LIBRARY_ORDINAL
pub const SELF_LIBRARY_ORDINAL: u8 = 0x0;
/// DYNAMIC_LOOKUP_ORDINAL
pub const DYNAMIC_LOOKUP_ORDINAL: u8 = 0xFE;
/// EXECUTABLE_ORDINAL
pub const EXECUTABLE_ORDINAL: u8 = 0xFF;

impl LibraryOrdinal {
    /// Decodes the library ordinal stored in the high byte of `n_desc`.
    pub fn from_desc(desc: u16) -> Self {
        match (desc >> 8) as u8 {
            SELF_LIBRARY_ORDINAL => LibraryOrdinal::SelfImage,
            DYNAMIC_LOOKUP_ORDINAL => LibraryOrdinal::DynamicLookup,
            EXECUTABLE_ORDINAL => LibraryOrdinal::Executable,
            n => LibraryOrdinal::Index(n as u32),
        }
    }

    /// Decodes a signed dyld bind ordinal.
    ///
    /// Zero and the negative specials name sentinels; positive values are
    /// dylib indices. Returns `None` for values dyld does not define.
    pub fn from_bind_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(LibraryOrdinal::SelfImage),
            -1 => Some(LibraryOrdinal::Executable),
            -2 => Some(LibraryOrdinal::DynamicLookup),
            -3 => Some(LibraryOrdinal::WeakLookup),
            n => u32::try_from(n).ok().map(LibraryOrdinal::Index),
        }
    }

    /// Returns the 1-based dylib index, if this ordinal names one.
    #[inline]
    pub fn index(self) -> Option<u32> {
        match self {
            LibraryOrdinal::Index(n) => Some(n),
            _ => None,
        }
    }
}

// =============================================================================
// Indirect Symbol Table
// =============================================================================

/// Symbol is local
pub const INDIRECT_SYMBOL_LOCAL: u32 = 0x8000_0000;
/// Symbol is absolute
pub const INDIRECT_SYMBOL_ABS: u32 = 0x4000_0000;
