//! In-memory Mach-O fixtures for unit tests.
//!
//! Commands are assembled from the on-disk structs so field layout always
//! matches what the decoders read. [`ImageBuilder`] places out-of-line data
//! (string tables, symbol arrays, opcode streams, segment contents) at a
//! fixed base after the load command area, so blob offsets are known before
//! the commands that reference them are written.

use zerocopy::byteorder::little_endian::{U16, U32, U64};
use zerocopy::IntoBytes;

use crate::error::Result;
use crate::macho::events::NullSink;
use crate::macho::structs::*;
use crate::macho::{parse_load_commands, LoadCommands, CPU_TYPE_ARM, MH_MAGIC};
use crate::reader::ByteReader;
use crate::ParseOptions;

/// File offset where blobs start.
pub const DATA_BASE: usize = 0x800;

fn name16(name: &str) -> [u8; 16] {
    let mut field = [0u8; 16];
    field[..name.len()].copy_from_slice(name.as_bytes());
    field
}

fn finish_command(mut bytes: Vec<u8>) -> Vec<u8> {
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    let size = bytes.len() as u32;
    bytes[4..8].copy_from_slice(&size.to_le_bytes());
    bytes
}

pub fn header_bytes(
    cputype: u32,
    cpusubtype: u32,
    filetype: u32,
    ncmds: u32,
    sizeofcmds: u32,
    flags: u32,
) -> Vec<u8> {
    MachHeader32 {
        magic: U32::new(MH_MAGIC),
        cputype: U32::new(cputype),
        cpusubtype: U32::new(cpusubtype),
        filetype: U32::new(filetype),
        ncmds: U32::new(ncmds),
        sizeofcmds: U32::new(sizeofcmds),
        flags: U32::new(flags),
    }
    .as_bytes()
    .to_vec()
}

pub fn nlist_bytes(strx: u32, n_type: u8, n_sect: u8, n_desc: u16, n_value: u32) -> Vec<u8> {
    Nlist32 {
        n_strx: U32::new(strx),
        n_type,
        n_sect,
        n_desc: U16::new(n_desc),
        n_value: U32::new(n_value),
    }
    .as_bytes()
    .to_vec()
}

#[allow(clippy::too_many_arguments)]
pub fn section(
    sectname: &str,
    segname: &str,
    addr: u32,
    size: u32,
    offset: u32,
    flags: u32,
    reserved1: u32,
    reserved2: u32,
) -> Section32 {
    Section32 {
        sectname: name16(sectname),
        segname: name16(segname),
        addr: U32::new(addr),
        size: U32::new(size),
        offset: U32::new(offset),
        align: U32::new(2),
        reloff: U32::new(0),
        nreloc: U32::new(0),
        flags: U32::new(flags),
        reserved1: U32::new(reserved1),
        reserved2: U32::new(reserved2),
    }
}

pub fn segment_command(
    segname: &str,
    vmaddr: u32,
    vmsize: u32,
    fileoff: u32,
    filesize: u32,
    sections: &[Section32],
) -> Vec<u8> {
    let cmd = SegmentCommand32 {
        cmd: U32::new(0x1),
        cmdsize: U32::new(0),
        segname: name16(segname),
        vmaddr: U32::new(vmaddr),
        vmsize: U32::new(vmsize),
        fileoff: U32::new(fileoff),
        filesize: U32::new(filesize),
        maxprot: U32::new(7),
        initprot: U32::new(5),
        nsects: U32::new(sections.len() as u32),
        flags: U32::new(0),
    };
    let mut bytes = cmd.as_bytes().to_vec();
    for sect in sections {
        bytes.extend_from_slice(sect.as_bytes());
    }
    finish_command(bytes)
}

pub fn symtab_command(symoff: u32, nsyms: u32, stroff: u32, strsize: u32) -> Vec<u8> {
    let cmd = SymtabCommand {
        cmd: U32::new(0x2),
        cmdsize: U32::new(0),
        symoff: U32::new(symoff),
        nsyms: U32::new(nsyms),
        stroff: U32::new(stroff),
        strsize: U32::new(strsize),
    };
    finish_command(cmd.as_bytes().to_vec())
}

pub fn dysymtab_command(indirectsymoff: u32, nindirectsyms: u32) -> Vec<u8> {
    let zero = U32::new(0);
    let cmd = DysymtabCommand {
        cmd: U32::new(0xB),
        cmdsize: zero,
        ilocalsym: zero,
        nlocalsym: zero,
        iextdefsym: zero,
        nextdefsym: zero,
        iundefsym: zero,
        nundefsym: zero,
        tocoff: zero,
        ntoc: zero,
        modtaboff: zero,
        nmodtab: zero,
        extrefsymoff: zero,
        nextrefsyms: zero,
        indirectsymoff: U32::new(indirectsymoff),
        nindirectsyms: U32::new(nindirectsyms),
        extreloff: zero,
        nextrel: zero,
        locreloff: zero,
        nlocrel: zero,
    };
    finish_command(cmd.as_bytes().to_vec())
}

pub fn dylib_command(cmd: u32, name: &str, current_version: u32) -> Vec<u8> {
    let fixed = DylibCommand {
        cmd: U32::new(cmd),
        cmdsize: U32::new(0),
        name_offset: U32::new(DylibCommand::SIZE as u32),
        timestamp: U32::new(2),
        current_version: U32::new(current_version),
        compatibility_version: U32::new(0x10000),
    };
    let mut bytes = fixed.as_bytes().to_vec();
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(0);
    finish_command(bytes)
}

pub fn path_command(cmd: u32, path: &str) -> Vec<u8> {
    let fixed = PathCommand {
        cmd: U32::new(cmd),
        cmdsize: U32::new(0),
        path_offset: U32::new(PathCommand::SIZE as u32),
    };
    let mut bytes = fixed.as_bytes().to_vec();
    bytes.extend_from_slice(path.as_bytes());
    bytes.push(0);
    finish_command(bytes)
}

pub fn uuid_command(uuid: [u8; 16]) -> Vec<u8> {
    let cmd = UuidCommand {
        cmd: U32::new(0x1B),
        cmdsize: U32::new(0),
        uuid,
    };
    finish_command(cmd.as_bytes().to_vec())
}

/// ARM thread state with `rN = N`.
pub fn unix_thread_command(pc: u32, cpsr: u32) -> Vec<u8> {
    let cmd = ThreadCommand {
        cmd: U32::new(0x5),
        cmdsize: U32::new(0),
        flavor: U32::new(1),
        count: U32::new(17),
    };
    let state = ArmThreadState {
        r: std::array::from_fn(|i| U32::new(i as u32)),
        sp: U32::new(0),
        lr: U32::new(0),
        pc: U32::new(pc),
        cpsr: U32::new(cpsr),
    };
    let mut bytes = cmd.as_bytes().to_vec();
    bytes.extend_from_slice(state.as_bytes());
    finish_command(bytes)
}

pub fn encryption_info_command(cryptoff: u32, cryptsize: u32, cryptid: u32) -> Vec<u8> {
    let cmd = EncryptionInfoCommand {
        cmd: U32::new(0x21),
        cmdsize: U32::new(0),
        cryptoff: U32::new(cryptoff),
        cryptsize: U32::new(cryptsize),
        cryptid: U32::new(cryptid),
    };
    finish_command(cmd.as_bytes().to_vec())
}

pub fn linkedit_data_command(cmd: u32, dataoff: u32, datasize: u32) -> Vec<u8> {
    let cmd = LinkeditDataCommand {
        cmd: U32::new(cmd),
        cmdsize: U32::new(0),
        dataoff: U32::new(dataoff),
        datasize: U32::new(datasize),
    };
    finish_command(cmd.as_bytes().to_vec())
}

pub fn version_min_command(cmd: u32, version: u32, sdk: u32) -> Vec<u8> {
    let cmd = VersionMinCommand {
        cmd: U32::new(cmd),
        cmdsize: U32::new(0),
        version: U32::new(version),
        sdk: U32::new(sdk),
    };
    finish_command(cmd.as_bytes().to_vec())
}

pub fn main_command(entryoff: u64) -> Vec<u8> {
    let cmd = EntryPointCommand {
        cmd: U32::new(0x8000_0028),
        cmdsize: U32::new(0),
        entryoff: U64::new(entryoff),
        stacksize: U64::new(0),
    };
    finish_command(cmd.as_bytes().to_vec())
}

/// `LC_DYLD_INFO_ONLY` with the given `(offset, size)` bind streams.
pub fn dyld_info_command(bind: (u32, u32), weak_bind: (u32, u32), lazy_bind: (u32, u32)) -> Vec<u8> {
    let zero = U32::new(0);
    let cmd = DyldInfoCommand {
        cmd: U32::new(0x8000_0022),
        cmdsize: zero,
        rebase_off: zero,
        rebase_size: zero,
        bind_off: U32::new(bind.0),
        bind_size: U32::new(bind.1),
        weak_bind_off: U32::new(weak_bind.0),
        weak_bind_size: U32::new(weak_bind.1),
        lazy_bind_off: U32::new(lazy_bind.0),
        lazy_bind_size: U32::new(lazy_bind.1),
        export_off: zero,
        export_size: zero,
    };
    finish_command(cmd.as_bytes().to_vec())
}

/// Arbitrary command id with an opaque payload.
pub fn raw_command(cmd: u32, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8 + payload.len());
    bytes.extend_from_slice(&cmd.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(payload);
    finish_command(bytes)
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Assembles a complete image: header, load commands, then blobs from
/// [`DATA_BASE`].
pub struct ImageBuilder {
    cpusubtype: u32,
    filetype: u32,
    flags: u32,
    commands: Vec<Vec<u8>>,
    blobs: Vec<u8>,
}

impl ImageBuilder {
    /// ARMv7 executable with no flags.
    pub fn new() -> Self {
        Self {
            cpusubtype: 9,
            filetype: 0x2,
            flags: 0,
            commands: Vec::new(),
            blobs: Vec::new(),
        }
    }

    pub fn cpu_subtype(&mut self, cpusubtype: u32) -> &mut Self {

        self.cpusubtype = cpusubtype;
        self
    }

    pub fn file_type(&mut self, filetype: u32) -> &mut Self {
        self.filetype = filetype;
        self
    }

    pub fn flags(&mut self, flags: u32) -> &mut Self {
        self.flags = flags;
        self
    }

    /// Appends out-of-line data and returns its file offset.
    pub fn blob(&mut self, bytes: &[u8]) -> u32 {
        let offset = DATA_BASE + self.blobs.len();
        self.blobs.extend_from_slice(bytes);
        while self.blobs.len() % 4 != 0 {
            self.blobs.push(0);
        }
        offset as u32
    }

    pub fn command(&mut self, bytes: Vec<u8>) -> &mut Self {
        self.commands.push(bytes);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let sizeofcmds: usize = self.commands.iter().map(Vec::len).sum();
        let mut data = header_bytes(
            CPU_TYPE_ARM,
            self.cpusubtype,
            self.filetype,
            self.commands.len() as u32,
            sizeofcmds as u32,
            self.flags,
        );
        for cmd in &self.commands {
            data.extend_from_slice(cmd);
        }
        assert!(data.len() <= DATA_BASE, "load commands overlap blob area");
        data.resize(DATA_BASE, 0);
        data.extend_from_slice(&self.blobs);
        data
    }

    /// Builds the image and walks its load commands.
    pub fn parse_commands(&self) -> Result<LoadCommands> {
        self.parse_commands_with(&ParseOptions::default())
    }

    pub fn parse_commands_with(&self, options: &ParseOptions) -> Result<LoadCommands> {
        let data = self.build();
        let mut reader = ByteReader::new(&data);
        reader.seek(MachHeader32::SIZE)?;
        parse_load_commands(&mut reader, self.commands.len() as u32, options, &mut NullSink)
    }
}
