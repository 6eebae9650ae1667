//! Mach-O header validation and decoding.

use std::fmt;

use tracing::trace;

use super::constants::*;
use super::structs::MachHeader32;
use crate::error::{Error, Result};
use crate::reader::ByteReader;

/// Decoded 32-bit Mach-O header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachHeader {
    /// Magic number (always MH_MAGIC)
    pub magic: u32,
    /// CPU type
    pub cpu_type: CpuType,
    /// CPU subtype
    pub cpu_subtype: CpuSubtype,
    /// File type
    pub file_type: FileType,
    /// Number of load commands
    pub ncmds: u32,
    /// Total size of the load commands in bytes
    pub sizeofcmds: u32,
    /// Raw header flags
    pub flags_raw: u32,
}

impl MachHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = MachHeader32::SIZE;

    /// Checks the magic number without moving the cursor.
    pub fn validate(reader: &ByteReader<'_>) -> Result<()> {
        let available = reader.remaining();
        let bytes = reader
            .peek_bytes(4)
            .map_err(|_| Error::TooShortForMagic { available })?;
        let magic = crate::util::read_u32_le(bytes);
        match magic {
            MH_MAGIC => {}
            MH_CIGAM => return Err(Error::ByteSwappedImage),
            _ => return Err(Error::InvalidMachoMagic(magic)),
        }
        Ok(())
    }

    /// Validates and decodes the header at the cursor.
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        Self::validate(reader)?;

        let raw: MachHeader32 = reader.read_struct()?;

        let cputype = raw.cputype.get();
        let cpu_type = CpuType::from_raw(cputype).ok_or(Error::UnknownCpuType(cputype))?;

        let cpusubtype = raw.cpusubtype.get();
        let cpu_subtype = CpuSubtype::from_raw(cpu_type, cpusubtype)
            .ok_or(Error::UnknownCpuSubtype(cpusubtype))?;

        let filetype = raw.filetype.get();
        let file_type = FileType::from_raw(filetype).ok_or(Error::UnknownFileType(filetype))?;

        let header = Self {
            magic: raw.magic.get(),
            cpu_type,
            cpu_subtype,
            file_type,
            ncmds: raw.ncmds.get(),
            sizeofcmds: raw.sizeofcmds.get(),
            flags_raw: raw.flags.get(),
        };
        trace!("{}", header);

        Ok(header)
    }

    /// Returns the decoded header flags.
    ///
    /// Bits with no named flag are dropped.
    #[inline]
    pub fn flags(&self) -> MachFlags {
        MachFlags::from_bits_truncate(self.flags_raw)
    }

    /// Returns true if the image uses two-level namespace bindings.
    #[inline]
    pub fn is_two_level(&self) -> bool {
        self.flags().contains(MachFlags::TWOLEVEL)
    }

    /// Returns the architecture name used by the analysis host.
    #[inline]
    pub fn architecture(&self) -> &'static str {
        self.cpu_type.architecture()
    }
}

impl fmt::Display for MachHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MachO {{ arch: {}, type: {:?}, cmds: {}, flags: {:#x} }}",
            self.cpu_subtype.arch_name(),
            self.file_type,
            self.ncmds,
            self.flags_raw
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::header_bytes;

    #[test]
    fn test_parse_object_header() {
        let data = header_bytes(CPU_TYPE_ARM, 5, 0x1, 3, 0x1D0, 0x2000);
        let mut reader = ByteReader::new(&data);
        let header = MachHeader::parse(&mut reader).unwrap();

        assert_eq!(header.cpu_type, CpuType::Arm);
        assert_eq!(header.cpu_subtype, CpuSubtype::ArmV4T);
        assert_eq!(header.file_type, FileType::Object);
        assert_eq!(header.ncmds, 3);
        assert_eq!(header.sizeofcmds, 0x1D0);
        assert_eq!(header.flags().names(), ["SUBSECTIONS_VIA_SYMBOLS"]);
        assert!(!header.is_two_level());
        assert_eq!(header.architecture(), "arm");
        assert_eq!(reader.position(), MachHeader::SIZE);
    }

    #[test]
    fn test_parse_executable_header() {
        let data = header_bytes(CPU_TYPE_ARM, 9, 0x2, 20, 0x900, 0x0020_0085);
        let header = MachHeader::parse(&mut ByteReader::new(&data)).unwrap();

        assert_eq!(header.cpu_subtype, CpuSubtype::ArmV7);
        assert_eq!(header.file_type, FileType::Execute);
        assert_eq!(
            header.flags(),
            MachFlags::NOUNDEFS | MachFlags::DYLDLINK | MachFlags::TWOLEVEL | MachFlags::PIE
        );
        assert!(header.is_two_level());
    }

    #[test]
    fn test_rejects_short_input() {
        let data = [0xCE, 0xFA, 0xED];
        let err = MachHeader::parse(&mut ByteReader::new(&data)).unwrap_err();
        assert!(matches!(err, Error::TooShortForMagic { available: 3 }));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut data = header_bytes(CPU_TYPE_ARM, 9, 0x2, 0, 0, 0);
        data[..4].copy_from_slice(&0xFEEDFACFu32.to_le_bytes());
        let mut reader = ByteReader::new(&data);
        let err = MachHeader::parse(&mut reader).unwrap_err();
        assert!(matches!(err, Error::InvalidMachoMagic(0xFEEDFACF)));
        // Magic check is a peek
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_rejects_byte_swapped_image() {
        let mut data = header_bytes(CPU_TYPE_ARM, 9, 0x2, 0, 0, 0);
        data[..4].copy_from_slice(&MH_MAGIC.to_be_bytes());
        let err = MachHeader::parse(&mut ByteReader::new(&data)).unwrap_err();
        assert!(matches!(err, Error::ByteSwappedImage));
    }

    #[test]
    fn test_unknown_primary_enums_are_fatal() {
        let data = header_bytes(7, 3, 0x2, 0, 0, 0);
        assert!(matches!(
            MachHeader::parse(&mut ByteReader::new(&data)),
            Err(Error::UnknownCpuType(7))
        ));

        let data = header_bytes(CPU_TYPE_ARM, 99, 0x2, 0, 0, 0);
        assert!(matches!(
            MachHeader::parse(&mut ByteReader::new(&data)),
            Err(Error::UnknownCpuSubtype(99))
        ));

        let data = header_bytes(CPU_TYPE_ARM, 9, 0x42, 0, 0, 0);
        assert!(matches!(
            MachHeader::parse(&mut ByteReader::new(&data)),
            Err(Error::UnknownFileType(0x42))
        ));
    }
}
