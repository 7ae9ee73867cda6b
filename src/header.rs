use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;
use tracing::trace;

use crate::{Error, Result};

/// Expected magic tag.  A mismatch is preserved as a value rather than
/// rejected here; consumers decide via [`FileHeader::magic_valid`].
pub const MAGIC: &[u8; 4] = b"GCDE";
/// Size of the fixed file header on the wire.
pub const HEADER_SIZE: usize = 10;

/// Per-block checksum algorithm declared in the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    None,
    Crc32,
}

impl ChecksumKind {
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            0 => Ok(ChecksumKind::None),
            1 => Ok(ChecksumKind::Crc32),
            _ => Err(Error::UnknownChecksumKind(code)),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            ChecksumKind::None => 0,
            ChecksumKind::Crc32 => 1,
        }
    }

    /// Human-readable name (for diagnostics only — never parsed).
    pub fn name(self) -> &'static str {
        match self {
            ChecksumKind::None => "none",
            ChecksumKind::Crc32 => "crc32",
        }
    }
}

/// The fixed 10-byte file header: magic tag, format version, checksum kind.
/// Immutable once read.
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub checksum_kind: ChecksumKind,
}

impl FileHeader {
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        let version = reader.read_u32::<LittleEndian>()?;
        let checksum_kind = ChecksumKind::from_code(reader.read_u16::<LittleEndian>()?)?;
        trace!(?magic, version, checksum = checksum_kind.name(), "read file header");
        Ok(Self {
            magic,
            version,
            checksum_kind,
        })
    }

    pub fn magic_valid(&self) -> bool {
        &self.magic == MAGIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header_bytes(magic: &[u8; 4], version: u32, checksum: u16) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(magic);
        out.extend_from_slice(&version.to_le_bytes());
        out.extend_from_slice(&checksum.to_le_bytes());
        out
    }

    #[test]
    fn reads_well_formed_header() {
        let bytes = header_bytes(MAGIC, 1, 1);
        let header = FileHeader::read(Cursor::new(bytes)).unwrap();
        assert!(header.magic_valid());
        assert_eq!(header.version, 1);
        assert_eq!(header.checksum_kind, ChecksumKind::Crc32);
    }

    #[test]
    fn magic_mismatch_is_not_fatal() {
        let bytes = header_bytes(b"NOPE", 1, 0);
        let header = FileHeader::read(Cursor::new(bytes)).unwrap();
        assert!(!header.magic_valid());
        assert_eq!(header.magic, *b"NOPE");
    }

    #[test]
    fn unknown_checksum_kind_is_fatal() {
        let bytes = header_bytes(MAGIC, 1, 7);
        assert!(matches!(
            FileHeader::read(Cursor::new(bytes)),
            Err(Error::UnknownChecksumKind(7))
        ));
    }

    #[test]
    fn truncated_header_is_fatal() {
        let bytes = header_bytes(MAGIC, 1, 0);
        assert!(matches!(
            FileHeader::read(Cursor::new(&bytes[..6])),
            Err(Error::Io(_))
        ));
    }
}
