//! Block model: wire header, type dispatch, and content decoding.
//!
//! The six block variants map to a tagged union selected by the header's
//! type code; shared fields (header, checksum) live in the common [`Block`]
//! struct rather than in the variants.

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use crate::checksum::BlockChecksum;
use crate::codec::{self, Compression};
use crate::gcode::{self, Instruction};
use crate::meatpack::Transcoder;
use crate::thumbnail::{ThumbnailFormat, ThumbnailImage};
use crate::{Error, Result};

/// Block type codes as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    FileMetadata,
    Gcode,
    SlicerMetadata,
    PrinterMetadata,
    PrintMetadata,
    Thumbnail,
}

impl BlockKind {
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            0 => Ok(BlockKind::FileMetadata),
            1 => Ok(BlockKind::Gcode),
            2 => Ok(BlockKind::SlicerMetadata),
            3 => Ok(BlockKind::PrinterMetadata),
            4 => Ok(BlockKind::PrintMetadata),
            5 => Ok(BlockKind::Thumbnail),
            _ => Err(Error::UnknownBlockKind(code)),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            BlockKind::FileMetadata => 0,
            BlockKind::Gcode => 1,
            BlockKind::SlicerMetadata => 2,
            BlockKind::PrinterMetadata => 3,
            BlockKind::PrintMetadata => 4,
            BlockKind::Thumbnail => 5,
        }
    }

    /// Human-readable name (for diagnostics only — never parsed).
    pub fn name(self) -> &'static str {
        match self {
            BlockKind::FileMetadata => "file metadata",
            BlockKind::Gcode => "gcode",
            BlockKind::SlicerMetadata => "slicer metadata",
            BlockKind::PrinterMetadata => "printer metadata",
            BlockKind::PrintMetadata => "print metadata",
            BlockKind::Thumbnail => "thumbnail",
        }
    }

    /// Size of the type-specific parameter area following the header.
    pub fn parameter_size(self) -> usize {
        match self {
            BlockKind::Thumbnail => 6,
            _ => 2,
        }
    }

    pub fn is_property_kind(self) -> bool {
        matches!(
            self,
            BlockKind::FileMetadata
                | BlockKind::SlicerMetadata
                | BlockKind::PrinterMetadata
                | BlockKind::PrintMetadata
        )
    }
}

/// Encoding of a G-code block's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcodeEncoding {
    None,
    MeatPack,
    /// MeatPack modified to keep comment lines.
    MeatPackComments,
}

impl GcodeEncoding {
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            0 => Ok(GcodeEncoding::None),
            1 => Ok(GcodeEncoding::MeatPack),
            2 => Ok(GcodeEncoding::MeatPackComments),
            _ => Err(Error::UnknownGcodeEncoding(code)),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            GcodeEncoding::None => 0,
            GcodeEncoding::MeatPack => 1,
            GcodeEncoding::MeatPackComments => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GcodeEncoding::None => "none",
            GcodeEncoding::MeatPack => "meatpack",
            GcodeEncoding::MeatPackComments => "meatpack+comments",
        }
    }
}

/// Encoding of a property block's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataEncoding {
    Ini,
}

impl MetadataEncoding {
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            0 => Ok(MetadataEncoding::Ini),
            _ => Err(Error::UnknownMetadataEncoding(code)),
        }
    }

    pub fn code(self) -> u16 {
        0
    }
}

/// Parsed block header.
///
/// On the wire the header occupies 8 bytes when compression is `None` and
/// 12 bytes otherwise: the compressed size field is simply absent for stored
/// payloads.
#[derive(Debug, Clone)]
pub struct BlockHeader {
    pub kind: BlockKind,
    pub compression: Compression,
    pub uncompressed_size: u32,
    pub compressed_size: u32,
}

impl BlockHeader {
    /// Wire size of the leading fields present in every header.
    pub const BASE_SIZE: usize = 8;
    /// Wire size when a compressed size field is present.
    pub const FULL_SIZE: usize = 12;

    /// Parse from raw wire bytes (8 or 12, per the compression code at
    /// offset 2).
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::BASE_SIZE {
            return Err(truncated_header());
        }
        let kind = BlockKind::from_code(LittleEndian::read_u16(&data[0..2]))?;
        let compression = Compression::from_code(LittleEndian::read_u16(&data[2..4]))?;
        let uncompressed_size = LittleEndian::read_u32(&data[4..8]);
        let compressed_size = if compression != Compression::None {
            if data.len() < Self::FULL_SIZE {
                return Err(truncated_header());
            }
            LittleEndian::read_u32(&data[8..12])
        } else {
            0
        };
        Ok(Self {
            kind,
            compression,
            uncompressed_size,
            compressed_size,
        })
    }

    /// Bytes this header occupies on the wire.
    pub fn wire_size(&self) -> usize {
        if self.compression == Compression::None {
            Self::BASE_SIZE
        } else {
            Self::FULL_SIZE
        }
    }

    /// Bytes of payload that follow the parameters.
    pub fn payload_size(&self) -> usize {
        if self.compression == Compression::None {
            self.uncompressed_size as usize
        } else {
            self.compressed_size as usize
        }
    }
}

/// Variant-specific decoded content.
#[derive(Debug)]
pub enum BlockContent {
    Properties {
        encoding: MetadataEncoding,
        entries: HashMap<String, String>,
    },
    Gcode {
        encoding: GcodeEncoding,
        instructions: Vec<Instruction>,
    },
    Thumbnail {
        format: ThumbnailFormat,
        width: u16,
        height: u16,
        image: ThumbnailImage,
    },
}

/// One self-describing record of the container: header, checksum verdict,
/// and decoded content.
#[derive(Debug)]
pub struct Block {
    pub header: BlockHeader,
    pub checksum: BlockChecksum,
    content: BlockContent,
}

impl Block {
    /// Decode a block from its parameter and payload bytes.  The payload is
    /// routed through the compression dispatch first, then through the
    /// type-specific content decoder.
    pub fn decode(header: BlockHeader, parameters: &[u8], payload: &[u8]) -> Result<Self> {
        if parameters.len() < header.kind.parameter_size() {
            return Err(truncated_header());
        }
        let data = codec::decompress(payload, header.compression)?;
        debug!(
            kind = header.kind.name(),
            compression = header.compression.name(),
            payload = payload.len(),
            decoded = data.len(),
            "decoded block payload"
        );

        let content = match header.kind {
            BlockKind::FileMetadata
            | BlockKind::SlicerMetadata
            | BlockKind::PrinterMetadata
            | BlockKind::PrintMetadata => {
                let encoding = MetadataEncoding::from_code(LittleEndian::read_u16(&parameters[0..2]))?;
                let text = String::from_utf8_lossy(&data);
                BlockContent::Properties {
                    encoding,
                    entries: parse_ini(&text),
                }
            }
            BlockKind::Gcode => {
                let encoding = GcodeEncoding::from_code(LittleEndian::read_u16(&parameters[0..2]))?;
                let text = match encoding {
                    GcodeEncoding::None => String::from_utf8_lossy(&data).into_owned(),
                    GcodeEncoding::MeatPack | GcodeEncoding::MeatPackComments => {
                        Transcoder::decode(&data)
                    }
                };
                BlockContent::Gcode {
                    encoding,
                    instructions: gcode::split_instructions(&text),
                }
            }
            BlockKind::Thumbnail => {
                let format = ThumbnailFormat::from_code(LittleEndian::read_u16(&parameters[0..2]))?;
                let width = LittleEndian::read_u16(&parameters[2..4]);
                let height = LittleEndian::read_u16(&parameters[4..6]);
                BlockContent::Thumbnail {
                    format,
                    width,
                    height,
                    image: ThumbnailImage::decode(format, &data)?,
                }
            }
        };

        Ok(Self {
            header,
            checksum: BlockChecksum::none(),
            content,
        })
    }

    pub fn kind(&self) -> BlockKind {
        self.header.kind
    }

    pub fn content(&self) -> &BlockContent {
        &self.content
    }

    /// Property entries, for the four metadata variants.
    pub fn properties(&self) -> Option<&HashMap<String, String>> {
        match &self.content {
            BlockContent::Properties { entries, .. } => Some(entries),
            _ => None,
        }
    }

    /// Decoded instructions, for G-code blocks.
    pub fn instructions(&self) -> Option<&[Instruction]> {
        match &self.content {
            BlockContent::Gcode { instructions, .. } => Some(instructions),
            _ => None,
        }
    }

    /// Decoded image, for thumbnail blocks.
    pub fn thumbnail(&self) -> Option<&ThumbnailImage> {
        match &self.content {
            BlockContent::Thumbnail { image, .. } => Some(image),
            _ => None,
        }
    }
}

fn truncated_header() -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "truncated block header",
    ))
}

/// Split ini-style property text into a key/value map.
///
/// Lines split on the first `=` with both sides trimmed; lines without `=`
/// or with an empty key are dropped; later duplicates win.
pub fn parse_ini(text: &str) -> HashMap<String, String> {
    let mut entries = HashMap::new();
    for line in text.split('\n') {
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if !key.is_empty() {
                entries.insert(key.to_owned(), value.trim().to_owned());
            }
        }
    }
    entries
}
