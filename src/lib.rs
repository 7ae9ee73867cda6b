pub mod header;
pub mod checksum;
pub mod codec;
pub mod heatshrink;
pub mod meatpack;
pub mod thumbnail;
pub mod gcode;
pub mod block;
pub mod reader;

pub use block::{Block, BlockContent, BlockHeader, BlockKind, GcodeEncoding, MetadataEncoding};
pub use checksum::{BlockChecksum, Crc32};
pub use codec::Compression;
pub use gcode::{GcodeFile, Instruction};
pub use header::{ChecksumKind, FileHeader};
pub use reader::{parse, BgcodeFile, CancelToken};
pub use thumbnail::{ThumbnailFormat, ThumbnailImage};

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type.
///
/// Structural problems (truncation, unknown codes, payloads larger than the
/// available bytes) abort the whole parse.  A checksum mismatch is
/// deliberately *not* represented here: it is recorded per block as a
/// validity flag and parsing continues.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Unknown block type code {0}")]
    UnknownBlockKind(u16),
    #[error("Unknown compression code {0}")]
    UnknownCompression(u16),
    #[error("Unknown checksum type code {0}")]
    UnknownChecksumKind(u16),
    #[error("Unknown G-code encoding code {0}")]
    UnknownGcodeEncoding(u16),
    #[error("Unknown metadata encoding code {0}")]
    UnknownMetadataEncoding(u16),
    #[error("Unknown thumbnail format code {0}")]
    UnknownThumbnailFormat(u16),
    #[error("Unsupported thumbnail format {0}")]
    UnsupportedThumbnail(&'static str),
    #[error("Window bits {0} outside [4, 15]")]
    InvalidWindowBits(u8),
    #[error("Lookahead bits {lookahead_bits} outside [3, window bits {window_bits})")]
    InvalidLookaheadBits { window_bits: u8, lookahead_bits: u8 },
    #[error("Codec buffer capacity must be non-zero")]
    ZeroBufferCapacity,
    #[error("Decompression error: {0}")]
    Decompress(String),
    #[error("Image error: {0}")]
    Image(String),
    #[error("Malformed thumbnail marker: {0}")]
    MalformedMarker(String),
    #[error("Parse cancelled")]
    Cancelled,
}
