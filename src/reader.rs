//! Container parser.
//!
//! Blocks are parsed strictly in file order: the checksum and the 8-vs-12
//! byte header layout both depend on what was already read, so nothing can
//! be decoded out of order.  The read primitive is `read_exact` — "read
//! exactly N bytes, advancing by exactly N" — and any source that cannot
//! honor it surfaces as a structural truncation error.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use tracing::{debug, warn};

use crate::block::{Block, BlockHeader, BlockKind};
use crate::checksum::{BlockChecksum, Crc32};
use crate::codec::Compression;
use crate::gcode::Instruction;
use crate::header::{ChecksumKind, FileHeader};
use crate::{Error, Result};

/// Cooperative cancellation flag, checked between blocks (and between lines
/// for plain-text parsing).  Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// A fully parsed container file.
#[derive(Debug)]
pub struct BgcodeFile {
    pub name: String,
    pub header: FileHeader,
    blocks: Vec<Block>,
}

impl BgcodeFile {
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    fn first_properties(&self, kind: BlockKind) -> Option<&Block> {
        self.blocks.iter().find(|block| block.kind() == kind)
    }

    pub fn file_metadata(&self) -> Option<&Block> {
        self.first_properties(BlockKind::FileMetadata)
    }

    pub fn printer_metadata(&self) -> Option<&Block> {
        self.first_properties(BlockKind::PrinterMetadata)
    }

    pub fn print_metadata(&self) -> Option<&Block> {
        self.first_properties(BlockKind::PrintMetadata)
    }

    pub fn slicer_metadata(&self) -> Option<&Block> {
        self.first_properties(BlockKind::SlicerMetadata)
    }

    pub fn thumbnails(&self) -> impl Iterator<Item = &Block> {
        self.blocks
            .iter()
            .filter(|block| block.kind() == BlockKind::Thumbnail)
    }

    pub fn gcode_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks
            .iter()
            .filter(|block| block.kind() == BlockKind::Gcode)
    }

    /// All instructions across every G-code block, in file order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.gcode_blocks()
            .filter_map(|block| block.instructions())
            .flatten()
    }
}

/// Parse a container from a byte source.
///
/// Structural problems abort with an error and nothing is returned; checksum
/// mismatches are recorded per block and parsing continues.  Cancellation is
/// checked between blocks and discards the partial result.
pub fn parse<R: Read>(name: &str, mut input: R, cancel: &CancelToken) -> Result<BgcodeFile> {
    let header = FileHeader::read(&mut input)?;
    if !header.magic_valid() {
        warn!(magic = ?header.magic, "magic tag mismatch");
    }
    debug!(
        name,
        version = header.version,
        checksum = header.checksum_kind.name(),
        "read container header"
    );

    let mut blocks = Vec::new();
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // Leading 8 header bytes; a clean end-of-stream here is the end of
        // the container.
        let mut head = [0u8; BlockHeader::FULL_SIZE];
        if !read_or_eof(&mut input, &mut head[..BlockHeader::BASE_SIZE])? {
            break;
        }

        // The compressed-size field is only on the wire when the block is
        // actually compressed; the layout must be decided before reading on.
        let compression = Compression::from_code(LittleEndian::read_u16(&head[2..4]))?;
        let wire_size = if compression == Compression::None {
            BlockHeader::BASE_SIZE
        } else {
            input.read_exact(&mut head[BlockHeader::BASE_SIZE..])?;
            BlockHeader::FULL_SIZE
        };
        let block_header = BlockHeader::parse(&head[..wire_size])?;
        debug!(
            kind = block_header.kind.name(),
            compression = block_header.compression.name(),
            "read block header"
        );

        let mut parameters = vec![0u8; block_header.kind.parameter_size()];
        input.read_exact(&mut parameters)?;

        let mut payload = vec![0u8; block_header.payload_size()];
        input.read_exact(&mut payload)?;

        let mut block = Block::decode(block_header, &parameters, &payload)?;

        if header.checksum_kind == ChecksumKind::Crc32 {
            let expected = input.read_u32::<LittleEndian>()?;
            // The checksum covers the raw wire bytes: header as read (8 or
            // 12), parameters, and the still-compressed payload.
            let mut crc = Crc32::new();
            crc.update(&head[..wire_size]);
            crc.update(&parameters);
            crc.update(&payload);
            let computed = crc.finalize();
            if computed != expected {
                warn!(
                    kind = block.kind().name(),
                    "block checksum mismatch: computed {computed:08x}, expected {expected:08x}"
                );
            }
            block.checksum = BlockChecksum::crc32(computed, expected);
        }

        blocks.push(block);
    }

    Ok(BgcodeFile {
        name: name.to_owned(),
        header,
        blocks,
    })
}

/// Fill `buf` exactly, returning `false` on a clean end-of-stream before the
/// first byte.  A partial fill is a truncation error.
fn read_or_eof<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(false);
                }
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "truncated block header",
                )));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(true)
}
