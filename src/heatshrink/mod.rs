//! Streaming LZSS codec (heatshrink wire format).
//!
//! Both halves expose the same cooperative protocol: [`sink`] pushes input
//! into a bounded buffer, [`poll`] pulls whatever output is currently
//! producible, and [`finish`] flags end-of-stream and reports whether
//! buffered state remains.  Nothing blocks and nothing allocates beyond the
//! fixed buffers chosen at construction, so the caller's loop is the
//! scheduler regardless of stream size.
//!
//! Token model: a set tag bit introduces a literal (8 bits); a clear tag bit
//! introduces a backreference of `window_bits` offset bits (offset − 1) and
//! `lookahead_bits` length bits (length − 1), all packed MSB-first with no
//! byte alignment between tokens.
//!
//! [`sink`]: Encoder::sink
//! [`poll`]: Encoder::poll
//! [`finish`]: Encoder::finish

pub mod decoder;
pub mod encoder;

pub use decoder::Decoder;
pub use encoder::Encoder;

use crate::{Error, Result};

pub const MIN_WINDOW_BITS: u8 = 4;
pub const MAX_WINDOW_BITS: u8 = 15;
pub const MIN_LOOKAHEAD_BITS: u8 = 3;

pub(crate) const LITERAL_MARKER: u8 = 0x01;
pub(crate) const BACKREF_MARKER: u8 = 0x00;

/// Result of pushing input bytes into the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    /// Input was accepted (possibly only a prefix of it).
    Ok,
    /// Nothing fit; drain output via poll before sinking again.
    Full,
}

/// Result of pulling output bytes out of the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// No more output is currently producible; safe to sink more or finish.
    Empty,
    /// The output buffer filled mid-token; poll again with room.
    More,
}

/// Result of flagging end-of-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishStatus {
    /// The state machine is fully flushed.
    Done,
    /// Buffered state remains; keep polling, then finish again.
    More,
}

/// Validated (window bits, lookahead bits) pair.
///
/// The window holds `2^window_bits` bytes of dictionary; a match may span at
/// most `2^lookahead_bits` bytes and must be strictly shorter than the
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    window_bits: u8,
    lookahead_bits: u8,
}

impl Config {
    pub fn new(window_bits: u8, lookahead_bits: u8) -> Result<Self> {
        if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&window_bits) {
            return Err(Error::InvalidWindowBits(window_bits));
        }
        if lookahead_bits < MIN_LOOKAHEAD_BITS || lookahead_bits >= window_bits {
            return Err(Error::InvalidLookaheadBits {
                window_bits,
                lookahead_bits,
            });
        }
        Ok(Self {
            window_bits,
            lookahead_bits,
        })
    }

    pub fn window_bits(self) -> u8 {
        self.window_bits
    }

    pub fn lookahead_bits(self) -> u8 {
        self.lookahead_bits
    }

    pub(crate) fn window_size(self) -> usize {
        1 << self.window_bits
    }

    pub(crate) fn lookahead_size(self) -> usize {
        1 << self.lookahead_bits
    }
}

/// Scratch buffer size for the one-shot helpers, matching the block decoder's
/// working-set size.
const DRIVE_BUFFER_SIZE: usize = 1024;

/// Compress a whole buffer by driving the sink/poll/finish loop to
/// completion.
pub fn encode_all(data: &[u8], config: Config) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new(config);
    let mut out = Vec::new();
    let mut scratch = [0u8; DRIVE_BUFFER_SIZE];
    let mut pos = 0;
    loop {
        if pos < data.len() {
            let (consumed, _) = encoder.sink(&data[pos..]);
            pos += consumed;
        }
        loop {
            let (produced, status) = encoder.poll(&mut scratch);
            out.extend_from_slice(&scratch[..produced]);
            if status == PollStatus::Empty {
                break;
            }
        }
        if pos == data.len() && encoder.finish() == FinishStatus::Done {
            return Ok(out);
        }
    }
}

/// Decompress a whole buffer by driving the sink/poll/finish loop to
/// completion.
pub fn decode_all(data: &[u8], config: Config) -> Result<Vec<u8>> {
    let mut decoder = Decoder::new(DRIVE_BUFFER_SIZE, config)?;
    let mut out = Vec::new();
    let mut scratch = [0u8; DRIVE_BUFFER_SIZE];
    let mut pos = 0;
    loop {
        if pos < data.len() {
            let (consumed, _) = decoder.sink(&data[pos..]);
            pos += consumed;
        }
        loop {
            let (produced, status) = decoder.poll(&mut scratch);
            out.extend_from_slice(&scratch[..produced]);
            if status == PollStatus::Empty {
                break;
            }
        }
        if pos == data.len() && decoder.finish() == FinishStatus::Done {
            return Ok(out);
        }
    }
}
