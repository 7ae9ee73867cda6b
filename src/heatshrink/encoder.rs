//! Streaming LZSS encoder.
//!
//! The encoder owns a single buffer of `2 * 2^window_bits` bytes: the lower
//! half is the backlog (dictionary) and the upper half is the bounded input
//! queue.  Poll drives a small state machine one token at a time so that it
//! can suspend at any output-buffer boundary and resume later.

use super::{Config, FinishStatus, PollStatus, SinkStatus, BACKREF_MARKER, LITERAL_MARKER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Input buffer has room; accepting more bytes.
    NotFull,
    /// Input buffer is full (or finish was called); ready to scan.
    Filled,
    /// Scanning for the next match.
    Search,
    YieldTagBit,
    YieldLiteral,
    YieldBrIndex,
    YieldBrLength,
    /// Shift processed input into the backlog half.
    SaveBacklog,
    /// Emit the final partial byte, if any.
    FlushBits,
    Done,
}

pub struct Encoder {
    config: Config,
    /// Backlog window followed by the input queue.
    buffer: Vec<u8>,
    /// Bytes currently queued in the input half.
    input_size: usize,
    /// Scan position within the input half.
    match_scan_index: usize,
    match_pos: usize,
    match_length: usize,
    /// Bits of the token field currently being emitted, MSB-aligned.
    outgoing_bits: u16,
    outgoing_bits_count: u8,
    current_byte: u8,
    /// One-hot write position within `current_byte`; 0x80 means empty.
    bit_index: u8,
    finishing: bool,
    state: State,
}

impl Encoder {
    pub fn new(config: Config) -> Self {
        let window_size = config.window_size();
        Self {
            config,
            buffer: vec![0; 2 * window_size],
            input_size: 0,
            match_scan_index: 0,
            match_pos: 0,
            match_length: 0,
            outgoing_bits: 0,
            outgoing_bits_count: 0,
            current_byte: 0,
            bit_index: 0x80,
            finishing: false,
            state: State::NotFull,
        }
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// Clear all buffers and state for reuse with a new independent stream.
    pub fn reset(&mut self) {
        self.buffer.fill(0);
        self.input_size = 0;
        self.match_scan_index = 0;
        self.match_pos = 0;
        self.match_length = 0;
        self.outgoing_bits = 0;
        self.outgoing_bits_count = 0;
        self.current_byte = 0;
        self.bit_index = 0x80;
        self.finishing = false;
        self.state = State::NotFull;
    }

    /// Copy as much of `input` as fits into the input queue.  Returns the
    /// number of bytes consumed.  [`SinkStatus::Full`] means nothing fit;
    /// drain pending output via [`poll`](Self::poll) first.
    pub fn sink(&mut self, input: &[u8]) -> (usize, SinkStatus) {
        if self.finishing || self.state != State::NotFull {
            return (0, SinkStatus::Full);
        }
        let window_size = self.config.window_size();
        let room = window_size - self.input_size;
        let count = room.min(input.len());
        if count == 0 && !input.is_empty() {
            return (0, SinkStatus::Full);
        }
        let offset = window_size + self.input_size;
        self.buffer[offset..offset + count].copy_from_slice(&input[..count]);
        self.input_size += count;
        if self.input_size == window_size {
            self.state = State::Filled;
        }
        (count, SinkStatus::Ok)
    }

    /// Advance the state machine, writing as many encoded bytes as fit into
    /// `out`.  [`PollStatus::More`] means the buffer filled mid-token and
    /// poll must be called again before anything else.
    pub fn poll(&mut self, out: &mut [u8]) -> (usize, PollStatus) {
        let mut written = 0;
        loop {
            let entered = self.state;
            self.state = match self.state {
                State::NotFull => return (written, PollStatus::Empty),
                State::Filled => State::Search,
                State::Search => self.step_search(),
                State::YieldTagBit => self.yield_tag_bit(out, &mut written),
                State::YieldLiteral => self.yield_literal(out, &mut written),
                State::YieldBrIndex => self.yield_br_index(out, &mut written),
                State::YieldBrLength => self.yield_br_length(out, &mut written),
                State::SaveBacklog => {
                    self.save_backlog();
                    State::NotFull
                }
                State::FlushBits => self.flush_bit_buffer(out, &mut written),
                State::Done => return (written, PollStatus::Empty),
            };
            // A state that cannot advance is waiting for output space.
            if self.state == entered && written == out.len() {
                return (written, PollStatus::More);
            }
        }
    }

    /// Flag that no more input will be sunk.  Returns [`FinishStatus::More`]
    /// until poll has drained everything.
    pub fn finish(&mut self) -> FinishStatus {
        self.finishing = true;
        if self.state == State::NotFull {
            self.state = State::Filled;
        }
        if self.state == State::Done {
            FinishStatus::Done
        } else {
            FinishStatus::More
        }
    }

    // ── State steps ──────────────────────────────────────────────────────

    fn step_search(&mut self) -> State {
        let lookahead = self.config.lookahead_size();
        let msi = self.match_scan_index;
        let required = if self.finishing { 1 } else { lookahead };
        if msi as isize > self.input_size as isize - required as isize {
            // Input exhausted: either flush out or pull the processed bytes
            // into the backlog and wait for more.
            return if self.finishing {
                State::FlushBits
            } else {
                State::SaveBacklog
            };
        }

        let window_size = self.config.window_size();
        let end = window_size + msi;
        let start = end - window_size;
        let max_possible = lookahead.min(self.input_size - msi);

        match self.find_longest_match(start, end, max_possible) {
            None => {
                self.match_scan_index += 1;
                self.match_length = 0;
            }
            Some((pos, length)) => {
                self.match_pos = pos;
                self.match_length = length;
            }
        }
        State::YieldTagBit
    }

    /// Greedy longest-match search over `buffer[start..end)` for the needle
    /// at `end`.  Matches below the break-even length (where the
    /// backreference costs more bits than literals) are rejected.
    fn find_longest_match(&self, start: usize, end: usize, maxlen: usize) -> Option<(usize, usize)> {
        let buf = &self.buffer;
        let mut match_maxlen = 0;
        let mut match_index = None;

        let mut pos = end;
        while pos > start {
            pos -= 1;
            if buf[pos + match_maxlen] == buf[end + match_maxlen] && buf[pos] == buf[end] {
                let mut len = 1;
                while len < maxlen && buf[pos + len] == buf[end + len] {
                    len += 1;
                }
                if len > match_maxlen {
                    match_maxlen = len;
                    match_index = Some(pos);
                    if len == maxlen {
                        break; // won't find better
                    }
                }
            }
        }

        let break_even_bits =
            1 + self.config.window_bits() as usize + self.config.lookahead_bits() as usize;
        match match_index {
            Some(index) if match_maxlen > break_even_bits / 8 => Some((end - index, match_maxlen)),
            _ => None,
        }
    }

    fn yield_tag_bit(&mut self, out: &mut [u8], written: &mut usize) -> State {
        if *written == out.len() {
            return State::YieldTagBit;
        }
        if self.match_length == 0 {
            self.push_bits(1, LITERAL_MARKER, out, written);
            State::YieldLiteral
        } else {
            self.push_bits(1, BACKREF_MARKER, out, written);
            self.outgoing_bits = (self.match_pos - 1) as u16;
            self.outgoing_bits_count = self.config.window_bits();
            State::YieldBrIndex
        }
    }

    fn yield_literal(&mut self, out: &mut [u8], written: &mut usize) -> State {
        if *written == out.len() {
            return State::YieldLiteral;
        }
        let processed = self.config.window_size() + self.match_scan_index - 1;
        let byte = self.buffer[processed];
        self.push_bits(8, byte, out, written);
        State::Search
    }

    fn yield_br_index(&mut self, out: &mut [u8], written: &mut usize) -> State {
        if *written == out.len() {
            return State::YieldBrIndex;
        }
        if self.push_outgoing_bits(out, written) > 0 {
            State::YieldBrIndex
        } else {
            self.outgoing_bits = (self.match_length - 1) as u16;
            self.outgoing_bits_count = self.config.lookahead_bits();
            State::YieldBrLength
        }
    }

    fn yield_br_length(&mut self, out: &mut [u8], written: &mut usize) -> State {
        if *written == out.len() {
            return State::YieldBrLength;
        }
        if self.push_outgoing_bits(out, written) > 0 {
            State::YieldBrLength
        } else {
            self.match_scan_index += self.match_length;
            self.match_length = 0;
            State::Search
        }
    }

    fn save_backlog(&mut self) {
        let window_size = self.config.window_size();
        let msi = self.match_scan_index;
        // Shift left by the number of processed bytes so they become the
        // dictionary for future matches.
        self.buffer.copy_within(msi..2 * window_size, 0);
        self.match_scan_index = 0;
        self.input_size -= msi;
    }

    fn flush_bit_buffer(&mut self, out: &mut [u8], written: &mut usize) -> State {
        if self.bit_index == 0x80 {
            State::Done
        } else if *written < out.len() {
            out[*written] = self.current_byte;
            *written += 1;
            State::Done
        } else {
            State::FlushBits
        }
    }

    // ── Bit packing ──────────────────────────────────────────────────────

    /// Push up to 8 bits, MSB-first.  Emits at most one byte per call.
    fn push_bits(&mut self, count: u8, bits: u8, out: &mut [u8], written: &mut usize) {
        debug_assert!(count <= 8);
        if count == 8 && self.bit_index == 0x80 {
            out[*written] = bits;
            *written += 1;
            return;
        }
        for i in (0..count).rev() {
            if bits & (1 << i) != 0 {
                self.current_byte |= self.bit_index;
            }
            self.bit_index >>= 1;
            if self.bit_index == 0 {
                self.bit_index = 0x80;
                out[*written] = self.current_byte;
                *written += 1;
                self.current_byte = 0;
            }
        }
    }

    /// Push the next chunk (at most 8 bits) of the pending token field.
    /// Returns the number of bits pushed; 0 means the field is complete.
    fn push_outgoing_bits(&mut self, out: &mut [u8], written: &mut usize) -> u8 {
        let (count, bits) = if self.outgoing_bits_count > 8 {
            (8, (self.outgoing_bits >> (self.outgoing_bits_count - 8)) as u8)
        } else {
            (self.outgoing_bits_count, self.outgoing_bits as u8)
        };
        if count > 0 {
            self.push_bits(count, bits, out, written);
            self.outgoing_bits_count -= count;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(encoder: &mut Encoder, out: &mut [u8]) -> usize {
        let (produced, status) = encoder.poll(out);
        assert_eq!(status, PollStatus::Empty);
        produced
    }

    #[test]
    fn sink_accepts_input_when_it_fits() {
        let mut encoder = Encoder::new(Config::new(8, 7).unwrap());
        let input = [b'*'; 256];
        let (consumed, status) = encoder.sink(&input);
        assert_eq!(status, SinkStatus::Ok);
        assert_eq!(consumed, 256);
    }

    #[test]
    fn sink_accepts_partial_input_when_some_fits() {
        let mut encoder = Encoder::new(Config::new(8, 7).unwrap());
        let input = [b'*'; 512];
        let (consumed, status) = encoder.sink(&input);
        assert_eq!(status, SinkStatus::Ok);
        assert_eq!(consumed, 256);
        // Buffer is now full; nothing more fits until output is drained.
        let (consumed, status) = encoder.sink(&input[256..]);
        assert_eq!(status, SinkStatus::Full);
        assert_eq!(consumed, 0);
    }

    #[test]
    fn poll_indicates_empty_when_no_input_provided() {
        let mut encoder = Encoder::new(Config::new(8, 7).unwrap());
        let mut out = [0u8; 512];
        let (produced, status) = encoder.poll(&mut out);
        assert_eq!(status, PollStatus::Empty);
        assert_eq!(produced, 0);
    }

    #[test]
    fn emits_data_without_repetition_as_literal_sequence() {
        let mut encoder = Encoder::new(Config::new(8, 7).unwrap());
        let input = [0u8, 1, 2, 3, 4];
        let mut out = [0u8; 1024];

        let (consumed, status) = encoder.sink(&input);
        assert_eq!(status, SinkStatus::Ok);
        assert_eq!(consumed, 5);

        // No output yet: the encoder does not know the input is complete.
        let (produced, status) = encoder.poll(&mut out);
        assert_eq!(status, PollStatus::Empty);
        assert_eq!(produced, 0);

        assert_eq!(encoder.finish(), FinishStatus::More);
        let produced = drain(&mut encoder, &mut out);
        assert_eq!(&out[..produced], &[0x80, 0x40, 0x60, 0x50, 0x38, 0x20]);
        assert_eq!(encoder.finish(), FinishStatus::Done);
    }

    #[test]
    fn emits_series_of_same_byte_as_literal_then_backref() {
        let mut encoder = Encoder::new(Config::new(8, 7).unwrap());
        let input = [b'a'; 5];
        let mut out = [0u8; 1024];

        let (consumed, status) = encoder.sink(&input);
        assert_eq!(status, SinkStatus::Ok);
        assert_eq!(consumed, 5);

        assert_eq!(encoder.finish(), FinishStatus::More);
        let produced = drain(&mut encoder, &mut out);
        assert_eq!(&out[..produced], &[0xb0, 0x80, 0x01, 0x80]);
        assert_eq!(encoder.finish(), FinishStatus::Done);
    }

    #[test]
    fn detects_repeated_substring() {
        let mut encoder = Encoder::new(Config::new(8, 3).unwrap());
        let input = b"abcdabcd";
        let mut out = [0u8; 1024];

        let (consumed, status) = encoder.sink(input);
        assert_eq!(status, SinkStatus::Ok);
        assert_eq!(consumed, input.len());

        assert_eq!(encoder.finish(), FinishStatus::More);
        let produced = drain(&mut encoder, &mut out);
        assert_eq!(encoder.finish(), FinishStatus::Done);
        assert_eq!(&out[..produced], &[0xb0, 0xd8, 0xac, 0x76, 0x40, 0x1b]);
    }

    #[test]
    fn detects_repeated_substring_and_preserves_trailing_literal() {
        let mut encoder = Encoder::new(Config::new(8, 3).unwrap());
        let input = b"abcdabcde";
        let mut out = [0u8; 1024];

        let (consumed, status) = encoder.sink(input);
        assert_eq!(status, SinkStatus::Ok);
        assert_eq!(consumed, input.len());

        assert_eq!(encoder.finish(), FinishStatus::More);
        let produced = drain(&mut encoder, &mut out);
        assert_eq!(encoder.finish(), FinishStatus::Done);
        assert_eq!(
            &out[..produced],
            &[0xb0, 0xd8, 0xac, 0x76, 0x40, 0x1b, 0xb2, 0x80]
        );
    }

    #[test]
    fn suspends_when_output_buffer_fills_mid_stream() {
        let mut encoder = Encoder::new(Config::new(8, 7).unwrap());
        let input = [b'a'; 5];
        encoder.sink(&input);
        assert_eq!(encoder.finish(), FinishStatus::More);

        // Expected output is 4 bytes; a 1-byte window forces suspension.
        let mut collected = Vec::new();
        let mut tiny = [0u8; 1];
        loop {
            let (produced, status) = encoder.poll(&mut tiny);
            collected.extend_from_slice(&tiny[..produced]);
            if status == PollStatus::Empty {
                break;
            }
        }
        assert_eq!(collected, &[0xb0, 0x80, 0x01, 0x80]);
        assert_eq!(encoder.finish(), FinishStatus::Done);
    }

    #[test]
    fn reset_allows_reuse_for_an_independent_stream() {
        let mut encoder = Encoder::new(Config::new(8, 7).unwrap());
        encoder.sink(&[b'a'; 5]);
        encoder.finish();
        let mut out = [0u8; 64];
        drain(&mut encoder, &mut out);
        assert_eq!(encoder.finish(), FinishStatus::Done);

        encoder.reset();
        encoder.sink(&[b'a'; 5]);
        assert_eq!(encoder.finish(), FinishStatus::More);
        let produced = drain(&mut encoder, &mut out);
        assert_eq!(&out[..produced], &[0xb0, 0x80, 0x01, 0x80]);
    }

    #[test]
    fn sink_after_finish_is_rejected() {
        let mut encoder = Encoder::new(Config::new(8, 7).unwrap());
        encoder.finish();
        let (consumed, status) = encoder.sink(b"abc");
        assert_eq!(status, SinkStatus::Full);
        assert_eq!(consumed, 0);
    }
}
