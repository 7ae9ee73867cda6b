//! Compression dispatch for block payloads.
//!
//! Payload bytes are routed by the block header's compression code.  Deflate
//! delegates to the zlib collaborator; the heatshrink variants carry fixed
//! (window, lookahead) parameters defined by the container format.

use std::io::Read;

use flate2::read::ZlibDecoder;
use tracing::trace;

use crate::heatshrink::{self, Config};
use crate::{Error, Result};

/// Compression codes as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Payload stored verbatim.
    None,
    /// zlib-wrapped DEFLATE.
    Deflate,
    /// Heatshrink with window 11, lookahead 4.
    Heatshrink11,
    /// Heatshrink with window 12, lookahead 4.
    Heatshrink12,
}

impl Compression {
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Deflate),
            2 => Ok(Compression::Heatshrink11),
            3 => Ok(Compression::Heatshrink12),
            _ => Err(Error::UnknownCompression(code)),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Compression::None => 0,
            Compression::Deflate => 1,
            Compression::Heatshrink11 => 2,
            Compression::Heatshrink12 => 3,
        }
    }

    /// Human-readable name (for diagnostics only — never parsed).
    pub fn name(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Deflate => "deflate",
            Compression::Heatshrink11 => "heatshrink 11,4",
            Compression::Heatshrink12 => "heatshrink 12,4",
        }
    }

    /// The fixed heatshrink parameters implied by this code, if any.
    pub fn heatshrink_config(self) -> Option<Config> {
        let (window_bits, lookahead_bits) = match self {
            Compression::Heatshrink11 => (11, 4),
            Compression::Heatshrink12 => (12, 4),
            _ => return None,
        };
        // The fixed parameters are inside the valid range by construction.
        Config::new(window_bits, lookahead_bits).ok()
    }
}

/// Route payload bytes through the declared compression.
pub fn decompress(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
    trace!(
        compression = compression.name(),
        bytes = data.len(),
        "decompressing block payload"
    );
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Deflate => {
            let mut out = Vec::new();
            ZlibDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| Error::Decompress(e.to_string()))?;
            Ok(out)
        }
        Compression::Heatshrink11 | Compression::Heatshrink12 => {
            let config = compression
                .heatshrink_config()
                .ok_or_else(|| Error::Decompress("missing heatshrink config".to_owned()))?;
            heatshrink::decode_all(data, config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    #[test]
    fn none_passes_payload_through() {
        let payload = b"Producer = PrusaSlicer 2.6.0\n";
        assert_eq!(
            decompress(payload, Compression::None).unwrap(),
            payload.to_vec()
        );
    }

    #[test]
    fn deflate_round_trips_through_zlib() {
        let text = b"M73 P0 R58\nM73 Q0 S59\n";
        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(text).unwrap();
        let packed = encoder.finish().unwrap();

        assert_eq!(decompress(&packed, Compression::Deflate).unwrap(), text);
    }

    #[test]
    fn heatshrink_variants_use_their_fixed_parameters() {
        let text = b"G1 X0 Y0\nG1 X1 Y1\nG1 X2 Y2\n";
        for compression in [Compression::Heatshrink11, Compression::Heatshrink12] {
            let config = compression.heatshrink_config().unwrap();
            let packed = heatshrink::encode_all(text, config).unwrap();
            assert_eq!(decompress(&packed, compression).unwrap(), text);
        }
    }

    #[test]
    fn corrupt_deflate_payload_is_an_error() {
        assert!(matches!(
            decompress(b"definitely not zlib", Compression::Deflate),
            Err(Error::Decompress(_))
        ));
    }

    #[test]
    fn unknown_code_is_fatal() {
        assert!(matches!(
            Compression::from_code(9),
            Err(Error::UnknownCompression(9))
        ));
    }
}
