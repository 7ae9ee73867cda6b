//! Thumbnail decoding.
//!
//! Containers embed preview images as PNG or QOI payloads.  Consumers want
//! PNG, so QOI payloads are decoded and re-encoded through the image
//! collaborator while PNG payloads are kept as-is.

use std::io::Cursor;

use image::ImageFormat;

use crate::{Error, Result};

/// Image format code carried in a thumbnail block's parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailFormat {
    Png,
    Jpeg,
    Qoi,
}

impl ThumbnailFormat {
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            0 => Ok(ThumbnailFormat::Png),
            1 => Ok(ThumbnailFormat::Jpeg),
            2 => Ok(ThumbnailFormat::Qoi),
            _ => Err(Error::UnknownThumbnailFormat(code)),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            ThumbnailFormat::Png => 0,
            ThumbnailFormat::Jpeg => 1,
            ThumbnailFormat::Qoi => 2,
        }
    }

    /// Human-readable name (for diagnostics only — never parsed).
    pub fn name(self) -> &'static str {
        match self {
            ThumbnailFormat::Png => "PNG",
            ThumbnailFormat::Jpeg => "JPEG",
            ThumbnailFormat::Qoi => "QOI",
        }
    }
}

/// A decoded thumbnail, always held as PNG bytes.
#[derive(Debug, Clone)]
pub struct ThumbnailImage {
    png: Vec<u8>,
}

impl ThumbnailImage {
    /// Decode a thumbnail payload.  JPEG payloads are unsupported and fail
    /// here, at the point the block is decoded.
    pub fn decode(format: ThumbnailFormat, data: &[u8]) -> Result<Self> {
        match format {
            ThumbnailFormat::Png => Ok(Self { png: data.to_vec() }),
            ThumbnailFormat::Qoi => {
                let decoded = image::load_from_memory_with_format(data, ImageFormat::Qoi)
                    .map_err(|e| Error::Image(e.to_string()))?;
                let mut png = Vec::new();
                decoded
                    .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                    .map_err(|e| Error::Image(e.to_string()))?;
                Ok(Self { png })
            }
            ThumbnailFormat::Jpeg => Err(Error::UnsupportedThumbnail(format.name())),
        }
    }

    /// Wrap bytes that are already PNG.
    pub fn from_png(png: Vec<u8>) -> Self {
        Self { png }
    }

    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn len(&self) -> usize {
        self.png.len()
    }

    pub fn is_empty(&self) -> bool {
        self.png.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal 1x1 QOI image: header, one QOI_OP_RGB pixel, end marker.
    fn tiny_qoi() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"qoif");
        data.extend_from_slice(&1u32.to_be_bytes()); // width
        data.extend_from_slice(&1u32.to_be_bytes()); // height
        data.push(3); // channels
        data.push(0); // colorspace
        data.extend_from_slice(&[0xFE, 0x80, 0x40, 0x20]); // QOI_OP_RGB
        data.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1]); // end marker
        data
    }

    #[test]
    fn qoi_payload_becomes_png() {
        let thumbnail = ThumbnailImage::decode(ThumbnailFormat::Qoi, &tiny_qoi()).unwrap();
        // PNG signature.
        assert_eq!(&thumbnail.png_bytes()[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn png_payload_is_kept_verbatim() {
        let payload = b"\x89PNG\r\n\x1a\nrest".to_vec();
        let thumbnail = ThumbnailImage::decode(ThumbnailFormat::Png, &payload).unwrap();
        assert_eq!(thumbnail.png_bytes(), payload.as_slice());
    }

    #[test]
    fn jpeg_payload_is_unsupported() {
        assert!(matches!(
            ThumbnailImage::decode(ThumbnailFormat::Jpeg, &[0xFF, 0xD8]),
            Err(Error::UnsupportedThumbnail("JPEG"))
        ));
    }

    #[test]
    fn garbage_qoi_payload_is_an_image_error() {
        assert!(matches!(
            ThumbnailImage::decode(ThumbnailFormat::Qoi, b"not a qoi image"),
            Err(Error::Image(_))
        ));
    }

    #[test]
    fn unknown_format_code_is_fatal() {
        assert!(matches!(
            ThumbnailFormat::from_code(9),
            Err(Error::UnknownThumbnailFormat(9))
        ));
    }
}
