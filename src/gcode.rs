//! G-code instruction model and the plain-text (non-container) parser.

use std::io::{BufRead, BufReader, Read};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::trace;

use crate::reader::CancelToken;
use crate::thumbnail::ThumbnailFormat;
use crate::{Error, Result};

const PNG_THUMBNAIL_BEGIN: &str = "; thumbnail begin";
const PNG_THUMBNAIL_END: &str = "; thumbnail end";
const QOI_THUMBNAIL_BEGIN: &str = "; thumbnail_QOI begin";
const QOI_THUMBNAIL_END: &str = "; thumbnail_QOI end";

/// One line of G-code, split into its command and comment parts.
/// Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Instruction {
    /// 1-based line number.
    pub line_no: usize,
    pub raw: String,
    command: Option<String>,
    comment: Option<String>,
}

impl Instruction {
    pub fn new(line_no: usize, raw: &str) -> Self {
        let (command_part, comment_part) = match raw.find(';') {
            Some(index) => (&raw[..index], Some(&raw[index + 1..])),
            None => (raw, None),
        };

        let command = Some(command_part.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        let comment = comment_part
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);

        Self {
            line_no,
            raw: raw.to_owned(),
            command,
            comment,
        }
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn has_command(&self) -> bool {
        self.command.is_some()
    }

    pub fn has_comment(&self) -> bool {
        self.comment.is_some()
    }

    pub fn comment_only(&self) -> bool {
        !self.has_command() && self.has_comment()
    }
}

/// Split decoded instruction text into [`Instruction`]s.  Line numbers count
/// every line of the text; blank lines are skipped but still counted.
pub fn split_instructions(text: &str) -> Vec<Instruction> {
    text.split('\n')
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| Instruction::new(index + 1, line))
        .collect()
}

/// A thumbnail embedded inline in plain-text G-code as base64.
#[derive(Debug, Clone)]
pub struct InlineThumbnail {
    pub format: ThumbnailFormat,
    /// Dimension string from the marker line, e.g. `"220x124"`.
    pub dimensions: String,
    /// Byte size declared by the marker line.
    pub declared_size: u64,
    data: Vec<u8>,
}

impl InlineThumbnail {
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// In-progress inline thumbnail accumulation.
struct PendingThumbnail {
    format: ThumbnailFormat,
    dimensions: String,
    declared_size: u64,
    encoded: String,
}

impl PendingThumbnail {
    fn from_marker(line: &str, format: ThumbnailFormat) -> Result<Self> {
        let parts: Vec<&str> = line.split(' ').collect();
        if parts.len() < 5 {
            return Err(Error::MalformedMarker(line.to_owned()));
        }
        let declared_size = parts[4]
            .parse()
            .map_err(|_| Error::MalformedMarker(line.to_owned()))?;
        Ok(Self {
            format,
            dimensions: parts[3].to_owned(),
            declared_size,
            encoded: String::new(),
        })
    }

    fn finish(self) -> Result<InlineThumbnail> {
        let data = BASE64
            .decode(&self.encoded)
            .map_err(|e| Error::MalformedMarker(e.to_string()))?;
        Ok(InlineThumbnail {
            format: self.format,
            dimensions: self.dimensions,
            declared_size: self.declared_size,
            data,
        })
    }
}

/// A parsed plain-text G-code file.
#[derive(Debug)]
pub struct GcodeFile {
    pub name: String,
    lines: Vec<Instruction>,
    thumbnails: Vec<InlineThumbnail>,
}

impl GcodeFile {
    pub fn lines(&self) -> &[Instruction] {
        &self.lines
    }

    pub fn thumbnails(&self) -> &[InlineThumbnail] {
        &self.thumbnails
    }

    pub fn commands(&self) -> impl Iterator<Item = &Instruction> {
        self.lines.iter().filter(|i| i.has_command())
    }

    pub fn comments(&self) -> impl Iterator<Item = &Instruction> {
        self.lines.iter().filter(|i| i.comment_only())
    }
}

/// Parse plain-text G-code: instructions line by line, with inline base64
/// thumbnails lifted out.  Cancellation is checked between lines.
pub fn parse_text<R: Read>(name: &str, input: R, cancel: &CancelToken) -> Result<GcodeFile> {
    let reader = BufReader::new(input);
    let mut lines = Vec::new();
    let mut thumbnails = Vec::new();
    let mut pending: Option<PendingThumbnail> = None;
    let mut line_no = 0usize;

    for line in reader.lines() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let line = line?;
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with(QOI_THUMBNAIL_BEGIN) {
            pending = Some(PendingThumbnail::from_marker(&line, ThumbnailFormat::Qoi)?);
        } else if line.starts_with(PNG_THUMBNAIL_BEGIN) {
            pending = Some(PendingThumbnail::from_marker(&line, ThumbnailFormat::Png)?);
        } else if let Some(thumbnail) = pending.take() {
            if line.starts_with(QOI_THUMBNAIL_END) || line.starts_with(PNG_THUMBNAIL_END) {
                trace!(
                    dimensions = %thumbnail.dimensions,
                    size = thumbnail.declared_size,
                    "finished inline thumbnail"
                );
                thumbnails.push(thumbnail.finish()?);
            } else {
                let mut thumbnail = thumbnail;
                // Payload lines are comments: strip "; " and keep the rest.
                thumbnail
                    .encoded
                    .push_str(line.trim_start_matches("; ").trim());
                pending = Some(thumbnail);
            }
        } else {
            lines.push(Instruction::new(line_no, &line));
        }
    }

    Ok(GcodeFile {
        name: name.to_owned(),
        lines,
        thumbnails,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    #[test]
    fn splits_command_and_comment() {
        let instruction = Instruction::new(1, "G1 X135.452 Y87.199 E.01116 ;WIDTH:0.449999");
        assert_eq!(instruction.command(), Some("G1 X135.452 Y87.199 E.01116"));
        assert_eq!(instruction.comment(), Some("WIDTH:0.449999"));
        assert!(instruction.has_command());
        assert!(instruction.has_comment());
        assert!(!instruction.comment_only());
    }

    #[test]
    fn comment_only_lines_have_no_command() {
        let instruction = Instruction::new(3, "; perimeters extrusion width = 0.45mm");
        assert_eq!(instruction.command(), None);
        assert_eq!(
            instruction.comment(),
            Some("perimeters extrusion width = 0.45mm")
        );
        assert!(instruction.comment_only());
    }

    #[test]
    fn empty_comment_after_semicolon_is_absent() {
        let instruction = Instruction::new(1, "G28 ;");
        assert_eq!(instruction.command(), Some("G28"));
        assert_eq!(instruction.comment(), None);
        assert!(!instruction.has_comment());
    }

    #[test]
    fn split_skips_blank_lines_but_keeps_numbering() {
        let instructions = split_instructions("G1 X1\n\nG1 X2\n");
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].line_no, 1);
        assert_eq!(instructions[1].line_no, 3);
    }

    #[test]
    fn parses_instructions_and_inline_thumbnail() {
        let payload = b"fake png bytes";
        let encoded = BASE64.encode(payload);
        let text = format!(
            "; generated by test\n\
             G28 ; home\n\
             ; thumbnail begin 16x16 {size} v1\n\
             ; {b64}\n\
             ; thumbnail end\n\
             G1 X5 Y5\n",
            size = payload.len(),
            b64 = encoded,
        );

        let file = parse_text("test.gcode", text.as_bytes(), &CancelToken::new()).unwrap();
        assert_eq!(file.lines().len(), 3);
        assert_eq!(file.thumbnails().len(), 1);

        let thumbnail = &file.thumbnails()[0];
        assert_eq!(thumbnail.format, ThumbnailFormat::Png);
        assert_eq!(thumbnail.dimensions, "16x16");
        assert_eq!(thumbnail.declared_size, payload.len() as u64);
        assert_eq!(thumbnail.data(), payload);

        assert_eq!(file.commands().count(), 2);
        assert_eq!(file.comments().count(), 1);
    }

    #[test]
    fn recognizes_qoi_thumbnail_markers() {
        let encoded = BASE64.encode(b"qoi bytes");
        let text = format!(
            "; thumbnail_QOI begin 8x8 9 v1\n; {encoded}\n; thumbnail_QOI end\nG90\n"
        );
        let file = parse_text("test.gcode", text.as_bytes(), &CancelToken::new()).unwrap();
        assert_eq!(file.thumbnails().len(), 1);
        assert_eq!(file.thumbnails()[0].format, ThumbnailFormat::Qoi);
        assert_eq!(file.lines().len(), 1);
    }

    #[test]
    fn malformed_marker_is_an_error() {
        let text = "; thumbnail begin 16x16\n";
        assert!(matches!(
            parse_text("test.gcode", text.as_bytes(), &CancelToken::new()),
            Err(Error::MalformedMarker(_))
        ));
    }

    #[test]
    fn cancellation_aborts_between_lines() {
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            parse_text("test.gcode", "G1 X0\n".as_bytes(), &cancel),
            Err(Error::Cancelled)
        ));
    }
}
