//! Line framing: newline-terminated requests, `END`-terminated responses.

use crate::executor::Response;
use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Sentinel line closing every response.
pub const END_MARKER: &str = "END";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),

    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// Escapes one payload line for the wire.
///
/// Line breaks become a literal backslash-n. A line that would read as
/// [`END_MARKER`], even after [`unescape_line`], gains one leading backslash.
fn escape_line(line: &str) -> String {
    let line = line.replace('\n', "\\n");
    if line.trim_start_matches('\\') == END_MARKER {
        format!("\\{}", line)
    } else {
        line
    }
}

/// Reverses the sentinel escaping of a received payload line.
pub fn unescape_line(line: &str) -> &str {
    match line.strip_prefix('\\') {
        Some(rest) if rest.trim_start_matches('\\') == END_MARKER => rest,
        _ => line,
    }
}

/// Splits the inbound stream on `\n` and writes each [`Response`] as its
/// lines followed by [`END_MARKER`].
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    /// Bytes already scanned for a newline.
    scanned: usize,
}

impl LineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            scanned: 0,
        }
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(offset) = src[self.scanned..].iter().position(|&b| b == b'\n') else {
            if src.len() > self.max_length {
                return Err(CodecError::LineTooLong(self.max_length));
            }
            self.scanned = src.len();
            return Ok(None);
        };

        let end = self.scanned + offset;
        self.scanned = 0;
        if end > self.max_length {
            return Err(CodecError::LineTooLong(self.max_length));
        }

        let frame = src.split_to(end + 1);
        let mut line = &frame[..end];
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }
        String::from_utf8(line.to_vec())
            .map(Some)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.scanned = 0;
        if src.is_empty() {
            return Ok(None);
        }
        let rest = src.split_to(src.len());
        String::from_utf8(rest.to_vec())
            .map(Some)
            .map_err(|_| CodecError::InvalidUtf8)
    }
}

impl Encoder<Response> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, response: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        for line in response.lines() {
            let line = escape_line(line);
            dst.reserve(line.len() + 1);
            dst.put_slice(line.as_bytes());
            dst.put_u8(b'\n');
        }
        dst.reserve(END_MARKER.len() + 1);
        dst.put_slice(END_MARKER.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
