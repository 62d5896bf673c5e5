//! Delimiter codec for TCP framing
//!
//! Every message is UTF-8 text terminated by a single delimiter byte:
//! ```text
//! [ N bytes: UTF-8 text ][ '|' ]
//! ```
//!
//! There is no length prefix, so the text itself must never contain `|`.
//! TCP may coalesce several frames into one read or split one frame across
//! reads; [`FrameDecoder`] keeps the partial tail between reads.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::protocol::{FRAME_DELIMITER, FRAME_DELIMITER_CHAR};
use crate::Command;

/// Largest run of bytes accepted without seeing a delimiter
pub const MAX_FRAME_LEN: usize = 4096;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Frame too large: {0} bytes without delimiter (max: {MAX_FRAME_LEN})")]
    FrameTooLarge(usize),

    #[error("Frame is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Empty frame")]
    EmptyFrame,

    #[error("Payload contains the frame delimiter: {0:?}")]
    DelimiterInPayload(String),
}

/// Encode a command into a delimiter-terminated frame
pub fn encode(command: Command) -> Bytes {
    let literal = command.as_str();
    let mut buf = BytesMut::with_capacity(literal.len() + 1);
    buf.put_slice(literal.as_bytes());
    buf.put_u8(FRAME_DELIMITER);
    buf.freeze()
}

/// Encode arbitrary text (e.g. an executor reply) into a frame
pub fn encode_text(text: &str) -> Result<Bytes, CodecError> {
    if text.trim().is_empty() {
        return Err(CodecError::EmptyFrame);
    }
    if text.contains(FRAME_DELIMITER_CHAR) {
        return Err(CodecError::DelimiterInPayload(text.to_string()));
    }

    let mut buf = BytesMut::with_capacity(text.len() + 1);
    buf.put_slice(text.as_bytes());
    buf.put_u8(FRAME_DELIMITER);
    Ok(buf.freeze())
}

/// Try to take the next complete frame out of a buffer
///
/// Returns:
/// - `Ok(Some(text))` if a complete, non-empty frame was decoded
/// - `Ok(None)` if more data is needed
/// - `Err(...)` if a frame was bad; the bad bytes are consumed so the caller
///   can log and keep decoding
pub fn decode(buf: &mut BytesMut) -> Result<Option<String>, CodecError> {
    loop {
        let Some(pos) = buf.iter().position(|b| *b == FRAME_DELIMITER) else {
            if buf.len() > MAX_FRAME_LEN {
                let len = buf.len();
                buf.clear();
                return Err(CodecError::FrameTooLarge(len));
            }
            return Ok(None);
        };

        let frame = buf.split_to(pos);
        buf.advance(1);

        let text = std::str::from_utf8(&frame)?.trim();
        if text.is_empty() {
            continue;
        }

        return Ok(Some(text.to_string()));
    }
}

/// Take only the text before the first delimiter of a single read
///
/// Anything after the first delimiter in the chunk is discarded, so closely
/// spaced commands that land in one read are lost. Used by executors running
/// in first-token mode.
pub fn first_token(chunk: &[u8]) -> Result<Option<String>, CodecError> {
    let text = std::str::from_utf8(chunk)?.trim();
    let token = text.split(FRAME_DELIMITER_CHAR).next().unwrap_or_default();

    if token.is_empty() {
        Ok(None)
    } else {
        Ok(Some(token.to_string()))
    }
}

/// Decoder state machine for streaming decoding
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Partial frame data being accumulated
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Create a new frame decoder
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next frame from the buffer
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete frames
    pub fn decode_next(&mut self) -> Result<Option<String>, CodecError> {
        decode(&mut self.buffer)
    }

    /// Get the current buffer length (for debugging)
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}
