use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::message::{LineMessage, Timestamp};

/// Frame header: magic (2) + seconds (8) + nanoseconds (4) + length (4) = 18 bytes.
pub const HEADER_SIZE: usize = 18;

/// Magic bytes: "T3" (0x54 0x33).
pub const MAGIC: [u8; 2] = [0x54, 0x33];

/// Default maximum line length in bytes. Longer lines are split by workers.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Encode a line message into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬─────────────┬─────────────┬──────────┬───────────────┐
/// │ Magic (2B) │ Seconds     │ Nanoseconds │ Length   │ Text          │
/// │ 0x54 0x33  │ (8B LE i64) │ (4B LE u32) │ (4B LE)  │ (Length bytes)│
/// │ "T3"       │             │             │          │               │
/// └────────────┴─────────────┴─────────────┴──────────┴───────────────┘
/// ```
pub fn encode_message(message: &LineMessage, dst: &mut BytesMut) -> Result<()> {
    let text = message.text.as_ref();
    if text.len() > u32::MAX as usize {
        return Err(FrameError::TextTooLong {
            size: text.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + text.len());
    dst.put_slice(&MAGIC);
    dst.put_i64_le(message.timestamp.secs());
    dst.put_u32_le(message.timestamp.nanos());
    dst.put_u32_le(text.len() as u32);
    dst.put_slice(text);
    Ok(())
}

/// Decode a line message from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_message(src: &mut BytesMut, max_text: usize) -> Result<Option<LineMessage>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    if src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let mut header = &src[2..HEADER_SIZE];
    let secs = header.get_i64_le();
    let nanos = header.get_u32_le();
    let text_len = header.get_u32_le() as usize;

    let timestamp =
        Timestamp::from_parts(secs, nanos).ok_or(FrameError::InvalidTimestamp { nanos })?;

    if text_len > max_text {
        return Err(FrameError::TextTooLong {
            size: text_len,
            max: max_text,
        });
    }

    let total = HEADER_SIZE + text_len;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    let text = src.split_to(text_len).freeze();

    Ok(Some(LineMessage { timestamp, text }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum line text size in bytes. Default: 4096.
    pub max_text_len: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_text_len: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}
