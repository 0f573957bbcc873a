use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::debug;

use crate::codec::{decode_message, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};
use crate::message::LineMessage;

const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Outcome of a single non-draining read.
#[derive(Debug, PartialEq, Eq)]
pub enum Received {
    /// Complete messages now available, in arrival order. May be empty when
    /// only part of a frame arrived.
    Messages(Vec<LineMessage>),
    /// The writer closed its end and no partial frame was left behind.
    Closed,
}

/// Reads complete line messages from any `Read` stream.
///
/// Partial reads are buffered internally so callers only see whole messages.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        let capacity = (HEADER_SIZE + config.max_text_len).max(READ_CHUNK_SIZE);
        Self {
            inner,
            buf: BytesMut::with_capacity(capacity),
            config,
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_message(&mut self) -> Result<LineMessage> {
        loop {
            if let Some(message) = decode_message(&mut self.buf, self.config.max_text_len)? {
                return Ok(message);
            }

            if self.fill()? == 0 {
                return Err(FrameError::ConnectionClosed);
            }
        }
    }

    /// Perform exactly one read and return every message that is complete.
    ///
    /// Meant to be called once the underlying handle was reported readable,
    /// so the read does not block.
    pub fn read_available(&mut self) -> Result<Received> {
        if self.fill()? == 0 {
            if self.buf.is_empty() {
                return Ok(Received::Closed);
            }
            debug!(pending = self.buf.len(), "channel closed inside a frame");
            return Err(FrameError::ConnectionClosed);
        }

        self.buffered_messages().map(Received::Messages)
    }

    /// Decode every complete message already sitting in the buffer.
    pub fn buffered_messages(&mut self) -> Result<Vec<LineMessage>> {
        let mut messages = Vec::new();
        while let Some(message) = decode_message(&mut self.buf, self.config.max_text_len)? {
            messages.push(message);
        }
        Ok(messages)
    }

    /// Bytes received but not yet decoded.
    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn fill(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }
}

impl<T> std::fmt::Debug for FrameReader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReader")
            .field("pending_bytes", &self.buf.len())
            .field("config", &self.config)
            .finish()
    }
}
