use std::io::{ErrorKind, Write};
use std::time::Duration;

use bytes::BytesMut;

use crate::codec::{encode_message, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};
use crate::message::LineMessage;

/// Pause between attempts while a non-blocking channel is full.
const BACKPRESSURE_RETRY_DELAY: Duration = Duration::from_millis(1);

/// Writes complete line messages to any `Write` stream.
///
/// A send returns only after the whole frame has been handed to the stream;
/// a full channel is waited out rather than dropping or splitting data.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(HEADER_SIZE + config.max_text_len),
            config,
        }
    }

    /// Encode and send one message (blocking).
    pub fn send(&mut self, message: &LineMessage) -> Result<()> {
        if message.text.len() > self.config.max_text_len {
            return Err(FrameError::TextTooLong {
                size: message.text.len(),
                max: self.config.max_text_len,
            });
        }

        self.buf.clear();
        encode_message(message, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(BACKPRESSURE_RETRY_DELAY);
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(BACKPRESSURE_RETRY_DELAY);
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T> std::fmt::Debug for FrameWriter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameWriter")
            .field("config", &self.config)
            .finish()
    }
}
