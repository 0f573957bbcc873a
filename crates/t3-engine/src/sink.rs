use std::io::Write;

use t3_frame::{LineMessage, Stream};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::render::RenderStyle;

/// Destination for lines released by the merge engine, in release order.
pub trait LineSink {
    fn emit(&mut self, stream: Stream, message: &LineMessage) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One terminal stream that receives the lines of its own origin.
#[derive(Debug)]
struct Mirror<W> {
    stream: Stream,
    writer: W,
    colored: bool,
    failed: bool,
}

impl<W: Write> Mirror<W> {
    fn write_line(&mut self, style: &RenderStyle, message: &LineMessage, buf: &mut Vec<u8>) {
        buf.clear();
        style.render(self.stream, message, self.colored, buf);

        let result = self.writer.write_all(buf).and_then(|()| self.writer.flush());
        if let Err(err) = result {
            if self.failed {
                debug!(stream = %self.stream, error = %err, "terminal write failed again");
            } else {
                warn!(stream = %self.stream, error = %err, "terminal write failed; continuing with log file only");
                self.failed = true;
            }
        }
    }
}

/// Writes every line to the log file and to the terminal stream it came
/// from.
///
/// The log always receives full markup. Each terminal stream gets markup
/// only when it was set up as colored. A log failure is fatal; a terminal
/// failure is not.
#[derive(Debug)]
pub struct TeeSink<L, O, E> {
    style: RenderStyle,
    log: L,
    stdout: Mirror<O>,
    stderr: Mirror<E>,
    buf: Vec<u8>,
}

impl<L: Write, O: Write, E: Write> TeeSink<L, O, E> {
    pub fn new(
        style: RenderStyle,
        log: L,
        stdout: O,
        color_stdout: bool,
        stderr: E,
        color_stderr: bool,
    ) -> Self {
        Self {
            style,
            log,
            stdout: Mirror {
                stream: Stream::Stdout,
                writer: stdout,
                colored: color_stdout,
                failed: false,
            },
            stderr: Mirror {
                stream: Stream::Stderr,
                writer: stderr,
                colored: color_stderr,
                failed: false,
            },
            buf: Vec::with_capacity(256),
        }
    }

    pub fn into_parts(self) -> (L, O, E) {
        (self.log, self.stdout.writer, self.stderr.writer)
    }
}

impl<L: Write, O: Write, E: Write> LineSink for TeeSink<L, O, E> {
    fn emit(&mut self, stream: Stream, message: &LineMessage) -> Result<()> {
        self.buf.clear();
        self.style.render(stream, message, true, &mut self.buf);
        self.log
            .write_all(&self.buf)
            .and_then(|()| self.log.flush())
            .map_err(EngineError::LogWrite)?;

        match stream {
            Stream::Stdout => self.stdout.write_line(&self.style, message, &mut self.buf),
            Stream::Stderr => self.stderr.write_line(&self.style, message, &mut self.buf),
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.log.flush().map_err(EngineError::LogWrite)
    }
}
