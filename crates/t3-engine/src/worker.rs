use std::io::{ErrorKind, Read, Write};
use std::thread::JoinHandle;

use t3_frame::{FrameWriter, LineMessage, Stream, Timestamp};
use tracing::{debug, error, trace, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::framer::LineFramer;

const READ_CHUNK_SIZE: usize = 4096;

/// Counters reported by a worker when it finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub lines: u64,
    pub bytes: u64,
    pub splits: u64,
}

/// Turns one raw output stream into timestamped line messages.
///
/// The worker owns both its input and its message channel; returning from
/// [`CaptureWorker::run`] drops the channel, which is how the merge engine
/// learns the stream is exhausted.
pub struct CaptureWorker<R, W> {
    stream: Stream,
    source: R,
    channel: FrameWriter<W>,
    framer: LineFramer,
    summary: WorkerSummary,
}

impl<R: Read, W: Write> CaptureWorker<R, W> {
    pub fn new(stream: Stream, source: R, channel: W, config: &EngineConfig) -> Self {
        Self {
            stream,
            source,
            channel: FrameWriter::with_config(channel, config.frame_config()),
            framer: LineFramer::new(stream, config.max_line_length),
            summary: WorkerSummary::default(),
        }
    }

    /// Capture until end of input.
    ///
    /// Sends the readiness signal first. A read failure ends capture like
    /// end-of-file does; a channel failure stops the worker at once since
    /// nothing more can be delivered.
    pub fn run(mut self) -> Result<WorkerSummary> {
        self.channel.send(&LineMessage::readiness(self.stream))?;
        debug!(stream = %self.stream, "capture worker started");

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = match self.source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    error!(stream = %self.stream, error = %err, "failed reading command output");
                    break;
                }
            };

            let now = Timestamp::now();
            self.summary.bytes += read as u64;
            trace!(stream = %self.stream, bytes = read, "read chunk");

            for line in self.framer.push(&chunk[..read], now) {
                self.forward(&line)?;
            }
        }

        if let Some(line) = self.framer.finish(Timestamp::now()) {
            self.forward(&line)?;
        }

        self.summary.splits = self.framer.splits();
        debug!(stream = %self.stream, lines = self.summary.lines, "capture worker finished");
        Ok(self.summary)
    }

    fn forward(&mut self, line: &LineMessage) -> Result<()> {
        self.channel.send(line).inspect_err(|err| {
            error!(stream = %self.stream, error = %err, "failed sending line to merge engine");
        })?;
        self.summary.lines += 1;
        Ok(())
    }
}

/// A running worker thread, reaped exactly once.
#[derive(Debug)]
pub struct WorkerHandle {
    stream: Stream,
    handle: JoinHandle<Result<WorkerSummary>>,
}

impl WorkerHandle {
    pub fn stream(&self) -> Stream {
        self.stream
    }

    /// Wait for the thread to exit and log how it ended.
    pub fn reap(self) -> Option<WorkerSummary> {
        match self.handle.join() {
            Ok(Ok(summary)) => {
                debug!(
                    stream = %self.stream,
                    lines = summary.lines,
                    bytes = summary.bytes,
                    splits = summary.splits,
                    "reaped capture worker"
                );
                Some(summary)
            }
            Ok(Err(err)) => {
                warn!(stream = %self.stream, error = %err, "capture worker failed");
                None
            }
            Err(_) => {
                error!(stream = %self.stream, "capture worker panicked");
                None
            }
        }
    }
}

/// Start a named capture thread for `stream`.
pub fn spawn_worker<R, W>(
    stream: Stream,
    source: R,
    channel: W,
    config: &EngineConfig,
) -> Result<WorkerHandle>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let worker = CaptureWorker::new(stream, source, channel, config);
    let handle = std::thread::Builder::new()
        .name(format!("t3-{stream}"))
        .spawn(move || worker.run())
        .map_err(|source| EngineError::WorkerSpawn { stream, source })?;
    Ok(WorkerHandle { stream, handle })
}
