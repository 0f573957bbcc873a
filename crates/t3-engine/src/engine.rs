use std::io::Read;
use std::os::fd::AsFd;

use t3_frame::{FrameError, FrameReader, LineMessage, Received, Stream, Timestamp};
use t3_transport::poll_readable;
use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::queue::StreamQueues;
use crate::sink::LineSink;
use crate::worker::WorkerHandle;

/// The receiving end of one stream's message channel and the worker
/// feeding it.
#[derive(Debug)]
pub struct Source<R> {
    stream: Stream,
    reader: Option<FrameReader<R>>,
    worker: Option<WorkerHandle>,
}

impl<R: Read + AsFd> Source<R> {
    pub fn new(stream: Stream, reader: FrameReader<R>, worker: Option<WorkerHandle>) -> Self {
        Self {
            stream,
            reader: Some(reader),
            worker,
        }
    }

    pub fn stream(&self) -> Stream {
        self.stream
    }

    /// Block until the worker's readiness signal arrives.
    ///
    /// Anything other than the exact signal for this stream, including the
    /// channel closing first, means the worker is unusable.
    pub fn confirm_ready(&mut self) -> Result<()> {
        let stream = self.stream;
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| EngineError::WorkerNotReady {
                stream,
                detail: "channel already closed".to_string(),
            })?;

        let first = reader.read_message().map_err(|err| {
            let detail = match err {
                FrameError::ConnectionClosed => "channel closed before readiness signal".to_string(),
                other => other.to_string(),
            };
            EngineError::WorkerNotReady { stream, detail }
        })?;

        if !first.is_readiness_for(stream) {
            return Err(EngineError::WorkerNotReady {
                stream,
                detail: format!(
                    "unexpected first message {:?}",
                    String::from_utf8_lossy(&first.text)
                ),
            });
        }

        debug!(%stream, "capture worker confirmed ready");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }
}

/// Per-stream line counts for a finished merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    released: [u64; 2],
}

impl MergeSummary {
    pub fn lines(&self, stream: Stream) -> u64 {
        self.released[stream.index()]
    }

    pub fn total(&self) -> u64 {
        self.released.iter().sum()
    }
}

/// Merges both streams' messages into one time-ordered sequence.
pub struct MergeEngine<R> {
    sources: [Source<R>; 2],
    queues: StreamQueues,
    config: EngineConfig,
    summary: MergeSummary,
}

impl<R: Read + AsFd> MergeEngine<R> {
    /// Build an engine over two sources whose readiness was already
    /// confirmed. Messages that arrived in the same read as the readiness
    /// signal are queued immediately since they will not wake a poll.
    pub fn new(stdout: Source<R>, stderr: Source<R>, config: &EngineConfig) -> Result<Self> {
        let mut engine = Self {
            sources: [stdout, stderr],
            queues: StreamQueues::new(config.holdback),
            config: config.clone(),
            summary: MergeSummary::default(),
        };

        for stream in Stream::ALL {
            let source = &mut engine.sources[stream.index()];
            if let Some(reader) = source.reader.as_mut() {
                for message in reader.buffered_messages()? {
                    engine.queues.push(stream, message);
                }
            }
        }

        Ok(engine)
    }

    /// Run until both channels are closed and every queued line was emitted.
    ///
    /// A channel that fails is closed on its own and the other keeps going.
    /// A sink failure or a poll failure ends the merge with an error.
    pub fn run<S: LineSink>(&mut self, sink: &mut S) -> Result<MergeSummary> {
        loop {
            let now = Timestamp::now();
            if self.release(now, sink)? > 0 {
                sink.flush()?;
            }

            if self.queues.is_finished() {
                break;
            }

            let timeout = self
                .queues
                .next_release_in(now)
                .map_or(self.config.poll_interval, |wait| {
                    wait.min(self.config.poll_interval)
                });

            let readiness = {
                let fds = self.sources.each_ref().map(|source| {
                    source
                        .reader
                        .as_ref()
                        .map(|reader| reader.get_ref().as_fd())
                });
                poll_readable(&fds, timeout)?
            };

            for stream in Stream::ALL {
                if readiness[stream.index()].is_ready() {
                    self.receive(stream);
                }
            }
        }

        debug!(
            stdout = self.summary.lines(Stream::Stdout),
            stderr = self.summary.lines(Stream::Stderr),
            "merge finished"
        );
        Ok(self.summary)
    }

    /// Join workers whose channels failed mid-stream.
    ///
    /// Such a worker may still be blocked reading command output, so this is
    /// only called once the command has exited.
    pub fn reap_lingering(&mut self) {
        for source in &mut self.sources {
            if let Some(worker) = source.worker.take() {
                worker.reap();
            }
        }
    }

    pub fn summary(&self) -> MergeSummary {
        self.summary
    }

    fn release<S: LineSink>(&mut self, now: Timestamp, sink: &mut S) -> Result<u64> {
        let mut released = 0;
        while let Some((stream, message)) = self.queues.pop_ready(now) {
            trace!(%stream, bytes = message.text.len(), "releasing line");
            sink.emit(stream, &message)?;
            self.summary.released[stream.index()] += 1;
            released += 1;
        }
        Ok(released)
    }

    fn receive(&mut self, stream: Stream) {
        let source = &mut self.sources[stream.index()];
        let Some(reader) = source.reader.as_mut() else {
            return;
        };

        match reader.read_available() {
            Ok(Received::Messages(messages)) => {
                trace!(%stream, count = messages.len(), "received messages");
                for message in messages {
                    self.queues.push(stream, message);
                }
            }
            Ok(Received::Closed) => {
                debug!(%stream, "message channel closed");
                source.reader = None;
                self.queues.close(stream);
                if let Some(worker) = source.worker.take() {
                    worker.reap();
                }
            }
            Err(err) => {
                warn!(%stream, error = %err, "message channel failed; closing stream");
                source.reader = None;
                self.queues.close(stream);
            }
        }
    }

    /// Number of channels still delivering messages.
    pub fn open_sources(&self) -> usize {
        self.sources.iter().filter(|source| source.is_open()).count()
    }
}

impl<R> std::fmt::Debug for MergeEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeEngine")
            .field("queues", &self.queues)
            .field("config", &self.config)
            .field("summary", &self.summary)
            .finish()
    }
}

/// Line sink that records what it was given, for tests and dry runs.
impl LineSink for Vec<(Stream, LineMessage)> {
    fn emit(&mut self, stream: Stream, message: &LineMessage) -> Result<()> {
        self.push((stream, message.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::{Duration, Instant};

    use t3_frame::FrameWriter;
    use t3_transport::{pipe, PipeReader, PipeWriter};

    use super::*;

    fn channel(stream: Stream) -> (Source<PipeReader>, FrameWriter<PipeWriter>) {
        let (read_end, write_end) = pipe().unwrap();
        (
            Source::new(stream, FrameReader::new(read_end), None),
            FrameWriter::new(write_end),
        )
    }

    fn ready_channel(stream: Stream) -> (Source<PipeReader>, FrameWriter<PipeWriter>) {
        let (mut source, mut writer) = channel(stream);
        writer.send(&LineMessage::readiness(stream)).unwrap();
        source.confirm_ready().unwrap();
        (source, writer)
    }

    fn texts(lines: &[(Stream, LineMessage)]) -> Vec<(Stream, String)> {
        lines
            .iter()
            .map(|(stream, m)| (*stream, String::from_utf8_lossy(&m.text).into_owned()))
            .collect()
    }

    #[test]
    fn confirm_ready_accepts_matching_signal() {
        let (mut source, mut writer) = channel(Stream::Stderr);
        writer.send(&LineMessage::readiness(Stream::Stderr)).unwrap();
        assert!(source.confirm_ready().is_ok());
    }

    #[test]
    fn confirm_ready_rejects_wrong_signal() {
        let (mut source, mut writer) = channel(Stream::Stdout);
        writer.send(&LineMessage::readiness(Stream::Stderr)).unwrap();

        let err = source.confirm_ready().unwrap_err();
        assert!(matches!(
            err,
            EngineError::WorkerNotReady {
                stream: Stream::Stdout,
                ..
            }
        ));
    }

    #[test]
    fn confirm_ready_rejects_closed_channel() {
        let (mut source, writer) = channel(Stream::Stdout);
        drop(writer);
        assert!(matches!(
            source.confirm_ready(),
            Err(EngineError::WorkerNotReady { .. })
        ));
    }

    #[test]
    fn lines_sent_with_readiness_are_not_stranded() {
        let (mut source, mut writer) = channel(Stream::Stdout);
        writer.send(&LineMessage::readiness(Stream::Stdout)).unwrap();
        writer.send(&LineMessage::new(Timestamp::now(), "early")).unwrap();
        writer.send(&LineMessage::new(Timestamp::now(), "also early")).unwrap();
        drop(writer);
        source.confirm_ready().unwrap();

        let (stderr, stderr_writer) = ready_channel(Stream::Stderr);
        drop(stderr_writer);

        let mut engine = MergeEngine::new(source, stderr, &EngineConfig::default()).unwrap();
        let mut out = Vec::new();
        let summary = engine.run(&mut out).unwrap();

        assert_eq!(
            texts(&out),
            vec![
                (Stream::Stdout, "early".to_string()),
                (Stream::Stdout, "also early".to_string()),
            ]
        );
        assert_eq!(summary.lines(Stream::Stdout), 2);
        assert_eq!(engine.open_sources(), 0);
    }

    #[test]
    fn late_delivery_within_holdback_is_reordered() {
        let (stdout, mut out_writer) = ready_channel(Stream::Stdout);
        let (stderr, mut err_writer) = ready_channel(Stream::Stderr);

        let producer = std::thread::spawn(move || {
            let earlier = Timestamp::now();
            std::thread::sleep(Duration::from_millis(10));
            err_writer
                .send(&LineMessage::new(Timestamp::now(), "stderr, produced later"))
                .unwrap();
            std::thread::sleep(Duration::from_millis(20));
            out_writer
                .send(&LineMessage::new(earlier, "stdout, produced first"))
                .unwrap();
            std::thread::sleep(Duration::from_millis(200));
        });

        let mut engine = MergeEngine::new(stdout, stderr, &EngineConfig::default()).unwrap();
        let mut out = Vec::new();
        engine.run(&mut out).unwrap();
        producer.join().unwrap();

        assert_eq!(
            texts(&out),
            vec![
                (Stream::Stdout, "stdout, produced first".to_string()),
                (Stream::Stderr, "stderr, produced later".to_string()),
            ]
        );
    }

    #[test]
    fn lines_are_released_before_channels_close() {
        let (stdout, mut out_writer) = ready_channel(Stream::Stdout);
        let (stderr, err_writer) = ready_channel(Stream::Stderr);

        let producer = std::thread::spawn(move || {
            out_writer
                .send(&LineMessage::new(Timestamp::now(), "prompt"))
                .unwrap();
            std::thread::sleep(Duration::from_millis(600));
            drop(err_writer);
        });

        let mut engine = MergeEngine::new(stdout, stderr, &EngineConfig::default()).unwrap();
        let mut sink = TimedSink::default();
        let start = Instant::now();
        engine.run(&mut sink).unwrap();
        producer.join().unwrap();

        assert_eq!(sink.at.len(), 1);
        assert!(sink.at[0] - start < Duration::from_millis(450));
    }

    #[test]
    fn equal_timestamps_release_stdout_first() {
        let (stdout, mut out_writer) = ready_channel(Stream::Stdout);
        let (stderr, mut err_writer) = ready_channel(Stream::Stderr);

        let ts = Timestamp::now();
        err_writer.send(&LineMessage::new(ts, "err")).unwrap();
        out_writer.send(&LineMessage::new(ts, "out")).unwrap();
        drop(err_writer);
        drop(out_writer);

        let mut engine = MergeEngine::new(stdout, stderr, &EngineConfig::default()).unwrap();
        let mut out = Vec::new();
        engine.run(&mut out).unwrap();

        assert_eq!(
            texts(&out),
            vec![
                (Stream::Stdout, "out".to_string()),
                (Stream::Stderr, "err".to_string()),
            ]
        );
    }

    #[test]
    fn corrupt_channel_closes_only_that_stream() {
        let (stdout, mut out_writer) = ready_channel(Stream::Stdout);
        let (stderr, err_writer) = ready_channel(Stream::Stderr);

        let mut raw = err_writer.into_inner();
        raw.write_all(&[0u8; 32]).unwrap();

        out_writer
            .send(&LineMessage::new(Timestamp::now(), "still here"))
            .unwrap();
        drop(out_writer);

        let mut engine = MergeEngine::new(stdout, stderr, &EngineConfig::default()).unwrap();
        let mut out = Vec::new();
        engine.run(&mut out).unwrap();
        drop(raw);

        assert_eq!(texts(&out), vec![(Stream::Stdout, "still here".to_string())]);
    }

    #[test]
    fn sink_failure_ends_the_merge() {
        let (stdout, mut out_writer) = ready_channel(Stream::Stdout);
        let (stderr, err_writer) = ready_channel(Stream::Stderr);
        out_writer
            .send(&LineMessage::new(Timestamp::now(), "doomed"))
            .unwrap();
        drop(out_writer);
        drop(err_writer);

        let mut engine = MergeEngine::new(stdout, stderr, &EngineConfig::default()).unwrap();
        let err = engine.run(&mut FailingSink).unwrap_err();
        assert!(matches!(err, EngineError::LogWrite(_)));
    }

    #[derive(Default)]
    struct TimedSink {
        at: Vec<Instant>,
    }

    impl LineSink for TimedSink {
        fn emit(&mut self, _stream: Stream, _message: &LineMessage) -> Result<()> {
            self.at.push(Instant::now());
            Ok(())
        }
    }

    struct FailingSink;

    impl LineSink for FailingSink {
        fn emit(&mut self, _stream: Stream, _message: &LineMessage) -> Result<()> {
            Err(EngineError::LogWrite(std::io::Error::other("disk full")))
        }
    }
}
