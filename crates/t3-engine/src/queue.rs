use std::collections::VecDeque;
use std::time::Duration;

use t3_frame::{LineMessage, Stream, Timestamp};

/// Per-stream FIFOs of lines awaiting release, plus the hold-back policy.
///
/// While any stream is open a head is released only once it is at least
/// `holdback` old, giving a late line from the sibling stream time to
/// arrive. Once every stream is closed nothing else can arrive and all
/// queued lines are released in timestamp order. Between two releasable
/// heads the older one goes first; equal timestamps favour stdout.
#[derive(Debug)]
pub struct StreamQueues {
    queues: [VecDeque<LineMessage>; 2],
    open: [bool; 2],
    holdback: Duration,
}

impl StreamQueues {
    pub fn new(holdback: Duration) -> Self {
        Self {
            queues: [VecDeque::new(), VecDeque::new()],
            open: [true, true],
            holdback,
        }
    }

    /// Append a line in arrival order.
    pub fn push(&mut self, stream: Stream, message: LineMessage) {
        self.queues[stream.index()].push_back(message);
    }

    /// Mark `stream` as closed. Returns false if it already was.
    pub fn close(&mut self, stream: Stream) -> bool {
        std::mem::replace(&mut self.open[stream.index()], false)
    }

    pub fn is_open(&self, stream: Stream) -> bool {
        self.open[stream.index()]
    }

    pub fn open_count(&self) -> usize {
        self.open.iter().filter(|open| **open).count()
    }

    pub fn len(&self, stream: Stream) -> usize {
        self.queues[stream.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(VecDeque::is_empty)
    }

    /// Both streams closed and fully drained.
    pub fn is_finished(&self) -> bool {
        self.open_count() == 0 && self.is_empty()
    }

    /// Remove and return the next line that may be rendered at `now`.
    pub fn pop_ready(&mut self, now: Timestamp) -> Option<(Stream, LineMessage)> {
        let stdout = self.ready_head(Stream::Stdout, now);
        let stderr = self.ready_head(Stream::Stderr, now);

        let stream = match (stdout, stderr) {
            (Some(out), Some(err)) => {
                if out <= err {
                    Stream::Stdout
                } else {
                    Stream::Stderr
                }
            }
            (Some(_), None) => Stream::Stdout,
            (None, Some(_)) => Stream::Stderr,
            (None, None) => return None,
        };

        self.queues[stream.index()]
            .pop_front()
            .map(|message| (stream, message))
    }

    /// How long until the oldest queued head becomes releasable.
    ///
    /// `None` when nothing is queued. Zero when something is ready now.
    pub fn next_release_in(&self, now: Timestamp) -> Option<Duration> {
        self.queues
            .iter()
            .filter_map(VecDeque::front)
            .map(|head| {
                if self.open_count() == 0 {
                    return Duration::ZERO;
                }
                head.timestamp
                    .saturating_add(self.holdback)
                    .saturating_elapsed_since(now)
            })
            .min()
    }

    fn ready_head(&self, stream: Stream, now: Timestamp) -> Option<Timestamp> {
        let head = self.queues[stream.index()].front()?;
        if self.open_count() == 0 || now.saturating_elapsed_since(head.timestamp) >= self.holdback
        {
            Some(head.timestamp)
        } else {
            None
        }
    }
}
