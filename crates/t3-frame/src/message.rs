use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::stream::Stream;

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// A wall-clock instant with nanosecond resolution.
///
/// Ordering is lexicographic on (seconds, nanoseconds). Seconds are relative
/// to the Unix epoch and may be negative for pre-epoch clocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    secs: i64,
    nanos: u32,
}

impl Timestamp {
    /// The zero instant, reserved for readiness signals.
    pub const ZERO: Timestamp = Timestamp { secs: 0, nanos: 0 };

    /// Build a timestamp, rejecting out-of-range nanoseconds.
    pub fn from_parts(secs: i64, nanos: u32) -> Option<Self> {
        (nanos < NANOS_PER_SEC).then_some(Self { secs, nanos })
    }

    /// Read the wall clock.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(since) => Self {
                secs: since.as_secs() as i64,
                nanos: since.subsec_nanos(),
            },
            Err(err) => {
                let before = err.duration();
                let mut secs = -(before.as_secs() as i64);
                let mut nanos = before.subsec_nanos();
                if nanos > 0 {
                    secs -= 1;
                    nanos = NANOS_PER_SEC - nanos;
                }
                Self { secs, nanos }
            }
        }
    }

    pub fn to_system_time(self) -> SystemTime {
        if self.secs >= 0 {
            UNIX_EPOCH + Duration::new(self.secs as u64, self.nanos)
        } else {
            UNIX_EPOCH - Duration::from_secs(self.secs.unsigned_abs())
                + Duration::from_nanos(u64::from(self.nanos))
        }
    }

    pub fn secs(self) -> i64 {
        self.secs
    }

    pub fn nanos(self) -> u32 {
        self.nanos
    }

    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }

    /// Time elapsed from `earlier` to `self`, or zero if `earlier` is later.
    pub fn saturating_elapsed_since(self, earlier: Timestamp) -> Duration {
        if self <= earlier {
            return Duration::ZERO;
        }
        let mut secs = self.secs - earlier.secs;
        let nanos = if self.nanos >= earlier.nanos {
            self.nanos - earlier.nanos
        } else {
            secs -= 1;
            self.nanos + NANOS_PER_SEC - earlier.nanos
        };
        Duration::new(secs as u64, nanos)
    }

    /// The instant `duration` after `self`.
    pub fn saturating_add(self, duration: Duration) -> Timestamp {
        let mut secs = self
            .secs
            .saturating_add(i64::try_from(duration.as_secs()).unwrap_or(i64::MAX));
        let mut nanos = self.nanos + duration.subsec_nanos();
        if nanos >= NANOS_PER_SEC {
            nanos -= NANOS_PER_SEC;
            secs = secs.saturating_add(1);
        }
        Timestamp { secs, nanos }
    }
}

/// One captured line, stamped when its terminating newline was observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMessage {
    pub timestamp: Timestamp,
    /// Line content without the newline. Not required to be UTF-8.
    pub text: Bytes,
}

impl LineMessage {
    pub fn new(timestamp: Timestamp, text: impl Into<Bytes>) -> Self {
        Self {
            timestamp,
            text: text.into(),
        }
    }

    /// The readiness signal a worker sends before any line data.
    pub fn readiness(stream: Stream) -> Self {
        Self::new(Timestamp::ZERO, format!("{} started", stream.name()))
    }

    /// True if this is exactly the readiness signal for `stream`.
    pub fn is_readiness_for(&self, stream: Stream) -> bool {
        self.timestamp.is_zero() && self.text == format!("{} started", stream.name()).as_bytes()
    }
}
