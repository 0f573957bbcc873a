/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x5433 \"T3\")")]
    InvalidMagic,

    /// The line text exceeds the configured maximum length.
    #[error("line text too long ({size} bytes, max {max})")]
    TextTooLong { size: usize, max: usize },

    /// The nanosecond field is outside `0..1_000_000_000`.
    #[error("invalid timestamp nanoseconds {nanos}")]
    InvalidTimestamp { nanos: u32 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel was closed before a complete frame was transferred.
    #[error("channel closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
