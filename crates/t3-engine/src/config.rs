use std::time::Duration;

use t3_frame::{FrameConfig, DEFAULT_MAX_LINE_LENGTH};

/// Minimum age a queued line must reach before release while any stream is
/// still open.
pub const DEFAULT_HOLDBACK: Duration = Duration::from_millis(100);

/// Longest single wait for new messages.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Tuning shared by the capture workers and the merge engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub holdback: Duration,
    pub poll_interval: Duration,
    /// Lines longer than this are split into several messages.
    pub max_line_length: usize,
}

impl EngineConfig {
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_text_len: self.max_line_length,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            holdback: DEFAULT_HOLDBACK,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}
