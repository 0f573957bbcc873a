use chrono::{DateTime, Local};
use t3_frame::{LineMessage, Stream, Timestamp};

use crate::palette::Palette;

/// How line timestamps are printed, if at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampMode {
    #[default]
    Off,
    /// Local wall-clock time of day.
    Absolute,
    /// Time elapsed since the session started.
    Relative,
}

/// Everything needed to turn a line message into output bytes.
#[derive(Debug, Clone)]
pub struct RenderStyle {
    pub palette: Palette,
    pub timestamps: TimestampMode,
    /// Reference instant for relative timestamps.
    pub start: Timestamp,
}

impl RenderStyle {
    pub fn new(palette: Palette, timestamps: TimestampMode, start: Timestamp) -> Self {
        Self {
            palette,
            timestamps,
            start,
        }
    }

    /// `HH:MM:SS.uuuuuu`, or `None` when timestamps are off.
    pub fn format_timestamp(&self, ts: Timestamp) -> Option<String> {
        match self.timestamps {
            TimestampMode::Off => None,
            TimestampMode::Absolute => {
                let local: DateTime<Local> = ts.to_system_time().into();
                Some(local.format("%H:%M:%S%.6f").to_string())
            }
            TimestampMode::Relative => {
                let elapsed = ts.saturating_elapsed_since(self.start);
                let secs = elapsed.as_secs();
                Some(format!(
                    "{:02}:{:02}:{:02}.{:06}",
                    secs / 3600,
                    secs / 60 % 60,
                    secs % 60,
                    elapsed.subsec_micros()
                ))
            }
        }
    }

    /// Append one rendered line, newline included, to `out`.
    ///
    /// With `colored` set the line carries the palette's escape sequences;
    /// otherwise it is the timestamp and text alone.
    pub fn render(&self, stream: Stream, message: &LineMessage, colored: bool, out: &mut Vec<u8>) {
        if let Some(ts) = self.format_timestamp(message.timestamp) {
            if colored {
                wrap(out, &self.palette.timestamp, &self.palette.reset, |out| {
                    out.extend_from_slice(ts.as_bytes());
                    out.push(b' ');
                });
            } else {
                out.extend_from_slice(ts.as_bytes());
                out.push(b' ');
            }
        }

        if colored {
            wrap(out, self.palette.color_for(stream), &self.palette.reset, |out| {
                out.extend_from_slice(&message.text);
            });
        } else {
            out.extend_from_slice(&message.text);
        }
        out.push(b'\n');
    }
}

fn wrap(out: &mut Vec<u8>, color: &str, reset: &str, body: impl FnOnce(&mut Vec<u8>)) {
    if color.is_empty() {
        body(out);
        return;
    }
    out.extend_from_slice(color.as_bytes());
    body(out);
    out.extend_from_slice(reset.as_bytes());
}
