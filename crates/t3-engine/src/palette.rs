//! ANSI styling for rendered lines.

use t3_frame::Stream;

pub const INDIGO_400: &str = "\x1b[38;5;99m";
pub const INDIGO_300: &str = "\x1b[38;5;141m";
pub const YELLOW_400: &str = "\x1b[38;5;214m";
pub const YELLOW_300: &str = "\x1b[38;5;220m";
pub const AMBER_400: &str = "\x1b[38;5;130m";
pub const AMBER_300: &str = "\x1b[38;5;166m";
pub const ORANGE_400: &str = "\x1b[38;5;166m";
pub const ORANGE_300: &str = "\x1b[38;5;130m";
pub const BOLD: &str = "\x1b[1m";
pub const RESET: &str = "\x1b[0m";

/// Built-in color schemes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorScheme {
    #[default]
    Default,
    /// Tuned for light terminal backgrounds.
    Light,
    /// Tuned for dark terminal backgrounds.
    Dark,
    /// Stderr in bold, no colors.
    Bold,
    /// No escape sequences at all.
    Plain,
}

/// Escape strings applied around each part of a rendered line.
///
/// An empty string means "no markup" for that part; the reset sequence is
/// only emitted after a non-empty one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub out: String,
    pub err: String,
    pub timestamp: String,
    pub reset: String,
}

impl Palette {
    pub fn for_scheme(scheme: ColorScheme) -> Self {
        let (err, timestamp) = match scheme {
            ColorScheme::Default => (format!("{BOLD}{AMBER_400}"), INDIGO_300),
            ColorScheme::Light => (format!("{BOLD}{AMBER_400}"), INDIGO_400),
            ColorScheme::Dark => (format!("{BOLD}{YELLOW_300}"), INDIGO_300),
            ColorScheme::Bold => (BOLD.to_string(), ""),
            ColorScheme::Plain => (String::new(), ""),
        };
        let reset = if scheme == ColorScheme::Plain { "" } else { RESET };
        Self {
            out: String::new(),
            err,
            timestamp: timestamp.to_string(),
            reset: reset.to_string(),
        }
    }

    /// Replace the stdout color with a caller-supplied escape string.
    pub fn with_out(mut self, escape: impl Into<String>) -> Self {
        self.out = escape.into();
        self
    }

    /// Replace the stderr color with a caller-supplied escape string.
    pub fn with_err(mut self, escape: impl Into<String>) -> Self {
        self.err = escape.into();
        self
    }

    pub fn color_for(&self, stream: Stream) -> &str {
        match stream {
            Stream::Stdout => &self.out,
            Stream::Stderr => &self.err,
        }
    }

    /// True when this palette never emits an escape sequence.
    pub fn is_plain(&self) -> bool {
        self.out.is_empty() && self.err.is_empty() && self.timestamp.is_empty()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::for_scheme(ColorScheme::Default)
    }
}
