//! Run a command and log its output with both streams merged in time order.
//!
//! t3 captures a command's stdout and stderr separately, stamps every line
//! with the time it was produced, and writes one time-ordered, colorized
//! log while still mirroring each line to the terminal stream it came from.
//!
//! # Crate Structure
//!
//! - [`transport`]: close-on-exec pipes and readiness polling
//! - [`frame`]: timestamped line messages and their wire framing
//! - [`engine`]: capture workers, the hold-back merge and rendering

/// Re-export transport types.
pub mod transport {
    pub use t3_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use t3_frame::*;
}

/// Re-export engine types.
pub mod engine {
    pub use t3_engine::*;
}
