//! Pipe transport for t3.
//!
//! Provides the two OS facilities the capture pipeline is built on:
//! - anonymous pipes whose ends are close-on-exec, so a spawned command
//!   only inherits the ends it is explicitly handed
//! - a bounded readiness wait over several pipe handles
//!
//! This is the lowest layer of t3. Everything else builds on the
//! [`PipeReader`] and [`PipeWriter`] types provided here.

pub mod error;

#[cfg(unix)]
pub mod pipe;
#[cfg(unix)]
pub mod poll;

pub use error::{Result, TransportError};

#[cfg(unix)]
pub use pipe::{pipe, PipeReader, PipeWriter};
#[cfg(unix)]
pub use poll::{poll_readable, Readiness};
