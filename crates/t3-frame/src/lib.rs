//! Timestamped line messages and their wire framing.
//!
//! Capture workers send every completed line to the merge engine as one
//! frame:
//! - A 2-byte magic number ("T3") for stream synchronization
//! - The capture timestamp as 8-byte seconds and 4-byte nanoseconds
//! - A 4-byte little-endian text length
//!
//! Readers always hand out complete messages; partial reads stay buffered.

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod stream;
pub mod writer;

pub use codec::{
    decode_message, encode_message, FrameConfig, DEFAULT_MAX_LINE_LENGTH, HEADER_SIZE, MAGIC,
};
pub use error::{FrameError, Result};
pub use message::{LineMessage, Timestamp};
pub use reader::{FrameReader, Received};
pub use stream::Stream;
pub use writer::FrameWriter;
