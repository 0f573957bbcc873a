//! Concurrent capture and time-ordered merge of a command's output streams.
//!
//! One capture worker per stream turns raw bytes into timestamped line
//! messages. The merge engine queues them per stream and releases each line
//! only once it is old enough that no earlier line from the sibling stream
//! can still be in flight, then renders it to the log file and the matching
//! terminal stream.

pub mod config;
pub mod engine;
pub mod error;
pub mod framer;
pub mod palette;
pub mod queue;
pub mod render;
pub mod session;
pub mod sink;
pub mod worker;

pub use config::{EngineConfig, DEFAULT_HOLDBACK, DEFAULT_POLL_INTERVAL};
pub use engine::{MergeEngine, MergeSummary, Source};
pub use error::{EngineError, Result};
pub use framer::LineFramer;
pub use palette::{ColorScheme, Palette};
pub use queue::StreamQueues;
pub use render::{RenderStyle, TimestampMode};
pub use session::{run_session, SessionConfig};
pub use sink::{LineSink, TeeSink};
pub use t3_frame::{LineMessage, Stream, Timestamp};
pub use worker::{spawn_worker, CaptureWorker, WorkerHandle, WorkerSummary};
