use std::path::PathBuf;

use t3_frame::Stream;

/// Errors that can occur while capturing and merging output.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Pipe or poll failure.
    #[error("transport error: {0}")]
    Transport(#[from] t3_transport::TransportError),

    /// Message channel failure.
    #[error("frame error: {0}")]
    Frame(#[from] t3_frame::FrameError),

    /// The log file could not be opened.
    #[error("failed to open log file {}: {source}", path.display())]
    LogOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing the log file failed.
    #[error("failed to write log file: {0}")]
    LogWrite(std::io::Error),

    /// A capture worker thread could not be started.
    #[error("failed to start {stream} worker: {source}")]
    WorkerSpawn {
        stream: Stream,
        source: std::io::Error,
    },

    /// A capture worker did not confirm it is running.
    #[error("{stream} worker not ready: {detail}")]
    WorkerNotReady { stream: Stream, detail: String },

    /// The command could not be executed.
    #[error("failed to execute {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// Waiting for the command to exit failed.
    #[error("failed to wait for command: {0}")]
    Wait(std::io::Error),

    /// No command was given.
    #[error("no command to run")]
    EmptyCommand,
}

pub type Result<T> = std::result::Result<T, EngineError>;
