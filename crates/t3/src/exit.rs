use std::fmt;
use std::io;
use std::process::ExitStatus;

use t3_engine::EngineError;
use t3_frame::FrameError;
use t3_transport::TransportError;

// Shell conventions: 126/127 for exec failures, 125 for our own failures.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const INTERNAL: i32 = 125;
pub const NOT_EXECUTABLE: i32 = 126;
pub const NOT_FOUND: i32 = 127;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// The code t3 exits with once the command has finished.
///
/// The command's own code when it exited normally, `FAILURE` when a signal
/// killed it.
pub fn exit_code(status: ExitStatus) -> i32 {
    if status.success() {
        return SUCCESS;
    }
    status.code().unwrap_or(FAILURE)
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound => NOT_FOUND,
        io::ErrorKind::PermissionDenied => NOT_EXECUTABLE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    CliError::new(INTERNAL, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    CliError::new(INTERNAL, format!("{context}: {err}"))
}

pub fn engine_error(err: EngineError) -> CliError {
    match err {
        EngineError::Spawn { command, source } => io_error(&command, source),
        EngineError::Transport(err) => transport_error("pipe setup failed", err),
        EngineError::Frame(err) => frame_error("message channel failed", err),
        other => CliError::new(INTERNAL, other.to_string()),
    }
}
