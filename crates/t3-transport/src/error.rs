/// Errors that can occur in pipe transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to create a pipe.
    #[error("failed to create pipe: {0}")]
    Pipe(std::io::Error),

    /// Waiting for readiness on the pipe handles failed.
    #[error("failed to poll pipes: {0}")]
    Poll(std::io::Error),

    /// An I/O error occurred on a pipe handle.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
