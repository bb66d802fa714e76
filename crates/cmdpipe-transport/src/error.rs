use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur in IPC transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The channel name cannot be used as a local endpoint identity.
    #[error("invalid channel name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// Failed to bind to the specified address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No server endpoint exists for the address, or nobody is listening on it.
    #[error("connection refused: no channel listening at {path}")]
    ConnectionRefused { path: PathBuf },

    /// No server accepted the connection within the allowed wait.
    #[error("timed out after {timeout:?} connecting to {path}")]
    ConnectTimeout { path: PathBuf, timeout: Duration },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;
