use std::time::Duration;

use cmdpipe_frame::FrameError;
use cmdpipe_transport::TransportError;

/// Errors raised while building the command registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The command name is empty or whitespace only.
    #[error("command name cannot be null or blank")]
    InvalidName,

    /// A command with the same case-folded name already exists.
    #[error("command {0:?} is already registered")]
    Duplicate(String),
}

/// Errors that stop a server or one of its workers.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The acceptor was configured without any connection slot.
    #[error("capacity must be at least 1")]
    InvalidCapacity,

    /// The slot pool was closed while the acceptor was admitting workers.
    #[error("connection slot pool closed")]
    SlotsClosed,

    /// A dispatch running on the blocking pool did not complete.
    #[error("dispatch task failed: {0}")]
    Dispatch(#[from] tokio::task::JoinError),
}

/// Errors reported by the client connector.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No server accepted the connection within the allowed wait.
    #[error("timed out after {timeout:?} connecting to channel {channel}")]
    ConnectTimeout { channel: String, timeout: Duration },

    /// The channel does not exist or nobody is listening on it.
    #[error("connection refused: channel {channel} does not exist")]
    ConnectionRefused { channel: String },

    /// Other transport failure.
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// The exchange failed mid-frame.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

pub type Result<T> = std::result::Result<T, ServerError>;
