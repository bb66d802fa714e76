/// Errors that can occur while reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was transferred.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// The operation was cancelled; the stream is left mid-frame.
    #[error("frame operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, FrameError>;
