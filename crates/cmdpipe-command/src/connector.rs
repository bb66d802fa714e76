use std::time::Duration;

use cmdpipe_frame::{FrameConfig, FrameReader, FrameWriter};
use cmdpipe_transport::{ChannelName, TransportError, UnixDomainSocket};
use tracing::debug;

use crate::error::ClientError;

/// How long a client waits for a server to accept by default.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Send `command` to the server on `channel` and return its response text.
pub fn send(
    channel: &ChannelName,
    command: &str,
    connect_timeout: Duration,
) -> Result<String, ClientError> {
    send_with_config(channel, command, connect_timeout, &FrameConfig::default())
}

/// Send one command with explicit frame I/O timeouts.
///
/// Opens a fresh connection, waits at most `connect_timeout` for a server
/// worker to take it, writes one command frame, reads exactly one response
/// frame and closes.
pub fn send_with_config(
    channel: &ChannelName,
    command: &str,
    connect_timeout: Duration,
    frame_config: &FrameConfig,
) -> Result<String, ClientError> {
    let stream = UnixDomainSocket::connect_channel(channel, connect_timeout)
        .map_err(|err| connect_error(channel, err))?;
    let reader_stream = stream.try_clone().map_err(ClientError::Transport)?;

    let mut writer = FrameWriter::with_config_ipc(stream, frame_config)?;
    let mut reader = FrameReader::with_config_ipc(reader_stream, frame_config)?;

    let written = writer.write_text(command)?;
    writer
        .get_ref()
        .shutdown_write()
        .map_err(ClientError::Transport)?;
    debug!(%channel, written, "command sent");

    let response = reader.read_text()?;
    debug!(%channel, len = response.len(), "response received");
    Ok(response)
}

fn connect_error(channel: &ChannelName, err: TransportError) -> ClientError {
    match err {
        TransportError::ConnectTimeout { timeout, .. } => ClientError::ConnectTimeout {
            channel: channel.to_string(),
            timeout,
        },
        TransportError::ConnectionRefused { .. } => ClientError::ConnectionRefused {
            channel: channel.to_string(),
        },
        other => ClientError::Transport(other),
    }
}

/// Whether an exchange produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Ok,
    Failed,
}

/// Outcome of [`request`]: the response text, or the failure message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: ReplyStatus,
    pub text: String,
}

impl Reply {
    /// Process exit code for this outcome: `0` on success, `-1` otherwise.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            ReplyStatus::Ok => 0,
            ReplyStatus::Failed => -1,
        }
    }
}

/// Like [`send`], but every fault is folded into a failed [`Reply`].
pub fn request(channel: &ChannelName, command: &str, connect_timeout: Duration) -> Reply {
    match send(channel, command, connect_timeout) {
        Ok(text) => Reply {
            status: ReplyStatus::Ok,
            text,
        },
        Err(err) => Reply {
            status: ReplyStatus::Failed,
            text: err.to_string(),
        },
    }
}
