use std::fmt;

use cmdpipe_command::{ClientError, RegistryError, ServerError};
use cmdpipe_transport::TransportError;

// Both binaries report success as 0 and every failure as -1.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = -1;

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

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(FAILURE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn stdout_error(err: std::io::Error) -> CliError {
    CliError::failure(format!("failed writing to stdout: {err}"))
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    CliError::failure(format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => CliError::failure(format!("{context}: {source}")),
        other => CliError::failure(format!("{context}: {other}")),
    }
}

pub fn server_error(context: &str, err: ServerError) -> CliError {
    match err {
        ServerError::Transport(err) => transport_error(context, err),
        other => CliError::failure(format!("{context}: {other}")),
    }
}

pub fn registry_error(context: &str, err: RegistryError) -> CliError {
    CliError::failure(format!("{context}: {err}"))
}
