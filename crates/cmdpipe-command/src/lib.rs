//! Command exchange over a named local channel.
//!
//! A server registers text-producing commands, then admits a bounded number
//! of workers that each serve an unbounded sequence of connections. A client
//! connects, sends one command frame, reads one response frame and closes.
//!
//! Command-level problems (blank name, unknown name, failing handler) are
//! answered with ordinary response text; they are never transport errors.

pub mod acceptor;
pub mod commands;
pub mod connector;
pub mod dispatcher;
pub mod error;
pub mod id;
pub mod server;

pub use acceptor::{AcceptorConfig, AcceptorReport, ConnectionAcceptor, DEFAULT_CAPACITY};
pub use commands::register_default_commands;
pub use connector::{request, send, send_with_config, Reply, ReplyStatus, DEFAULT_CONNECT_TIMEOUT};
pub use dispatcher::{
    CommandDispatcher, Dispatch, HandlerError, BLANK_NAME_RESPONSE, NOT_FOUND_RESPONSE,
};
pub use error::{ClientError, RegistryError, Result, ServerError};
pub use id::{generate_channel_name, to_base62, worker_id};
pub use server::CommandServer;

pub use cmdpipe_transport::ChannelName;
pub use tokio_util::sync::CancellationToken;
