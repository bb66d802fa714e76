//! Named local channel transport for cmdpipe.
//!
//! A channel is identified by an opaque name ([`ChannelName`]) that resolves
//! to a Unix domain socket inside a runtime directory. This crate provides:
//! - Blocking bind/accept/connect, with a connect wait bounded until a
//!   server accepts
//! - An async listener (feature `async`) that hands out one endpoint per worker
//! - Enumeration of existing channel names
//!
//! This is the lowest layer of cmdpipe. Everything else builds on top of
//! the [`IpcStream`] type provided here.

pub mod error;
pub mod name;
pub mod traits;

#[cfg(unix)]
pub mod uds;

#[cfg(all(unix, feature = "async"))]
pub mod async_uds;

pub use error::{Result, TransportError};
pub use name::{default_runtime_dir, list_channels, ChannelName, RUNTIME_DIR_ENV, SOCKET_SUFFIX};
pub use traits::IpcStream;

#[cfg(unix)]
pub use uds::{UnixDomainSocket, ACCEPT_MARKER};

#[cfg(all(unix, feature = "async"))]
pub use async_uds::{AsyncUnixDomainSocket, ChannelEndpoint};
