//! One text command, one text response, over a named local channel.
//!
//! # Crate Structure
//!
//! - [`transport`]: Channel names and Unix domain socket transport
//! - [`frame`]: Length-prefixed UTF-16 text framing
//! - [`command`]: Command dispatch, bounded acceptor and client connector
//!
//! With the `cli` feature (default) the crate also builds the `cmdpipe`
//! client and `cmdpipe-server` binaries; the modules they share live here.

/// Re-export transport types.
pub mod transport {
    pub use cmdpipe_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use cmdpipe_frame::*;
}

/// Re-export command types.
pub mod command {
    pub use cmdpipe_command::*;
}

#[cfg(feature = "cli")]
pub mod cmd;
#[cfg(feature = "cli")]
pub mod duration;
#[cfg(feature = "cli")]
pub mod exit;
#[cfg(feature = "cli")]
pub mod logging;
#[cfg(feature = "cli")]
pub mod output;
