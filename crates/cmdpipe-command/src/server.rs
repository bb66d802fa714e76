use std::sync::Arc;

use cmdpipe_transport::ChannelName;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::acceptor::{AcceptorConfig, AcceptorReport, ConnectionAcceptor};
use crate::commands::register_default_commands;
use crate::dispatcher::{CommandDispatcher, HandlerError};
use crate::error::{RegistryError, Result};

/// Embedding entry point: a channel plus the commands served on it.
///
/// Commands are registered first; [`CommandServer::bind`] and
/// [`CommandServer::start`] consume the server and freeze the registry.
#[derive(Debug)]
pub struct CommandServer {
    channel: ChannelName,
    dispatcher: CommandDispatcher,
}

impl CommandServer {
    /// Create a server with no commands.
    pub fn new(channel: ChannelName) -> Self {
        Self {
            channel,
            dispatcher: CommandDispatcher::new(),
        }
    }

    /// Create a server with `echo`, `status`, `thread` and `file` registered.
    pub fn with_default_commands(channel: ChannelName) -> std::result::Result<Self, RegistryError> {
        let mut server = Self::new(channel);
        register_default_commands(&mut server.dispatcher)?;
        Ok(server)
    }

    /// The channel this server will listen on.
    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    /// Register an additional command.
    pub fn register_command<F, E>(
        &mut self,
        name: &str,
        handler: F,
    ) -> std::result::Result<(), RegistryError>
    where
        F: Fn() -> std::result::Result<String, E> + Send + Sync + 'static,
        E: Into<HandlerError>,
    {
        self.dispatcher.register(name, handler)
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Bind the channel and return an acceptor ready to run.
    pub fn bind(self, config: AcceptorConfig) -> Result<ConnectionAcceptor> {
        info!(
            channel = %self.channel,
            commands = ?self.dispatcher.commands(),
            "starting command server"
        );
        ConnectionAcceptor::bind(&self.channel, Arc::new(self.dispatcher), config)
    }

    /// Bind and serve with `capacity` workers until `cancel` fires.
    pub async fn start(self, capacity: usize, cancel: CancellationToken) -> Result<AcceptorReport> {
        let config = AcceptorConfig {
            capacity,
            ..AcceptorConfig::default()
        };
        self.bind(config)?.run(cancel).await
    }
}
