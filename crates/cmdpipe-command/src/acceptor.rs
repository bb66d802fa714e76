//! Bounded-concurrency connection acceptor.
//!
//! The admission loop acquires one connection slot per worker. Each worker
//! owns an endpoint on the channel and serves connections one after another
//! (read request, dispatch, write response, disconnect) until it is
//! cancelled or an exchange fails. A worker holds its slot for its whole
//! lifetime and gives it back exactly once when it exits, whatever the
//! reason; a faulted worker is thereby replaced by the admission loop.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cmdpipe_frame::{AsyncFrameReader, AsyncFrameWriter};
use cmdpipe_transport::{AsyncUnixDomainSocket, ChannelEndpoint, ChannelName};
use tokio::net::UnixStream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use crate::dispatcher::CommandDispatcher;
use crate::error::{Result, ServerError};
use crate::id::worker_id;

/// Default number of concurrent workers.
pub const DEFAULT_CAPACITY: usize = 2;

/// Acceptor tuning.
#[derive(Debug, Clone)]
pub struct AcceptorConfig {
    /// Maximum number of live workers. Must be at least 1.
    pub capacity: usize,
    /// How long shutdown waits for workers still finishing an exchange.
    pub shutdown_grace: Duration,
}

impl Default for AcceptorConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Summary returned when the acceptor stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptorReport {
    /// Workers spawned over the acceptor's lifetime, replacements included.
    pub workers_started: u64,
}

/// Admits up to `capacity` workers on one bound channel.
pub struct ConnectionAcceptor {
    socket: AsyncUnixDomainSocket,
    dispatcher: Arc<CommandDispatcher>,
    config: AcceptorConfig,
}

impl ConnectionAcceptor {
    /// Bind `channel` and prepare to serve it.
    pub fn bind(
        channel: &ChannelName,
        dispatcher: Arc<CommandDispatcher>,
        config: AcceptorConfig,
    ) -> Result<Self> {
        if config.capacity == 0 {
            return Err(ServerError::InvalidCapacity);
        }
        let socket = AsyncUnixDomainSocket::bind_channel(channel)?;
        Ok(Self {
            socket,
            dispatcher,
            config,
        })
    }

    /// Bound socket path.
    pub fn path(&self) -> &Path {
        self.socket.path()
    }

    /// Run the admission loop until `cancel` fires.
    ///
    /// Failing to create a worker endpoint is fatal: the error is returned
    /// after the live workers are shut down. Worker faults are not.
    pub async fn run(self, cancel: CancellationToken) -> Result<AcceptorReport> {
        let slots = Arc::new(Semaphore::new(self.config.capacity));
        let mut workers = JoinSet::new();
        let mut workers_started = 0u64;

        info!(
            path = ?self.socket.path(),
            capacity = self.config.capacity,
            "accepting connections"
        );

        let outcome = loop {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => break Ok(()),
                permit = Arc::clone(&slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break Err(ServerError::SlotsClosed),
                },
            };

            while workers.try_join_next().is_some() {}

            let endpoint = match self.socket.endpoint() {
                Ok(endpoint) => endpoint,
                Err(err) => {
                    error!(error = %err, "failed to create channel endpoint");
                    break Err(err.into());
                }
            };

            let worker = Worker {
                id: worker_id(),
                dispatcher: Arc::clone(&self.dispatcher),
                cancel: cancel.clone(),
            };
            trace!(worker = %worker.id, "worker start");
            workers.spawn(worker.run(endpoint, permit));
            workers_started += 1;
        };

        cancel.cancel();
        self.drain(workers).await;
        info!(workers_started, "acceptor stopped");

        outcome.map(|()| AcceptorReport { workers_started })
    }

    async fn drain(&self, mut workers: JoinSet<()>) {
        let grace = self.config.shutdown_grace;
        let drained = tokio::time::timeout(grace, async {
            while workers.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = workers.len(),
                ?grace,
                "aborting workers still serving after shutdown grace"
            );
            workers.shutdown().await;
        }
    }
}

/// Why a worker stopped serving.
enum WorkerExit {
    Cancelled { served: u64 },
    Faulted { served: u64, error: ServerError },
}

struct Worker {
    id: String,
    dispatcher: Arc<CommandDispatcher>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self, endpoint: ChannelEndpoint, permit: OwnedSemaphorePermit) {
        let span = info_span!("worker", id = %self.id);
        async move {
            match self.serve(&endpoint).await {
                WorkerExit::Cancelled { served } => {
                    debug!(served, "worker shutting down");
                }
                WorkerExit::Faulted { served, error } => {
                    error!(served, error = %error, "worker failed");
                }
            }
            drop(endpoint);
            drop(permit);
            trace!("worker terminating");
        }
        .instrument(span)
        .await;
    }

    async fn serve(&self, endpoint: &ChannelEndpoint) -> WorkerExit {
        let mut served = 0u64;
        loop {
            debug!("waiting for connection");
            let accepted = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return WorkerExit::Cancelled { served },
                accepted = endpoint.accept() => accepted,
            };

            let result = match accepted {
                Ok(stream) => self.exchange(stream).await,
                Err(err) => Err(err.into()),
            };
            if let Err(error) = result {
                return WorkerExit::Faulted { served, error };
            }
            served += 1;
        }
    }

    /// One request/response exchange. Not cancellable once the client is connected.
    async fn exchange(&self, stream: UnixStream) -> Result<()> {
        let (read_half, write_half) = stream.into_split();
        let mut reader = AsyncFrameReader::new(read_half);
        let mut writer = AsyncFrameWriter::new(write_half);

        let request = reader.read_text().await?;
        let dispatcher = Arc::clone(&self.dispatcher);
        let response = tokio::task::spawn_blocking(move || {
            dispatcher.execute(Some(request.as_str()))
        })
        .await?;

        writer.write_text(&response).await?;
        writer.shutdown().await?;
        debug!("client served");
        Ok(())
    }
}
