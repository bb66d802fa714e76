//! Async listener over a bound channel socket.
//!
//! The bound socket is owned once; workers each take a [`ChannelEndpoint`],
//! a duplicated handle of the same listening socket registered with the
//! tokio reactor. Any endpoint may accept the next pending client.

use std::path::Path;

use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::name::ChannelName;
use crate::uds::{UnixDomainSocket, ACCEPT_MARKER};

/// A bound channel socket that hands out per-worker endpoints.
pub struct AsyncUnixDomainSocket {
    socket: UnixDomainSocket,
}

impl AsyncUnixDomainSocket {
    /// Bind the socket for a channel.
    pub fn bind_channel(channel: &ChannelName) -> Result<Self> {
        Self::from_socket(UnixDomainSocket::bind_channel(channel)?)
    }

    /// Wrap an already bound socket.
    ///
    /// The listening socket is switched to non-blocking mode; blocking
    /// [`UnixDomainSocket::accept`] is no longer usable on it.
    pub fn from_socket(socket: UnixDomainSocket) -> Result<Self> {
        socket.try_clone_listener()?.set_nonblocking(true)?;
        Ok(Self { socket })
    }

    /// Create a new endpoint bound to the same channel.
    ///
    /// Must be called from within a tokio runtime.
    pub fn endpoint(&self) -> Result<ChannelEndpoint> {
        let listener = self.socket.try_clone_listener()?;
        listener.set_nonblocking(true)?;
        let listener = UnixListener::from_std(listener)?;
        Ok(ChannelEndpoint { listener })
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        self.socket.path()
    }
}

/// One worker's handle on a bound channel socket.
///
/// Dropping the endpoint releases only this handle; the socket stays bound
/// while its [`AsyncUnixDomainSocket`] lives.
#[derive(Debug)]
pub struct ChannelEndpoint {
    listener: UnixListener,
}

impl ChannelEndpoint {
    /// Wait for the next client connection and send it the accept marker.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (mut stream, _addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;
        stream
            .write_all(&[ACCEPT_MARKER])
            .await
            .map_err(TransportError::Accept)?;
        debug!("accepted connection");
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use tokio::io::AsyncReadExt;

    use super::*;

    fn unique_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "cmdpipe-async-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn endpoints_share_one_channel() {
        let dir = unique_dir("shared");
        let channel = ChannelName::with_dir("svc", &dir).unwrap();
        let socket = AsyncUnixDomainSocket::bind_channel(&channel).unwrap();
        let first = socket.endpoint().unwrap();
        let second = socket.endpoint().unwrap();

        let path = channel.socket_path();
        let client_a = tokio::spawn({
            let path = path.clone();
            async move {
                let mut stream = UnixStream::connect(path).await.unwrap();
                stream.write_all(b"a").await.unwrap();
            }
        });
        let mut served = first.accept().await.unwrap();
        let mut buf = [0u8; 1];
        served.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"a");
        client_a.await.unwrap();

        let client_b = tokio::spawn(async move {
            let mut stream = UnixStream::connect(path).await.unwrap();
            stream.write_all(b"b").await.unwrap();
        });
        let mut served = second.accept().await.unwrap();
        served.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"b");
        client_b.await.unwrap();

        drop((first, second));
        assert!(channel.socket_path().exists(), "endpoints do not own the socket");
        drop(socket);
        assert!(!channel.socket_path().exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_client_connects_through_endpoint() {
        let dir = unique_dir("marker");
        let channel = ChannelName::with_dir("svc", &dir).unwrap();
        let socket = AsyncUnixDomainSocket::bind_channel(&channel).unwrap();
        let endpoint = socket.endpoint().unwrap();

        let client_channel = channel.clone();
        let client = tokio::task::spawn_blocking(move || {
            UnixDomainSocket::connect_channel(&client_channel, Duration::from_secs(5)).map(drop)
        });
        let _served = endpoint.accept().await.unwrap();
        client.await.unwrap().expect("client should see the accept marker");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn accept_waits_for_a_client() {
        let dir = unique_dir("wait");
        let channel = ChannelName::with_dir("svc", &dir).unwrap();
        let socket = AsyncUnixDomainSocket::bind_channel(&channel).unwrap();
        let endpoint = socket.endpoint().unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(50), endpoint.accept()).await;
        assert!(pending.is_err(), "accept should still be waiting");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
