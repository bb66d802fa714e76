use std::io::{ErrorKind, Read, Write};
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use socket2::{Domain, SockAddr, Socket, Type};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::name::ChannelName;
use crate::traits::IpcStream;

/// Pause between connect attempts while the server backlog is full.
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Byte a server writes as soon as it takes a connection off the backlog.
///
/// A Unix socket connect completes once the kernel queues the connection, so
/// clients wait for this byte to know a server endpoint is actually serving
/// them.
pub const ACCEPT_MARKER: u8 = 0x06;

/// Unix domain socket transport.
///
/// Provides bind/accept/connect over filesystem-path UDS on Linux and macOS.
/// The socket file is removed via `Drop` when it still belongs to this
/// listener.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
    /// Whether the path should be removed on drop (filesystem sockets only).
    cleanup_on_drop: bool,
}

impl UnixDomainSocket {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(target_os = "macos")]
    const MAX_PATH_LEN: usize = 104;
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on a filesystem-path Unix domain socket.
    ///
    /// The socket file is created at `path`. If the file already exists and is
    /// a socket, it is removed first (stale socket cleanup).
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind and listen on a filesystem-path Unix domain socket with explicit mode.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Validate path length
        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        // Remove stale socket if it exists, but never remove non-socket files.
        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(&path).map_err(|e| TransportError::Bind {
                    path: path.clone(),
                    source: e,
                })?;
            } else {
                return Err(TransportError::Bind {
                    path: path.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                });
            }
        }

        let listener = UnixListener::bind(&path).map_err(|e| TransportError::Bind {
            path: path.clone(),
            source: e,
        })?;

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
            TransportError::Bind {
                path: path.clone(),
                source: e,
            }
        })?;
        let created_metadata =
            std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;
        let created_inode = Some((created_metadata.dev(), created_metadata.ino()));

        info!(?path, "listening on unix domain socket");

        Ok(Self {
            listener,
            path,
            created_inode,
            cleanup_on_drop: true,
        })
    }

    /// Bind the socket for a channel, creating its runtime directory if needed.
    pub fn bind_channel(channel: &ChannelName) -> Result<Self> {
        let dir = channel.dir();
        std::fs::create_dir_all(dir).map_err(|e| TransportError::Bind {
            path: dir.to_path_buf(),
            source: e,
        })?;
        Self::bind(channel.socket_path())
    }

    /// Accept an incoming connection (blocking) and send the accept marker.
    pub fn accept(&self) -> Result<IpcStream> {
        let (mut stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        stream
            .write_all(&[ACCEPT_MARKER])
            .map_err(TransportError::Accept)?;
        debug!("accepted connection");
        Ok(IpcStream::from_unix(stream))
    }

    /// Connect to a channel, waiting at most `timeout` for the server.
    pub fn connect_channel(channel: &ChannelName, timeout: Duration) -> Result<IpcStream> {
        Self::connect_timeout(channel.socket_path(), timeout)
    }

    /// Connect with a bounded wait.
    ///
    /// The wait covers both the connect itself and the server taking the
    /// connection (its [`ACCEPT_MARKER`]). A missing socket, a socket nobody
    /// listens on, or a listener that closes before accepting yields
    /// [`TransportError::ConnectionRefused`]. A server that does not accept
    /// within `timeout` yields [`TransportError::ConnectTimeout`].
    pub fn connect_timeout(path: impl AsRef<Path>, timeout: Duration) -> Result<IpcStream> {
        let path = path.as_ref();
        let connect_err = |source: std::io::Error| TransportError::Connect {
            path: path.to_path_buf(),
            source,
        };
        let address = SockAddr::unix(path).map_err(connect_err)?;
        let deadline = Instant::now() + timeout;

        let stream: UnixStream = loop {
            if Instant::now() >= deadline {
                return Err(TransportError::ConnectTimeout {
                    path: path.to_path_buf(),
                    timeout,
                });
            }

            // Unix sockets never report EINPROGRESS: a non-blocking connect either
            // completes or fails with EAGAIN while the accept backlog is full.
            let socket = Socket::new(Domain::UNIX, Type::STREAM, None).map_err(connect_err)?;
            socket.set_nonblocking(true).map_err(connect_err)?;

            match socket.connect(&address) {
                Ok(()) => {
                    socket.set_nonblocking(false).map_err(connect_err)?;
                    break socket.into();
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::NotFound | ErrorKind::ConnectionRefused
                    ) =>
                {
                    return Err(TransportError::ConnectionRefused {
                        path: path.to_path_buf(),
                    });
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    debug!(?path, "server backlog full; retrying connect");
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    std::thread::sleep(CONNECT_RETRY_INTERVAL.min(remaining));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(connect_err(err)),
            }
        };

        let stream = await_accept(stream, path, deadline, timeout)?;
        debug!(?path, "connected to unix domain socket");
        Ok(IpcStream::from_unix(stream))
    }

    /// Duplicate the listening socket handle.
    ///
    /// The clone shares the bound address; each clone may accept independently.
    pub fn try_clone_listener(&self) -> Result<UnixListener> {
        self.listener.try_clone().map_err(Into::into)
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Wait until `deadline` for the server's accept marker.
fn await_accept(
    mut stream: UnixStream,
    path: &Path,
    deadline: Instant,
    timeout: Duration,
) -> Result<UnixStream> {
    let connect_err = |source: std::io::Error| TransportError::Connect {
        path: path.to_path_buf(),
        source,
    };
    let refused = || TransportError::ConnectionRefused {
        path: path.to_path_buf(),
    };

    let mut marker = [0u8; 1];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(TransportError::ConnectTimeout {
                path: path.to_path_buf(),
                timeout,
            });
        }
        stream
            .set_read_timeout(Some(remaining))
            .map_err(connect_err)?;

        match stream.read(&mut marker) {
            Ok(1) if marker[0] == ACCEPT_MARKER => break,
            // Listener closed with the connection still queued.
            Ok(0) => return Err(refused()),
            Ok(_) => {
                return Err(connect_err(std::io::Error::new(
                    ErrorKind::InvalidData,
                    "unexpected accept marker",
                )))
            }
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                debug!(?path, "waiting for server to accept");
                continue;
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
                ) =>
            {
                return Err(refused())
            }
            Err(err) => return Err(connect_err(err)),
        }
    }

    stream.set_read_timeout(None).map_err(connect_err)?;
    Ok(stream)
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        if self.cleanup_on_drop {
            if let Some((expected_dev, expected_ino)) = self.created_inode {
                if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
                    if metadata.file_type().is_socket()
                        && metadata.dev() == expected_dev
                        && metadata.ino() == expected_ino
                    {
                        debug!(path = ?self.path, "cleaning up socket file");
                        let _ = std::fs::remove_file(&self.path);
                    } else {
                        debug!(
                            path = ?self.path,
                            "socket path identity changed; skipping cleanup"
                        );
                    }
                }
            }
        }
    }
}
