//! Channel identities and their resolution to local socket paths.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, TransportError};

/// Environment variable overriding the directory that holds channel sockets.
pub const RUNTIME_DIR_ENV: &str = "CMDPIPE_RUNTIME_DIR";

/// File suffix appended to a channel name to form its socket file name.
pub const SOCKET_SUFFIX: &str = ".sock";

/// Opaque name of a local command channel.
///
/// The name is chosen by the server at startup and handed to clients
/// out-of-band. It resolves to `<dir>/<name>.sock`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelName {
    name: String,
    dir: PathBuf,
}

impl ChannelName {
    /// Create a channel name resolved against [`default_runtime_dir`].
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::with_dir(name, default_runtime_dir())
    }

    /// Create a channel name resolved against an explicit directory.
    pub fn with_dir(name: impl Into<String>, dir: impl Into<PathBuf>) -> Result<Self> {
        let name = name.into();
        validate(&name)?;
        Ok(Self {
            name,
            dir: dir.into(),
        })
    }

    /// The channel name as given.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Directory holding the channel socket.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Filesystem path of the channel socket.
    pub fn socket_path(&self) -> PathBuf {
        self.dir.join(format!("{}{SOCKET_SUFFIX}", self.name))
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn validate(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        "name must not be blank"
    } else if name.contains('/') {
        "name must not contain '/'"
    } else if name.contains('\0') {
        "name must not contain NUL"
    } else {
        return Ok(());
    };
    Err(TransportError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Directory used for channel sockets when none is given explicitly.
///
/// Resolution order: `$CMDPIPE_RUNTIME_DIR`, `$XDG_RUNTIME_DIR`, then the
/// system temp directory.
pub fn default_runtime_dir() -> PathBuf {
    [RUNTIME_DIR_ENV, "XDG_RUNTIME_DIR"]
        .iter()
        .filter_map(std::env::var_os)
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

/// List channel names in `dir` whose name starts with `prefix`.
///
/// Matching is ASCII case-insensitive. Only entries that are sockets with the
/// channel suffix are reported. The result is sorted.
pub fn list_channels(dir: impl AsRef<Path>, prefix: &str) -> Result<Vec<String>> {
    let dir = dir.as_ref();
    let prefix = prefix.to_ascii_lowercase();
    let mut names = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !is_socket(&entry) {
            continue;
        }
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let Some(name) = file_name.strip_suffix(SOCKET_SUFFIX) else {
            continue;
        };
        if name.to_ascii_lowercase().starts_with(&prefix) {
            names.push(name.to_string());
        }
    }

    names.sort();
    debug!(dir = ?dir, count = names.len(), "listed channels");
    Ok(names)
}

#[cfg(unix)]
fn is_socket(entry: &std::fs::DirEntry) -> bool {
    use std::os::unix::fs::FileTypeExt;

    entry
        .file_type()
        .map(|file_type| file_type.is_socket())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_socket(_entry: &std::fs::DirEntry) -> bool {
    false
}
