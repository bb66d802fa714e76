use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use cmdpipe_command::DEFAULT_CAPACITY;
use cmdpipe_transport::{default_runtime_dir, RUNTIME_DIR_ENV};

use crate::duration::parse_duration;

pub mod list;
pub mod send;
pub mod serve;

/// Where channel sockets live, shared by both binaries.
#[derive(Args, Debug, Clone, Default)]
pub struct RuntimeDirArgs {
    /// Directory holding channel sockets.
    #[arg(long, value_name = "DIR", env = RUNTIME_DIR_ENV)]
    pub runtime_dir: Option<PathBuf>,
}

impl RuntimeDirArgs {
    pub fn resolve(&self) -> PathBuf {
        self.runtime_dir.clone().unwrap_or_else(default_runtime_dir)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Channel name to serve. Default: a fresh `cmdpipe.<uuid>`.
    #[arg(long, short = 'n', value_name = "NAME")]
    pub name: Option<String>,

    /// Maximum number of connections served concurrently.
    #[arg(long, value_name = "N", env = "CMDPIPE_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
    pub capacity: usize,

    /// How long shutdown waits for in-flight exchanges (e.g. 5s, 500ms).
    #[arg(long, value_name = "DURATION", default_value = "5s", value_parser = parse_duration)]
    pub shutdown_grace: Duration,

    #[command(flatten)]
    pub runtime: RuntimeDirArgs,
}
