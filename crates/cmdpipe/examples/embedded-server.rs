//! Host a command server inside another program.
//!
//! Run with:
//!   cargo run --example embedded-server
//!
//! In another terminal, using the channel name printed on startup:
//!   cargo run --bin cmdpipe -- --name <channel> --command uptime

use std::time::Instant;

use cmdpipe::command::{generate_channel_name, CancellationToken, CommandServer};
use cmdpipe::transport::default_runtime_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let channel = generate_channel_name(default_runtime_dir())?;
    let mut server = CommandServer::with_default_commands(channel)?;

    let started = Instant::now();
    server.register_command("uptime", move || {
        Ok::<_, std::convert::Infallible>(format!("{:?}", started.elapsed()))
    })?;

    eprintln!("Serving channel {}", server.channel());
    eprintln!("Commands: {:?}", server.dispatcher().commands());

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    ctrlc::set_handler(move || on_ctrl_c.cancel())?;

    let report = server.start(4, cancel).await?;
    eprintln!("Stopped after starting {} workers", report.workers_started);
    Ok(())
}
