use cmdpipe_command::{
    generate_channel_name, AcceptorConfig, CancellationToken, ChannelName, CommandServer,
};
use tracing::info;

use crate::cmd::ServeArgs;
use crate::exit::{
    registry_error, server_error, stdout_error, transport_error, CliError, CliResult, SUCCESS,
};
use crate::output::print_stdout;

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let dir = args.runtime.resolve();
    let channel = match &args.name {
        Some(name) => ChannelName::with_dir(name.as_str(), dir),
        None => generate_channel_name(dir),
    }
    .map_err(|err| transport_error("invalid channel name", err))?;

    let server = CommandServer::with_default_commands(channel.clone())
        .map_err(|err| registry_error("command registration failed", err))?;
    let config = AcceptorConfig {
        capacity: args.capacity,
        shutdown_grace: args.shutdown_grace,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("cmdpipe-server")
        .build()
        .map_err(|err| CliError::failure(format!("failed to start runtime: {err}")))?;

    // The handler is in place before the socket appears.
    let cancel = CancellationToken::new();
    install_ctrlc_handler(cancel.clone())?;

    let report = runtime.block_on(async {
        let acceptor = server
            .bind(config)
            .map_err(|err| server_error("bind failed", err))?;

        info!(channel = %channel, path = ?acceptor.path(), "server name");
        print_stdout(&format!("{channel}\n")).map_err(stdout_error)?;

        acceptor
            .run(cancel)
            .await
            .map_err(|err| server_error("server failed", err))
    })?;

    info!(workers_started = report.workers_started, "server shut down");
    Ok(SUCCESS)
}

fn install_ctrlc_handler(cancel: CancellationToken) -> CliResult<()> {
    ctrlc::set_handler(move || {
        if !cancel.is_cancelled() {
            tracing::debug!("interrupt received, shutting down");
            cancel.cancel();
        }
    })
    .map_err(|err| CliError::failure(format!("signal handler setup failed: {err}")))
}
