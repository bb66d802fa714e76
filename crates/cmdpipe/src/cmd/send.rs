use std::time::Duration;

use cmdpipe_command::send;
use cmdpipe_transport::ChannelName;

use crate::exit::{client_error, stdout_error, CliResult, SUCCESS};
use crate::output::{print_stdout, render_response, OutputFormat};

pub fn run(
    channel: &ChannelName,
    command: &str,
    timeout: Duration,
    format: OutputFormat,
) -> CliResult<i32> {
    let response =
        send(channel, command, timeout).map_err(|err| client_error("request failed", err))?;
    print_stdout(&render_response(channel.as_str(), command, &response, format))
        .map_err(stdout_error)?;
    Ok(SUCCESS)
}
