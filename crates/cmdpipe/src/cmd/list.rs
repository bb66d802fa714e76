use std::io::ErrorKind;
use std::path::Path;

use cmdpipe_transport::{list_channels, TransportError};

use crate::exit::{stdout_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_stdout, render_channels, OutputFormat};

pub fn run(dir: &Path, prefix: &str, format: OutputFormat) -> CliResult<i32> {
    let channels = match list_channels(dir, prefix) {
        Ok(channels) => channels,
        // No runtime directory yet means no server has ever bound a channel.
        Err(TransportError::Io(err)) if err.kind() == ErrorKind::NotFound => Vec::new(),
        Err(err) => {
            return Err(transport_error(
                &format!("failed listing {}", dir.display()),
                err,
            ))
        }
    };

    print_stdout(&render_channels(prefix, &channels, format)).map_err(stdout_error)?;
    Ok(SUCCESS)
}
