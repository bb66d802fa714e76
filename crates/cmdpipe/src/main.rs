use std::time::Duration;

use clap::error::ErrorKind;
use clap::{ArgGroup, CommandFactory, Parser};
use cmdpipe::cmd::{self, RuntimeDirArgs};
use cmdpipe::duration::parse_duration;
use cmdpipe::exit::{transport_error, CliResult, FAILURE, SUCCESS};
use cmdpipe::logging::{init_logging, LogFormat, LogLevel};
use cmdpipe::output::OutputFormat;
use cmdpipe_transport::ChannelName;

const USAGE_ERROR: &str = "One or more parameters are incorrect or missing";

#[derive(Parser, Debug)]
#[command(
    name = "cmdpipe",
    version,
    about = "Send one command to a cmdpipe server and print its response",
    group(ArgGroup::new("mode").required(true).args(["name", "list"]))
)]
struct Cli {
    /// Channel name of the server.
    #[arg(long, short = 'n', value_name = "NAME", requires = "command")]
    name: Option<String>,

    /// Command to send.
    #[arg(long, short = 'c', value_name = "TEXT", requires = "name")]
    command: Option<String>,

    /// List channels whose name starts with PREFIX (case-insensitive).
    #[arg(long, short = 'l', value_name = "PREFIX", conflicts_with_all = ["name", "command"])]
    list: Option<String>,

    /// How long to wait for the server to accept (e.g. 10s, 500ms).
    #[arg(long, value_name = "DURATION", default_value = "10s", value_parser = parse_duration)]
    timeout: Duration,

    #[command(flatten)]
    runtime: RuntimeDirArgs,

    /// Output format.
    #[arg(long, value_name = "FORMAT", default_value = "raw")]
    format: OutputFormat,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    log_level: LogLevel,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            std::process::exit(SUCCESS);
        }
        Err(err) => {
            eprintln!("{USAGE_ERROR}");
            let _ = err.print();
            eprintln!("{}", Cli::command().render_help());
            std::process::exit(FAILURE);
        }
    };
    init_logging(cli.log_format, cli.log_level);

    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

fn run(cli: &Cli) -> CliResult<i32> {
    let dir = cli.runtime.resolve();

    if let Some(prefix) = &cli.list {
        return cmd::list::run(&dir, prefix, cli.format);
    }

    match (&cli.name, &cli.command) {
        (Some(name), Some(command)) => {
            let channel = ChannelName::with_dir(name.as_str(), dir)
                .map_err(|err| transport_error("invalid channel name", err))?;
            cmd::send::run(&channel, command, cli.timeout, cli.format)
        }
        _ => Err(cmdpipe::exit::CliError::failure(USAGE_ERROR)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_command() {
        let cli = Cli::try_parse_from(["cmdpipe", "-n", "cmdpipe.abc", "-c", "status"])
            .expect("send args should parse");

        assert_eq!(cli.name.as_deref(), Some("cmdpipe.abc"));
        assert_eq!(cli.command.as_deref(), Some("status"));
        assert_eq!(cli.timeout, Duration::from_secs(10));
        assert_eq!(cli.format, OutputFormat::Raw);
    }

    #[test]
    fn name_without_command_is_rejected() {
        let err = Cli::try_parse_from(["cmdpipe", "--name", "svc"])
            .expect_err("missing command should fail");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn nothing_to_do_is_rejected() {
        let err = Cli::try_parse_from(["cmdpipe"]).expect_err("no mode should fail");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn list_conflicts_with_send() {
        let err = Cli::try_parse_from(["cmdpipe", "-l", "cmd", "-n", "svc", "-c", "echo"])
            .expect_err("list plus send should fail");
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_list_with_options() {
        let cli = Cli::try_parse_from([
            "cmdpipe",
            "--list",
            "cmdpipe.",
            "--format",
            "json",
            "--timeout",
            "500ms",
            "--runtime-dir",
            "/tmp/cmdpipe-test",
        ])
        .expect("list args should parse");

        assert_eq!(cli.list.as_deref(), Some("cmdpipe."));
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.timeout, Duration::from_millis(500));
        assert_eq!(
            cli.runtime.resolve(),
            std::path::PathBuf::from("/tmp/cmdpipe-test")
        );
    }
}
