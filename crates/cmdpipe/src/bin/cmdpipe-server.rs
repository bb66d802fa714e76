use clap::Parser;
use cmdpipe::cmd::{self, ServeArgs};
use cmdpipe::logging::{init_logging, LogFormat, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "cmdpipe-server",
    version,
    about = "Serve the built-in cmdpipe commands until interrupted"
)]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    match cmd::serve::run(cli.serve) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
