use std::io::Write;

use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Debug, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// The response text exactly as received, then a newline.
    #[default]
    Raw,
    /// One JSON object per invocation.
    Json,
}

#[derive(Serialize)]
struct ResponseOutput<'a> {
    channel: &'a str,
    command: &'a str,
    response: &'a str,
}

#[derive(Serialize)]
struct ChannelsOutput<'a> {
    prefix: &'a str,
    channels: &'a [String],
}

pub fn render_response(
    channel: &str,
    command: &str,
    response: &str,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Raw => format!("{response}\n"),
        OutputFormat::Json => to_json_line(&ResponseOutput {
            channel,
            command,
            response,
        }),
    }
}

pub fn render_channels(prefix: &str, channels: &[String], format: OutputFormat) -> String {
    match format {
        OutputFormat::Raw => channels.iter().map(|name| format!("{name}\n")).collect(),
        OutputFormat::Json => to_json_line(&ChannelsOutput { prefix, channels }),
    }
}

/// Write `text` to stdout. A closed or failing stdout is an error.
pub fn print_stdout(text: &str) -> std::io::Result<()> {
    write_output(&mut std::io::stdout().lock(), text)
}

fn write_output<W: Write>(out: &mut W, text: &str) -> std::io::Result<()> {
    out.write_all(text.as_bytes())?;
    out.flush()
}

fn to_json_line<T: Serialize>(value: &T) -> String {
    let mut line = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    line.push('\n');
    line
}
