use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult};
use crate::output::OutputFormat;

pub mod send;
pub mod subscribe;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a single application datagram.
    Send(SendArgs),
    /// Subscribe to channels and print received datagrams.
    Subscribe(SubscribeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Subscribe(args) => subscribe::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Director address (host[:port], tcp://host:port, unix:/path).
    #[arg(env = "MDWIRE_ADDRESS", default_value = "localhost")]
    pub address: String,
    /// Recipient channels (comma-separated).
    #[arg(long, value_delimiter = ',', required = true)]
    pub to: Vec<u64>,
    /// Sender channel written into the datagram.
    #[arg(long, default_value = "0")]
    pub sender: u64,
    /// Message type.
    #[arg(long, default_value = "0")]
    pub msg_type: u16,
    /// UTF-8 payload, appended as raw bytes.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Hex-encoded payload bytes.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read payload bytes from a file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
    /// Subscribe to this channel first, then wait for one reply and print it.
    #[arg(long, value_name = "CHANNEL")]
    pub reply_on: Option<u64>,
    /// Maximum time to wait for the reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct SubscribeArgs {
    /// Director address (host[:port], tcp://host:port, unix:/path).
    #[arg(env = "MDWIRE_ADDRESS", default_value = "localhost")]
    pub address: String,
    /// Channels to subscribe to (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub channel: Vec<u64>,
    /// Channel ranges to subscribe to, as LOWER-UPPER (repeatable).
    #[arg(long, value_name = "LOWER-UPPER")]
    pub range: Vec<String>,
    /// Recipients of a datagram the director sends when this client leaves.
    #[arg(long, value_delimiter = ',', value_name = "CHANNELS")]
    pub post_remove_to: Vec<u64>,
    /// Payload of the post-remove datagram.
    #[arg(long, default_value = "")]
    pub post_remove_data: String,
    /// Message type of the post-remove datagram.
    #[arg(long, default_value = "0")]
    pub post_remove_type: u16,
    /// Exit after receiving N datagrams.
    #[arg(long)]
    pub count: Option<usize>,
    /// Exit with a timeout if nothing arrives for this long (e.g. 10s).
    #[arg(long)]
    pub idle_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `150ms`, `2s` or a bare number of seconds.
pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
