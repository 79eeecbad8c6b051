mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "mdwire", version, about = "Message director wire client")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", env = "MDWIRE_LOG_LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "mdwire",
            "send",
            "localhost:7199",
            "--to",
            "5,6",
            "--msg-type",
            "300",
            "--data",
            "hello",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.to, vec![5, 6]);
                assert_eq!(args.msg_type, 300);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "mdwire", "send", "--to", "1", "--data", "hello", "--hex", "00ff",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn send_requires_recipients() {
        let err = Cli::try_parse_from(["mdwire", "send", "--data", "x"])
            .expect_err("missing --to should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_subscribe_with_ranges() {
        let cli = Cli::try_parse_from([
            "mdwire",
            "--format",
            "json",
            "subscribe",
            "unix:/tmp/director.sock",
            "--channel",
            "1,2",
            "--range",
            "100-200",
            "--count",
            "3",
        ])
        .expect("subscribe args should parse");

        match cli.command {
            Command::Subscribe(args) => {
                assert_eq!(args.channel, vec![1, 2]);
                assert_eq!(args.range, vec!["100-200".to_string()]);
                assert_eq!(args.count, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
