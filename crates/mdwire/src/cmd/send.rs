use std::fs;
use std::time::{Duration, Instant};

use mdwire_client::{connect, ClientError, DatagramSource};
use mdwire_datagram::{Channel, Datagram};
use tracing::{debug, info};

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{client_error, datagram_error, io_error, CliError, CliResult, SUCCESS};
use crate::output::{print_datagram, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;

    let mut builder = Datagram::create(&args.to, args.sender, args.msg_type)
        .map_err(|err| datagram_error("invalid datagram", err))?;
    builder.append_raw(&payload);
    let datagram = builder.build();

    let mut conn = connect(&args.address).map_err(|err| client_error("connect failed", err))?;
    if let Some(channel) = args.reply_on {
        conn.subscribe(channel)
            .map_err(|err| client_error("subscribe failed", err))?;
    }

    conn.send(&datagram)
        .map_err(|err| client_error("send failed", err))?;
    info!(recipients = ?args.to, len = datagram.len(), "datagram sent");

    if let Some(channel) = args.reply_on {
        let poll = conn.timeout();
        let reply = wait_for_reply(&mut conn, channel, wait_timeout, poll)
            .map_err(|err| client_error("receive failed", err))?;
        print_datagram(&reply, format)
            .map_err(|err| datagram_error("reply could not be decoded", err))?;
    }

    conn.close()
        .map_err(|err| client_error("close failed", err))?;
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    if digits.len() % 2 != 0 {
        return Err(CliError::usage("--hex needs an even number of digits"));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CliError::usage(format!("--hex is not valid hex: {input}")))
        })
        .collect()
}

/// Read until a datagram addressed to `channel` arrives or `timeout` passes.
/// A timeout too large to express as a deadline never expires.
fn wait_for_reply<S: DatagramSource>(
    source: &mut S,
    channel: Channel,
    timeout: Duration,
    poll: Duration,
) -> Result<Datagram, ClientError> {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        let wait = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(ClientError::Timeout(timeout));
                }
                (deadline - now).min(poll)
            }
            None => poll,
        };

        match source.next_datagram(wait) {
            Ok(datagram) if addressed_to(&datagram, channel) => return Ok(datagram),
            Ok(datagram) => debug!(?datagram, channel, "skipping datagram for another channel"),
            Err(ClientError::Timeout(_)) => continue,
            Err(err) => return Err(err),
        }
    }
}

fn addressed_to(datagram: &Datagram, channel: Channel) -> bool {
    datagram
        .channels()
        .map(|channels| channels.contains(&channel))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    struct MockSource {
        queued: VecDeque<Datagram>,
        calls: usize,
    }

    impl DatagramSource for MockSource {
        fn next_datagram(&mut self, wait: Duration) -> Result<Datagram, ClientError> {
            self.calls += 1;
            self.queued
                .pop_front()
                .ok_or(ClientError::Timeout(wait))
        }
    }

    fn to(channel: Channel) -> Datagram {
        let mut builder = Datagram::create(&[channel], 1, 2).unwrap();
        builder.append_raw(b"ok");
        builder.build()
    }

    #[test]
    fn wait_for_reply_skips_other_channels() {
        let mut source = MockSource {
            queued: VecDeque::from([to(8), to(9)]),
            calls: 0,
        };

        let reply = wait_for_reply(
            &mut source,
            9,
            Duration::from_secs(1),
            Duration::from_millis(10),
        )
        .expect("reply should arrive");
        assert_eq!(reply, to(9));
        assert_eq!(source.calls, 2);
    }

    #[test]
    fn wait_for_reply_times_out() {
        let mut source = MockSource {
            queued: VecDeque::new(),
            calls: 0,
        };

        let err = wait_for_reply(
            &mut source,
            9,
            Duration::from_millis(30),
            Duration::from_millis(5),
        )
        .unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));
    }

    #[test]
    fn wait_for_reply_without_deadline() {
        let mut source = MockSource {
            queued: VecDeque::from([to(3), to(4)]),
            calls: 0,
        };

        let reply = wait_for_reply(&mut source, 4, Duration::MAX, Duration::from_millis(10))
            .expect("reply should arrive");
        assert_eq!(reply, to(4));
    }

    #[test]
    fn parse_hex_accepts_prefix_and_spaces() {
        assert_eq!(parse_hex("0x00ff 10").unwrap(), vec![0x00, 0xff, 0x10]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn parse_hex_rejects_bad_input() {
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }
}
