use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use mdwire_client::{connect, ClientError, Connection};
use mdwire_datagram::{Channel, Datagram};
use tracing::{info, warn};

use crate::cmd::{parse_duration, SubscribeArgs};
use crate::exit::{client_error, datagram_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT};
use crate::output::{print_datagram, OutputFormat};

pub fn run(args: SubscribeArgs, format: OutputFormat) -> CliResult<i32> {
    let ranges = args
        .range
        .iter()
        .map(|range| parse_range(range))
        .collect::<CliResult<Vec<_>>>()?;
    if args.channel.is_empty() && ranges.is_empty() {
        return Err(CliError::usage(
            "nothing to subscribe to: pass --channel or --range",
        ));
    }
    let idle_timeout = args.idle_timeout.as_deref().map(parse_duration).transpose()?;

    let mut conn = connect(&args.address).map_err(|err| client_error("connect failed", err))?;
    register(&mut conn, &args, &ranges).map_err(|err| client_error("subscribe failed", err))?;
    info!(channels = ?args.channel, ranges = ?ranges, "subscribed");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    let mut last_seen = Instant::now();

    while running.load(Ordering::SeqCst) {
        let datagram = match conn.read() {
            Ok(datagram) => datagram,
            Err(ClientError::Timeout(_)) => {
                if let Some(limit) = idle_timeout {
                    if last_seen.elapsed() >= limit {
                        return Err(CliError::new(
                            TIMEOUT,
                            format!("no datagram within {limit:?}"),
                        ));
                    }
                }
                continue;
            }
            Err(err) => return Err(client_error("receive failed", err)),
        };
        last_seen = Instant::now();

        if let Err(err) = print_datagram(&datagram, format) {
            warn!(error = %err, "skipping undecodable datagram");
            continue;
        }
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    conn.close()
        .map_err(|err| client_error("close failed", err))?;
    Ok(SUCCESS)
}

fn register(
    conn: &mut Connection,
    args: &SubscribeArgs,
    ranges: &[(Channel, Channel)],
) -> Result<(), ClientError> {
    for &channel in &args.channel {
        conn.subscribe(channel)?;
    }
    for &(lower, upper) in ranges {
        conn.subscribe_range(upper, lower)?;
    }
    if !args.post_remove_to.is_empty() {
        let mut builder = Datagram::create(&args.post_remove_to, 0, args.post_remove_type)?;
        builder.append_raw(args.post_remove_data.as_bytes());
        conn.add_post_remove(&builder.build())?;
    }
    Ok(())
}

/// Parse `LOWER-UPPER` into `(lower, upper)`.
fn parse_range(input: &str) -> CliResult<(Channel, Channel)> {
    let invalid = || CliError::usage(format!("invalid range '{input}', expected LOWER-UPPER"));
    let (lower, upper) = input.split_once('-').ok_or_else(invalid)?;
    let lower: Channel = lower.trim().parse().map_err(|_| invalid())?;
    let upper: Channel = upper.trim().parse().map_err(|_| invalid())?;
    if upper < lower {
        return Err(datagram_error(
            "invalid range",
            mdwire_datagram::DatagramError::InvalidRange { upper, lower },
        ));
    }
    Ok((lower, upper))
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
