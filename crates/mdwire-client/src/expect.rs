//! Expectation matching over an inbound datagram stream.
//!
//! A test declares the datagrams it expects to see; the matcher consumes
//! traffic until each one has been observed, in any order. An observed
//! datagram satisfies an expectation when the payloads are equal and the
//! expected recipients are a subset of the observed ones
//! (see [`Datagram::is_subset_of`]).

use std::time::{Duration, Instant};

use mdwire_datagram::Datagram;
use tracing::debug;

use crate::connection::Connection;
use crate::error::{ClientError, Result};

/// Something that yields inbound datagrams with a bounded wait.
pub trait DatagramSource {
    /// Wait at most `wait` for the next datagram.
    ///
    /// Must return `ClientError::Timeout` when nothing arrives in time.
    fn next_datagram(&mut self, wait: Duration) -> Result<Datagram>;
}

impl DatagramSource for Connection {
    fn next_datagram(&mut self, wait: Duration) -> Result<Datagram> {
        self.read_within(wait)
    }
}

/// Wait until every datagram in `expected` has been observed.
///
/// Each observed datagram satisfies at most one expectation, the first
/// pending one it matches. With `exclusive`, a datagram matching nothing
/// fails the call with `ClientError::UnexpectedDatagram`; otherwise it is
/// discarded. Individual reads wait at most `poll`; the whole call gives up
/// after `budget` with `ClientError::Unsatisfied`. A budget too large to
/// express as a deadline never expires.
///
/// Matching compares recipients and payload only. Sender and message type
/// are ignored, so control datagrams that differ only in opcode satisfy
/// each other's expectations.
pub fn expect_multi<S: DatagramSource + ?Sized>(
    source: &mut S,
    expected: &[Datagram],
    exclusive: bool,
    budget: Duration,
    poll: Duration,
) -> Result<()> {
    let mut pending: Vec<&Datagram> = expected.iter().collect();
    let started = Instant::now();
    let deadline = started.checked_add(budget);

    while !pending.is_empty() {
        let wait = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(unsatisfied(&pending, started));
                }
                (deadline - now).min(poll)
            }
            None => poll,
        };

        let observed = match source.next_datagram(wait) {
            Ok(datagram) => datagram,
            Err(ClientError::Timeout(_)) => continue,
            Err(err) => return Err(err),
        };

        match pending
            .iter()
            .position(|candidate| candidate.is_subset_of(&observed))
        {
            Some(index) => {
                pending.remove(index);
            }
            None if exclusive => return Err(ClientError::UnexpectedDatagram(observed)),
            None => debug!(datagram = ?observed, "ignoring unexpected datagram"),
        }
    }

    Ok(())
}

/// Succeed only if no datagram arrives within `wait`.
pub fn expect_none<S: DatagramSource + ?Sized>(source: &mut S, wait: Duration) -> Result<()> {
    match source.next_datagram(wait) {
        Ok(datagram) => Err(ClientError::UnexpectedDatagram(datagram)),
        Err(ClientError::Timeout(_)) => Ok(()),
        Err(err) => Err(err),
    }
}

fn unsatisfied(pending: &[&Datagram], started: Instant) -> ClientError {
    ClientError::Unsatisfied {
        remaining: pending.iter().map(|&datagram| datagram.clone()).collect(),
        waited: started.elapsed(),
    }
}

impl Connection {
    /// Wait for exactly `datagram`; any other traffic is a failure.
    ///
    /// Only recipients and payload are compared, so an `add_channel(42)`
    /// expectation is also met by `remove_channel(42)`.
    pub fn expect(&mut self, datagram: &Datagram) -> Result<()> {
        self.expect_multi(std::slice::from_ref(datagram), true)
    }

    /// Wait for all of `datagrams` in any order, within the configured
    /// expect timeout.
    pub fn expect_multi(&mut self, datagrams: &[Datagram], exclusive: bool) -> Result<()> {
        let budget = self.config().expect_timeout;
        let poll = self.timeout();
        expect_multi(self, datagrams, exclusive, budget, poll)
    }

    /// Succeed only if nothing arrives within the read timeout.
    pub fn expect_none(&mut self) -> Result<()> {
        let wait = self.timeout();
        expect_none(self, wait)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    fn app(recipients: &[u64], value: u32) -> Datagram {
        let mut builder = Datagram::create(recipients, 1, 100).unwrap();
        builder.append_u32(value);
        builder.build()
    }

    enum Event {
        Arrive(Datagram),
        Quiet,
        Hangup,
    }

    /// Replays scripted events; once the script runs out it stays quiet.
    struct Script {
        events: VecDeque<Event>,
        reads: usize,
    }

    impl Script {
        fn new(events: Vec<Event>) -> Self {
            Self {
                events: events.into(),
                reads: 0,
            }
        }
    }

    impl DatagramSource for Script {
        fn next_datagram(&mut self, wait: Duration) -> Result<Datagram> {
            self.reads += 1;
            match self.events.pop_front() {
                Some(Event::Arrive(datagram)) => Ok(datagram),
                Some(Event::Hangup) => Err(ClientError::Disconnected("hangup".to_string())),
                Some(Event::Quiet) | None => {
                    std::thread::sleep(wait);
                    Err(ClientError::Timeout(wait))
                }
            }
        }
    }

    const BUDGET: Duration = Duration::from_millis(200);
    const POLL: Duration = Duration::from_millis(10);

    #[test]
    fn matches_in_any_order() {
        let a = app(&[1], 1);
        let b = app(&[2], 2);
        let mut source = Script::new(vec![Event::Arrive(b.clone()), Event::Arrive(a.clone())]);

        expect_multi(&mut source, &[a, b], true, BUDGET, POLL).unwrap();
        assert_eq!(source.reads, 2);
    }

    #[test]
    fn quiet_polls_do_not_fail_before_budget() {
        let a = app(&[1], 1);
        let mut source = Script::new(vec![Event::Quiet, Event::Quiet, Event::Arrive(a.clone())]);

        expect_multi(&mut source, &[a], true, BUDGET, POLL).unwrap();
    }

    #[test]
    fn exclusive_rejects_stray_datagram() {
        let a = app(&[1], 1);
        let stray = app(&[1], 99);
        let mut source = Script::new(vec![Event::Arrive(stray.clone()), Event::Arrive(a.clone())]);

        let err = expect_multi(&mut source, &[a], true, BUDGET, POLL).unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedDatagram(ref d) if *d == stray));
    }

    #[test]
    fn non_exclusive_skips_stray_datagram() {
        let a = app(&[1], 1);
        let stray = app(&[1], 99);
        let mut source = Script::new(vec![Event::Arrive(stray), Event::Arrive(a.clone())]);

        expect_multi(&mut source, &[a], false, BUDGET, POLL).unwrap();
    }

    #[test]
    fn duplicate_expectations_need_duplicate_arrivals() {
        let a = app(&[1], 1);
        let mut source = Script::new(vec![Event::Arrive(a.clone())]);

        let err = expect_multi(&mut source, &[a.clone(), a.clone()], true, POLL * 3, POLL)
            .unwrap_err();
        match err {
            ClientError::Unsatisfied { remaining, waited } => {
                assert_eq!(remaining, vec![a]);
                assert!(waited >= POLL * 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn fanout_to_extra_recipients_still_matches() {
        let expected = app(&[2], 5);
        let observed = app(&[1, 2, 3], 5);
        let mut source = Script::new(vec![Event::Arrive(observed)]);

        expect_multi(&mut source, &[expected], true, BUDGET, POLL).unwrap();
    }

    #[test]
    fn first_listed_expectation_wins_ties() {
        let narrow = app(&[1], 5);
        let wide = app(&[1, 2], 5);
        let arrivals = || {
            Script::new(vec![
                Event::Arrive(wide.clone()),
                Event::Arrive(narrow.clone()),
            ])
        };

        // `wide` satisfies either expectation, and takes the first one listed.
        let mut source = arrivals();
        let err = expect_multi(&mut source, &[narrow.clone(), wide.clone()], true, BUDGET, POLL)
            .unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedDatagram(ref d) if *d == narrow));

        let mut source = arrivals();
        expect_multi(&mut source, &[wide.clone(), narrow.clone()], true, BUDGET, POLL).unwrap();
        assert_eq!(source.reads, 2);
    }

    #[test]
    fn message_type_is_not_compared() {
        let mut source = Script::new(vec![Event::Arrive(Datagram::create_remove_channel(42))]);

        expect_multi(
            &mut source,
            &[Datagram::create_add_channel(42)],
            true,
            BUDGET,
            POLL,
        )
        .unwrap();
    }

    #[test]
    fn unbounded_budget_waits_for_arrival() {
        let a = app(&[1], 1);
        let mut source = Script::new(vec![Event::Quiet, Event::Arrive(a.clone())]);

        expect_multi(&mut source, &[a], true, Duration::MAX, POLL).unwrap();
        assert_eq!(source.reads, 2);

        let mut idle = Script::new(Vec::new());
        expect_multi(&mut idle, &[], true, Duration::MAX, POLL).unwrap();
    }

    #[test]
    fn missing_recipient_does_not_match() {
        let expected = app(&[1, 2], 5);
        let observed = app(&[2], 5);
        let mut source = Script::new(vec![Event::Arrive(observed)]);

        let err = expect_multi(&mut source, &[expected], true, BUDGET, POLL).unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedDatagram(_)));
    }

    #[test]
    fn empty_expectation_returns_immediately() {
        let mut source = Script::new(vec![Event::Arrive(app(&[1], 1))]);
        expect_multi(&mut source, &[], true, BUDGET, POLL).unwrap();
        assert_eq!(source.reads, 0);
    }

    #[test]
    fn disconnect_aborts_matching() {
        let a = app(&[1], 1);
        let mut source = Script::new(vec![Event::Hangup]);

        let err = expect_multi(&mut source, &[a], true, BUDGET, POLL).unwrap_err();
        assert!(matches!(err, ClientError::Disconnected(_)));
    }

    #[test]
    fn budget_bounds_total_wait() {
        let a = app(&[1], 1);
        let mut source = Script::new(Vec::new());
        let started = Instant::now();

        let err = expect_multi(&mut source, &[a], true, Duration::from_millis(50), POLL)
            .unwrap_err();
        assert!(matches!(err, ClientError::Unsatisfied { .. }));
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn expect_none_passes_on_silence() {
        let mut source = Script::new(Vec::new());
        expect_none(&mut source, POLL).unwrap();
    }

    #[test]
    fn expect_none_fails_on_traffic() {
        let a = app(&[1], 1);
        let mut source = Script::new(vec![Event::Arrive(a.clone())]);

        let err = expect_none(&mut source, POLL).unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedDatagram(ref d) if *d == a));
    }
}
