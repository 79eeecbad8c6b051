use std::io::ErrorKind;
use std::time::Duration;

use mdwire_datagram::{Channel, ControlMessage, Datagram};
use mdwire_frame::{FrameConfig, FrameError, FrameReader, FrameWriter};
use mdwire_transport::MdStream;
use tracing::{debug, trace, warn};

use crate::config::ConnectionConfig;
use crate::error::{ClientError, Result};

/// Shortest read timeout a socket accepts; zero means "block forever" to the OS.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// A framed connection to a message director.
///
/// Sends and receives whole datagrams. One owner drives the connection;
/// callers that share it across threads serialize access themselves.
pub struct Connection {
    reader: FrameReader<MdStream>,
    writer: FrameWriter<MdStream>,
    config: ConnectionConfig,
    /// Read timeout currently applied to the socket.
    applied_timeout: Duration,
    peer: String,
    closed: bool,
}

impl Connection {
    /// Wrap an established stream.
    pub fn from_stream(stream: MdStream, config: ConnectionConfig) -> Result<Self> {
        if config.keepalive {
            stream.set_keepalive(true)?;
        }
        let peer = stream.peer_description();
        let read_timeout = config.read_timeout.max(MIN_READ_TIMEOUT);

        let reader_stream = stream.try_clone()?;
        let reader = FrameReader::with_config_stream(
            reader_stream,
            FrameConfig {
                read_timeout: Some(read_timeout),
                ..FrameConfig::default()
            },
        )?;
        let writer = FrameWriter::with_config_stream(
            stream,
            FrameConfig {
                write_timeout: config.write_timeout,
                ..FrameConfig::default()
            },
        )?;

        debug!(%peer, ?read_timeout, "director connection ready");
        Ok(Self {
            reader,
            writer,
            config: ConnectionConfig {
                read_timeout,
                ..config
            },
            applied_timeout: read_timeout,
            peer,
            closed: false,
        })
    }

    /// Send one datagram as a single frame.
    ///
    /// With `write_timeout` set, a director that stops reading fails the
    /// send with `ClientError::Timeout`. Part of the frame may already be
    /// on the wire, so the connection should be closed afterwards.
    pub fn send(&mut self, datagram: &Datagram) -> Result<()> {
        self.ensure_open()?;
        let write_timeout = self.config.write_timeout;
        self.writer.write_frame(datagram).map_err(|err| match write_timeout {
            Some(limit) if err.is_timeout() => ClientError::Timeout(limit),
            _ => map_frame_error(err, "connection closed while sending"),
        })?;
        trace!(len = datagram.len(), "datagram sent");
        Ok(())
    }

    /// Send datagrams in order, stopping at the first failure.
    pub fn send_all<'a, I>(&mut self, datagrams: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Datagram>,
    {
        for datagram in datagrams {
            self.send(datagram)?;
        }
        Ok(())
    }

    /// Encode and send a director control message.
    pub fn send_control(&mut self, message: &ControlMessage) -> Result<()> {
        let datagram = message.to_datagram()?;
        debug!(opcode = message.opcode().name(), "control message");
        self.send(&datagram)
    }

    /// Ask the director to deliver traffic addressed to `channel`.
    pub fn subscribe(&mut self, channel: Channel) -> Result<()> {
        self.send_control(&ControlMessage::AddChannel(channel))
    }

    /// Stop receiving traffic addressed to `channel`.
    pub fn unsubscribe(&mut self, channel: Channel) -> Result<()> {
        self.send_control(&ControlMessage::RemoveChannel(channel))
    }

    /// Subscribe to every channel in `lower..=upper`.
    pub fn subscribe_range(&mut self, upper: Channel, lower: Channel) -> Result<()> {
        self.send_control(&ControlMessage::AddRange { upper, lower })
    }

    /// Drop a range subscription.
    pub fn unsubscribe_range(&mut self, upper: Channel, lower: Channel) -> Result<()> {
        self.send_control(&ControlMessage::RemoveRange { upper, lower })
    }

    /// Have the director route `datagram` once this connection goes away.
    pub fn add_post_remove(&mut self, datagram: &Datagram) -> Result<()> {
        self.send_control(&ControlMessage::AddPostRemove(datagram.clone()))
    }

    /// Discard all registered post-remove datagrams.
    pub fn clear_post_remove(&mut self) -> Result<()> {
        self.send_control(&ControlMessage::ClearPostRemove)
    }

    /// Read the next datagram, waiting up to the configured timeout.
    ///
    /// `ClientError::Timeout` means nothing arrived in time and the
    /// connection is still usable. `ClientError::Disconnected` means the
    /// director went away.
    pub fn read(&mut self) -> Result<Datagram> {
        let timeout = self.config.read_timeout;
        self.read_within(timeout)
    }

    /// Read the next datagram, waiting at most `wait`.
    pub fn read_within(&mut self, wait: Duration) -> Result<Datagram> {
        self.ensure_open()?;
        let wait = wait.max(MIN_READ_TIMEOUT);
        self.apply_read_timeout(wait)?;

        match self.reader.read_frame() {
            Ok(datagram) => Ok(datagram),
            Err(err) if err.is_timeout() => Err(ClientError::Timeout(wait)),
            Err(err) => Err(map_frame_error(err, "connection closed by director")),
        }
    }

    /// Return a datagram that is already available without waiting.
    pub fn try_read(&mut self) -> Result<Option<Datagram>> {
        self.ensure_open()?;
        self.reader.get_ref().set_nonblocking(true)?;
        let result = self.reader.read_frame();
        let restored = self.reader.get_ref().set_nonblocking(false);

        match (result, restored) {
            (Ok(datagram), Err(err)) => {
                warn!(error = %err, "failed to restore blocking mode");
                Ok(Some(datagram))
            }
            (Ok(datagram), Ok(())) => Ok(Some(datagram)),
            (Err(FrameError::Io(err)), restored) if err.kind() == ErrorKind::WouldBlock => {
                restored?;
                Ok(None)
            }
            (Err(err), _) => Err(map_frame_error(err, "connection closed by director")),
        }
    }

    /// Discard every datagram already received, returning how many were dropped.
    ///
    /// Never waits for new traffic.
    pub fn flush(&mut self) -> Result<usize> {
        let mut discarded = 0usize;
        while let Some(datagram) = self.try_read()? {
            trace!(len = datagram.len(), "datagram discarded");
            discarded += 1;
        }
        if discarded > 0 {
            debug!(discarded, "flushed pending datagrams");
        }
        Ok(discarded)
    }

    /// Change the timeout used by `read()` and `expect_none()`.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.ensure_open()?;
        let timeout = timeout.max(MIN_READ_TIMEOUT);
        self.apply_read_timeout(timeout)?;
        self.config.read_timeout = timeout;
        Ok(())
    }

    /// Current read timeout.
    pub fn timeout(&self) -> Duration {
        self.config.read_timeout
    }

    /// Change the overall wait budget of `expect*` calls.
    pub fn set_expect_timeout(&mut self, timeout: Duration) {
        self.config.expect_timeout = timeout;
    }

    /// Close the connection. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.writer.get_ref().shutdown()?;
        debug!(peer = %self.peer, "director connection closed");
        Ok(())
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Human-readable description of the director endpoint.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        Ok(())
    }

    fn apply_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        if self.applied_timeout != timeout {
            self.reader.set_read_timeout(Some(timeout))?;
            self.applied_timeout = timeout;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("read_timeout", &self.config.read_timeout)
            .field("closed", &self.closed)
            .finish()
    }
}

fn map_frame_error(err: FrameError, context: &str) -> ClientError {
    match err {
        FrameError::ConnectionClosed => ClientError::Disconnected(context.to_string()),
        FrameError::Io(io)
            if matches!(
                io.kind(),
                ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
            ) =>
        {
            ClientError::Disconnected(format!("{context}: {io}"))
        }
        other => ClientError::Frame(other),
    }
}
