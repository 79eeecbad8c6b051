use std::time::Duration;

use mdwire_datagram::Datagram;

/// Errors that can occur on a director connection.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] mdwire_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] mdwire_frame::FrameError),

    /// Datagram encoding or decoding error.
    #[error("datagram error: {0}")]
    Datagram(#[from] mdwire_datagram::DatagramError),

    /// No datagram arrived within the read timeout; the peer is still connected.
    #[error("no datagram within {0:?}")]
    Timeout(Duration),

    /// The remote end closed the connection.
    #[error("remote disconnected: {0}")]
    Disconnected(String),

    /// The connection was closed locally.
    #[error("connection already closed")]
    Closed,

    /// A datagram arrived that no expectation accounts for.
    #[error("unexpected datagram: {0:?}")]
    UnexpectedDatagram(Datagram),

    /// Expectations were still outstanding when the wait budget ran out.
    #[error("{} expected datagram(s) not observed within {waited:?}", .remaining.len())]
    Unsatisfied {
        remaining: Vec<Datagram>,
        waited: Duration,
    },
}

impl ClientError {
    /// True when retrying the read may succeed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
