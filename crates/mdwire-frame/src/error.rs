/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The datagram does not fit the frame's uint16 length prefix or the
    /// configured maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote end closed the stream before a complete frame arrived.
    #[error("remote closed connection")]
    ConnectionClosed,
}

impl FrameError {
    /// True for a read that gave up waiting while the peer is still connected.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Io(err) if matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            )
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
