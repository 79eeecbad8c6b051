use std::fmt;
use std::io;

use mdwire_client::ClientError;
use mdwire_datagram::DatagramError;
use mdwire_frame::FrameError;
use mdwire_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::InvalidAddress(_) => CliError::usage(format!("{context}: {err}")),
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

/// Errors caused by what the user asked to build are usage errors; the rest
/// mean a peer sent bytes we could not parse.
pub fn datagram_error(context: &str, err: DatagramError) -> CliError {
    let code = match err {
        DatagramError::OversizeString { .. }
        | DatagramError::TooManyRecipients(_)
        | DatagramError::ReservedChannel(_)
        | DatagramError::InvalidRange { .. } => USAGE,
        _ => DATA_INVALID,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Transport(err) => transport_error(context, err),
        ClientError::Frame(err) => frame_error(context, err),
        ClientError::Datagram(err) => datagram_error(context, err),
        ClientError::Timeout(_) | ClientError::Unsatisfied { .. } => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        ClientError::UnexpectedDatagram(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ClientError::Disconnected(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        ClientError::Closed => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}
