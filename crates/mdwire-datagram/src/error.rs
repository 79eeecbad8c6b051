/// Errors that can occur while building or decoding datagrams.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatagramError {
    /// The buffer is too short for the header fields it declares.
    #[error("malformed datagram ({len} bytes, header needs {needed})")]
    Malformed { len: usize, needed: usize },

    /// A decode ran past the available bytes.
    #[error("end of datagram at offset {offset} (needed {needed} bytes, {available} available)")]
    EndOfData {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A length-prefixed string does not fit the uint16 length field.
    #[error("string too long ({len} bytes, max {max})", max = u16::MAX)]
    OversizeString { len: usize },

    /// More recipients than the uint8 recipient count can describe.
    #[error("too many recipients ({0}, max {max})", max = u8::MAX)]
    TooManyRecipients(usize),

    /// The control channel was used as an application recipient.
    #[error("channel {0} is reserved for control messages")]
    ReservedChannel(u64),

    /// A range subscription with its bounds inverted.
    #[error("invalid channel range: upper {upper} is below lower {lower}")]
    InvalidRange { upper: u64, lower: u64 },

    /// The datagram is not addressed solely to the control channel.
    #[error("datagram is not a control message")]
    NotControl,

    /// A control datagram carries an opcode outside the control table.
    #[error("unknown control opcode {0}")]
    UnknownControlOpcode(u16),
}

pub type Result<T> = std::result::Result<T, DatagramError>;
