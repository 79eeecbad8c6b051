use std::collections::BTreeSet;
use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{decode_int, encode_string, WireInt};
use crate::control::CONTROL_CHANNEL;
use crate::error::{DatagramError, Result};
use crate::reader::DatagramReader;

/// A 64-bit routing identifier.
pub type Channel = u64;

/// An application- or control-defined message opcode.
pub type MsgType = u16;

const COUNT_WIDTH: usize = 1;
const CHANNEL_WIDTH: usize = 8;
const SENDER_WIDTH: usize = 8;
const MSG_TYPE_WIDTH: usize = 2;

const DEBUG_PREVIEW_BYTES: usize = 32;

/// Byte length of the structural header for `recipient_count` recipients.
pub const fn header_len(recipient_count: usize) -> usize {
    COUNT_WIDTH + CHANNEL_WIDTH * recipient_count + SENDER_WIDTH + MSG_TYPE_WIDTH
}

/// Assembles a datagram field by field.
///
/// Fields must be appended header first: recipient count, recipients, sender,
/// message type, then payload. [`Datagram::create`] does the header part.
#[derive(Debug, Default)]
pub struct DatagramBuilder {
    buf: BytesMut,
}

impl DatagramBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append any fixed-width integer field.
    pub fn append<T: WireInt>(&mut self, value: T) -> &mut Self {
        value.put(&mut self.buf);
        self
    }

    pub fn append_u8(&mut self, value: u8) -> &mut Self {
        self.append(value)
    }

    pub fn append_i8(&mut self, value: i8) -> &mut Self {
        self.append(value)
    }

    pub fn append_u16(&mut self, value: u16) -> &mut Self {
        self.append(value)
    }

    pub fn append_i16(&mut self, value: i16) -> &mut Self {
        self.append(value)
    }

    pub fn append_u32(&mut self, value: u32) -> &mut Self {
        self.append(value)
    }

    pub fn append_i32(&mut self, value: i32) -> &mut Self {
        self.append(value)
    }

    pub fn append_u64(&mut self, value: u64) -> &mut Self {
        self.append(value)
    }

    pub fn append_i64(&mut self, value: i64) -> &mut Self {
        self.append(value)
    }

    /// Append a uint16 byte length followed by the bytes.
    ///
    /// Fails with [`DatagramError::OversizeString`] past 65535 bytes; nothing
    /// is appended in that case.
    pub fn append_string(&mut self, bytes: impl AsRef<[u8]>) -> Result<&mut Self> {
        encode_string(bytes.as_ref(), &mut self.buf)?;
        Ok(self)
    }

    /// Append a complete datagram as a length-prefixed byte string.
    pub fn append_datagram(&mut self, datagram: &Datagram) -> Result<&mut Self> {
        self.append_string(datagram.data())
    }

    /// Append bytes verbatim, with no length prefix.
    pub fn append_raw(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.buf.put_slice(bytes.as_ref());
        self
    }

    /// The bytes accumulated so far.
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Freeze into an immutable datagram.
    pub fn build(self) -> Datagram {
        Datagram {
            data: self.buf.freeze(),
        }
    }
}

/// An immutable, cheaply cloneable datagram.
///
/// Accessors read structure straight from the bytes; nothing is parsed up front,
/// so a received datagram that turns out to be malformed only fails when a
/// field it lacks is asked for.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Datagram {
    data: Bytes,
}

impl Datagram {
    /// Wrap bytes received from the wire.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Start an application datagram: writes the full header and leaves the
    /// builder ready for payload fields.
    ///
    /// The control channel may not appear among `recipients`; control
    /// datagrams come from [`Datagram::create_control`] and the
    /// `create_*` control factories.
    pub fn create(
        recipients: &[Channel],
        sender: Channel,
        msg_type: MsgType,
    ) -> Result<DatagramBuilder> {
        if recipients.contains(&CONTROL_CHANNEL) {
            return Err(DatagramError::ReservedChannel(CONTROL_CHANNEL));
        }
        let count = u8::try_from(recipients.len())
            .map_err(|_| DatagramError::TooManyRecipients(recipients.len()))?;

        let mut builder = DatagramBuilder {
            buf: BytesMut::with_capacity(header_len(recipients.len())),
        };
        builder.append_u8(count);
        for &recipient in recipients {
            builder.append_u64(recipient);
        }
        builder.append_u64(sender).append_u16(msg_type);
        Ok(builder)
    }

    /// The raw datagram bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The raw bytes as a shared handle.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The recipient-count field.
    pub fn recipient_count(&self) -> Result<u8> {
        decode_int::<u8>(&self.data, 0).map_err(|_| DatagramError::Malformed {
            len: self.data.len(),
            needed: COUNT_WIDTH,
        })
    }

    /// The recipient channels, as a set.
    ///
    /// Order and duplicates in the recipient list carry no meaning.
    pub fn channels(&self) -> Result<BTreeSet<Channel>> {
        let count = self.recipient_count()? as usize;
        let needed = COUNT_WIDTH + CHANNEL_WIDTH * count;
        if self.data.len() < needed {
            return Err(DatagramError::Malformed {
                len: self.data.len(),
                needed,
            });
        }

        (0..count)
            .map(|i| decode_int::<u64>(&self.data, COUNT_WIDTH + CHANNEL_WIDTH * i))
            .collect()
    }

    /// Length of this datagram's header, checked against the buffer.
    pub fn header_len(&self) -> Result<usize> {
        let needed = header_len(self.recipient_count()? as usize);
        if self.data.len() < needed {
            return Err(DatagramError::Malformed {
                len: self.data.len(),
                needed,
            });
        }
        Ok(needed)
    }

    /// Everything after the recipients, sender and message type.
    pub fn payload(&self) -> Result<&[u8]> {
        let start = self.header_len()?;
        Ok(&self.data[start..])
    }

    /// True iff payloads are byte-equal and every channel of `self` is also a
    /// channel of `other`.
    ///
    /// An expectation may name fewer recipients than the director actually
    /// fanned out to, but the payload must match exactly. Malformed datagrams
    /// are never subsets of anything.
    ///
    /// Sender and message type are not part of the payload and are not
    /// compared. Control datagrams carry their opcode as the message type,
    /// so `add_channel(42)` and `remove_channel(42)` are subsets of each other.
    pub fn is_subset_of(&self, other: &Datagram) -> bool {
        let (Ok(own_payload), Ok(other_payload)) = (self.payload(), other.payload()) else {
            return false;
        };
        if own_payload != other_payload {
            return false;
        }
        match (self.channels(), other.channels()) {
            (Ok(own), Ok(others)) => own.is_subset(&others),
            _ => false,
        }
    }

    /// A cursor over this datagram's bytes.
    pub fn reader(&self) -> DatagramReader<'_> {
        DatagramReader::new(self)
    }
}

impl From<DatagramBuilder> for Datagram {
    fn from(builder: DatagramBuilder) -> Self {
        builder.build()
    }
}

impl AsRef<[u8]> for Datagram {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Datagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.data[..self.data.len().min(DEBUG_PREVIEW_BYTES)];
        let mut hex: String = shown.iter().map(|b| format!("{b:02x}")).collect();
        if self.data.len() > DEBUG_PREVIEW_BYTES {
            hex.push_str("..");
        }
        f.debug_struct("Datagram")
            .field("len", &self.data.len())
            .field("data", &format_args!("{hex}"))
            .finish()
    }
}
