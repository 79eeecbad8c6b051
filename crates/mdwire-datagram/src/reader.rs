use std::collections::BTreeSet;

use crate::codec::{decode_int, decode_string, WireInt, STRING_LEN_WIDTH};
use crate::datagram::{header_len, Channel, Datagram, MsgType};
use crate::error::{DatagramError, Result};

/// The structural header of a datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatagramHeader {
    /// Recipient channels, deduplicated.
    pub channels: BTreeSet<Channel>,
    /// Originating channel.
    pub sender: Channel,
    /// Message type (the opcode, for control messages).
    pub msg_type: MsgType,
    /// Bytes remaining after the header.
    pub payload_len: usize,
}

/// Sequential cursor over one datagram's bytes.
///
/// Call [`read_header`](Self::read_header) first, then decode payload fields in
/// the order the message type defines. Running past the end fails per call with
/// [`DatagramError::EndOfData`] and leaves the cursor where it was.
#[derive(Debug, Clone)]
pub struct DatagramReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> DatagramReader<'a> {
    /// A cursor at offset 0 of `datagram`.
    pub fn new(datagram: &'a Datagram) -> Self {
        Self::from_slice(datagram.data())
    }

    /// A cursor over raw datagram bytes.
    pub fn from_slice(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Decode the header and leave the cursor at the first payload byte.
    pub fn read_header(&mut self) -> Result<DatagramHeader> {
        let malformed = |needed| DatagramError::Malformed {
            len: self.data.len(),
            needed,
        };

        let count = decode_int::<u8>(self.data, 0).map_err(|_| malformed(1))? as usize;
        let needed = header_len(count);
        if self.data.len() < needed {
            return Err(malformed(needed));
        }

        let mut channels = BTreeSet::new();
        for i in 0..count {
            channels.insert(decode_int::<u64>(self.data, 1 + 8 * i)?);
        }

        self.seek(1 + 8 * count);
        let sender = self.read_u64()?;
        let msg_type = self.read_u16()?;

        Ok(DatagramHeader {
            channels,
            sender,
            msg_type,
            payload_len: self.remaining(),
        })
    }

    /// Decode the next integer field and advance by its width.
    pub fn read<T: WireInt>(&mut self) -> Result<T> {
        let value = decode_int::<T>(self.data, self.offset)?;
        self.offset += T::WIDTH;
        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.read()
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.read()
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.read()
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.read()
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read()
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read()
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read()
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.read()
    }

    /// Decode a length-prefixed byte string.
    pub fn read_string(&mut self) -> Result<&'a [u8]> {
        let bytes = decode_string(self.data, self.offset)?;
        self.offset += STRING_LEN_WIDTH + bytes.len();
        Ok(bytes)
    }

    /// Decode a datagram nested as a length-prefixed byte string.
    pub fn read_datagram(&mut self) -> Result<Datagram> {
        let bytes = self.read_string()?;
        Ok(Datagram::from_bytes(bytes.to_vec()))
    }

    /// Take every byte after the cursor.
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let start = self.offset.min(self.data.len());
        self.offset = self.data.len();
        &self.data[start..]
    }

    /// Move the cursor to an absolute offset.
    pub fn seek(&mut self, offset: usize) {
        self.offset = offset;
    }

    /// The cursor's absolute offset.
    pub fn tell(&self) -> usize {
        self.offset
    }

    /// Bytes between the cursor and the end.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }
}
