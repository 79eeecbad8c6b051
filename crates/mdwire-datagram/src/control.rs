//! Director control messages.
//!
//! A control message is a datagram addressed solely to [`CONTROL_CHANNEL`],
//! sent from [`CONTROL_SENDER`], with a [`ControlOpcode`] as its message type.

use crate::datagram::{Channel, Datagram, DatagramBuilder, MsgType};
use crate::error::{DatagramError, Result};

/// Reserved channel for director administration. Never an application address.
pub const CONTROL_CHANNEL: Channel = 4001;

/// Sender written into every control datagram.
pub const CONTROL_SENDER: Channel = 0;

/// Control message opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ControlOpcode {
    AddChannel = 2001,
    RemoveChannel = 2002,
    AddRange = 2008,
    RemoveRange = 2009,
    AddPostRemove = 2010,
    ClearPostRemove = 2011,
}

impl ControlOpcode {
    /// Wire value.
    pub const fn code(self) -> MsgType {
        self as MsgType
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::AddChannel => "add_channel",
            Self::RemoveChannel => "remove_channel",
            Self::AddRange => "add_range",
            Self::RemoveRange => "remove_range",
            Self::AddPostRemove => "add_post_remove",
            Self::ClearPostRemove => "clear_post_remove",
        }
    }
}

impl TryFrom<MsgType> for ControlOpcode {
    type Error = DatagramError;

    fn try_from(code: MsgType) -> Result<Self> {
        match code {
            2001 => Ok(Self::AddChannel),
            2002 => Ok(Self::RemoveChannel),
            2008 => Ok(Self::AddRange),
            2009 => Ok(Self::RemoveRange),
            2010 => Ok(Self::AddPostRemove),
            2011 => Ok(Self::ClearPostRemove),
            other => Err(DatagramError::UnknownControlOpcode(other)),
        }
    }
}

/// A decoded control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Subscribe to one channel.
    AddChannel(Channel),
    /// Unsubscribe from one channel.
    RemoveChannel(Channel),
    /// Subscribe to every channel in `[lower, upper]`.
    AddRange { upper: Channel, lower: Channel },
    /// Unsubscribe from every channel in `[lower, upper]`.
    RemoveRange { upper: Channel, lower: Channel },
    /// Have the director send this datagram when the connection closes.
    AddPostRemove(Datagram),
    /// Drop every registered post-remove datagram.
    ClearPostRemove,
}

impl ControlMessage {
    pub fn opcode(&self) -> ControlOpcode {
        match self {
            Self::AddChannel(_) => ControlOpcode::AddChannel,
            Self::RemoveChannel(_) => ControlOpcode::RemoveChannel,
            Self::AddRange { .. } => ControlOpcode::AddRange,
            Self::RemoveRange { .. } => ControlOpcode::RemoveRange,
            Self::AddPostRemove(_) => ControlOpcode::AddPostRemove,
            Self::ClearPostRemove => ControlOpcode::ClearPostRemove,
        }
    }

    /// Encode as a control datagram.
    ///
    /// Ranges with `upper < lower` are rejected rather than reordered.
    pub fn to_datagram(&self) -> Result<Datagram> {
        let mut builder = Datagram::create_control(self.opcode());
        match self {
            Self::AddChannel(channel) | Self::RemoveChannel(channel) => {
                builder.append_u64(*channel);
            }
            Self::AddRange { upper, lower } | Self::RemoveRange { upper, lower } => {
                if upper < lower {
                    return Err(DatagramError::InvalidRange {
                        upper: *upper,
                        lower: *lower,
                    });
                }
                builder.append_u64(*upper).append_u64(*lower);
            }
            Self::AddPostRemove(datagram) => {
                builder.append_datagram(datagram)?;
            }
            Self::ClearPostRemove => {}
        }
        Ok(builder.build())
    }

    /// Decode a control datagram.
    ///
    /// Fails with [`DatagramError::NotControl`] unless the control channel is
    /// the only recipient.
    pub fn parse(datagram: &Datagram) -> Result<Self> {
        let mut reader = datagram.reader();
        let header = reader.read_header()?;
        if datagram.recipient_count()? != 1 || !header.channels.contains(&CONTROL_CHANNEL) {
            return Err(DatagramError::NotControl);
        }

        let message = match ControlOpcode::try_from(header.msg_type)? {
            ControlOpcode::AddChannel => Self::AddChannel(reader.read_u64()?),
            ControlOpcode::RemoveChannel => Self::RemoveChannel(reader.read_u64()?),
            ControlOpcode::AddRange => Self::AddRange {
                upper: reader.read_u64()?,
                lower: reader.read_u64()?,
            },
            ControlOpcode::RemoveRange => Self::RemoveRange {
                upper: reader.read_u64()?,
                lower: reader.read_u64()?,
            },
            ControlOpcode::AddPostRemove => Self::AddPostRemove(reader.read_datagram()?),
            ControlOpcode::ClearPostRemove => Self::ClearPostRemove,
        };
        Ok(message)
    }
}

impl Datagram {
    /// Start a control datagram: control channel recipient, control sender and
    /// `opcode`, ready for the opcode's fields.
    pub fn create_control(opcode: ControlOpcode) -> DatagramBuilder {
        let mut builder = DatagramBuilder::new();
        builder
            .append_u8(1)
            .append_u64(CONTROL_CHANNEL)
            .append_u64(CONTROL_SENDER)
            .append_u16(opcode.code());
        builder
    }

    pub fn create_add_channel(channel: Channel) -> Datagram {
        let mut builder = Self::create_control(ControlOpcode::AddChannel);
        builder.append_u64(channel);
        builder.build()
    }

    pub fn create_remove_channel(channel: Channel) -> Datagram {
        let mut builder = Self::create_control(ControlOpcode::RemoveChannel);
        builder.append_u64(channel);
        builder.build()
    }

    /// Fails with [`DatagramError::InvalidRange`] when `upper < lower`.
    pub fn create_add_range(upper: Channel, lower: Channel) -> Result<Datagram> {
        ControlMessage::AddRange { upper, lower }.to_datagram()
    }

    /// Fails with [`DatagramError::InvalidRange`] when `upper < lower`.
    pub fn create_remove_range(upper: Channel, lower: Channel) -> Result<Datagram> {
        ControlMessage::RemoveRange { upper, lower }.to_datagram()
    }

    /// Embed `datagram` for the director to send verbatim on disconnect.
    pub fn create_add_post_remove(datagram: &Datagram) -> Result<Datagram> {
        let mut builder = Self::create_control(ControlOpcode::AddPostRemove);
        builder.append_datagram(datagram)?;
        Ok(builder.build())
    }

    pub fn create_clear_post_remove() -> Datagram {
        Self::create_control(ControlOpcode::ClearPostRemove).build()
    }
}
