//! Channel-addressed datagrams for message director protocols.
//!
//! Every datagram has the same little-endian layout:
//!
//! ```text
//! ┌────────────┬──────────────────┬──────────┬──────────┬─────────┐
//! │ count (1B) │ recipients (8B×n)│ sender   │ msg type │ payload │
//! │            │                  │ (8B LE)  │ (2B LE)  │         │
//! └────────────┴──────────────────┴──────────┴──────────┴─────────┘
//! ```
//!
//! Control messages use the same shape: one recipient (the control channel),
//! sender 0, and the control opcode in the message-type slot.

pub mod codec;
pub mod control;
pub mod datagram;
pub mod error;
pub mod reader;

pub use codec::WireInt;
pub use control::{ControlMessage, ControlOpcode, CONTROL_CHANNEL, CONTROL_SENDER};
pub use datagram::{header_len, Channel, Datagram, DatagramBuilder, MsgType};
pub use error::{DatagramError, Result};
pub use reader::{DatagramHeader, DatagramReader};
