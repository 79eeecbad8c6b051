//! Length-prefixed datagram framing over byte streams.
//!
//! Every datagram travels as one frame:
//! - A 2-byte little-endian length
//! - Exactly that many bytes of datagram content
//!
//! Readers buffer partial input internally, so callers always get whole
//! datagrams, and a stream that ends mid-frame surfaces as
//! [`FrameError::ConnectionClosed`] rather than a short datagram.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::DatagramCodec;
pub use codec::{decode_frame, encode_frame, FrameConfig, HEADER_SIZE, MAX_FRAME_PAYLOAD};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
