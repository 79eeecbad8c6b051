//! Byte-stream transport for message director clients.
//!
//! A message director is reached over a reliable ordered byte stream:
//! - TCP (the usual deployment, default port 7199)
//! - Unix domain sockets (local directors and tests)
//!
//! This is the lowest layer of mdwire. Framing and datagram encoding build
//! on top of the [`MdStream`] type provided here.

pub mod address;
pub mod error;
pub mod listener;
pub mod stream;

pub use address::{DirectorAddress, DEFAULT_PORT};
pub use error::{Result, TransportError};
pub use listener::MdListener;
pub use stream::MdStream;
