//! Client-side wire protocol for channel-addressed message directors.
//!
//! A director routes datagrams between connected clients by channel. This
//! crate builds and parses those datagrams, frames them over a byte stream,
//! and checks received traffic against expectations in protocol tests.
//!
//! # Crate Structure
//!
//! - [`transport`]: Director addresses and TCP / Unix-domain streams
//! - [`datagram`]: Field codec, datagram builder and reader, control messages
//! - [`frame`]: uint16 length-prefixed framing (async codec behind `async`)
//! - [`client`]: Framed connection and expectation matcher

/// Re-export transport types.
pub mod transport {
    pub use mdwire_transport::*;
}

/// Re-export datagram types.
pub mod datagram {
    pub use mdwire_datagram::*;
}

/// Re-export frame types.
pub mod frame {
    pub use mdwire_frame::*;
}

/// Re-export client types.
pub mod client {
    pub use mdwire_client::*;
}

pub use mdwire_client::{connect, ClientError, Connection, ConnectionConfig};
pub use mdwire_datagram::{Datagram, DatagramBuilder, DatagramReader};
