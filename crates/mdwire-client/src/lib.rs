//! Client side of a message director connection.
//!
//! [`connect`] dials a director and returns a [`Connection`] that sends and
//! receives whole datagrams. The `expect*` methods turn a connection into a
//! protocol test harness: they check that a set of datagrams arrives, in any
//! order, possibly among other traffic.

pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod expect;

pub use config::{ConnectionConfig, DEFAULT_EXPECT_TIMEOUT, DEFAULT_READ_TIMEOUT};
pub use connection::Connection;
pub use connector::{connect, connect_with_config};
pub use error::{ClientError, Result};
pub use expect::{expect_multi, expect_none, DatagramSource};
